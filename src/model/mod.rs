//! # Engine Data Model
//!
//! Pure DTOs crossing every boundary: glyphs, shapes, geometry, scale and
//! tunables. No I/O, no graph state, no classifier logic lives here.

pub mod geom;
pub mod glyph;
pub mod params;
pub mod scale;
pub mod shape;

pub use geom::{HSide, Point, Rect};
pub use glyph::{Glyph, GlyphId};
pub use params::{Params, Switches};
pub use scale::Scale;
pub use shape::{Shape, ShapeCategory};

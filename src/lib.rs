//! # omr-symbols
//!
//! Symbol interpretation engine for an optical music recognition pipeline.
//!
//! Input: a per-system hypothesis graph already holding the structural
//! inters (barlines, heads, stems, chords) plus the leftover candidate
//! glyphs, and a shape classifier treated as an opaque scoring oracle.
//! Output: the same graph enriched with fixed-shape symbol inters (clefs,
//! rests, accidentals, dots, dynamics...), their relations, and with every
//! mutual exclusion resolved.
//!
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//! use omr_symbols::{Classifier, Condition, Evaluation, Glyph, SymbolEngine, SystemInfo, SystemJob};
//! # struct Oracle;
//! # impl Classifier for Oracle {
//! #     fn evaluate(&self, _: &Glyph, _: &SystemInfo, _: usize, _: f64, _: &[Condition]) -> Vec<Evaluation> {
//! #         Vec::new()
//! #     }
//! # }
//!
//! let engine = SymbolEngine::new(Oracle);
//! let mut jobs: Vec<SystemJob> = Vec::new();
//! let cancel = AtomicBool::new(false);
//! let stats = engine.process_page(&mut jobs, &cancel)?;
//! # Ok::<(), omr_symbols::Error>(())
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod classifier;
pub mod cluster;
pub mod dots;
pub mod engine;
pub mod factory;
pub mod link;
pub mod linker;
pub mod model;
pub mod sheet;
pub mod sig;

// ============================================================================
// Re-exports
// ============================================================================

pub use classifier::{Classifier, ClassifierAdapter, Condition, Evaluation};
pub use cluster::{Compound, GlyphClusterer};
pub use engine::{SampleSink, SymbolEngine, SystemJob, SystemStats};
pub use model::{Glyph, GlyphId, HSide, Params, Point, Rect, Scale, Shape, Switches};
pub use sheet::{MeasureStack, Part, Staff, StaffId, SystemInfo};
pub use sig::{Inter, InterId, InterKind, RelationKind, SentenceRole, Sig};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A linking pass could not complete for one inter.
    #[error("linking: {0}")]
    Linking(String),

    /// The worker pool could not be built.
    #[error("worker pool: {0}")]
    Pool(String),

    /// Processing was cancelled before completion.
    #[error("cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;

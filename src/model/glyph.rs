//! Candidate glyph, as delivered by the earlier segmentation stages.

use serde::{Deserialize, Serialize};

use super::geom::{Point, Rect};

/// Opaque glyph identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GlyphId(pub u64);

impl std::fmt::Display for GlyphId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A segmented ink blob, input to classification.
///
/// The engine never touches pixels: weight, bounds and centroid are all it
/// needs. `tracked` routes the glyph (and any inter built on it) through
/// targeted logging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Glyph {
    pub id: GlyphId,
    /// Ink weight in pixels.
    pub weight: u32,
    pub bounds: Rect,
    pub centroid: Point,
    pub tracked: bool,
}

impl Glyph {
    pub fn new(id: GlyphId, bounds: Rect, weight: u32) -> Self {
        Self { id, weight, centroid: bounds.center(), bounds, tracked: false }
    }

    pub fn tracked(mut self) -> Self {
        self.tracked = true;
        self
    }

    pub fn center(&self) -> Point {
        self.centroid
    }

    /// Merge several glyph pieces into one compound glyph.
    ///
    /// The compound gets a synthetic id derived from the first piece; callers
    /// keep the piece list separately when they need provenance.
    pub fn compound_of(parts: &[&Glyph]) -> Glyph {
        debug_assert!(!parts.is_empty());
        let mut bounds = parts[0].bounds;
        let mut weight: u64 = 0;
        let mut cx = 0.0;
        let mut cy = 0.0;
        for p in parts {
            bounds = bounds.union(&p.bounds);
            weight += u64::from(p.weight);
            cx += p.centroid.x * f64::from(p.weight);
            cy += p.centroid.y * f64::from(p.weight);
        }
        let w = weight.max(1) as f64;
        Glyph {
            id: GlyphId(parts[0].id.0 | COMPOUND_BIT),
            weight: weight.min(u64::from(u32::MAX)) as u32,
            bounds,
            centroid: Point::new(cx / w, cy / w),
            tracked: parts.iter().any(|p| p.tracked),
        }
    }
}

/// High bit marks synthetic compound ids, keeping them disjoint from the
/// segmenter's id space.
const COMPOUND_BIT: u64 = 1 << 63;

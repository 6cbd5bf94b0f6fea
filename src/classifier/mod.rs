//! # Classifier Boundary
//!
//! The shape classifier is an opaque scoring oracle behind the `Classifier`
//! trait; the engine is generic over it. The adapter normalizes oracle
//! output: descending grade order, bounded length, and only shapes the
//! factory knows how to turn into inters.

use serde::{Deserialize, Serialize};

use crate::model::{Glyph, Shape, ShapeCategory};
use crate::sheet::SystemInfo;

/// One ranked classifier answer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub shape: Shape,
    /// Raw classifier confidence in [0, 1]; higher is better.
    pub grade: f64,
}

/// Extra screening the oracle may apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    /// Only evaluations that passed the shape-specific geometric checks.
    Checked,
}

/// The scoring oracle. Implementations must be deterministic.
pub trait Classifier: Send + Sync {
    fn evaluate(
        &self,
        glyph: &Glyph,
        system: &SystemInfo,
        max_results: usize,
        min_grade: f64,
        conditions: &[Condition],
    ) -> Vec<Evaluation>;
}

/// Adapter wrapping the oracle for factory consumption.
pub struct ClassifierAdapter<C: Classifier> {
    inner: C,
}

impl<C: Classifier> ClassifierAdapter<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Ranked acceptable evaluations for a glyph.
    pub fn evaluate(
        &self,
        glyph: &Glyph,
        system: &SystemInfo,
        max_results: usize,
        min_grade: f64,
    ) -> Vec<Evaluation> {
        let mut evals =
            self.inner.evaluate(glyph, system, max_results, min_grade, &[Condition::Checked]);
        evals.retain(|e| e.grade >= min_grade && Self::supported(e.shape));
        evals.sort_by(|a, b| {
            b.grade.partial_cmp(&a.grade).unwrap_or(std::cmp::Ordering::Equal)
        });
        evals.truncate(max_results);
        evals
    }

    /// Structural shapes are placed by earlier stages, never by evaluation.
    fn supported(shape: Shape) -> bool {
        shape.category() != ShapeCategory::Barline
    }
}

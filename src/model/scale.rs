//! Sheet scale: the bridge between pixels and interline fractions.
//!
//! Every tolerance in the engine is expressed as a fraction of the staff
//! interline, so thresholds survive any scan resolution.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scale {
    interline: f64,
}

impl Scale {
    pub fn new(interline: f64) -> Self {
        debug_assert!(interline > 0.0);
        Self { interline }
    }

    pub fn interline(&self) -> f64 {
        self.interline
    }

    /// Interline fraction → pixels.
    pub fn to_pixels(&self, frac: f64) -> f64 {
        frac * self.interline
    }

    /// Pixels → interline fraction.
    pub fn pixels_to_frac(&self, pixels: f64) -> f64 {
        pixels / self.interline
    }
}

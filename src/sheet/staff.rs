//! Staff and part descriptors.

use serde::{Deserialize, Serialize};

use crate::model::{Point, Rect, Scale};
use crate::sig::InterId;

/// Opaque staff identifier, unique within a system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StaffId(pub u32);

/// One set of staff lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Staff {
    pub id: StaffId,
    /// Abscissa range covered by the staff.
    pub left: f64,
    pub right: f64,
    /// Ordinate of the top line.
    pub top: f64,
    /// 5 for a standard staff, 1 for a one-line percussion staff.
    pub line_count: u8,
    pub tablature: bool,
    /// Concrete ledgers attached to this staff (short lines already
    /// validated by the ledger stage).
    pub ledgers: Vec<Rect>,
}

impl Staff {
    pub fn new(id: StaffId, left: f64, right: f64, top: f64) -> Self {
        Self { id, left, right, top, line_count: 5, tablature: false, ledgers: Vec::new() }
    }

    pub fn tablature(mut self) -> Self {
        self.tablature = true;
        self
    }

    pub fn one_line(mut self) -> Self {
        self.line_count = 1;
        self
    }

    pub fn with_ledger(mut self, ledger: Rect) -> Self {
        self.ledgers.push(ledger);
        self
    }

    pub fn middle_y(&self, scale: &Scale) -> f64 {
        self.top + f64::from(self.line_count - 1) / 2.0 * scale.interline()
    }

    pub fn bottom_y(&self, scale: &Scale) -> f64 {
        self.top + f64::from(self.line_count - 1) * scale.interline()
    }

    /// Pitch position of a point: half-interline steps from the middle line,
    /// positive downward. A point on the top line of a 5-line staff is -4.
    pub fn pitch_at(&self, p: Point, scale: &Scale) -> f64 {
        2.0 * (p.y - self.middle_y(scale)) / scale.interline()
    }

    /// Vertical distance from the point to the nearest staff line or
    /// concrete ledger, in pixels.
    pub fn line_distance(&self, p: Point, scale: &Scale) -> f64 {
        let mut best = f64::MAX;
        for n in 0..self.line_count {
            let line_y = self.top + f64::from(n) * scale.interline();
            best = best.min((p.y - line_y).abs());
        }
        for ledger in &self.ledgers {
            let center = ledger.center();
            if p.x >= ledger.x && p.x <= ledger.right() {
                best = best.min((p.y - center.y).abs());
            }
        }
        best
    }

    /// Vertical distance from the point to the staff band (0 inside).
    pub fn vertical_distance(&self, p: Point, scale: &Scale) -> f64 {
        if p.y < self.top {
            self.top - p.y
        } else {
            (p.y - self.bottom_y(scale)).max(0.0)
        }
    }
}

/// A group of staves played by one instrument or voice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub id: u32,
    pub staves: Vec<StaffId>,
    pub name: Option<String>,
    /// Part-name sentence assigned to this part by the linker.
    pub name_sentence: Option<InterId>,
}

impl Part {
    pub fn new(id: u32, staves: Vec<StaffId>) -> Self {
        Self { id, staves, name: None, name_sentence: None }
    }
}

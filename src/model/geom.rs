//! Plane geometry primitives shared by every stage.

use serde::{Deserialize, Serialize};

/// A point in sheet coordinates (pixels, y grows downward).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in sheet coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Symmetric expansion by `dx` horizontally and `dy` vertically.
    pub fn grown(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x - dx,
            y: self.y - dy,
            width: self.width + 2.0 * dx,
            height: self.height + 2.0 * dy,
        }
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x < self.right() && p.y >= self.y && p.y < self.bottom()
    }

    pub fn union(&self, other: &Rect) -> Self {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Self {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }

    /// Gap distance between two rectangles: 0 when they touch or overlap,
    /// otherwise the Euclidean distance between the closest edges.
    pub fn gap_to(&self, other: &Rect) -> f64 {
        let dx = (other.x - self.right()).max(self.x - other.right()).max(0.0);
        let dy = (other.y - self.bottom()).max(self.y - other.bottom()).max(0.0);
        (dx * dx + dy * dy).sqrt()
    }
}

/// Horizontal side of a measure stack or barline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HSide {
    Left,
    Right,
}

impl HSide {
    pub const BOTH: [HSide; 2] = [HSide::Left, HSide::Right];
}

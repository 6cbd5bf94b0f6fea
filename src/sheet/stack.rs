//! Measure stack: one column of measures across a system.

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use crate::model::{HSide, Point};
use crate::sig::InterId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureStack {
    pub id: u32,
    pub left: f64,
    pub right: f64,
    /// Barline inters closing the stack on each side, one per staff where
    /// present.
    left_bars: Vec<InterId>,
    right_bars: Vec<InterId>,
    /// Sides confirmed as repeat ends.
    repeats: HashSet<HSide>,
}

impl MeasureStack {
    pub fn new(id: u32, left: f64, right: f64) -> Self {
        Self {
            id,
            left,
            right,
            left_bars: Vec::new(),
            right_bars: Vec::new(),
            repeats: HashSet::new(),
        }
    }

    pub fn with_bar(mut self, side: HSide, bar: InterId) -> Self {
        self.bars_mut(side).push(bar);
        self
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.left && p.x < self.right
    }

    pub fn bars(&self, side: HSide) -> &[InterId] {
        match side {
            HSide::Left => &self.left_bars,
            HSide::Right => &self.right_bars,
        }
    }

    fn bars_mut(&mut self, side: HSide) -> &mut Vec<InterId> {
        match side {
            HSide::Left => &mut self.left_bars,
            HSide::Right => &mut self.right_bars,
        }
    }

    pub fn add_repeat(&mut self, side: HSide) {
        self.repeats.insert(side);
    }

    pub fn is_repeat(&self, side: HSide) -> bool {
        self.repeats.contains(&side)
    }
}

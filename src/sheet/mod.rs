//! # Sheet Layout Directory
//!
//! Staves, parts and measure stacks of one system, plus the queries the
//! interpretation stages run against them. All of this is placed by earlier
//! pipeline stages; the engine only reads it (except for repeat marks).

pub mod stack;
pub mod staff;

use serde::{Deserialize, Serialize};

use crate::model::{Params, Point, Scale, Switches};

pub use stack::MeasureStack;
pub use staff::{Part, Staff, StaffId};

/// One system: full page width, every staff and stack it spans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub id: u32,
    pub scale: Scale,
    /// Strictness profile: higher values widen every gap tolerance.
    pub profile: i32,
    pub switches: Switches,
    pub staves: Vec<Staff>,
    pub parts: Vec<Part>,
    pub stacks: Vec<MeasureStack>,
}

impl SystemInfo {
    pub fn new(id: u32, scale: Scale) -> Self {
        Self {
            id,
            scale,
            profile: 0,
            switches: Switches::default(),
            staves: Vec::new(),
            parts: Vec::new(),
            stacks: Vec::new(),
        }
    }

    pub fn with_staff(mut self, staff: Staff) -> Self {
        self.staves.push(staff);
        self
    }

    pub fn with_part(mut self, part: Part) -> Self {
        self.parts.push(part);
        self
    }

    pub fn with_stack(mut self, stack: MeasureStack) -> Self {
        self.stacks.push(stack);
        self
    }

    pub fn staff(&self, id: StaffId) -> &Staff {
        &self.staves[id.0 as usize]
    }

    /// The staff closest to the point, ordinate-wise.
    pub fn closest_staff(&self, p: Point) -> Option<&Staff> {
        self.staves.iter().min_by(|a, b| {
            a.vertical_distance(p, &self.scale)
                .partial_cmp(&b.vertical_distance(p, &self.scale))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }

    /// Pitch position of the point relative to its closest staff.
    pub fn estimated_pitch(&self, p: Point) -> Option<f64> {
        self.closest_staff(p).map(|staff| staff.pitch_at(p, &self.scale))
    }

    pub fn stack_at(&self, p: Point) -> Option<&MeasureStack> {
        self.stacks.iter().find(|stack| stack.contains(p))
    }

    pub fn stack_index_at(&self, p: Point) -> Option<usize> {
        self.stacks.iter().position(|stack| stack.contains(p))
    }

    /// Staff count entering the repeat quorum (tablatures excluded).
    pub fn quorum_staff_count(&self) -> usize {
        self.staves.iter().filter(|s| !s.tablature).count()
    }

    /// Profile-scaled gap ceiling in pixels.
    pub fn profiled_pixels(&self, params: &Params, base_frac: f64) -> f64 {
        self.scale.to_pixels(params.profiled(base_frac, self.profile))
    }
}

//! Shared fixtures: a table-driven classifier stub and system builders.

#![allow(dead_code)]

use std::collections::HashMap;

use omr_symbols::{
    Classifier, Condition, Evaluation, Glyph, GlyphId, HSide, Inter, InterId, InterKind,
    MeasureStack, Rect, Scale, Shape, Sig, Staff, StaffId, SystemInfo,
};

/// Classifier stub answering from a fixed glyph-id table. Glyphs absent from
/// the table (compounds included) evaluate to nothing.
pub struct TableClassifier {
    table: HashMap<GlyphId, Vec<Evaluation>>,
}

impl TableClassifier {
    pub fn new() -> Self {
        Self { table: HashMap::new() }
    }

    pub fn with(mut self, glyph: GlyphId, shape: Shape, grade: f64) -> Self {
        self.table.entry(glyph).or_default().push(Evaluation { shape, grade });
        self
    }
}

impl Classifier for TableClassifier {
    fn evaluate(
        &self,
        glyph: &Glyph,
        _system: &SystemInfo,
        _max_results: usize,
        _min_grade: f64,
        _conditions: &[Condition],
    ) -> Vec<Evaluation> {
        self.table.get(&glyph.id).cloned().unwrap_or_default()
    }
}

/// One 5-line staff (top line at y = 100), one full-width measure stack.
/// Interline is 20 pixels, so the staff middle line sits at y = 140.
pub fn single_staff_system() -> SystemInfo {
    SystemInfo::new(0, Scale::new(20.0))
        .with_staff(Staff::new(StaffId(0), 0.0, 1000.0, 100.0))
        .with_stack(MeasureStack::new(0, 0.0, 1000.0))
}

/// Four staves, 200 pixels apart, one full-width stack.
pub fn four_staff_system() -> SystemInfo {
    let mut system = SystemInfo::new(0, Scale::new(20.0));
    for i in 0..4u32 {
        system = system.with_staff(Staff::new(
            StaffId(i),
            0.0,
            1000.0,
            100.0 + f64::from(i) * 200.0,
        ));
    }
    system.with_stack(MeasureStack::new(0, 0.0, 1000.0))
}

/// Dot-sized glyph centered at (cx, cy).
pub fn dot_glyph(id: u64, cx: f64, cy: f64) -> Glyph {
    Glyph::new(GlyphId(id), Rect::new(cx - 3.0, cy - 3.0, 6.0, 6.0), 20)
}

pub fn glyph(id: u64, bounds: Rect) -> Glyph {
    Glyph::new(GlyphId(id), bounds, (bounds.width * bounds.height * 0.5) as u32)
}

/// Full-height barline inter at the given abscissa, spanning `staff_top`.
pub fn barline(sig: &mut Sig, x: f64, staff_top: f64) -> InterId {
    sig.add_inter(
        Inter::new(InterKind::Barline, 0.9, Rect::new(x, staff_top, 4.0, 80.0))
            .with_shape(Shape::ThinBarline),
    )
}

/// Head inter plus its owning head chord.
pub fn head_with_chord(sig: &mut Sig, x: f64, y: f64) -> (InterId, InterId) {
    let chord =
        sig.add_inter(Inter::new(InterKind::HeadChord, 0.9, Rect::new(x, y - 25.0, 12.0, 35.0)));
    let head = sig.add_inter(
        Inter::new(InterKind::Head, 0.9, Rect::new(x, y - 5.0, 12.0, 10.0)).with_chord(chord),
    );
    (head, chord)
}

/// Attach right-side bars to the system's single stack.
pub fn close_stack_right(system: &mut SystemInfo, bars: &[InterId]) {
    let stack = system.stacks.remove(0);
    let mut rebuilt = MeasureStack::new(stack.id, stack.left, stack.right);
    for &bar in bars {
        rebuilt = rebuilt.with_bar(HSide::Right, bar);
    }
    system.stacks.insert(0, rebuilt);
}

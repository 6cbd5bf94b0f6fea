//! # Inter Factory
//!
//! Turns an accepted glyph evaluation plus geometric context into a settled
//! typed inter, or defers dot-shaped glyphs to the dot resolver. A `None`
//! return (no hypothesis) is the dominant, expected outcome for glyphs that
//! fail their family's contextual validation.

use tracing::{debug, info};

use crate::classifier::Evaluation;
use crate::dots::DotResolver;
use crate::link::{self, Link};
use crate::model::{Glyph, Params, Rect, Shape, ShapeCategory};
use crate::sheet::{StaffId, SystemInfo};
use crate::sig::{Inter, InterId, InterKind, RelationKind, Sig};

// ============================================================================
// SystemSymbols — per-system sorted caches
// ============================================================================

/// Abscissa-sorted handles to the structural inters the factory and the dot
/// resolver keep querying. Bars and rests are gathered lazily: rests are
/// themselves created during the symbols pass.
#[derive(Debug, Default)]
pub struct SystemSymbols {
    pub stems: Vec<InterId>,
    pub heads: Vec<InterId>,
    pub chords: Vec<InterId>,
    pub head_chords: Vec<InterId>,
    bars: Option<Vec<InterId>>,
    rests: Option<Vec<InterId>>,
}

impl SystemSymbols {
    pub fn gather(sig: &Sig) -> Self {
        let sorted = |mut ids: Vec<InterId>| {
            sig.sort_by_abscissa(&mut ids);
            ids
        };
        Self {
            stems: sorted(sig.inters_of_kind(InterKind::Stem)),
            heads: sorted(sig.inters_of_kind(InterKind::Head)),
            chords: sorted(sig.inters_where(|i| {
                matches!(i.kind, InterKind::HeadChord | InterKind::RestChord | InterKind::GraceChord)
            })),
            head_chords: sorted(sig.inters_of_kind(InterKind::HeadChord)),
            bars: None,
            rests: None,
        }
    }

    pub fn bars(&mut self, sig: &Sig) -> &[InterId] {
        self.bars.get_or_insert_with(|| {
            let mut ids = sig.inters_of_kind(InterKind::Barline);
            sig.sort_by_abscissa(&mut ids);
            ids
        })
    }

    pub fn rests(&mut self, sig: &Sig) -> &[InterId] {
        self.rests.get_or_insert_with(|| {
            let mut ids = sig.inters_of_kind(InterKind::Rest);
            sig.sort_by_abscissa(&mut ids);
            ids
        })
    }

    /// Invalidate the lazy caches, after a phase that created new inters.
    pub fn refresh_lazy(&mut self) {
        self.bars = None;
        self.rests = None;
    }
}

// ============================================================================
// InterFactory
// ============================================================================

pub struct InterFactory<'a> {
    params: &'a Params,
    pub symbols: SystemSymbols,
    pub dots: DotResolver,
}

impl<'a> InterFactory<'a> {
    pub fn new(params: &'a Params, sig: &Sig) -> Self {
        Self { params, symbols: SystemSymbols::gather(sig), dots: DotResolver::new() }
    }

    /// Create and insert the proper inter for an accepted evaluation.
    ///
    /// `closest_staff` is the staff nearest to the glyph, ordinate-wise;
    /// attaching by proximity is all the factory does for clefs, keys and
    /// times (correctness is checked by later passes, out of scope here).
    pub fn create(
        &mut self,
        sig: &mut Sig,
        system: &SystemInfo,
        eval: Evaluation,
        glyph: &Glyph,
        closest_staff: Option<StaffId>,
    ) -> Option<InterId> {
        let grade = self.params.intrinsic_ratio * eval.grade;
        if glyph.tracked {
            info!(glyph = %glyph.id, shape = ?eval.shape, grade, "tracked glyph evaluated");
        }

        match eval.shape.category() {
            ShapeCategory::Clutter => None,

            ShapeCategory::Dot => {
                self.dots.instant_checks(
                    sig,
                    system,
                    &mut self.symbols,
                    self.params,
                    eval,
                    glyph,
                );
                None
            }

            ShapeCategory::Clef => {
                Some(self.add_on_staff(sig, InterKind::Clef, eval.shape, grade, glyph, closest_staff))
            }
            ShapeCategory::Key => {
                Some(self.add_on_staff(sig, InterKind::Key, eval.shape, grade, glyph, closest_staff))
            }
            ShapeCategory::Time => {
                Some(self.add_on_staff(sig, InterKind::Time, eval.shape, grade, glyph, closest_staff))
            }

            ShapeCategory::Flag => self.create_chord_dependent(
                sig,
                system,
                InterKind::Flag,
                RelationKind::ChordFlag,
                eval.shape,
                grade,
                glyph,
                ChordPool::Head,
            ),
            ShapeCategory::Tuplet => self.create_chord_dependent(
                sig,
                system,
                InterKind::Tuplet,
                RelationKind::ChordTuplet,
                eval.shape,
                grade,
                glyph,
                ChordPool::All,
            ),
            ShapeCategory::Articulation => {
                if !system.switches.articulations {
                    return None;
                }
                self.create_chord_dependent(
                    sig,
                    system,
                    InterKind::Articulation,
                    RelationKind::ChordArticulation,
                    eval.shape,
                    grade,
                    glyph,
                    ChordPool::Head,
                )
            }
            ShapeCategory::Ornament => self.create_chord_dependent(
                sig,
                system,
                InterKind::Ornament,
                RelationKind::ChordOrnament,
                eval.shape,
                grade,
                glyph,
                ChordPool::Head,
            ),
            ShapeCategory::Arpeggiato => self.create_chord_dependent(
                sig,
                system,
                InterKind::Arpeggiato,
                RelationKind::ChordArpeggiato,
                eval.shape,
                grade,
                glyph,
                ChordPool::Head,
            ),

            ShapeCategory::Rest => self.create_rest(sig, system, eval.shape, grade, glyph),

            ShapeCategory::Accidental => {
                Some(self.create_accidental(sig, system, eval.shape, grade, glyph, closest_staff))
            }

            ShapeCategory::Marker => {
                Some(self.create_marker(sig, system, eval.shape, grade, glyph, closest_staff))
            }

            ShapeCategory::FermataArc => {
                let inter = Inter::new(InterKind::FermataArc, grade, glyph.bounds)
                    .with_shape(eval.shape)
                    .with_glyph(glyph.id);
                Some(self.add_maybe_staffed(sig, inter, closest_staff, glyph))
            }
            ShapeCategory::Breath => {
                let inter = Inter::new(InterKind::Breath, grade, glyph.bounds)
                    .with_shape(eval.shape)
                    .with_glyph(glyph.id);
                Some(self.add_maybe_staffed(sig, inter, closest_staff, glyph))
            }

            ShapeCategory::Dynamics => {
                Some(self.add_plain(sig, InterKind::Dynamics, eval.shape, grade, glyph))
            }
            ShapeCategory::Wedge => {
                Some(self.add_plain(sig, InterKind::Wedge, eval.shape, grade, glyph))
            }
            ShapeCategory::Pedal => {
                Some(self.add_plain(sig, InterKind::Pedal, eval.shape, grade, glyph))
            }

            // Numeric annotations: always created, converted and removed by
            // the linker's final pass.
            ShapeCategory::Fingering => {
                Some(self.add_plain(sig, InterKind::Number, eval.shape, grade, glyph))
            }

            ShapeCategory::Plucking => system
                .switches
                .pluckings
                .then(|| self.add_plain(sig, InterKind::Plucking, eval.shape, grade, glyph)),
            ShapeCategory::Fret => system
                .switches
                .frets
                .then(|| self.add_plain(sig, InterKind::Fret, eval.shape, grade, glyph)),

            ShapeCategory::Barline => {
                debug!(glyph = %glyph.id, shape = ?eval.shape, "no factory support for shape");
                None
            }
        }
    }

    /// Deferred per-system phase: everything that needed all chords and
    /// rests to exist first.
    pub fn late_checks(&mut self, sig: &mut Sig, system: &mut SystemInfo) {
        self.symbols.refresh_lazy();
        self.dots.late_checks(sig, system, &mut self.symbols, self.params);
    }

    // ========================================================================
    // Per-family constructors
    // ========================================================================

    fn add_on_staff(
        &self,
        sig: &mut Sig,
        kind: InterKind,
        shape: Shape,
        grade: f64,
        glyph: &Glyph,
        staff: Option<StaffId>,
    ) -> InterId {
        let mut inter = Inter::new(kind, grade, glyph.bounds).with_shape(shape).with_glyph(glyph.id);
        inter.staff = staff;
        inter.tracked = glyph.tracked;
        sig.add_inter(inter)
    }

    fn add_plain(
        &self,
        sig: &mut Sig,
        kind: InterKind,
        shape: Shape,
        grade: f64,
        glyph: &Glyph,
    ) -> InterId {
        let mut inter = Inter::new(kind, grade, glyph.bounds).with_shape(shape).with_glyph(glyph.id);
        inter.tracked = glyph.tracked;
        sig.add_inter(inter)
    }

    fn add_maybe_staffed(
        &self,
        sig: &mut Sig,
        mut inter: Inter,
        staff: Option<StaffId>,
        glyph: &Glyph,
    ) -> InterId {
        inter.staff = staff;
        inter.tracked = glyph.tracked;
        sig.add_inter(inter)
    }

    /// Families that only exist next to a chord: no chord, no inter.
    #[allow(clippy::too_many_arguments)]
    fn create_chord_dependent(
        &mut self,
        sig: &mut Sig,
        system: &SystemInfo,
        kind: InterKind,
        rel_kind: RelationKind,
        shape: Shape,
        grade: f64,
        glyph: &Glyph,
        pool: ChordPool,
    ) -> Option<InterId> {
        let candidates = match pool {
            ChordPool::Head => &self.symbols.head_chords,
            ChordPool::All => &self.symbols.chords,
        };
        let links = chord_links(sig, system, self.params, candidates, glyph.bounds, rel_kind);
        let best = link::best_link(&links)?;

        let id = self.add_plain(sig, kind, shape, grade, glyph);
        best.apply(sig, id);
        Some(id)
    }

    /// A rest must sit inside some measure stack.
    fn create_rest(
        &mut self,
        sig: &mut Sig,
        system: &SystemInfo,
        shape: Shape,
        grade: f64,
        glyph: &Glyph,
    ) -> Option<InterId> {
        if system.stack_at(glyph.center()).is_none() {
            debug!(glyph = %glyph.id, "rest outside any measure stack");
            return None;
        }
        let staff = system.closest_staff(glyph.center()).map(|s| s.id);
        Some(self.add_on_staff(sig, InterKind::Rest, shape, grade, glyph, staff))
    }

    /// Accidental: created on the closest staff, then immediately probed
    /// against system heads for a plausible alteration.
    fn create_accidental(
        &mut self,
        sig: &mut Sig,
        system: &SystemInfo,
        shape: Shape,
        grade: f64,
        glyph: &Glyph,
        staff: Option<StaffId>,
    ) -> InterId {
        let id = self.add_on_staff(sig, InterKind::Accidental, shape, grade, glyph, staff);

        let scale = &system.scale;
        let max_dx = system.profiled_pixels(self.params, 2.0);
        let max_dy = system.profiled_pixels(self.params, 0.4);
        let center = glyph.center();
        // The altered head sits to the right of its accidental.
        let lu_box = Rect::new(center.x, center.y - max_dy, max_dx, 2.0 * max_dy);

        let mut links = Vec::new();
        for head in sig.intersected_inters(&self.symbols.heads, &lu_box) {
            let head_center = sig.inter(head).bounds.center();
            let x_gap = head_center.x - center.x;
            if x_gap <= 0.0 {
                continue;
            }
            let x_frac = scale.pixels_to_frac(x_gap);
            let y_frac = scale.pixels_to_frac((head_center.y - center.y).abs());
            if let Some(rel_grade) =
                RelationKind::Alteration.score(x_frac, y_frac, self.params, system.profile)
            {
                links.push(Link::new(head, RelationKind::Alteration, rel_grade, x_frac + y_frac));
            }
        }
        link::apply_best(sig, id, &links);
        id
    }

    /// Marker: created, then tied to the nearest staff barline.
    fn create_marker(
        &mut self,
        sig: &mut Sig,
        system: &SystemInfo,
        shape: Shape,
        grade: f64,
        glyph: &Glyph,
        staff: Option<StaffId>,
    ) -> InterId {
        let id = self.add_on_staff(sig, InterKind::Marker, shape, grade, glyph, staff);

        let scale = &system.scale;
        let center = glyph.center();
        let max_dx = system.profiled_pixels(self.params, 2.0);
        let mut links = Vec::new();
        for bar in self.symbols.bars(sig).to_vec() {
            let bar_center = sig.inter(bar).bounds.center();
            let x_frac = scale.pixels_to_frac((bar_center.x - center.x).abs());
            let y_frac = scale.pixels_to_frac((bar_center.y - center.y).abs());
            if scale.to_pixels(x_frac) > max_dx {
                continue;
            }
            if let Some(rel_grade) =
                RelationKind::MarkerBar.score(x_frac, y_frac, self.params, system.profile)
            {
                links.push(Link::new(bar, RelationKind::MarkerBar, rel_grade, x_frac));
            }
        }
        link::apply_best(sig, id, &links);
        id
    }
}

#[derive(Debug, Clone, Copy)]
enum ChordPool {
    Head,
    All,
}

/// Scored proposals from a symbol box to nearby chords.
pub(crate) fn chord_links(
    sig: &Sig,
    system: &SystemInfo,
    params: &Params,
    chords: &[InterId],
    bounds: Rect,
    kind: RelationKind,
) -> Vec<Link> {
    let scale = &system.scale;
    // Lookup box wide enough for the kind's own ceilings.
    let max_dx = system.profiled_pixels(params, 3.0);
    let max_dy = system.profiled_pixels(params, 4.0);
    let lu_box = bounds.grown(max_dx, max_dy);

    let mut links = Vec::new();
    for chord in sig.intersected_inters(chords, &lu_box) {
        let cb = sig.inter(chord).bounds;
        let x_frac = scale.pixels_to_frac((cb.center().x - bounds.center().x).abs());
        let y_frac = scale.pixels_to_frac(vertical_gap(&bounds, &cb));
        if let Some(rel_grade) = kind.score(x_frac, y_frac, params, system.profile) {
            links.push(Link::new(chord, kind, rel_grade, x_frac + y_frac));
        }
    }
    links
}

/// Vertical gap between two boxes, 0 when they overlap vertically.
pub(crate) fn vertical_gap(a: &Rect, b: &Rect) -> f64 {
    (b.y - a.bottom()).max(a.y - b.bottom()).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GlyphId, Scale};
    use crate::sheet::Staff;

    fn system_one_staff() -> SystemInfo {
        SystemInfo::new(0, Scale::new(20.0))
            .with_staff(Staff::new(StaffId(0), 0.0, 1000.0, 100.0))
            .with_stack(crate::sheet::MeasureStack::new(0, 0.0, 1000.0))
    }

    fn glyph_at(id: u64, x: f64, y: f64) -> Glyph {
        Glyph::new(GlyphId(id), Rect::new(x, y, 8.0, 8.0), 40)
    }

    #[test]
    fn clef_attaches_to_closest_staff() {
        let system = system_one_staff();
        let mut sig = Sig::new();
        let params = Params::default();
        let mut factory = InterFactory::new(&params, &sig);
        let glyph = glyph_at(1, 10.0, 110.0);
        let eval = Evaluation { shape: Shape::GClef, grade: 0.9 };

        let id = factory.create(&mut sig, &system, eval, &glyph, Some(StaffId(0))).unwrap();
        let inter = sig.inter(id);
        assert_eq!(inter.kind, InterKind::Clef);
        assert_eq!(inter.staff, Some(StaffId(0)));
        // Intrinsic ratio applied.
        assert!((inter.grade - 0.72).abs() < 1e-9);
    }

    #[test]
    fn flag_without_chord_creates_nothing() {
        let system = system_one_staff();
        let mut sig = Sig::new();
        let params = Params::default();
        let mut factory = InterFactory::new(&params, &sig);
        let glyph = glyph_at(1, 400.0, 120.0);
        let eval = Evaluation { shape: Shape::FlagDown(1), grade: 0.9 };

        assert!(factory.create(&mut sig, &system, eval, &glyph, Some(StaffId(0))).is_none());
        assert_eq!(sig.alive_count(), 0);
    }

    #[test]
    fn flag_near_chord_gets_linked() {
        let system = system_one_staff();
        let mut sig = Sig::new();
        let chord = sig.add_inter(Inter::new(
            InterKind::HeadChord,
            0.9,
            Rect::new(395.0, 100.0, 12.0, 40.0),
        ));
        let params = Params::default();
        let mut factory = InterFactory::new(&params, &sig);
        let glyph = glyph_at(1, 404.0, 104.0);
        let eval = Evaluation { shape: Shape::FlagDown(1), grade: 0.9 };

        let id = factory.create(&mut sig, &system, eval, &glyph, Some(StaffId(0))).unwrap();
        assert!(sig.has_relation(id, RelationKind::ChordFlag));
        assert_eq!(sig.opposite(sig.relations_of_kind(id, RelationKind::ChordFlag)[0], id), chord);
    }

    #[test]
    fn accidental_scans_heads_to_its_right() {
        let system = system_one_staff();
        let mut sig = Sig::new();
        let head = sig.add_inter(Inter::new(
            InterKind::Head,
            0.9,
            Rect::new(420.0, 116.0, 12.0, 10.0),
        ));
        // A head on the wrong (left) side.
        sig.add_inter(Inter::new(InterKind::Head, 0.9, Rect::new(360.0, 116.0, 12.0, 10.0)));
        let params = Params::default();
        let mut factory = InterFactory::new(&params, &sig);
        let glyph = glyph_at(1, 400.0, 116.0);
        let eval = Evaluation { shape: Shape::Sharp, grade: 0.8 };

        let id = factory.create(&mut sig, &system, eval, &glyph, Some(StaffId(0))).unwrap();
        let rels = sig.relations_of_kind(id, RelationKind::Alteration);
        assert_eq!(rels.len(), 1);
        assert_eq!(sig.opposite(rels[0], id), head);
    }

    #[test]
    fn articulation_switch_gates_creation() {
        let mut system = system_one_staff();
        system.switches.articulations = false;
        let mut sig = Sig::new();
        sig.add_inter(Inter::new(InterKind::HeadChord, 0.9, Rect::new(395.0, 100.0, 12.0, 40.0)));
        let params = Params::default();
        let mut factory = InterFactory::new(&params, &sig);
        let glyph = glyph_at(1, 398.0, 146.0);
        let eval = Evaluation { shape: Shape::Accent, grade: 0.9 };

        assert!(factory.create(&mut sig, &system, eval, &glyph, Some(StaffId(0))).is_none());
    }

    #[test]
    fn marker_links_to_nearest_barline() {
        let system = system_one_staff();
        let mut sig = Sig::new();
        let near = sig.add_inter(Inter::new(
            InterKind::Barline,
            0.9,
            Rect::new(500.0, 100.0, 4.0, 80.0),
        ));
        sig.add_inter(Inter::new(InterKind::Barline, 0.9, Rect::new(800.0, 100.0, 4.0, 80.0)));
        let params = Params::default();
        let mut factory = InterFactory::new(&params, &sig);
        let glyph = glyph_at(1, 495.0, 60.0);
        let eval = Evaluation { shape: Shape::Coda, grade: 0.85 };

        let id = factory.create(&mut sig, &system, eval, &glyph, Some(StaffId(0))).unwrap();
        let rels = sig.relations_of_kind(id, RelationKind::MarkerBar);
        assert_eq!(rels.len(), 1);
        assert_eq!(sig.opposite(rels[0], id), near);
    }
}

//! # Dot Resolver
//!
//! A dot-shaped glyph is ambiguous on its own: repeat dot, staccato,
//! augmentation dot (first or second) or fermata dot. The resolver settles
//! each candidate in two phases:
//!
//! * instant, at evaluation time: the roles decidable from already-present
//!   context (repeat dot next to a barline, staccato next to a chord);
//! * late, once all symbols of the system exist: augmentation dots, double
//!   dots, fermata dots, then repeat pairing, purge of unpaired repeat dots
//!   and the per-stack repeat quorum.
//!
//! Competing roles for one glyph become exclusions, resolved by the final
//! sig reduction.

use hashbrown::HashSet;
use tracing::debug;

use crate::classifier::Evaluation;
use crate::factory::{chord_links, vertical_gap, SystemSymbols};
use crate::link::{self, Link};
use crate::model::{Glyph, HSide, Params, Rect, Shape};
use crate::sheet::SystemInfo;
use crate::sig::{Inter, InterId, InterKind, RelationKind, Sig};

// ============================================================================
// Candidates
// ============================================================================

/// One dot glyph waiting for its late-phase roles, with the inters already
/// created for it.
#[derive(Debug, Clone)]
struct DotCandidate {
    glyph: Glyph,
    /// Evaluation grade, intrinsic ratio already applied.
    grade: f64,
    repeat: Option<InterId>,
    staccato: Option<InterId>,
    augmentation: Option<InterId>,
    fermata: Option<InterId>,
}

impl DotCandidate {
    fn new(glyph: Glyph, grade: f64) -> Self {
        Self { glyph, grade, repeat: None, staccato: None, augmentation: None, fermata: None }
    }

    fn roles(&self) -> impl Iterator<Item = InterId> + '_ {
        [self.repeat, self.staccato, self.augmentation, self.fermata].into_iter().flatten()
    }
}

// ============================================================================
// DotResolver
// ============================================================================

#[derive(Debug, Default)]
pub struct DotResolver {
    candidates: Vec<DotCandidate>,
}

impl DotResolver {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Instant phase
    // ========================================================================

    /// Record a dot candidate and try the roles decidable right away.
    pub fn instant_checks(
        &mut self,
        sig: &mut Sig,
        system: &SystemInfo,
        symbols: &mut SystemSymbols,
        params: &Params,
        eval: Evaluation,
        glyph: &Glyph,
    ) {
        debug_assert!(eval.shape.is_dot_shaped());
        let center = glyph.center();
        // A blob sitting on a staff line or ledger is line residue, not a dot.
        if let Some(staff) = system.closest_staff(center) {
            let dist = staff.line_distance(center, &system.scale);
            if dist < system.scale.to_pixels(params.min_staff_line_dist) {
                debug!(glyph = %glyph.id, dist, "dot candidate on a line, dropped");
                return;
            }
        }

        let grade = params.intrinsic_ratio * eval.grade;
        let mut cand = DotCandidate::new(glyph.clone(), grade);

        cand.repeat = self.instant_repeat(sig, system, symbols, params, &cand);
        if system.switches.articulations {
            cand.staccato = self.instant_staccato(sig, system, symbols, params, &cand);
        }
        if let (Some(r), Some(s)) = (cand.repeat, cand.staccato) {
            sig.add_exclusion(r, s);
        }
        self.candidates.push(cand);
    }

    /// Repeat dot: mid-space pitch (±1) right next to a barline.
    fn instant_repeat(
        &self,
        sig: &mut Sig,
        system: &SystemInfo,
        symbols: &mut SystemSymbols,
        params: &Params,
        cand: &DotCandidate,
    ) -> Option<InterId> {
        let center = cand.glyph.center();
        let pp = system.estimated_pitch(center)?;
        if (pp.abs() - 1.0).abs() > 0.5 {
            return None;
        }

        let scale = &system.scale;
        let max_dx = system.profiled_pixels(params, 1.0);
        let lu_box = cand.glyph.bounds.grown(max_dx, 0.0);

        let mut links = Vec::new();
        for bar in sig.intersected_inters(symbols.bars(sig), &lu_box) {
            let bb = sig.inter(bar).bounds;
            let x_frac = scale.pixels_to_frac((bb.center().x - center.x).abs());
            let y_frac = scale.pixels_to_frac(vertical_gap(&cand.glyph.bounds, &bb));
            if let Some(grade) = RelationKind::RepeatDotBar.score(x_frac, y_frac, params, system.profile)
            {
                links.push(Link::new(bar, RelationKind::RepeatDotBar, grade, x_frac));
            }
        }
        let best = link::best_link(&links)?;

        let staff = system.closest_staff(center).map(|s| s.id);
        let mut inter = Inter::new(InterKind::RepeatDot, cand.grade, cand.glyph.bounds)
            .with_shape(Shape::RepeatDot)
            .with_glyph(cand.glyph.id)
            .with_pitch(pp.round() as i32);
        inter.staff = staff;
        inter.tracked = cand.glyph.tracked;
        let id = sig.add_inter(inter);
        best.apply(sig, id);
        Some(id)
    }

    /// Staccato: a dot close above or below a head chord.
    fn instant_staccato(
        &self,
        sig: &mut Sig,
        system: &SystemInfo,
        symbols: &SystemSymbols,
        params: &Params,
        cand: &DotCandidate,
    ) -> Option<InterId> {
        let links = chord_links(
            sig,
            system,
            params,
            &symbols.head_chords,
            cand.glyph.bounds,
            RelationKind::ChordArticulation,
        );
        let best = link::best_link(&links)?;

        let mut inter = Inter::new(InterKind::Articulation, cand.grade, cand.glyph.bounds)
            .with_shape(Shape::Staccato)
            .with_glyph(cand.glyph.id);
        inter.tracked = cand.glyph.tracked;
        let id = sig.add_inter(inter);
        best.apply(sig, id);
        Some(id)
    }

    // ========================================================================
    // Late phase
    // ========================================================================

    /// Run every deferred check, in fixed order.
    pub fn late_checks(
        &mut self,
        sig: &mut Sig,
        system: &mut SystemInfo,
        symbols: &mut SystemSymbols,
        params: &Params,
    ) {
        self.late_first_augmentation(sig, system, symbols, params);
        self.late_second_augmentation(sig, system, params);
        self.late_fermata(sig, system, params);
        self.cross_exclude_roles(sig);
        self.pair_repeats(sig, system);
        self.purge_unpaired_repeats(sig);
        self.assign_stack_repeats(sig, system, params);
    }

    /// First augmentation dot: a head or rest just left of the dot, in the
    /// same measure stack.
    fn late_first_augmentation(
        &mut self,
        sig: &mut Sig,
        system: &SystemInfo,
        symbols: &mut SystemSymbols,
        params: &Params,
    ) {
        let scale = system.scale;
        let rests = symbols.rests(sig).to_vec();
        for cand in &mut self.candidates {
            // A role already settled and rejected is not recreated.
            if cand.augmentation.is_some_and(|id| !sig.is_alive(id)) {
                continue;
            }
            let center = cand.glyph.center();
            let max_dx = system.profiled_pixels(params, 1.5);
            let max_dy = system.profiled_pixels(params, 0.75);
            let lu_box = Rect::new(center.x - max_dx, center.y - max_dy, max_dx, 2.0 * max_dy);

            let mut targets = sig.intersected_inters(&symbols.heads, &lu_box);
            targets.extend(sig.intersected_inters(&rests, &lu_box));
            filter_on_stack(sig, system, center, &mut targets);
            filter_mirror_heads(sig, &mut targets);

            let mut links = Vec::new();
            for target in targets {
                let tb = sig.inter(target).bounds;
                // The dot must stand clear of the note, on its right.
                let x_gap = center.x - tb.right();
                if x_gap <= 0.0 {
                    continue;
                }
                let x_frac = scale.pixels_to_frac(x_gap);
                let y_frac = scale.pixels_to_frac((tb.center().y - center.y).abs());
                if let Some(grade) =
                    RelationKind::Augmentation.score(x_frac, y_frac, params, system.profile)
                {
                    links.push(Link::new(target, RelationKind::Augmentation, grade, y_frac));
                }
            }
            if links.is_empty() {
                continue;
            }
            // One dot may augment a head and its time-slot neighbors at once;
            // the ambiguity is settled by the rhythm stage downstream.
            let id = *cand.augmentation.get_or_insert_with(|| {
                let mut inter =
                    Inter::new(InterKind::AugmentationDot, cand.grade, cand.glyph.bounds)
                        .with_shape(Shape::AugmentationDot)
                        .with_glyph(cand.glyph.id);
                inter.tracked = cand.glyph.tracked;
                sig.add_inter(inter)
            });
            link::apply_all(sig, id, &links);
        }
    }

    /// Second augmentation dot: another augmentation dot just to its left.
    fn late_second_augmentation(&mut self, sig: &mut Sig, system: &SystemInfo, params: &Params) {
        let scale = system.scale;
        for idx in 0..self.candidates.len() {
            let (center, bounds, own) = {
                let cand = &self.candidates[idx];
                (cand.glyph.center(), cand.glyph.bounds, cand.augmentation)
            };
            if own.is_some_and(|id| !sig.is_alive(id)) {
                continue;
            }
            let max_dx = system.profiled_pixels(params, 0.5);
            let max_dy = system.profiled_pixels(params, 0.2);
            let lu_box = Rect::new(center.x - max_dx, center.y - max_dy, max_dx, 2.0 * max_dy);

            let mut firsts = sig.inters_of_kind(InterKind::AugmentationDot);
            sig.sort_by_abscissa(&mut firsts);
            let mut links = Vec::new();
            for first in sig.intersected_inters(&firsts, &lu_box) {
                if Some(first) == own {
                    continue;
                }
                let fb = sig.inter(first).bounds;
                if fb.center().x >= center.x {
                    continue;
                }
                let x_frac = scale.pixels_to_frac((center.x - fb.center().x).max(0.0));
                let y_frac = scale.pixels_to_frac((fb.center().y - center.y).abs());
                if let Some(grade) =
                    RelationKind::DoubleDot.score(x_frac, y_frac, params, system.profile)
                {
                    links.push(Link::new(first, RelationKind::DoubleDot, grade, y_frac));
                }
            }
            let Some(best) = link::best_link(&links) else {
                continue;
            };

            let cand = &mut self.candidates[idx];
            let second = *cand.augmentation.get_or_insert_with(|| {
                let mut inter = Inter::new(InterKind::AugmentationDot, cand.grade, bounds)
                    .with_shape(Shape::AugmentationDot)
                    .with_glyph(cand.glyph.id);
                inter.tracked = cand.glyph.tracked;
                sig.add_inter(inter)
            });
            // A second dot augments the first dot, never the head directly.
            sig.remove_relations_of_kind(second, RelationKind::Augmentation);
            best.apply(sig, second);
        }
    }

    /// Fermata dot: a dot inside the hollow of a fermata arc.
    fn late_fermata(&mut self, sig: &mut Sig, system: &SystemInfo, params: &Params) {
        let scale = system.scale;
        let mut arcs = sig.inters_of_kind(InterKind::FermataArc);
        sig.sort_by_abscissa(&mut arcs);
        for cand in &mut self.candidates {
            if cand.fermata.is_some_and(|id| !sig.is_alive(id)) {
                continue;
            }
            let center = cand.glyph.center();
            let max_dx = system.profiled_pixels(params, 1.0);
            let max_dy = system.profiled_pixels(params, 1.0);
            let lu_box = cand.glyph.bounds.grown(max_dx, max_dy);

            let mut links = Vec::new();
            for arc in sig.intersected_inters(&arcs, &lu_box) {
                let inter = sig.inter(arc);
                let ab = inter.bounds;
                // The dot sits in the lower half of an arc, upper half of an
                // inverted arc.
                let y_target = match inter.shape {
                    Some(Shape::FermataArcBelow) => ab.y + 0.25 * ab.height,
                    _ => ab.y + 0.75 * ab.height,
                };
                let x_frac = scale.pixels_to_frac((ab.center().x - center.x).abs());
                let y_frac = scale.pixels_to_frac((y_target - center.y).abs());
                if let Some(grade) =
                    RelationKind::DotFermata.score(x_frac, y_frac, params, system.profile)
                {
                    links.push(Link::new(arc, RelationKind::DotFermata, grade, x_frac + y_frac));
                }
            }
            let Some(best) = link::best_link(&links) else {
                continue;
            };

            let id = *cand.fermata.get_or_insert_with(|| {
                let mut inter = Inter::new(InterKind::FermataDot, cand.grade, cand.glyph.bounds)
                    .with_shape(Shape::FermataDot)
                    .with_glyph(cand.glyph.id);
                inter.tracked = cand.glyph.tracked;
                sig.add_inter(inter)
            });
            best.apply(sig, id);
        }
    }

    /// Competing roles born from the same glyph exclude each other.
    fn cross_exclude_roles(&self, sig: &mut Sig) {
        for cand in &self.candidates {
            let alive: Vec<InterId> = cand.roles().filter(|&id| sig.is_alive(id)).collect();
            for (i, &a) in alive.iter().enumerate() {
                for &b in &alive[i + 1..] {
                    sig.add_exclusion(a, b);
                }
            }
        }
    }

    /// Pair repeat dots two by two, across the middle line.
    fn pair_repeats(&self, sig: &mut Sig, system: &SystemInfo) {
        let interline = system.scale.interline();
        let mut dots = sig.inters_of_kind(InterKind::RepeatDot);
        sig.sort_by_abscissa(&mut dots);

        let mut paired: HashSet<InterId> = HashSet::new();
        for (i, &dot) in dots.iter().enumerate() {
            if paired.contains(&dot) {
                continue;
            }
            let inter = sig.inter(dot);
            let Some(pitch) = inter.pitch else {
                continue;
            };
            // The partner sits two pitch steps across the middle line.
            let mut lu_box = inter.bounds;
            lu_box.y -= f64::from(pitch) * interline;
            let x_break = lu_box.right();

            for &other in &dots[i + 1..] {
                if paired.contains(&other) {
                    continue;
                }
                let ob = sig.inter(other).bounds;
                if ob.x > x_break {
                    break;
                }
                if sig.inter(other).pitch != Some(-pitch) || !ob.intersects(&lu_box) {
                    continue;
                }
                sig.add_relation(dot, other, RelationKind::RepeatDotPair, 1.0);
                paired.insert(dot);
                paired.insert(other);
                break;
            }
        }
    }

    /// A repeat dot without a partner was something else all along.
    fn purge_unpaired_repeats(&self, sig: &mut Sig) {
        for dot in sig.inters_of_kind(InterKind::RepeatDot) {
            if !sig.has_relation(dot, RelationKind::RepeatDotPair) {
                debug!(%dot, "unpaired repeat dot purged");
                sig.remove_inter(dot);
            }
        }
    }

    /// Confirm stack repeat sides once real plus virtual dots reach the
    /// quorum, counting the dots built into repeat-sign barlines as virtual.
    fn assign_stack_repeats(&self, sig: &mut Sig, system: &mut SystemInfo, params: &Params) {
        let quorum =
            (system.quorum_staff_count() as f64 * params.repeat_quorum_ratio).ceil() as usize;
        let quorum = quorum.max(1);
        let all_dots = sig.inters_of_kind(InterKind::RepeatDot);

        for stack in &mut system.stacks {
            for side in HSide::BOTH {
                let bars: HashSet<InterId> =
                    stack.bars(side).iter().copied().filter(|&b| sig.is_alive(b)).collect();
                if bars.is_empty() {
                    continue;
                }

                let mut virtual_dots = 0;
                for &bar in &bars {
                    if let Some(shape) = sig.inter(bar).shape {
                        virtual_dots += shape.virtual_repeat_dots(side) as usize;
                    }
                }

                let side_dots: Vec<InterId> = all_dots
                    .iter()
                    .copied()
                    .filter(|&dot| {
                        sig.is_alive(dot)
                            && sig
                                .relations_of_kind(dot, RelationKind::RepeatDotBar)
                                .iter()
                                .any(|&rid| bars.contains(&sig.opposite(rid, dot)))
                    })
                    .collect();
                let dot_count = side_dots.len() + virtual_dots;
                if dot_count < quorum {
                    continue;
                }

                debug!(stack = stack.id, ?side, dot_count, "repeat side confirmed");
                stack.add_repeat(side);

                // The confirmed dots own their area: competitors overlapping
                // them are removed outright.
                let keep: HashSet<InterId> = side_dots.iter().copied().chain(bars).collect();
                for &dot in &side_dots {
                    let lu_box = sig.inter(dot).bounds;
                    for loser in sig.overlapping_inters(&lu_box, &keep) {
                        sig.remove_inter(loser);
                    }
                }
            }
        }
    }
}

/// Keep only targets in the same measure stack as the dot.
fn filter_on_stack(
    sig: &Sig,
    system: &SystemInfo,
    dot_center: crate::model::Point,
    targets: &mut Vec<InterId>,
) {
    let dot_stack = system.stack_index_at(dot_center);
    targets.retain(|&t| system.stack_index_at(sig.inter(t).center()) == dot_stack);
}

/// When a head and its mirror both qualify, keep a single one: the longer
/// undotted chord duration wins, lower id on ties.
fn filter_mirror_heads(sig: &Sig, targets: &mut Vec<InterId>) {
    let set: HashSet<InterId> = targets.iter().copied().collect();
    let chord_duration = |head: InterId| {
        sig.inter(head)
            .chord
            .filter(|&c| sig.is_alive(c))
            .and_then(|c| sig.inter(c).duration)
            .unwrap_or(0.0)
    };
    targets.retain(|&t| match sig.inter(t).mirror {
        Some(m) if set.contains(&m) => {
            let (dt, dm) = (chord_duration(t), chord_duration(m));
            dt > dm || (dt == dm && t < m)
        }
        _ => true,
    });
}

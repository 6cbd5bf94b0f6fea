//! End-to-end tests for dot disambiguation: instant and late phases driven
//! through the factory, the way the engine drives them.

mod common;

use common::{barline, close_stack_right, dot_glyph, head_with_chord, single_staff_system};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use omr_symbols::factory::InterFactory;
use omr_symbols::{
    Evaluation, GlyphId, HSide, Inter, InterId, InterKind, Params, Rect, RelationKind, Shape, Sig,
    SystemInfo,
};

fn dot_eval() -> Evaluation {
    Evaluation { shape: Shape::Dot, grade: 0.8 }
}

fn feed_dot(
    factory: &mut InterFactory,
    sig: &mut Sig,
    system: &SystemInfo,
    id: u64,
    cx: f64,
    cy: f64,
) {
    let glyph = dot_glyph(id, cx, cy);
    let staff = system.closest_staff(glyph.center()).map(|s| s.id);
    factory.create(sig, system, dot_eval(), &glyph, staff);
}

/// Alive inters born from a given glyph.
fn inters_of_glyph(sig: &Sig, id: u64) -> Vec<InterId> {
    sig.inters_where(|i| i.glyph == Some(GlyphId(id)))
}

// ============================================================================
// 1. The late phase is idempotent
// ============================================================================

#[test]
fn late_phase_is_idempotent() {
    let mut system = single_staff_system();
    let mut sig = Sig::new();
    let bar = barline(&mut sig, 500.0, 100.0);
    close_stack_right(&mut system, &[bar]);
    head_with_chord(&mut sig, 370.0, 130.0);

    let params = Params::default();
    let mut factory = InterFactory::new(&params, &sig);
    // A repeat pair at the bar, an augmentation dot at the head.
    feed_dot(&mut factory, &mut sig, &system, 1, 490.0, 130.0);
    feed_dot(&mut factory, &mut sig, &system, 2, 490.0, 150.0);
    feed_dot(&mut factory, &mut sig, &system, 3, 390.0, 130.0);

    let snapshot = |sig: &Sig| {
        let mut state: Vec<(InterId, usize)> = sig
            .inters_where(|_| true)
            .into_iter()
            .map(|id| (id, sig.relations_of(id).len()))
            .collect();
        state.sort();
        state
    };

    factory.late_checks(&mut sig, &mut system);
    let first = snapshot(&sig);
    let repeats_first = system.stacks[0].is_repeat(HSide::Right);

    factory.late_checks(&mut sig, &mut system);
    assert_eq!(snapshot(&sig), first);
    assert_eq!(system.stacks[0].is_repeat(HSide::Right), repeats_first);
}

// ============================================================================
// 2. At most one role survives per dot glyph
// ============================================================================

#[test]
fn confirmed_repeat_wins_over_staccato() {
    let mut system = single_staff_system();
    let mut sig = Sig::new();
    let bar = barline(&mut sig, 500.0, 100.0);
    close_stack_right(&mut system, &[bar]);
    // A chord right below the dot pair, making the staccato reading viable.
    sig.add_inter(Inter::new(InterKind::HeadChord, 0.9, Rect::new(484.0, 160.0, 12.0, 35.0)));

    let params = Params::default();
    let mut factory = InterFactory::new(&params, &sig);
    feed_dot(&mut factory, &mut sig, &system, 1, 490.0, 130.0);
    feed_dot(&mut factory, &mut sig, &system, 2, 490.0, 150.0);
    // Both roles exist before the late phase.
    assert!(inters_of_glyph(&sig, 1).len() >= 2);

    factory.late_checks(&mut sig, &mut system);
    sig.reduce();

    for id in [1, 2] {
        let alive = inters_of_glyph(&sig, id);
        assert_eq!(alive.len(), 1, "glyph {id}");
        assert_eq!(sig.inter(alive[0]).kind, InterKind::RepeatDot);
    }
    assert!(system.stacks[0].is_repeat(HSide::Right));
}

#[test]
fn unpaired_repeat_leaves_staccato_standing() {
    let mut system = single_staff_system();
    let mut sig = Sig::new();
    let bar = barline(&mut sig, 500.0, 100.0);
    close_stack_right(&mut system, &[bar]);
    sig.add_inter(Inter::new(InterKind::HeadChord, 0.9, Rect::new(484.0, 160.0, 12.0, 35.0)));

    let params = Params::default();
    let mut factory = InterFactory::new(&params, &sig);
    // A single dot: the repeat reading can never find its partner.
    feed_dot(&mut factory, &mut sig, &system, 1, 490.0, 130.0);

    factory.late_checks(&mut sig, &mut system);
    sig.reduce();

    let alive = inters_of_glyph(&sig, 1);
    assert_eq!(alive.len(), 1);
    assert_eq!(sig.inter(alive[0]).kind, InterKind::Articulation);
    assert!(!system.stacks[0].is_repeat(HSide::Right));
}

// ============================================================================
// 3. Double augmentation dots
// ============================================================================

#[test]
fn second_dot_chains_to_the_first() {
    let mut system = single_staff_system();
    let mut sig = Sig::new();
    let (head, _) = head_with_chord(&mut sig, 370.0, 130.0);

    let params = Params::default();
    let mut factory = InterFactory::new(&params, &sig);
    feed_dot(&mut factory, &mut sig, &system, 1, 390.0, 130.0);
    feed_dot(&mut factory, &mut sig, &system, 2, 398.0, 130.0);
    factory.late_checks(&mut sig, &mut system);

    let first = inters_of_glyph(&sig, 1)[0];
    let second = inters_of_glyph(&sig, 2)[0];
    let aug = sig.relations_of_kind(first, RelationKind::Augmentation);
    assert_eq!(aug.len(), 1);
    assert_eq!(sig.opposite(aug[0], first), head);

    // The second dot augments the first dot, not the head.
    assert!(!sig.has_relation(second, RelationKind::Augmentation));
    let double = sig.relations_of_kind(second, RelationKind::DoubleDot);
    assert_eq!(double.len(), 1);
    assert_eq!(sig.opposite(double[0], second), first);
}

#[test]
fn distant_second_dot_stays_unresolved() {
    let mut system = single_staff_system();
    let mut sig = Sig::new();
    head_with_chord(&mut sig, 370.0, 130.0);

    let params = Params::default();
    let mut factory = InterFactory::new(&params, &sig);
    feed_dot(&mut factory, &mut sig, &system, 1, 390.0, 130.0);
    // 40 pixels behind the first dot: two interlines, far out of reach.
    feed_dot(&mut factory, &mut sig, &system, 2, 430.0, 130.0);
    factory.late_checks(&mut sig, &mut system);

    assert_eq!(inters_of_glyph(&sig, 1).len(), 1);
    assert!(inters_of_glyph(&sig, 2).is_empty());
}

// ============================================================================
// 4. Stack repeat quorum across staves
// ============================================================================

fn four_staff_setup(dotted_staves: usize) -> (SystemInfo, Sig, InterFactory<'static>) {
    let mut system = common::four_staff_system();
    let mut sig = Sig::new();
    let bars: Vec<InterId> =
        (0..4).map(|i| barline(&mut sig, 500.0, 100.0 + f64::from(i) * 200.0)).collect();
    close_stack_right(&mut system, &bars);

    let params: &'static Params = Box::leak(Box::new(Params::default()));
    let mut factory = InterFactory::new(params, &sig);
    let mut gid = 1u64;
    for staff in 0..dotted_staves {
        let middle = 140.0 + staff as f64 * 200.0;
        for dy in [-10.0, 10.0] {
            feed_dot(&mut factory, &mut sig, &system, gid, 490.0, middle + dy);
            gid += 1;
        }
    }
    (system, sig, factory)
}

#[test]
fn quorum_reached_confirms_the_repeat() {
    let (mut system, mut sig, mut factory) = four_staff_setup(4);
    factory.late_checks(&mut sig, &mut system);
    assert!(system.stacks[0].is_repeat(HSide::Right));
    assert_eq!(sig.inters_of_kind(InterKind::RepeatDot).len(), 8);
}

#[test]
fn dots_on_half_the_staves_reach_the_quorum() {
    // Two dotted staves give 4 paired dots: exactly the 4-staff quorum.
    let (mut system, mut sig, mut factory) = four_staff_setup(2);
    factory.late_checks(&mut sig, &mut system);
    assert!(system.stacks[0].is_repeat(HSide::Right));
    assert_eq!(sig.inters_of_kind(InterKind::RepeatDot).len(), 4);
}

#[test]
fn quorum_missed_leaves_no_repeat() {
    // A single pair is 2 dots, short of the 4-staff quorum.
    let (mut system, mut sig, mut factory) = four_staff_setup(1);
    factory.late_checks(&mut sig, &mut system);
    assert!(!system.stacks[0].is_repeat(HSide::Right));
}

#[test]
fn repeat_sign_barline_contributes_virtual_dots() {
    let mut system = common::four_staff_system();
    let mut sig = Sig::new();
    let mut bars: Vec<InterId> =
        (0..3).map(|i| barline(&mut sig, 500.0, 100.0 + f64::from(i) * 200.0)).collect();
    // The fourth staff carries a repeat-sign barline, dots built in.
    bars.push(sig.add_inter(
        Inter::new(InterKind::Barline, 0.9, Rect::new(500.0, 700.0, 10.0, 80.0))
            .with_shape(Shape::RightRepeatSign),
    ));
    close_stack_right(&mut system, &bars);

    let params = Params::default();
    let mut factory = InterFactory::new(&params, &sig);
    // A single real pair on the first staff.
    for (gid, dy) in [(1u64, -10.0), (2, 10.0)] {
        feed_dot(&mut factory, &mut sig, &system, gid, 490.0, 140.0 + dy);
    }
    factory.late_checks(&mut sig, &mut system);
    // 2 real dots + the sign's 2 built-in dots reach the 4-staff quorum.
    assert!(system.stacks[0].is_repeat(HSide::Right));
}

// ============================================================================
// 5. Pairing is unique and mutual, whatever the dot layout
// ============================================================================

proptest! {
    #[test]
    fn repeat_pairing_is_unique_and_mutual(
        columns in proptest::collection::vec((any::<bool>(), any::<bool>()), 1..5)
    ) {
        let mut system = single_staff_system();
        let mut sig = Sig::new();
        let bars: Vec<InterId> = columns
            .iter()
            .enumerate()
            .map(|(i, _)| barline(&mut sig, 150.0 + 200.0 * i as f64, 100.0))
            .collect();
        close_stack_right(&mut system, &bars);

        let params = Params::default();
        let mut factory = InterFactory::new(&params, &sig);
        let mut gid = 1u64;
        let mut complete_pairs = 0;
        for (i, &(top, bottom)) in columns.iter().enumerate() {
            let x = 140.0 + 200.0 * i as f64;
            if top {
                feed_dot(&mut factory, &mut sig, &system, gid, x, 130.0);
                gid += 1;
            }
            if bottom {
                feed_dot(&mut factory, &mut sig, &system, gid, x, 150.0);
                gid += 1;
            }
            if top && bottom {
                complete_pairs += 1;
            }
        }
        factory.late_checks(&mut sig, &mut system);

        let dots = sig.inters_of_kind(InterKind::RepeatDot);
        prop_assert_eq!(dots.len(), 2 * complete_pairs);
        for dot in dots {
            let rels = sig.relations_of_kind(dot, RelationKind::RepeatDotPair);
            prop_assert_eq!(rels.len(), 1);
            let partner = sig.opposite(rels[0], dot);
            prop_assert!(sig.is_alive(partner));
            let back = sig.relations_of_kind(partner, RelationKind::RepeatDotPair);
            prop_assert_eq!(back.len(), 1);
            prop_assert_eq!(sig.opposite(back[0], partner), dot);
        }
    }
}

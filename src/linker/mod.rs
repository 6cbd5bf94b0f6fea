//! # Symbol Linker
//!
//! Final per-system pass battery: connects the free-standing symbol inters
//! (dynamics, texts, pedals, wedges, fermatas, graces, octave shifts) to the
//! chords and barlines they qualify, folds confirmed augmentation dots into
//! chord durations, and converts or discards the numeric annotations.
//!
//! Passes run in fixed order. A failure on one inter is logged and skipped;
//! it never aborts the battery.

use tracing::{debug, warn};

use crate::factory::{chord_links, SystemSymbols};
use crate::link::{self, Link};
use crate::model::{Params, Rect, Shape};
use crate::sheet::SystemInfo;
use crate::sig::{Inter, InterId, InterKind, RelationKind, SentenceRole, Sig};
use crate::{Error, Result};

pub struct SymbolLinker<'a> {
    params: &'a Params,
}

impl<'a> SymbolLinker<'a> {
    pub fn new(params: &'a Params) -> Self {
        Self { params }
    }

    /// Run the whole battery on one system.
    pub fn process(&self, sig: &mut Sig, system: &mut SystemInfo, symbols: &mut SystemSymbols) {
        self.link_each(sig, system, symbols, InterKind::Dynamics, Self::link_dynamics);
        self.link_sentences(sig, system, symbols);
        self.link_each(sig, system, symbols, InterKind::Pedal, Self::link_pedal);
        self.link_each(sig, system, symbols, InterKind::Wedge, Self::link_wedge);
        self.link_fermatas(sig, system, symbols);
        self.link_each(sig, system, symbols, InterKind::GraceChord, Self::link_grace);
        self.harmonize_augmentations(sig, symbols);
        self.check_tuplets(sig, system);
        self.link_each(sig, system, symbols, InterKind::OctaveShift, Self::link_shift);
        self.convert_numbers(sig, system);
    }

    fn link_each(
        &self,
        sig: &mut Sig,
        system: &SystemInfo,
        symbols: &mut SystemSymbols,
        kind: InterKind,
        pass: fn(&Self, &mut Sig, &SystemInfo, &SystemSymbols, InterId) -> Result<()>,
    ) {
        for id in sig.inters_of_kind(kind) {
            if !sig.is_alive(id) {
                continue;
            }
            if let Err(err) = pass(self, sig, system, symbols, id) {
                warn!(%id, ?kind, %err, "linking failed");
            }
        }
    }

    // ========================================================================
    // Individual passes
    // ========================================================================

    /// Dynamics mark → the chord it plays under (or over).
    fn link_dynamics(
        &self,
        sig: &mut Sig,
        system: &SystemInfo,
        symbols: &SystemSymbols,
        id: InterId,
    ) -> Result<()> {
        if sig.has_relation(id, RelationKind::ChordDynamics) {
            return Ok(());
        }
        let bounds = sig.inter(id).bounds;
        let links = chord_links(
            sig,
            system,
            self.params,
            &symbols.chords,
            bounds,
            RelationKind::ChordDynamics,
        );
        link::apply_best(sig, id, &links);
        Ok(())
    }

    /// Text sentences, dispatched on their role.
    fn link_sentences(&self, sig: &mut Sig, system: &mut SystemInfo, symbols: &SystemSymbols) {
        let sentences = sig.inters_where(|i| matches!(i.kind, InterKind::Sentence(_)));
        for id in sentences {
            if !sig.is_alive(id) {
                continue;
            }
            let InterKind::Sentence(role) = sig.inter(id).kind else {
                continue;
            };
            let outcome = match role {
                SentenceRole::Lyric | SentenceRole::Direction => {
                    self.link_sentence_to_chord(sig, system, symbols, id, RelationKind::ChordSentence)
                }
                SentenceRole::ChordName => {
                    self.link_sentence_to_chord(sig, system, symbols, id, RelationKind::ChordName)
                }
                SentenceRole::EndingLabel => self.link_ending_label(sig, id),
                SentenceRole::PartName => self.link_part_name(sig, system, id),
            };
            if let Err(err) = outcome {
                warn!(%id, ?role, %err, "sentence linking failed");
            }
        }
    }

    fn link_sentence_to_chord(
        &self,
        sig: &mut Sig,
        system: &SystemInfo,
        symbols: &SystemSymbols,
        id: InterId,
        kind: RelationKind,
    ) -> Result<()> {
        let bounds = sig.inter(id).bounds;
        let links = chord_links(sig, system, self.params, &symbols.chords, bounds, kind);
        link::apply_best(sig, id, &links);
        Ok(())
    }

    /// An ending label belongs inside its ending bracket.
    fn link_ending_label(&self, sig: &mut Sig, id: InterId) -> Result<()> {
        let center = sig.inter(id).bounds.center();
        let ending = sig
            .inters_of_kind(InterKind::Ending)
            .into_iter()
            .find(|&e| {
                let eb = sig.inter(e).bounds;
                center.x >= eb.x && center.x < eb.right()
            })
            .ok_or_else(|| Error::Linking(format!("no ending hosts label {id}")))?;
        sig.add_relation(id, ending, RelationKind::EndingSentence, 1.0);
        Ok(())
    }

    /// A part name labels the part whose staff band it stands next to.
    fn link_part_name(&self, sig: &Sig, system: &mut SystemInfo, id: InterId) -> Result<()> {
        let center = sig.inter(id).bounds.center();
        let scale = system.scale;
        let mut best: Option<(usize, f64)> = None;
        for (idx, part) in system.parts.iter().enumerate() {
            let mut dist = f64::MAX;
            for &sid in &part.staves {
                let staff = system.staff(sid);
                let d = if center.y < staff.top {
                    staff.top - center.y
                } else {
                    (center.y - staff.bottom_y(&scale)).max(0.0)
                };
                dist = dist.min(d);
            }
            if best.map_or(true, |(_, bd)| dist < bd) {
                best = Some((idx, dist));
            }
        }
        let (idx, _) =
            best.ok_or_else(|| Error::Linking(format!("no part hosts name {id}")))?;
        system.parts[idx].name_sentence = Some(id);
        Ok(())
    }

    fn link_pedal(
        &self,
        sig: &mut Sig,
        system: &SystemInfo,
        symbols: &SystemSymbols,
        id: InterId,
    ) -> Result<()> {
        let bounds = sig.inter(id).bounds;
        let links = chord_links(
            sig,
            system,
            self.params,
            &symbols.chords,
            bounds,
            RelationKind::ChordPedal,
        );
        link::apply_best(sig, id, &links);
        Ok(())
    }

    /// A wedge is linked at both ends independently.
    fn link_wedge(
        &self,
        sig: &mut Sig,
        system: &SystemInfo,
        symbols: &SystemSymbols,
        id: InterId,
    ) -> Result<()> {
        let bounds = sig.inter(id).bounds;
        for (kind, end_box) in [
            (RelationKind::ChordWedgeLeft, end_box(&bounds, true)),
            (RelationKind::ChordWedgeRight, end_box(&bounds, false)),
        ] {
            let links = chord_links(sig, system, self.params, &symbols.chords, end_box, kind);
            link::apply_best(sig, id, &links);
        }
        Ok(())
    }

    /// Fermata arcs: a barline first, a chord second, oblivion third.
    fn link_fermatas(&self, sig: &mut Sig, system: &SystemInfo, symbols: &mut SystemSymbols) {
        let scale = system.scale;
        for id in sig.inters_of_kind(InterKind::FermataArc) {
            if !sig.is_alive(id) {
                continue;
            }
            let bounds = sig.inter(id).bounds;
            let center = bounds.center();

            let mut bar_links = Vec::new();
            for bar in symbols.bars(sig).to_vec() {
                if !sig.is_alive(bar) {
                    continue;
                }
                let bb = sig.inter(bar).bounds;
                let x_frac = scale.pixels_to_frac((bb.center().x - center.x).abs());
                let y_frac = scale.pixels_to_frac(crate::factory::vertical_gap(&bounds, &bb));
                if let Some(grade) =
                    RelationKind::FermataBar.score(x_frac, y_frac, self.params, system.profile)
                {
                    bar_links.push(Link::new(bar, RelationKind::FermataBar, grade, x_frac));
                }
            }
            if link::apply_best(sig, id, &bar_links).is_some() {
                continue;
            }

            let fallback = chord_links(
                sig,
                system,
                self.params,
                &symbols.chords,
                bounds,
                RelationKind::FermataChord,
            );
            if link::apply_best(sig, id, &fallback).is_some() {
                continue;
            }

            debug!(%id, "fermata arc holds nothing, removed");
            sig.remove_inter(id);
        }

        // A fermata dot whose arc just died has no reason to stay.
        for dot in sig.inters_of_kind(InterKind::FermataDot) {
            if !sig.has_relation(dot, RelationKind::DotFermata) {
                sig.remove_inter(dot);
            }
        }
    }

    /// A grace chord serves the head chord it ornaments: the slur decides
    /// when there is one, proximity otherwise.
    fn link_grace(
        &self,
        sig: &mut Sig,
        system: &SystemInfo,
        symbols: &SystemSymbols,
        id: InterId,
    ) -> Result<()> {
        if sig.has_relation(id, RelationKind::ChordGrace) {
            return Ok(());
        }

        // Slur route: grace head -- slur -- target head -- owning chord.
        let grace_heads =
            sig.inters_where(|i| i.kind == InterKind::Head && i.chord == Some(id));
        for head in &grace_heads {
            for rid in sig.relations_of_kind(*head, RelationKind::SlurHead) {
                let slur = sig.opposite(rid, *head);
                for rid2 in sig.relations_of_kind(slur, RelationKind::SlurHead) {
                    let other = sig.opposite(rid2, slur);
                    if other == *head {
                        continue;
                    }
                    if let Some(chord) = sig.inter(other).chord {
                        if sig.is_alive(chord) && chord != id {
                            sig.add_relation(id, chord, RelationKind::ChordGrace, 1.0);
                            return Ok(());
                        }
                    }
                }
            }
        }

        // Proximity route: the host stands right of the grace.
        let bounds = sig.inter(id).bounds;
        let links: Vec<Link> = chord_links(
            sig,
            system,
            self.params,
            &symbols.head_chords,
            bounds,
            RelationKind::ChordGrace,
        )
        .into_iter()
        .filter(|l| sig.inter(l.partner).bounds.center().x > bounds.center().x)
        .collect();
        link::apply_best(sig, id, &links);
        Ok(())
    }

    /// Fold surviving augmentation dots into chord durations: one dot makes
    /// a duration 1.5x, a double dot 1.75x.
    fn harmonize_augmentations(&self, sig: &mut Sig, symbols: &SystemSymbols) {
        for &chord in symbols.chords.iter().chain(symbols.head_chords.iter()) {
            if !sig.is_alive(chord) {
                continue;
            }
            let heads = sig.inters_where(|i| {
                matches!(i.kind, InterKind::Head | InterKind::Rest) && i.chord == Some(chord)
            });
            let mut dots = 0u32;
            for head in heads {
                for rid in sig.relations_of_kind(head, RelationKind::Augmentation) {
                    let dot = sig.opposite(rid, head);
                    if !sig.is_alive(dot) {
                        continue;
                    }
                    let chain = if sig.has_relation(dot, RelationKind::DoubleDot) { 2 } else { 1 };
                    dots = dots.max(chain);
                }
            }
            if dots == 0 {
                continue;
            }
            let factor = if dots == 1 { 1.5 } else { 1.75 };
            if let Some(base) = sig.inter(chord).duration {
                sig.inter_mut(chord).duration = Some(base * factor);
                debug!(%chord, dots, "chord duration dotted");
            }
        }
    }

    /// A tuplet sign with no chord left in its stack is noise.
    fn check_tuplets(&self, sig: &mut Sig, system: &SystemInfo) {
        for id in sig.inters_of_kind(InterKind::Tuplet) {
            let alive_partner = sig
                .relations_of_kind(id, RelationKind::ChordTuplet)
                .iter()
                .any(|&rid| sig.is_alive(sig.opposite(rid, id)));
            if alive_partner {
                continue;
            }
            let center = sig.inter(id).bounds.center();
            let stack = system.stack_index_at(center);
            let has_stack_chord = sig
                .inters_where(|i| {
                    matches!(i.kind, InterKind::HeadChord | InterKind::RestChord)
                })
                .into_iter()
                .any(|c| system.stack_index_at(sig.inter(c).center()) == stack);
            if !has_stack_chord {
                debug!(%id, "tuplet in an empty stack, removed");
                sig.remove_inter(id);
            }
        }
    }

    /// An octave shift is linked at both ends, like a wedge.
    fn link_shift(
        &self,
        sig: &mut Sig,
        system: &SystemInfo,
        symbols: &SystemSymbols,
        id: InterId,
    ) -> Result<()> {
        let bounds = sig.inter(id).bounds;
        for (kind, end_box) in [
            (RelationKind::ShiftChordLeft, end_box(&bounds, true)),
            (RelationKind::ShiftChordRight, end_box(&bounds, false)),
        ] {
            let links = chord_links(sig, system, self.params, &symbols.chords, end_box, kind);
            link::apply_best(sig, id, &links);
        }
        Ok(())
    }

    /// Numeric annotations: promoted to fingerings when the switch allows,
    /// dropped either way.
    fn convert_numbers(&self, sig: &mut Sig, system: &SystemInfo) {
        for id in sig.inters_of_kind(InterKind::Number) {
            let source = sig.inter(id).clone();
            if system.switches.fingerings {
                if let Some(Shape::Digit(value)) = source.shape {
                    let mut fingering =
                        Inter::new(InterKind::Fingering, source.grade, source.bounds)
                            .with_shape(Shape::Digit(value));
                    fingering.glyph = source.glyph;
                    fingering.staff = source.staff;
                    fingering.tracked = source.tracked;
                    sig.add_inter(fingering);
                }
            }
            sig.remove_inter(id);
        }
    }
}

/// Narrow probe box around the left or right extremity of a long symbol.
fn end_box(bounds: &Rect, left: bool) -> Rect {
    let width = (bounds.width * 0.2).max(1.0);
    let x = if left { bounds.x } else { bounds.right() - width };
    Rect::new(x, bounds.y, width, bounds.height)
}

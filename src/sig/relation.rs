//! Typed relations between inters, with gap-scored quality.
//!
//! A relation kind carries its own tolerance profile: maximum horizontal and
//! vertical gaps (interline fractions) and the minimum acceptable quality.
//! Kinds without a gap profile (pure structural pairings) always score 1.

use serde::{Deserialize, Serialize};

use crate::model::Params;

use super::inter::InterId;

/// Stable handle to a relation edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    /// Repeat dot ↔ adjacent barline.
    RepeatDotBar,
    /// The two dots of one repeat sign.
    RepeatDotPair,
    /// Augmentation dot → augmented head or rest.
    Augmentation,
    /// Second augmentation dot → first dot.
    DoubleDot,
    /// Fermata dot → fermata arc.
    DotFermata,
    /// Fermata → barline it holds.
    FermataBar,
    /// Fermata → chord it holds.
    FermataChord,
    /// Accidental → altered head.
    Alteration,
    /// Marker (coda, segno...) → staff barline.
    MarkerBar,
    /// Flag → owning chord.
    ChordFlag,
    /// Tuplet sign → embraced chord.
    ChordTuplet,
    /// Articulation → head chord.
    ChordArticulation,
    /// Ornament → head chord.
    ChordOrnament,
    /// Arpeggiato → head chord.
    ChordArpeggiato,
    /// Dynamics mark → chord.
    ChordDynamics,
    /// Sentence (lyric, direction) → chord.
    ChordSentence,
    /// Chord-name sentence → chord.
    ChordName,
    /// Ending label sentence → ending.
    EndingSentence,
    /// Pedal mark → chord.
    ChordPedal,
    /// Wedge left end → chord.
    ChordWedgeLeft,
    /// Wedge right end → chord.
    ChordWedgeRight,
    /// Grace chord → host head chord.
    ChordGrace,
    /// Slur end → head.
    SlurHead,
    /// Octave shift left end → chord.
    ShiftChordLeft,
    /// Octave shift right end → chord.
    ShiftChordRight,
}

impl RelationKind {
    /// Base (profile 0) gap ceilings, as (x, y) interline fractions.
    /// `None` means the kind is not gap-scored.
    fn base_gaps(self) -> Option<(f64, f64)> {
        use RelationKind::*;
        match self {
            RepeatDotBar => Some((1.0, 0.5)),
            Augmentation => Some((1.5, 0.75)),
            DoubleDot => Some((0.5, 0.2)),
            DotFermata => Some((1.0, 1.0)),
            FermataBar => Some((1.0, 6.0)),
            FermataChord => Some((1.5, 6.0)),
            Alteration => Some((2.0, 0.4)),
            MarkerBar => Some((2.0, 6.0)),
            ChordDynamics => Some((3.0, 8.0)),
            ChordPedal => Some((3.0, 10.0)),
            ChordWedgeLeft | ChordWedgeRight => Some((4.0, 10.0)),
            ChordGrace => Some((3.0, 4.0)),
            ShiftChordLeft | ShiftChordRight => Some((4.0, 10.0)),
            ChordSentence | ChordName => Some((6.0, 12.0)),
            ChordFlag => Some((0.5, 1.0)),
            ChordTuplet => Some((3.0, 4.0)),
            ChordArticulation => Some((0.5, 2.0)),
            ChordOrnament => Some((1.0, 3.0)),
            ChordArpeggiato => Some((0.5, 3.0)),
            RepeatDotPair | EndingSentence | SlurHead => None,
        }
    }

    /// Minimum acceptable quality for a gap-scored kind.
    pub fn min_grade(self) -> f64 {
        0.1
    }

    /// Kinds where a source inter may carry at most one such edge.
    pub fn single_per_source(self) -> bool {
        use RelationKind::*;
        matches!(
            self,
            RepeatDotPair
                | DoubleDot
                | Alteration
                | MarkerBar
                | FermataBar
                | FermataChord
                | ChordDynamics
                | ChordPedal
                | ChordGrace
                | ChordSentence
                | ChordName
                | EndingSentence
        )
    }

    /// Score the kind against measured gaps (interline fractions) under the
    /// given profile. Returns the quality grade, or `None` when a gap
    /// exceeds its ceiling or the grade falls below the kind minimum.
    pub fn score(self, x_gap: f64, y_gap: f64, params: &Params, profile: i32) -> Option<f64> {
        let Some((bx, by)) = self.base_gaps() else {
            return Some(1.0);
        };
        let max_x = params.profiled(bx, profile);
        let max_y = params.profiled(by, profile);
        if x_gap < 0.0 || y_gap < 0.0 || x_gap > max_x || y_gap > max_y {
            return None;
        }
        let grade = 1.0 - 0.5 * (x_gap / max_x + y_gap / max_y);
        (grade >= self.min_grade()).then_some(grade)
    }
}

/// A typed edge between two alive inters of the same sig.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub kind: RelationKind,
    pub src: InterId,
    pub dst: InterId,
    pub grade: f64,
    pub(crate) alive: bool,
}

/// Symmetric incompatibility edge, resolved by `Sig::reduce`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exclusion {
    pub a: InterId,
    pub b: InterId,
    pub(crate) alive: bool,
}

//! Inter: one typed interpretation hypothesis.

use serde::{Deserialize, Serialize};

use crate::model::{GlyphId, Rect, Shape};
use crate::sheet::StaffId;

/// Stable handle into the sig arena. Handles are never reused; removal
/// tombstones the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InterId(pub u32);

impl std::fmt::Display for InterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "inter#{}", self.0)
    }
}

/// Semantic role of a text sentence inter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SentenceRole {
    Lyric,
    Direction,
    PartName,
    ChordName,
    EndingLabel,
}

/// The interpretation kind, the primary tag for graph queries.
///
/// Kinds up to `Breath` are created by this engine; the structural kinds
/// below are placed by earlier pipeline stages and consumed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterKind {
    Clef,
    Key,
    Time,
    Flag,
    Rest,
    Tuplet,
    Accidental,
    Articulation,
    Ornament,
    Arpeggiato,
    Marker,
    FermataArc,
    FermataDot,
    RepeatDot,
    AugmentationDot,
    Dynamics,
    Wedge,
    Pedal,
    Fingering,
    Plucking,
    Fret,
    Breath,

    // Structural inters, pre-placed by earlier stages
    Barline,
    Head,
    Stem,
    Ledger,
    HeadChord,
    RestChord,
    GraceChord,
    Slur,
    Ending,
    OctaveShift,
    Sentence(SentenceRole),
    Number,
}

/// A typed hypothesis node.
///
/// Invariant: an alive inter belongs to exactly one sig. The sig alone flips
/// `alive`; everybody else treats it as read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inter {
    pub kind: InterKind,
    /// Classified shape, when the inter was born from a glyph evaluation.
    pub shape: Option<Shape>,
    /// Confidence in [0, 1], already scaled by the intrinsic ratio.
    pub grade: f64,
    pub glyph: Option<GlyphId>,
    pub bounds: Rect,
    pub staff: Option<StaffId>,
    /// Integer pitch position (half interline steps from the middle line),
    /// carried by repeat dots.
    pub pitch: Option<i32>,
    /// Mirror head (two voices sharing one notehead).
    pub mirror: Option<InterId>,
    /// Owning chord, for heads.
    pub chord: Option<InterId>,
    /// Undotted base duration in whole-note units, for chords.
    pub duration: Option<f64>,
    /// Routes this inter through targeted logging.
    pub tracked: bool,
    pub(crate) alive: bool,
}

impl Inter {
    pub fn new(kind: InterKind, grade: f64, bounds: Rect) -> Self {
        Self {
            kind,
            shape: None,
            grade,
            glyph: None,
            bounds,
            staff: None,
            pitch: None,
            mirror: None,
            chord: None,
            duration: None,
            tracked: false,
            alive: true,
        }
    }

    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.shape = Some(shape);
        self
    }

    pub fn with_glyph(mut self, glyph: GlyphId) -> Self {
        self.glyph = Some(glyph);
        self
    }

    pub fn with_staff(mut self, staff: StaffId) -> Self {
        self.staff = Some(staff);
        self
    }

    pub fn with_pitch(mut self, pitch: i32) -> Self {
        self.pitch = Some(pitch);
        self
    }

    pub fn with_chord(mut self, chord: InterId) -> Self {
        self.chord = Some(chord);
        self
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_mirror(mut self, mirror: InterId) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn tracked(mut self) -> Self {
        self.tracked = true;
        self
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn center(&self) -> crate::model::Point {
        self.bounds.center()
    }
}

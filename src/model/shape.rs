//! The closed set of notation shapes recognized by the engine.
//!
//! `Shape` is what the classifier oracle emits; `ShapeCategory` is what the
//! inter factory dispatches on. Keeping both as closed enums preserves
//! exhaustiveness checking when a new family is added.

use serde::{Deserialize, Serialize};

use super::geom::HSide;

/// A concrete notation shape, as reported by the shape classifier.
///
/// Structural shapes the engine does not classify itself (barlines, heads,
/// stems, ledgers) appear here only because already-placed inters carry them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shape {
    Clutter,

    // Dots. `Dot` is the raw classifier output; the refined dot shapes are
    // assigned by the dot resolver.
    Dot,
    RepeatDot,
    AugmentationDot,
    FermataDot,

    // Clefs
    GClef,
    GClefSmall,
    FClef,
    CClef,
    PercussionClef,

    // Key signatures: number of alterations
    KeySharps(u8),
    KeyFlats(u8),
    KeyCancel,

    // Time signatures
    TimeNumber(u8),
    TimeWhole { num: u8, den: u8 },
    CommonTime,
    CutTime,

    // Flags: count of flags on the stem
    FlagDown(u8),
    FlagUp(u8),
    SmallFlag,
    SmallFlagSlash,

    // Rests
    LongRest,
    BreveRest,
    WholeRest,
    HalfRest,
    QuarterRest,
    EighthRest,
    Rest16,
    Rest32,
    Rest64,
    Rest128,

    // Tuplet signs
    TupletThree,
    TupletSix,

    // Accidentals
    Flat,
    Natural,
    Sharp,
    DoubleSharp,
    DoubleFlat,

    // Articulations
    Accent,
    Tenuto,
    Staccato,
    Staccatissimo,
    StrongAccent,

    // Markers
    Coda,
    Segno,
    DalSegno,
    DaCapo,

    // Holds
    FermataArc,
    FermataArcBelow,
    Caesura,
    BreathMark,

    // Dynamics
    DynamicP,
    DynamicPp,
    DynamicMp,
    DynamicF,
    DynamicFf,
    DynamicMf,
    DynamicFp,
    DynamicSf,
    DynamicSfz,

    // Wedges
    Crescendo,
    Diminuendo,

    // Ornaments
    GraceNote,
    GraceNoteSlash,
    Trill,
    Turn,
    TurnInverted,
    TurnUp,
    TurnSlash,
    Mordent,
    MordentInverted,

    Arpeggiato,

    // Keyboard
    PedalMark,
    PedalUpMark,

    // Fingering digits 0..=5
    Digit(u8),

    // Plucking (p, i, m, a)
    PluckP,
    PluckI,
    PluckM,
    PluckA,

    // Fret romans I..=XII
    Roman(u8),

    // Structural shapes carried by already-placed inters
    ThinBarline,
    ThickBarline,
    DoubleBarline,
    FinalBarline,
    ReverseFinalBarline,
    LeftRepeatSign,
    RightRepeatSign,
    BackToBackRepeatSign,
}

/// Shape family, the unit of factory dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeCategory {
    Clutter,
    Dot,
    Clef,
    Key,
    Time,
    Flag,
    Rest,
    Tuplet,
    Accidental,
    Articulation,
    Marker,
    FermataArc,
    Breath,
    Dynamics,
    Wedge,
    Ornament,
    Arpeggiato,
    Pedal,
    Fingering,
    Plucking,
    Fret,
    Barline,
}

impl Shape {
    pub fn category(&self) -> ShapeCategory {
        use Shape::*;
        match self {
            Clutter => ShapeCategory::Clutter,

            Dot | RepeatDot | AugmentationDot | FermataDot => ShapeCategory::Dot,

            GClef | GClefSmall | FClef | CClef | PercussionClef => ShapeCategory::Clef,

            KeySharps(_) | KeyFlats(_) | KeyCancel => ShapeCategory::Key,

            TimeNumber(_) | TimeWhole { .. } | CommonTime | CutTime => ShapeCategory::Time,

            FlagDown(_) | FlagUp(_) | SmallFlag | SmallFlagSlash => ShapeCategory::Flag,

            LongRest | BreveRest | WholeRest | HalfRest | QuarterRest | EighthRest | Rest16
            | Rest32 | Rest64 | Rest128 => ShapeCategory::Rest,

            TupletThree | TupletSix => ShapeCategory::Tuplet,

            Flat | Natural | Sharp | DoubleSharp | DoubleFlat => ShapeCategory::Accidental,

            Accent | Tenuto | Staccato | Staccatissimo | StrongAccent => {
                ShapeCategory::Articulation
            }

            Coda | Segno | DalSegno | DaCapo => ShapeCategory::Marker,

            FermataArc | FermataArcBelow => ShapeCategory::FermataArc,

            Caesura | BreathMark => ShapeCategory::Breath,

            DynamicP | DynamicPp | DynamicMp | DynamicF | DynamicFf | DynamicMf | DynamicFp
            | DynamicSf | DynamicSfz => ShapeCategory::Dynamics,

            Crescendo | Diminuendo => ShapeCategory::Wedge,

            GraceNote | GraceNoteSlash | Trill | Turn | TurnInverted | TurnUp | TurnSlash
            | Mordent | MordentInverted => ShapeCategory::Ornament,

            Arpeggiato => ShapeCategory::Arpeggiato,

            PedalMark | PedalUpMark => ShapeCategory::Pedal,

            Digit(_) => ShapeCategory::Fingering,

            PluckP | PluckI | PluckM | PluckA => ShapeCategory::Plucking,

            Roman(_) => ShapeCategory::Fret,

            ThinBarline | ThickBarline | DoubleBarline | FinalBarline | ReverseFinalBarline
            | LeftRepeatSign | RightRepeatSign | BackToBackRepeatSign => ShapeCategory::Barline,
        }
    }

    pub fn is_dot_shaped(&self) -> bool {
        self.category() == ShapeCategory::Dot
    }

    /// Virtual repeat dots contributed by a whole-shape barline
    /// classification on the given stack side.
    ///
    /// A start-of-repeat sign carries its dots on the left side of the
    /// following stack, an end-of-repeat sign on the right side of the
    /// preceding stack, and a back-to-back sign on both.
    pub fn virtual_repeat_dots(&self, side: HSide) -> u32 {
        match (self, side) {
            (Shape::LeftRepeatSign, HSide::Left) => 2,
            (Shape::RightRepeatSign, HSide::Right) => 2,
            (Shape::BackToBackRepeatSign, _) => 2,
            _ => 0,
        }
    }
}

//! Engine tunables and processing switches.

use serde::{Deserialize, Serialize};

/// Feature switches controlling which optional families are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Switches {
    pub articulations: bool,
    pub fingerings: bool,
    pub pluckings: bool,
    pub frets: bool,
}

impl Default for Switches {
    fn default() -> Self {
        Self { articulations: true, fingerings: true, pluckings: false, frets: false }
    }
}

/// Engine tunables. All distances are interline fractions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// A dot glyph closer than this to a staff line or concrete ledger is
    /// rejected outright.
    pub min_staff_line_dist: f64,
    /// Maximum glyph-to-glyph gap for clustering connectivity.
    pub cluster_max_gap: f64,
    /// Largest connected set still decomposed into joint compounds.
    pub cluster_max_parts: usize,
    /// Geometric sanity bounds for a compound symbol.
    pub max_symbol_width: f64,
    pub max_symbol_height: f64,
    /// Classifier grades are scaled by this ratio before storage, so a
    /// classifier-born inter never reaches certainty on its own.
    pub intrinsic_ratio: f64,
    /// Evaluations below this raw grade are not considered.
    pub min_eval_grade: f64,
    /// Upper bound on evaluations requested per glyph.
    pub max_eval_count: usize,
    /// Inters at or above this final grade are considered good, e.g. for
    /// sample recording.
    pub good_grade: f64,
    /// Stack-repeat quorum: real + virtual dots must reach
    /// `ratio × non-tablature staff count`. The theoretically strict value
    /// would be 2.0; 1.0 trades precision for recall.
    pub repeat_quorum_ratio: f64,
    /// Gap widening per profile unit: effective gap = base × (1 + profile × factor).
    pub profile_factor: f64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            min_staff_line_dist: 0.3,
            cluster_max_gap: 0.5,
            cluster_max_parts: 3,
            max_symbol_width: 6.0,
            max_symbol_height: 8.0,
            intrinsic_ratio: 0.8,
            min_eval_grade: 0.1,
            max_eval_count: 10,
            good_grade: 0.5,
            repeat_quorum_ratio: 1.0,
            profile_factor: 0.25,
        }
    }
}

impl Params {
    /// Scale a base interline fraction by the system profile.
    pub fn profiled(&self, base: f64, profile: i32) -> f64 {
        base * (1.0 + f64::from(profile) * self.profile_factor)
    }
}

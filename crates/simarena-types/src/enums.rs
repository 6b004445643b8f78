//! Enumeration types for simarena simulations.
//!
//! All enums serialize in lowercase so the persisted document and the wire
//! format read `"en"`, `"deep"`, `"running"` rather than Rust variant names.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Language
// ---------------------------------------------------------------------------

/// The language prompts are rendered in and agents are asked to answer in.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum Language {
    /// English.
    #[default]
    En,
    /// Russian.
    Ru,
}

impl Language {
    /// Short language code, as used on the wire.
    pub const fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ru => "ru",
        }
    }
}

// ---------------------------------------------------------------------------
// Depth
// ---------------------------------------------------------------------------

/// Coarse preset controlling how long each generated turn may be.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum Depth {
    /// Short turns.
    Shallow,
    /// Moderate turns. Used when the request does not say.
    #[default]
    Medium,
    /// No cap on turn length.
    Deep,
}

// ---------------------------------------------------------------------------
// Simulation status
// ---------------------------------------------------------------------------

/// Lifecycle status of a simulation.
///
/// `Running` is the only non-terminal state. Once a run reaches
/// `Completed` or `Failed` it never changes again.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum SimulationStatus {
    /// The engine is still producing turns.
    #[default]
    Running,
    /// All rounds finished and a final result was recorded.
    Completed,
    /// A turn failed after retries; remaining turns were skipped.
    Failed,
}

impl SimulationStatus {
    /// Whether the status is final.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

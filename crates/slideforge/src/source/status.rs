//! Source lifecycle status and the legal transition table.

use serde::{Deserialize, Serialize};

/// Lifecycle status of an uploaded source.
///
/// Transitions are monotonic: once a source reaches a terminal status
/// (`Approved`, `Rejected`, `Failed`) no further transition is legal.
/// Soft deletion is an orthogonal flag on the row, not a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Pending,
    Processing,
    Approved,
    Rejected,
    Failed,
}

impl SourceStatus {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceStatus::Pending => "pending",
            SourceStatus::Processing => "processing",
            SourceStatus::Approved => "approved",
            SourceStatus::Rejected => "rejected",
            SourceStatus::Failed => "failed",
        }
    }

    /// Parses the storage representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SourceStatus::Pending),
            "processing" => Some(SourceStatus::Processing),
            "approved" => Some(SourceStatus::Approved),
            "rejected" => Some(SourceStatus::Rejected),
            "failed" => Some(SourceStatus::Failed),
            _ => None,
        }
    }

    /// True for statuses that admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SourceStatus::Approved | SourceStatus::Rejected | SourceStatus::Failed
        )
    }

    /// The legal edges of the state machine.
    pub fn can_transition_to(&self, next: SourceStatus) -> bool {
        match (self, next) {
            (SourceStatus::Pending, SourceStatus::Processing) => true,
            (SourceStatus::Processing, SourceStatus::Approved) => true,
            (SourceStatus::Processing, SourceStatus::Rejected) => true,
            (SourceStatus::Processing, SourceStatus::Failed) => true,
            // Extraction can fail before a reviewer ever sees the source.
            (SourceStatus::Pending, SourceStatus::Failed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Harvest lifecycle definitions
///
/// A harvest moves `Init -> Probing -> Dispatching <-> Collecting` and ends in
/// exactly one of the terminal phases `Complete`, `Capped` or `Aborted`.
use std::fmt;

/// Represents the current phase of a harvest session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HarvestPhase {
    // ===== Active Phases =====
    /// Session created, nothing fetched yet
    Init,

    /// Fetching cursor 0 to learn the total volume
    Probing,

    /// Handing cursors to free worker slots
    Dispatching,

    /// Waiting for the next in-flight fetch to settle
    Collecting,

    // ===== Terminal Phases =====
    /// The stream was exhausted (empty page or every known page drained)
    Complete,

    /// The record cap was reached and the table truncated to it
    Capped,

    /// The probe failed or the consecutive-failure threshold was hit
    Aborted,
}

impl HarvestPhase {
    /// Returns true if this is a terminal phase
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Capped | Self::Aborted)
    }

    /// Returns true if moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: HarvestPhase) -> bool {
        use HarvestPhase::*;
        match (self, next) {
            (Init, Probing) => true,
            (Probing, Dispatching) => true,
            (Dispatching, Collecting) | (Collecting, Dispatching) => true,
            (Probing | Dispatching | Collecting, Complete | Capped | Aborted) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Probing => "probing",
            Self::Dispatching => "dispatching",
            Self::Collecting => "collecting",
            Self::Complete => "complete",
            Self::Capped => "capped",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for HarvestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal status of a finished harvest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HarvestStatus {
    Complete,
    Capped,
    Aborted,
}

impl HarvestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Complete => "COMPLETE",
            Self::Capped => "CAPPED",
            Self::Aborted => "ABORTED",
        }
    }

    /// Returns true if the harvest stopped without hitting the failure threshold
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Aborted)
    }
}

impl From<HarvestStatus> for HarvestPhase {
    fn from(status: HarvestStatus) -> Self {
        match status {
            HarvestStatus::Complete => Self::Complete,
            HarvestStatus::Capped => Self::Capped,
            HarvestStatus::Aborted => Self::Aborted,
        }
    }
}

impl fmt::Display for HarvestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

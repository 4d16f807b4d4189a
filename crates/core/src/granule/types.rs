//! Core work unit types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::name::{scene_date_from_name, short_id, strip_safe_suffix};

/// Tracking status of a work unit.
///
/// State machine flow:
/// ```text
/// Unknown -> Unsubmitted -> Submitted -> Localized
///                               |
///                               v
///                             Failed
///
/// Any state can be overridden to Blacklisted by an operator.
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    /// Newly discovered, never looked at.
    #[default]
    Unknown,
    /// Known to need a remote job.
    Unsubmitted,
    /// A remote job is in flight.
    Submitted,
    /// Output product is present on local storage (terminal).
    Localized,
    /// Remote job failed (terminal, not retried).
    Failed,
    /// Excluded by an operator (terminal).
    Blacklisted,
}

impl UnitStatus {
    /// Returns true if no further automatic transitions happen from this state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UnitStatus::Localized | UnitStatus::Failed | UnitStatus::Blacklisted
        )
    }

    /// Returns true if the unit is waiting to be submitted.
    pub fn is_pending(&self) -> bool {
        matches!(self, UnitStatus::Unknown | UnitStatus::Unsubmitted)
    }

    /// Returns true if the unit still has work outstanding.
    pub fn is_open(&self) -> bool {
        self.is_pending() || *self == UnitStatus::Submitted
    }

    /// Returns true if the tracker may move a unit from this state to `to`.
    ///
    /// Blacklisted is never left. Submission and failure need a unit that is
    /// still open; anything else may be promoted to localized or blacklisted.
    pub fn can_transition_to(&self, to: UnitStatus) -> bool {
        if *self == UnitStatus::Blacklisted || (*self == to && to != UnitStatus::Submitted) {
            return false;
        }
        match to {
            UnitStatus::Unknown | UnitStatus::Unsubmitted => self.is_pending(),
            UnitStatus::Submitted | UnitStatus::Failed => self.is_open(),
            UnitStatus::Localized | UnitStatus::Blacklisted => true,
        }
    }

    /// Returns the status as a string (for logs and metrics labels).
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitStatus::Unknown => "unknown",
            UnitStatus::Unsubmitted => "unsubmitted",
            UnitStatus::Submitted => "submitted",
            UnitStatus::Localized => "localized",
            UnitStatus::Failed => "failed",
            UnitStatus::Blacklisted => "blacklisted",
        }
    }

    /// All statuses, in lifecycle order.
    pub fn all() -> [UnitStatus; 6] {
        [
            UnitStatus::Unknown,
            UnitStatus::Unsubmitted,
            UnitStatus::Submitted,
            UnitStatus::Localized,
            UnitStatus::Failed,
            UnitStatus::Blacklisted,
        ]
    }
}

impl std::fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single catalog scene.
#[derive(Debug, Clone)]
pub struct Granule {
    /// Full catalog name, without any `.SAFE` suffix.
    pub name: String,
    /// Last four characters of the name.
    pub id: String,
    /// Acquisition timestamp.
    pub scene_date: DateTime<Utc>,
    pub status: UnitStatus,
    /// Remote job identifier, set once submitted.
    pub job_id: Option<String>,
}

impl Granule {
    /// Create a granule with an explicit acquisition date.
    pub fn new(name: impl AsRef<str>, scene_date: DateTime<Utc>) -> Self {
        let name = strip_safe_suffix(name.as_ref()).to_string();
        Self {
            id: short_id(&name),
            name,
            scene_date,
            status: UnitStatus::Unknown,
            job_id: None,
        }
    }

    /// Create a granule, taking the acquisition date from the name itself.
    ///
    /// Returns `None` when the name carries no parseable date.
    pub fn from_name(name: impl AsRef<str>) -> Option<Self> {
        let date = scene_date_from_name(name.as_ref())?;
        Some(Self::new(name, date))
    }

    /// Set the status.
    pub fn with_status(mut self, status: UnitStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the remote job identifier.
    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }
}

impl PartialEq for Granule {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Granule {}

/// A primary/secondary scene pair processed as one derived-product job.
#[derive(Debug, Clone)]
pub struct GranulePair {
    pub primary: Granule,
    pub secondary: Granule,
    pub status: UnitStatus,
    pub job_id: Option<String>,
}

impl GranulePair {
    /// Create a pair in the `Unknown` state.
    ///
    /// The constituent granules keep their own status; the pair tracks its own.
    pub fn new(primary: Granule, secondary: Granule) -> Self {
        Self {
            primary,
            secondary,
            status: UnitStatus::Unknown,
            job_id: None,
        }
    }

    /// Set the status.
    pub fn with_status(mut self, status: UnitStatus) -> Self {
        self.status = status;
        self
    }
}

impl PartialEq for GranulePair {
    fn eq(&self, other: &Self) -> bool {
        self.primary == other.primary && self.secondary == other.secondary
    }
}

impl Eq for GranulePair {}

/// Identity of a work unit, as used for deduplication and lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UnitKey {
    Granule(String),
    Pair(String, String),
}

impl std::fmt::Display for UnitKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnitKey::Granule(id) => write!(f, "{}", id),
            UnitKey::Pair(primary, secondary) => write!(f, "{}_{}", primary, secondary),
        }
    }
}

/// Anything the tracker can submit and follow: a single scene or a scene pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkUnit {
    Granule(Granule),
    Pair(GranulePair),
}

impl WorkUnit {
    /// Identity key.
    pub fn key(&self) -> UnitKey {
        match self {
            WorkUnit::Granule(g) => UnitKey::Granule(g.id.clone()),
            WorkUnit::Pair(p) => UnitKey::Pair(p.primary.id.clone(), p.secondary.id.clone()),
        }
    }

    pub fn status(&self) -> UnitStatus {
        match self {
            WorkUnit::Granule(g) => g.status,
            WorkUnit::Pair(p) => p.status,
        }
    }

    pub fn set_status(&mut self, status: UnitStatus) {
        match self {
            WorkUnit::Granule(g) => g.status = status,
            WorkUnit::Pair(p) => p.status = status,
        }
    }

    pub fn job_id(&self) -> Option<&str> {
        match self {
            WorkUnit::Granule(g) => g.job_id.as_deref(),
            WorkUnit::Pair(p) => p.job_id.as_deref(),
        }
    }

    pub fn set_job_id(&mut self, job_id: Option<String>) {
        match self {
            WorkUnit::Granule(g) => g.job_id = job_id,
            WorkUnit::Pair(p) => p.job_id = job_id,
        }
    }

    /// Human-readable name for logs.
    pub fn display_name(&self) -> String {
        match self {
            WorkUnit::Granule(g) => g.name.clone(),
            WorkUnit::Pair(p) => format!("{} / {}", p.primary.name, p.secondary.name),
        }
    }

    /// Date used for chronological ordering (primary date for pairs).
    pub fn sort_date(&self) -> DateTime<Utc> {
        match self {
            WorkUnit::Granule(g) => g.scene_date,
            WorkUnit::Pair(p) => p.primary.scene_date,
        }
    }

    /// The scenes this unit is built from.
    pub fn granules(&self) -> Vec<&Granule> {
        match self {
            WorkUnit::Granule(g) => vec![g],
            WorkUnit::Pair(p) => vec![&p.primary, &p.secondary],
        }
    }

    pub fn as_pair(&self) -> Option<&GranulePair> {
        match self {
            WorkUnit::Pair(p) => Some(p),
            WorkUnit::Granule(_) => None,
        }
    }

    /// Unit kind as a string.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkUnit::Granule(_) => "granule",
            WorkUnit::Pair(_) => "granule_pair",
        }
    }
}

impl From<Granule> for WorkUnit {
    fn from(granule: Granule) -> Self {
        WorkUnit::Granule(granule)
    }
}

impl From<GranulePair> for WorkUnit {
    fn from(pair: GranulePair) -> Self {
        WorkUnit::Pair(pair)
    }
}

//! Stage, context and target enums

use crate::{IdentityError, Timestamp, VersionNumber};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// STAGE
// ============================================================================

/// A physical stage a record can be written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Editable copy.
    Draft,
    /// Published, externally visible copy.
    Live,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Draft => "Draft",
            Stage::Live => "Live",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// STAGE CONTEXT
// ============================================================================

/// Which view of the store a read goes against.
///
/// `Archive` reconstructs every record as it stood at the given moment: the
/// latest historical version written at or before that time, minus records
/// already tombstoned by then.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum StageContext {
    #[default]
    Draft,
    Live,
    Archive(Timestamp),
}

impl StageContext {
    /// The physical stage behind this context, `None` for archive reads.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            StageContext::Draft => Some(Stage::Draft),
            StageContext::Live => Some(Stage::Live),
            StageContext::Archive(_) => None,
        }
    }

    pub fn archive_date(&self) -> Option<Timestamp> {
        match self {
            StageContext::Archive(at) => Some(*at),
            _ => None,
        }
    }
}

impl From<Stage> for StageContext {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Draft => StageContext::Draft,
            Stage::Live => StageContext::Live,
        }
    }
}

impl fmt::Display for StageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageContext::Draft => f.write_str("Stage.Draft"),
            StageContext::Live => f.write_str("Stage.Live"),
            StageContext::Archive(at) => write!(f, "Archive.{}", at.to_rfc3339()),
        }
    }
}

// ============================================================================
// ROLLBACK TARGET
// ============================================================================

/// Where a rollback restores a record from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RollbackTarget {
    /// A specific historical version.
    Version(VersionNumber),
    /// Whatever is currently published. Discards draft changes.
    Live,
}

impl fmt::Display for RollbackTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollbackTarget::Version(version) => write!(f, "{}", version),
            RollbackTarget::Live => f.write_str("Live"),
        }
    }
}

impl FromStr for RollbackTarget {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("live") {
            return Ok(RollbackTarget::Live);
        }
        match trimmed.parse::<VersionNumber>() {
            Ok(version) if version > 0 => Ok(RollbackTarget::Version(version)),
            _ => Err(IdentityError::InvalidRollbackTarget {
                value: s.to_string(),
            }),
        }
    }
}

// ============================================================================
// PUBLISH ENUMS
// ============================================================================

/// How the storage engine should publish a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PublishMode {
    /// Copy the current draft version to Live.
    #[default]
    Existing,
    /// Write a fresh historical version from the draft content and point both
    /// Draft and Live at it, in one step.
    NewVersion,
}

impl PublishMode {
    pub fn is_new_version(&self) -> bool {
        matches!(self, PublishMode::NewVersion)
    }
}

/// What a publish reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PublishSource {
    Stage(Stage),
    Version(VersionNumber),
}

impl Default for PublishSource {
    fn default() -> Self {
        PublishSource::Stage(Stage::Draft)
    }
}

impl fmt::Display for PublishSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishSource::Stage(stage) => write!(f, "{}", stage),
            PublishSource::Version(version) => write!(f, "version {}", version),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

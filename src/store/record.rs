//! Lease record body and age helpers.

use crate::error::{CadlockError, Result};
use crate::resource::{Owner, ResourceId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// How a lease came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Explicitly requested by the user (`cadlock acquire`, `cadlock open`).
    Manual,
    /// Created because the resource was detected as open on the owner's host.
    #[serde(rename = "auto")]
    AutoDetected,
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Origin::Manual => write!(f, "manual"),
            Origin::AutoDetected => write!(f, "auto"),
        }
    }
}

/// A persisted claim of ownership over one resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseRecord {
    /// The resource path, exactly as the owner saw it.
    pub resource: ResourceId,

    /// Who holds the lease.
    pub owner: Owner,

    /// When the lease was first written.
    pub created_at: DateTime<Utc>,

    /// When the owner last confirmed the lease.
    pub last_renewed_at: DateTime<Utc>,

    /// Provenance of the lease.
    pub origin: Origin,

    /// Fields written by other versions, carried through rewrites untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl LeaseRecord {
    /// Create a fresh record stamped with the current time.
    pub fn new(resource: ResourceId, owner: Owner, origin: Origin) -> Self {
        let now = Utc::now();
        Self {
            resource,
            owner,
            created_at: now,
            last_renewed_at: now,
            origin,
            extra: BTreeMap::new(),
        }
    }

    /// Parse a record body.
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| CadlockError::RecordCorrupt(format!("invalid lease record: {}", e)))
    }

    /// Serialize the record body.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            CadlockError::UserError(format!("failed to serialize lease record: {}", e))
        })
    }

    /// Advance `last_renewed_at` to now, strictly past its previous value.
    pub fn touch(&mut self) {
        let floor = self.last_renewed_at + Duration::microseconds(1);
        self.last_renewed_at = Utc::now().max(floor);
    }

    /// Time since the last renewal.
    pub fn age(&self) -> Duration {
        Utc::now().signed_duration_since(self.last_renewed_at)
    }

    /// Whether the record is a reclamation candidate for `max_age`.
    pub fn is_stale(&self, max_age: Duration) -> bool {
        is_stale(self.age(), max_age)
    }
}

/// Staleness rule shared by records and corrupt files.
///
/// Only an age strictly greater than `max_age` is stale, so a record stamped
/// now, or slightly in the future by a host with a fast clock, is never stale.
pub fn is_stale(age: Duration, max_age: Duration) -> bool {
    age > max_age
}

/// Format an age as a short human-readable string.
pub fn format_age(age: Duration) -> String {
    let minutes = age.num_minutes();
    let hours = age.num_hours();
    let days = age.num_days();

    if days > 0 {
        format!("{}d {}h", days, hours % 24)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes % 60)
    } else if minutes > 0 {
        format!("{}m", minutes)
    } else {
        format!("{}s", age.num_seconds().max(0))
    }
}

//! Creation/modification timestamps embedded in aggregates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit timestamps carried by every persisted aggregate.
///
/// `updated_at` stays `None` until the first mutation after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStamp {
    /// When the aggregate was created.
    pub created_at: DateTime<Utc>,

    /// When the aggregate was last modified, if ever.
    pub updated_at: Option<DateTime<Utc>>,
}

impl AuditStamp {
    /// Creates a stamp for a freshly created aggregate.
    pub fn now() -> Self {
        Self {
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    /// Restores a stamp from stored timestamps.
    pub fn from_stored(created_at: DateTime<Utc>, updated_at: Option<DateTime<Utc>>) -> Self {
        Self {
            created_at,
            updated_at,
        }
    }

    /// Records a modification.
    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}

impl Default for AuditStamp {
    fn default() -> Self {
        Self::now()
    }
}

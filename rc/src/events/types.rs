//! Lifecycle event types
//!
//! These are the profile-level notifications that can make the cached
//! top-sites data stale:
//! - Account lifecycle (sign in, sign out, re-auth)
//! - Sync lifecycle (a sync pass finished)
//! - Data removal (history / private data cleared)

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of a lifecycle notification - the subscription key on the bus
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    /// The signed-in account changed
    AccountChanged,
    /// A profile sync pass finished
    SyncFinished,
    /// History / private data was cleared
    PrivateDataCleared,
    /// Any other named notification
    Other(String),
}

impl EventKind {
    /// Get the wire name of this kind
    pub fn name(&self) -> &str {
        match self {
            EventKind::AccountChanged => "account-changed",
            EventKind::SyncFinished => "sync-finished",
            EventKind::PrivateDataCleared => "private-data-cleared",
            EventKind::Other(name) => name,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EventKind {
    type Err = Infallible;

    /// Parse a wire name; unknown names become [`EventKind::Other`]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.trim().to_lowercase().replace('_', "-").as_str() {
            "account-changed" => EventKind::AccountChanged,
            "sync-finished" => EventKind::SyncFinished,
            "private-data-cleared" => EventKind::PrivateDataCleared,
            _ => EventKind::Other(s.trim().to_string()),
        };
        Ok(kind)
    }
}

/// A single emitted notification
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Notification {
    /// Unique notification ID (UUIDv7, time ordered)
    pub id: Uuid,
    pub kind: EventKind,
    pub emitted_at: DateTime<Utc>,
}

impl Notification {
    /// Create a notification stamped with the current time
    pub fn new(kind: EventKind) -> Self {
        Self {
            id: Uuid::now_v7(),
            kind,
            emitted_at: Utc::now(),
        }
    }
}

//! Infrastructure status with append-only history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfraStatus {
    ChangesPending,
    Ready,
    Error,
}

impl fmt::Display for InfraStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InfraStatus::ChangesPending => write!(f, "changes_pending"),
            InfraStatus::Ready => write!(f, "ready"),
            InfraStatus::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: InfraStatus,
    pub at: DateTime<Utc>,
}

/// Status rows plus a cached pointer to the newest one.
///
/// Both live in the owning record, so one save persists them together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistory {
    last_status: Option<InfraStatus>,
    entries: Vec<StatusEntry>,
}

impl StatusHistory {
    pub fn push(&mut self, status: InfraStatus) {
        self.entries.push(StatusEntry {
            status,
            at: Utc::now(),
        });
        self.last_status = Some(status);
    }

    pub fn last(&self) -> Option<InfraStatus> {
        self.last_status
    }

    pub fn is_ready(&self) -> bool {
        self.last_status == Some(InfraStatus::Ready)
    }

    pub fn entries(&self) -> &[StatusEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_status_tracks_newest_entry() {
        let mut history = StatusHistory::default();
        assert_eq!(history.last(), None);
        assert!(!history.is_ready());

        history.push(InfraStatus::ChangesPending);
        history.push(InfraStatus::Ready);
        history.push(InfraStatus::ChangesPending);

        assert_eq!(history.last(), Some(InfraStatus::ChangesPending));
        assert_eq!(history.entries().len(), 3);
        assert_eq!(history.entries()[1].status, InfraStatus::Ready);
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&InfraStatus::ChangesPending).unwrap();
        assert_eq!(json, "\"changes_pending\"");
        assert_eq!(InfraStatus::Error.to_string(), "error");
    }
}

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of one backup run. The store may hold statuses this build does not
/// know about; those are carried through as `Other` so status histograms stay
/// complete.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BackupStatus {
    Running,
    Completed,
    Failed,
    Canceled,
    Other(String),
}

impl BackupStatus {
    pub fn as_str(&self) -> &str {
        match self {
            BackupStatus::Running => "running",
            BackupStatus::Completed => "completed",
            BackupStatus::Failed => "failed",
            BackupStatus::Canceled => "canceled",
            BackupStatus::Other(s) => s,
        }
    }
}

impl From<String> for BackupStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "running" => BackupStatus::Running,
            "completed" => BackupStatus::Completed,
            "failed" => BackupStatus::Failed,
            "canceled" => BackupStatus::Canceled,
            _ => BackupStatus::Other(s),
        }
    }
}

impl From<&str> for BackupStatus {
    fn from(s: &str) -> Self {
        BackupStatus::from(s.to_string())
    }
}

impl From<BackupStatus> for String {
    fn from(status: BackupStatus) -> Self {
        status.as_str().to_string()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    pub id: Uuid,
    pub org_id: Uuid,
    pub agent_id: Uuid,
    pub schedule_id: Option<Uuid>,
    pub repository_id: Option<Uuid>,
    pub status: BackupStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub size_bytes: Option<i64>,
    pub files_new: Option<i64>,
    pub files_changed: Option<i64>,
    pub error_message: Option<String>,
}

impl Backup {
    /// Wall-clock run time, present only when both start and completion are recorded.
    pub fn duration(&self) -> Option<Duration> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

/// Store-side counts backing the dashboard header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupCounts {
    pub total: i64,
    pub running: i64,
    pub failed_24h: i64,
}

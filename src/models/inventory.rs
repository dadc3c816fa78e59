use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A backup storage destination.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    pub kind: String, // local, s3, b2, sftp, ...
    pub created_at: DateTime<Utc>,
}

/// A recurring backup job definition.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: Uuid,
    pub org_id: Uuid,
    pub agent_id: Uuid,
    pub repository_id: Option<Uuid>,
    pub name: String,
    pub cron_expression: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

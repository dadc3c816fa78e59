//! Classification and accumulation rules shared by every metrics pipeline.
//!
//! The collector, the daily aggregator and the Prometheus scrape all fold the
//! same rows: agents are split by status, backups are counted by status with
//! null-safe size and duration sums. Keeping the rules here means a backup is
//! classified identically whichever view it ends up in.

use std::collections::{BTreeMap, HashSet};

use uuid::Uuid;

use crate::models::agent::{Agent, AgentStatus};
use crate::models::backup::{Backup, BackupStatus};

/// Upper bounds, in seconds, of the backup duration histogram buckets.
pub const DURATION_BUCKETS: [f64; 8] = [
    60.0, 300.0, 600.0, 1800.0, 3600.0, 7200.0, 14400.0, 28800.0,
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgentTally {
    pub total: i64,
    /// Status `active`.
    pub online: i64,
    /// Status `offline`. Pending and disabled agents only count towards `total`.
    pub offline: i64,
}

impl AgentTally {
    pub fn add(&mut self, agent: &Agent) {
        self.total += 1;
        match agent.status {
            AgentStatus::Active => self.online += 1,
            AgentStatus::Offline => self.offline += 1,
            _ => {}
        }
    }
}

pub fn tally_agents<'a>(agents: impl IntoIterator<Item = &'a Agent>) -> AgentTally {
    let mut tally = AgentTally::default();
    for agent in agents {
        tally.add(agent);
    }
    tally
}

/// Cumulative duration histogram: `buckets[i]` counts every sample `<= DURATION_BUCKETS[i]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DurationHistogram {
    pub buckets: [i64; DURATION_BUCKETS.len()],
    pub sum: f64,
    pub count: i64,
}

impl DurationHistogram {
    pub fn observe(&mut self, seconds: f64) {
        for (bucket, bound) in self.buckets.iter_mut().zip(DURATION_BUCKETS) {
            if seconds <= bound {
                *bucket += 1;
            }
        }
        self.sum += seconds;
        self.count += 1;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackupTally {
    pub total: i64,
    /// Status `completed`.
    pub successful: i64,
    /// Status `failed`.
    pub failed: i64,
    /// Sum of `size_bytes` over completed backups; a missing size adds nothing.
    pub completed_size_bytes: i64,
    /// Durations are summed for every backup with both timestamps, whatever its status.
    /// Each contribution is truncated to whole milliseconds before summing.
    pub duration_millis: i64,
    /// As `duration_millis`, truncated to whole seconds per backup.
    pub duration_secs: i64,
    pub histogram: DurationHistogram,
    pub by_status: BTreeMap<String, i64>,
    pub agents: HashSet<Uuid>,
}

impl BackupTally {
    pub fn add(&mut self, backup: &Backup) {
        self.total += 1;
        *self
            .by_status
            .entry(backup.status.as_str().to_string())
            .or_insert(0) += 1;
        self.agents.insert(backup.agent_id);

        match backup.status {
            BackupStatus::Completed => {
                self.successful += 1;
                self.completed_size_bytes += backup.size_bytes.unwrap_or(0);
            }
            BackupStatus::Failed => self.failed += 1,
            _ => {}
        }

        if let Some(duration) = backup.duration() {
            self.duration_millis += duration.num_milliseconds();
            self.duration_secs += duration.num_seconds();
            self.histogram
                .observe(duration.num_milliseconds() as f64 / 1000.0);
        }
    }

    /// Number of distinct agents that ran at least one of the folded backups.
    pub fn agents_active(&self) -> i64 {
        self.agents.len() as i64
    }
}

pub fn tally_backups<'a>(backups: impl IntoIterator<Item = &'a Backup>) -> BackupTally {
    let mut tally = BackupTally::default();
    for backup in backups {
        tally.add(backup);
    }
    tally
}

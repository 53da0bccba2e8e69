//! Progress event model

use serde::{Deserialize, Serialize};

use crate::utils::dates::now_timestamp;

/// Lifecycle state of a tracked step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl ProgressStatus {
    /// Terminal statuses end a task's event stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressStatus::Completed | ProgressStatus::Failed)
    }
}

/// A single progress update for a tracked task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub task_id: String,
    pub step: String,
    pub status: ProgressStatus,
    pub message: String,
    #[serde(default)]
    pub current: u64,
    #[serde(default)]
    pub total: u64,
    pub timestamp: String,
}

impl ProgressEvent {
    /// Create an event stamped with the current time
    pub fn new(
        task_id: impl Into<String>,
        step: impl Into<String>,
        status: ProgressStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            step: step.into(),
            status,
            message: message.into(),
            current: 0,
            total: 0,
            timestamp: now_timestamp(),
        }
    }

    /// Attach progress counts
    pub fn with_counts(mut self, current: u64, total: u64) -> Self {
        self.current = current;
        self.total = total;
        self
    }

    /// Render as one line-delimited JSON record for transports
    pub fn to_json_line(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        line.push('\n');
        line
    }
}

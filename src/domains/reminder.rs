use serde::{Deserialize, Serialize};

/// A scheduled reply for one source message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reminder {
    pub source_id: String,
    pub remind_at: i64,
    pub published_id: Option<String>,
    pub created_at: i64,
    pub source_payload: String,
    pub target_routes: Vec<String>,
    pub attempts: i32,
    pub retry_after: Option<i64>,
    pub last_error: Option<String>,
    pub abandoned_at: Option<i64>,
}

impl Reminder {
    pub fn is_published(&self) -> bool {
        self.published_id.is_some()
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandoned_at.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReminder {
    pub source_id: String,
    pub remind_at: i64,
    pub created_at: i64,
    pub source_payload: String,
    pub target_routes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderStatus {
    Pending,
    Published,
    Abandoned,
    All,
}

impl std::str::FromStr for ReminderStatus {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "published" => Ok(Self::Published),
            "abandoned" => Ok(Self::Abandoned),
            "all" => Ok(Self::All),
            other => Err(format!("unknown reminder status: {other}")),
        }
    }
}

/// What happened to a reminder after a failed default-route publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    RetryScheduled { attempts: i32, retry_after: i64 },
    Abandoned { attempts: i32 },
    /// Row was removed or already published in the meantime.
    Missing,
}

/// Backoff and dead-letter policy for failed publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Failed attempts before a reminder is abandoned; 0 retries forever.
    pub max_attempts: u32,
    pub base_backoff_secs: u64,
    pub max_backoff_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 12,
            base_backoff_secs: 10,
            max_backoff_secs: 3600,
        }
    }
}

impl RetryPolicy {
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        self.max_attempts > 0 && attempts >= self.max_attempts
    }

    /// Delay before the next attempt, doubling per failure and capped.
    pub fn backoff_ms(&self, attempts: u32) -> i64 {
        let factor = 1u64
            .checked_shl(attempts.saturating_sub(1))
            .unwrap_or(u64::MAX);
        let secs = self
            .base_backoff_secs
            .saturating_mul(factor)
            .min(self.max_backoff_secs);
        i64::try_from(secs.saturating_mul(1000)).unwrap_or(i64::MAX)
    }
}

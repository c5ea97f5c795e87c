use async_trait::async_trait;

use crate::domains::reminder::{
    FailureOutcome, NewReminder, Reminder, ReminderStatus, RetryPolicy,
};
use crate::error::Result;

#[async_trait]
pub trait ReminderRepository: Send + Sync {
    /// Fails with `DuplicateReminder` when the source id is already stored.
    async fn insert(&self, reminder: NewReminder) -> Result<Reminder>;

    async fn exists(&self, source_id: &str) -> Result<bool>;

    async fn get(&self, source_id: &str) -> Result<Option<Reminder>>;

    /// Sets `published_id` on a pending row. Returns false when the row is
    /// gone or was already published.
    async fn mark_published(&self, source_id: &str, published_id: &str) -> Result<bool>;

    /// Pending rows with `remind_at <= now`, oldest first. `limit == 0` means
    /// no limit.
    async fn due_reminders(&self, now: i64, limit: usize) -> Result<Vec<Reminder>>;

    async fn record_failure(
        &self,
        source_id: &str,
        error: &str,
        now: i64,
        policy: &RetryPolicy,
    ) -> Result<FailureOutcome>;

    /// Dead-letters a pending row without further retries.
    async fn abandon(&self, source_id: &str, reason: &str, now: i64) -> Result<bool>;

    async fn list(&self, status: ReminderStatus, limit: usize) -> Result<Vec<Reminder>>;

    /// Administrative delete.
    async fn remove(&self, source_id: &str) -> Result<bool>;
}

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Periodic work driven by [`crate::scheduler::Scheduler`].
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    /// Stable name used in log fields.
    fn name(&self) -> &str;

    /// Delay between the starts of two runs. A run that overruns delays the
    /// next tick instead of bunching ticks up.
    fn interval(&self) -> Duration;

    /// One run. An error is logged and the job keeps its schedule; a job that
    /// must not overlap itself guards that internally.
    async fn run(&self) -> Result<()>;
}

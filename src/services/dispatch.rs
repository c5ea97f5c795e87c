use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::domains::identity::PublicKey;
use crate::domains::message::{NostrEvent, OutboundNote};
use crate::domains::reminder::{FailureOutcome, Reminder, RetryPolicy};
use crate::error::Result;
use crate::interfaces::clock::Clock;
use crate::interfaces::reminders::ReminderRepository;
use crate::interfaces::scheduler::ScheduledJob;
use crate::interfaces::transport::Transport;
use crate::services::replies;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    pub interval: Duration,
    /// Delay between two publishes within one pass.
    pub pacing: Duration,
    /// Maximum rows per pass; 0 means no limit.
    pub batch_limit: usize,
    pub retry: RetryPolicy,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            pacing: Duration::from_millis(1500),
            batch_limit: 64,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub due: usize,
    pub published: usize,
    pub failed: usize,
    pub abandoned: usize,
    /// Another pass was still running, nothing was done.
    pub skipped: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Published,
    Retrying,
    Abandoned,
    /// Removed or published by someone else while we were sending.
    Gone,
}

/// Publishes replies for due reminders. One [`DispatchJob::run_pass`] call is
/// one pass; passes never overlap.
pub struct DispatchJob {
    identity: PublicKey,
    store: Arc<dyn ReminderRepository>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    settings: DispatchSettings,
    in_flight: Mutex<()>,
}

impl DispatchJob {
    pub fn new(
        identity: PublicKey,
        store: Arc<dyn ReminderRepository>,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            identity,
            store,
            transport,
            clock,
            settings,
            in_flight: Mutex::new(()),
        }
    }

    pub async fn run_pass(&self) -> Result<PassReport> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            debug!("Dispatch pass already in flight, skipping");
            return Ok(PassReport {
                skipped: true,
                ..PassReport::default()
            });
        };

        let now = self.clock.now_ms();
        let due = self
            .store
            .due_reminders(now, self.settings.batch_limit)
            .await?;
        let mut report = PassReport {
            due: due.len(),
            ..PassReport::default()
        };
        if due.is_empty() {
            return Ok(report);
        }
        info!("Found {} reminders due", due.len());

        for (index, reminder) in due.iter().enumerate() {
            if index > 0 && !self.settings.pacing.is_zero() {
                tokio::time::sleep(self.settings.pacing).await;
            }
            match self.deliver(reminder).await {
                Ok(Delivery::Published) => report.published += 1,
                Ok(Delivery::Retrying) => report.failed += 1,
                Ok(Delivery::Abandoned) => {
                    report.failed += 1;
                    report.abandoned += 1;
                }
                Ok(Delivery::Gone) => {}
                Err(err) => {
                    error!(source_id = %reminder.source_id, "Reminder dispatch failed: {}", err);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    async fn deliver(&self, reminder: &Reminder) -> Result<Delivery> {
        let source_id = reminder.source_id.as_str();
        let note = match self.build_reply(reminder) {
            Ok(note) => note,
            Err(err) => {
                error!(source_id, "Dropping reminder with unusable payload: {}", err);
                let reason = format!("unusable source payload: {err}");
                self.store
                    .abandon(source_id, &reason, self.clock.now_ms())
                    .await?;
                return Ok(Delivery::Abandoned);
            }
        };

        let published_id = match self.transport.publish(&note, &[]).await {
            Ok(id) => id,
            Err(err) => {
                warn!(source_id, "Publishing reminder failed: {}", err);
                let outcome = self
                    .store
                    .record_failure(
                        source_id,
                        &err.to_string(),
                        self.clock.now_ms(),
                        &self.settings.retry,
                    )
                    .await?;
                return Ok(match outcome {
                    FailureOutcome::RetryScheduled {
                        attempts,
                        retry_after,
                    } => {
                        debug!(source_id, attempts, retry_after, "Reminder will be retried");
                        Delivery::Retrying
                    }
                    FailureOutcome::Abandoned { attempts } => {
                        error!(source_id, attempts, "Giving up on reminder");
                        Delivery::Abandoned
                    }
                    FailureOutcome::Missing => Delivery::Gone,
                });
            }
        };

        if !reminder.target_routes.is_empty() {
            if let Err(err) = self
                .transport
                .publish(&note, &reminder.target_routes)
                .await
            {
                warn!(
                    source_id,
                    routes = ?reminder.target_routes,
                    "Publishing reminder to source relays failed: {}",
                    err
                );
            }
        }

        if self
            .store
            .mark_published(source_id, &published_id)
            .await?
        {
            info!(source_id, published_id = %published_id, "Reminder published");
            Ok(Delivery::Published)
        } else {
            Ok(Delivery::Gone)
        }
    }

    fn build_reply(&self, reminder: &Reminder) -> Result<OutboundNote> {
        let source = NostrEvent::from_json(&reminder.source_payload)?;
        let author = PublicKey::from_hex(&source.pubkey)?;
        let content = replies::reminder_text(&reminder.source_id, &author)?;
        let created_at = u64::try_from(self.clock.now_ms() / 1000).unwrap_or_default();
        Ok(OutboundNote::reply_to(
            &source,
            content,
            created_at,
            Some(&self.identity),
        ))
    }
}

#[async_trait]
impl ScheduledJob for DispatchJob {
    fn name(&self) -> &str {
        "reminder_dispatch"
    }

    fn interval(&self) -> Duration {
        self.settings.interval
    }

    async fn run(&self) -> Result<()> {
        let report = self.run_pass().await?;
        if report.failed > 0 {
            warn!(
                due = report.due,
                published = report.published,
                failed = report.failed,
                abandoned = report.abandoned,
                "Dispatch pass finished with failures"
            );
        } else if report.published > 0 {
            debug!(published = report.published, "Dispatch pass finished");
        }
        Ok(())
    }
}

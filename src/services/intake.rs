use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domains::identity::PublicKey;
use crate::domains::message::NostrEvent;
use crate::domains::reminder::{NewReminder, Reminder};
use crate::error::{RemindMeError, Result};
use crate::interfaces::clock::Clock;
use crate::interfaces::identity::IdentityResolver;
use crate::interfaces::reminders::ReminderRepository;
use crate::interfaces::transport::Transport;
use crate::{mentions, timing};

pub const DEFAULT_REACTION: &str = "🫡";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeOutcome {
    SelfAuthored,
    AlreadyScheduled,
    NoMention,
    NoTimeExpression,
    Scheduled(Reminder),
}

/// Turns inbound notes that mention us with a time expression into stored
/// reminders.
pub struct IntakePipeline {
    identity: PublicKey,
    resolver: Arc<dyn IdentityResolver>,
    store: Arc<dyn ReminderRepository>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    reaction: Option<String>,
}

impl IntakePipeline {
    pub fn new(
        identity: PublicKey,
        resolver: Arc<dyn IdentityResolver>,
        store: Arc<dyn ReminderRepository>,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            identity,
            resolver,
            store,
            transport,
            clock,
            reaction: Some(DEFAULT_REACTION.to_string()),
        }
    }

    /// `None` disables the acknowledgement reaction.
    pub fn with_reaction(mut self, reaction: Option<String>) -> Self {
        self.reaction = reaction.filter(|value| !value.trim().is_empty());
        self
    }

    pub fn identity(&self) -> &PublicKey {
        &self.identity
    }

    /// Handles one inbound note. `routes` are the relays the note arrived on.
    ///
    /// Only storage failures are returned as errors; everything else is an
    /// outcome.
    pub async fn on_message(&self, event: &NostrEvent, routes: &[String]) -> Result<IntakeOutcome> {
        if event.is_authored_by(&self.identity) {
            return Ok(IntakeOutcome::SelfAuthored);
        }

        if self.store.exists(&event.id).await? {
            debug!(event_id = %event.id, "Already scheduled");
            return Ok(IntakeOutcome::AlreadyScheduled);
        }

        let Some(position) = mentions::locate(&self.identity, &event.content, self.resolver.as_ref())
        else {
            debug!(event_id = %event.id, "No mention of our identity");
            return Ok(IntakeOutcome::NoMention);
        };

        let now = self.clock.now_ms();
        let reference = event.created_at_ms().unwrap_or(now);
        let remainder = event.content[position..].trim();
        let Some(remind_at) = timing::resolve_ms(remainder, reference) else {
            info!(
                event_id = %event.id,
                content = %event.content,
                "Could not extract reminder time"
            );
            return Ok(IntakeOutcome::NoTimeExpression);
        };

        let new = NewReminder {
            source_id: event.id.clone(),
            remind_at,
            created_at: now,
            source_payload: event.to_json()?,
            target_routes: dedup_routes(routes),
        };

        let reminder = match self.store.insert(new).await {
            Ok(reminder) => reminder,
            Err(RemindMeError::DuplicateReminder(_)) => {
                debug!(event_id = %event.id, "Lost insert race, already scheduled");
                return Ok(IntakeOutcome::AlreadyScheduled);
            }
            Err(err) => return Err(err),
        };

        info!(
            event_id = %reminder.source_id,
            remind_at = reminder.remind_at,
            "Saved reminder for {}",
            timing::describe_delay(reminder.remind_at - now)
        );

        if let Some(reaction) = &self.reaction {
            if let Err(err) = self.transport.react(event, reaction).await {
                warn!(event_id = %event.id, "Failed to acknowledge reminder: {}", err);
            }
        }

        Ok(IntakeOutcome::Scheduled(reminder))
    }
}

fn dedup_routes(routes: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(routes.len());
    for route in routes {
        let route = route.trim();
        if !route.is_empty() && !out.iter().any(|seen| seen == route) {
            out.push(route.to_string());
        }
    }
    out
}

use std::sync::Arc;

use async_trait::async_trait;
use nostr_sdk::prelude::*;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::domains::identity::PublicKey as BotKey;
use crate::domains::message::{NostrEvent, OutboundNote, KIND_TEXT_NOTE};
use crate::error::{RemindMeError, Result};
use crate::interfaces::transport::Transport;
use crate::services::intake::IntakePipeline;

/// Relay pool transport backed by a signing `nostr_sdk::Client`.
pub struct RelayTransport {
    client: Client,
}

impl RelayTransport {
    pub fn new(keys: Keys) -> Self {
        Self {
            client: Client::new(keys),
        }
    }

    pub async fn connect(&self, relays: &[String]) -> Result<()> {
        for relay in relays {
            self.client
                .add_relay(relay.as_str())
                .await
                .map_err(|e| RemindMeError::Config(format!("relay {relay}: {e}")))?;
        }
        self.client.connect().await;
        info!(relays = relays.len(), "Connecting to relays");
        Ok(())
    }

    pub async fn disconnect(&self) {
        if let Err(err) = self.client.disconnect().await {
            warn!("Relay disconnect failed: {}", err);
        }
    }

    /// Subscribes to text notes tagging `identity`, reaching `lookback_secs`
    /// into the past, and feeds every event into `intake` until the
    /// notification channel closes.
    pub async fn listen(
        &self,
        identity: &BotKey,
        lookback_secs: u64,
        intake: Arc<IntakePipeline>,
    ) -> Result<()> {
        let mut notifications = self.client.notifications();

        let ours = nostr_sdk::PublicKey::from_slice(identity.as_bytes())
            .map_err(|e| RemindMeError::Identity(e.to_string()))?;
        let since = Timestamp::now().as_u64().saturating_sub(lookback_secs);
        let filter = Filter::new()
            .kind(Kind::from(KIND_TEXT_NOTE))
            .pubkey(ours)
            .since(Timestamp::from(since));
        self.client
            .subscribe(vec![filter], None)
            .await
            .map_err(|e| RemindMeError::Runtime(format!("subscribe failed: {e}")))?;
        info!(identity = %identity, "Listening for mentions");

        loop {
            let notification = match notifications.recv().await {
                Ok(notification) => notification,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Relay notifications lagged");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            let RelayPoolNotification::Event {
                relay_url, event, ..
            } = notification
            else {
                continue;
            };

            let inbound = match NostrEvent::from_json(&event.as_json()) {
                Ok(inbound) => inbound,
                Err(err) => {
                    warn!(event_id = %event.id, "Unreadable event from {}: {}", relay_url, err);
                    continue;
                }
            };
            let routes = [relay_url.to_string()];
            match intake.on_message(&inbound, &routes).await {
                Ok(outcome) => debug!(event_id = %inbound.id, ?outcome, "Handled mention"),
                Err(err) => warn!(event_id = %inbound.id, "Intake failed: {}", err),
            }
        }

        info!("Relay notification channel closed");
        Ok(())
    }

    /// Adds source relays missing from the pool and returns the ones added.
    /// They stay only for one publish, see [`Self::drop_transient_relays`].
    async fn add_transient_relays(&self, routes: &[String]) -> Vec<String> {
        let mut added = Vec::new();
        for route in routes {
            match self.client.add_relay(route.as_str()).await {
                Ok(true) => added.push(route.clone()),
                Ok(false) => {}
                Err(err) => warn!(relay = %route, "Skipping source relay: {}", err),
            }
        }
        added
    }

    async fn drop_transient_relays(&self, added: &[String]) {
        for route in added {
            if let Err(err) = self.client.remove_relay(route.as_str()).await {
                warn!(relay = %route, "Removing source relay failed: {}", err);
            }
        }
    }

    async fn send_to_routes(&self, routes: &[String], event: Event) -> Result<Output<EventId>> {
        let added = self.add_transient_relays(routes).await;
        for route in &added {
            if let Err(err) = self.client.connect_relay(route.as_str()).await {
                warn!(relay = %route, "Connecting to source relay failed: {}", err);
            }
        }
        let sent = self
            .client
            .send_event_to(routes.iter().map(String::as_str), event)
            .await
            .map_err(|e| RemindMeError::Publish(e.to_string()));
        self.drop_transient_relays(&added).await;
        sent
    }
}

fn build_event(note: &OutboundNote) -> Result<EventBuilder> {
    let tags = note
        .tags
        .iter()
        .map(|tag| {
            Tag::parse(tag.as_slice())
                .map_err(|e| RemindMeError::Publish(format!("bad tag: {e}")))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(
        EventBuilder::new(Kind::from(note.kind), note.content.clone(), tags)
            .custom_created_at(Timestamp::from(note.created_at)),
    )
}

#[async_trait]
impl Transport for RelayTransport {
    async fn publish(&self, note: &OutboundNote, routes: &[String]) -> Result<String> {
        let event = self
            .client
            .sign_event_builder(build_event(note)?)
            .await
            .map_err(|e| RemindMeError::Publish(format!("signing failed: {e}")))?;

        let output = if routes.is_empty() {
            self.client
                .send_event(event)
                .await
                .map_err(|e| RemindMeError::Publish(e.to_string()))?
        } else {
            self.send_to_routes(routes, event).await?
        };

        if output.success.is_empty() {
            return Err(RemindMeError::Publish(format!(
                "no relay accepted event {}",
                output.val.to_hex()
            )));
        }
        debug!(
            event_id = %output.val,
            accepted = output.success.len(),
            rejected = output.failed.len(),
            "Event sent"
        );
        Ok(output.val.to_hex())
    }

    async fn react(&self, event: &NostrEvent, content: &str) -> Result<()> {
        let target = Event::from_json(event.to_json()?)
            .map_err(|e| RemindMeError::Serialization(e.to_string()))?;
        self.client
            .reaction(&target, content)
            .await
            .map_err(|e| RemindMeError::Publish(e.to_string()))?;
        Ok(())
    }
}

use async_trait::async_trait;

use crate::domains::message::{NostrEvent, OutboundNote};
use crate::error::Result;

/// Outbound side of the relay network.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Signs and publishes `note`. An empty `routes` slice means the default
    /// relay pool; otherwise only the listed relays are targeted. Returns the
    /// published event id.
    async fn publish(&self, note: &OutboundNote, routes: &[String]) -> Result<String>;

    /// Reacts to `event` (NIP-25) with `content`.
    async fn react(&self, event: &NostrEvent, content: &str) -> Result<()>;
}

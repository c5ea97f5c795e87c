use serde::{Deserialize, Serialize};

use crate::domains::identity::PublicKey;
use crate::error::Result;

pub const KIND_TEXT_NOTE: u16 = 1;

/// NIP-01 event as received from a relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NostrEvent {
    pub id: String,
    pub pubkey: String,
    #[serde(default)]
    pub created_at: u64,
    pub kind: u16,
    #[serde(default)]
    pub tags: Vec<Vec<String>>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub sig: String,
}

impl NostrEvent {
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Creation time in milliseconds, `None` when the event carries no timestamp.
    pub fn created_at_ms(&self) -> Option<i64> {
        if self.created_at == 0 {
            return None;
        }
        i64::try_from(self.created_at)
            .ok()
            .and_then(|secs| secs.checked_mul(1000))
    }

    pub fn is_authored_by(&self, key: &PublicKey) -> bool {
        key.matches_hex(&self.pubkey)
    }

    /// Thread root per NIP-10: a marked `root` e-tag, else the first e-tag.
    pub fn root_event_id(&self) -> Option<&str> {
        let e_tags = || {
            self.tags
                .iter()
                .filter(|tag| tag.first().map(String::as_str) == Some("e"))
        };
        e_tags()
            .find(|tag| tag.get(3).map(String::as_str) == Some("root"))
            .or_else(|| e_tags().next())
            .and_then(|tag| tag.get(1))
            .map(String::as_str)
    }

    pub fn tagged_pubkeys(&self) -> impl Iterator<Item = &str> {
        self.tags
            .iter()
            .filter(|tag| tag.first().map(String::as_str) == Some("p"))
            .filter_map(|tag| tag.get(1))
            .map(String::as_str)
    }
}

/// Unsigned note handed to the transport. `created_at` is fixed up front so
/// every publish of the same note yields the same event id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundNote {
    pub kind: u16,
    pub created_at: u64,
    pub tags: Vec<Vec<String>>,
    pub content: String,
}

impl OutboundNote {
    pub fn reply_to(
        source: &NostrEvent,
        content: String,
        created_at: u64,
        ourselves: Option<&PublicKey>,
    ) -> Self {
        let mut tags = Vec::new();
        match source.root_event_id() {
            Some(root) if root != source.id => {
                tags.push(e_tag(root, "root"));
                tags.push(e_tag(&source.id, "reply"));
            }
            _ => tags.push(e_tag(&source.id, "root")),
        }

        let mut participants: Vec<&str> = vec![source.pubkey.as_str()];
        for pubkey in source.tagged_pubkeys() {
            if participants.iter().any(|seen| seen.eq_ignore_ascii_case(pubkey)) {
                continue;
            }
            if ourselves.is_some_and(|key| key.matches_hex(pubkey)) {
                continue;
            }
            participants.push(pubkey);
        }
        tags.extend(
            participants
                .into_iter()
                .map(|pubkey| vec!["p".to_string(), pubkey.to_string()]),
        );

        Self {
            kind: KIND_TEXT_NOTE,
            created_at,
            tags,
            content,
        }
    }
}

fn e_tag(id: &str, marker: &str) -> Vec<String> {
    vec![
        "e".to_string(),
        id.to_string(),
        String::new(),
        marker.to_string(),
    ]
}

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use remindme::domains::message::{NostrEvent, OutboundNote};
use remindme::error::{RemindMeError, Result};
use remindme::interfaces::clock::Clock;
use remindme::interfaces::transport::Transport;
use remindme::reminders::ReminderStore;

pub const BOT_HEX: &str = "3bf0c63fcb93463407af97a5e5ee64fa883d107ef9e558472c4eb9aaaefa459d";
pub const BOT_NPUB: &str = "npub180cvv07tjdrrgpa0j7j7tmnyl2yr6yr7l8j4s3evf6u64th6gkwsyjh6w6";
pub const BOT_NPROFILE: &str = "nprofile1qqsrhuxx8l9ex335q7he0f09aej04zpazpl0ne2cgukyawd24mayt8gpz3mhxue69uhhyetvv9ujuerpd46hxtnfduhtzj00";
pub const USER_HEX: &str = "0102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f20";
pub const USER_NPUB: &str = "npub1qypqxpq9qcrsszg2pvxq6rs0zqg3yyc5z5tpwxqergd3c8g7rusqdknev3";

/// 2023-11-14T22:13:20Z
pub const NOTE_CREATED_AT: u64 = 1_700_000_000;
pub const NOTE_CREATED_AT_MS: i64 = 1_700_000_000_000;

pub struct FixedClock(AtomicI64);

impl FixedClock {
    pub fn at(now_ms: i64) -> Arc<Self> {
        Arc::new(Self(AtomicI64::new(now_ms)))
    }

    pub fn advance(&self, delta_ms: i64) {
        self.0.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct Sent {
    pub note: OutboundNote,
    pub routes: Vec<String>,
}

/// Records every publish and reaction. Default-route publishes can be made
/// to fail a number of times; secondary-route publishes can be made to fail
/// always.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Sent>>,
    reactions: Mutex<Vec<(String, String)>>,
    default_failures: AtomicUsize,
    fail_routes: AtomicBool,
    fail_reactions: AtomicBool,
    publish_delay_ms: AtomicUsize,
    counter: AtomicUsize,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_default_publishes(&self, times: usize) {
        self.default_failures.store(times, Ordering::SeqCst);
    }

    pub fn fail_route_publishes(&self) {
        self.fail_routes.store(true, Ordering::SeqCst);
    }

    pub fn fail_reactions(&self) {
        self.fail_reactions.store(true, Ordering::SeqCst);
    }

    pub fn delay_publishes(&self, delay: Duration) {
        self.publish_delay_ms
            .store(delay.as_millis() as usize, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn default_sends(&self) -> Vec<Sent> {
        self.sent()
            .into_iter()
            .filter(|sent| sent.routes.is_empty())
            .collect()
    }

    pub fn reactions(&self) -> Vec<(String, String)> {
        self.reactions.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn publish(&self, note: &OutboundNote, routes: &[String]) -> Result<String> {
        let delay = self.publish_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
        if routes.is_empty() {
            let remaining = self.default_failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.default_failures.store(remaining - 1, Ordering::SeqCst);
                return Err(RemindMeError::Publish("relay timeout".to_string()));
            }
        } else if self.fail_routes.load(Ordering::SeqCst) {
            return Err(RemindMeError::Publish("source relay offline".to_string()));
        }

        self.sent.lock().unwrap().push(Sent {
            note: note.clone(),
            routes: routes.to_vec(),
        });
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{n:064x}"))
    }

    async fn react(&self, event: &NostrEvent, content: &str) -> Result<()> {
        if self.fail_reactions.load(Ordering::SeqCst) {
            return Err(RemindMeError::Publish("reaction rejected".to_string()));
        }
        self.reactions
            .lock()
            .unwrap()
            .push((event.id.clone(), content.to_string()));
        Ok(())
    }
}

pub async fn temp_store() -> (TempDir, Arc<ReminderStore>) {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("reminders.db");
    let store = ReminderStore::new(path.to_string_lossy())
        .await
        .expect("reminder store");
    (dir, Arc::new(store))
}

pub fn note(id_byte: u8, author: &str, content: impl Into<String>) -> NostrEvent {
    NostrEvent {
        id: format!("{id_byte:02x}").repeat(32),
        pubkey: author.to_string(),
        created_at: NOTE_CREATED_AT,
        kind: 1,
        tags: vec![vec!["p".to_string(), BOT_HEX.to_string()]],
        content: content.into(),
        sig: "00".repeat(64),
    }
}

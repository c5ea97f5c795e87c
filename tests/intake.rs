mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use remindme::domains::identity::PublicKey;
use remindme::domains::reminder::{
    FailureOutcome, NewReminder, Reminder, ReminderStatus, RetryPolicy,
};
use remindme::error::{RemindMeError, Result};
use remindme::interfaces::reminders::ReminderRepository;
use remindme::services::identity::Nip19Resolver;
use remindme::services::intake::{IntakeOutcome, IntakePipeline, DEFAULT_REACTION};

use common::{
    note, temp_store, FixedClock, RecordingTransport, BOT_HEX, BOT_NPROFILE, BOT_NPUB,
    NOTE_CREATED_AT_MS, USER_HEX, USER_NPUB,
};

fn pipeline(
    store: Arc<dyn ReminderRepository>,
    transport: Arc<RecordingTransport>,
    clock: Arc<FixedClock>,
) -> IntakePipeline {
    IntakePipeline::new(
        PublicKey::from_hex(BOT_HEX).expect("bot key"),
        Arc::new(Nip19Resolver),
        store,
        transport,
        clock,
    )
}

#[tokio::test]
async fn mention_with_relative_time_is_scheduled_from_note_time() {
    let (_dir, store) = temp_store().await;
    let transport = RecordingTransport::new();
    let clock = FixedClock::at(NOTE_CREATED_AT_MS + 2_000);
    let intake = pipeline(store.clone(), transport.clone(), clock);

    let event = note(0x11, USER_HEX, format!("nostr:{BOT_NPUB} in 10 minutes"));
    let routes = vec!["wss://relay.one".to_string(), "wss://relay.one".to_string()];
    let outcome = intake.on_message(&event, &routes).await.expect("intake");

    let IntakeOutcome::Scheduled(reminder) = outcome else {
        panic!("expected a scheduled reminder, got {outcome:?}");
    };
    assert_eq!(reminder.source_id, event.id);
    assert_eq!(reminder.remind_at, NOTE_CREATED_AT_MS + 600_000);
    assert_eq!(reminder.created_at, NOTE_CREATED_AT_MS + 2_000);
    assert_eq!(reminder.target_routes, vec!["wss://relay.one".to_string()]);
    assert!(!reminder.is_published());

    let stored = store.get(&event.id).await.expect("get").expect("row");
    assert_eq!(stored, reminder);
    let payload: serde_json::Value =
        serde_json::from_str(&stored.source_payload).expect("payload json");
    assert_eq!(payload["content"], event.content);

    assert_eq!(
        transport.reactions(),
        vec![(event.id.clone(), DEFAULT_REACTION.to_string())]
    );
}

#[tokio::test]
async fn leading_words_before_the_time_are_skipped() {
    let (_dir, store) = temp_store().await;
    let transport = RecordingTransport::new();
    let intake = pipeline(store.clone(), transport, FixedClock::at(NOTE_CREATED_AT_MS));

    let event = note(
        0x12,
        USER_HEX,
        format!("hey nostr:{BOT_NPUB} please remind me in 2 hours"),
    );
    let outcome = intake.on_message(&event, &[]).await.expect("intake");
    let IntakeOutcome::Scheduled(reminder) = outcome else {
        panic!("expected a scheduled reminder, got {outcome:?}");
    };
    assert_eq!(reminder.remind_at, NOTE_CREATED_AT_MS + 7_200_000);
}

#[tokio::test]
async fn same_note_seen_twice_is_stored_once() {
    let (_dir, store) = temp_store().await;
    let transport = RecordingTransport::new();
    let intake = pipeline(store.clone(), transport.clone(), FixedClock::at(NOTE_CREATED_AT_MS));

    let event = note(0x13, USER_HEX, format!("nostr:{BOT_NPUB} in 1 hour"));
    let first = intake
        .on_message(&event, &["wss://a".to_string()])
        .await
        .expect("first");
    assert!(matches!(first, IntakeOutcome::Scheduled(_)));

    let second = intake
        .on_message(&event, &["wss://b".to_string()])
        .await
        .expect("second");
    assert_eq!(second, IntakeOutcome::AlreadyScheduled);

    let rows = store.list(ReminderStatus::All, 0).await.expect("list");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].target_routes, vec!["wss://a".to_string()]);
    assert_eq!(transport.reactions().len(), 1);
}

#[tokio::test]
async fn notes_written_by_the_bot_are_ignored() {
    let (_dir, store) = temp_store().await;
    let transport = RecordingTransport::new();
    let intake = pipeline(store.clone(), transport.clone(), FixedClock::at(NOTE_CREATED_AT_MS));

    let event = note(0x14, BOT_HEX, format!("nostr:{BOT_NPUB} in 10 minutes"));
    let outcome = intake.on_message(&event, &[]).await.expect("intake");
    assert_eq!(outcome, IntakeOutcome::SelfAuthored);
    assert!(!store.exists(&event.id).await.expect("exists"));
    assert!(transport.reactions().is_empty());
}

#[tokio::test]
async fn time_phrase_without_our_mention_schedules_nothing() {
    let (_dir, store) = temp_store().await;
    let transport = RecordingTransport::new();
    let intake = pipeline(store.clone(), transport.clone(), FixedClock::at(NOTE_CREATED_AT_MS));

    let event = note(0x15, USER_HEX, format!("nostr:{USER_NPUB} in 10 minutes"));
    let outcome = intake.on_message(&event, &[]).await.expect("intake");
    assert_eq!(outcome, IntakeOutcome::NoMention);

    let plain = note(0x16, USER_HEX, "remind me in 10 minutes");
    let outcome = intake.on_message(&plain, &[]).await.expect("intake");
    assert_eq!(outcome, IntakeOutcome::NoMention);

    assert!(store.list(ReminderStatus::All, 0).await.expect("list").is_empty());
    assert!(transport.reactions().is_empty());
}

#[tokio::test]
async fn mention_without_time_schedules_nothing() {
    let (_dir, store) = temp_store().await;
    let transport = RecordingTransport::new();
    let intake = pipeline(store.clone(), transport.clone(), FixedClock::at(NOTE_CREATED_AT_MS));

    let event = note(0x17, USER_HEX, format!("nostr:{BOT_NPUB} hello there"));
    let outcome = intake.on_message(&event, &[]).await.expect("intake");
    assert_eq!(outcome, IntakeOutcome::NoTimeExpression);
    assert!(!store.exists(&event.id).await.expect("exists"));
}

#[tokio::test]
async fn profile_mention_is_recognised() {
    let (_dir, store) = temp_store().await;
    let transport = RecordingTransport::new();
    let intake = pipeline(store.clone(), transport, FixedClock::at(NOTE_CREATED_AT_MS));

    let event = note(0x18, USER_HEX, format!("nostr:{BOT_NPROFILE} in 30 minutes"));
    let outcome = intake.on_message(&event, &[]).await.expect("intake");
    let IntakeOutcome::Scheduled(reminder) = outcome else {
        panic!("expected a scheduled reminder, got {outcome:?}");
    };
    assert_eq!(reminder.remind_at, NOTE_CREATED_AT_MS + 1_800_000);
}

#[tokio::test]
async fn failed_acknowledgement_keeps_the_reminder() {
    let (_dir, store) = temp_store().await;
    let transport = RecordingTransport::new();
    transport.fail_reactions();
    let intake = pipeline(store.clone(), transport, FixedClock::at(NOTE_CREATED_AT_MS));

    let event = note(0x19, USER_HEX, format!("nostr:{BOT_NPUB} in 10 minutes"));
    let outcome = intake.on_message(&event, &[]).await.expect("intake");
    assert!(matches!(outcome, IntakeOutcome::Scheduled(_)));
    assert!(store.exists(&event.id).await.expect("exists"));
}

#[tokio::test]
async fn missing_note_time_falls_back_to_clock() {
    let (_dir, store) = temp_store().await;
    let transport = RecordingTransport::new();
    let now = NOTE_CREATED_AT_MS + 86_400_000;
    let intake = pipeline(store, transport.clone(), FixedClock::at(now)).with_reaction(None);

    let mut event = note(0x1a, USER_HEX, format!("nostr:{BOT_NPUB} in 10 minutes"));
    event.created_at = 0;
    let outcome = intake.on_message(&event, &[]).await.expect("intake");
    let IntakeOutcome::Scheduled(reminder) = outcome else {
        panic!("expected a scheduled reminder, got {outcome:?}");
    };
    assert_eq!(reminder.remind_at, now + 600_000);
    assert!(transport.reactions().is_empty());
}

/// Store that loses every insert race: the row is absent on `exists` but
/// already present by the time `insert` runs.
#[derive(Default)]
struct RacingStore {
    inserts: AtomicUsize,
}

#[async_trait]
impl ReminderRepository for RacingStore {
    async fn insert(&self, reminder: NewReminder) -> Result<Reminder> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        Err(RemindMeError::DuplicateReminder(reminder.source_id))
    }

    async fn exists(&self, _source_id: &str) -> Result<bool> {
        Ok(false)
    }

    async fn get(&self, _source_id: &str) -> Result<Option<Reminder>> {
        Ok(None)
    }

    async fn mark_published(&self, _source_id: &str, _published_id: &str) -> Result<bool> {
        Ok(false)
    }

    async fn due_reminders(&self, _now: i64, _limit: usize) -> Result<Vec<Reminder>> {
        Ok(Vec::new())
    }

    async fn record_failure(
        &self,
        _source_id: &str,
        _error: &str,
        _now: i64,
        _policy: &RetryPolicy,
    ) -> Result<FailureOutcome> {
        Ok(FailureOutcome::Missing)
    }

    async fn abandon(&self, _source_id: &str, _reason: &str, _now: i64) -> Result<bool> {
        Ok(false)
    }

    async fn list(&self, _status: ReminderStatus, _limit: usize) -> Result<Vec<Reminder>> {
        Ok(Vec::new())
    }

    async fn remove(&self, _source_id: &str) -> Result<bool> {
        Ok(false)
    }
}

#[tokio::test]
async fn lost_insert_race_counts_as_already_scheduled() {
    let store = Arc::new(RacingStore::default());
    let transport = RecordingTransport::new();
    let intake = pipeline(store.clone(), transport.clone(), FixedClock::at(NOTE_CREATED_AT_MS));

    let event = note(0x1b, USER_HEX, format!("nostr:{BOT_NPUB} in 10 minutes"));
    let outcome = intake.on_message(&event, &[]).await;
    assert!(matches!(outcome, Ok(IntakeOutcome::AlreadyScheduled)));
    assert_eq!(store.inserts.load(Ordering::SeqCst), 1);
    assert!(transport.reactions().is_empty());
}

#[tokio::test]
async fn trailing_request_text_does_not_hide_the_time() {
    let (_dir, store) = temp_store().await;
    let transport = RecordingTransport::new();
    let intake = pipeline(store, transport, FixedClock::at(NOTE_CREATED_AT_MS));

    let event = note(
        0x1c,
        USER_HEX,
        format!("nostr:{BOT_NPUB} in 2 hours to call mom"),
    );
    let outcome = intake.on_message(&event, &[]).await.expect("intake");
    let IntakeOutcome::Scheduled(reminder) = outcome else {
        panic!("expected a scheduled reminder, got {outcome:?}");
    };
    assert_eq!(reminder.remind_at, NOTE_CREATED_AT_MS + 7_200_000);
}

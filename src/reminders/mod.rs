use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::RunQueryDsl;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::domains::reminder::{
    FailureOutcome, NewReminder, Reminder, ReminderStatus, RetryPolicy,
};
use crate::error::{RemindMeError, Result};
use crate::interfaces::reminders::ReminderRepository;

mod schema;
use schema::reminders;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

type SqliteAsyncConn = SyncConnectionWrapper<SqliteConnection>;
type SqlitePool = Pool<SqliteAsyncConn>;
type SqlitePooledConn<'a> = PooledConnection<'a, SqliteAsyncConn>;

#[derive(Queryable)]
struct ReminderRow {
    source_id: String,
    remind_at: i64,
    published_id: Option<String>,
    created_at: i64,
    source_payload: String,
    target_routes: String,
    attempts: i32,
    retry_after: Option<i64>,
    last_error: Option<String>,
    abandoned_at: Option<i64>,
}

#[derive(Insertable)]
#[diesel(table_name = reminders)]
struct NewReminderRow<'a> {
    source_id: &'a str,
    remind_at: i64,
    published_id: Option<&'a str>,
    created_at: i64,
    source_payload: &'a str,
    target_routes: &'a str,
    attempts: i32,
}

/// SQLite-backed reminder table.
pub struct ReminderStore {
    pool: SqlitePool,
}

impl ReminderStore {
    pub async fn new(sqlite_path: impl AsRef<str>) -> Result<Self> {
        let sqlite_path = sqlite_path.as_ref();
        crate::db::ensure_parent_dir(sqlite_path)?;
        run_migrations(sqlite_path).await?;

        let manager = AsyncDieselConnectionManager::<SqliteAsyncConn>::new(sqlite_path);
        let pool: SqlitePool = Pool::builder()
            .build(manager)
            .await
            .map_err(|e| RemindMeError::Storage(e.to_string()))?;
        tracing::info!(path = sqlite_path, "Reminder store ready");
        Ok(Self { pool })
    }

    async fn conn(&self) -> Result<SqlitePooledConn<'_>> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| RemindMeError::Storage(e.to_string()))?;
        crate::db::apply_pragmas_async(&mut conn).await?;
        Ok(conn)
    }
}

#[async_trait]
impl ReminderRepository for ReminderStore {
    async fn insert(&self, reminder: NewReminder) -> Result<Reminder> {
        let routes = serde_json::to_string(&reminder.target_routes)?;
        let row = NewReminderRow {
            source_id: &reminder.source_id,
            remind_at: reminder.remind_at,
            published_id: None,
            created_at: reminder.created_at,
            source_payload: &reminder.source_payload,
            target_routes: &routes,
            attempts: 0,
        };

        let mut conn = self.conn().await?;
        let inserted = diesel::insert_or_ignore_into(reminders::table)
            .values(&row)
            .execute(&mut conn)
            .await
            .map_err(|e| RemindMeError::Storage(e.to_string()))?;
        if inserted == 0 {
            return Err(RemindMeError::DuplicateReminder(reminder.source_id));
        }

        Ok(Reminder {
            source_id: reminder.source_id,
            remind_at: reminder.remind_at,
            published_id: None,
            created_at: reminder.created_at,
            source_payload: reminder.source_payload,
            target_routes: reminder.target_routes,
            attempts: 0,
            retry_after: None,
            last_error: None,
            abandoned_at: None,
        })
    }

    async fn exists(&self, source_id: &str) -> Result<bool> {
        let mut conn = self.conn().await?;
        let found = reminders::table
            .find(source_id)
            .select(reminders::source_id)
            .first::<String>(&mut conn)
            .await
            .optional()
            .map_err(|e| RemindMeError::Storage(e.to_string()))?;
        Ok(found.is_some())
    }

    async fn get(&self, source_id: &str) -> Result<Option<Reminder>> {
        let mut conn = self.conn().await?;
        let row = reminders::table
            .find(source_id)
            .first::<ReminderRow>(&mut conn)
            .await
            .optional()
            .map_err(|e| RemindMeError::Storage(e.to_string()))?;
        Ok(row.map(map_row))
    }

    async fn mark_published(&self, source_id: &str, published_id: &str) -> Result<bool> {
        let mut conn = self.conn().await?;
        let updated = diesel::update(
            reminders::table
                .filter(reminders::source_id.eq(source_id))
                .filter(reminders::published_id.is_null()),
        )
        .set((
            reminders::published_id.eq(Some(published_id)),
            reminders::retry_after.eq::<Option<i64>>(None),
        ))
        .execute(&mut conn)
        .await
        .map_err(|e| RemindMeError::Storage(e.to_string()))?;
        Ok(updated > 0)
    }

    async fn due_reminders(&self, now: i64, limit: usize) -> Result<Vec<Reminder>> {
        let mut conn = self.conn().await?;
        let mut query = reminders::table
            .filter(reminders::remind_at.le(now))
            .filter(reminders::published_id.is_null())
            .filter(reminders::abandoned_at.is_null())
            .filter(
                reminders::retry_after
                    .is_null()
                    .or(reminders::retry_after.le(now)),
            )
            .order((reminders::remind_at.asc(), reminders::source_id.asc()))
            .into_boxed();
        if limit > 0 {
            query = query.limit(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        let rows: Vec<ReminderRow> = query
            .load(&mut conn)
            .await
            .map_err(|e| RemindMeError::Storage(e.to_string()))?;
        Ok(rows.into_iter().map(map_row).collect())
    }

    async fn record_failure(
        &self,
        source_id: &str,
        error: &str,
        now: i64,
        policy: &RetryPolicy,
    ) -> Result<FailureOutcome> {
        let mut conn = self.conn().await?;
        let previous = reminders::table
            .find(source_id)
            .filter(reminders::published_id.is_null())
            .filter(reminders::abandoned_at.is_null())
            .select(reminders::attempts)
            .first::<i32>(&mut conn)
            .await
            .optional()
            .map_err(|e| RemindMeError::Storage(e.to_string()))?;
        let Some(previous) = previous else {
            return Ok(FailureOutcome::Missing);
        };

        let attempts = previous.saturating_add(1);
        let target = reminders::table
            .filter(reminders::source_id.eq(source_id))
            .filter(reminders::published_id.is_null());

        if policy.is_exhausted(u32::try_from(attempts).unwrap_or(u32::MAX)) {
            diesel::update(target)
                .set((
                    reminders::attempts.eq(attempts),
                    reminders::last_error.eq(Some(error)),
                    reminders::retry_after.eq::<Option<i64>>(None),
                    reminders::abandoned_at.eq(Some(now)),
                ))
                .execute(&mut conn)
                .await
                .map_err(|e| RemindMeError::Storage(e.to_string()))?;
            return Ok(FailureOutcome::Abandoned { attempts });
        }

        let retry_after = now.saturating_add(
            policy.backoff_ms(u32::try_from(attempts).unwrap_or(u32::MAX)),
        );
        diesel::update(target)
            .set((
                reminders::attempts.eq(attempts),
                reminders::last_error.eq(Some(error)),
                reminders::retry_after.eq(Some(retry_after)),
            ))
            .execute(&mut conn)
            .await
            .map_err(|e| RemindMeError::Storage(e.to_string()))?;
        Ok(FailureOutcome::RetryScheduled {
            attempts,
            retry_after,
        })
    }

    async fn abandon(&self, source_id: &str, reason: &str, now: i64) -> Result<bool> {
        let mut conn = self.conn().await?;
        let updated = diesel::update(
            reminders::table
                .filter(reminders::source_id.eq(source_id))
                .filter(reminders::published_id.is_null())
                .filter(reminders::abandoned_at.is_null()),
        )
        .set((
            reminders::last_error.eq(Some(reason)),
            reminders::abandoned_at.eq(Some(now)),
        ))
        .execute(&mut conn)
        .await
        .map_err(|e| RemindMeError::Storage(e.to_string()))?;
        Ok(updated > 0)
    }

    async fn list(&self, status: ReminderStatus, limit: usize) -> Result<Vec<Reminder>> {
        let mut conn = self.conn().await?;
        let mut query = reminders::table.into_boxed();

        match status {
            ReminderStatus::Pending => {
                query = query
                    .filter(reminders::published_id.is_null())
                    .filter(reminders::abandoned_at.is_null());
            }
            ReminderStatus::Published => {
                query = query.filter(reminders::published_id.is_not_null());
            }
            ReminderStatus::Abandoned => {
                query = query.filter(reminders::abandoned_at.is_not_null());
            }
            ReminderStatus::All => {}
        }

        if limit > 0 {
            query = query.limit(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows: Vec<ReminderRow> = query
            .order((reminders::remind_at.asc(), reminders::source_id.asc()))
            .load(&mut conn)
            .await
            .map_err(|e| RemindMeError::Storage(e.to_string()))?;
        Ok(rows.into_iter().map(map_row).collect())
    }

    async fn remove(&self, source_id: &str) -> Result<bool> {
        let mut conn = self.conn().await?;
        let deleted = diesel::delete(reminders::table.filter(reminders::source_id.eq(source_id)))
            .execute(&mut conn)
            .await
            .map_err(|e| RemindMeError::Storage(e.to_string()))?;
        Ok(deleted > 0)
    }
}

fn map_row(row: ReminderRow) -> Reminder {
    let target_routes = serde_json::from_str(&row.target_routes).unwrap_or_else(|err| {
        tracing::warn!(
            source_id = %row.source_id,
            "Ignoring unreadable target routes: {}",
            err
        );
        Vec::new()
    });
    Reminder {
        source_id: row.source_id,
        remind_at: row.remind_at,
        published_id: row.published_id,
        created_at: row.created_at,
        source_payload: row.source_payload,
        target_routes,
        attempts: row.attempts,
        retry_after: row.retry_after,
        last_error: row.last_error,
        abandoned_at: row.abandoned_at,
    }
}

async fn run_migrations(database_url: &str) -> Result<()> {
    let database_url = database_url.to_string();
    tokio::task::spawn_blocking(move || {
        let mut conn = crate::db::open_connection_sync(&database_url)?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| RemindMeError::Storage(e.to_string()))?;
        Ok::<_, RemindMeError>(())
    })
    .await
    .map_err(|e| RemindMeError::Runtime(e.to_string()))??;
    Ok(())
}

use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use super::events::{EventReceiver, EventSender, PolicyEvent, emit, event_bus};
use super::traits::{LegacySettings, PolicyStore};
use crate::error::{Result, StoreError};
use crate::policy::{ConversationId, EffectiveValue, PolicyKind, RetentionValue};

/// Default broadcast capacity when none is configured.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

const POLICY_SCHEMA_META_TABLE: &str = "
CREATE TABLE IF NOT EXISTS policy_schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
)";
const POLICY_SCHEMA_VERSION_KEY: &str = "policy_schema_version";
const POLICY_SCHEMA_VERSION: u32 = 1;

async fn ensure_policy_schema_version(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::query(POLICY_SCHEMA_META_TABLE)
        .execute(pool)
        .await
        .context("create policy_schema_meta table")?;

    let stored_version: Option<(String,)> =
        sqlx::query_as("SELECT value FROM policy_schema_meta WHERE key = $1")
            .bind(POLICY_SCHEMA_VERSION_KEY)
            .fetch_optional(pool)
            .await
            .context("load policy schema version")?;

    if let Some((value,)) = stored_version {
        let parsed = value
            .parse::<u32>()
            .with_context(|| format!("invalid policy schema version value: {value}"))?;
        anyhow::ensure!(
            parsed == POLICY_SCHEMA_VERSION,
            "incompatible policy schema version: stored={parsed}, expected={POLICY_SCHEMA_VERSION}. \
compatibility is disabled; remove policy DB and restart."
        );
        return Ok(());
    }

    let unversioned_table_count: (i64,) = sqlx::query_as(
        "SELECT COUNT(*)
         FROM sqlite_master
         WHERE type = 'table'
           AND name IN ('global_policies', 'conversation_overrides')",
    )
    .fetch_one(pool)
    .await
    .context("detect unversioned policy tables")?;

    if unversioned_table_count.0 > 0 {
        anyhow::bail!(
            "unversioned policy database detected without schema metadata. \
compatibility is disabled; remove policy DB and restart."
        );
    }

    sqlx::query("INSERT INTO policy_schema_meta (key, value) VALUES ($1, $2)")
        .bind(POLICY_SCHEMA_VERSION_KEY)
        .bind(POLICY_SCHEMA_VERSION.to_string())
        .execute(pool)
        .await
        .context("persist policy schema version")?;

    Ok(())
}

/// SQLite-backed policy store using sqlx async pool.
///
/// Global values live in a small key-value table; per-conversation overrides
/// are two integer columns defaulting to the universal sentinel, so a fresh
/// row means "defer to global" on both axes.
pub struct SqlitePolicyStore {
    pool: SqlitePool,
    events: EventSender,
}

impl SqlitePolicyStore {
    /// Create a new store over an existing pool and run schema setup.
    pub async fn new(pool: SqlitePool, event_capacity: usize) -> Result<Self> {
        sqlx::query("PRAGMA foreign_keys = ON;")
            .execute(&pool)
            .await
            .map_err(StoreError::from)?;

        ensure_policy_schema_version(&pool)
            .await
            .map_err(|err| StoreError::Corrupt(err.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS global_policies (
                 kind TEXT PRIMARY KEY,
                 value INTEGER NOT NULL,
                 updated_at TEXT NOT NULL
             )",
        )
        .execute(&pool)
        .await
        .map_err(StoreError::from)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS conversation_overrides (
                 conversation_id TEXT PRIMARY KEY,
                 trim_delay  INTEGER NOT NULL DEFAULT -1,
                 trim_length INTEGER NOT NULL DEFAULT -1,
                 updated_at TEXT NOT NULL
             )",
        )
        .execute(&pool)
        .await
        .map_err(StoreError::from)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS legacy_trim_settings (
                 id INTEGER PRIMARY KEY CHECK (id = 0),
                 trim_by_length_enabled INTEGER NOT NULL DEFAULT 0,
                 legacy_length INTEGER NOT NULL DEFAULT 0,
                 keep_messages_duration_id INTEGER NOT NULL DEFAULT 0
             )",
        )
        .execute(&pool)
        .await
        .map_err(StoreError::from)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS applied_migrations (
                 key TEXT PRIMARY KEY,
                 applied_at TEXT NOT NULL
             )",
        )
        .execute(&pool)
        .await
        .map_err(StoreError::from)?;

        let (events, _) = event_bus(event_capacity);
        Ok(Self { pool, events })
    }

    /// Open (or create) a policy database file.
    pub async fn open(path: &Path, event_capacity: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|err| {
                StoreError::Unavailable(format!(
                    "create policy DB directory {}: {err}",
                    parent.display()
                ))
            })?;
        }

        let url = format!("sqlite://{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .map_err(StoreError::from)?;

        Self::new(pool, event_capacity).await
    }

    /// Throwaway in-memory store.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(StoreError::from)?;
        Self::new(pool, DEFAULT_EVENT_CAPACITY).await
    }

    /// Access the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl PolicyStore for SqlitePolicyStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    async fn global(&self, kind: PolicyKind) -> Result<EffectiveValue> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT value FROM global_policies WHERE kind = $1")
                .bind(kind.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(StoreError::from)?;

        match row {
            Some((raw,)) => EffectiveValue::from_raw(raw)
                .map_err(|err| StoreError::Corrupt(format!("global {kind}: {err}")).into()),
            None => Ok(EffectiveValue::Unbounded),
        }
    }

    async fn set_global(&self, kind: PolicyKind, value: EffectiveValue) -> Result<()> {
        RetentionValue::from(value).validate_for(kind)?;

        sqlx::query(
            "INSERT INTO global_policies (kind, value, updated_at)
             VALUES ($1, $2, $3)
             ON CONFLICT(kind) DO UPDATE SET
                 value = excluded.value,
                 updated_at = excluded.updated_at",
        )
        .bind(kind.to_string())
        .bind(value.to_raw())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        tracing::debug!(%kind, %value, "global policy updated");
        emit(&self.events, PolicyEvent::GlobalChanged { kind, value });
        Ok(())
    }

    async fn override_for(&self, id: &ConversationId, kind: PolicyKind) -> Result<RetentionValue> {
        let sql = match kind {
            PolicyKind::Delay => {
                "SELECT trim_delay FROM conversation_overrides WHERE conversation_id = $1"
            }
            PolicyKind::Length => {
                "SELECT trim_length FROM conversation_overrides WHERE conversation_id = $1"
            }
        };

        let row: Option<(i64,)> = sqlx::query_as(sql)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)?;

        match row {
            Some((raw,)) => RetentionValue::from_raw(raw)
                .map_err(|err| StoreError::Corrupt(format!("override {id} {kind}: {err}")).into()),
            None => Ok(RetentionValue::Universal),
        }
    }

    async fn set_override(
        &self,
        id: &ConversationId,
        kind: PolicyKind,
        value: RetentionValue,
    ) -> Result<()> {
        let value = value.validate_for(kind)?;

        let sql = match kind {
            PolicyKind::Delay => {
                "INSERT INTO conversation_overrides (conversation_id, trim_delay, updated_at)
                 VALUES ($1, $2, $3)
                 ON CONFLICT(conversation_id) DO UPDATE SET
                     trim_delay = excluded.trim_delay,
                     updated_at = excluded.updated_at"
            }
            PolicyKind::Length => {
                "INSERT INTO conversation_overrides (conversation_id, trim_length, updated_at)
                 VALUES ($1, $2, $3)
                 ON CONFLICT(conversation_id) DO UPDATE SET
                     trim_length = excluded.trim_length,
                     updated_at = excluded.updated_at"
            }
        };

        sqlx::query(sql)
            .bind(id.as_str())
            .bind(value.to_raw())
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(StoreError::from)?;

        tracing::debug!(conversation = %id, %kind, %value, "override updated");
        emit(
            &self.events,
            PolicyEvent::OverrideChanged {
                conversation_id: id.clone(),
                kind,
                value,
            },
        );
        Ok(())
    }

    async fn legacy_settings(&self) -> Result<LegacySettings> {
        let row: Option<(i64, i64, i64)> = sqlx::query_as(
            "SELECT trim_by_length_enabled, legacy_length, keep_messages_duration_id
             FROM legacy_trim_settings
             WHERE id = 0",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(match row {
            Some((enabled, length, duration_id)) => LegacySettings {
                trim_by_length_enabled: enabled != 0,
                legacy_length: length,
                keep_messages_duration_id: duration_id,
            },
            None => LegacySettings::default(),
        })
    }

    async fn set_legacy_settings(&self, settings: LegacySettings) -> Result<()> {
        sqlx::query(
            "INSERT INTO legacy_trim_settings
                 (id, trim_by_length_enabled, legacy_length, keep_messages_duration_id)
             VALUES (0, $1, $2, $3)
             ON CONFLICT(id) DO UPDATE SET
                 trim_by_length_enabled = excluded.trim_by_length_enabled,
                 legacy_length = excluded.legacy_length,
                 keep_messages_duration_id = excluded.keep_messages_duration_id",
        )
        .bind(i64::from(settings.trim_by_length_enabled))
        .bind(settings.legacy_length)
        .bind(settings.keep_messages_duration_id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;
        Ok(())
    }

    async fn clear_legacy_settings(&self) -> Result<()> {
        sqlx::query("DELETE FROM legacy_trim_settings WHERE id = 0")
            .execute(&self.pool)
            .await
            .map_err(StoreError::from)?;

        emit(&self.events, PolicyEvent::LegacySettingsCleared);
        Ok(())
    }

    async fn migration_applied(&self, key: &str) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM applied_migrations WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)?;
        Ok(row.is_some())
    }

    async fn mark_migration_applied(&self, key: &str) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO applied_migrations (key, applied_at) VALUES ($1, $2)")
            .bind(key)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(StoreError::from)?;
        Ok(())
    }

    fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }
}

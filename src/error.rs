use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `tidemark`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; internal code continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum TidemarkError {
    // ── Policy store ─────────────────────────────────────────────────────
    #[error("store: {0}")]
    Store(#[from] StoreError),

    // ── Value domain ─────────────────────────────────────────────────────
    #[error("value: {0}")]
    Value(#[from] ValueError),

    // ── Legacy migration ─────────────────────────────────────────────────
    #[error("migration: {0}")]
    Migration(#[from] MigrationError),

    // ── Settings controller ──────────────────────────────────────────────
    #[error("settings: {0}")]
    Settings(#[from] SettingsError),

    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Policy store errors ─────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("stored data corrupt: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

// ─── Value domain errors ─────────────────────────────────────────────────────

/// Rejections of candidate values at the API boundary, before any value
/// reaches the comparator or a store write.
#[derive(Debug, Error)]
pub enum ValueError {
    #[error("delay must not be negative (got {0} ms)")]
    NegativeDelay(i64),

    #[error("length must be at least one message")]
    ZeroLength,

    #[error("value {0} exceeds the representable range")]
    OutOfRange(u64),

    #[error("the universal sentinel cannot be stored at global scope")]
    UniversalAtGlobalScope,

    #[error("raw value {0} does not decode to a retention value")]
    UnknownRaw(i64),

    #[error("conversation id must not be empty")]
    EmptyConversationId,
}

// ─── Legacy migration errors ─────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum MigrationError {
    /// The migration itself failed. Never retried by the migration body;
    /// the startup runner re-attempts the whole step on the next run.
    #[error("legacy trim migration failed: {0}")]
    Failed(String),

    #[error("migration ledger unavailable: {0}")]
    LedgerUnavailable(String),
}

// ─── Settings controller errors ──────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("no change is pending confirmation")]
    NoPendingChange,
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, TidemarkError>;

#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::unnecessary_literal_bound,
    clippy::module_name_repetitions,
    clippy::struct_field_names
)]

use std::sync::Arc;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use tidemark::policy::{ConversationId, DAY_MS, PolicyKind, PolicyScope, RetentionValue};
use tidemark::settings::{HistorySnapshot, SettingsController};
use tidemark::store::{LegacySettings, PolicyStore, SqlitePolicyStore};
use tidemark::{Config, run_startup_migrations};

/// `tidemark` - Message-history retention policies for conversation stores.
#[derive(Parser, Debug)]
#[command(name = "tidemark")]
#[command(version = "0.1.0")]
#[command(about = "Inspect and manage message-history retention policies.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the retention policy for the universal scope or one conversation
    Show {
        /// Conversation id (omit for the universal policy)
        #[arg(long)]
        conversation: Option<String>,

        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Set the time-based retention policy
    SetDelay {
        /// Conversation to override (omit for the universal policy)
        #[arg(long)]
        conversation: Option<String>,

        /// Retain messages this many days
        #[arg(long, conflicts_with_all = ["forever", "universal"])]
        days: Option<u64>,

        /// Disable time-based trimming
        #[arg(long)]
        forever: bool,

        /// Defer to the universal policy (requires --conversation)
        #[arg(long, conflicts_with = "forever")]
        universal: bool,

        /// Apply a more-restrictive change without asking again
        #[arg(long)]
        yes: bool,
    },

    /// Set the count-based retention policy
    SetLength {
        /// Conversation to override (omit for the universal policy)
        #[arg(long)]
        conversation: Option<String>,

        /// Retain at most this many messages
        #[arg(long, conflicts_with_all = ["unlimited", "universal"])]
        messages: Option<u64>,

        /// Disable count-based trimming
        #[arg(long)]
        unlimited: bool,

        /// Defer to the universal policy (requires --conversation)
        #[arg(long, conflicts_with = "unlimited")]
        universal: bool,

        /// Apply a more-restrictive change without asking again
        #[arg(long)]
        yes: bool,
    },

    /// Reset a conversation's overrides back to the universal policy
    ClearOverride {
        #[arg(long)]
        conversation: String,

        /// Apply even when the universal policy retains less
        #[arg(long)]
        yes: bool,
    },

    /// Stage legacy trim settings for a later migration run
    ImportLegacy {
        /// Enable the old trim-by-length flag
        #[arg(long)]
        trim_by_length: bool,

        /// Old conversation length limit
        #[arg(long, default_value_t = 0)]
        length: i64,

        /// Old keep-messages menu id (1 = 1 year, 2 = 6 months, 3 = 30 days)
        #[arg(long, default_value_t = 0)]
        duration_id: i64,
    },

    /// Run pending startup migrations
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let cli = Cli::parse();
    let config = Config::load_or_init()?;
    let store = SqlitePolicyStore::open(&config.store_path(), config.event_capacity).await?;
    let store: Arc<dyn PolicyStore> = Arc::new(store);

    // Startup barrier: migrations complete before any controller exists.
    // `migrate` runs them itself; `import-legacy` stages data for them.
    let defers_migrations = matches!(
        &cli.command,
        Commands::Migrate | Commands::ImportLegacy { .. }
    );
    if config.run_migrations_on_startup && !defers_migrations {
        run_startup_migrations(store.as_ref()).await?;
    }

    dispatch(cli, store).await
}

async fn dispatch(cli: Cli, store: Arc<dyn PolicyStore>) -> Result<()> {
    match cli.command {
        Commands::Show { conversation, json } => show(store.as_ref(), conversation, json).await,

        Commands::SetDelay {
            conversation,
            days,
            forever,
            universal,
            yes,
        } => {
            let value = match (days, forever, universal) {
                (Some(days), false, false) => {
                    let Some(ms) = days.checked_mul(DAY_MS) else {
                        bail!("--days value is too large");
                    };
                    RetentionValue::Limited(ms)
                }
                (None, true, false) => RetentionValue::Unbounded,
                (None, false, true) => RetentionValue::Universal,
                _ => bail!("pass exactly one of --days, --forever, or --universal"),
            };
            apply(store, conversation, PolicyKind::Delay, value, yes).await
        }

        Commands::SetLength {
            conversation,
            messages,
            unlimited,
            universal,
            yes,
        } => {
            let value = match (messages, unlimited, universal) {
                (Some(n), false, false) => RetentionValue::Limited(n),
                (None, true, false) => RetentionValue::Unbounded,
                (None, false, true) => RetentionValue::Universal,
                _ => bail!("pass exactly one of --messages, --unlimited, or --universal"),
            };
            apply(store, conversation, PolicyKind::Length, value, yes).await
        }

        Commands::ClearOverride { conversation, yes } => {
            for kind in PolicyKind::ALL {
                apply(
                    Arc::clone(&store),
                    Some(conversation.clone()),
                    kind,
                    RetentionValue::Universal,
                    yes,
                )
                .await?;
            }
            Ok(())
        }

        Commands::ImportLegacy {
            trim_by_length,
            length,
            duration_id,
        } => {
            store
                .set_legacy_settings(LegacySettings {
                    trim_by_length_enabled: trim_by_length,
                    legacy_length: length,
                    keep_messages_duration_id: duration_id,
                })
                .await?;
            println!("legacy trim settings staged; run `tidemark migrate` to apply");
            Ok(())
        }

        Commands::Migrate => {
            run_startup_migrations(store.as_ref()).await?;
            println!("migrations up to date");
            Ok(())
        }
    }
}

fn scope_from(conversation: Option<String>) -> Result<PolicyScope> {
    Ok(match conversation {
        Some(id) => PolicyScope::Conversation(ConversationId::new(id)?),
        None => PolicyScope::Global,
    })
}

async fn show(store: &dyn PolicyStore, conversation: Option<String>, json: bool) -> Result<()> {
    let snapshot = HistorySnapshot::load(store, scope_from(conversation)?).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    println!("scope: {}", snapshot.scope);
    for kind in PolicyKind::ALL {
        let axis = snapshot.axis(kind);
        println!(
            "  {kind}: {} (stored {}, universal {})",
            axis.effective.label_for(kind),
            axis.selected.label_for(kind),
            axis.universal.label_for(kind)
        );
    }
    Ok(())
}

async fn apply(
    store: Arc<dyn PolicyStore>,
    conversation: Option<String>,
    kind: PolicyKind,
    value: RetentionValue,
    assume_yes: bool,
) -> Result<()> {
    let scope = scope_from(conversation)?;
    let controller = SettingsController::load(store, scope.clone(), kind).await?;
    let before = controller.effective();

    if controller.propose(value).await? {
        if assume_yes {
            controller.confirm().await?;
        } else {
            let after = value.resolve_with(controller.universal());
            controller.cancel();
            bail!(
                "this change retains less than the current policy ({} -> {}); re-run with --yes to apply",
                before.label_for(kind),
                after.label_for(kind)
            );
        }
    }

    println!("{scope}: {kind} = {}", controller.effective().label_for(kind));
    Ok(())
}

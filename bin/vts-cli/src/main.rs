//! Vault Transform Sync CLI
//!
//! Saves a role or transformation and mirrors the membership change onto its
//! peers. With `--dry-run` the edit runs against an in-memory store seeded
//! from a JSON file and the resulting records are printed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use vts_common::{SaveMode, Transformation, TransformationKind};
use vts_config::{AppConfig, ConfigLoader};
use vts_store::{MemoryRecordStore, RecordStore, Snapshot, StoreConfig, VaultRecordStore};
use vts_sync::{
    create_notification_sink, CollectingNotificationSink, EditorBase, FanoutNotificationSink,
    NotificationSink, RoleEditor, SaveReport, TransformationEditor,
};

/// Vault Transform Sync
#[derive(Parser, Debug)]
#[command(name = "vts")]
#[command(about = "Edit Transform roles and transformations, keeping both sides in sync")]
struct Args {
    /// Path to a TOML config file
    #[arg(long, env = "VTS_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Transform secrets engine mount path
    #[arg(long, env = "VTS_TRANSFORM_BACKEND", global = true)]
    backend: Option<String>,

    /// Run against an in-memory store seeded from this JSON file
    #[arg(long, value_name = "SEED", global = true)]
    dry_run: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Edit a role
    Role {
        #[command(subcommand)]
        action: RoleCommand,
    },
    /// Edit a transformation
    Transformation {
        #[command(subcommand)]
        action: TransformationCommand,
    },
    /// Configuration helpers
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum RoleCommand {
    /// Replace the role's transformations
    Set {
        name: String,
        transformations: Vec<String>,
        /// The role does not exist yet
        #[arg(long)]
        create: bool,
    },
}

#[derive(Subcommand, Debug)]
enum TransformationCommand {
    /// Replace the transformation's allowed roles
    Set {
        name: String,
        roles: Vec<String>,
        /// The transformation does not exist yet
        #[arg(long)]
        create: bool,
        /// Transformation type for --create: fpe, masking or tokenization
        #[arg(long = "type", default_value = "fpe")]
        kind: String,
        /// Template for --create
        #[arg(long)]
        template: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print an example config file
    Example,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (JSON if LOG_FORMAT=json, text otherwise)
    vts_common::logging::init_logging("vts-cli");

    let args = Args::parse();

    if let Command::Config { action: ConfigCommand::Example } = &args.command {
        print!("{}", AppConfig::example_toml());
        return Ok(());
    }

    let loader = match &args.config {
        Some(path) => ConfigLoader::with_path(path),
        None => ConfigLoader::new(),
    };
    let mut config = loader.load().context("Failed to load configuration")?;
    if let Some(backend) = &args.backend {
        config.transform.backend = backend.clone();
    }
    let backend = config.transform.backend.trim_matches('/').to_string();

    let memory = match &args.dry_run {
        Some(seed) => Some(Arc::new(load_seed(seed, &backend)?)),
        None => None,
    };
    let store: Arc<dyn RecordStore> = match &memory {
        Some(memory) => {
            info!(backend = %backend, "Dry run against in-memory store");
            memory.clone() as Arc<dyn RecordStore>
        }
        None => Arc::new(vault_store(&config)?),
    };

    let collected = Arc::new(CollectingNotificationSink::new());
    let collecting: Arc<dyn NotificationSink> = collected.clone();
    let delegates = vec![collecting, create_notification_sink(&config.notification)];
    let notifier = Arc::new(FanoutNotificationSink::new(delegates));

    let base = EditorBase::new(store, notifier, backend);

    let report = match args.command {
        Command::Role { action: RoleCommand::Set { name, transformations, create } } => {
            let (mut editor, mode) = if create {
                (RoleEditor::create(base, &name)?, SaveMode::Create)
            } else {
                (RoleEditor::load(base, &name).await?, SaveMode::Update)
            };
            editor.set_transformations(transformations)?;
            editor.create_or_update(mode).await?
        }
        Command::Transformation {
            action: TransformationCommand::Set { name, roles, create, kind, template },
        } => {
            let (mut editor, mode) = if create {
                let mut transformation = Transformation::new("", name).with_kind(parse_kind(&kind)?);
                if let Some(template) = template {
                    transformation = transformation.with_template(template);
                }
                (TransformationEditor::create(base, transformation)?, SaveMode::Create)
            } else {
                (TransformationEditor::load(base, &name).await?, SaveMode::Update)
            };
            editor.set_allowed_roles(roles)?;
            editor.create_or_update(mode).await?
        }
        Command::Config { .. } => return Ok(()),
    };

    print_report(&report, collected.len())?;

    if let Some(memory) = memory {
        println!("{}", serde_json::to_string_pretty(&memory.snapshot())?);
    }

    Ok(())
}

fn vault_store(config: &AppConfig) -> Result<VaultRecordStore> {
    let mut store_config = StoreConfig::new(&config.vault.addr)
        .with_timeout(Duration::from_millis(config.vault.timeout_ms))
        .with_retry(
            config.vault.retry_attempts,
            Duration::from_millis(config.vault.retry_delay_ms),
        );
    if !config.vault.token.is_empty() {
        store_config = store_config.with_token(&config.vault.token);
    }
    if !config.vault.namespace.is_empty() {
        store_config = store_config.with_namespace(&config.vault.namespace);
    }

    VaultRecordStore::new(store_config).context("Failed to build Vault client")
}

fn load_seed(path: &Path, backend: &str) -> Result<MemoryRecordStore> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file {}", path.display()))?;
    let snapshot: Snapshot = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse seed file {}", path.display()))?;

    Ok(MemoryRecordStore::from_snapshot(snapshot, backend))
}

fn parse_kind(kind: &str) -> Result<TransformationKind> {
    serde_json::from_value(serde_json::Value::String(kind.to_lowercase()))
        .with_context(|| format!("Unknown transformation type '{}'", kind))
}

fn print_report(report: &SaveReport, delivered: usize) -> Result<()> {
    let summary = serde_json::json!({
        "mode": report.mode,
        "intents": report.intents,
        "results": report.results,
        "advisory": report.advisory,
        "advisories_delivered": delivered,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if let Some(advisory) = &report.advisory {
        eprintln!("\n{}", advisory.message);
    }

    Ok(())
}

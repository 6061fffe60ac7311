//! CLI - thin presentation layer over the sync engine.
//!
//! Commands only call into the engine and render what comes back. Partial
//! results are a warning, not a failure; `no_auth` / `disabled` /
//! `backend_unavailable` render as actionable prompts rather than errors.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};

use crate::backend;
use crate::backup;
use crate::config::Config;
use crate::engine::{SyncEngine, SyncReport, SyncStatus};
use crate::error::{LocritError, Result};
use crate::identity::{self, Identity, IdentityContext};
use crate::store::SettingsStore;

/// Synchronize Locrit agent records between the local store and the cloud
#[derive(Parser, Debug)]
#[command(name = "locrit-sync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable JSON output for machine consumption
    #[arg(long, global = true)]
    pub robot: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file path (default: ~/.config/locrit-sync/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Local store path (default: ~/.config/locrit-sync/settings.yaml)
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a sync pass (upload, download, reconcile)
    Sync,
    /// Show engine status
    Status,
    /// Inspect and edit local records
    Records(RecordsArgs),
    /// Manage the stored identity
    Auth(AuthArgs),
    /// Snapshot the local store
    Backup(BackupArgs),
}

#[derive(Args, Debug)]
pub struct RecordsArgs {
    #[command(subcommand)]
    pub command: RecordsCommand,
}

#[derive(Subcommand, Debug)]
pub enum RecordsCommand {
    /// List record names
    List,
    /// Create an empty record (synced on the next pass)
    Create {
        name: String,
        /// Optional description field
        #[arg(long)]
        description: Option<String>,
    },
    /// Show one record
    Show { name: String },
    /// Set a field on a record (value parsed as JSON, else taken as string)
    Set {
        name: String,
        field: String,
        value: String,
    },
    /// Delete a record locally and propagate best-effort
    Delete { name: String },
}

#[derive(Args, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommand,
}

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    /// Store the identity used for sync
    Set {
        user_id: String,
        /// Bearer token presented to the remote backend
        #[arg(long, env = "LOCRIT_SYNC_TOKEN")]
        token: String,
    },
    /// Forget the stored identity
    Clear,
}

#[derive(Args, Debug)]
pub struct BackupArgs {
    #[command(subcommand)]
    pub command: BackupCommand,
}

#[derive(Subcommand, Debug)]
pub enum BackupCommand {
    /// Create a snapshot of the local store
    Create,
    /// List snapshots, newest first
    List,
}

struct AppContext {
    robot: bool,
    config: Config,
    config_dir: PathBuf,
    engine: SyncEngine,
}

impl AppContext {
    fn from_cli(cli: &Cli) -> Result<Self> {
        let config = match &cli.config {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };
        let config_dir = Config::config_dir()?;
        let store_path = match &cli.store {
            Some(path) => path.clone(),
            None => Config::default_store_path()?,
        };

        let store = Arc::new(Mutex::new(SettingsStore::open(store_path)?));
        let identity = Arc::new(IdentityContext::new());
        if let Some(saved) = identity::load_identity(&config_dir) {
            identity.set(saved);
        }
        let backend = backend::connect(&config.backend, config.sync.request_timeout);
        let engine = SyncEngine::new(config.clone(), store, backend, identity);

        Ok(Self {
            robot: cli.robot,
            config,
            config_dir,
            engine,
        })
    }

    fn emit_json<T: serde::Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

pub fn run(cli: &Cli) -> Result<()> {
    let ctx = AppContext::from_cli(cli)?;
    match &cli.command {
        Commands::Sync => run_sync(&ctx),
        Commands::Status => run_status(&ctx),
        Commands::Records(args) => run_records(&ctx, args),
        Commands::Auth(args) => run_auth(&ctx, args),
        Commands::Backup(args) => run_backup(&ctx, args),
    }
}

fn run_sync(ctx: &AppContext) -> Result<()> {
    let report = ctx.engine.run_sync();
    if ctx.robot {
        return ctx.emit_json(&report);
    }
    render_report(&report);
    Ok(())
}

fn render_report(report: &SyncReport) {
    match report.status {
        SyncStatus::Disabled => {
            println!("{}", "Sync is disabled. Enable it in config.toml ([sync] enabled = true).".yellow());
            return;
        }
        SyncStatus::NoAuth => {
            println!("{}", "Not logged in. Run `locrit-sync auth set <user-id>` first.".yellow());
            return;
        }
        SyncStatus::BackendUnavailable => {
            println!("{}", "No remote backend reachable. Check [backend] URLs in config.toml.".yellow());
            return;
        }
        SyncStatus::Success => println!("{} {}", "Sync complete".green(), report.summary_line()),
        SyncStatus::Partial => println!("{} {}", "Sync partial".yellow(), report.summary_line()),
    }

    print_names("Uploaded", &report.uploaded);
    print_names("Downloaded (new)", &report.downloaded_new);
    print_names("Downloaded (updated)", &report.downloaded_updated);
    print_names("Local newer", &report.local_newer);
    if !report.errors.is_empty() {
        println!("  {}:", "Errors".red());
        for entry in &report.errors {
            match &entry.name {
                Some(name) => println!("    {name}: {}", entry.message),
                None => println!("    {}", entry.message),
            }
        }
    }
    println!("  Duration: {} ms", report.duration_ms);
}

fn print_names(label: &str, names: &[String]) {
    if !names.is_empty() {
        println!("  {label}: {}", names.join(", "));
    }
}

fn run_status(ctx: &AppContext) -> Result<()> {
    let status = ctx.engine.status();
    if ctx.robot {
        return ctx.emit_json(&status);
    }
    println!("Backend:       {}", status.backend_kind);
    println!(
        "Initialized:   {}",
        if status.backend_initialized { "yes".green() } else { "no".red() }
    );
    println!(
        "Authenticated: {}",
        if status.authenticated { "yes".green() } else { "no".red() }
    );
    if let Some(hint) = &status.principal_hint {
        println!("Principal:     {hint}");
    }
    Ok(())
}

fn run_records(ctx: &AppContext, args: &RecordsArgs) -> Result<()> {
    match &args.command {
        RecordsCommand::List => {
            let names = ctx.engine.store().lock().list_records();
            if ctx.robot {
                return ctx.emit_json(&json!({ "records": names }));
            }
            if names.is_empty() {
                println!("No records.");
            }
            for name in names {
                println!("{name}");
            }
            Ok(())
        }
        RecordsCommand::Create { name, description } => {
            let mut fields = Map::new();
            if let Some(description) = description {
                fields.insert("description".to_string(), Value::String(description.clone()));
            }
            {
                let mut store = ctx.engine.store().lock();
                store.set_record(crate::record::Record::new(name.clone(), fields));
                store.persist()?;
            }
            if !ctx.robot {
                println!("{} {name}", "Created".green());
            }
            Ok(())
        }
        RecordsCommand::Show { name } => {
            let record = ctx
                .engine
                .store()
                .lock()
                .record(name)
                .ok_or_else(|| LocritError::RecordNotFound(name.clone()))?;
            ctx.emit_json(&Value::Object(record.into_fields()))
        }
        RecordsCommand::Set { name, field, value } => {
            let parsed: Value = serde_json::from_str(value)
                .unwrap_or_else(|_| Value::String(value.clone()));
            let mut partial = Map::new();
            partial.insert(field.clone(), parsed);
            if !ctx.engine.push_record_fields(name, partial)? {
                return Err(LocritError::RecordNotFound(name.clone()));
            }
            if !ctx.robot {
                println!("{} {name}.{field}", "Updated".green());
            }
            Ok(())
        }
        RecordsCommand::Delete { name } => {
            if !ctx.engine.delete_record(name)? {
                return Err(LocritError::RecordNotFound(name.clone()));
            }
            if !ctx.robot {
                println!("{} {name}", "Deleted".green());
            }
            Ok(())
        }
    }
}

fn run_auth(ctx: &AppContext, args: &AuthArgs) -> Result<()> {
    match &args.command {
        AuthCommand::Set { user_id, token } => {
            let id = Identity::new(user_id, token);
            identity::save_identity(&ctx.config_dir, &id)?;
            ctx.engine.identity().set(id);
            if !ctx.robot {
                println!("{} {user_id}", "Identity stored for".green());
            }
            Ok(())
        }
        AuthCommand::Clear => {
            identity::clear_identity(&ctx.config_dir);
            ctx.engine.identity().clear();
            if !ctx.robot {
                println!("Identity cleared.");
            }
            Ok(())
        }
    }
}

fn run_backup(ctx: &AppContext, args: &BackupArgs) -> Result<()> {
    match &args.command {
        BackupCommand::Create => {
            let id = ctx.engine.snapshot_local_store()?;
            if ctx.robot {
                return ctx.emit_json(&json!({ "backup_id": id }));
            }
            println!("{} {id}", "Snapshot created:".green());
            Ok(())
        }
        BackupCommand::List => {
            let dir = ctx.config.backup_dir()?;
            let snapshots = backup::list_snapshots(&dir, "records")?;
            if ctx.robot {
                return ctx.emit_json(&json!({ "snapshots": snapshots }));
            }
            if snapshots.is_empty() {
                println!("No snapshots.");
            }
            for info in snapshots {
                println!("{}  {}  {} records", info.id, info.created_at, info.record_count);
            }
            Ok(())
        }
    }
}

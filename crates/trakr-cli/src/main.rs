//! Trakr - CI build result tracker CLI
//!
//! The `trakr` command keeps a local history of each registered project's
//! test results in step with the CI server.
//!
//! ## Commands
//!
//! - `sync`: Fetch every build the local history is missing
//! - `show`: Print a project's stored history
//! - `summary`: Print the latest stored result per project
//! - `probe`: Compare the server's latest build ids with the local head
//! - `recent`: Fetch the last few reports without storing them
//! - `trigger`: Request a rebuild

mod viewer;

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn, Level};
use trakr_core::{
    detect_regression, init_tracing, render_history, render_record, BuildRecord, FsHistoryStore,
    History, JenkinsClient, ProjectCode, ProjectRegistry, ProjectSummary, Synchronizer,
};

use crate::viewer::ViewerHandle;

#[derive(Parser)]
#[command(name = "trakr")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Track CI test results per build", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Project registry file
    #[arg(long, global = true, env = "TRAKR_CONFIG", default_value = "trakr.json")]
    config: PathBuf,

    /// Append-only audit log
    #[arg(
        long,
        global = true,
        env = "TRAKR_AUDIT_LOG",
        default_value = "trakr-audit.log"
    )]
    audit_log: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bring local histories up to date with the CI server
    Sync {
        /// Project codes (default: every registered project)
        codes: Vec<String>,

        /// Trigger a rebuild when the head failed more than N tests over the previous build
        #[arg(long)]
        retrigger_threshold: Option<u64>,

        /// Restart the chart viewer after syncing
        #[arg(long)]
        restart_viewer: bool,

        /// Keep running, syncing every N seconds
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Show a project's stored history, most recent first
    Show {
        /// Project code
        code: String,
    },

    /// Summarize the latest stored result (no network)
    Summary {
        /// Project codes (default: every registered project)
        codes: Vec<String>,
    },

    /// Query the server's latest build ids
    Probe {
        /// Project code
        code: String,
    },

    /// Fetch the most recent reports without storing them
    Recent {
        /// Project code
        code: String,

        /// Number of builds
        #[arg(short = 'n', long, default_value = "6")]
        count: usize,
    },

    /// Request a rebuild of a project
    Trigger {
        /// Project code
        code: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level, Some(&cli.audit_log))
        .with_context(|| format!("Failed to open audit log {}", cli.audit_log.display()))?;

    let registry = ProjectRegistry::load(&cli.config)
        .with_context(|| format!("Failed to load project registry {}", cli.config.display()))?;
    let store = Arc::new(FsHistoryStore::new(registry.data_dir()));
    let server = Arc::new(JenkinsClient::from_env().context("Failed to build HTTP client")?);
    let sync = Synchronizer::new(registry, store, server);

    match cli.command {
        Commands::Sync {
            codes,
            retrigger_threshold,
            restart_viewer,
            interval,
        } => cmd_sync(&sync, &codes, retrigger_threshold, restart_viewer, interval).await,
        Commands::Show { code } => cmd_show(&sync, &code),
        Commands::Summary { codes } => cmd_summary(&sync, &codes),
        Commands::Probe { code } => cmd_probe(&sync, &code).await,
        Commands::Recent { code, count } => cmd_recent(&sync, &code, count).await,
        Commands::Trigger { code } => cmd_trigger(&sync, &code).await,
    }
}

fn resolve_one(sync: &Synchronizer, raw: &str) -> Result<ProjectCode> {
    let mut codes = sync.registry().resolve(&[raw.to_string()])?;
    codes.pop().context("Empty project selection")
}

/// Sync, optionally in a loop with the viewer supervised between passes
async fn cmd_sync(
    sync: &Synchronizer,
    codes: &[String],
    retrigger_threshold: Option<u64>,
    restart_viewer: bool,
    interval: Option<u64>,
) -> Result<()> {
    let codes = sync.registry().resolve(codes)?;
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    sync_loop(
        sync,
        &codes,
        retrigger_threshold,
        restart_viewer,
        interval,
        shutdown,
    )
    .await
}

/// Run passes until done (no interval) or until `shutdown` resolves. The one
/// shutdown future is watched during passes as well as between them.
async fn sync_loop(
    sync: &Synchronizer,
    codes: &[ProjectCode],
    retrigger_threshold: Option<u64>,
    restart_viewer: bool,
    interval: Option<u64>,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    tokio::pin!(shutdown);
    let mut viewer: Option<ViewerHandle> = None;

    loop {
        let failures = tokio::select! {
            biased;
            _ = &mut shutdown => return stop_viewer(viewer).await,
            failures = run_sync_pass(sync, codes, retrigger_threshold) => failures,
        };

        if restart_viewer {
            match sync.registry().chart_command() {
                Some(command) => match viewer.as_mut() {
                    Some(handle) => handle.restart().await?,
                    None => viewer = Some(ViewerHandle::spawn(command)?),
                },
                None => warn!("--restart-viewer given but no chart_command is configured"),
            }
        }

        let Some(secs) = interval else {
            if let Some(handle) = viewer.take() {
                handle.detach();
            }
            if failures > 0 {
                bail!("{} project(s) need attention", failures);
            }
            return Ok(());
        };

        tokio::select! {
            biased;
            _ = &mut shutdown => return stop_viewer(viewer).await,
            _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
        }
    }
}

async fn stop_viewer(viewer: Option<ViewerHandle>) -> Result<()> {
    info!("Interrupted, shutting down");
    if let Some(mut handle) = viewer {
        handle.stop().await?;
    }
    Ok(())
}

/// One pass over `codes`. Returns how many projects failed in a way that
/// needs the operator (remote failures are expected and only reported).
async fn run_sync_pass(
    sync: &Synchronizer,
    codes: &[ProjectCode],
    retrigger_threshold: Option<u64>,
) -> usize {
    let mut failures = 0;
    for (code, result) in sync.sync_all(codes).await {
        print!("{}", ProjectSummary::from_sync(&code, &result).render());
        match result {
            Ok(_) => {
                if let Some(threshold) = retrigger_threshold {
                    retrigger_on_regression(sync, &code, threshold).await;
                }
            }
            Err(e) if e.needs_operator() => {
                error!(project = %code, error = %e, "Project needs attention");
                failures += 1;
            }
            Err(_) => {}
        }
    }
    failures
}

/// Request a rebuild when the head regressed. Never fatal.
async fn retrigger_on_regression(sync: &Synchronizer, code: &ProjectCode, threshold: u64) -> bool {
    let history = match sync.store().load(code) {
        Ok(history) => history,
        Err(e) => {
            warn!(project = %code, error = %e, "Skipping regression check");
            return false;
        }
    };
    let Some(regression) = detect_regression(&history, threshold) else {
        return false;
    };
    let has_token = sync
        .registry()
        .endpoint(code)
        .is_some_and(|e| e.build_token.is_some());
    if !has_token {
        info!(project = %code, "{}; no build token, not retriggering", regression.describe());
        return false;
    }
    match sync.trigger(code, &regression.describe()).await {
        Ok(()) => true,
        Err(e) => {
            warn!(project = %code, error = %e, "Rebuild request failed");
            false
        }
    }
}

/// Print every stored record
fn cmd_show(sync: &Synchronizer, raw: &str) -> Result<()> {
    let code = resolve_one(sync, raw)?;
    let history = sync.store().load(&code)?;

    if history.is_empty() {
        println!("No builds recorded for '{}'", code);
        return Ok(());
    }
    print!("{}", render_history(&code, &history));
    Ok(())
}

/// Print the stored head of each project
fn cmd_summary(sync: &Synchronizer, codes: &[String]) -> Result<()> {
    let codes = sync.registry().resolve(codes)?;
    let mut failures = 0;
    for code in &codes {
        let history = match sync.store().load(code) {
            Ok(history) => history,
            Err(e) => {
                error!(project = %code, error = %e, "Cannot read history");
                failures += 1;
                History::new()
            }
        };
        print!("{}", ProjectSummary::from_history(code, &history).render());
    }
    if failures > 0 {
        bail!("{} project(s) need attention", failures);
    }
    Ok(())
}

async fn cmd_probe(sync: &Synchronizer, raw: &str) -> Result<()> {
    let code = resolve_one(sync, raw)?;
    let report = sync.probe(&code).await?;

    let show = |r: &std::result::Result<u64, trakr_core::RemoteError>| match r {
        Ok(id) => id.to_string(),
        Err(e) => format!("??? ({})", e),
    };
    println!("Project:               {}", report.project);
    println!(
        "Local head:            {}",
        report
            .local_head
            .map(|n| n.to_string())
            .unwrap_or_else(|| "none".to_string())
    );
    println!("Latest build:          {}", show(&report.latest));
    println!("Latest completed:      {}", show(&report.latest_completed));
    Ok(())
}

async fn cmd_recent(sync: &Synchronizer, raw: &str, count: usize) -> Result<()> {
    let code = resolve_one(sync, raw)?;
    let reports = sync.recent_reports(&code, count).await?;

    if reports.is_empty() {
        println!("No completed builds for '{}'", code);
        return Ok(());
    }
    for (build_number, report) in reports {
        let record = match report {
            Ok(counts) => BuildRecord::known(build_number, counts),
            Err(_) => BuildRecord::unknown(build_number),
        };
        println!("{}", render_record(&record));
    }
    Ok(())
}

async fn cmd_trigger(sync: &Synchronizer, raw: &str) -> Result<()> {
    let code = resolve_one(sync, raw)?;
    sync.trigger(&code, "manual").await?;
    println!("Rebuild requested for {}", code);
    Ok(())
}

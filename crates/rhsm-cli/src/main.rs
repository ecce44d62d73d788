//! RHSM - subscription-manager helper CLI
//!
//! The `rhsm` command runs the upgrade-time subscription-manager operations
//! against the host or a chroot-style target root.
//!
//! ## Commands
//!
//! - `scan`: Gather attached SKUs, repositories, release and certificates
//! - `repos`: List repositories available through RHSM
//! - `release`: Show, set or unset the pinned release
//! - `switch-cert`: Replace the installed product certificates
//! - `container-mode`: Put RHSM in a target root into container mode

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{ensure, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{warn, Level};

use rhsm_core::{
    is_subscription_manager_available, ChrootActions, CollectedReports, HostActions,
    IsolatedActions, Report, Rhsm, RhsmConfig, SubscriptionSnapshot, TerminalError, ThreadSleeper,
};

#[derive(Parser)]
#[command(name = "rhsm")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Subscription-manager helpers for system upgrades", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Run inside this target root instead of on the host
    #[arg(long, global = true, env = "RHSM_TARGET_ROOT")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Gather the complete subscription state
    Scan,

    /// Show the SKUs of the attached subscriptions
    Skus,

    /// List repositories available through RHSM
    Repos {
        /// Release version passed to yum
        #[arg(long)]
        releasever: Option<String>,

        /// List every repository yum knows, with its repo file
        #[arg(long)]
        all: bool,
    },

    /// List repositories enabled through subscription-manager
    EnabledRepos,

    /// Manage the pinned release
    Release {
        #[command(subcommand)]
        action: ReleaseAction,
    },

    /// Refresh the local subscription data
    Refresh,

    /// List the installed product certificates
    Certs,

    /// Replace the installed product certificates
    SwitchCert {
        /// Certificate file on the host
        cert: PathBuf,
    },

    /// Put RHSM in the target root into container mode
    ContainerMode,

    /// Show the effective configuration
    Config,

    /// Show environment information
    Info,
}

#[derive(Subcommand)]
enum ReleaseAction {
    /// Show the pinned release
    Show,
    /// Pin subscription-manager to a release
    Set {
        /// Release, e.g. 8.6
        release: String,
    },
    /// Remove the pinned release
    Unset,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    rhsm_core::init_tracing(cli.json, level);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            print_error(&err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = RhsmConfig::from_env();
    let reports = CollectedReports::new();
    let sleeper = ThreadSleeper;
    let rhsm = Rhsm::new(&config, &reports, &sleeper);
    let context = build_context(cli.root.as_deref())?;
    let ctx = context.as_ref();

    let result = match cli.command {
        Commands::Scan => cmd_scan(&rhsm, ctx),
        Commands::Skus => print_gated(&config, rhsm.get_attached_skus(ctx)?),
        Commands::Repos { releasever, all } => cmd_repos(&rhsm, ctx, releasever.as_deref(), all),
        Commands::EnabledRepos => print_gated(&config, rhsm.get_enabled_repo_ids(ctx)?),
        Commands::Release { action } => match action {
            ReleaseAction::Show => print_gated(&config, rhsm.get_release(ctx)?),
            ReleaseAction::Set { release } => done(
                &config,
                rhsm.set_release(ctx, &release)?,
                &format!("Release set to {}", release),
            ),
            ReleaseAction::Unset => done(&config, rhsm.unset_release(ctx)?, "Release unset"),
        },
        Commands::Refresh => done(&config, rhsm.refresh(ctx)?, "Subscription data refreshed"),
        Commands::Certs => print_gated(&config, rhsm.get_existing_product_certificates(ctx)?),
        Commands::SwitchCert { cert } => cmd_switch_cert(&rhsm, ctx, &cert),
        Commands::ContainerMode => cmd_container_mode(&rhsm, ctx),
        Commands::Config => cmd_config(&config),
        Commands::Info => cmd_info(&config, ctx, cli.root.as_deref()),
    };

    // Reports raised before a failure are still worth showing
    print_reports(&reports)?;
    result
}

fn build_context(root: Option<&Path>) -> Result<Box<dyn IsolatedActions>> {
    match root {
        Some(root) => {
            ensure!(
                root.is_dir(),
                "Target root {} is not a directory",
                root.display()
            );
            Ok(Box::new(ChrootActions::new(root)))
        }
        None => Ok(Box::new(HostActions::new())),
    }
}

fn print_error(err: &anyhow::Error) {
    eprintln!("Error: {:#}", err);
    if let Some(terminal) = err.downcast_ref::<TerminalError>() {
        if let Some(stderr) = terminal.stderr().map(str::trim).filter(|s| !s.is_empty()) {
            eprintln!("  stderr: {}", stderr);
        }
        if let Some(hint) = terminal.hint() {
            eprintln!("  hint: {}", hint);
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", rendered);
    Ok(())
}

fn skipped(config: &RhsmConfig) {
    println!(
        "RHSM is skipped ({}=1), nothing was done",
        config.skip_env_var
    );
}

fn print_gated<T: Serialize>(config: &RhsmConfig, value: Option<T>) -> Result<()> {
    match value {
        Some(value) => print_json(&value),
        None => {
            skipped(config);
            Ok(())
        }
    }
}

fn done(config: &RhsmConfig, outcome: Option<()>, message: &str) -> Result<()> {
    match outcome {
        Some(()) => println!("{}", message),
        None => skipped(config),
    }
    Ok(())
}

fn print_reports(reports: &CollectedReports) -> Result<()> {
    let collected: Vec<Report> = reports.reports();
    if collected.is_empty() {
        return Ok(());
    }
    if reports.has_inhibitor() {
        warn!(count = collected.len(), "upgrade inhibitors reported");
    }
    println!("Reports:");
    print_json(&collected)
}

// ========== Subscription Commands ==========

fn cmd_scan(rhsm: &Rhsm, ctx: &dyn IsolatedActions) -> Result<()> {
    let snapshot = rhsm
        .scan_rhsm_info(ctx)
        .context("Failed to gather subscription information")?;
    print_gated(rhsm.config(), snapshot)
}

fn cmd_repos(
    rhsm: &Rhsm,
    ctx: &dyn IsolatedActions,
    releasever: Option<&str>,
    all: bool,
) -> Result<()> {
    if all {
        print_json(&rhsm.get_available_repos(ctx, releasever)?)
    } else {
        print_json(&rhsm.get_available_repo_ids(ctx, releasever)?)
    }
}

fn cmd_switch_cert(rhsm: &Rhsm, ctx: &dyn IsolatedActions, cert: &Path) -> Result<()> {
    ensure!(
        cert.is_file(),
        "Product certificate {} does not exist",
        cert.display()
    );

    let Some(existing) = rhsm.get_existing_product_certificates(ctx)? else {
        skipped(rhsm.config());
        return Ok(());
    };
    let snapshot = SubscriptionSnapshot {
        existing_product_certificates: existing,
        ..Default::default()
    };

    let outcome = rhsm.switch_certificate(ctx, &snapshot, cert)?;
    done(
        rhsm.config(),
        outcome,
        &format!("Installed product certificate {}", cert.display()),
    )
}

fn cmd_container_mode(rhsm: &Rhsm, ctx: &dyn IsolatedActions) -> Result<()> {
    // the core only logs when asked to act on the host
    ensure!(
        ctx.is_isolated(),
        "Container mode only applies to a target root, pass --root"
    );
    done(
        rhsm.config(),
        rhsm.set_container_mode(ctx)?,
        "Container mode configured",
    )
}

// ========== Environment Commands ==========

#[derive(Serialize)]
struct ConfigOutput<'a> {
    #[serde(flatten)]
    config: &'a RhsmConfig,
    skip_rhsm: bool,
}

fn cmd_config(config: &RhsmConfig) -> Result<()> {
    print_json(&ConfigOutput {
        config,
        skip_rhsm: config.skip_rhsm(),
    })
}

fn cmd_info(config: &RhsmConfig, ctx: &dyn IsolatedActions, root: Option<&Path>) -> Result<()> {
    println!("RHSM Environment Info");
    println!("=====================");
    println!();

    let available = is_subscription_manager_available(ctx);
    println!(
        "subscription-manager installed: {}",
        if available { "yes" } else { "no" }
    );
    match root {
        Some(root) => println!("Context: target root {}", root.display()),
        None => println!("Context: host"),
    }

    println!();

    println!("Environment Variables:");
    match std::env::var(&config.skip_env_var) {
        Ok(value) => println!("  {}: {}", config.skip_env_var, value),
        Err(_) => println!("  {}: (not set)", config.skip_env_var),
    }
    println!(
        "  RHSM skipped: {}",
        if config.skip_rhsm() { "yes" } else { "no" }
    );

    Ok(())
}

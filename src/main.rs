//! DNS HA supervisor.
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────┐
//!                 │                   SUPERVISOR LOOP                    │
//!                 │                                                      │
//!   docker ◀──────┼── health probe ──▶ circuit breaker ──▶ recovery     │
//!   (pihole,      │        │                 │               │          │
//!    unbound,     │        ▼                 ▼               ▼          │
//!    keepalived)  │  network probe      notifications    restart        │
//!                 │  (DNS via VIP)      (webhook/relay)                 │
//!                 │        │                                            │
//!                 │        ▼                                            │
//!                 │  state.json / status.json ──▶ HTTP status server    │
//!                 └──────────────────────────────────────────────────────┘
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use dns_ha_supervisor::config::loader::load_config;
use dns_ha_supervisor::lifecycle::startup::{run_daemon, system_dependencies};
use dns_ha_supervisor::observability::logging::init_logging;
use dns_ha_supervisor::persistence::{PidLock, StateStore, SupervisorState};
use dns_ha_supervisor::status::{OverallStatus, StatusReport};
use dns_ha_supervisor::supervisor::{Supervisor, SupervisorCommand};
use dns_ha_supervisor::{SupervisorConfig, SupervisorError, SupervisorResult};

#[derive(Parser)]
#[command(name = "dns-ha-supervisor")]
#[command(version, about = "Self-healing supervisor for an HA DNS stack", long_about = None)]
struct Cli {
    /// TOML configuration file. Environment overrides apply either way.
    #[arg(short, long, env = "SUPERVISOR_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the supervision loop (default)
    Run,
    /// Run a single cycle and print the report
    Check {
        /// Probe only: no restarts, nothing persisted, no lock taken
        #[arg(long)]
        no_recover: bool,
    },
    /// Print the last status document written by the daemon
    Status,
    /// Close circuit breakers in the persisted state (daemon must be stopped)
    Reset {
        service: Option<String>,
        #[arg(long, conflicts_with = "service")]
        all: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };

    if let Err(e) = init_logging(&config.observability) {
        eprintln!("Error: failed to initialise logging: {}", e);
        return ExitCode::from(2);
    }

    let result = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            tracing::info!(version = env!("CARGO_PKG_VERSION"), "dns-ha-supervisor starting");
            run_daemon(config, cli.config).await.map(|()| ExitCode::SUCCESS)
        }
        Commands::Check { no_recover } => check(config, no_recover).await,
        Commands::Status => status(&config),
        Commands::Reset { service, all } => reset(config, service, all).await,
    };

    match result {
        Ok(code) => code,
        Err(SupervisorError::LockContention { path, pid }) => {
            eprintln!(
                "Error: supervisor already running (pid {}, lock {}). Use `supervisor-cli` against the running daemon.",
                pid,
                path.display()
            );
            ExitCode::from(3)
        }
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn check(config: SupervisorConfig, no_recover: bool) -> SupervisorResult<ExitCode> {
    let store = StateStore::new(&config.supervisor.state_dir);
    let deps = system_dependencies(&config);

    let (_lock, mut supervisor) = if no_recover {
        let state = store.load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Could not read persisted state, showing fresh breakers");
            SupervisorState::default()
        });
        (None, Supervisor::new(config, deps, state, None).without_recovery())
    } else {
        let lock = PidLock::acquire(&config.supervisor.lock_path())?;
        let state = store.load_or_quarantine()?;
        (Some(lock), Supervisor::new(config, deps, state, Some(store)))
    };

    supervisor.run_cycle().await;
    let report = supervisor.status();
    println!("{}", serde_json::to_string_pretty(report.as_ref())?);

    Ok(match report.status {
        OverallStatus::Healthy => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}

fn status(config: &SupervisorConfig) -> SupervisorResult<ExitCode> {
    let store = StateStore::new(&config.supervisor.state_dir);
    let report: StatusReport = store.read_status()?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::SUCCESS)
}

async fn reset(config: SupervisorConfig, service: Option<String>, all: bool) -> SupervisorResult<ExitCode> {
    if service.is_none() && !all {
        eprintln!("Error: name a service or pass --all");
        return Ok(ExitCode::from(2));
    }

    let lock = PidLock::acquire(&config.supervisor.lock_path())?;
    let store = StateStore::new(&config.supervisor.state_dir);
    let state = store.load_or_quarantine()?;
    let deps = system_dependencies(&config);
    let mut supervisor = Supervisor::new(config, deps, state, Some(store));

    supervisor
        .handle_command(SupervisorCommand::ResetBreaker { service })
        .await;

    for (id, breaker) in &supervisor.state().breakers {
        println!("{}: {} ({} failures)", id, breaker.state, breaker.failure_count);
    }
    drop(lock);
    Ok(ExitCode::SUCCESS)
}

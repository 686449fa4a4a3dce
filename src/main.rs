//! txbridge
//!
//! Bridges an asynchronous notification feed into a synchronous
//! correlation workflow.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────── background thread (current-thread runtime) ───────────────┐
//!   │                                                                             │
//!   │   WebSocket feed ──▶ StreamSubscriber ──push──┐      signal task           │
//!   │                                               │   SIGHUP/SIGTERM/SIGINT     │
//!   └───────────────────────────────────────────────┼──────────────┬──────────────┘
//!                                                   ▼              │ set flag
//!                                         notification channel     ▼
//!                                                   │         Shutdown flag
//!   ┌──────────────── main thread ──────────────────┼──────────────┬──────────────┐
//!   │                                               ▼              │ polled       │
//!   │   ActionClient ◀──submit── CorrelationEngine ◀─pop───────────┘              │
//!   │                                                                             │
//!   └─────────────────────────────────────────────────────────────────────────────┘
//! ```

use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use txbridge::channel::{notification_channel, NotificationReceiver, NotificationSender, PopError};
use txbridge::client::http::{secret_from_env, API_READ_KEY_ENV_VAR};
use txbridge::client::{DeployRequest, HttpActionClient};
use txbridge::config::{load_or_default, BridgeConfig, ContractConfig};
use txbridge::engine::{AuditLogPlan, CorrelationEngine, CorrelationReport, EngineResult};
use txbridge::lifecycle::{spawn_repeat_listener, Shutdown, ShutdownCoordinator};
use txbridge::observability::{logging, metrics};
use txbridge::subscriber::StreamSubscriber;

/// Exit status when a second termination signal cuts shutdown short.
const EXIT_REPEATED_SIGNAL: i32 = 130;

#[derive(Parser)]
#[command(name = "txbridge")]
#[command(about = "Correlate submitted actions with their stream confirmations", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy the workflow contracts and run the correlation loop
    Run,
    /// Log every notification until a termination signal
    Watch,
    /// Validate and print the effective configuration
    Check,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = load_or_default(cli.config.as_deref())?;

    if let Commands::Check = cli.command {
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "txbridge starting");

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let shutdown = Shutdown::new();
    let (sender, inbox) = notification_channel();
    let coordinator = start_subscriber(&config, sender, shutdown.clone())?;
    // A foreground stuck in an API call or a join can still be killed.
    spawn_repeat_listener(shutdown.clone(), |_| std::process::exit(EXIT_REPEATED_SIGNAL))?;
    let join_timeout = Duration::from_secs(config.shutdown.join_timeout_secs);

    let result = match cli.command {
        Commands::Run => run_workflow(&config, inbox, shutdown).map(|report| {
            tracing::info!(
                rounds = report.matches.len(),
                dropped = report.dropped,
                "Workflow complete"
            );
        }),
        Commands::Watch => watch(&config, inbox, &shutdown),
        Commands::Check => Ok(()),
    };

    let joined = coordinator.shutdown(join_timeout);

    match result {
        Ok(()) => {}
        Err(e) if e.is_interrupted() => {
            tracing::info!("Interrupted by termination signal; no further actions submitted");
        }
        Err(e) => {
            tracing::error!(error = %e, "Workflow failed");
            if let Err(join_error) = joined {
                tracing::error!(error = %join_error, "Shutdown failed");
            }
            return Err(e.into());
        }
    }

    if let Err(e) = joined {
        tracing::error!(error = %e, "Shutdown failed");
        return Err(e.into());
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

fn start_subscriber(
    config: &BridgeConfig,
    sender: NotificationSender,
    shutdown: Shutdown,
) -> Result<ShutdownCoordinator, Box<dyn Error>> {
    let mut subscriber = StreamSubscriber::new(config.stream.clone(), sender, shutdown.clone());
    match secret_from_env(API_READ_KEY_ENV_VAR) {
        Ok(key) => subscriber = subscriber.with_read_key(key),
        Err(_) if config.stream.register => {
            tracing::warn!(var = API_READ_KEY_ENV_VAR, "Read key not set; registration will fail");
        }
        Err(_) => {}
    }
    Ok(ShutdownCoordinator::start(subscriber, shutdown)?)
}

fn run_workflow(
    config: &BridgeConfig,
    inbox: NotificationReceiver,
    shutdown: Shutdown,
) -> EngineResult<CorrelationReport> {
    let client = HttpActionClient::from_env(config.api.clone())?;
    let mut engine = CorrelationEngine::new(client, inbox, shutdown, config.engine.clone());

    let workflow = &config.workflow;
    let deployments = engine.deploy(&[
        deploy_request("source", &workflow.source_contract),
        deploy_request("audit", &workflow.audit_contract),
    ])?;

    let source = deployments[0].require_target()?;
    let audit = deployments[1].require_target()?;
    tracing::info!(source = %source, audit = %audit, "Workflow contracts deployed");

    let mut plan = AuditLogPlan::new(workflow, source, audit);
    engine.run(&mut plan)
}

fn watch(config: &BridgeConfig, mut inbox: NotificationReceiver, shutdown: &Shutdown) -> EngineResult<()> {
    let poll = Duration::from_millis(config.engine.poll_interval_ms);
    while !shutdown.is_triggered() {
        match inbox.pop(Some(poll)) {
            Ok(envelope) => {
                tracing::info!(
                    kind = envelope.kind().as_str(),
                    key = ?envelope.correlation_key().map(|k| k.as_str()),
                    "Notification"
                );
                inbox.acknowledge();
            }
            Err(PopError::Empty) => {}
            Err(PopError::Disconnected) => break,
        }
    }
    Ok(())
}

fn deploy_request(label: &str, contract: &ContractConfig) -> DeployRequest {
    DeployRequest {
        label: label.to_string(),
        contract_name: contract.name.clone(),
        source_path: contract.source_path.clone(),
        inputs: contract.inputs.clone(),
    }
}

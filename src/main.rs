//! `sessionvisor [--list-modules] [CONFIG]`
//!
//! Runs one desktop session described by a TOML file (default:
//! `$XDG_CONFIG_HOME/sessionvisor/session.toml`, or built-in defaults when
//! that file does not exist). `RUST_LOG` overrides the log filter.
//!
//! The binary runs sessions in native mode only. It carries no init-system
//! binding and no IPC transport, so a configuration asking for
//! `mode = "delegated"` fails with `BackendUnavailable`. Embedders provide an
//! [`InitSystem`](sessionvisor::InitSystem) and a
//! [`SessionBackend`](sessionvisor::SessionBackend) through the library.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use sessionvisor::{LogWriter, Orchestrator, PluginRegistry, SessionConfig, Subscribe, spawn_signal_listener};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "sessionvisor")]
#[command(version, about = "Desktop session orchestrator", long_about = None)]
struct Cli {
    /// Print the modules that would be loaded, then exit
    #[arg(long)]
    list_modules: bool,

    /// Session configuration (default: $XDG_CONFIG_HOME/sessionvisor/session.toml)
    #[arg(env = "SESSIONVISOR_CONFIG")]
    config: Option<PathBuf>,
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sessionvisor=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}

fn default_config_path() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
    Some(base.join("sessionvisor").join("session.toml"))
}

fn load_config(path: Option<PathBuf>) -> Result<SessionConfig, sessionvisor::SessionError> {
    match path {
        Some(path) => SessionConfig::load(path),
        None => match default_config_path().filter(|p| p.exists()) {
            Some(path) => SessionConfig::load(path),
            None => Ok(SessionConfig::default()),
        },
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let cfg = match load_config(cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "cannot load configuration");
            return ExitCode::FAILURE;
        }
    };

    if cli.list_modules {
        let mut registry = PluginRegistry::for_config(&cfg);
        registry.discover();
        for name in registry.names() {
            println!("{name}");
        }
        return ExitCode::SUCCESS;
    }

    let subscribers: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::default())];
    let orchestrator = Orchestrator::builder(cfg)
        .with_subscribers(subscribers)
        .build();
    let _signals = spawn_signal_listener(orchestrator.handle());

    match orchestrator.run().await {
        Ok(()) => {
            info!("session ended");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e.as_message(), label = e.as_label(), "session failed");
            ExitCode::FAILURE
        }
    }
}

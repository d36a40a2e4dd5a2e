mod dispatcher;
mod tools;
mod transport;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mcpi_domain::EngineConfig;
use mcpi_engine::{InteractionEngine, ToolRegistry};
use mcpi_sessions::{InMemoryStorage, SessionManager};

use dispatcher::RpcDispatcher;
use transport::StdioServerTransport;

/// mcpi-server — reference stdio transport for the interactive MCP session
/// engine.
#[derive(Debug, Parser)]
#[command(name = "mcpi-server", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the server, reading JSON-RPC requests from stdin and writing
    /// responses (and push notifications) to stdout. Default when no
    /// subcommand is given.
    Serve,
    /// Parse the config file and print it back out as resolved TOML.
    Config,
    /// Print version information.
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => {
            init_tracing();
            let config = load_config()?;
            serve(config).await
        }
        Some(Command::Config) => {
            let config = load_config()?;
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        Some(Command::Version) => {
            println!("mcpi-server {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,mcpi_server=debug")),
        )
        .json()
        .init();
}

/// Loads configuration from the path named by `MCPI_CONFIG` (default
/// `config.toml`), falling back to engine defaults when the file is absent.
fn load_config() -> anyhow::Result<EngineConfig> {
    let config_path = std::env::var("MCPI_CONFIG").unwrap_or_else(|_| "config.toml".into());
    load_config_from(std::path::Path::new(&config_path))
}

/// Parses `path` as TOML into an [`EngineConfig`], or returns the engine's
/// defaults when `path` does not exist. Split out from [`load_config`] so
/// the file-present/file-absent branches are each directly testable.
///
/// Uses `mcpi_domain::Error` rather than ad hoc string formatting, the same
/// ambient error type every other crate in the workspace converts into at
/// its own boundary; `anyhow` picks it up via `?` through its blanket
/// `std::error::Error` conversion.
fn load_config_from(path: &std::path::Path) -> anyhow::Result<EngineConfig> {
    if !path.exists() {
        return Ok(EngineConfig::default());
    }
    let raw = std::fs::read_to_string(path).map_err(mcpi_domain::Error::Io)?;
    toml::from_str(&raw)
        .map_err(|e| mcpi_domain::Error::Config(format!("parsing {}: {e}", path.display())))
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = load_config_from(std::path::Path::new("/nonexistent/mcpi-config.toml")).unwrap();
        assert_eq!(config.max_sessions, 1000);
        assert_eq!(config.default_timeout_ms, 300_000);
    }

    #[test]
    fn present_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_sessions = 42\ndefault_timeout_ms = 5000").unwrap();
        let config = load_config_from(file.path()).unwrap();
        assert_eq!(config.max_sessions, 42);
        assert_eq!(config.default_timeout_ms, 5000);
        // Unset fields still take the engine's default.
        assert_eq!(config.prune_interval_ms, 60_000);
    }

    #[test]
    fn malformed_toml_is_a_readable_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_sessions = \"not a number\"").unwrap();
        let err = load_config_from(file.path()).unwrap_err();
        assert!(err.to_string().contains("parsing"));
    }
}

async fn serve(config: EngineConfig) -> anyhow::Result<()> {
    tracing::info!(
        max_sessions = config.max_sessions,
        default_timeout_ms = config.default_timeout_ms,
        storage_type = ?config.storage_type,
        "mcpi-server starting"
    );

    if matches!(config.storage_type, mcpi_domain::config::StorageType::Distributed) {
        anyhow::bail!(
            "distributed storage requires a deployment-supplied RemoteKv client; \
             wire one up via mcpi_sessions::DistributedStorage instead of running this binary directly"
        );
    }

    let registry = Arc::new(ToolRegistry::new());
    tools::register_reference_tools(&registry)?;
    tracing::info!(tools = ?registry.names(), "reference tools registered");

    let storage = InMemoryStorage::new(config.max_sessions);
    let sweeper = storage.spawn_sweeper(std::time::Duration::from_millis(config.prune_interval_ms));

    let manager = SessionManager::new(storage, config.max_sessions, config.default_timeout_ms);

    let (transport, outbound_rx) = StdioServerTransport::new();
    let engine = InteractionEngine::with_hooks(
        registry,
        manager,
        Some(transport.progress_hook()),
        Some(transport.prompt_hook()),
    );

    let token_secret = std::env::var("MCPI_TOKEN_SECRET").unwrap_or_default().into_bytes();
    let dispatcher = Arc::new(RpcDispatcher::with_token_secret(
        engine,
        "mcpi-server",
        env!("CARGO_PKG_VERSION"),
        token_secret,
    ));

    let result = transport.run(dispatcher, outbound_rx).await;
    sweeper.abort();
    result
}

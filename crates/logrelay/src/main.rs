//! # logrelay
//!
//! Log broadcast relay binary.
//!
//! - `logrelay serve`: run the relay
//! - `logrelay tail`: subscribe and print records to stdout
//! - `logrelay send`: post one record

#![deny(unsafe_code)]

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use logrelay_client::{
    ConsoleSink, ProducerConfig, RelayLogger, RunSummary, SubscriberClient, SubscriberConfig,
};
use logrelay_core::LogLevel;
use logrelay_server::{RelayServer, ServerConfig};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Log broadcast relay.
#[derive(Parser, Debug)]
#[command(name = "logrelay", version, about = "Log broadcast relay")]
struct Cli {
    /// Log filter used when `RUST_LOG` is unset (overrides settings).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the relay server.
    Serve {
        /// Host to bind.
        #[arg(long)]
        host: Option<String>,
        /// Port to bind.
        #[arg(long)]
        port: Option<u16>,
        /// Ticket subscribers must present.
        #[arg(long)]
        ticket: Option<String>,
        /// Require every record field on ingress.
        #[arg(long)]
        strict: bool,
    },
    /// Subscribe to a relay and print records.
    Tail {
        /// Relay `WebSocket` URL.
        #[arg(long)]
        url: Option<String>,
        /// Ticket to present.
        #[arg(long)]
        ticket: Option<String>,
        /// Delay between reconnect attempts, in milliseconds.
        #[arg(long)]
        backoff_ms: Option<u64>,
    },
    /// Post a single record to a relay.
    Send {
        /// Relay ingress URL.
        #[arg(long)]
        url: Option<String>,
        /// Record level.
        #[arg(long, default_value = "INFO")]
        level: LogLevel,
        /// Source file reported with the record.
        #[arg(long, default_value = "cli")]
        file: String,
        /// Function reported with the record.
        #[arg(long, default_value = "-")]
        function: String,
        /// Line number reported with the record.
        #[arg(long, default_value_t = 0)]
        line: u32,
        /// Message text.
        message: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings_path = logrelay_settings::settings_path();
    let settings = logrelay_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;

    let level = cli.log_level.as_deref().unwrap_or(&settings.logging.level);
    logrelay_core::logging::init_subscriber(level);
    info!(
        settings_path = %settings_path.display(),
        version = env!("CARGO_PKG_VERSION"),
        "logrelay starting"
    );

    match cli.command {
        Command::Serve {
            host,
            port,
            ticket,
            strict,
        } => {
            let mut config = ServerConfig::from_settings(&settings.server);
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(ticket) = ticket {
                anyhow::ensure!(!ticket.is_empty(), "--ticket must not be empty");
                config.ticket = ticket;
            }
            config.strict_schema |= strict;
            serve(config).await
        }
        Command::Tail {
            url,
            ticket,
            backoff_ms,
        } => {
            let mut config = SubscriberConfig::from_settings(&settings.client);
            if let Some(url) = url {
                config.relay_url = url;
            }
            if let Some(ticket) = ticket {
                config.ticket = ticket;
            }
            if let Some(ms) = backoff_ms {
                config.backoff = Duration::from_millis(ms);
            }
            let cancel = CancellationToken::new();
            let watcher = cancel.clone();
            let _signal = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    watcher.cancel();
                }
            });
            let _ = tail(config, cancel).await;
            Ok(())
        }
        Command::Send {
            url,
            level,
            file,
            function,
            line,
            message,
        } => {
            let mut config = ProducerConfig::from_settings(&settings.client);
            if let Some(url) = url {
                config.url = url;
            }
            let logger = RelayLogger::new(config).context("Failed to build HTTP client")?;
            logger
                .log(level, &file, &function, line, &message)
                .await
                .context("Failed to post record")
        }
    }
}

async fn serve(config: ServerConfig) -> Result<()> {
    let metrics_handle = logrelay_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;
    info!(?config, "starting relay");
    let server = RelayServer::new(config, Some(metrics_handle));
    let _signal = server.shutdown().cancel_on_ctrl_c();
    server.run().await.context("Relay server failed")
}

async fn tail(config: SubscriberConfig, cancel: CancellationToken) -> RunSummary {
    let relay = config.relay_url.clone();
    let client = SubscriberClient::new(config);
    let mut sink = ConsoleSink::stdout();
    let summary = client.run(&mut sink, cancel).await;
    if summary.connections == 0 {
        warn!(%relay, "tail stopped without reaching the relay");
    }
    summary
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_flags_parse() {
        let cli = Cli::try_parse_from([
            "logrelay", "serve", "--port", "7000", "--ticket", "t", "--strict",
        ])
        .unwrap();
        match cli.command {
            Command::Serve {
                port, ticket, strict, ..
            } => {
                assert_eq!(port, Some(7000));
                assert_eq!(ticket.as_deref(), Some("t"));
                assert!(strict);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn send_parses_level() {
        let cli = Cli::try_parse_from(["logrelay", "send", "--level", "ERROR", "boom"]).unwrap();
        match cli.command {
            Command::Send { level, message, .. } => {
                assert_eq!(level, LogLevel::Error);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn send_rejects_unknown_level() {
        assert!(Cli::try_parse_from(["logrelay", "send", "--level", "info", "x"]).is_err());
    }

    #[tokio::test]
    async fn cancelled_tail_reports_unreached_relay() {
        let (logs, _guard) = logrelay_core::logging::capture_logs();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = tail(SubscriberConfig::default(), cancel).await;
        assert_eq!(summary, RunSummary::default());
        assert!(logs.has_event(tracing::Level::WARN, "without reaching the relay"));
    }

    #[test]
    fn global_log_level_after_subcommand() {
        let cli = Cli::try_parse_from(["logrelay", "tail", "--log-level", "debug"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }
}

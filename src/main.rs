//! # Trainer Bridge
//!
//! Ride a driving simulator with a smart trainer and a steering plate.
//!
//! This binary runs the bridge headless: configuration, logging, the control
//! loop and optional telemetry recording. BLE pairing and the vehicle handle
//! are supplied by an embedding host over the library's command channel.

use anyhow::{Context, Result};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use trainer_bridge::bridge::{Bridge, BridgeCommand, COMMAND_CAPACITY};
use trainer_bridge::config::{Config, LoggingConfig};

/// Rolling log file name prefix
const LOG_FILE_PREFIX: &str = "trainer-bridge.log";

/// Grace period for background tasks once the bridge has stopped
const SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(250);

/// Main entry point for Trainer Bridge
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration from the path given as the first argument, or defaults
///    - Set up logging (console, plus a daily rolling file when configured)
///
/// 2. **Main Loop**
///    - Run the control loop at `tick_rate_hz`
///    - Read `+` / `-` lines from stdin to adjust manual power
///    - Handle Ctrl+C for graceful shutdown
///
/// # Errors
///
/// Returns error if:
/// - The configuration file cannot be read or is invalid
/// - The telemetry directory cannot be created
///
/// # Examples
///
/// ```bash
/// cargo run --release -- config/default.toml
/// ```
fn main() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let result = runtime.block_on(run());

    // Stdin reads block runtime shutdown until a line arrives
    runtime.shutdown_timeout(SHUTDOWN_TIMEOUT);
    result
}

async fn run() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(&path).with_context(|| format!("Failed to load configuration from {}", path))?,
        None => Config::default(),
    };

    let _guard = init_logging(&config.logging);

    info!("Trainer Bridge v{} starting...", env!("CARGO_PKG_VERSION"));

    let step = config.control.manual_watts_step;
    let bridge = Bridge::new(config);

    let (commands, receiver) = mpsc::channel(COMMAND_CAPACITY);
    tokio::spawn(read_manual_input(commands.clone(), step));

    info!("Type + or - and Enter to adjust power, Ctrl+C to exit");
    bridge.run(receiver).await?;

    drop(commands);
    info!("Trainer Bridge stopped");
    Ok(())
}

/// Install the console subscriber and, if configured, a rolling file layer.
fn init_logging(logging: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let (file_layer, guard) = match file_writer(logging) {
        Some((writer, guard)) => (
            Some(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false)),
            Some(guard),
        ),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    guard
}

/// Daily rolling writer under `file_dir`; the guard flushes it on drop
fn file_writer(logging: &LoggingConfig) -> Option<(NonBlocking, WorkerGuard)> {
    let dir = logging.file_dir.as_ref()?;
    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    Some(tracing_appender::non_blocking(appender))
}

/// Map one line of operator input to a command
fn parse_manual_input(line: &str, step: f64) -> Option<BridgeCommand> {
    match line.trim() {
        "+" | "=" => Some(BridgeCommand::AdjustWatts(step)),
        "-" | "_" => Some(BridgeCommand::AdjustWatts(-step)),
        "q" => Some(BridgeCommand::Shutdown),
        _ => None,
    }
}

async fn read_manual_input(commands: mpsc::Sender<BridgeCommand>, step: f64) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let Some(command) = parse_manual_input(&line, step) else {
            debug!("Ignoring input {:?}", line);
            continue;
        };
        if commands.send(command).await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manual_input() {
        assert!(matches!(
            parse_manual_input("+", 20.0),
            Some(BridgeCommand::AdjustWatts(w)) if w == 20.0
        ));
        assert!(matches!(
            parse_manual_input(" - \n", 20.0),
            Some(BridgeCommand::AdjustWatts(w)) if w == -20.0
        ));
        assert!(matches!(parse_manual_input("q", 20.0), Some(BridgeCommand::Shutdown)));
        assert!(parse_manual_input("hello", 20.0).is_none());
    }

    #[test]
    fn test_no_file_writer_without_dir() {
        assert!(file_writer(&LoggingConfig::default()).is_none());
    }

    #[test]
    fn test_file_writer_logs_into_dir() {
        let dir = tempfile::tempdir().unwrap();
        let logging = LoggingConfig {
            file_dir: Some(dir.path().to_string_lossy().into_owned()),
        };

        let (writer, guard) = file_writer(&logging).unwrap();
        let subscriber = tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false));
        tracing::subscriber::with_default(subscriber, || info!("trainer paired"));
        drop(guard);

        let logs: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(LOG_FILE_PREFIX))
            .collect();
        assert_eq!(logs.len(), 1);

        let contents = std::fs::read_to_string(logs[0].path()).unwrap();
        assert!(contents.contains("trainer paired"));
    }
}

//! telemd - ECU telemetry acquisition daemon
//!
//! Decodes the rotating data stream an engine ECU broadcasts on one CAN id
//! and keeps a snapshot file of the latest channel values up to date for a
//! display process to poll.
//!
//! # Usage
//!
//! Live bus with the built-in M400 profile:
//! ```bash
//! telemd --interface can0 --output /var/run/telem/telemChannels.json
//! ```
//!
//! Replay a capture:
//! ```bash
//! telemd --replay dyno.log --realtime
//! ```
//!
//! With config file:
//! ```bash
//! telemd --config config/telemd.toml
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use telem_acquire::{
    create_source, Acquisition, AcquisitionSettings, FileSink, ReplayConfig, Shutdown,
    SimulatedConfig, SinkFormat, SocketCanConfig, SourceConfig,
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;

use config::DaemonConfig;

#[derive(Parser, Debug)]
#[command(name = "telemd")]
#[command(about = "Decode a rotating ECU CAN stream into a periodically refreshed snapshot file")]
struct Args {
    /// Configuration file path (TOML format)
    /// Command-line options override values from the file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// CAN interface name (SocketCAN source)
    #[arg(short, long, conflicts_with_all = ["replay", "simulate"])]
    interface: Option<String>,

    /// Replay a candump log instead of reading a live bus
    #[arg(long, conflicts_with = "simulate")]
    replay: Option<PathBuf>,

    /// Pace replay by the recorded timestamps
    #[arg(long, requires = "replay")]
    realtime: bool,

    /// Generate frames from a simulated ECU
    #[arg(long)]
    simulate: bool,

    /// Channel definition file (YAML or TOML)
    #[arg(long)]
    channels: Option<PathBuf>,

    /// CAN id carrying the rotating stream (e.g., 0x5F0)
    #[arg(long)]
    source_id: Option<String>,

    /// Discard data until the first rotation marker
    #[arg(long)]
    wait_for_sync: bool,

    /// Snapshot output file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Snapshot file format
    #[arg(long, value_parser = parse_format)]
    format: Option<SinkFormat>,

    /// Publish period in milliseconds
    #[arg(long)]
    period_ms: Option<u64>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn parse_format(s: &str) -> Result<SinkFormat, String> {
    match s.to_ascii_lowercase().as_str() {
        "json" => Ok(SinkFormat::Json),
        "text" => Ok(SinkFormat::Text),
        other => Err(format!("unknown format '{}' (expected json or text)", other)),
    }
}

impl Args {
    /// Apply command-line overrides on top of the file configuration
    fn apply(&self, config: &mut DaemonConfig) {
        if let Some(interface) = &self.interface {
            config.source = SourceConfig::SocketCan(SocketCanConfig {
                interface: interface.clone(),
                ..Default::default()
            });
        }
        if let Some(path) = &self.replay {
            config.source = SourceConfig::Replay(ReplayConfig {
                realtime: self.realtime,
                ..ReplayConfig::new(path)
            });
        }
        if self.simulate {
            config.source = SourceConfig::Simulated(SimulatedConfig::default());
        }
        if let Some(channels) = &self.channels {
            config.channels_file = Some(channels.clone());
            config.channels.clear();
        }
        if let Some(source_id) = &self.source_id {
            config.decoder.source_id = source_id.clone();
        }
        if self.wait_for_sync {
            config.decoder.wait_for_sync = true;
        }
        if let Some(output) = &self.output {
            config.publisher.output = output.clone();
        }
        if let Some(format) = self.format {
            config.publisher.format = format;
        }
        if let Some(period_ms) = self.period_ms {
            config.publisher.period_ms = period_ms;
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "telemd=debug,telem_acquire=debug"
    } else {
        "telemd=info,telem_acquire=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Resolve on Ctrl-C, or SIGTERM on unix
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
                return;
            }
            Err(e) => error!(error = %e, "Failed to install SIGTERM handler"),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = match &args.config {
        Some(path) => {
            info!(path = %path.display(), "Loading config");
            DaemonConfig::load(path)?
        }
        None => DaemonConfig::default(),
    };
    args.apply(&mut config);

    let table = Arc::new(config.channel_table()?);
    info!(
        profile = table.meta().name.as_deref().unwrap_or("custom"),
        channels = table.len(),
        rotation_bytes = table.rotation_len(),
        "Channel table loaded"
    );

    let settings = AcquisitionSettings::from_config(&config.decoder, &config.publisher)?;

    let sink = FileSink::new(&config.publisher.output, config.publisher.format)
        .context("Failed to set up snapshot output")?;

    let source = create_source(&config.source, settings.source_id, &table)
        .await
        .context("Failed to open bus source")?;

    let shutdown = Shutdown::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            info!("Shutdown requested");
            shutdown.trigger();
        });
    }

    let report = Acquisition::new(source, table, settings)
        .run(Arc::new(sink), shutdown)
        .await?;

    if let Some(e) = &report.publisher_error {
        error!(error = %e, "Snapshot output stopped before shutdown");
    }

    info!(
        frames = report.decoder.frames,
        channels = report.decoder.channels,
        published = report.published,
        "telemd exiting"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_file_values() {
        let args = Args::parse_from([
            "telemd",
            "--replay",
            "run.log",
            "--realtime",
            "--source-id",
            "0x640",
            "--period-ms",
            "20",
            "--format",
            "text",
            "-o",
            "out.txt",
        ]);

        let mut config = DaemonConfig::from_toml("[publisher]\nperiod_ms = 500\n").unwrap();
        args.apply(&mut config);

        match &config.source {
            SourceConfig::Replay(replay) => {
                assert_eq!(replay.path, PathBuf::from("run.log"));
                assert!(replay.realtime);
            }
            other => panic!("unexpected source {:?}", other),
        }
        assert_eq!(config.decoder.source_id, "0x640");
        assert_eq!(config.publisher.period_ms, 20);
        assert_eq!(config.publisher.format, SinkFormat::Text);
        assert_eq!(config.publisher.output, PathBuf::from("out.txt"));
    }

    #[test]
    fn test_conflicting_sources_rejected() {
        assert!(Args::try_parse_from(["telemd", "-i", "can0", "--replay", "run.log"]).is_err());
        assert!(Args::try_parse_from(["telemd", "--realtime"]).is_err());
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(parse_format("JSON"), Ok(SinkFormat::Json));
        assert!(parse_format("xml").is_err());
    }
}

//! Telem CLI
//!
//! Command-line interface for telemetry reads:
//! - Iterate over a range frame by frame
//! - Read a whole range and summarize it per channel
//! - Generate a default config file

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use telem_client::{
    Channel, ChannelParams, ChannelRegistry, Config, DataType, FrameClient, TimeRange, TimeSpan,
    TimeStamp, AUTO_SPAN,
};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "telem")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Iterate over and read multi-channel telemetry")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Service URL, overriding the config
    #[arg(long, global = true)]
    pub url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print one line per frame returned by the remote cursor
    Iterate {
        #[command(flatten)]
        range: RangeArgs,
        /// Step per frame ("auto", "500ms", "10s", or nanoseconds).
        /// Defaults to auto when `iterator.auto_span` is set, one second otherwise
        #[arg(long)]
        span: Option<String>,
    },

    /// Read a whole range and print per-channel sample counts
    Read {
        #[command(flatten)]
        range: RangeArgs,
    },

    /// Write the default configuration template
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
pub struct RangeArgs {
    /// Channels as keys ("1,2") or name=key pairs ("pressure=2,valve=4")
    #[arg(long, value_delimiter = ',', required = true)]
    channels: Vec<String>,
    /// Sample type of the channels
    #[arg(long, default_value = "float64")]
    data_type: String,
    /// Range start ("now", RFC 3339, or nanoseconds since the epoch)
    #[arg(long)]
    start: String,
    /// Range end (default: now)
    #[arg(long, default_value = "now")]
    end: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    if let Some(url) = cli.url {
        config.client.url = url;
    }

    init_logging(&config)?;

    match cli.command {
        Commands::Config { output } => {
            let template = telem_client::config::generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, template)
                        .with_context(|| format!("writing {:?}", path))?;
                    println!("Wrote default config to {:?}", path);
                }
                None => print!("{}", template),
            }
        }

        Commands::Iterate { range, span } => {
            let span = match span {
                Some(span) => parse_span(&span)?,
                None if config.iterator.auto_span => AUTO_SPAN,
                None => TimeSpan::SECOND,
            };
            let (client, params, bounds) = setup(&config, &range)?;

            let iter = client.open_iterator(bounds, params).await?;
            let mut frames = iter.into_sequence(span);
            let mut count = 0usize;
            while let Some(frame) = frames.pull().await? {
                count += 1;
                println!("{:>6}  {}", count, frame);
            }
            println!("{} frames", count);
        }

        Commands::Read { range } => {
            let (client, params, bounds) = setup(&config, &range)?;
            let frame = client.read(bounds, params).await?;

            if frame.is_empty() {
                println!("No data in {}", bounds);
                return Ok(());
            }
            println!("{:<20} {:>8} {:>10}  {}", "Channel", "Series", "Samples", "Range");
            println!("{}", "-".repeat(70));
            for label in frame.unique_labels() {
                let series = frame.get(label.clone());
                println!(
                    "{:<20} {:>8} {:>10}  {}",
                    label.to_string(),
                    series.series().len(),
                    series.len(),
                    series.time_range()
                );
            }
        }
    }

    Ok(())
}

fn init_logging(config: &Config) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new(format!("telem_client={}", config.logging.level))
        });

    let writer = match &config.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path))?;
            BoxMakeWriter::new(std::sync::Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(writer))
            .init();
    }
    Ok(())
}

/// Build a client over a registry of the requested channels
fn setup(
    config: &Config,
    args: &RangeArgs,
) -> anyhow::Result<(FrameClient, ChannelParams, TimeRange)> {
    let data_type = parse_data_type(&args.data_type)?;
    let mut registry = ChannelRegistry::new();
    let mut keys = Vec::new();
    let mut names = Vec::new();

    for spec in &args.channels {
        match spec.split_once('=') {
            Some((name, key)) => {
                let key: u32 = key
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid channel key in {:?}", spec))?;
                registry.register(Channel::new(name.trim(), data_type).key(key));
                names.push(name.trim().to_string());
            }
            None => {
                let key: u32 = spec
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid channel key {:?}", spec))?;
                registry.register(Channel::new(key.to_string(), data_type).key(key));
                keys.push(key);
            }
        }
    }
    let params = match (keys.is_empty(), names.is_empty()) {
        (false, true) => ChannelParams::Keys(keys),
        (true, false) => ChannelParams::Names(names),
        _ => bail!("channels must be all keys or all name=key pairs"),
    };

    let start = parse_timestamp(&args.start)?;
    let end = parse_timestamp(&args.end)?;
    let bounds = TimeRange::new(start, end);
    if !bounds.is_valid() {
        bail!("range end {} is before start {}", end, start);
    }

    let client = FrameClient::connect(config, Arc::new(registry));
    Ok((client, params, bounds))
}

fn parse_timestamp(s: &str) -> anyhow::Result<TimeStamp> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("now") {
        return Ok(TimeStamp::now());
    }
    if let Ok(ns) = s.parse::<i64>() {
        return Ok(TimeStamp(ns));
    }
    let dt = DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("invalid timestamp {:?}. Use: now, RFC 3339, or nanoseconds", s))?;
    Ok(TimeStamp::from(dt.with_timezone(&Utc)))
}

fn parse_span(s: &str) -> anyhow::Result<TimeSpan> {
    let s = s.trim().to_lowercase();

    if s == "auto" {
        Ok(AUTO_SPAN)
    } else if let Some(ms) = s.strip_suffix("ms") {
        Ok(TimeSpan::millis(ms.parse()?))
    } else if let Some(secs) = s.strip_suffix('s') {
        Ok(TimeSpan::seconds(secs.parse()?))
    } else if let Some(mins) = s.strip_suffix('m') {
        Ok(TimeSpan::MINUTE * mins.parse::<i64>()?)
    } else if let Ok(ns) = s.parse::<i64>() {
        Ok(TimeSpan(ns))
    } else {
        bail!("Invalid span format: {}. Use: auto, 500ms, 10s, 5m", s)
    }
}

fn parse_data_type(s: &str) -> anyhow::Result<DataType> {
    serde_json::from_value(serde_json::Value::String(s.trim().to_lowercase()))
        .with_context(|| format!("unknown data type {:?}", s))
}

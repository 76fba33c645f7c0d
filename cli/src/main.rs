//! slicefeed CLI - tail slice streams and query single events.
//!
//! Envelopes and query results go to stdout, one JSON document per line.
//! Logs go to stderr (`RUST_LOG`, default `info`).

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use slicefeed_client::{EventProducerJournal, JournalConfig, PayloadRegistry};
use slicefeed_types::{NUMBER_OF_SLICES, Offset, SeenSet, slice_for, slice_ranges};

#[derive(Parser)]
#[command(name = "slicefeed")]
#[command(about = "Consume slice-partitioned event streams from an event producer")]
struct Cli {
    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Producer endpoint (overrides the config file)
    #[arg(long, global = true)]
    endpoint: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Subscribe to a slice range and print envelopes as they arrive
    Tail {
        #[arg(long)]
        entity_type: String,
        /// Slice range as MIN-MAX
        #[arg(long, default_value = "0-1023")]
        slices: String,
        /// Resume after this RFC3339 timestamp
        #[arg(long)]
        offset_ts: Option<String>,
        /// Seen entries at the offset timestamp, as PERSISTENCE_ID=SEQ_NR
        #[arg(long, requires = "offset_ts")]
        seen: Vec<String>,
    },
    /// Print the commit timestamp of one event
    Timestamp { persistence_id: String, seq_nr: i64 },
    /// Load one event and print its envelope
    Load { persistence_id: String, seq_nr: i64 },
    /// Print the slice of a persistence id
    Slice { persistence_id: String },
    /// Print N slice ranges covering all slices
    Ranges { count: usize },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

/// Payloads are shown as JSON when they are JSON, otherwise as base64.
fn payload_registry() -> PayloadRegistry<Value> {
    PayloadRegistry::new().with_fallback(|type_tag, bytes| {
        let value = serde_json::from_slice::<Value>(bytes)
            .unwrap_or_else(|_| json!({ "type": type_tag, "base64": STANDARD.encode(bytes) }));
        Ok(value)
    })
}

fn load_config(cli: &Cli) -> Result<JournalConfig> {
    let mut config = match &cli.config {
        Some(path) => JournalConfig::load(path)?,
        None => match &cli.endpoint {
            Some(endpoint) => JournalConfig::new(endpoint.clone()),
            None => bail!("either --config or --endpoint is required"),
        },
    };
    if let Some(endpoint) = &cli.endpoint {
        config.endpoint.clone_from(endpoint);
    }
    config.validate()?;
    Ok(config)
}

fn parse_slices(raw: &str) -> Result<(i32, i32)> {
    let (min, max) = raw
        .split_once('-')
        .with_context(|| format!("slice range must be MIN-MAX, got `{raw}`"))?;
    let min: i32 = min.trim().parse().context("invalid minimum slice")?;
    let max: i32 = max.trim().parse().context("invalid maximum slice")?;
    if min > max || max >= NUMBER_OF_SLICES || min < 0 {
        bail!("slice range must lie within 0-{}", NUMBER_OF_SLICES - 1);
    }
    Ok((min, max))
}

fn parse_offset(offset_ts: Option<&str>, seen: &[String]) -> Result<Offset> {
    let Some(raw) = offset_ts else {
        return Ok(Offset::NoOffset);
    };
    let timestamp: DateTime<Utc> = DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("invalid RFC3339 timestamp `{raw}`"))?
        .with_timezone(&Utc);

    let mut entries = SeenSet::new();
    for entry in seen {
        let (pid, seq_nr) = entry
            .rsplit_once('=')
            .with_context(|| format!("seen entry must be PERSISTENCE_ID=SEQ_NR, got `{entry}`"))?;
        let seq_nr: i64 = seq_nr
            .parse()
            .with_context(|| format!("invalid sequence number in `{entry}`"))?;
        entries.insert(pid.to_string(), seq_nr);
    }
    Ok(Offset::timestamp(timestamp, entries))
}

async fn tail(
    journal: &EventProducerJournal<Value>,
    entity_type: &str,
    slices: &str,
    offset: &Offset,
) -> Result<()> {
    let (min, max) = parse_slices(slices)?;
    let mut stream = journal.subscribe(entity_type, min, max, offset)?;

    loop {
        tokio::select! {
            next = stream.next() => match next {
                Some(Ok(envelope)) => println!("{}", serde_json::to_string(&envelope)?),
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(()),
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    tracing::info!("Interrupted, closing stream");
    stream.cancel();
    Ok(())
}

fn connect(cli: &Cli) -> Result<EventProducerJournal<Value>> {
    let config = load_config(cli)?;
    Ok(EventProducerJournal::new(&config, payload_registry())?)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Slice { persistence_id } => {
            println!("{}", slice_for(persistence_id));
        }
        Commands::Ranges { count } => {
            for range in slice_ranges(*count)? {
                println!("{}-{}", range.start(), range.end());
            }
        }
        Commands::Tail {
            entity_type,
            slices,
            offset_ts,
            seen,
        } => {
            let offset = parse_offset(offset_ts.as_deref(), seen)?;
            tail(&connect(&cli)?, entity_type, slices, &offset).await?;
        }
        Commands::Timestamp {
            persistence_id,
            seq_nr,
        } => match connect(&cli)?.timestamp_of(persistence_id, *seq_nr).await? {
            Some(timestamp) => println!("{}", timestamp.to_rfc3339()),
            None => println!("not found"),
        },
        Commands::Load {
            persistence_id,
            seq_nr,
        } => {
            let envelope = connect(&cli)?.load_envelope(persistence_id, *seq_nr).await?;
            println!("{}", serde_json::to_string(&envelope)?);
        }
    }
    Ok(())
}

//! flowmd-replay - replays recorded flow samples through the aggregator
//!
//! Reads newline-delimited JSON events and drives an [`Aggregator`] with a
//! manual clock, so a capture always produces the same reports. Reports
//! are written to stdout as `topic<TAB>json` lines; logs go to stderr.

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use flowmd_aggregator::{
    Aggregator, AggregatorConfig, FlowCounters, FlowKey, JsonReportSerializer, ManualClock,
    WriterTransport, DEFAULT_CONFIG_PATH,
};

/// Flow metadata aggregator replay tool
#[derive(Parser, Debug)]
#[command(name = "flowmd-replay")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Aggregator configuration file
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Event file, one JSON event per line ("-" for stdin)
    #[arg(short = 'i', long, default_value = "-")]
    input: String,

    /// Topic reports are published on
    #[arg(short = 't', long, default_value = "flowmd/stats")]
    topic: String,

    /// Pretty-print report JSON
    #[arg(long)]
    pretty: bool,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short = 'v', long)]
    verbose: bool,
}

/// One line of replay input.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
enum ReplayEvent {
    Activate,
    Sample {
        key: FlowKey,
        counters: FlowCounters,
    },
    /// Moves the replay clock forward.
    Advance {
        secs: u64,
    },
    Close,
    Send,
}

fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to set tracing subscriber: {}", e))
}

fn open_input(input: &str) -> Result<Box<dyn BufRead>> {
    if input == "-" {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file = File::open(input).with_context(|| format!("failed to open {}", input))?;
    Ok(Box::new(BufReader::new(file)))
}

fn apply(
    aggr: &mut Aggregator,
    clock: &ManualClock,
    topic: &str,
    event: ReplayEvent,
) -> flowmd_aggregator::Result<()> {
    match event {
        ReplayEvent::Activate => aggr.activate_window(),
        ReplayEvent::Sample { key, counters } => aggr.add_sample(&key, &counters),
        ReplayEvent::Advance { secs } => {
            clock.advance(Duration::from_secs(secs));
            Ok(())
        }
        ReplayEvent::Close => aggr.close_active_window(),
        ReplayEvent::Send => aggr.send_report(topic),
    }
}

fn run(args: Args) -> Result<()> {
    let config = AggregatorConfig::load_or_default(&args.config)
        .with_context(|| format!("invalid configuration in {}", args.config.display()))?;
    info!(
        node_id = %config.node_info.node_id,
        max_windows = config.max_windows,
        report_type = ?config.report_type,
        "starting replay"
    );

    let clock = Arc::new(ManualClock::at_epoch());
    let mut aggr = Aggregator::new(config)?.with_clock(clock.clone());
    if args.pretty {
        aggr.set_serializer(Arc::new(JsonReportSerializer::pretty()));
    }
    aggr.set_transport(Arc::new(WriterTransport::new(io::stdout())));

    let reader = open_input(&args.input)?;
    let mut events = 0usize;
    for (lineno, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {}", lineno + 1))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let event: ReplayEvent = serde_json::from_str(line)
            .with_context(|| format!("malformed event on line {}", lineno + 1))?;
        if let Err(e) = apply(&mut aggr, &clock, &args.topic, event) {
            warn!(line = lineno + 1, error = %e, "event failed");
        }
        events += 1;
    }

    if aggr.active_window().is_some() {
        warn!("input ended with a window still active; it was not reported");
    }
    aggr.log_accumulators();
    info!(events, stats = ?aggr.stats(), "replay finished");
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = init_logging(args.verbose) {
        eprintln!("flowmd-replay: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("flowmd-replay failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

//! Delta History CLI
//!
//! Replays recorded frame streams through the history engine and evaluates
//! windowed queries against them.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use delta_history::{
    capture::{load_recording, spawn_replay, CaptureFeed, Recording, DEFAULT_QUEUE_CAPACITY},
    config::Config,
    core::{evaluate, HistoryManager, Operation, QuerySpec},
    logging, VERSION,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "delta-history")]
#[command(version = VERSION)]
#[command(about = "Windowed queries over a rolling frame history", long_about = None)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use this configuration file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recording and evaluate queries against it
    Replay {
        /// Recording in JSON Lines format
        recording: PathBuf,

        #[command(flatten)]
        queries: QueryArgs,

        /// Evaluate after every N frames instead of once at the end
        #[arg(long)]
        every: Option<u64>,

        /// Pace frames by their timestamps; stop with Ctrl+C
        #[arg(long)]
        realtime: bool,
    },

    /// Summarize a recording
    Inspect {
        /// Recording in JSON Lines format
        recording: PathBuf,
    },

    /// Show configuration
    Config,
}

#[derive(Args)]
struct QueryArgs {
    /// JSON file holding an array of queries
    #[arg(long, conflicts_with_all = ["feature", "text"])]
    query: Option<PathBuf>,

    /// Feature or group to select (repeatable)
    #[arg(long)]
    feature: Vec<String>,

    /// Operation to run on the selected features
    #[arg(long, requires = "feature")]
    op: Option<Operation>,

    /// Window start in milliseconds
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    start: i64,

    /// Window end in milliseconds, or the single argument of the operation
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    end: i64,

    /// Queries in text form, e.g. `hp.min(0, 300)`
    #[arg(conflicts_with = "feature")]
    text: Vec<String>,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("Warning: {e}");
    }

    let result = match cli.command {
        Commands::Replay {
            recording,
            queries,
            every,
            realtime,
        } => cmd_replay(cli.config.as_deref(), &recording, &queries, every, realtime),
        Commands::Inspect { recording } => cmd_inspect(cli.config.as_deref(), &recording),
        Commands::Config => cmd_config(cli.config.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    config.context("failed to load configuration")
}

fn cmd_replay(
    config_path: Option<&Path>,
    recording_path: &Path,
    args: &QueryArgs,
    every: Option<u64>,
    realtime: bool,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let recording = load_recording(recording_path, config.frame_rate)
        .with_context(|| format!("failed to read recording {}", recording_path.display()))?;
    if recording.is_empty() {
        bail!("recording {} holds no frames", recording_path.display());
    }
    if every == Some(0) {
        bail!("--every must be at least 1");
    }

    let registry = config.registry(recording.width())?;
    let manager = HistoryManager::new(registry, config.engine()?)?;
    let specs = collect_queries(args, &manager)?;

    println!("Delta History v{VERSION}");
    println!(
        "Replaying {} frames from {} ({} features, run {})",
        recording.len(),
        recording_path.display(),
        manager.registry().feature_count(),
        manager.run_id()
    );
    println!();

    let running = Arc::new(AtomicBool::new(true));
    if realtime {
        ctrlc_handler(Arc::clone(&running))?;
        println!("Press Ctrl+C to stop");
        println!();
    }

    let mut feed = CaptureFeed::new(DEFAULT_QUEUE_CAPACITY);
    feed.start()?;
    let replay = spawn_replay(recording, feed.sender(), realtime, Arc::clone(&running));

    let mut stored: u64 = 0;
    loop {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        if feed.pump_one(&manager, Duration::from_millis(50)) {
            stored += 1;
            if every.is_some_and(|n| stored % n == 0) {
                report(&manager, &specs)?;
            }
        } else if replay.is_finished() && feed.queued() == 0 {
            break;
        }
    }

    feed.stop();
    running.store(false, Ordering::SeqCst);
    let sent = replay
        .join()
        .map_err(|_| anyhow::anyhow!("replay thread panicked"))?;
    tracing::info!(sent, stored, "replay finished");

    if stored == 0 {
        bail!("no frames were accepted from {}", recording_path.display());
    }
    let reported_last = match every {
        Some(n) => stored % n == 0,
        None => false,
    };
    if !reported_last {
        report(&manager, &specs)?;
    }

    println!();
    println!("{}", manager.counters().summary());
    Ok(())
}

/// Queries from a file, from flags, from text arguments, or `current` of
/// every feature when none are given.
fn collect_queries(args: &QueryArgs, manager: &HistoryManager) -> anyhow::Result<Vec<QuerySpec>> {
    if let Some(path) = &args.query {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read queries from {}", path.display()))?;
        let specs: Vec<QuerySpec> = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse queries in {}", path.display()))?;
        return Ok(specs);
    }

    if !args.feature.is_empty() {
        let names: Vec<&str> = args.feature.iter().map(String::as_str).collect();
        let op = args.op.unwrap_or(Operation::Current);
        return Ok(vec![QuerySpec::new(&names, op, args.start, args.end)]);
    }

    if !args.text.is_empty() {
        return args
            .text
            .iter()
            .map(|text| text.parse::<QuerySpec>().map_err(anyhow::Error::from))
            .collect();
    }

    Ok(manager
        .registry()
        .names()
        .map(|name| QuerySpec::new(&[name], Operation::Current, 0, 0))
        .collect())
}

fn report(manager: &HistoryManager, specs: &[QuerySpec]) -> anyhow::Result<()> {
    let view = manager.view()?;
    let at = view
        .timestamp()
        .map(|t| t.format("%H:%M:%S%.3f").to_string())
        .unwrap_or_else(|_| "-".to_string());
    println!("[frame {} | {}]", view.origin_index(), at);

    for spec in specs {
        match evaluate(&view, spec) {
            Ok(output) => println!("  {spec} = {output}"),
            Err(e) => {
                tracing::warn!(query = %spec, error = %e, "query failed");
                println!("  {spec} = error: {e}");
            }
        }
    }
    Ok(())
}

fn cmd_inspect(config_path: Option<&Path>, recording_path: &Path) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let recording = load_recording(recording_path, config.frame_rate)
        .with_context(|| format!("failed to read recording {}", recording_path.display()))?;

    println!("Recording");
    println!("=========");
    println!();
    println!("File:     {}", recording_path.display());
    println!("Frames:   {}", recording.len());
    println!(
        "Duration: {:.3}s",
        recording.duration().num_milliseconds() as f64 / 1000.0
    );
    println!("Width:    {}", recording.width());

    let ragged = recording
        .frames
        .iter()
        .filter(|frame| frame.values.len() != recording.width())
        .count();
    if ragged > 0 {
        println!("Warning:  {ragged} frames differ in width from the first frame");
    }
    println!();

    let names = column_names(&config, &recording);
    println!("{:<16} {:>12} {:>12} {:>12}", "Column", "Min", "Max", "Mean");
    for (name, summary) in names.iter().zip(recording.summarize()) {
        println!(
            "{:<16} {:>12.4} {:>12.4} {:>12.4}",
            name, summary.min, summary.max, summary.mean
        );
    }
    Ok(())
}

fn column_names(config: &Config, recording: &Recording) -> Vec<String> {
    match config.registry(recording.width()) {
        Ok(registry) if registry.feature_count() == recording.width() => {
            registry.names().map(str::to_string).collect()
        }
        _ => (0..recording.width()).map(|i| format!("f{i}")).collect(),
    }
}

fn cmd_config(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::config_path);

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", path);
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("error setting Ctrl+C handler")
}

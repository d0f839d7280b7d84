use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use previewer_core::{
    plan, PlayerConfig, PreloadManifest, PreviewParams, Simulation, TraceEvent,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

fn main() -> previewer_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Inspect { location } => run_inspect(&location, &config, cli.json),
        Commands::Simulate { location } => run_simulate(&location, config, cli.json),
        Commands::Preload { location } => run_preload(&location, cli.json),
    }
}

fn load_config(path: Option<&Path>) -> previewer_core::Result<PlayerConfig> {
    match path {
        Some(path) => PlayerConfig::load(path),
        None => Ok(PlayerConfig::default()),
    }
}

fn run_inspect(location: &str, config: &PlayerConfig, json: bool) -> previewer_core::Result<()> {
    let params = PreviewParams::from_location(location)?;
    tracing::info!(lines = params.lines.len(), "inspecting preview");
    let timeline = plan(&params, config)?;

    if json {
        return print_json(&timeline);
    }

    println!("start delay {:.3}s", timeline.start_delay);
    for line in &timeline.lines {
        let clamped = if line.rate != line.speed { " (clamped)" } else { "" };
        println!(
            "line {:>3}  {:>9.3}s -> {:>9.3}s  narration {:.3}s  speed {:.4}  rate {:.4}{clamped}",
            line.index, line.start, line.end, line.audio_duration, line.speed, line.rate
        );
        for clip in &line.clips {
            let kind = if clip.placeholder { "placeholder" } else { "video" };
            println!(
                "    clip {:>3}  {:>9.3}s -> {:>9.3}s  {kind}",
                clip.index, clip.start, clip.end
            );
        }
    }
    println!("total {:.3}s", timeline.total_seconds());
    Ok(())
}

fn run_simulate(location: &str, config: PlayerConfig, json: bool) -> previewer_core::Result<()> {
    let params = PreviewParams::from_location(location)?;
    tracing::info!(lines = params.lines.len(), "simulating preview");
    let report = Simulation::new(params, config)?.run()?;

    if json {
        return print_json(&report);
    }

    for entry in &report.trace {
        match &entry.event {
            TraceEvent::Event(event) => println!("{:>9.3}s  <- {event:?}", entry.time),
            TraceEvent::Command(command) => println!("{:>9.3}s  -> {command:?}", entry.time),
        }
    }
    for line in &report.lines {
        println!(
            "line {:>3}  {:.3}s -> {:.3}s  drift {:+.6}s",
            line.index,
            line.start,
            line.end,
            line.drift()
        );
    }
    println!(
        "finished at {:.3}s after {} steps, max deviation from plan {:.9}s",
        report.finish_time, report.steps, report.max_plan_deviation
    );
    Ok(())
}

fn run_preload(location: &str, json: bool) -> previewer_core::Result<()> {
    let params = PreviewParams::from_location(location)?;
    let manifest = PreloadManifest::build(&params);
    tracing::info!(assets = manifest.len(), "built preload manifest");

    if json {
        return print_json(&manifest);
    }

    for url in manifest.urls() {
        println!("{url}");
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> previewer_core::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect and dry-run clip sync previews", long_about = None)]
struct Cli {
    /// JSON player configuration overriding the defaults.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Print machine readable JSON instead of a table.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the speed and planned timing of every line.
    Inspect {
        /// Preview page URL, or just its `#...` fragment.
        location: String,
    },
    /// Play the preview against a virtual clock and print what happens.
    Simulate {
        /// Preview page URL, or just its `#...` fragment.
        location: String,
    },
    /// List the assets the page preloads, in playback order.
    Preload {
        /// Preview page URL, or just its `#...` fragment.
        location: String,
    },
}

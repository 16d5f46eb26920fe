mod host;
mod scenarios;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use frameloop_scheduler::JobScheduler;
use host::{HostConfig, HostLoop, RunSummary};
use scenarios::{Event, EventLog, Scenario, Scheduler};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "frameloop")]
#[command(about = "Headless frame loop for the frameloop job scheduler", long_about = None)]
struct Cli {
    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive a demo scenario through the scheduler
    Run {
        /// Simulated frames per second; each tick advances 1/fps seconds
        #[arg(long, default_value_t = 60.0)]
        fps: f64,
        /// Number of frames to simulate
        #[arg(long, default_value_t = 180)]
        frames: u64,
        #[arg(long, value_enum, default_value_t = Scenario::Showcase)]
        scenario: Scenario,
        #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
        report: ReportFormat,
        /// Pace frames against the wall clock instead of running flat out
        #[arg(long)]
        realtime: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct RunReport {
    scenario: Scenario,
    fps: f64,
    summary: RunSummary,
    events: Vec<Event>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            fps,
            frames,
            scenario,
            report,
            realtime,
        } => {
            if !fps.is_finite() || fps <= 0.0 {
                bail!("--fps must be a positive number, got {fps}");
            }
            if frames == 0 {
                bail!("--frames must be at least 1");
            }

            let scheduler: Scheduler = JobScheduler::new();
            let log = EventLog::default();
            scenario.install(&scheduler, &log);

            let config = HostConfig {
                fps,
                frames,
                realtime,
            };
            let summary = HostLoop::new(scheduler, config).run()?;

            let run = RunReport {
                scenario,
                fps,
                summary,
                events: log.events(),
            };
            match report {
                ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&run)?),
                ReportFormat::Text => print_text(&run),
            }
        }
    }

    Ok(())
}

fn print_text(run: &RunReport) {
    for event in &run.events {
        println!("[frame {:>5} | {:>8.3}s] {}", event.frame, event.elapsed, event.message);
    }

    let s = &run.summary;
    println!();
    println!("scenario:    {:?} at {} fps", run.scenario, run.fps);
    println!("frames:      {} ({:.3}s virtual, {:.3}s wall)", s.frames, s.elapsed, s.wall_secs);
    println!("executed:    {} ({} promoted, {} failed)", s.executed, s.promoted, s.failed);
    println!("coroutines:  {} polls", s.coroutines_polled);
    println!(
        "pending:     {} at end, {} peak{}",
        s.final_pending,
        s.peak_pending,
        if s.idle { ", idle" } else { "" }
    );
}

/// Trackplay Host - playback core over newline-delimited JSON
use anyhow::Context;
use clap::{Parser, Subcommand};
use crossbeam_channel::{unbounded, Sender};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::thread;
use trackplay_host::{
    config::HostConfig,
    protocol,
    sim::{SimEngine, SimSource},
};
use trackplay_playback::{PlayerHandle, SourceContext, Track, TrackDescriptor};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "trackplay_host=info,trackplay_playback=info";

#[derive(Parser)]
#[command(name = "trackplay-host")]
#[command(about = "Trackplay playback core driven over stdin/stdout", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read commands from stdin and write replies and events to stdout
    Run {
        /// Configuration file path
        #[arg(short, long, env = "TRACKPLAY_CONFIG")]
        config: Option<PathBuf>,
    },
    /// Validate a JSON array of track descriptors
    Check {
        /// File holding the descriptors
        file: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => {
            let config = HostConfig::load(config.as_deref())?;
            config.validate()?;
            init_tracing(config.log.filter.as_deref());
            run(config)?;
        }
        Commands::Check { file } => {
            init_tracing(None);
            check(&file)?;
        }
    }

    Ok(())
}

/// Logs go to stderr; stdout carries the protocol
fn init_tracing(filter: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter.unwrap_or(DEFAULT_LOG_FILTER)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn run(config: HostConfig) -> anyhow::Result<()> {
    tracing::info!("Starting Trackplay host");
    tracing::info!("Event buffer: {}", config.playback.event_buffer);
    tracing::info!(
        "Sim clock: {}ms tick, {}ms prepare",
        config.sim.tick_ms,
        config.sim.prepare_ms
    );

    let bitrate_kbps = config.sim.bitrate_kbps;
    let builder = move |track: &Track, context: &SourceContext| {
        SimSource::build(track, context, bitrate_kbps)
    };

    let mut ticker = None;
    let (mut handle, events) = PlayerHandle::spawn(config.playback.clone(), builder, |sink| {
        let (engine, clock) = SimEngine::new(sink, &config.sim);
        ticker = Some(clock);
        engine
    })
    .context("Failed to start playback thread")?;
    let clock = ticker
        .context("Simulated engine was not created")?
        .start()
        .context("Failed to start sim clock")?;

    // Single writer keeps reply and event lines whole
    let (lines, line_rx) = unbounded::<String>();
    let writer = thread::Builder::new()
        .name("trackplay-writer".to_string())
        .spawn(move || {
            let mut stdout = io::stdout().lock();
            for line in line_rx {
                if writeln!(stdout, "{}", line).and_then(|()| stdout.flush()).is_err() {
                    tracing::warn!("stdout closed, dropping output");
                    break;
                }
            }
        })
        .context("Failed to start writer thread")?;

    let event_lines = lines.clone();
    let forwarder = thread::Builder::new()
        .name("trackplay-events".to_string())
        .spawn(move || {
            // Ends once the player is destroyed and the buffer is drained
            while let Some(event) = events.recv() {
                send_line(&event_lines, protocol::event_line(&event));
            }
        })
        .context("Failed to start event forwarder")?;

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read stdin")?;
        let Some(response) = protocol::handle_line(&handle, &line) else {
            continue;
        };
        send_line(&lines, protocol::response_line(&response));

        if !handle.is_running() {
            break;
        }
    }

    tracing::info!("Input closed, shutting down");
    if let Err(e) = handle.destroy() {
        // Already destroyed by a command
        tracing::debug!("destroy: {}", e);
    }

    let _ = forwarder.join();
    let _ = clock.join();
    drop(lines);
    let _ = writer.join();

    Ok(())
}

fn send_line(lines: &Sender<String>, line: trackplay_host::Result<String>) {
    match line {
        Ok(line) => {
            let _ = lines.send(line);
        }
        Err(e) => tracing::error!("Failed to serialize output: {}", e),
    }
}

/// Validate descriptors and report each one
fn check(file: &Path) -> anyhow::Result<()> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let descriptors: Vec<TrackDescriptor> = serde_json::from_str(&contents)
        .with_context(|| format!("{} is not a JSON array of tracks", file.display()))?;

    let mut invalid = 0;
    for (index, descriptor) in descriptors.into_iter().enumerate() {
        let id = descriptor.id.clone();
        match Track::try_from(descriptor) {
            Ok(track) => println!(
                "ok    {:>4}  {}  {} ({})",
                index,
                track.id(),
                track.uri(),
                if track.is_remote() { "remote" } else { "local" }
            ),
            Err(e) => {
                invalid += 1;
                println!("error {:>4}  {}  {}", index, id, e);
            }
        }
    }

    if invalid > 0 {
        anyhow::bail!("{} invalid track(s) in {}", invalid, file.display());
    }
    Ok(())
}

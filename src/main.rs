// src/main.rs
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;

use sicu_monitor::drivers::{LinkHandle, SyntheticSource, WindowSnapshot};
use sicu_monitor::engine;
use sicu_monitor::recorder::CsvRecorder;
use sicu_monitor::types::EngineEvent;
use sicu_monitor::{AppConfig, LinkRegistry, SignalRole, WindowedRecorder};

#[derive(Parser, Debug)]
#[command(name = "sicu-monitor", about = "Bedside EEG/EKG acquisition monitor")]
struct Cli {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the serial ports visible right now and exit
    #[arg(long)]
    list_ports: bool,

    #[arg(long, value_enum, default_value = "eeg")]
    role: SignalRole,

    /// Port to open instead of the configured one
    #[arg(long)]
    port: Option<String>,

    /// Run without a serial link
    #[arg(long)]
    synthetic: bool,

    /// Record every accepted sample to this CSV file
    #[arg(long)]
    record: Option<PathBuf>,

    /// Stop after this many seconds (otherwise runs until the link drops or the process is interrupted)
    #[arg(long)]
    seconds: Option<u64>,

    #[arg(long, default_value_t = 1000)]
    render_every_ms: u64,
}

fn summarize(snapshot: &WindowSnapshot) -> String {
    let span = snapshot.axis_seconds().last().copied().unwrap_or(0.0);
    let latest: Vec<String> = snapshot
        .channels
        .iter()
        .filter_map(|(id, samples)| samples.last().map(|s| format!("{id}={:.1}", s.value)))
        .collect();
    format!("{} samples over {span:.1}s [{}]", snapshot.len(), latest.join(" "))
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load(path).context("loading configuration")?,
        None => AppConfig::default(),
    };
    let mut links = LinkRegistry::system(config.link);

    if cli.list_ports {
        let ports = links.list_available_ports();
        if ports.is_empty() {
            println!("<no ports available>");
        }
        for port in ports {
            println!("{port}");
        }
        return Ok(());
    }

    let handle: Option<LinkHandle> = if cli.synthetic {
        None
    } else {
        let connected = match &cli.port {
            Some(port) => links.connect_to(cli.role, port),
            None => links.connect_or_detect(cli.role, &config.ports),
        };
        Some(connected.with_context(|| format!("connecting {} link", cli.role))?)
    };

    let recorder = WindowedRecorder::new(cli.role.channels(), config.window)
        .context("configuring sliding window")?;
    let source = SyntheticSource::new(cli.role.channels(), 100.0);
    let acq = engine::spawn(
        recorder,
        Box::new(source),
        config.acquisition.sample_period(),
        handle.clone(),
    )
    .context("starting acquisition thread")?;

    if let Some(path) = &cli.record {
        let csv = CsvRecorder::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        acq.start_recording(Box::new(csv));
    }

    let reader = acq.reader();
    let render_every = Duration::from_millis(cli.render_every_ms.max(1));
    let deadline = cli.seconds.map(|s| Instant::now() + Duration::from_secs(s));
    while deadline.map_or(true, |d| Instant::now() < d) && !acq.is_finished() {
        thread::sleep(render_every);
        if handle.is_some() && links.state(cli.role).is_connected() {
            // a failed probe invalidates the handle and the engine winds down
            if let Err(err) = links.check_health(cli.role) {
                log::warn!("{err}");
            }
        }
        for event in acq.drain_events() {
            match event {
                EngineEvent::SinkFailed { channel, message } => {
                    log::warn!("recording {channel} failed: {message}")
                }
                EngineEvent::LinkLost(port) => log::warn!("lost link on {port}"),
                other => log::debug!("{other:?}"),
            }
        }
        log::info!("{}", summarize(&reader.snapshot()));
    }

    acq.stop();
    if let Some(handle) = &handle {
        if let Err(err) = links.disconnect(cli.role, handle) {
            log::info!("{err}");
        }
    }
    Ok(())
}

//! Leap Gesture Agent CLI
//!
//! Real-time hand gesture recognition from Leap Motion frame streams.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use crossbeam_channel::RecvTimeoutError;
use leap_gesture_agent::{
    classifier::Classifier,
    config::{Config, ConfigError, HandsMode},
    core::{unpack_frame, ContinuityResolver, TickStatus, UnpackContext},
    params::{self, ParameterSet},
    presenter::{ConsolePresenter, Presenter},
    recording::{CycleOrder, GestureCycle, GestureSchedule, Recorder, ScheduleEvent},
    sensor::{SensorHub, SensorMessage},
    stats::SessionStats,
    Session, VERSION,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const STATS_FILE: &str = "stats.json";
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(name = "leap-gesture")]
#[command(version = VERSION)]
#[command(about = "Real-time hand gesture recognition from Leap Motion frames", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recognise gestures from the configured devices
    Run {
        /// ONNX model file (overrides the configuration)
        #[arg(long)]
        model: Option<PathBuf>,

        /// Hands to track (both, left or right)
        #[arg(long, value_parser = parse_hands)]
        hands: Option<HandsMode>,

        /// Also keep resolved frames and write them as CSV on exit
        #[arg(long)]
        record: bool,

        /// Recording file name (without extension)
        #[arg(long)]
        name: Option<String>,
    },

    /// Capture labelled frames for training
    Record {
        /// Label every frame with this gesture
        #[arg(long, conflicts_with = "cycle")]
        gesture: Option<String>,

        /// Walk through the gesture vocabulary
        #[arg(long, value_enum)]
        cycle: Option<CycleArg>,

        /// Seconds per gesture when cycling
        #[arg(long, default_value = "4")]
        delay: f64,

        /// Hands to track (both, left or right)
        #[arg(long, value_parser = parse_hands)]
        hands: Option<HandsMode>,

        /// Recording file name (without extension)
        #[arg(long)]
        name: Option<String>,
    },

    /// Validate configuration, parameter files and model
    Check {
        /// ONNX model file (overrides the configuration)
        #[arg(long)]
        model: Option<PathBuf>,
    },

    /// Show configuration summary and cumulative statistics
    Status,

    /// Show configuration
    Config,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum CycleArg {
    /// Each gesture in turn
    Sequential,
    /// No gesture between each of the others
    Alternating,
    /// Each gesture once per pass, in a new random order every pass
    Random,
}

impl From<CycleArg> for CycleOrder {
    fn from(arg: CycleArg) -> Self {
        match arg {
            CycleArg::Sequential => CycleOrder::Sequential,
            CycleArg::Alternating => CycleOrder::Alternating,
            CycleArg::Random => CycleOrder::Random,
        }
    }
}

fn parse_hands(s: &str) -> Result<HandsMode, String> {
    HandsMode::from_arg(s).ok_or_else(|| format!("expected both, left or right, got '{s}'"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Run {
            model,
            hands,
            record,
            name,
        } => cmd_run(config_path, model, hands, record, name),
        Commands::Record {
            gesture,
            cycle,
            delay,
            hands,
            name,
        } => cmd_record(config_path, gesture, cycle, delay, hands, name),
        Commands::Check { model } => cmd_check(config_path, model),
        Commands::Status => cmd_status(config_path),
        Commands::Config => cmd_config(config_path),
        Commands::Init { force } => cmd_init(config_path, force),
    }
}

fn load_config(
    path: Option<&Path>,
    model: Option<PathBuf>,
    hands: Option<HandsMode>,
) -> Result<Config> {
    let mut config = Config::load(path).context("Could not load configuration")?;
    if model.is_some() {
        config.model.path = model;
    }
    if let Some(hands) = hands {
        config.pipeline.hands = hands;
    }
    config.validate()?;
    Ok(config)
}

fn load_params(config: &Config) -> Result<ParameterSet> {
    ParameterSet::load(&config.params_dir)
        .with_context(|| format!("Could not load parameters from {:?}", config.params_dir))
}

#[cfg(feature = "onnx")]
fn load_classifier(config: &Config, params: &ParameterSet) -> Result<Option<Box<dyn Classifier>>> {
    let Some(path) = &config.model.path else {
        return Ok(None);
    };
    let features = params.expected_schema(&config.pipeline.hands.hands()).len();
    let classifier = leap_gesture_agent::OnnxClassifier::load(path, config.model.sequence_length, features)?;
    Ok(Some(Box::new(classifier)))
}

#[cfg(not(feature = "onnx"))]
fn load_classifier(config: &Config, _params: &ParameterSet) -> Result<Option<Box<dyn Classifier>>> {
    if let Some(path) = &config.model.path {
        warn!("Model {path:?} ignored: built without the onnx feature");
    }
    Ok(None)
}

fn unpack_contexts(config: &Config, frame_stride: u32) -> Vec<UnpackContext> {
    config
        .devices
        .iter()
        .enumerate()
        .map(|(device_index, device)| UnpackContext {
            device_index,
            mode: device.mode,
            frame_stride,
        })
        .collect()
}

fn cmd_run(
    config_path: Option<&Path>,
    model: Option<PathBuf>,
    hands: Option<HandsMode>,
    record: bool,
    name: Option<String>,
) -> Result<()> {
    println!("Leap Gesture Agent v{VERSION}");
    println!();

    let config = load_config(config_path, model, hands)?;
    if let Err(e) = config.ensure_directories() {
        warn!("Could not create directories: {e}");
    }
    let params = load_params(&config)?;
    let classifier = load_classifier(&config, &params)?;

    let stats = Arc::new(SessionStats::with_persistence(config.data_path.join(STATS_FILE)));
    let mut session = Session::new(&config, &params, classifier)?.with_stats(stats.clone());

    let session_id = Uuid::new_v4();
    println!("Session: {session_id}");
    println!("  Devices: {}", config.devices.len());
    println!("  Hands: {:?}", session.hands());
    println!("  Features: {}", session.schema().len());
    println!(
        "  Window: {} frames, every {} received frame(s) processed",
        config.model.sequence_length,
        session.frame_stride()
    );
    if session.has_classifier() {
        println!("  Gestures: {}", params.gestures.len());
    } else {
        println!("  No model loaded: showing movement indicators only");
    }
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;

    let mut hub = SensorHub::new(config.devices.clone(), config.transport.clone(), stats.clone());
    hub.start()?;

    let contexts = unpack_contexts(&config, session.frame_stride());
    let mut presenter = ConsolePresenter::new(&config.presenter);
    let mut recorder = record.then(|| Recorder::new(&config.export_path, name));
    let receiver = hub.receiver().clone();
    let started = Instant::now();

    let outcome: Result<(), ConfigError> = loop {
        if !running.load(Ordering::SeqCst) {
            break Ok(());
        }
        if !session.schema_fixed() && started.elapsed() >= config.pipeline.schema_timeout {
            break Err(ConfigError::SchemaTimeout(config.pipeline.schema_timeout));
        }

        match receiver.recv_timeout(POLL_TIMEOUT) {
            Ok(SensorMessage::Frame { device, frame, .. }) => {
                if !session.admit() {
                    continue;
                }
                let Some(context) = contexts.get(device) else {
                    continue;
                };
                let report = match session.tick(unpack_frame(&frame, context)) {
                    Ok(report) => report,
                    Err(e) => break Err(e),
                };

                if let (Some(recorder), Some(resolved)) = (recorder.as_mut(), &report.resolved) {
                    if matches!(report.status, TickStatus::Tracking | TickStatus::HandMissing) {
                        recorder.add_frame(&resolved.frame, None);
                    }
                }
                presenter.present(&report);
            }
            Ok(SensorMessage::Lifecycle { .. }) => {}
            Ok(SensorMessage::Status { device, status }) => presenter.device_status(device, &status),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                warn!("Sensor hub disconnected unexpectedly");
                break Ok(());
            }
        }
    };

    println!();
    println!("Shutting down...");
    hub.stop();
    finish(recorder.as_ref(), &stats);

    outcome.context("Stopped on a configuration error")
}

fn cmd_record(
    config_path: Option<&Path>,
    gesture: Option<String>,
    cycle: Option<CycleArg>,
    delay: f64,
    hands: Option<HandsMode>,
    name: Option<String>,
) -> Result<()> {
    let config = load_config(config_path, None, hands)?;
    if let Err(e) = config.ensure_directories() {
        warn!("Could not create directories: {e}");
    }

    let mut schedule = match (gesture, cycle) {
        (Some(label), _) => GestureSchedule::Fixed(label),
        (None, Some(order)) => {
            if !(delay.is_finite() && delay > 1.0) {
                bail!("--delay must be more than one second, got {delay}");
            }
            let gestures = params::read_list(&config.params_dir.join(params::GESTURES_FILE))?;
            if gestures.is_empty() {
                bail!("{} lists no gestures", params::GESTURES_FILE);
            }
            GestureSchedule::Cycle(GestureCycle::new(
                gestures,
                order.into(),
                Duration::from_secs_f64(delay),
            ))
        }
        (None, None) => GestureSchedule::Unlabelled,
    };

    let stats = Arc::new(SessionStats::with_persistence(config.data_path.join(STATS_FILE)));
    let mut recorder = Recorder::new(&config.export_path, name);
    let mut resolver =
        ContinuityResolver::new(config.pipeline.hands.hands(), config.pipeline.refresh_policy);

    println!("Leap Gesture Agent v{VERSION} - recording");
    println!("  Output: {:?}", recorder.output_path());
    println!();
    println!("Press Ctrl+C to stop and save");
    println!();

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;

    let mut hub = SensorHub::new(config.devices.clone(), config.transport.clone(), stats.clone());
    hub.start()?;

    let contexts = unpack_contexts(&config, 1);
    let mut presenter = ConsolePresenter::new(&config.presenter);
    let receiver = hub.receiver().clone();
    let started = Instant::now();

    while running.load(Ordering::SeqCst) {
        match receiver.recv_timeout(POLL_TIMEOUT) {
            Ok(SensorMessage::Frame { device, frame, .. }) => {
                let Some(context) = contexts.get(device) else {
                    continue;
                };
                let Ok(resolved) = resolver.resolve(unpack_frame(&frame, context)) else {
                    continue;
                };
                stats.record_frame_resolved();

                match schedule.advance(started.elapsed()) {
                    Some(ScheduleEvent::Prepare(label)) => println!("Prepare to perform {label}"),
                    Some(ScheduleEvent::Start(label)) => println!("###### Start {label}"),
                    None => {}
                }
                recorder.add_frame(&resolved.frame, schedule.current());
            }
            Ok(SensorMessage::Lifecycle { .. }) => {}
            Ok(SensorMessage::Status { device, status }) => presenter.device_status(device, &status),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    println!();
    println!("Shutting down...");
    hub.stop();
    finish(Some(&recorder), &stats);
    Ok(())
}

/// Flush the recording and statistics before exit.
fn finish(recorder: Option<&Recorder>, stats: &SessionStats) {
    if let Some(recorder) = recorder {
        if recorder.is_empty() {
            println!("No frames recorded.");
        } else {
            match recorder.export_csv() {
                Ok(path) => println!("Saved {} frames to {path:?}", recorder.len()),
                Err(e) => eprintln!("Error saving recording: {e}"),
            }
        }
    }

    if let Err(e) = stats.save() {
        warn!("Could not save statistics: {e}");
    }

    println!();
    println!("{}", stats.summary());
}

fn cmd_check(config_path: Option<&Path>, model: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path, model, None)?;
    let params = load_params(&config)?;
    let classifier = load_classifier(&config, &params)?;
    let session = Session::new(&config, &params, classifier)?;

    println!("Configuration OK");
    println!("  Parameters: {:?}", config.params_dir);
    println!("  Variables of interest: {} ({} dropped)", params.voi.len(), params.voi_drop.len());
    println!(
        "  Derived features: {} one-handed, {} two-handed",
        params.derived.one_handed.len(),
        params.derived.two_handed.len()
    );
    println!("  Features per frame: {}", session.schema().len());
    println!("  Gestures: {}", params.gestures.join(", "));
    println!(
        "  Model: {}",
        if session.has_classifier() {
            "loaded"
        } else {
            "none (indicators only)"
        }
    );
    info!("Feature order: {:?}", session.schema().names());
    Ok(())
}

fn cmd_status(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load(config_path)?;

    println!("Leap Gesture Agent Status");
    println!("=========================");
    println!();

    println!("Configuration:");
    for (i, device) in config.devices.iter().enumerate() {
        println!("  Device {i}: {} ({:?})", device.url, device.mode);
    }
    println!("  Parameters: {:?}", config.params_dir);
    println!(
        "  Model: {}",
        config
            .model
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "none".to_string())
    );
    println!("  Hands: {:?}", config.pipeline.hands);
    println!();

    let stats_path = config.data_path.join(STATS_FILE);
    if stats_path.exists() {
        let s = SessionStats::with_persistence(stats_path).snapshot();
        println!("Cumulative Statistics:");
        println!("  Frames received: {}", s.frames_received);
        println!("  Frames resolved: {}", s.frames_resolved);
        println!("  Continuity breaks: {}", s.continuity_breaks);
        println!("  Predictions: {}", s.predictions);
        println!("  NaN predictions: {}", s.nan_predictions);
        println!("  Classifier errors: {}", s.classifier_errors);
        println!("  Reconnect attempts: {}", s.reconnects);
    } else {
        println!("No previous session data found.");
    }
    Ok(())
}

fn cmd_config(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load(config_path)?;

    println!("Configuration");
    println!("=============");
    println!();
    println!(
        "Config file: {:?}",
        config_path.map(Path::to_path_buf).unwrap_or_else(Config::config_path)
    );
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn cmd_init(config_path: Option<&Path>, force: bool) -> Result<()> {
    let target = config_path.map(Path::to_path_buf).unwrap_or_else(Config::config_path);
    if target.exists() && !force {
        bail!("{target:?} already exists (use --force to overwrite)");
    }
    let written = Config::default().save(Some(&target))?;
    println!("Wrote default configuration to {written:?}");
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl+C handler")
}

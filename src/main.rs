pub(crate) mod audiosource;
pub(crate) mod detector;
pub(crate) mod dispatcher;
pub(crate) mod intervaltimer;
pub(crate) mod orchestrator;
pub(crate) mod playbackstate;
pub(crate) mod profile;
pub(crate) mod settings;
pub(crate) mod spectrum;
pub(crate) mod worker;

use std::sync::Arc;
use std::sync::Mutex;

use clap::Parser;

use crate::audiosource::SimulatedSource;
use crate::dispatcher::LogSink;
use crate::orchestrator::Orchestrator;
use crate::playbackstate::PlaybackState;
use crate::profile::PerformanceProfile;
use crate::settings::Settings;

#[derive(Parser)]
struct Cli {
    /// TOML settings file
    #[arg(short, long, value_name = "FILE")]
    settings_path: Option<std::path::PathBuf>,

    /// Performance profile, overrides the settings file
    #[arg(short, long, value_enum)]
    profile: Option<PerformanceProfile>,

    /// Demo signal length in seconds, overrides the settings file
    #[arg(short, long, value_name = "SECONDS")]
    duration: Option<u64>,

    /// Disable the analysis worker thread and process in-place
    #[arg(long)]
    no_worker: bool,
}

fn load_settings(args: &Cli) -> Settings {
    let mut settings = match args.settings_path.as_deref() {
        Some(path) => match Settings::load(path) {
            Ok(settings) => settings,
            Err(err) => panic!("{}", err),
        },
        None => Settings::default(),
    };

    if let Some(profile) = args.profile {
        settings.profile = profile;
    }
    if let Some(duration) = args.duration {
        settings.duration_secs = duration;
    }

    settings
}

fn main() {
    env_logger::init();
    let args = Cli::parse();
    let settings = load_settings(&args);
    let config = settings.spectrum_config();

    log::info!(
        "Starting with profile {:?}, {} bins, {} Hz tick rate",
        settings.profile,
        config.frequency_bins(),
        settings.tick_rate_hz
    );

    let playback_state = Arc::new(Mutex::new(PlaybackState::new()));

    let ctrlc_state = Arc::clone(&playback_state);
    if let Err(err) = ctrlc::set_handler(move || {
        ctrlc_state.lock().unwrap().shutdown = true;
    }) {
        panic!("Cannot install signal handler: {}", err);
    }

    let total_ticks = settings.duration_secs * settings.tick_rate_hz as u64;
    let source = SimulatedSource::new(config.frequency_bins(), total_ticks);
    let mut orchestrator = Orchestrator::new(
        source,
        LogSink::new(),
        config,
        settings.profile,
        !args.no_worker,
    );

    playback_state.lock().unwrap().request_play();

    let run_state = Arc::clone(&playback_state);
    orchestrator.run(run_state, settings.tick_rate_hz);

    // run() only returns on shutdown or after the signal ended; either way
    // the worker is stopped when the orchestrator is dropped.
    let state = playback_state.lock().unwrap();
    if state.phase() == crate::playbackstate::Phase::Playing {
        log::warn!("Exited while still playing");
    }
    log::info!("Done");
}

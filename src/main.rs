mod audio;
mod audio_api;
mod config;
mod loader;
mod middle;
mod pipeline;
mod shared;
mod transport;
mod tui;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use crossterm::terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;
use loader::SampleLoader;
use middle::Middle;
use pipeline::blob_store::BlobStore;
use pipeline::store_worker::StoreWorker;
use shared::InputEvent;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

// The terminal is in raw mode while we run, so logs go to a file
fn init_logging(config: &Config) -> anyhow::Result<()> {
    let path = config.log_file();
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_filter())),
        )
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(file))
        .init();
    Ok(())
}

fn run() -> anyhow::Result<()> {
    let config = Config::load().with_sample_dir(std::env::args().nth(1).map(PathBuf::from));
    init_logging(&config)?;

    let audio = audio::start_audio()?;
    let sample_rate = audio_api::AudioOutput::sample_rate(&audio);
    let store_path = config.store_path();
    let open_store = || {
        BlobStore::open(&store_path).with_context(|| format!("opening store {}", store_path.display()))
    };
    let store = open_store()?;
    let store_worker = StoreWorker::spawn(open_store()?, sample_rate)?;
    let loader = SampleLoader::spawn(sample_rate)?;
    info!(store = %store_path.display(), samples = %config.sample_dir().display(), "starting");

    let mut middle = Middle::new(audio, store, config.bpm(), config.sample_dir())
        .with_loader(loader)
        .with_store_worker(store_worker);

    terminal::enable_raw_mode()?;
    let _guard = RawModeGuard; // auto drops when out of scope
    let backend = CrosstermBackend::new(std::io::stdout());
    let mut term = Terminal::new(backend)?;
    term.clear()?;

    let tick_rate = std::time::Duration::from_millis(16); // ~60fps
    let mut last_tick = Instant::now();
    let mut tui_state = tui::mode::TuiState::default();
    let mut reported_errors = 0;

    loop {
        let ds = middle.display_state();
        term.draw(|frame| {
            tui::view::render(frame, frame.area(), &ds, &tui_state);
        })?;

        let events = tui::input::poll_input(tick_rate, &mut tui_state)?;
        for event in events {
            if event == InputEvent::Quit {
                middle.stop();
                info!("quit");
                return Ok(());
            }
            middle.handle_input(event);
        }

        let errors = middle.graph().output().stream_errors();
        if errors > reported_errors {
            warn!(total = errors, "audio stream errors");
            reported_errors = errors;
        }

        let elapsed = last_tick.elapsed().as_secs_f64();
        last_tick = Instant::now();
        middle.tick(elapsed);
    }
}

struct RawModeGuard;
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

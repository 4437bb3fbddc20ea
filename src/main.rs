use anyhow::{Context, Result};
use soundboard::audio::{AudioOutput, EngineConfig, Mixer, SystemClock, TransportEngine};
use soundboard::library::Library;
use soundboard::ui::TerminalUI;
use std::fs::File;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LIBRARY: &str = "soundboard.toml";

fn print_help() {
    println!("Soundboard - Terminal soundboard for one-shot and looping clips");
    println!();
    println!("USAGE:");
    println!("    soundboard [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help              Print this help message");
    println!("    --debug                 Enable debug logging");
    println!("    --library <PATH>        Library file (default: {})", DEFAULT_LIBRARY);
    println!("    --device <NAME>         Output device (default: system default)");
    println!();
    println!("CONTROLS:");
    println!("    ←↑↓→       Move selection");
    println!("    1-9        Select card 1-9");
    println!("    Space      Play/stop selected sound");
    println!("    S / X      Stop selected / stop all");
    println!("    +/-        Adjust volume");
    println!("    , / .      Seek back / forward 5s");
    println!("    L / F / C  Toggle loop / favorite / cycle color");
    println!("    [ / ]      Move card earlier / later");
    println!("    I          Import audio file");
    println!("    Del        Remove selected sound");
    println!("    /          Search");
    println!("    R          Rename");
    println!("    T / O      Toggle theme / settings");
    println!("    Q          Quit");
    println!();
    println!("Logs are written to debug.log; RUST_LOG overrides the level.");
}

fn option_value(args: &[String], flag: &str) -> Result<Option<String>> {
    match args.iter().position(|arg| arg == flag) {
        Some(index) => args
            .get(index + 1)
            .cloned()
            .map(Some)
            .with_context(|| format!("{} requires a value", flag)),
        None => Ok(None),
    }
}

fn init_logging(debug_mode: bool) -> Result<()> {
    let file = File::create("debug.log").context("could not create debug.log")?;
    let default_level = if debug_mode { "soundboard=debug" } else { "soundboard=info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.contains(&"--help".to_string()) || args.contains(&"-h".to_string()) {
        print_help();
        return Ok(());
    }

    let debug_mode = args.contains(&"--debug".to_string());
    let library_path = PathBuf::from(
        option_value(&args, "--library")?.unwrap_or_else(|| DEFAULT_LIBRARY.to_string()),
    );
    let device = option_value(&args, "--device")?;

    init_logging(debug_mode)?;

    let library = Library::load(&library_path)
        .with_context(|| format!("could not read {}", library_path.display()))?;

    // Render at the device's native rate; the stream callback handles channel layout
    let output = AudioOutput::new(device.as_deref())?;
    let config = EngineConfig {
        sample_rate: output.sample_rate(),
        ..EngineConfig::from_settings(&library.settings)
    };
    info!(
        sample_rate = config.sample_rate,
        channels = output.channels(),
        library = %library_path.display(),
        "starting soundboard"
    );

    let clock = Arc::new(SystemClock::new());
    let mixer = Arc::new(Mutex::new(Mixer::new(config.sample_rate, clock.clone())));
    let _stream = output.start(Arc::clone(&mixer))?;

    let engine = TransportEngine::with_files(config, clock, mixer);
    let mut ui = TerminalUI::new(engine, library, library_path, output.device_name())
        .context("UI creation failed")?;
    ui.run().context("UI run failed")?;
    drop(ui);

    println!("Soundboard stopped.");
    Ok(())
}

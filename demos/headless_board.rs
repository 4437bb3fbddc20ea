// Drives the transport engine without an audio device: a manual clock is
// advanced block by block while the mixer renders into a WAV file.
//
//     cargo run --example headless_board

use soundboard::audio::io::encode_wav;
use soundboard::audio::{Clock, EngineConfig, ManualClock, Mixer, TransportEngine};
use soundboard::library::Sound;
use std::f32::consts::TAU;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const RATE: u32 = 44100;
const CHANNELS: usize = 2;
const BLOCK: usize = 512;

fn tone(frequency: f32, seconds: f32) -> Vec<f32> {
    let frames = (seconds * RATE as f32) as usize;
    (0..frames)
        .map(|i| (TAU * frequency * i as f32 / RATE as f32).sin() * 0.4)
        .collect()
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("soundboard=debug").init();

    let dir = std::env::temp_dir().join("soundboard-demo");
    std::fs::create_dir_all(&dir)?;
    let beep = dir.join("beep.wav");
    let drone = dir.join("drone.wav");
    std::fs::write(&beep, encode_wav(&tone(880.0, 0.5), 1, RATE)?)?;
    std::fs::write(&drone, encode_wav(&tone(110.0, 1.5), 1, RATE)?)?;

    let clock = Arc::new(ManualClock::new());
    let mixer = Arc::new(Mutex::new(Mixer::new(RATE, clock.clone())));
    let config = EngineConfig {
        sample_rate: RATE,
        fade_in: 0.02,
        ..EngineConfig::default()
    };
    let mut engine = TransportEngine::with_files(config, clock.clone(), Arc::clone(&mixer));

    let beep = Sound::new("beep", "Beep", beep.to_string_lossy());
    let drone = Sound::new("drone", "Drone", drone.to_string_lossy())
        .with_loop(true)
        .with_volume(0.6);

    // Deferred play: starts as soon as the load lands
    engine.play(&drone);
    engine.load(&beep);
    engine.settle_loads(Duration::from_secs(5));

    let mut rendered = Vec::new();
    let mut block = vec![0.0f32; BLOCK * CHANNELS];
    let block_seconds = BLOCK as f64 / RATE as f64;

    while clock.now() < 4.0 {
        let now = clock.now();
        if (1.0..1.0 + block_seconds).contains(&now) {
            engine.play(&beep);
        }
        if (2.0..2.0 + block_seconds).contains(&now) {
            engine.set_volume("drone", 0.2);
            engine.seek("drone", 0.0);
        }
        if (3.0..3.0 + block_seconds).contains(&now) {
            engine.stop("drone");
        }

        engine.tick();
        if let Some(info) = engine.position("drone") {
            tracing::trace!(current = info.current_time, "drone position");
        }

        if let Ok(mut mixer) = mixer.lock() {
            mixer.render(&mut block, CHANNELS);
        }
        rendered.extend_from_slice(&block);
        clock.advance(block_seconds);
    }

    let out = dir.join("headless_board.wav");
    std::fs::write(&out, encode_wav(&rendered, CHANNELS as u16, RATE)?)?;
    println!("Rendered {:.1}s to {}", rendered.len() as f64 / (RATE as f64 * CHANNELS as f64), out.display());

    engine.dispose();
    Ok(())
}

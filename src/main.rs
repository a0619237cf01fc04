//! sndout test tone player
//!
//! This is a diagnostic driver for the playback backend. It stands in for
//! the engine's frame loop: it initializes the backend, fills the shared
//! ring with a sine tone that loops seamlessly, then polls the backend at
//! frame rate until the deadline.

use anyhow::Result;
use clap::Parser;
use log::info;
use std::time::{Duration, Instant};

use sndout::{AudioConfig, AudioOutput, DmaBuffer, Sample, SoundBackend};

/// Command line arguments for the test tone player
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// ALSA playback device name
    #[clap(short, long, default_value = "default")]
    device: String,

    /// Test tone frequency in Hz
    #[clap(short, long, default_value = "440.0")]
    frequency: f32,

    /// Playback duration in seconds
    #[clap(short, long, default_value = "3.0")]
    seconds: f32,

    /// Enable debug logging
    #[clap(long)]
    debug: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    if args.debug {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let mut dma = DmaBuffer::new();
    let mut backend = AudioOutput::new(AudioConfig {
        device: args.device.clone(),
        ..AudioConfig::default()
    });

    if !backend.init(&mut dma) {
        anyhow::bail!("audio output initialization failed on \"{}\"", args.device);
    }

    let tone = fill_tone(&mut dma, args.frequency);
    info!(
        "Playing a {:.1} Hz tone for {:.1} s on \"{}\"",
        tone, args.seconds, args.device
    );

    play(&mut backend, &mut dma, args.seconds);
    backend.shutdown();

    Ok(())
}

/// Drive the backend the way the engine's frame loop would
fn play(backend: &mut dyn SoundBackend, dma: &mut DmaBuffer, seconds: f32) {
    let frame_time = Duration::from_millis(16);
    let deadline = Instant::now() + Duration::from_secs_f32(seconds);

    while Instant::now() < deadline {
        backend.get_position(dma);
        backend.submit();
        std::thread::sleep(frame_time);
    }
}

/// Fill the ring with a sine tone, snapped to a whole number of cycles so
/// playback loops without a click
///
/// Returns the frequency actually written.
fn fill_tone(dma: &mut DmaBuffer, frequency: f32) -> f32 {
    let channels = dma.channels as usize;
    let frames = dma.frames();
    let cycles = (frequency * frames as f32 / dma.speed as f32).round().max(1.0);

    for frame in 0..frames {
        let phase = frame as f32 / frames as f32 * cycles * std::f32::consts::TAU;
        let pcm = (phase.sin() * 0.25 * 32767.0) as Sample;
        for channel in 0..channels {
            dma.buffer[frame * channels + channel] = pcm;
        }
    }

    cycles * dma.speed as f32 / frames as f32
}

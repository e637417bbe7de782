//! VoxSnake entrypoint: parse flags, start the voice worker, run the game.
//!
//! # Architecture
//!
//! - Game loop (main thread): keyboard, queued voice commands, simulation, drawing
//! - Voice worker: calibrate, listen, recognize, push text into the command queue

mod cli_utils;

use anyhow::Result;
use clap::Parser;
use voxsnake::{
    app::App,
    audio::{LiveMeter, Recorder},
    config::AppConfig,
    init_logging, log_debug, log_file_path,
    mic_meter::run_mic_meter,
    queue::{command_queue, CommandProducer},
    stt::build_recognizer,
    telemetry::init_tracing,
    ui::{run_app, Pacing},
    VoiceWorker,
};

use crate::cli_utils::list_input_devices;

fn main() -> Result<()> {
    let mut config = AppConfig::parse();
    if config.list_input_devices {
        list_input_devices()?;
        return Ok(());
    }

    config.validate()?;
    if config.mic_meter {
        run_mic_meter(&config)?;
        return Ok(());
    }

    init_logging(&config);
    init_tracing(&config);
    log_debug("=== VoxSnake Started ===");
    log_debug(&format!("Log file: {:?}", log_file_path()));

    let (producer, consumer) = command_queue::<String>(config.queue_capacity);
    let voice = if config.no_voice {
        log_debug("voice disabled by --no-voice");
        None
    } else {
        match start_voice(&config, producer) {
            Ok(worker) => Some(worker),
            Err(err) => {
                log_debug(&format!("voice unavailable: {err:#}"));
                tracing::warn!(error = %err, "voice_unavailable");
                eprintln!("Voice control unavailable ({err:#}); playing with the keyboard only.");
                None
            }
        }
    };

    let mut app = App::from_config(&config);
    let pacing = Pacing {
        playing: config.tick_interval(),
        menu: config.menu_interval(),
    };
    let result = run_app(&mut app, &consumer, voice.as_ref(), !config.no_voice, pacing);

    if let Some(worker) = voice {
        worker.shutdown();
    }
    drop(consumer);

    let reason = result?;
    log_debug(&format!(
        "=== VoxSnake Exiting: {} (score {}) ===",
        reason.label(),
        app.final_score()
    ));
    println!("Final score: {} ({})", app.final_score(), reason.label());
    Ok(())
}

fn start_voice(config: &AppConfig, producer: CommandProducer<String>) -> Result<VoiceWorker> {
    let meter = LiveMeter::new();
    let recorder = Recorder::new(config.input_device.as_deref())?.with_meter(meter.clone());
    let recognizer = build_recognizer(config)?;
    log_debug(&format!(
        "voice: device={} recognizer={}",
        recorder.device_name(),
        config.recognizer.label()
    ));
    VoiceWorker::spawn(
        Box::new(recorder),
        recognizer,
        producer,
        config.voice_settings(),
    )
    .map(|worker| worker.with_meter(meter))
}

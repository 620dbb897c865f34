//! Application entry point — live-transcribe.
//!
//! # Startup sequence
//!
//! 1. Parse CLI arguments and initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create [`tokio`] runtime (multi-thread, 2 workers).
//! 4. Build the recognition client ([`WebSpeechClient`]) from config.
//! 5. Open the microphone ([`MicSource`]) — fatal, non-zero exit when no
//!    input device can be acquired.
//! 6. Dispatch on mode:
//!    - `once`   — capture a single block, recognize, print, exit.
//!    - `listen` — spawn the capture worker with a console sink; stop on
//!      Ctrl-C.
//!    - `gui`    — spawn the capture worker with a channel sink and run
//!      [`eframe::run_native`] (blocks the main thread until the window is
//!      closed).

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;

use live_transcribe::{
    app::TranscribeApp,
    audio::{AudioSource, CaptureError, MicSource},
    cli::{self, Args, Mode},
    config::AppConfig,
    controller::CaptureLoop,
    recognize::{RecognitionService, RecognizeError, WebSpeechClient},
    sink::{ChannelSink, ConsoleSink, LoopEvent, ResultSink, TranscriptResult},
};

use eframe::egui;

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    // 1. CLI + logging
    let args = Args::parse();
    cli::init_logging(&args);
    log::info!("live-transcribe starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Tokio runtime (2 worker threads — capture loop + HTTP client)
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    // 4. Recognition client
    let recognizer: Arc<dyn RecognitionService> =
        Arc::new(WebSpeechClient::from_config(&config.recognition));

    // 5. Microphone — fatal at startup when unavailable
    let (mic, _stream) =
        MicSource::open(&config.audio).context("could not acquire the microphone")?;
    let source: Arc<dyn AudioSource> = Arc::new(mic);

    // 6. Mode dispatch
    match args.mode.unwrap_or(Mode::Gui) {
        Mode::Once { save } => run_once(&rt, source, recognizer, &config, save),
        Mode::Listen => run_listen(&rt, source, recognizer, &config),
        Mode::Gui => run_gui(rt, source, recognizer, config),
    }
}

// ---------------------------------------------------------------------------
// once — single utterance
// ---------------------------------------------------------------------------

fn run_once(
    rt: &tokio::runtime::Runtime,
    source: Arc<dyn AudioSource>,
    recognizer: Arc<dyn RecognitionService>,
    config: &AppConfig,
    save: Option<std::path::PathBuf>,
) -> anyhow::Result<()> {
    source
        .calibrate(config.audio.calibrate_secs)
        .context("ambient noise calibration failed")?;

    println!("Speak something...");

    let block = match source.capture_block(config.audio.block_secs, config.audio.sample_rate) {
        Ok(block) => block,
        Err(CaptureError::Timeout) => {
            println!("{}", TranscriptResult::Unrecognized.display_line());
            return Ok(());
        }
        Err(e) => return Err(e).context("audio capture failed"),
    };

    if let Some(path) = save {
        write_wav(&path, &block)?;
        log::info!("saved recording to {}", path.display());
    }

    let result = match rt.block_on(recognizer.recognize(&block)) {
        Ok(text) => TranscriptResult::Success(text),
        Err(RecognizeError::NoSpeech) => TranscriptResult::Unrecognized,
        Err(e) => TranscriptResult::ServiceError(e.to_string()),
    };
    println!("{}", result.display_line());
    Ok(())
}

/// Write a block to disk as mono 16-bit PCM WAV.
fn write_wav(path: &std::path::Path, block: &live_transcribe::audio::AudioBlock) -> anyhow::Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: block.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("could not create {}", path.display()))?;
    for &sample in &block.samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// listen — continuous console mode
// ---------------------------------------------------------------------------

fn run_listen(
    rt: &tokio::runtime::Runtime,
    source: Arc<dyn AudioSource>,
    recognizer: Arc<dyn RecognitionService>,
    config: &AppConfig,
) -> anyhow::Result<()> {
    let sink: Arc<dyn ResultSink> = Arc::new(ConsoleSink);
    let (worker, handle) = CaptureLoop::new(source, recognizer, sink, &config.audio);
    let worker = rt.spawn(worker.run());

    handle.start()?;
    println!("Listening for speech... (press Ctrl-C to stop)");

    rt.block_on(async {
        let _ = tokio::signal::ctrl_c().await;
    });
    println!();
    log::info!("interrupt received, stopping");

    // The run may already be Stopped if the audio stream died.
    let _ = handle.stop();
    handle.shutdown();
    let _ = rt.block_on(worker);
    Ok(())
}

// ---------------------------------------------------------------------------
// gui — desktop window
// ---------------------------------------------------------------------------

fn native_options(config: &AppConfig) -> eframe::NativeOptions {
    let mut vp = egui::ViewportBuilder::default()
        .with_inner_size([480.0, 420.0])
        .with_min_inner_size([360.0, 280.0]);

    if config.ui.always_on_top {
        vp = vp.with_always_on_top();
    }

    if let Some((x, y)) = config.ui.window_position {
        vp = vp.with_position(egui::pos2(x, y));
    }

    eframe::NativeOptions {
        viewport: vp,
        ..Default::default()
    }
}

fn run_gui(
    rt: tokio::runtime::Runtime,
    source: Arc<dyn AudioSource>,
    recognizer: Arc<dyn RecognitionService>,
    config: AppConfig,
) -> anyhow::Result<()> {
    let (event_tx, event_rx) = mpsc::channel::<LoopEvent>(32);
    let sink: Arc<dyn ResultSink> =
        Arc::new(ChannelSink::new(event_tx, config.ui.waveform_bars));

    let (worker, handle) = CaptureLoop::new(source, recognizer, sink, &config.audio);
    rt.spawn(worker.run());

    let app = TranscribeApp::new(handle, event_rx, &config);
    let options = native_options(&config);

    eframe::run_native(
        "Live Transcribe",
        options,
        Box::new(move |_cc| Ok(Box::new(app))),
    )
    .map_err(|e| anyhow::anyhow!("failed to run the window: {e}"))?;

    // Dropping the runtime waits for the worker to observe shutdown.
    drop(rt);
    Ok(())
}

//! Capture loop worker — drives the capture → recognize → publish cycle.
//!
//! [`CaptureLoop`] owns the three collaborators (audio source, recognition
//! service, result sink) and runs as a single dedicated tokio task.
//! [`ControllerHandle`] is the cloneable command surface used from other
//! contexts (the egui thread, a Ctrl-C handler); it validates every command
//! against the [`RunState`] transition table and wakes the worker.
//!
//! # Cycle flow
//!
//! ```text
//! ControllerHandle::start()
//!   └─▶ RunState = Listening, wake worker
//!
//! worker loop (one cycle at a time, never overlapped):
//!   ├─ spawn_blocking(source.capture_block)        ── blocking, timed out
//!   ├─ sink.publish_waveform(&block)               ── fire-and-forget
//!   ├─ recognizer.recognize(&block).await          ── bounded by client timeout
//!   └─ sink.publish(TranscriptResult)
//!
//! pause()/stop() take effect at the next cycle boundary; an in-flight
//! capture or recognition always runs to completion.
//! ```
//!
//! Per-cycle failures (no speech, service unreachable, capture timeout) are
//! mapped to [`TranscriptResult`] variants and published — they never
//! terminate the worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::audio::{AudioSource, CaptureError};
use crate::config::AudioConfig;
use crate::recognize::{RecognitionService, RecognizeError};
use crate::sink::{ResultSink, TranscriptResult};

use super::state::{LoopCommand, RunState, StateError};

// ---------------------------------------------------------------------------
// Control — state shared between handle and worker
// ---------------------------------------------------------------------------

/// Run state plus wake/shutdown signalling, shared via `Arc`.
struct Control {
    state: Mutex<RunState>,
    wake: Notify,
    shutdown: AtomicBool,
}

impl Control {
    fn new() -> Self {
        Self {
            state: Mutex::new(RunState::Idle),
            wake: Notify::new(),
            shutdown: AtomicBool::new(false),
        }
    }

    fn state(&self) -> RunState {
        *self.state.lock().unwrap()
    }

    /// Used by the worker when the run cannot continue (dead audio stream).
    /// Bypasses transition validation.
    fn force_stop(&self) {
        *self.state.lock().unwrap() = RunState::Stopped;
    }
}

// ---------------------------------------------------------------------------
// ControllerHandle
// ---------------------------------------------------------------------------

/// Cloneable command surface for a running [`CaptureLoop`].
///
/// All commands validate synchronously against the transition table in
/// [`RunState::apply`] and return [`StateError`] without touching the state
/// when rejected.
#[derive(Clone)]
pub struct ControllerHandle {
    control: Arc<Control>,
}

impl ControllerHandle {
    /// Begin a run.  Valid from `Idle` or `Stopped`.
    pub fn start(&self) -> Result<(), StateError> {
        self.command(LoopCommand::Start)
    }

    /// Suspend cycles after the current one completes.  Valid from
    /// `Listening`.
    pub fn pause(&self) -> Result<(), StateError> {
        self.command(LoopCommand::Pause)
    }

    /// Resume a paused run.  Valid from `Paused`.
    pub fn resume(&self) -> Result<(), StateError> {
        self.command(LoopCommand::Resume)
    }

    /// End the run after the current cycle (if any) completes.  Valid from
    /// `Listening` or `Paused`.
    pub fn stop(&self) -> Result<(), StateError> {
        self.command(LoopCommand::Stop)
    }

    /// Apply any [`LoopCommand`], waking the worker on success.
    pub fn command(&self, command: LoopCommand) -> Result<(), StateError> {
        {
            let mut state = self.control.state.lock().unwrap();
            *state = state.apply(command)?;
        }
        log::debug!("controller: {command:?} accepted");
        self.control.wake.notify_one();
        Ok(())
    }

    /// Current run state.
    pub fn state(&self) -> RunState {
        self.control.state()
    }

    /// Terminate the worker task entirely.
    ///
    /// Observable at the same boundaries as `stop()`: an in-flight cycle
    /// completes and publishes before the worker exits.
    pub fn shutdown(&self) {
        self.control.shutdown.store(true, Ordering::SeqCst);
        self.control.wake.notify_one();
    }
}

// ---------------------------------------------------------------------------
// CaptureLoop
// ---------------------------------------------------------------------------

/// The capture worker.  Create with [`CaptureLoop::new`], then spawn
/// [`run`](Self::run) as a tokio task.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use live_transcribe::audio::{AudioSource, MicSource};
/// use live_transcribe::config::AppConfig;
/// use live_transcribe::controller::CaptureLoop;
/// use live_transcribe::recognize::{RecognitionService, WebSpeechClient};
/// use live_transcribe::sink::{ConsoleSink, ResultSink};
///
/// # async fn example() {
/// let config = AppConfig::default();
/// let (mic, _stream) = MicSource::open(&config.audio).unwrap();
/// let source: Arc<dyn AudioSource> = Arc::new(mic);
/// let recognizer: Arc<dyn RecognitionService> =
///     Arc::new(WebSpeechClient::from_config(&config.recognition));
/// let sink: Arc<dyn ResultSink> = Arc::new(ConsoleSink);
///
/// let (worker, handle) = CaptureLoop::new(source, recognizer, sink, &config.audio);
/// tokio::spawn(worker.run());
///
/// handle.start().unwrap();
/// # }
/// ```
pub struct CaptureLoop {
    source: Arc<dyn AudioSource>,
    recognizer: Arc<dyn RecognitionService>,
    sink: Arc<dyn ResultSink>,
    control: Arc<Control>,
    /// Duration of each captured block in seconds.
    block_secs: f32,
    /// Sample rate blocks are captured at.
    sample_rate: u32,
    /// Duration of the one-shot ambient-noise calibration.
    calibrate_secs: f32,
}

impl CaptureLoop {
    /// Create a worker and its command handle.
    pub fn new(
        source: Arc<dyn AudioSource>,
        recognizer: Arc<dyn RecognitionService>,
        sink: Arc<dyn ResultSink>,
        audio: &AudioConfig,
    ) -> (Self, ControllerHandle) {
        let control = Arc::new(Control::new());
        let handle = ControllerHandle {
            control: Arc::clone(&control),
        };

        (
            Self {
                source,
                recognizer,
                sink,
                control,
                block_secs: audio.block_secs,
                sample_rate: audio.sample_rate,
                calibrate_secs: audio.calibrate_secs,
            },
            handle,
        )
    }

    // -----------------------------------------------------------------------
    // Main worker loop
    // -----------------------------------------------------------------------

    /// Run the worker until [`ControllerHandle::shutdown`] is called.
    ///
    /// Spawn this as a tokio task.  The worker suspends whenever the state
    /// is not `Listening` and is woken by handle commands; `stop()` ends the
    /// run but keeps the task alive so `start()` can begin a new one.
    pub async fn run(self) {
        // One-shot ambient-noise calibration before any cycles, as a
        // listener would adjust for background noise before speaking.
        let source = Arc::clone(&self.source);
        let secs = self.calibrate_secs;
        match tokio::task::spawn_blocking(move || source.calibrate(secs)).await {
            Ok(Ok(floor)) => log::debug!("calibration complete (ambient floor {floor:.4})"),
            Ok(Err(e)) => log::warn!("ambient noise calibration failed: {e}"),
            Err(e) => log::warn!("calibration task failed: {e}"),
        }

        loop {
            if self.control.shutdown.load(Ordering::SeqCst) {
                break;
            }

            match self.control.state() {
                RunState::Listening => self.run_cycle().await,
                // Idle, Paused, Stopped: suspend until a command arrives.
                // `notify_one` stores a permit, so a command issued between
                // the state check and this await still wakes us.
                _ => self.control.wake.notified().await,
            }
        }

        log::info!("capture loop: worker exiting");
    }

    // -----------------------------------------------------------------------
    // One cycle: capture → waveform → recognize → publish
    // -----------------------------------------------------------------------

    async fn run_cycle(&self) {
        // ── 1. Capture one block (blocking → thread pool) ────────────────
        let source = Arc::clone(&self.source);
        let (secs, rate) = (self.block_secs, self.sample_rate);

        let captured =
            match tokio::task::spawn_blocking(move || source.capture_block(secs, rate)).await {
                Ok(result) => result,
                Err(e) => {
                    log::error!("capture task failed: {e}");
                    self.sink
                        .publish(TranscriptResult::ServiceError(e.to_string()));
                    return;
                }
            };

        let block = match captured {
            Ok(block) => block,
            Err(CaptureError::Timeout) => {
                log::debug!("capture window elapsed without enough audio");
                self.sink.publish(TranscriptResult::Unrecognized);
                return;
            }
            Err(e) => {
                // A dead stream would fail every later cycle instantly; end
                // the run instead of spinning on errors.
                log::error!("audio capture failed, stopping run: {e}");
                self.sink
                    .publish(TranscriptResult::ServiceError(e.to_string()));
                self.control.force_stop();
                return;
            }
        };

        // ── 2. Waveform snapshot for visual sinks ────────────────────────
        self.sink.publish_waveform(&block);

        // ── 3. Recognition ───────────────────────────────────────────────
        let result = match self.recognizer.recognize(&block).await {
            Ok(text) => {
                log::debug!("recognized: {text:?}");
                TranscriptResult::Success(text)
            }
            Err(RecognizeError::NoSpeech) => TranscriptResult::Unrecognized,
            Err(e) => {
                log::warn!("recognition failed: {e}");
                TranscriptResult::ServiceError(e.to_string())
            }
        };

        // ── 4. Publish ───────────────────────────────────────────────────
        self.sink.publish(result);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Semaphore;

    use crate::audio::AudioBlock;
    use crate::recognize::MockRecognizer;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// Audio source that instantly returns silence blocks of the exact
    /// requested size and counts calibrations.
    struct SilenceSource {
        calibrations: AtomicUsize,
    }

    impl SilenceSource {
        fn new() -> Self {
            Self {
                calibrations: AtomicUsize::new(0),
            }
        }
    }

    impl AudioSource for SilenceSource {
        fn calibrate(&self, _duration_secs: f32) -> Result<f32, CaptureError> {
            self.calibrations.fetch_add(1, Ordering::SeqCst);
            Ok(0.0)
        }

        fn capture_block(
            &self,
            duration_secs: f32,
            sample_rate: u32,
        ) -> Result<AudioBlock, CaptureError> {
            let len = (duration_secs * sample_rate as f32) as usize;
            Ok(AudioBlock {
                samples: vec![0; len],
                sample_rate,
            })
        }
    }

    /// Audio source whose captures always time out.
    struct TimeoutSource;

    impl AudioSource for TimeoutSource {
        fn calibrate(&self, _duration_secs: f32) -> Result<f32, CaptureError> {
            Ok(0.0)
        }

        fn capture_block(&self, _: f32, _: u32) -> Result<AudioBlock, CaptureError> {
            Err(CaptureError::Timeout)
        }
    }

    /// Audio source whose stream has died.
    struct ClosedSource;

    impl AudioSource for ClosedSource {
        fn calibrate(&self, _duration_secs: f32) -> Result<f32, CaptureError> {
            Ok(0.0)
        }

        fn capture_block(&self, _: f32, _: u32) -> Result<AudioBlock, CaptureError> {
            Err(CaptureError::StreamClosed)
        }
    }

    /// Recognizer that holds each call until the test releases a permit,
    /// so tests can observe an in-flight cycle.
    struct HeldRecognizer {
        gate: Semaphore,
        inner: MockRecognizer,
    }

    impl HeldRecognizer {
        fn script(script: Vec<Result<String, RecognizeError>>) -> Self {
            Self {
                gate: Semaphore::new(0),
                inner: MockRecognizer::script(script),
            }
        }

        fn release_one(&self) {
            self.gate.add_permits(1);
        }

        fn calls(&self) -> usize {
            self.inner.calls()
        }
    }

    #[async_trait]
    impl RecognitionService for HeldRecognizer {
        async fn recognize(&self, block: &AudioBlock) -> Result<String, RecognizeError> {
            // Record the call before blocking so tests can see it in flight.
            let result = self.inner.recognize(block).await;
            self.gate.acquire().await.unwrap().forget();
            result
        }
    }

    /// Sink that records every publish.
    struct CollectingSink {
        transcripts: Mutex<Vec<TranscriptResult>>,
        waveforms: AtomicUsize,
    }

    impl CollectingSink {
        fn new() -> Self {
            Self {
                transcripts: Mutex::new(Vec::new()),
                waveforms: AtomicUsize::new(0),
            }
        }

        fn transcripts(&self) -> Vec<TranscriptResult> {
            self.transcripts.lock().unwrap().clone()
        }

        fn len(&self) -> usize {
            self.transcripts.lock().unwrap().len()
        }

        fn waveforms(&self) -> usize {
            self.waveforms.load(Ordering::SeqCst)
        }
    }

    impl ResultSink for CollectingSink {
        fn publish(&self, result: TranscriptResult) {
            self.transcripts.lock().unwrap().push(result);
        }

        fn publish_waveform(&self, _block: &AudioBlock) {
            self.waveforms.fetch_add(1, Ordering::SeqCst);
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn small_audio_config() -> AudioConfig {
        AudioConfig {
            block_secs: 0.05,
            ..AudioConfig::default()
        }
    }

    /// Poll `condition` every few milliseconds until it holds, or panic
    /// after two seconds.
    async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for: {what}"));
    }

    async fn join(worker: tokio::task::JoinHandle<()>) {
        tokio::time::timeout(Duration::from_secs(2), worker)
            .await
            .expect("worker did not exit")
            .expect("worker panicked");
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    /// Outcomes are published once per cycle, in cycle order.
    #[tokio::test]
    async fn publishes_scripted_outcomes_in_order() {
        let source = Arc::new(SilenceSource::new());
        let recognizer = Arc::new(MockRecognizer::script(vec![
            Ok("hello".into()),
            Err(RecognizeError::NoSpeech),
            Err(RecognizeError::Request("boom".into())),
        ]));
        let sink = Arc::new(CollectingSink::new());

        let (worker, handle) = CaptureLoop::new(
            source.clone(),
            recognizer.clone(),
            sink.clone(),
            &small_audio_config(),
        );
        let worker = tokio::spawn(worker.run());

        handle.start().unwrap();
        wait_until("three publishes", || sink.len() >= 3).await;
        handle.stop().unwrap();
        handle.shutdown();
        join(worker).await;

        let transcripts = sink.transcripts();
        assert_eq!(transcripts[0], TranscriptResult::Success("hello".into()));
        assert_eq!(transcripts[1], TranscriptResult::Unrecognized);
        match &transcripts[2] {
            TranscriptResult::ServiceError(msg) => assert!(msg.contains("boom"), "{msg}"),
            other => panic!("expected ServiceError, got {other:?}"),
        }
    }

    /// Calibration happens exactly once, before any cycle.
    #[tokio::test]
    async fn calibrates_once_at_startup() {
        let source = Arc::new(SilenceSource::new());
        let recognizer = Arc::new(MockRecognizer::script(vec![Ok("x".into())]));
        let sink = Arc::new(CollectingSink::new());

        let (worker, handle) = CaptureLoop::new(
            source.clone(),
            recognizer,
            sink.clone(),
            &small_audio_config(),
        );
        let worker = tokio::spawn(worker.run());

        handle.start().unwrap();
        wait_until("first publish", || sink.len() >= 1).await;
        handle.stop().unwrap();
        handle.shutdown();
        join(worker).await;

        assert_eq!(source.calibrations.load(Ordering::SeqCst), 1);
    }

    /// A 3 s block at 16 kHz reaches the service with 48 000 samples and the
    /// transcript is published exactly once.
    #[tokio::test]
    async fn three_second_block_scenario() {
        let source = Arc::new(SilenceSource::new());
        let recognizer = Arc::new(MockRecognizer::script(vec![Ok(
            "turn on the lights".into()
        )]));
        let sink = Arc::new(CollectingSink::new());

        let audio = AudioConfig {
            block_secs: 3.0,
            sample_rate: 16_000,
            ..AudioConfig::default()
        };
        let (worker, handle) =
            CaptureLoop::new(source, recognizer.clone(), sink.clone(), &audio);
        let worker = tokio::spawn(worker.run());

        handle.start().unwrap();
        wait_until("first publish", || sink.len() >= 1).await;
        handle.stop().unwrap();
        handle.shutdown();
        join(worker).await;

        let transcripts = sink.transcripts();
        assert_eq!(
            transcripts[0],
            TranscriptResult::Success("turn on the lights".into())
        );
        assert_eq!(
            transcripts
                .iter()
                .filter(|t| matches!(t, TranscriptResult::Success(_)))
                .count(),
            1
        );
        assert_eq!(recognizer.seen()[0], (48_000, 16_000));
        assert!(sink.waveforms() >= 1);
    }

    /// stop() during an in-flight cycle lets it finish, publishes exactly
    /// one more result, then no further cycles start.
    #[tokio::test]
    async fn stop_lets_in_flight_cycle_finish() {
        let source = Arc::new(SilenceSource::new());
        let recognizer = Arc::new(HeldRecognizer::script(vec![Ok("done".into())]));
        let sink = Arc::new(CollectingSink::new());

        let (worker, handle) = CaptureLoop::new(
            source,
            recognizer.clone(),
            sink.clone(),
            &small_audio_config(),
        );
        let worker = tokio::spawn(worker.run());

        handle.start().unwrap();
        wait_until("cycle in flight", || recognizer.calls() == 1).await;

        handle.stop().unwrap();
        recognizer.release_one();
        wait_until("in-flight publish", || sink.len() == 1).await;

        // Give the worker time to (incorrectly) start another cycle.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(recognizer.calls(), 1, "a cycle started after stop()");
        assert_eq!(
            sink.transcripts(),
            vec![TranscriptResult::Success("done".into())]
        );
        assert_eq!(handle.state(), RunState::Stopped);

        handle.shutdown();
        join(worker).await;
    }

    /// pause() + resume() around an in-flight cycle: no cycle is lost, none
    /// runs twice.
    #[tokio::test]
    async fn pause_resume_misses_and_duplicates_nothing() {
        let source = Arc::new(SilenceSource::new());
        let recognizer = Arc::new(HeldRecognizer::script(vec![
            Ok("one".into()),
            Ok("two".into()),
        ]));
        let sink = Arc::new(CollectingSink::new());

        let (worker, handle) = CaptureLoop::new(
            source,
            recognizer.clone(),
            sink.clone(),
            &small_audio_config(),
        );
        let worker = tokio::spawn(worker.run());

        handle.start().unwrap();
        wait_until("first cycle in flight", || recognizer.calls() == 1).await;

        // Pause and immediately resume while the cycle is still in flight.
        handle.pause().unwrap();
        handle.resume().unwrap();

        recognizer.release_one();
        wait_until("first publish", || sink.len() == 1).await;
        wait_until("second cycle in flight", || recognizer.calls() == 2).await;
        recognizer.release_one();
        wait_until("second publish", || sink.len() == 2).await;

        let transcripts = sink.transcripts();
        assert_eq!(transcripts[0], TranscriptResult::Success("one".into()));
        assert_eq!(transcripts[1], TranscriptResult::Success("two".into()));

        handle.stop().unwrap();
        // Let any in-flight third cycle drain so the worker can exit.
        recognizer.release_one();
        handle.shutdown();
        join(worker).await;
    }

    /// A capture timeout yields Unrecognized and the loop keeps going.
    #[tokio::test]
    async fn capture_timeout_yields_unrecognized_and_continues() {
        let source = Arc::new(TimeoutSource);
        let recognizer = Arc::new(MockRecognizer::script(vec![]));
        let sink = Arc::new(CollectingSink::new());

        let (worker, handle) = CaptureLoop::new(
            source,
            recognizer.clone(),
            sink.clone(),
            &small_audio_config(),
        );
        let worker = tokio::spawn(worker.run());

        handle.start().unwrap();
        wait_until("two timed-out cycles", || sink.len() >= 2).await;
        handle.stop().unwrap();
        handle.shutdown();
        join(worker).await;

        assert!(sink
            .transcripts()
            .iter()
            .all(|t| *t == TranscriptResult::Unrecognized));
        // The service is never reached for a timed-out capture.
        assert_eq!(recognizer.calls(), 0);
    }

    /// A closed stream publishes one ServiceError and force-stops the run.
    #[tokio::test]
    async fn closed_stream_force_stops_the_run() {
        let source = Arc::new(ClosedSource);
        let recognizer = Arc::new(MockRecognizer::script(vec![]));
        let sink = Arc::new(CollectingSink::new());

        let (worker, handle) =
            CaptureLoop::new(source, recognizer, sink.clone(), &small_audio_config());
        let worker = tokio::spawn(worker.run());

        handle.start().unwrap();
        wait_until("error publish", || sink.len() >= 1).await;
        wait_until("forced stop", || handle.state() == RunState::Stopped).await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sink.len(), 1, "loop kept cycling on a dead stream");
        assert!(matches!(
            sink.transcripts()[0],
            TranscriptResult::ServiceError(_)
        ));

        handle.shutdown();
        join(worker).await;
    }

    /// Invalid commands are rejected synchronously and leave state intact.
    #[tokio::test]
    async fn invalid_commands_are_rejected() {
        let source = Arc::new(SilenceSource::new());
        let recognizer = Arc::new(MockRecognizer::script(vec![]));
        let sink = Arc::new(CollectingSink::new());

        let (worker, handle) =
            CaptureLoop::new(source, recognizer, sink, &small_audio_config());
        let worker = tokio::spawn(worker.run());

        assert!(handle.resume().is_err());
        assert!(handle.pause().is_err());
        assert!(handle.stop().is_err());
        assert_eq!(handle.state(), RunState::Idle);

        handle.start().unwrap();
        assert!(handle.start().is_err(), "start while Listening must fail");
        assert_eq!(handle.state(), RunState::Listening);

        handle.stop().unwrap();
        handle.shutdown();
        join(worker).await;
    }

    /// A never-started worker exits promptly on shutdown.
    #[tokio::test]
    async fn shutdown_from_idle_exits() {
        let source = Arc::new(SilenceSource::new());
        let recognizer = Arc::new(MockRecognizer::script(vec![]));
        let sink = Arc::new(CollectingSink::new());

        let (worker, handle) =
            CaptureLoop::new(source, recognizer, sink.clone(), &small_audio_config());
        let worker = tokio::spawn(worker.run());

        handle.shutdown();
        join(worker).await;
        assert_eq!(sink.len(), 0);
    }

    /// A stopped run can be started again (new run from Stopped).
    #[tokio::test]
    async fn restart_after_stop_runs_new_cycles() {
        let source = Arc::new(SilenceSource::new());
        let recognizer = Arc::new(MockRecognizer::script(vec![
            Ok("first run".into()),
            Ok("second run".into()),
        ]));
        let sink = Arc::new(CollectingSink::new());

        let (worker, handle) = CaptureLoop::new(
            source,
            recognizer,
            sink.clone(),
            &small_audio_config(),
        );
        let worker = tokio::spawn(worker.run());

        handle.start().unwrap();
        wait_until("first run publish", || sink.len() >= 1).await;
        handle.stop().unwrap();

        let after_first = sink.len();
        handle.start().unwrap();
        wait_until("second run publish", || sink.len() > after_first).await;

        handle.stop().unwrap();
        handle.shutdown();
        join(worker).await;

        assert!(sink
            .transcripts()
            .contains(&TranscriptResult::Success("first run".into())));
        assert!(sink
            .transcripts()
            .contains(&TranscriptResult::Success("second run".into())));
    }
}

//! Per-cycle outcomes and the sinks that render them.
//!
//! The capture worker publishes one [`TranscriptResult`] per completed cycle
//! (plus a waveform snapshot for visual sinks) and never waits on a
//! consumer: [`ChannelSink`] enqueues onto a bounded channel with `try_send`
//! and drops on overflow, [`ConsoleSink`] prints directly.  This decouples
//! capture cadence from render cadence.

use tokio::sync::mpsc;

use crate::audio::{AudioBlock, WaveformData};

// ---------------------------------------------------------------------------
// TranscriptResult
// ---------------------------------------------------------------------------

/// Outcome of one capture → recognize cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptResult {
    /// The service returned a transcript.
    Success(String),
    /// The service heard no intelligible speech (or the capture timed out).
    Unrecognized,
    /// The service could not be reached or answered with a failure.
    ServiceError(String),
}

impl TranscriptResult {
    /// The user-facing line for this outcome, as printed on the console and
    /// appended to the GUI transcript area.
    pub fn display_line(&self) -> String {
        match self {
            TranscriptResult::Success(text) => format!("You said: {text}"),
            TranscriptResult::Unrecognized => "Could not understand the audio.".into(),
            TranscriptResult::ServiceError(_) => {
                "Could not reach the recognition service.".into()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ResultSink trait
// ---------------------------------------------------------------------------

/// Consumer of per-cycle outcomes.
///
/// Implementations must be `Send + Sync` and must not block the worker
/// beyond a bounded enqueue.
pub trait ResultSink: Send + Sync {
    /// Deliver one cycle's outcome.
    fn publish(&self, result: TranscriptResult);

    /// Deliver a waveform snapshot of the cycle's audio block.
    ///
    /// Default no-op — console sinks have nothing to plot.
    fn publish_waveform(&self, _block: &AudioBlock) {}
}

// ---------------------------------------------------------------------------
// LoopEvent + ChannelSink
// ---------------------------------------------------------------------------

/// Messages delivered from the worker to the GUI event channel.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopEvent {
    /// One cycle's outcome.
    Transcript(TranscriptResult),
    /// Amplitude bars for the waveform plot.
    Waveform(WaveformData),
}

/// Sink that forwards events over a bounded channel to the UI.
///
/// Sends are fire-and-forget: when the channel is full or closed the event
/// is dropped, never blocking the capture worker.
pub struct ChannelSink {
    tx: mpsc::Sender<LoopEvent>,
    /// Number of amplitude bars computed per waveform snapshot.
    waveform_bars: usize,
}

impl ChannelSink {
    /// Wrap a channel sender.  `waveform_bars` controls the resolution of
    /// the published waveform (e.g. `30` for a 30-column plot).
    pub fn new(tx: mpsc::Sender<LoopEvent>, waveform_bars: usize) -> Self {
        Self { tx, waveform_bars }
    }
}

impl ResultSink for ChannelSink {
    fn publish(&self, result: TranscriptResult) {
        if self.tx.try_send(LoopEvent::Transcript(result)).is_err() {
            log::debug!("event channel full or closed; transcript dropped");
        }
    }

    fn publish_waveform(&self, block: &AudioBlock) {
        let waveform = WaveformData::compute(&block.samples, self.waveform_bars);
        if self.tx.try_send(LoopEvent::Waveform(waveform)).is_err() {
            log::debug!("event channel full or closed; waveform dropped");
        }
    }
}

// ---------------------------------------------------------------------------
// ConsoleSink
// ---------------------------------------------------------------------------

/// Sink for the console modes: prints each outcome on its own line.
pub struct ConsoleSink;

impl ResultSink for ConsoleSink {
    fn publish(&self, result: TranscriptResult) {
        println!("{}", result.display_line());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn silence_block() -> AudioBlock {
        AudioBlock {
            samples: vec![0; 1_600],
            sample_rate: 16_000,
        }
    }

    // ---- display_line ------------------------------------------------------

    #[test]
    fn display_line_success() {
        let line = TranscriptResult::Success("hello".into()).display_line();
        assert_eq!(line, "You said: hello");
    }

    #[test]
    fn display_line_unrecognized() {
        let line = TranscriptResult::Unrecognized.display_line();
        assert!(line.contains("understand"), "{line}");
    }

    #[test]
    fn display_line_service_error() {
        let line = TranscriptResult::ServiceError("timeout".into()).display_line();
        assert!(line.contains("recognition service"), "{line}");
    }

    // ---- ChannelSink -------------------------------------------------------

    #[test]
    fn channel_sink_delivers_transcripts() {
        let (tx, mut rx) = mpsc::channel(4);
        let sink = ChannelSink::new(tx, 30);

        sink.publish(TranscriptResult::Success("hi".into()));

        assert_eq!(
            rx.try_recv().unwrap(),
            LoopEvent::Transcript(TranscriptResult::Success("hi".into()))
        );
    }

    #[test]
    fn channel_sink_computes_waveform_bars() {
        let (tx, mut rx) = mpsc::channel(4);
        let sink = ChannelSink::new(tx, 12);

        sink.publish_waveform(&silence_block());

        match rx.try_recv().unwrap() {
            LoopEvent::Waveform(w) => assert_eq!(w.bars.len(), 12),
            other => panic!("expected waveform, got {other:?}"),
        }
    }

    #[test]
    fn channel_sink_drops_when_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let sink = ChannelSink::new(tx, 30);

        sink.publish(TranscriptResult::Unrecognized);
        // Channel is full — this must drop, not block or panic.
        sink.publish(TranscriptResult::Success("late".into()));

        assert_eq!(
            rx.try_recv().unwrap(),
            LoopEvent::Transcript(TranscriptResult::Unrecognized)
        );
        assert!(rx.try_recv().is_err(), "second publish should be dropped");
    }

    #[test]
    fn channel_sink_survives_closed_receiver() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sink = ChannelSink::new(tx, 30);

        // Must not panic.
        sink.publish(TranscriptResult::Unrecognized);
        sink.publish_waveform(&silence_block());
    }

    // ---- object safety -----------------------------------------------------

    #[test]
    fn sinks_are_object_safe() {
        let _console: Box<dyn ResultSink> = Box::new(ConsoleSink);
        let (tx, _rx) = mpsc::channel(1);
        let _channel: Box<dyn ResultSink> = Box::new(ChannelSink::new(tx, 30));
    }
}

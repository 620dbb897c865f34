//! Live transcription window — egui/eframe application.
//!
//! # Architecture
//!
//! [`TranscribeApp`] is the top-level [`eframe::App`].  It owns:
//!
//! * a [`ControllerHandle`] — the four command buttons map 1:1 onto
//!   `start` / `pause` / `resume` / `stop`;
//! * the receiver end of the bounded [`LoopEvent`] channel fed by the
//!   capture worker through a `ChannelSink`.
//!
//! Each frame drains the channel without blocking, then renders a status
//! line, the command buttons, the waveform of the most recent block, and a
//! scrolling transcript area.
//!
//! # Window states
//!
//! | State | Visual |
//! |-------|--------|
//! | `Idle` | "Press Start to begin." — dim gray |
//! | `Listening` | Waveform bars animate — red indicator |
//! | `Paused` | Waveform frozen — orange indicator |
//! | `Stopped` | Transcript retained — gray indicator |

use eframe::egui;
use tokio::sync::mpsc;

use crate::config::AppConfig;
use crate::controller::{ControllerHandle, LoopCommand, RunState};
use crate::sink::LoopEvent;

// ---------------------------------------------------------------------------
// TranscribeApp
// ---------------------------------------------------------------------------

/// eframe application — the live transcription window.
pub struct TranscribeApp {
    /// Command surface of the capture worker.
    handle: ControllerHandle,
    /// Receive transcript / waveform events from the capture worker.
    event_rx: mpsc::Receiver<LoopEvent>,

    /// Accumulated transcript lines, oldest first.
    transcript: Vec<String>,
    /// Amplitude bars of the most recent block.
    waveform: Vec<f32>,
    /// Message shown when a command is rejected (should not happen while
    /// the buttons are gated on `RunState::accepts`).
    status_note: Option<String>,
}

impl TranscribeApp {
    /// Create a new [`TranscribeApp`].
    pub fn new(
        handle: ControllerHandle,
        event_rx: mpsc::Receiver<LoopEvent>,
        config: &AppConfig,
    ) -> Self {
        Self {
            handle,
            event_rx,
            transcript: Vec::new(),
            waveform: vec![0.0; config.ui.waveform_bars],
            status_note: None,
        }
    }

    // ── Channel polling ──────────────────────────────────────────────────

    /// Drain all pending loop events (non-blocking).
    fn poll_events(&mut self) {
        while let Ok(event) = self.event_rx.try_recv() {
            match event {
                LoopEvent::Transcript(result) => {
                    self.transcript.push(result.display_line());
                }
                LoopEvent::Waveform(waveform) => {
                    self.waveform = waveform.bars;
                }
            }
        }
    }

    // ── Commands ─────────────────────────────────────────────────────────

    /// Issue a command to the controller, surfacing rejections inline.
    fn issue(&mut self, command: LoopCommand) {
        match self.handle.command(command) {
            Ok(()) => self.status_note = None,
            Err(e) => {
                log::warn!("command rejected: {e}");
                self.status_note = Some(e.to_string());
            }
        }
    }

    // ── Rendering helpers ────────────────────────────────────────────────

    /// Accent colour for the current run state.
    fn state_color(state: RunState) -> egui::Color32 {
        match state {
            RunState::Idle => egui::Color32::from_rgb(120, 120, 120),
            RunState::Listening => egui::Color32::from_rgb(255, 68, 68),
            RunState::Paused => egui::Color32::from_rgb(255, 160, 60),
            RunState::Stopped => egui::Color32::from_rgb(150, 150, 150),
        }
    }

    /// Status line: state indicator plus any rejection note.
    fn draw_status(&self, ui: &mut egui::Ui, state: RunState) {
        ui.horizontal(|ui| {
            ui.label(egui::RichText::new("●").color(Self::state_color(state)));
            ui.label(
                egui::RichText::new(state.label())
                    .color(egui::Color32::from_rgb(220, 220, 220))
                    .size(14.0),
            );

            if let Some(note) = &self.status_note {
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(
                        egui::RichText::new(note.as_str())
                            .color(egui::Color32::from_rgb(255, 136, 68))
                            .size(11.0),
                    );
                });
            }
        });
    }

    /// The four command buttons, each enabled only when its transition is
    /// valid in the current state.
    fn draw_controls(&mut self, ui: &mut egui::Ui, state: RunState) {
        ui.horizontal(|ui| {
            for (label, command) in [
                ("Start", LoopCommand::Start),
                ("Pause", LoopCommand::Pause),
                ("Resume", LoopCommand::Resume),
                ("Stop", LoopCommand::Stop),
            ] {
                if ui
                    .add_enabled(state.accepts(command), egui::Button::new(label))
                    .clicked()
                {
                    self.issue(command);
                }
            }
        });
    }

    /// Draw the amplitude bar chart for the most recent block.
    fn draw_waveform(&self, ui: &mut egui::Ui) {
        let (rect, _) = ui.allocate_exact_size(
            egui::vec2(ui.available_width(), 48.0),
            egui::Sense::hover(),
        );

        let painter = ui.painter();
        let num_bars = self.waveform.len().max(1);
        let bar_width = rect.width() / num_bars as f32;

        for (i, &amplitude) in self.waveform.iter().enumerate() {
            let x = rect.left() + i as f32 * bar_width;
            let bar_height = (amplitude * rect.height()).max(2.0);
            let center_y = rect.center().y;

            painter.rect_filled(
                egui::Rect::from_center_size(
                    egui::pos2(x + bar_width / 2.0, center_y),
                    egui::vec2((bar_width * 0.65).max(1.0), bar_height),
                ),
                1.0,
                egui::Color32::from_rgb(80, 200, 120),
            );
        }
    }

    /// Scrolling transcript area; newest lines at the bottom.
    fn draw_transcript(&self, ui: &mut egui::Ui) {
        egui::ScrollArea::vertical()
            .stick_to_bottom(true)
            .auto_shrink([false, false])
            .show(ui, |ui| {
                if self.transcript.is_empty() {
                    ui.label(
                        egui::RichText::new("Press Start to begin.")
                            .color(egui::Color32::from_rgb(120, 120, 120))
                            .size(13.0),
                    );
                }
                for line in &self.transcript {
                    ui.label(
                        egui::RichText::new(line.as_str())
                            .color(egui::Color32::from_rgb(200, 200, 200))
                            .size(13.0),
                    );
                }
            });
    }
}

// ---------------------------------------------------------------------------
// eframe::App impl
// ---------------------------------------------------------------------------

impl eframe::App for TranscribeApp {
    /// Called every frame by eframe.  Polls the event channel, then renders.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_events();

        let state = self.handle.state();

        // Keep polling the channel even without input events: fast while
        // listening (waveform animation), slower otherwise.
        match state {
            RunState::Listening => ctx.request_repaint_after(std::time::Duration::from_millis(50)),
            _ => ctx.request_repaint_after(std::time::Duration::from_millis(250)),
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            self.draw_status(ui, state);
            ui.separator();
            self.draw_controls(ui, state);
            ui.add_space(6.0);
            self.draw_waveform(ui);
            ui.add_space(6.0);
            self.draw_transcript(ui);
        });
    }

    /// Shut the worker down when the window closes.
    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        log::info!("window closing, shutting down capture worker");
        self.handle.shutdown();
    }
}

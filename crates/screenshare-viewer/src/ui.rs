//! egui application for the viewer harness.
//!
//! Stream callbacks run on capture threads; they forward events over a
//! bounded channel that the UI thread drains every repaint. Frames that
//! arrive faster than the UI repaints are dropped by `try_send`, which is
//! fine for a preview.

use std::collections::VecDeque;

use eframe::egui::{self, Color32, RichText};
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use screenshare_capture::{capability, is_supported, Stream, StreamOptions};
use screenshare_core::{StreamConfig, VideoFrame};

use crate::convert;

const LOG_LINES: usize = 100;

// ── Events ─────────────────────────────────────────────────────────────────────

/// Stream callback → UI thread messages.
enum ViewerEvent {
    Started,
    Frame(VideoFrame),
    Stopped(Option<String>),
}

// ── ViewerApp ──────────────────────────────────────────────────────────────────

pub struct ViewerApp {
    // ── Configuration fields ──
    width: u32,
    height: u32,
    frame_rate: u32,

    // ── Runtime state ──
    running: bool,
    stream: Option<Stream>,
    event_rx: mpsc::Receiver<ViewerEvent>,
    /// Cloned into stream callbacks each time a stream is (re)started.
    event_tx: mpsc::Sender<ViewerEvent>,
    texture: Option<egui::TextureHandle>,
    frames_received: u64,
    fps: FpsCounter,
    last_error: Option<String>,
    logs: VecDeque<String>,

    // ── tokio handle for hosting capture sessions ──
    rt_handle: Handle,
}

impl ViewerApp {
    pub fn new(rt_handle: Handle, _cc: &eframe::CreationContext<'_>) -> Self {
        let (event_tx, event_rx) = mpsc::channel::<ViewerEvent>(64);
        let mut app = Self {
            width: 1280,
            height: 720,
            frame_rate: 30,
            running: false,
            stream: None,
            event_rx,
            event_tx,
            texture: None,
            frames_received: 0,
            fps: FpsCounter::new(),
            last_error: None,
            logs: VecDeque::new(),
            rt_handle,
        };
        match capability().backend {
            Some(backend) => app.push_log(format!("Capture backend: {backend}")),
            None => {
                app.push_log("No capture backend on this platform:".to_owned());
                for failure in &capability().failures {
                    app.push_log(format!("  {} — {}", failure.candidate, failure.reason));
                }
            }
        }
        app
    }

    fn push_log(&mut self, line: impl Into<String>) {
        self.logs.push_back(line.into());
        while self.logs.len() > LOG_LINES {
            self.logs.pop_front();
        }
    }

    fn start(&mut self) {
        if self.running {
            return;
        }

        let config = StreamConfig::new(self.width, self.height, self.frame_rate);
        let (start_tx, frame_tx, stop_tx) =
            (self.event_tx.clone(), self.event_tx.clone(), self.event_tx.clone());
        let options = StreamOptions::new(config)
            .on_start(move || {
                let _ = start_tx.try_send(ViewerEvent::Started);
            })
            .on_frame(move |frame| {
                // Drop frames when the UI is behind rather than block capture.
                let _ = frame_tx.try_send(ViewerEvent::Frame(frame));
            })
            .on_stop(move |err| {
                let _ = stop_tx.try_send(ViewerEvent::Stopped(err.map(|e| e.to_string())));
            });

        // Enter the runtime context so the session task can be spawned from
        // the egui main thread.
        let _guard = self.rt_handle.enter();
        match Stream::new(options) {
            Ok(stream) => {
                self.stream = Some(stream);
                self.running = true;
                self.frames_received = 0;
                self.last_error = None;
                self.push_log("Stream created — waiting for source selection");
            }
            Err(err) => {
                self.last_error = Some(err.to_string());
                self.push_log(format!("Start failed: {err}"));
            }
        }
    }

    fn stop(&mut self) {
        if let Some(stream) = &self.stream {
            if let Err(err) = stream.stop() {
                self.push_log(format!("Stop failed: {err}"));
            } else {
                self.push_log("Stop requested");
            }
        }
    }

    fn poll_events(&mut self, ctx: &egui::Context) {
        while let Ok(event) = self.event_rx.try_recv() {
            match event {
                ViewerEvent::Started => self.push_log("Capture started"),
                ViewerEvent::Frame(frame) => {
                    self.frames_received += 1;
                    self.fps.tick();
                    self.update_texture(ctx, &frame);
                }
                ViewerEvent::Stopped(err) => {
                    self.running = false;
                    self.stream = None;
                    match err {
                        Some(e) => {
                            self.push_log(format!("Stream stopped: {e}"));
                            self.last_error = Some(e);
                        }
                        None => self.push_log("Stream stopped"),
                    }
                }
            }
        }
    }

    fn update_texture(&mut self, ctx: &egui::Context, frame: &VideoFrame) {
        let Some(rgba) = convert::nv12_to_rgba(&frame.data, frame.width, frame.height) else {
            tracing::warn!("preview skipped: malformed frame");
            return;
        };
        let image = egui::ColorImage::from_rgba_unmultiplied(
            [frame.width as usize, frame.height as usize],
            &rgba,
        );
        match &mut self.texture {
            Some(texture) => texture.set(image, egui::TextureOptions::LINEAR),
            None => self.texture = Some(ctx.load_texture("preview", image, egui::TextureOptions::LINEAR)),
        }
    }
}

// ── eframe::App implementation ─────────────────────────────────────────────────

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_events(ctx);
        // Keep polling even when no user interaction happens.
        ctx.request_repaint_after(std::time::Duration::from_millis(33));

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.spacing_mut().item_spacing = egui::vec2(8.0, 6.0);

            // ── Title ─────────────────────────────────────────────────────
            ui.heading("ScreenShare Viewer");
            ui.separator();

            if !is_supported() {
                ui.label(
                    RichText::new("Screen capture is not supported on this platform")
                        .color(Color32::from_rgb(220, 60, 60)),
                );
            }

            // ── Configuration ─────────────────────────────────────────────
            ui.add_enabled_ui(!self.running, |ui| {
                ui.horizontal(|ui| {
                    ui.label("Width");
                    ui.add(egui::DragValue::new(&mut self.width).range(16..=7680));
                    ui.label("Height");
                    ui.add(egui::DragValue::new(&mut self.height).range(16..=4320));
                    ui.label("FPS");
                    ui.add(egui::DragValue::new(&mut self.frame_rate).range(1..=240));
                });
            });

            // ── Controls ──────────────────────────────────────────────────
            ui.horizontal(|ui| {
                let can_start = is_supported() && !self.running;
                if ui.add_enabled(can_start, egui::Button::new("Start capture")).clicked() {
                    self.start();
                }
                if ui.add_enabled(self.running, egui::Button::new("Stop")).clicked() {
                    self.stop();
                }
            });
            ui.separator();

            // ── Preview ───────────────────────────────────────────────────
            if let Some(texture) = &self.texture {
                let size = texture.size_vec2();
                let avail = ui.available_width();
                let scale = (avail / size.x).min(1.0);
                ui.image((texture.id(), size * scale));
            } else if self.running {
                ui.label(RichText::new("Waiting for frames…").color(Color32::GRAY));
            }

            // ── Stats ─────────────────────────────────────────────────────
            ui.horizontal(|ui| {
                let (dot, label) = if self.running {
                    (Color32::from_rgb(60, 200, 80), "Streaming")
                } else {
                    (Color32::from_rgb(160, 160, 160), "Stopped")
                };
                ui.label(RichText::new("●").color(dot));
                ui.label(label);
                ui.label(format!("{:.1} fps", self.fps.fps()));
                ui.label(format!("{} frames", self.frames_received));
            });
            if let Some(err) = &self.last_error {
                ui.label(RichText::new(err).color(Color32::from_rgb(220, 60, 60)));
            }
            ui.separator();

            // ── Log ───────────────────────────────────────────────────────
            egui::ScrollArea::vertical().stick_to_bottom(true).show(ui, |ui| {
                for line in &self.logs {
                    ui.label(RichText::new(line).monospace().size(12.0));
                }
            });
        });
    }
}

// ── Helpers ────────────────────────────────────────────────────────────────────

/// Rolling ~1 second FPS counter.
struct FpsCounter {
    count: u32,
    window_start: std::time::Instant,
    last_fps: f32,
}

impl FpsCounter {
    fn new() -> Self {
        Self { count: 0, window_start: std::time::Instant::now(), last_fps: 0.0 }
    }

    fn tick(&mut self) {
        self.count += 1;
    }

    /// FPS over the last ~1 second window; resets the counter.
    fn fps(&mut self) -> f32 {
        let elapsed = self.window_start.elapsed().as_secs_f32();
        if elapsed >= 0.5 {
            self.last_fps = self.count as f32 / elapsed;
            self.count = 0;
            self.window_start = std::time::Instant::now();
        }
        self.last_fps
    }
}

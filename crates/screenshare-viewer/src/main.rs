//! ScreenShare viewer — manual test harness.
//!
//! Starts a capture stream and renders it live, which is the quickest way to
//! eyeball the whole path: picker → `on_start` → NV12 frames → `on_stop`.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  ScreenShare Viewer                                  │
//! ├──────────────────────────────────────────────────────┤
//! │  Width [1280]  Height [720]  FPS [30]                │
//! │  [ Start capture ]  [ Stop ]                         │
//! ├──────────────────────────────────────────────────────┤
//! │                 (live NV12 preview)                  │
//! ├──────────────────────────────────────────────────────┤
//! │  ● Streaming   29.8 fps   1234 frames                │
//! │  log…                                                │
//! └──────────────────────────────────────────────────────┘
//! ```

mod convert;
mod ui;

fn main() -> eframe::Result<()> {
    // ── Logging ───────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .compact()
        .init();

    // ── Runtime ───────────────────────────────────────────────────────────
    // Capture sessions run on a dedicated tokio runtime thread; the egui
    // main thread only polls an event channel.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("Failed to build tokio runtime");
    let rt_handle = runtime.handle().clone();
    std::thread::Builder::new()
        .name("screenshare-runtime".into())
        .spawn(move || runtime.block_on(std::future::pending::<()>()))
        .expect("Failed to spawn runtime thread");

    // ── Window ────────────────────────────────────────────────────────────
    let window_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("ScreenShare Viewer")
            .with_inner_size([900.0, 680.0])
            .with_min_inner_size([480.0, 400.0])
            .with_resizable(true),
        ..Default::default()
    };

    eframe::run_native(
        "ScreenShare Viewer",
        window_options,
        Box::new(|cc| Ok(Box::new(ui::ViewerApp::new(rt_handle, cc)))),
    )
}

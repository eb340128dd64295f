//! XDG ScreenCast portal + PipeWire capture backend (Linux).
//!
//! This is the Native variant behind [`crate::Stream`] on Linux. The portal
//! dialog doubles as the OS capture picker: the user chooses a monitor or a
//! window there, and dismissing it terminates the stream with
//! `PickerCancelled` before `on_start` ever fires.
//!
//! Requires `xdg-desktop-portal` plus a backend (`-wlr`, `-gnome`, `-kde`)
//! running; works on both Wayland and X11 sessions.
//!
//! # Session pipeline
//!
//! ```text
//! ashpd portal ──► PipeWire node_id + remote_fd        (user picks source)
//!                          │
//!                          ▼
//!            pipewiresrc(fd=X, path=Y)
//!                          │
//!                 videoconvert ! videoscale
//!                          │
//!        video/x-raw,format=NV12,width,height,framerate
//!                          │
//!                       appsink ──► nv12::pack ──► frame channel
//!                                                        │
//!                  session task: select! { frames, stop, bus errors }
//!                                                        │
//!                                               CallbackDispatcher
//! ```

use std::os::unix::io::{IntoRawFd, RawFd};
use std::sync::Arc;

use anyhow::Context;
use ashpd::desktop::screencast::{CaptureType, Persist, ScreenCast, SourceType};
use ashpd::WindowIdentifier;
use gstreamer::prelude::*;
use gstreamer_app::{AppSink, AppSinkCallbacks};
use screenshare_core::nv12::{self, Nv12Planes};
use screenshare_core::{CallbackDispatcher, CaptureClock, PixelFormat, StreamConfig, StreamError, VideoFrame};
use tokio::sync::mpsc;

use crate::StreamOptions;

// ── Public handle ──────────────────────────────────────────────────────────────

/// Handle to a running portal capture session.
///
/// Owns only the stop channel; dropping it closes the channel, which the
/// session treats as a stop request.
pub(crate) struct PortalStream {
    stop_tx: mpsc::Sender<()>,
}

impl PortalStream {
    pub(crate) fn open(options: StreamOptions) -> Result<Self, StreamError> {
        let handle =
            tokio::runtime::Handle::try_current().map_err(|_| StreamError::RuntimeUnavailable)?;

        let (config, callbacks) = options.into_parts();
        let dispatcher = Arc::new(CallbackDispatcher::new(callbacks));
        let (stop_tx, stop_rx) = mpsc::channel::<()>(1);

        handle.spawn(run_session(config, dispatcher, stop_rx));
        Ok(Self { stop_tx })
    }

    pub fn stop(&self) -> Result<(), StreamError> {
        // Safe to call any number of times; the dispatcher fires on_stop once.
        let _ = self.stop_tx.try_send(());
        Ok(())
    }
}

// ── Session task ───────────────────────────────────────────────────────────────

async fn run_session(
    config: StreamConfig,
    dispatcher: Arc<CallbackDispatcher>,
    mut stop_rx: mpsc::Receiver<()>,
) {
    // ── 1. Source selection (portal dialog is up until the user decides) ──
    let negotiated = tokio::select! {
        _ = stop_rx.recv() => {
            tracing::info!("stop requested during source selection");
            dispatcher.stopped(None);
            return;
        }
        res = negotiate_portal() => res,
    };
    let (node_id, fd) = match negotiated {
        Ok(v) => v,
        Err(err) => {
            tracing::info!("source selection ended: {err}");
            dispatcher.stopped(Some(err));
            return;
        }
    };
    tracing::info!(node_id, fd, "PipeWire portal session granted");

    // ── 2. Capture pipeline ───────────────────────────────────────────────
    let (pipeline, mut frame_rx) = match build_pipeline(&config, fd, node_id) {
        Ok(v) => v,
        Err(err) => {
            dispatcher.stopped(Some(StreamError::SessionFailed { reason: format!("{err:#}") }));
            return;
        }
    };
    if let Err(err) = pipeline.set_state(gstreamer::State::Playing) {
        dispatcher.stopped(Some(StreamError::SessionFailed {
            reason: format!("pipeline start: {err}"),
        }));
        return;
    }
    let mut term_rx = watch_bus(&pipeline);

    dispatcher.started();

    // ── 3. Frame loop ─────────────────────────────────────────────────────
    let mut bus_done = false;
    let terminal = loop {
        tokio::select! {
            _ = stop_rx.recv() => break None,

            maybe_frame = frame_rx.recv() => match maybe_frame {
                Some(frame) => { dispatcher.frame(frame); }
                None => break Some(StreamError::SourceClosed),
            },

            maybe_term = term_rx.recv(), if !bus_done => match maybe_term {
                Some(err) => break Some(err),
                None => bus_done = true,
            },
        }
    };

    // ── 4. Teardown ───────────────────────────────────────────────────────
    let _ = pipeline.set_state(gstreamer::State::Null);
    dispatcher.stopped(terminal);
    tracing::info!("capture session ended");
}

// ── Portal negotiation ─────────────────────────────────────────────────────────

/// Ask the XDG desktop portal for a PipeWire screen-cast stream. The user
/// picks a monitor or window in the portal dialog. Returns `(node_id, fd)`.
async fn negotiate_portal() -> Result<(u32, RawFd), StreamError> {
    let proxy = ScreenCast::new().await.map_err(portal_error)?;

    let session = proxy.create_session().await.map_err(portal_error)?;

    proxy
        .select_sources(
            &session,
            CaptureType::SCREEN,
            SourceType::MONITOR | SourceType::WINDOW,
            false,          // multiple
            None,           // cursor_mode
            Persist::DoNot,
        )
        .await
        .map_err(portal_error)?;

    let response = proxy
        .start(&session, &WindowIdentifier::default())
        .await
        .map_err(portal_error)?
        .response()
        .map_err(|err| match err {
            // The user dismissed the dialog without picking a source.
            ashpd::Error::Response(_) => StreamError::PickerCancelled,
            other => portal_error(other),
        })?;

    let streams: Vec<_> = response.streams().to_vec();
    let Some(stream) = streams.first() else {
        return Err(StreamError::SessionFailed {
            reason: "no PipeWire streams returned by portal".into(),
        });
    };
    let node_id = stream.pipe_wire_node_id();

    let fd = proxy.open_pipe_wire_remote(&session).await.map_err(portal_error)?;
    Ok((node_id, fd.into_raw_fd()))
}

fn portal_error(err: ashpd::Error) -> StreamError {
    StreamError::SessionFailed { reason: format!("portal: {err}") }
}

// ── GStreamer pipeline ─────────────────────────────────────────────────────────

fn build_pipeline(
    config: &StreamConfig,
    fd: RawFd,
    node_id: u32,
) -> anyhow::Result<(gstreamer::Pipeline, mpsc::Receiver<VideoFrame>)> {
    gstreamer::init().context("GStreamer init")?;

    let w = config.width;
    let h = config.height;
    let fps = config.frame_rate;

    let desc = format!(
        "pipewiresrc fd={fd} path={node_id} do-timestamp=true \
         ! videoconvert \
         ! videoscale \
         ! video/x-raw,format=NV12,width={w},height={h},framerate={fps}/1 \
         ! appsink name=sink max-buffers=2 drop=true sync=false emit-signals=false"
    );
    tracing::debug!("GStreamer pipeline: {}", desc);

    let pipeline = gstreamer::parse::launch(&desc)
        .context("Parsing GStreamer pipeline")?
        .downcast::<gstreamer::Pipeline>()
        .map_err(|_| anyhow::anyhow!("Expected Pipeline element"))?;

    let appsink: AppSink = pipeline
        .by_name("sink")
        .context("Finding appsink 'sink'")?
        .downcast::<AppSink>()
        .map_err(|_| anyhow::anyhow!("Expected AppSink"))?;

    let (frame_tx, frame_rx) = mpsc::channel::<VideoFrame>(8);
    let clock = CaptureClock::start();

    appsink.set_callbacks(
        AppSinkCallbacks::builder()
            .new_sample(move |sink| {
                let sample = sink.pull_sample().map_err(|_| gstreamer::FlowError::Eos)?;
                let buffer = sample.buffer().ok_or(gstreamer::FlowError::Error)?;
                // Pipeline PTS is already on a monotonic synchronization
                // clock; fall back to the session clock when it is missing.
                let timestamp = buffer
                    .pts()
                    .map(|t| t.nseconds() as f64 / 1e9)
                    .unwrap_or_else(|| clock.timestamp());

                let caps = sample.caps().ok_or(gstreamer::FlowError::Error)?;
                let info = gstreamer_video::VideoInfo::from_caps(caps)
                    .map_err(|_| gstreamer::FlowError::Error)?;
                let vframe = gstreamer_video::VideoFrameRef::from_buffer_ref_readable(buffer, &info)
                    .map_err(|_| gstreamer::FlowError::Error)?;

                let y = vframe.plane_data(0).map_err(|_| gstreamer::FlowError::Error)?;
                let cbcr = vframe.plane_data(1).map_err(|_| gstreamer::FlowError::Error)?;
                let planes = Nv12Planes::new(
                    y,
                    info.stride()[0] as usize,
                    cbcr,
                    info.stride()[1] as usize,
                );

                let (width, height) = (info.width(), info.height());
                let data = match nv12::pack(planes, width, height) {
                    Ok(data) => data,
                    Err(err) => {
                        tracing::warn!("dropping frame: {err}");
                        return Ok(gstreamer::FlowSuccess::Ok);
                    }
                };

                let frame = VideoFrame { data, format: PixelFormat::Nv12, width, height, timestamp };
                if frame_tx.blocking_send(frame).is_err() {
                    return Err(gstreamer::FlowError::Flushing);
                }
                Ok(gstreamer::FlowSuccess::Ok)
            })
            .build(),
    );

    Ok((pipeline, frame_rx))
}

// ── Bus watcher ────────────────────────────────────────────────────────────────

/// Watch the pipeline bus and forward the first terminal condition.
/// EOS means the source went away (window closed, sharing revoked).
fn watch_bus(pipeline: &gstreamer::Pipeline) -> mpsc::Receiver<StreamError> {
    let (term_tx, term_rx) = mpsc::channel::<StreamError>(1);
    let pipeline_weak = pipeline.downgrade();

    tokio::task::spawn_blocking(move || loop {
        let Some(pipeline) = pipeline_weak.upgrade() else { break };
        let Some(bus) = pipeline.bus() else { break };
        drop(pipeline);

        match bus.timed_pop(gstreamer::ClockTime::from_seconds(1)) {
            Some(msg) => match msg.view() {
                gstreamer::MessageView::Eos(_) => {
                    tracing::info!("GStreamer pipeline EOS");
                    let _ = term_tx.blocking_send(StreamError::SourceClosed);
                    break;
                }
                gstreamer::MessageView::Error(e) => {
                    tracing::error!("GStreamer error: {}", e.error());
                    let _ = term_tx.blocking_send(StreamError::SessionFailed {
                        reason: e.error().to_string(),
                    });
                    break;
                }
                _ => {}
            },
            None => {} // poll timeout, keep looping until the pipeline drops
        }
    });

    term_rx
}

//! ScreenCaptureKit capture backend (macOS 12.3+).
//!
//! The Native variant behind [`crate::Stream`] on macOS. Streams the primary
//! display as NV12 (`420v`) at the configured geometry and rate; sample
//! buffers are repacked through `nv12::pack` so delivered frames carry no
//! row padding.
//!
//! The `screencapturekit` crate does not surface `SCContentSharingPicker`,
//! so source selection is not interactive here: the primary display is
//! captured after the permission check.
// TODO: move source selection to SCContentSharingPicker when the
// screencapturekit crate exposes it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use core_media_rs::cm_sample_buffer::CMSampleBuffer;
use core_media_rs::cm_time::CMTime;
use screencapturekit::shareable_content::SCShareableContent;
use screencapturekit::stream::configuration::pixel_format::PixelFormat as SckPixelFormat;
use screencapturekit::stream::configuration::SCStreamConfiguration;
use screencapturekit::stream::content_filter::SCContentFilter;
use screencapturekit::stream::output_trait::SCStreamOutputTrait;
use screencapturekit::stream::output_type::SCStreamOutputType;
use screencapturekit::stream::SCStream;
use screenshare_core::nv12::{self, Nv12Planes};
use screenshare_core::{CallbackDispatcher, CaptureClock, PixelFormat, StreamError, VideoFrame};

use crate::StreamOptions;

// ── Public handle ──────────────────────────────────────────────────────────────

pub(crate) struct SckStream {
    stream: Mutex<SCStream>,
    dispatcher: Arc<CallbackDispatcher>,
    stopped: AtomicBool,
}

impl SckStream {
    pub(crate) fn open(options: StreamOptions) -> Result<Self, StreamError> {
        let (config, callbacks) = options.into_parts();
        let dispatcher = Arc::new(CallbackDispatcher::new(callbacks));

        // Fails without the screen-recording TCC grant.
        let content = SCShareableContent::get().map_err(|e| StreamError::PermissionDenied {
            reason: format!("shareable content unavailable: {e:?}"),
        })?;
        let mut displays = content.displays();
        if displays.is_empty() {
            return Err(StreamError::SessionFailed { reason: "no displays available".into() });
        }
        let display = displays.remove(0);

        // kCMTimeFlags_Valid; 1/fps caps delivery at the configured rate.
        let frame_interval =
            CMTime { value: 1, timescale: config.frame_rate as i32, flags: 1, epoch: 0 };
        let sc_config = SCStreamConfiguration::new()
            .set_width(config.width)
            .and_then(|c| c.set_height(config.height))
            .and_then(|c| c.set_pixel_format(SckPixelFormat::YCbCr_420v))
            .and_then(|c| c.set_minimum_frame_interval(&frame_interval))
            .map_err(|e| StreamError::SessionFailed {
                reason: format!("stream configuration rejected: {e:?}"),
            })?;

        let filter = SCContentFilter::new().with_display_excluding_windows(&display, &[]);

        let mut stream = SCStream::new(&filter, &sc_config);
        stream.add_output_handler(
            FrameOutput { dispatcher: Arc::clone(&dispatcher), clock: CaptureClock::start() },
            SCStreamOutputType::Screen,
        );
        stream.start_capture().map_err(|e| StreamError::SessionFailed {
            reason: format!("start capture: {e:?}"),
        })?;
        tracing::info!(width = config.width, height = config.height, "SCK capture started");

        dispatcher.started();
        Ok(Self { stream: Mutex::new(stream), dispatcher, stopped: AtomicBool::new(false) })
    }

    pub fn stop(&self) -> Result<(), StreamError> {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            if let Ok(mut stream) = self.stream.lock() {
                if let Err(e) = stream.stop_capture() {
                    tracing::warn!("stop capture: {e:?}");
                }
            }
            self.dispatcher.stopped(None);
        }
        Ok(())
    }
}

impl Drop for SckStream {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

// ── Frame output ───────────────────────────────────────────────────────────────

struct FrameOutput {
    dispatcher: Arc<CallbackDispatcher>,
    clock: CaptureClock,
}

impl SCStreamOutputTrait for FrameOutput {
    fn did_output_sample_buffer(&self, sample: CMSampleBuffer, of_type: SCStreamOutputType) {
        if of_type != SCStreamOutputType::Screen {
            return;
        }
        match frame_from_sample(&sample, &self.clock) {
            Ok(frame) => {
                self.dispatcher.frame(frame);
            }
            Err(err) => tracing::warn!("dropping frame: {err}"),
        }
    }
}

/// Repack the sample's two NV12 planes into a tight buffer.
///
/// Plane layout follows CoreVideo for `420v`: plane 0 is luma with its own
/// bytes-per-row, plane 1 is interleaved CbCr at half height.
fn frame_from_sample(sample: &CMSampleBuffer, clock: &CaptureClock) -> Result<VideoFrame, StreamError> {
    let pixel_buffer = sample.get_pixel_buffer().map_err(|e| StreamError::InvalidFrame {
        reason: format!("no pixel buffer: {e:?}"),
    })?;

    let width = pixel_buffer.get_width() as u32;
    let height = pixel_buffer.get_height() as u32;

    let guard = pixel_buffer.lock_base_address(true).map_err(|e| StreamError::InvalidFrame {
        reason: format!("lock base address: {e:?}"),
    })?;

    let y_stride = pixel_buffer.get_bytes_per_row_of_plane(0) as usize;
    let cbcr_stride = pixel_buffer.get_bytes_per_row_of_plane(1) as usize;
    let y_rows = pixel_buffer.get_height_of_plane(0) as usize;
    let cbcr_rows = pixel_buffer.get_height_of_plane(1) as usize;

    // Borrow the mapped planes for the duration of the lock guard.
    let y = unsafe {
        std::slice::from_raw_parts(
            pixel_buffer.get_base_address_of_plane(0) as *const u8,
            y_stride * y_rows,
        )
    };
    let cbcr = unsafe {
        std::slice::from_raw_parts(
            pixel_buffer.get_base_address_of_plane(1) as *const u8,
            cbcr_stride * cbcr_rows,
        )
    };

    let data = nv12::pack(Nv12Planes::new(y, y_stride, cbcr, cbcr_stride), width, height)?;
    drop(guard);

    // Presentation timestamps come from the host synchronization clock.
    let pts = sample.get_presentation_timestamp();
    let timestamp = if pts.timescale > 0 {
        pts.value as f64 / pts.timescale as f64
    } else {
        clock.timestamp()
    };

    Ok(VideoFrame { data, format: PixelFormat::Nv12, width, height, timestamp })
}

//! screenshare-capture — interactive screen/window capture streams.
//!
//! Constructing a [`Stream`] triggers the OS-native source selection step and
//! spawns a capture session; frames arrive as tightly packed NV12 through the
//! caller's callbacks, in the order `on_start` → `on_frame`* → `on_stop`
//! (exactly one of each end, enforced by `screenshare-core`).
//!
//! # Capture backends
//!
//! | Backend | Platform | Source selection |
//! |---------|----------|------------------|
//! | XDG ScreenCast portal + PipeWire + GStreamer | Linux (Wayland + X11) | portal dialog (screen or window) |
//! | ScreenCaptureKit | macOS 12.3+ | primary display |
//! | Unsupported stub | everything else | fails with "Not supported on this platform" |
//!
//! The backend is selected once per process by [`capability`]; callers probe
//! [`is_supported`] before constructing, or handle the `NotSupported` error.
//!
//! # Usage
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), screenshare_core::StreamError> {
//! use screenshare_capture::{Stream, StreamOptions};
//! use screenshare_core::StreamConfig;
//!
//! let options = StreamOptions::new(StreamConfig::new(1280, 720, 30))
//!     .on_start(|| println!("capture started"))
//!     .on_frame(|frame| println!("frame {}x{} @ {:.3}s", frame.width, frame.height, frame.timestamp))
//!     .on_stop(|err| println!("stopped: {err:?}"));
//!
//! let stream = Stream::new(options)?;
//! // ... later
//! stream.stop()?;
//! # Ok(())
//! # }
//! ```

use screenshare_core::{StreamCallbacks, StreamConfig, StreamError, VideoFrame};

pub mod probe;

pub use probe::{capability, is_supported, Capability, ProbeFailure};

// ── Platform split ─────────────────────────────────────────────────────────────

#[cfg(target_os = "linux")]
mod portal;
#[cfg(target_os = "macos")]
mod sck;
// Compiled everywhere so its contract stays testable; only exported as the
// backend where no native implementation exists.
mod stub;

pub use stub::UnsupportedStream;

#[cfg(target_os = "linux")]
use portal::PortalStream as Backend;
#[cfg(target_os = "macos")]
use sck::SckStream as Backend;
#[cfg(not(any(target_os = "linux", target_os = "macos")))]
use stub::UnsupportedStream as Backend;

// ── StreamOptions ──────────────────────────────────────────────────────────────

/// Configuration plus callbacks for one capture stream.
///
/// Callbacks left unset default to no-ops.
pub struct StreamOptions {
    pub config: StreamConfig,
    callbacks: StreamCallbacks,
}

impl StreamOptions {
    pub fn new(config: StreamConfig) -> Self {
        Self { config, callbacks: StreamCallbacks::noop() }
    }

    /// Called once capture actually begins, after source selection.
    pub fn on_start(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.callbacks.on_start = Box::new(f);
        self
    }

    /// Called exactly once when the stream terminates; `Some` indicates
    /// abnormal termination.
    pub fn on_stop(mut self, f: impl FnMut(Option<StreamError>) + Send + 'static) -> Self {
        self.callbacks.on_stop = Box::new(f);
        self
    }

    /// Called on each captured frame.
    pub fn on_frame(mut self, f: impl FnMut(VideoFrame) + Send + 'static) -> Self {
        self.callbacks.on_frame = Box::new(f);
        self
    }

    pub(crate) fn into_parts(self) -> (StreamConfig, StreamCallbacks) {
        (self.config, self.callbacks)
    }
}

impl std::fmt::Debug for StreamOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamOptions").field("config", &self.config).finish_non_exhaustive()
    }
}

// ── Stream ─────────────────────────────────────────────────────────────────────

/// One capture session, from source selection to `stop()`.
///
/// The handle owns only a stop channel; all OS capture resources live in the
/// session and are released on stop. Dropping the handle requests the same
/// teardown as [`Stream::stop`].
pub struct Stream {
    inner: Backend,
}

impl Stream {
    /// Start a capture session and trigger source selection.
    ///
    /// Returns immediately after spawning the session; on Linux the portal
    /// dialog then opens for the user to pick a screen or window, and
    /// `on_start` fires once capture begins. Fails synchronously only when
    /// the platform is unsupported, the configuration is invalid, or no
    /// async runtime is available to host the session.
    pub fn new(options: StreamOptions) -> Result<Self, StreamError> {
        if !probe::is_supported() {
            return Err(StreamError::NotSupported);
        }
        options.config.validate()?;
        Ok(Self { inner: Backend::open(options)? })
    }

    /// Request the stream to end.
    ///
    /// Idempotent; on native backends it never fails and guarantees the
    /// single `on_stop` fires as part of teardown. Called before `on_start`,
    /// it cancels the pending source selection without delivering `on_start`.
    pub fn stop(&self) -> Result<(), StreamError> {
        self.inner.stop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The SCK backend needs no runtime and could genuinely start capturing;
    // everywhere else construction must fail synchronously outside a tokio
    // runtime: NotSupported where no backend exists, RuntimeUnavailable
    // otherwise. Callbacks must not have fired.
    #[cfg(not(target_os = "macos"))]
    #[test]
    fn new_without_runtime_or_backend_fails() {
        let options = StreamOptions::new(StreamConfig::default())
            .on_start(|| panic!("on_start fired for failed construction"))
            .on_stop(|_| panic!("on_stop fired for failed construction"));
        assert!(Stream::new(options).is_err());
    }

    #[test]
    fn invalid_config_is_rejected_before_any_capture() {
        if !is_supported() {
            return; // NotSupported wins before validation on stub platforms
        }
        let err = Stream::new(StreamOptions::new(StreamConfig::new(0, 0, 30)))
            .err()
            .expect("zero geometry must be rejected");
        assert!(matches!(err, StreamError::ConfigurationInvalid { .. }));
    }
}

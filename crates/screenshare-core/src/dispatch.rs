//! Stream lifecycle dispatch.
//!
//! Backends produce start/frame/stop events from whatever threads their OS
//! integration uses; [`CallbackDispatcher`] serializes them and enforces the
//! lifecycle the caller is promised:
//!
//! ```text
//! Pending ──started()──► Started ──stopped()──► Stopped
//!    │                      │
//!    └──────stopped()───────┘          (stop from Pending suppresses on_start)
//! ```
//!
//! - `on_start` fires at most once, never after a stop.
//! - `on_frame` fires only between `on_start` and `on_stop`.
//! - `on_stop` fires exactly once, no matter how many stop paths race.

use std::sync::Mutex;

use crate::errors::StreamError;
use crate::types::VideoFrame;

/// Caller-supplied stream callbacks.
pub struct StreamCallbacks {
    /// Invoked once capture actually begins.
    pub on_start: Box<dyn FnMut() + Send>,
    /// Invoked exactly once when the stream terminates; `Some` on abnormal
    /// termination.
    pub on_stop: Box<dyn FnMut(Option<StreamError>) + Send>,
    /// Invoked per captured frame.
    pub on_frame: Box<dyn FnMut(VideoFrame) + Send>,
}

impl StreamCallbacks {
    /// All callbacks default to no-ops.
    pub fn noop() -> Self {
        Self {
            on_start: Box::new(|| {}),
            on_stop: Box::new(|_| {}),
            on_frame: Box::new(|_| {}),
        }
    }
}

impl std::fmt::Debug for StreamCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StreamCallbacks { .. }")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Pending,
    Started,
    Stopped,
}

struct Inner {
    phase: Phase,
    callbacks: StreamCallbacks,
}

/// Serializes lifecycle events and guarantees callback ordering.
///
/// Shared between the session task and the stream handle; both may signal
/// `stopped` and only one `on_stop` results.
pub struct CallbackDispatcher {
    inner: Mutex<Inner>,
}

impl CallbackDispatcher {
    pub fn new(callbacks: StreamCallbacks) -> Self {
        Self {
            inner: Mutex::new(Inner { phase: Phase::Pending, callbacks }),
        }
    }

    /// Signal that capture began. Fires `on_start` only on the first call
    /// and only if the stream has not already stopped.
    pub fn started(&self) -> bool {
        let mut inner = self.inner.lock().expect("dispatcher poisoned");
        if inner.phase != Phase::Pending {
            return false;
        }
        inner.phase = Phase::Started;
        (inner.callbacks.on_start)();
        true
    }

    /// Deliver one frame. Frames offered outside the Started phase are
    /// dropped, keeping the "no frames after on_stop" promise.
    pub fn frame(&self, frame: VideoFrame) -> bool {
        let mut inner = self.inner.lock().expect("dispatcher poisoned");
        if inner.phase != Phase::Started {
            tracing::trace!("dropping frame outside Started phase");
            return false;
        }
        (inner.callbacks.on_frame)(frame);
        true
    }

    /// Signal termination. Fires `on_stop` exactly once; later calls are
    /// no-ops. A stop from Pending means `on_start` never fires.
    pub fn stopped(&self, error: Option<StreamError>) -> bool {
        let mut inner = self.inner.lock().expect("dispatcher poisoned");
        if inner.phase == Phase::Stopped {
            return false;
        }
        inner.phase = Phase::Stopped;
        (inner.callbacks.on_stop)(error);
        true
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.lock().expect("dispatcher poisoned").phase == Phase::Stopped
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use bytes::Bytes;

    use super::*;
    use crate::nv12;
    use crate::types::{PixelFormat, VideoFrame};

    #[derive(Debug, PartialEq)]
    enum Event {
        Start,
        Frame(f64),
        Stop(bool), // true = terminated with an error
    }

    fn recording_dispatcher() -> (CallbackDispatcher, Arc<Mutex<Vec<Event>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (l1, l2, l3) = (Arc::clone(&log), Arc::clone(&log), Arc::clone(&log));
        let dispatcher = CallbackDispatcher::new(StreamCallbacks {
            on_start: Box::new(move || l1.lock().unwrap().push(Event::Start)),
            on_stop: Box::new(move |e| l2.lock().unwrap().push(Event::Stop(e.is_some()))),
            on_frame: Box::new(move |f| l3.lock().unwrap().push(Event::Frame(f.timestamp))),
        });
        (dispatcher, log)
    }

    fn test_frame(timestamp: f64) -> VideoFrame {
        VideoFrame {
            data: Bytes::from(vec![0u8; nv12::packed_len(2, 2)]),
            format: PixelFormat::Nv12,
            width: 2,
            height: 2,
            timestamp,
        }
    }

    #[test]
    fn normal_lifecycle_orders_callbacks() {
        let (d, log) = recording_dispatcher();
        assert!(d.started());
        assert!(d.frame(test_frame(0.1)));
        assert!(d.frame(test_frame(0.2)));
        assert!(d.stopped(None));
        assert_eq!(
            *log.lock().unwrap(),
            vec![Event::Start, Event::Frame(0.1), Event::Frame(0.2), Event::Stop(false)]
        );
    }

    #[test]
    fn frames_before_start_are_dropped() {
        let (d, log) = recording_dispatcher();
        assert!(!d.frame(test_frame(0.0)));
        d.started();
        assert_eq!(*log.lock().unwrap(), vec![Event::Start]);
    }

    #[test]
    fn no_frames_after_stop() {
        let (d, log) = recording_dispatcher();
        d.started();
        d.stopped(None);
        assert!(!d.frame(test_frame(1.0)));
        assert_eq!(*log.lock().unwrap(), vec![Event::Start, Event::Stop(false)]);
    }

    #[test]
    fn double_stop_fires_on_stop_once() {
        let (d, log) = recording_dispatcher();
        d.started();
        assert!(d.stopped(None));
        assert!(!d.stopped(None));
        assert_eq!(*log.lock().unwrap(), vec![Event::Start, Event::Stop(false)]);
    }

    #[test]
    fn stop_before_start_suppresses_on_start() {
        let (d, log) = recording_dispatcher();
        assert!(d.stopped(None));
        assert!(!d.started());
        assert!(!d.frame(test_frame(0.0)));
        assert_eq!(*log.lock().unwrap(), vec![Event::Stop(false)]);
    }

    #[test]
    fn abnormal_termination_carries_the_error() {
        let (d, log) = recording_dispatcher();
        d.started();
        d.stopped(Some(StreamError::SourceClosed));
        assert_eq!(*log.lock().unwrap(), vec![Event::Start, Event::Stop(true)]);
    }

    #[test]
    fn started_twice_fires_once() {
        let (d, log) = recording_dispatcher();
        assert!(d.started());
        assert!(!d.started());
        assert_eq!(*log.lock().unwrap(), vec![Event::Start]);
    }

    #[test]
    fn is_stopped_tracks_phase() {
        let (d, _log) = recording_dispatcher();
        assert!(!d.is_stopped());
        d.started();
        assert!(!d.is_stopped());
        d.stopped(None);
        assert!(d.is_stopped());
    }
}

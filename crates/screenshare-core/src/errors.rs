use thiserror::Error;

/// Errors produced by capture streams.
///
/// Abnormal stream termination is reported exactly once through
/// `on_stop(Some(err))`; construction-time failures are returned from
/// `Stream::new` directly.
#[derive(Error, Debug)]
pub enum StreamError {
    /// No capture backend exists for this platform/build.
    #[error("Not supported on this platform")]
    NotSupported,

    /// The user dismissed the capture-source picker without selecting
    /// a screen or window.
    #[error("Capture source selection cancelled")]
    PickerCancelled,

    /// The OS refused screen-recording access.
    #[error("Screen capture permission denied: {reason}")]
    PermissionDenied { reason: String },

    /// The stream configuration was rejected before any capture started.
    #[error("Configuration invalid: {reason}")]
    ConfigurationInvalid { reason: String },

    /// No tokio runtime was available to host the capture session task.
    #[error("No async runtime available for the capture session")]
    RuntimeUnavailable,

    /// The captured source went away: window closed, display disconnected,
    /// or sharing revoked from system UI.
    #[error("Capture source closed")]
    SourceClosed,

    /// The capture session failed for any other reason.
    #[error("Capture session error: {reason}")]
    SessionFailed { reason: String },

    /// A backend handed over a frame with an impossible plane layout.
    #[error("Invalid frame layout: {reason}")]
    InvalidFrame { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StreamError {
    /// True for terminations the caller initiated or the user chose
    /// (picker dismissal), as opposed to failures.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::PickerCancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_supported_message_is_stable() {
        // Callers match on this exact text; it is part of the public contract.
        assert_eq!(
            StreamError::NotSupported.to_string(),
            "Not supported on this platform"
        );
    }

    #[test]
    fn variants_name_their_reason() {
        let err = StreamError::SessionFailed { reason: "pipeline died".into() };
        assert!(err.to_string().contains("pipeline died"));

        let err = StreamError::PermissionDenied { reason: "screen recording".into() };
        assert!(err.to_string().contains("screen recording"));
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err: StreamError = io.into();
        assert!(matches!(err, StreamError::Io(_)));
    }

    #[test]
    fn picker_cancel_is_a_cancellation() {
        assert!(StreamError::PickerCancelled.is_cancellation());
        assert!(!StreamError::SourceClosed.is_cancellation());
    }
}

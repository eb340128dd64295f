//! Fallback stream for platforms and builds without a capture backend.

use screenshare_core::StreamError;

use crate::StreamOptions;

/// Stand-in satisfying the stream contract where no native backend exists.
///
/// Both operations fail with [`StreamError::NotSupported`], so callers either
/// probe [`crate::is_supported`] first or handle the construction error. No
/// callback ever fires: construction itself is the failure.
pub struct UnsupportedStream;

impl UnsupportedStream {
    pub fn open(_options: StreamOptions) -> Result<Self, StreamError> {
        Err(StreamError::NotSupported)
    }

    pub fn stop(&self) -> Result<(), StreamError> {
        Err(StreamError::NotSupported)
    }
}

#[cfg(test)]
mod tests {
    use screenshare_core::StreamConfig;

    use super::*;

    #[test]
    fn construction_fails_loudly() {
        let options = StreamOptions::new(StreamConfig::default())
            .on_start(|| panic!("on_start fired on unsupported platform"))
            .on_stop(|_| panic!("on_stop fired on unsupported platform"));
        let err = UnsupportedStream::open(options).err().expect("must fail");
        assert_eq!(err.to_string(), "Not supported on this platform");
    }

    #[test]
    fn stop_fails_independent_of_construction() {
        let err = UnsupportedStream.stop().err().expect("must fail");
        assert_eq!(err.to_string(), "Not supported on this platform");
    }
}

use serde::{Deserialize, Serialize};

use crate::errors::StreamError;

/// Desired output geometry and rate for a capture stream.
///
/// Captured frames are scaled to fit `width` × `height`; `frame_rate` caps
/// delivery. Accepts the camelCase spelling (`frameRate`) used by embedding
/// applications as well as snake_case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub width: u32,
    pub height: u32,
    #[serde(alias = "frameRate")]
    pub frame_rate: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self { width: 1280, height: 720, frame_rate: 30 }
    }
}

impl StreamConfig {
    pub fn new(width: u32, height: u32, frame_rate: u32) -> Self {
        Self { width, height, frame_rate }
    }

    /// Reject geometries and rates no backend can honor.
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.width == 0 || self.height == 0 {
            return Err(StreamError::ConfigurationInvalid {
                reason: format!("frame geometry must be non-zero, got {}x{}", self.width, self.height),
            });
        }
        if self.frame_rate == 0 {
            return Err(StreamError::ConfigurationInvalid {
                reason: "frame_rate must be > 0".into(),
            });
        }
        Ok(())
    }

    /// Interval between frames in microseconds.
    pub fn frame_interval_us(&self) -> u64 {
        1_000_000 / self.frame_rate as u64
    }
}

#[cfg(test)]
mod tests {
    use super::StreamConfig;

    #[test]
    fn deserializes_camel_case_fields() {
        let json = r#"{ "width": 1920, "height": 1080, "frameRate": 60 }"#;
        let cfg: StreamConfig = serde_json::from_str(json).expect("valid camelCase config");
        assert_eq!(cfg.width, 1920);
        assert_eq!(cfg.height, 1080);
        assert_eq!(cfg.frame_rate, 60);
    }

    #[test]
    fn deserializes_snake_case_fields() {
        let json = r#"{ "width": 1280, "height": 720, "frame_rate": 30 }"#;
        let cfg: StreamConfig = serde_json::from_str(json).expect("valid snake_case config");
        assert_eq!(cfg.frame_rate, 30);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let cfg: StreamConfig = serde_json::from_str("{}").expect("empty config");
        assert_eq!(cfg, StreamConfig::default());
    }

    #[test]
    fn validate_rejects_zero_values() {
        assert!(StreamConfig::new(0, 720, 30).validate().is_err());
        assert!(StreamConfig::new(1280, 0, 30).validate().is_err());
        assert!(StreamConfig::new(1280, 720, 0).validate().is_err());
        assert!(StreamConfig::new(1280, 720, 30).validate().is_ok());
    }

    #[test]
    fn frame_interval() {
        assert_eq!(StreamConfig::new(1280, 720, 30).frame_interval_us(), 33_333);
        assert_eq!(StreamConfig::new(1280, 720, 60).frame_interval_us(), 16_666);
    }
}

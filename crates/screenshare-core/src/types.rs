use bytes::Bytes;

use crate::nv12;

/// Pixel format of a delivered frame.
///
/// Streams currently always deliver [`PixelFormat::Nv12`]; the enum exists so
/// frame consumers match explicitly instead of assuming a layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Planar YUV 4:2:0 — full-resolution luma plane followed by a
    /// half-resolution interleaved CbCr plane, no row padding.
    Nv12,
}

/// One captured video frame, scaled to the configured geometry.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Tightly packed pixel data (see [`PixelFormat`]).
    pub data: Bytes,
    /// Pixel format of `data`.
    pub format: PixelFormat,
    /// Visible width in pixels.
    pub width: u32,
    /// Visible height in pixels.
    pub height: u32,
    /// Seconds on the stream's internal synchronization clock.
    /// Not a Unix timestamp.
    pub timestamp: f64,
}

impl VideoFrame {
    /// True when `data` holds exactly the bytes its geometry requires.
    pub fn is_well_formed(&self) -> bool {
        match self.format {
            PixelFormat::Nv12 => self.data.len() == nv12::packed_len(self.width, self.height),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_checks_packed_len() {
        let frame = VideoFrame {
            data: Bytes::from(vec![0u8; nv12::packed_len(4, 4)]),
            format: PixelFormat::Nv12,
            width: 4,
            height: 4,
            timestamp: 0.0,
        };
        assert!(frame.is_well_formed());

        let short = VideoFrame { data: Bytes::from(vec![0u8; 3]), ..frame };
        assert!(!short.is_well_formed());
    }
}

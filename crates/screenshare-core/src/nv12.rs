//! NV12 plane layout and packing.
//!
//! Capture backends hand over NV12 images as two independently strided
//! planes, often with row padding and sometimes with a visible-rect origin
//! inside a larger allocation. Frames are delivered to callers with no row
//! padding, so every backend funnels its planes through [`pack`] first.

use bytes::{Bytes, BytesMut};

use crate::errors::StreamError;

/// Byte length of a tightly packed NV12 image: a full-resolution luma plane
/// followed by a half-resolution interleaved CbCr plane.
pub fn packed_len(width: u32, height: u32) -> usize {
    let (w, h) = (width as usize, height as usize);
    let chroma_rows = h.div_ceil(2);
    let chroma_row_bytes = 2 * w.div_ceil(2);
    w * h + chroma_rows * chroma_row_bytes
}

/// Borrowed view of a strided two-plane NV12 image.
///
/// `origin_x`/`origin_y` select the top-left corner of the visible rect
/// inside the planes; odd origins round down to the containing chroma sample.
#[derive(Debug, Clone, Copy)]
pub struct Nv12Planes<'a> {
    pub y: &'a [u8],
    pub y_stride: usize,
    pub cbcr: &'a [u8],
    pub cbcr_stride: usize,
    pub origin_x: usize,
    pub origin_y: usize,
}

impl<'a> Nv12Planes<'a> {
    /// Planes with no visible-rect offset.
    pub fn new(y: &'a [u8], y_stride: usize, cbcr: &'a [u8], cbcr_stride: usize) -> Self {
        Self { y, y_stride, cbcr, cbcr_stride, origin_x: 0, origin_y: 0 }
    }
}

/// Copy the visible `width` × `height` region of `planes` into a tight
/// buffer of [`packed_len`] bytes.
pub fn pack(planes: Nv12Planes<'_>, width: u32, height: u32) -> Result<Bytes, StreamError> {
    let (w, h) = (width as usize, height as usize);
    let luma_row = w;
    let chroma_rows = h.div_ceil(2);
    let chroma_row = 2 * w.div_ceil(2);

    // Chroma samples cover 2x2 luma blocks; snap the origin to the block.
    let cx = (planes.origin_x / 2) * 2;
    let cy = planes.origin_y / 2;

    if planes.y_stride < planes.origin_x + luma_row {
        return Err(StreamError::InvalidFrame {
            reason: format!("luma stride {} < row {} at x={}", planes.y_stride, luma_row, planes.origin_x),
        });
    }
    if planes.cbcr_stride < cx + chroma_row {
        return Err(StreamError::InvalidFrame {
            reason: format!("chroma stride {} < row {} at x={}", planes.cbcr_stride, chroma_row, cx),
        });
    }
    let y_end = (planes.origin_y + h - 1) * planes.y_stride + planes.origin_x + luma_row;
    if planes.y.len() < y_end {
        return Err(StreamError::InvalidFrame {
            reason: format!("luma plane {} bytes, need {}", planes.y.len(), y_end),
        });
    }
    let cbcr_end = (cy + chroma_rows - 1) * planes.cbcr_stride + cx + chroma_row;
    if planes.cbcr.len() < cbcr_end {
        return Err(StreamError::InvalidFrame {
            reason: format!("chroma plane {} bytes, need {}", planes.cbcr.len(), cbcr_end),
        });
    }

    let mut out = BytesMut::with_capacity(packed_len(width, height));
    for row in 0..h {
        let start = (planes.origin_y + row) * planes.y_stride + planes.origin_x;
        out.extend_from_slice(&planes.y[start..start + luma_row]);
    }
    for row in 0..chroma_rows {
        let start = (cy + row) * planes.cbcr_stride + cx;
        out.extend_from_slice(&planes.cbcr[start..start + chroma_row]);
    }

    Ok(out.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_len_even_and_odd() {
        assert_eq!(packed_len(4, 4), 4 * 4 + 2 * 2 * 2);
        assert_eq!(packed_len(2, 2), 4 + 2);
        // Odd geometry rounds the chroma plane up.
        assert_eq!(packed_len(3, 3), 9 + 2 * 2 * 2);
        assert_eq!(packed_len(1, 1), 1 + 2);
    }

    #[test]
    fn pack_strips_row_padding() {
        // 2x2 visible image inside 8-byte-stride planes.
        let y = [
            1, 2, 0, 0, 0, 0, 0, 0, //
            3, 4, 0, 0, 0, 0, 0, 0,
        ];
        let cbcr = [9, 8, 0, 0, 0, 0, 0, 0];
        let packed = pack(Nv12Planes::new(&y, 8, &cbcr, 8), 2, 2).expect("pack");
        assert_eq!(&packed[..], &[1, 2, 3, 4, 9, 8]);
        assert_eq!(packed.len(), packed_len(2, 2));
    }

    #[test]
    fn pack_already_tight_is_identity() {
        let y = [1u8, 2, 3, 4];
        let cbcr = [9u8, 8];
        let packed = pack(Nv12Planes::new(&y, 2, &cbcr, 2), 2, 2).expect("pack");
        assert_eq!(&packed[..], &[1, 2, 3, 4, 9, 8]);
    }

    #[test]
    fn pack_honors_origin() {
        // 4x4 planes, visible 2x2 rect at (2, 2).
        let y: Vec<u8> = (0..16).collect();
        let cbcr: Vec<u8> = (100..108).collect();
        let planes = Nv12Planes { y: &y, y_stride: 4, cbcr: &cbcr, cbcr_stride: 4, origin_x: 2, origin_y: 2 };
        let packed = pack(planes, 2, 2).expect("pack");
        // Luma rows 2 and 3, columns 2..4; chroma row 1, columns 2..4.
        assert_eq!(&packed[..], &[10, 11, 14, 15, 106, 107]);
    }

    #[test]
    fn pack_rejects_short_planes() {
        let y = [0u8; 3];
        let cbcr = [0u8; 2];
        assert!(pack(Nv12Planes::new(&y, 2, &cbcr, 2), 2, 2).is_err());

        let y = [0u8; 4];
        let cbcr = [0u8; 1];
        assert!(pack(Nv12Planes::new(&y, 2, &cbcr, 2), 2, 2).is_err());
    }

    #[test]
    fn pack_rejects_narrow_stride() {
        let y = [0u8; 16];
        let cbcr = [0u8; 8];
        assert!(pack(Nv12Planes::new(&y, 1, &cbcr, 4), 2, 2).is_err());
    }
}

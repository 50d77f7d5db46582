//! Raw frame type and synthetic frame sources.

use bytes::Bytes;

use framebench_types::yuv420_frame_size;

/// An immutable planar YUV 4:2:0 frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Presentation index within the run.
    pub index: usize,

    /// Frame width in pixels.
    pub width: u32,

    /// Frame height in pixels.
    pub height: u32,

    /// Y plane followed by the U and V planes.
    pub data: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(index: usize, width: u32, height: u32, data: Bytes) -> Self {
        Self {
            index,
            width,
            height,
            data,
        }
    }

    fn luma_size(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Luma plane.
    pub fn y_plane(&self) -> &[u8] {
        &self.data[..self.luma_size()]
    }

    /// First chroma plane.
    pub fn u_plane(&self) -> &[u8] {
        let start = self.luma_size();
        &self.data[start..start + self.luma_size() / 4]
    }

    /// Second chroma plane.
    pub fn v_plane(&self) -> &[u8] {
        let start = self.luma_size() + self.luma_size() / 4;
        &self.data[start..start + self.luma_size() / 4]
    }

    /// Validate that the frame data matches expected dimensions.
    pub fn is_valid(&self) -> bool {
        self.data.len() == yuv420_frame_size(self.width, self.height)
    }
}

/// Producer of frame content keyed by index.
///
/// Implementations must be pure: the same `(width, height, index)` always
/// yields the same bytes, so a source can be shared by any number of
/// generation workers without coordination.
pub trait FrameSource: Send + Sync {
    /// Fill `out` with frame `index`.
    ///
    /// `out` is exactly `yuv420_frame_size(width, height)` bytes and the
    /// dimensions have already been validated.
    fn fill(&self, width: u32, height: u32, index: usize, out: &mut [u8]);

    /// Produce frame `index` into a fresh buffer.
    fn generate(&self, width: u32, height: u32, index: usize) -> Frame {
        let mut data = vec![0u8; yuv420_frame_size(width, height)];
        self.fill(width, height, index, &mut data);
        Frame::new(index, width, height, Bytes::from(data))
    }
}

/// Moving gradient with the frame index stamped into the first luma bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticPattern;

impl FrameSource for SyntheticPattern {
    fn fill(&self, width: u32, height: u32, index: usize, out: &mut [u8]) {
        debug_assert_eq!(out.len(), yuv420_frame_size(width, height));

        let w = width as usize;
        let h = height as usize;
        let chroma_w = w / 2;
        if chroma_w == 0 || h < 2 {
            // No full 2x2 block to sample
            out.fill(index as u8);
            return;
        }
        let (luma, chroma) = out.split_at_mut(w * h);
        let (u, v) = chroma.split_at_mut(chroma_w * (h / 2));

        for (y, row) in luma.chunks_exact_mut(w).enumerate() {
            for (x, px) in row.iter_mut().enumerate() {
                *px = (x + y + index * 3) as u8;
            }
        }

        for (y, row) in u.chunks_exact_mut(chroma_w).enumerate() {
            for (x, px) in row.iter_mut().enumerate() {
                *px = (128 + x * 2 + y + index) as u8;
            }
        }

        for (y, row) in v.chunks_exact_mut(chroma_w).enumerate() {
            for (x, px) in row.iter_mut().enumerate() {
                *px = (64 + x + y * 2 + index * 2) as u8;
            }
        }

        // Gradient repeats every 256 frames; the stamp keeps frames distinct
        let stamp = (index as u64).to_le_bytes();
        let n = stamp.len().min(luma.len());
        luma[..n].copy_from_slice(&stamp[..n]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_size_matches_plane_layout() {
        let frame = SyntheticPattern.generate(64, 48, 0);
        assert_eq!(frame.data.len(), 64 * 48 * 3 / 2);
        assert!(frame.is_valid());
        assert_eq!(frame.y_plane().len(), 64 * 48);
        assert_eq!(frame.u_plane().len(), 32 * 24);
        assert_eq!(frame.v_plane().len(), 32 * 24);
    }

    #[test]
    fn test_generate_is_deterministic() {
        let a = SyntheticPattern.generate(32, 32, 17);
        let b = SyntheticPattern.generate(32, 32, 17);
        assert_eq!(a, b);
    }

    #[test]
    fn test_frames_differ_by_index() {
        let first = SyntheticPattern.generate(32, 32, 0);
        assert_ne!(first.data, SyntheticPattern.generate(32, 32, 1).data);
        assert_ne!(first.data, SyntheticPattern.generate(32, 32, 256).data);
    }

    #[test]
    fn test_smallest_frame() {
        let frame = SyntheticPattern.generate(2, 2, 9);
        assert_eq!(frame.data.len(), 6);
        assert_eq!(&frame.y_plane()[..4], &9u64.to_le_bytes()[..4]);
    }

    #[test]
    fn test_degenerate_dimensions_do_not_panic() {
        assert!(SyntheticPattern.generate(0, 16, 3).data.is_empty());
        assert!(SyntheticPattern.generate(16, 0, 3).data.is_empty());

        let sliver = SyntheticPattern.generate(1, 1, 3);
        assert_eq!(sliver.data.len(), yuv420_frame_size(1, 1));
        assert!(sliver.data.iter().all(|&b| b == 3));
    }

    #[test]
    fn test_fill_matches_generate() {
        let mut buf = vec![0u8; 16 * 8 * 3 / 2];
        SyntheticPattern.fill(16, 8, 5, &mut buf);
        assert_eq!(buf.as_slice(), SyntheticPattern.generate(16, 8, 5).data.as_ref());
    }
}

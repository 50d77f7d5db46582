//! Encoder interface for framebench.
//!
//! The codec under test sits behind the [`Encoder`] trait. This crate also
//! provides [`SyntheticEncoder`], a codec-free stand-in that reproduces the
//! lookahead delay and keyframe cadence of a real encoder so the harness can be
//! exercised end to end.

mod error;
mod synthetic;

pub use error::EncoderError;
pub use synthetic::SyntheticEncoder;

use bytes::Bytes;

/// Result type for encoder operations.
pub type EncoderResult<T> = Result<T, EncoderError>;

/// Per-packet flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketFlags(u32);

impl PacketFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);

    /// Packet starts a keyframe.
    pub const KEYFRAME: Self = Self(0x1);

    /// Packet may be dropped without affecting other frames.
    pub const DISPOSABLE: Self = Self(0x2);

    /// Check whether every flag in `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Raw flag bits.
    pub fn bits(self) -> u32 {
        self.0
    }
}

impl std::ops::BitOr for PacketFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// One unit of encoded output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPacket {
    /// Encoded bitstream data.
    pub payload: Bytes,

    /// Presentation timestamp in stream time base units.
    pub pts: i64,

    /// Decode timestamp in stream time base units.
    pub dts: i64,

    /// Output stream this packet belongs to.
    pub stream_index: u32,

    /// Packet flags.
    pub flags: PacketFlags,

    /// Duration in stream time base units.
    pub duration: i64,
}

impl EncodedPacket {
    /// Whether this packet starts a keyframe.
    pub fn is_keyframe(&self) -> bool {
        self.flags.contains(PacketFlags::KEYFRAME)
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Trait for the encoder under test.
///
/// Frames are submitted strictly in presentation order from one thread.
/// Packets are returned in the order they must be written.
pub trait Encoder: Send {
    /// Encode one planar YUV 4:2:0 frame, returning zero or more packets.
    fn encode(&mut self, frame: &[u8], pts: i64) -> EncoderResult<Vec<EncodedPacket>>;

    /// Drain buffered frames. Returns an empty vector once the stream has ended.
    fn flush(&mut self) -> EncoderResult<Vec<EncodedPacket>>;

    /// Release encoder resources.
    fn close(&mut self) -> EncoderResult<()>;

    /// Get encoder name for diagnostics.
    fn name(&self) -> &'static str;
}

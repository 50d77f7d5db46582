//! Codec-free encoder used to drive the harness.

use std::collections::VecDeque;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, instrument, trace};

use framebench_types::{validate_dimensions, yuv420_frame_size, EncoderSettings};

use crate::error::EncoderError;
use crate::{EncodedPacket, Encoder, EncoderResult, PacketFlags};

/// Sampling stride for keyframe payloads.
const KEYFRAME_STRIDE: usize = 16;

/// Sampling stride for inter-frame payloads.
const INTER_STRIDE: usize = 64;

/// A frame waiting in the lookahead window.
struct PendingFrame {
    pts: i64,
    payload: Bytes,
    keyframe: bool,
}

/// Encoder stand-in with a fixed lookahead delay.
///
/// Each frame becomes one packet whose payload is a deterministic sample
/// of the input. Up to `lookahead` frames are held back before output
/// starts, so `encode` returns nothing for the first frames and `flush`
/// returns the tail, matching how B-frame encoders behave at stream edges.
pub struct SyntheticEncoder {
    settings: EncoderSettings,
    frame_size: usize,
    pending: VecDeque<PendingFrame>,
    frames_in: u64,
    packets_out: i64,
    flushed: bool,
    closed: bool,
}

impl SyntheticEncoder {
    /// Create a new synthetic encoder.
    #[instrument(name = "synthetic_encoder_new", skip_all)]
    pub fn new(width: u32, height: u32, settings: EncoderSettings) -> EncoderResult<Self> {
        validate_dimensions(width, height)
            .map_err(|e| EncoderError::Initialization(e.to_string()))?;
        if settings.keyframe_interval == 0 {
            return Err(EncoderError::Initialization(
                "keyframe interval must be greater than zero".into(),
            ));
        }

        debug!(
            width,
            height,
            bitrate_kbps = settings.bitrate_kbps,
            keyframe_interval = settings.keyframe_interval,
            lookahead = settings.lookahead,
            "Initializing synthetic encoder"
        );

        let window = settings.lookahead as usize + 1;
        Ok(Self {
            settings,
            frame_size: yuv420_frame_size(width, height),
            pending: VecDeque::with_capacity(window),
            frames_in: 0,
            packets_out: 0,
            flushed: false,
            closed: false,
        })
    }

    fn compress(&self, frame: &[u8], pts: i64, keyframe: bool) -> Bytes {
        let stride = if keyframe { KEYFRAME_STRIDE } else { INTER_STRIDE };
        let mut payload = BytesMut::with_capacity(8 + frame.len() / stride + 1);
        payload.put_i64_le(pts);
        payload.extend(frame.iter().step_by(stride));
        payload.freeze()
    }

    fn emit(&mut self, frame: PendingFrame) -> EncodedPacket {
        let dts = self.packets_out - i64::from(self.settings.lookahead);
        self.packets_out += 1;

        EncodedPacket {
            payload: frame.payload,
            pts: frame.pts,
            dts,
            stream_index: 0,
            flags: if frame.keyframe {
                PacketFlags::KEYFRAME
            } else {
                PacketFlags::NONE
            },
            duration: 1,
        }
    }

    /// Frames submitted but not yet emitted.
    pub fn buffered_frames(&self) -> usize {
        self.pending.len()
    }
}

impl Encoder for SyntheticEncoder {
    fn encode(&mut self, frame: &[u8], pts: i64) -> EncoderResult<Vec<EncodedPacket>> {
        if self.closed {
            return Err(EncoderError::Closed);
        }
        if self.flushed {
            return Err(EncoderError::AlreadyFlushed);
        }
        if frame.len() != self.frame_size {
            return Err(EncoderError::InvalidInput(format!(
                "expected {} bytes, got {}",
                self.frame_size,
                frame.len()
            )));
        }

        let keyframe = self.frames_in % u64::from(self.settings.keyframe_interval) == 0;
        let payload = self.compress(frame, pts, keyframe);
        self.frames_in += 1;
        self.pending.push_back(PendingFrame {
            pts,
            payload,
            keyframe,
        });

        let mut packets = Vec::new();
        while self.pending.len() > self.settings.lookahead as usize {
            if let Some(next) = self.pending.pop_front() {
                packets.push(self.emit(next));
            }
        }

        trace!(pts, emitted = packets.len(), buffered = self.pending.len(), "Frame encoded");
        Ok(packets)
    }

    fn flush(&mut self) -> EncoderResult<Vec<EncodedPacket>> {
        if self.closed {
            return Err(EncoderError::Closed);
        }
        self.flushed = true;

        let mut packets = Vec::with_capacity(self.pending.len());
        while let Some(next) = self.pending.pop_front() {
            packets.push(self.emit(next));
        }

        debug!(packets = packets.len(), "Encoder flushed");
        Ok(packets)
    }

    fn close(&mut self) -> EncoderResult<()> {
        if !self.pending.is_empty() {
            debug!(dropped = self.pending.len(), "Closing encoder with buffered frames");
        }
        self.pending.clear();
        self.closed = true;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "synthetic"
    }
}

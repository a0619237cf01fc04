//! Shared DMA-style ring buffer
//!
//! This module defines the ring buffer the mixing engine paints into and the
//! playback backend drains. The mixer owns the samples; the backend owns the
//! read cursor and publishes it through `samplepos` so the mixer knows how
//! much of the ring has been consumed and needs refilling.

use crate::audio::AudioBuffer;

/// Shared ring buffer between the mixing engine and a playback backend
///
/// All metadata fields are populated by the backend's `init`; until then the
/// buffer is empty and every field is zero. `samples` and `samplepos` count
/// mono samples, so one stereo frame occupies two of each.
#[derive(Debug, Default)]
pub struct DmaBuffer {
    /// Interleaved sample storage, `samples` entries long
    pub buffer: AudioBuffer,

    /// Bits per mono sample (16)
    pub samplebits: u16,

    /// Playback rate in Hz, as granted by the device
    pub speed: u32,

    /// Channel count (2)
    pub channels: u16,

    /// Capacity in mono samples
    pub samples: usize,

    /// Smallest unit the backend accepts, in mono samples
    pub submission_chunk: usize,

    /// Read cursor in mono samples, written back by the backend every frame
    pub samplepos: usize,

    /// Whether the ring is split across two mappings (never, for this backend)
    pub split_buffer: bool,
}

impl DmaBuffer {
    /// Create an empty, uninitialized buffer
    pub fn new() -> Self {
        DmaBuffer::default()
    }

    /// Number of stereo frames the ring holds
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples / self.channels as usize
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_buffer_is_uninitialized() {
        let dma = DmaBuffer::new();
        assert!(dma.buffer.is_empty());
        assert_eq!(dma.samples, 0);
        assert_eq!(dma.samplepos, 0);
        assert_eq!(dma.frames(), 0);
    }

    #[test]
    fn frames_counts_stereo_pairs() {
        let dma = DmaBuffer {
            samples: 64,
            channels: 2,
            ..DmaBuffer::default()
        };
        assert_eq!(dma.frames(), 32);
    }
}

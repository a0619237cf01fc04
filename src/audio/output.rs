//! Playback adapter
//!
//! This module owns the transfer buffer and the read cursor into the shared
//! DMA ring. Once per engine frame it offers the device whatever it still
//! owes from the current hardware period, absorbs would-block, underrun and
//! short-write outcomes, and publishes the cursor back to the mixer.

use log::{debug, error, info, trace, warn};

use super::alsa::AlsaPcm;
use super::device::{InitError, Negotiated, PcmDevice, PcmWrite};
use super::{AudioConfig, Sample, SoundBackend};
use crate::dma::DmaBuffer;

/// The DMA ring holds this many transfer buffers' worth of bytes, counted
/// in mono samples
const DMA_HEADROOM: usize = 4;

/// Sound output backend over a non-blocking PCM device
///
/// `None` state means uninitialized: `get_position` reports 0 and touches
/// nothing, `shutdown` is a no-op, and `init` may be retried safely.
pub struct AudioOutput<D: PcmDevice = AlsaPcm> {
    /// Device state, present only between a successful `init` and `shutdown`
    active: Option<Active<D>>,

    /// Configuration fixed at construction
    config: AudioConfig,
}

/// State held while the device is open
struct Active<D> {
    /// The playback device
    device: D,

    /// One hardware period of interleaved samples staged for the device
    transfer: Vec<Sample>,

    /// Frames per hardware period, as granted by the device
    period_frames: usize,

    /// Frames still owed to the device from the current period
    remaining_frames: usize,

    /// Read cursor into the DMA ring, in mono samples
    buf_pos: usize,
}

impl AudioOutput<AlsaPcm> {
    /// Create an uninitialized backend
    pub fn new(config: AudioConfig) -> Self {
        AudioOutput {
            active: None,
            config,
        }
    }

    /// Open the playback device and set up the shared buffer
    ///
    /// On failure nothing is retained and the call may be retried. Calling
    /// again while initialized reports success without reopening.
    pub fn init(&mut self, dma: &mut DmaBuffer) -> bool {
        if self.active.is_some() {
            warn!("Audio output already initialized");
            return true;
        }

        match self.try_init(dma) {
            Ok(()) => {
                info!(
                    "Audio output initialized: {} Hz, {} channels, {} frame periods",
                    dma.speed,
                    dma.channels,
                    self.active.as_ref().map_or(0, |a| a.period_frames)
                );
                true
            }
            Err(err) => {
                error!("Failed to initialize audio output: {}", err);
                false
            }
        }
    }

    fn try_init(&mut self, dma: &mut DmaBuffer) -> Result<(), InitError> {
        let (device, negotiated) = AlsaPcm::open(&self.config)?;
        self.install(device, negotiated, dma)
    }
}

impl<D: PcmDevice> AudioOutput<D> {
    /// Stage an opened device and size the transfer and DMA buffers from the
    /// granted period
    fn install(
        &mut self,
        device: D,
        negotiated: Negotiated,
        dma: &mut DmaBuffer,
    ) -> Result<(), InitError> {
        let channels = usize::from(self.config.channels);
        let transfer_len = negotiated.period_frames * channels;
        let transfer_bytes = transfer_len * std::mem::size_of::<Sample>();

        // The ring holds DMA_HEADROOM transfer buffers worth of bytes,
        // counted in mono samples
        let capacity = DMA_HEADROOM * transfer_bytes;
        if capacity % transfer_len != 0 {
            return Err(InitError::Misaligned {
                capacity,
                transfer: transfer_len,
            });
        }

        dma.samplebits = 16;
        dma.speed = negotiated.rate;
        dma.channels = self.config.channels;
        dma.samples = capacity;
        dma.buffer = vec![0; capacity];
        dma.submission_chunk = 1;
        dma.samplepos = 0;
        dma.split_buffer = false;

        self.active = Some(Active {
            device,
            transfer: vec![0; transfer_len],
            period_frames: negotiated.period_frames,
            remaining_frames: negotiated.period_frames,
            buf_pos: 0,
        });

        Ok(())
    }

    /// Push queued samples to the device and report the read cursor
    ///
    /// One non-blocking write per call. Every outcome is absorbed here:
    /// would-block waits for the next frame, an underrun prepares the device
    /// for restart, a short write shrinks what the next call offers, and a
    /// full write refills the transfer buffer from the ring and advances the
    /// cursor. The cursor is published as `dma.samplepos` and returned, in
    /// mono samples.
    pub fn get_position(&mut self, dma: &mut DmaBuffer) -> usize {
        let channels = usize::from(self.config.channels);
        let Some(active) = self.active.as_mut() else {
            return 0;
        };

        // Self-heal any accounting drift before trusting the offset math
        if active.remaining_frames == 0 || active.remaining_frames > active.period_frames {
            warn!(
                "Remaining frame count {} out of range, resetting",
                active.remaining_frames
            );
            active.remaining_frames = active.period_frames;
        }

        // Offer the frames the device still owes us from the current
        // period, starting past the ones it already took
        let offset = (active.period_frames - active.remaining_frames) * channels;
        let mut advance = false;

        match active.device.write_interleaved(&active.transfer[offset..]) {
            PcmWrite::NotReady => {
                trace!("Device not ready");
            }
            PcmWrite::Underrun => {
                debug!("Playback underrun, preparing device for restart");
                active.device.prepare();
            }
            PcmWrite::Failed(err) => {
                warn!("Device write failed: {}", err);
            }
            PcmWrite::Wrote(frames) if frames < active.remaining_frames => {
                trace!(
                    "Short write of {} of {} frames",
                    frames,
                    active.remaining_frames
                );
                active.remaining_frames -= frames;
            }
            PcmWrite::Wrote(frames) => {
                trace!("Full write of {} frames", frames);
                active.remaining_frames = active.period_frames;
                advance = true;
            }
        }

        if advance {
            active.refill(dma);
        }

        dma.samplepos = active.buf_pos;
        dma.samplepos
    }

    /// Drain pending audio and close the device
    ///
    /// Safe to call when already shut down.
    pub fn shutdown(&mut self) {
        if let Some(mut active) = self.active.take() {
            debug!("Draining and closing playback device");
            active.device.drain();
        }
    }
}

impl<D: PcmDevice> Active<D> {
    /// Copy the next chunk of the ring into the transfer buffer and advance
    /// the cursor, wrapping at the end of the ring
    fn refill(&mut self, dma: &DmaBuffer) {
        let len = self.transfer.len();
        if self.buf_pos + len > dma.buffer.len() {
            // Does not happen while the ring is a whole multiple of the
            // transfer buffer, but cope with a split copy anyway
            warn!("DMA read cursor mis-aligned at {}", self.buf_pos);
            let head = dma.buffer.len() - self.buf_pos;
            self.transfer[..head].copy_from_slice(&dma.buffer[self.buf_pos..]);
            self.transfer[head..].copy_from_slice(&dma.buffer[..len - head]);
            self.buf_pos = len - head;
        } else {
            let end = self.buf_pos + len;
            self.transfer.copy_from_slice(&dma.buffer[self.buf_pos..end]);
            self.buf_pos = if end >= dma.buffer.len() { 0 } else { end };
        }
    }
}

impl SoundBackend for AudioOutput<AlsaPcm> {
    fn init(&mut self, dma: &mut DmaBuffer) -> bool {
        AudioOutput::init(self, dma)
    }

    fn get_position(&mut self, dma: &mut DmaBuffer) -> usize {
        AudioOutput::get_position(self, dma)
    }

    fn submit(&mut self) {
        // Writes happen inside get_position; nothing to flush here
    }

    fn shutdown(&mut self) {
        AudioOutput::shutdown(self)
    }
}

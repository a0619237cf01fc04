//! Playback device seam
//!
//! The adapter's bookkeeping never touches ALSA directly; it drives anything
//! implementing `PcmDevice`. The real device lives in `alsa.rs`, tests drive
//! the bookkeeping with a scripted fake.

use thiserror::Error;

use super::Sample;

/// Errors that can occur while opening and configuring the playback device
#[derive(Error, Debug)]
pub enum InitError {
    #[error("Failed to open playback device \"{device}\": {err}")]
    Open { device: String, err: alsa::Error },

    #[error("Failed to negotiate hardware parameters: {0}")]
    Negotiate(alsa::Error),

    #[error("Device granted an unusable period size of {0} frames")]
    BadPeriodSize(i64),

    #[error("DMA capacity of {capacity} samples is not a multiple of the {transfer} sample transfer buffer")]
    Misaligned { capacity: usize, transfer: usize },
}

/// Hardware parameters actually granted by the device
#[derive(Debug, Clone, Copy)]
pub struct Negotiated {
    /// Playback rate in Hz
    pub rate: u32,

    /// Frames per hardware period
    pub period_frames: usize,
}

/// Outcome of one non-blocking interleaved write
#[derive(Debug, Clone, PartialEq)]
pub enum PcmWrite {
    /// The device accepted this many frames, possibly fewer than offered
    Wrote(usize),

    /// The device cannot take data right now; retry next frame
    NotReady,

    /// Playback underran; the device needs to be prepared for restart
    Underrun,

    /// Any other device error, already rendered for logging
    Failed(String),
}

/// A non-blocking interleaved PCM playback device
pub trait PcmDevice {
    /// Offer interleaved samples to the device and report what happened
    ///
    /// `samples` holds whole frames (`len` is a multiple of the channel
    /// count); the outcome counts frames, not samples.
    fn write_interleaved(&mut self, samples: &[Sample]) -> PcmWrite;

    /// Reinitialize playback state after an underrun
    ///
    /// Failures are logged by the implementation; the next frame's write
    /// simply retries.
    fn prepare(&mut self);

    /// Flush pending device content before close
    fn drain(&mut self);
}

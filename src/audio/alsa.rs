//! ALSA device binding
//!
//! Opens the PCM in non-blocking playback mode and negotiates the format the
//! mixer produces: interleaved signed 16-bit stereo near 22050 Hz, with a
//! period near 1024 frames and a device buffer four periods deep to keep
//! latency down.

use alsa::pcm::{Access, Format, Frames, HwParams, PCM};
use alsa::{Direction, ValueOr};
use log::{debug, warn};

use super::device::{InitError, Negotiated, PcmDevice, PcmWrite};
use super::{AudioConfig, Sample};

/// Periods in the device's internal buffer
const PERIODS_PER_BUFFER: Frames = 4;

/// ALSA playback handle
pub struct AlsaPcm {
    pcm: PCM,
}

impl AlsaPcm {
    /// Open the device and negotiate hardware parameters
    ///
    /// The device may grant a nearby rate and a smaller period than asked
    /// for; the caller sizes its transfer buffer from the read-back values.
    pub fn open(config: &AudioConfig) -> Result<(Self, Negotiated), InitError> {
        let pcm = PCM::new(&config.device, Direction::Playback, true).map_err(|err| {
            InitError::Open {
                device: config.device.clone(),
                err,
            }
        })?;

        let (rate, period) = negotiate(&pcm, config).map_err(InitError::Negotiate)?;
        if period <= 0 {
            return Err(InitError::BadPeriodSize(period));
        }

        debug!("ALSA granted rate={} Hz, period={} frames", rate, period);

        Ok((
            AlsaPcm { pcm },
            Negotiated {
                rate,
                period_frames: period as usize,
            },
        ))
    }
}

/// Commit hardware parameters and read back what the device granted
fn negotiate(pcm: &PCM, config: &AudioConfig) -> Result<(u32, Frames), alsa::Error> {
    let hwp = HwParams::any(pcm)?;
    hwp.set_access(Access::RWInterleaved)?;
    hwp.set_format(Format::s16())?;
    hwp.set_channels(config.channels as u32)?;
    hwp.set_rate(config.rate, ValueOr::Nearest)?;
    let period = hwp.set_period_size_near(config.period_frames as Frames, ValueOr::Nearest)?;
    hwp.set_buffer_size_near(period * PERIODS_PER_BUFFER)?;
    pcm.hw_params(&hwp)?;

    Ok((hwp.get_rate()?, hwp.get_period_size()?))
}

impl PcmDevice for AlsaPcm {
    fn write_interleaved(&mut self, samples: &[Sample]) -> PcmWrite {
        let io = match self.pcm.io_i16() {
            Ok(io) => io,
            Err(err) => return PcmWrite::Failed(err.to_string()),
        };

        match io.writei(samples) {
            Ok(frames) => PcmWrite::Wrote(frames),
            Err(err) if err.errno() == libc::EAGAIN => PcmWrite::NotReady,
            Err(err) if err.errno() == libc::EPIPE => PcmWrite::Underrun,
            Err(err) => PcmWrite::Failed(err.to_string()),
        }
    }

    fn prepare(&mut self) {
        if let Err(err) = self.pcm.prepare() {
            warn!("Failed to prepare device after underrun: {}", err);
        }
    }

    fn drain(&mut self) {
        if let Err(err) = self.pcm.drain() {
            warn!("Failed to drain device: {}", err);
        }
    }
}

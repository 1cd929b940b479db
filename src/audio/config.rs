//! Capture configuration

use super::device::MicrophoneError;
use std::time::Duration;

/// What the drain sequence does with frames gathered in the same cycle
/// as the end-of-stream marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EndOfStreamPolicy {
    /// Yield the frames already gathered, then end
    #[default]
    Flush,
    /// End immediately and drop them
    Discard,
}

/// Audio configuration for capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioConfig {
    /// Sample rate in Hz (16kHz for STT)
    pub sample_rate: u32,
    /// Samples per channel in one frame
    pub frame_size: usize,
    /// Number of channels (1 = mono)
    pub channels: u16,
    /// Signed integer PCM sample width
    pub bits_per_sample: u16,
    /// Input device to open, `None` for the host default
    pub device_name: Option<String>,
    /// Shutdown behaviour of the drain sequence
    pub end_of_stream: EndOfStreamPolicy,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self::with_chunk_duration(
            Self::DEFAULT_SAMPLE_RATE,
            Duration::from_millis(100),
        )
    }
}

impl AudioConfig {
    pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

    /// 16-bit mono capture at `sample_rate`, with frames lasting `chunk`
    pub fn with_chunk_duration(sample_rate: u32, chunk: Duration) -> Self {
        let frame_size = (u128::from(sample_rate) * chunk.as_micros() / 1_000_000) as usize;
        Self {
            sample_rate,
            frame_size,
            channels: 1,
            bits_per_sample: 16,
            device_name: None,
            end_of_stream: EndOfStreamPolicy::default(),
        }
    }

    pub fn bytes_per_sample(&self) -> usize {
        usize::from(self.bits_per_sample).div_ceil(8)
    }

    /// Size in bytes of one interleaved sample across all channels
    pub fn bytes_per_frame_sample(&self) -> usize {
        self.bytes_per_sample() * usize::from(self.channels)
    }

    /// Size in bytes of one complete frame
    pub fn frame_bytes(&self) -> usize {
        self.frame_size.saturating_mul(self.bytes_per_frame_sample())
    }

    /// Audio time covered by one frame
    pub fn frame_duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        let nanos = self.frame_size as u128 * 1_000_000_000 / u128::from(self.sample_rate);
        Duration::from_nanos(nanos as u64)
    }

    /// Checks the values a capture device can be asked for
    pub fn validate(&self) -> Result<(), MicrophoneError> {
        if self.sample_rate == 0 {
            return Err(MicrophoneError::ConfigError(
                "sample rate must be non-zero".to_string(),
            ));
        }
        if self.frame_size == 0 {
            return Err(MicrophoneError::ConfigError(
                "frame size must be non-zero".to_string(),
            ));
        }
        if self.channels == 0 {
            return Err(MicrophoneError::ConfigError(
                "channel count must be non-zero".to_string(),
            ));
        }
        if !matches!(self.bits_per_sample, 8 | 16 | 32) {
            return Err(MicrophoneError::ConfigError(format!(
                "unsupported sample width: {} bits",
                self.bits_per_sample
            )));
        }
        // The frame assembler buffers two frames.
        let fits = self
            .frame_size
            .checked_mul(self.bytes_per_frame_sample())
            .and_then(|bytes| bytes.checked_mul(2))
            .is_some();
        if !fits {
            return Err(MicrophoneError::ConfigError(format!(
                "frame size too large: {} samples",
                self.frame_size
            )));
        }
        Ok(())
    }
}

//! Capture device interface
//!
//! The driver side of a microphone session: something that can be
//! configured, started and stopped, and that calls back with one frame of
//! raw PCM bytes at a time from its own thread.

use super::config::AudioConfig;
use std::time::Duration;
use thiserror::Error;

/// Microphone capture errors
#[derive(Error, Debug)]
pub enum MicrophoneError {
    #[error("No audio device found")]
    NoDevice,

    #[error("Audio device unavailable: {0}")]
    Unavailable(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("Audio device not opened")]
    NotStarted,
}

/// Directive returned to the driver after each frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackFlow {
    /// Keep streaming
    Continue,
    /// Stop delivering frames for the rest of the stream
    Stop,
}

/// Conditions the driver reported since the previous frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusFlags {
    /// Recoverable backend error (overrun, xrun, ...)
    pub stream_error: bool,
    /// The input device went away
    pub device_lost: bool,
}

impl StatusFlags {
    pub fn is_clear(&self) -> bool {
        !self.stream_error && !self.device_lost
    }
}

/// Metadata delivered with every frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallbackInfo {
    /// Samples per channel in the frame
    pub frame_count: usize,
    /// Time between capture and callback, when the driver knows it
    pub latency: Option<Duration>,
    pub status: StatusFlags,
}

impl CallbackInfo {
    pub fn new(frame_count: usize) -> Self {
        Self {
            frame_count,
            ..Default::default()
        }
    }
}

/// Per-frame callback registered with a [`CaptureDevice`]
///
/// Invoked on the driver's thread. Implementations must not block.
pub type FrameCallback = Box<dyn FnMut(&[u8], &CallbackInfo) -> CallbackFlow + Send + 'static>;

/// A PCM input device
#[cfg_attr(test, mockall::automock)]
pub trait CaptureDevice {
    /// Acquires and configures the device and registers `callback`
    ///
    /// On error nothing stays acquired.
    fn open(&mut self, config: &AudioConfig, callback: FrameCallback)
        -> Result<(), MicrophoneError>;

    /// Starts frame delivery
    fn start(&mut self) -> Result<(), MicrophoneError>;

    /// Stops frame delivery
    fn stop(&mut self) -> Result<(), MicrophoneError>;

    /// Releases the device. Never fails.
    fn close(&mut self);
}

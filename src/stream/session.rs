//! Microphone session
//!
//! Owns the capture device and the frame queue for the lifetime of one
//! capture. Opening registers a callback that moves every frame into the
//! queue; closing stops the device and queues the end-of-stream marker
//! that ends the consumer's [`AudioChunks`].

use super::chunks::AudioChunks;
use super::queue::{Frame, FrameQueue};
use super::stats::{CaptureStats, StatsSnapshot};
use crate::audio::{
    AudioConfig, CallbackFlow, CallbackInfo, CaptureDevice, FrameCallback, MicrophoneError,
};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Session errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(#[from] MicrophoneError),

    #[error("Stream already opened")]
    AlreadyOpened,

    #[error("Stream closed")]
    Closed,
}

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Unopened = 0,
    Open = 1,
    /// Terminal
    Closed = 2,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Unopened,
            1 => SessionState::Open,
            _ => SessionState::Closed,
        }
    }
}

/// State reachable from the driver callback and the consumer
pub(crate) struct Shared {
    pub(crate) queue: FrameQueue,
    state: AtomicU8,
    pub(crate) stats: CaptureStats,
}

impl Shared {
    pub(crate) fn new() -> Self {
        Self {
            queue: FrameQueue::new(),
            state: AtomicU8::new(SessionState::Unopened as u8),
            stats: CaptureStats::default(),
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: SessionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Body of the frame callback
    fn accept(&self, bytes: &[u8], info: &CallbackInfo) -> CallbackFlow {
        if info.status.device_lost {
            self.stats.record_fault();
            tracing::error!("Input device lost, stopping capture");
            return CallbackFlow::Stop;
        }
        if info.status.stream_error {
            self.stats.record_stream_error();
            tracing::warn!("Driver reported a stream error, continuing");
        }

        if self.state() != SessionState::Open {
            self.stats.record_dropped();
            return CallbackFlow::Stop;
        }

        let frame = Frame::from(bytes);
        if frame.is_empty() {
            return CallbackFlow::Continue;
        }
        if self.queue.push_frame(frame) {
            self.stats.record_frame(bytes.len());
        } else {
            self.stats.record_dropped();
        }
        CallbackFlow::Continue
    }
}

/// Builds the callback handed to the device
///
/// Nothing unwinds out of it: a panic is counted as a fault and stops the
/// stream.
fn frame_callback(shared: Arc<Shared>) -> FrameCallback {
    Box::new(move |bytes: &[u8], info: &CallbackInfo| {
        match panic::catch_unwind(AssertUnwindSafe(|| shared.accept(bytes, info))) {
            Ok(flow) => flow,
            Err(_) => {
                shared.stats.record_fault();
                tracing::error!("Frame callback panicked, stopping capture");
                CallbackFlow::Stop
            }
        }
    })
}

/// A microphone capture session
///
/// Closed on drop, so the device is released and the consumer sees the
/// end of the stream on every exit path.
pub struct MicrophoneStream<D: CaptureDevice> {
    device: D,
    config: AudioConfig,
    shared: Arc<Shared>,
}

impl<D: CaptureDevice> MicrophoneStream<D> {
    /// Creates an unopened session
    pub fn new(device: D, config: AudioConfig) -> Self {
        Self {
            device,
            config,
            shared: Arc::new(Shared::new()),
        }
    }

    /// Creates a session and opens it
    pub fn open(device: D, config: AudioConfig) -> Result<Self, SessionError> {
        let mut stream = Self::new(device, config);
        stream.enter()?;
        Ok(stream)
    }

    /// Acquires the device and starts capturing
    ///
    /// On failure the device is released and the session stays unopened.
    pub fn enter(&mut self) -> Result<(), SessionError> {
        match self.shared.state() {
            SessionState::Unopened => {}
            SessionState::Open => return Err(SessionError::AlreadyOpened),
            SessionState::Closed => return Err(SessionError::Closed),
        }

        self.config.validate()?;
        self.device
            .open(&self.config, frame_callback(Arc::clone(&self.shared)))?;

        // Open before start, so the first frames are not refused.
        self.shared.set_state(SessionState::Open);
        if let Err(e) = self.device.start() {
            tracing::error!("Failed to start audio capture: {}", e);
            self.shared.set_state(SessionState::Unopened);
            self.device.close();
            return Err(e.into());
        }

        tracing::info!(
            "Microphone stream open: {}Hz, {} samples per frame ({:?})",
            self.config.sample_rate,
            self.config.frame_size,
            self.config.frame_duration()
        );
        Ok(())
    }

    /// Stops capturing, ends the stream and releases the device
    ///
    /// Only the first call has any effect.
    pub fn close(&mut self) {
        let was_open = match self.shared.state() {
            SessionState::Closed => return,
            SessionState::Open => true,
            SessionState::Unopened => false,
        };

        if was_open {
            if let Err(e) = self.device.stop() {
                tracing::warn!("Failed to stop audio capture: {}", e);
            }
        }
        self.shared.set_state(SessionState::Closed);
        self.shared.queue.end();
        if was_open {
            self.device.close();
        }

        let stats = self.shared.stats.snapshot();
        tracing::info!(
            "Microphone stream closed: {} frames ({} bytes), {} dropped, {} faults",
            stats.frames_captured,
            stats.bytes_captured,
            stats.frames_dropped,
            stats.callback_faults
        );
    }

    /// The coalesced buffers of this session
    ///
    /// Meant for a single consumer; the sequence may be moved to another
    /// thread while this session stays where it can be closed.
    pub fn generator(&self) -> AudioChunks {
        AudioChunks::new(Arc::clone(&self.shared), self.config.end_of_stream)
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    pub fn is_closed(&self) -> bool {
        self.state() == SessionState::Closed
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }
}

impl<D: CaptureDevice> Drop for MicrophoneStream<D> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Runs `body` inside an open session, closing it however `body` returns
pub fn with_microphone<D, F, R>(device: D, config: AudioConfig, body: F) -> Result<R, SessionError>
where
    D: CaptureDevice,
    F: FnOnce(&mut MicrophoneStream<D>) -> R,
{
    let mut stream = MicrophoneStream::open(device, config)?;
    let result = body(&mut stream);
    stream.close();
    Ok(result)
}

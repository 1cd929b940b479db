//! Audio capture module
//!
//! Capture configuration, the device interface the session drives, and the
//! cpal microphone backend.

mod assembler;
mod config;
mod device;
mod microphone;

pub use assembler::FrameAssembler;
pub use config::{AudioConfig, EndOfStreamPolicy};
#[cfg(test)]
pub use device::MockCaptureDevice;
pub use device::{
    CallbackFlow, CallbackInfo, CaptureDevice, FrameCallback, MicrophoneError, StatusFlags,
};
pub use microphone::CpalDevice;

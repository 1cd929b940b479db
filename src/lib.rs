//! micstream - microphone capture as a stream of PCM buffers
//!
//! A driver callback pushes fixed-size frames into an unbounded queue; the
//! consumer pulls them back out as one concatenated buffer per iteration,
//! holding everything that arrived while it was busy.
//!
//! ```no_run
//! use micstream::{AudioConfig, CpalDevice, MicrophoneStream};
//!
//! let config = AudioConfig::default();
//! let mut stream = MicrophoneStream::open(CpalDevice::from_config(&config), config)?;
//! for buffer in stream.generator().take(10) {
//!     println!("{} bytes", buffer.len());
//! }
//! stream.close();
//! # Ok::<(), micstream::SessionError>(())
//! ```

pub mod audio;
pub mod stream;

pub use audio::{AudioConfig, CaptureDevice, CpalDevice, EndOfStreamPolicy, MicrophoneError};
pub use stream::{with_microphone, AudioChunks, MicrophoneStream, SessionError, SessionState};

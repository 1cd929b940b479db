//! Capture-to-consumer buffering
//!
//! Frames flow from the device callback into the frame queue, and out of it
//! as coalesced buffers on the consumer's thread.

mod chunks;
mod queue;
mod session;
mod stats;

pub use chunks::AudioChunks;
pub use queue::{Frame, FrameQueue, QueueEmpty, QueueItem};
pub use session::{with_microphone, MicrophoneStream, SessionError, SessionState};
pub use stats::{CaptureStats, StatsSnapshot};

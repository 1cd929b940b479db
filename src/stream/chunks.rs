//! Drain-and-coalesce iterator
//!
//! Each call to `next` waits for one frame, then sweeps every frame that
//! is already queued without waiting, and returns them concatenated. The
//! number of buffers handed out therefore follows the consumer's pace
//! rather than the driver's callback rate.

use super::queue::{Frame, QueueEmpty, QueueItem};
use super::session::{SessionState, Shared};
use crate::audio::EndOfStreamPolicy;
use std::iter::FusedIterator;
use std::sync::Arc;

/// Coalesced PCM buffers of a microphone session
///
/// Finite and non-restartable: ends at the end-of-stream marker pushed by
/// [`MicrophoneStream::close`](super::MicrophoneStream::close) and yields
/// nothing afterwards.
pub struct AudioChunks {
    shared: Arc<Shared>,
    policy: EndOfStreamPolicy,
    finished: bool,
}

impl AudioChunks {
    pub(crate) fn new(shared: Arc<Shared>, policy: EndOfStreamPolicy) -> Self {
        Self {
            shared,
            policy,
            finished: false,
        }
    }

    fn finish(&mut self) -> Option<Vec<u8>> {
        self.finished = true;
        None
    }
}

impl Iterator for AudioChunks {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Vec<u8>> {
        if self.finished {
            return None;
        }

        let shared = Arc::clone(&self.shared);
        let queue = &shared.queue;
        if shared.state() == SessionState::Closed && queue.is_empty() {
            return self.finish();
        }

        let first = match queue.pop_blocking() {
            QueueItem::Frame(frame) => frame,
            QueueItem::EndOfStream => return self.finish(),
        };

        let mut frames = vec![first];
        loop {
            match queue.pop_nonblocking() {
                Ok(QueueItem::Frame(frame)) => frames.push(frame),
                Ok(QueueItem::EndOfStream) => {
                    self.finished = true;
                    if self.policy == EndOfStreamPolicy::Discard {
                        tracing::debug!(
                            "End of stream reached, discarding {} pending bytes",
                            frames.iter().map(Frame::len).sum::<usize>()
                        );
                        return None;
                    }
                    break;
                }
                Err(QueueEmpty) => break,
            }
        }

        let buffer = coalesce(frames);
        tracing::trace!("Coalesced {} bytes", buffer.len());
        Some(buffer)
    }
}

impl FusedIterator for AudioChunks {}

fn coalesce(frames: Vec<Frame>) -> Vec<u8> {
    if frames.len() == 1 {
        return frames.into_iter().next().map(Frame::into_bytes).unwrap_or_default();
    }

    let total = frames.iter().map(Frame::len).sum();
    let mut buffer = Vec::with_capacity(total);
    for frame in &frames {
        buffer.extend_from_slice(frame.as_bytes());
    }
    buffer
}

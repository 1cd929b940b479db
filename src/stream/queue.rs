//! Frame queue between the capture callback and the consumer
//!
//! Unbounded FIFO over a crossbeam channel. Pushing never blocks, so it is
//! safe from a driver callback; the consumer side can wait for the next
//! item or poll without waiting.

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::sync::{PoisonError, RwLock, TryLockError};

/// One fixed-duration slice of raw PCM bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame(Vec<u8>);

impl Frame {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for Frame {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Frame {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// An element of the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueItem {
    Frame(Frame),
    /// No more frames will follow
    EndOfStream,
}

/// Returned by [`FrameQueue::pop_nonblocking`] when nothing is queued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueEmpty;

pub struct FrameQueue {
    tx: Sender<QueueItem>,
    rx: Receiver<QueueItem>,
    /// Set when the marker is queued. Frames are sent under the read lock,
    /// the marker under the write lock, so no frame can follow the marker.
    ended: RwLock<bool>,
}

impl FrameQueue {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            tx,
            rx,
            ended: RwLock::new(false),
        }
    }

    /// Appends `item` at the tail
    ///
    /// Returns `false` when the item was refused: frames are refused once
    /// the end-of-stream marker is queued or being queued, and the marker
    /// is only ever queued once. Frames never wait on the lock.
    pub fn push(&self, item: QueueItem) -> bool {
        match item {
            QueueItem::Frame(_) => {
                let ended = match self.ended.try_read() {
                    Ok(ended) => ended,
                    Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                    Err(TryLockError::WouldBlock) => return false,
                };
                !*ended && self.tx.send(item).is_ok()
            }
            QueueItem::EndOfStream => {
                let mut ended = self.ended.write().unwrap_or_else(PoisonError::into_inner);
                if *ended {
                    return false;
                }
                *ended = true;
                self.tx.send(item).is_ok()
            }
        }
    }

    pub fn push_frame(&self, frame: impl Into<Frame>) -> bool {
        self.push(QueueItem::Frame(frame.into()))
    }

    /// Queues the end-of-stream marker, once
    pub fn end(&self) -> bool {
        self.push(QueueItem::EndOfStream)
    }

    /// Removes the head, waiting until there is one
    pub fn pop_blocking(&self) -> QueueItem {
        // Both ends live in `self`, so the channel cannot disconnect.
        self.rx.recv().unwrap_or(QueueItem::EndOfStream)
    }

    /// Removes the head if one is queued
    pub fn pop_nonblocking(&self) -> Result<QueueItem, QueueEmpty> {
        match self.rx.try_recv() {
            Ok(item) => Ok(item),
            Err(TryRecvError::Empty) => Err(QueueEmpty),
            Err(TryRecvError::Disconnected) => Ok(QueueItem::EndOfStream),
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Default for FrameQueue {
    fn default() -> Self {
        Self::new()
    }
}

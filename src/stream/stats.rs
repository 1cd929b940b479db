//! Capture counters shared with the frame callback

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters the callback can update without blocking
#[derive(Debug, Default)]
pub struct CaptureStats {
    frames_captured: AtomicU64,
    bytes_captured: AtomicU64,
    frames_dropped: AtomicU64,
    stream_errors: AtomicU64,
    callback_faults: AtomicU64,
}

/// Point-in-time copy of [`CaptureStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub frames_captured: u64,
    pub bytes_captured: u64,
    /// Frames refused because the session was not open
    pub frames_dropped: u64,
    /// Recoverable errors reported by the driver
    pub stream_errors: u64,
    /// Faults that halted the stream
    pub callback_faults: u64,
}

impl CaptureStats {
    pub fn record_frame(&self, bytes: usize) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
        self.bytes_captured
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stream_error(&self) {
        self.stream_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fault(&self) {
        self.callback_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            bytes_captured: self.bytes_captured.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            stream_errors: self.stream_errors.load(Ordering::Relaxed),
            callback_faults: self.callback_faults.load(Ordering::Relaxed),
        }
    }
}

//! Fixed-size frame assembly
//!
//! Drivers hand over whatever period size the backend picked. The
//! assembler buffers those bytes in a ring buffer and cuts them into
//! frames of exactly `frame_bytes`, keeping the remainder for the next
//! period.

use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};

pub struct FrameAssembler {
    producer: HeapProd<u8>,
    consumer: HeapCons<u8>,
    frame_bytes: usize,
}

impl FrameAssembler {
    pub fn new(frame_bytes: usize) -> Self {
        let frame_bytes = frame_bytes.max(1);
        // Twice the frame size lets a period be taken in one push; one frame
        // is the minimum for progress.
        let rb = HeapRb::<u8>::new(frame_bytes.checked_mul(2).unwrap_or(frame_bytes));
        let (producer, consumer) = rb.split();
        Self {
            producer,
            consumer,
            frame_bytes,
        }
    }

    /// Bytes held back waiting for a complete frame
    #[cfg(test)]
    fn pending(&self) -> usize {
        self.consumer.occupied_len()
    }

    /// Feeds `bytes` and calls `emit` for every complete frame, in order
    pub fn push(&mut self, mut bytes: &[u8], mut emit: impl FnMut(Vec<u8>)) {
        while !bytes.is_empty() {
            let written = self.producer.push_slice(bytes);
            bytes = &bytes[written..];

            while self.consumer.occupied_len() >= self.frame_bytes {
                let mut frame = vec![0u8; self.frame_bytes];
                self.consumer.pop_slice(&mut frame);
                emit(frame);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(assembler: &mut FrameAssembler, bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        assembler.push(bytes, |frame| frames.push(frame));
        frames
    }

    #[test]
    fn slices_exact_frames() {
        let mut assembler = FrameAssembler::new(4);
        let frames = collect(&mut assembler, &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(frames, vec![vec![1, 2, 3, 4], vec![5, 6, 7, 8]]);
        assert_eq!(assembler.pending(), 0);
    }

    #[test]
    fn keeps_remainder_for_next_period() {
        let mut assembler = FrameAssembler::new(4);
        assert!(collect(&mut assembler, &[1, 2, 3]).is_empty());
        assert_eq!(assembler.pending(), 3);

        let frames = collect(&mut assembler, &[4, 5]);
        assert_eq!(frames, vec![vec![1, 2, 3, 4]]);
        assert_eq!(assembler.pending(), 1);
    }

    #[test]
    fn handles_periods_larger_than_the_ring() {
        let mut assembler = FrameAssembler::new(3);
        let input: Vec<u8> = (0..20).collect();
        let frames = collect(&mut assembler, &input);

        assert_eq!(frames.len(), 6);
        assert_eq!(frames.concat(), input[..18].to_vec());
        assert_eq!(assembler.pending(), 2);
    }
}

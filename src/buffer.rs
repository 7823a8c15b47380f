//! Sliding frame window
//!
//! Holds the most recent two-handed frames up to capacity. Any frame that does
//! not show both hands breaks the gesture in progress, so the whole window is
//! discarded rather than keeping stale frames around.

use std::collections::VecDeque;

use crate::types::{BufferStatus, LandmarkFrame};

/// Result of a push into the window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferPush {
    /// Frame stored; `window_ready` is set on the push that first fills the window
    Appended { count: usize, window_ready: bool },
    /// Frame did not show two hands; window discarded
    Reset { hand_count: u8, discarded: usize },
}

/// Bounded FIFO window with a two-hand gate
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    frames: VecDeque<LandmarkFrame>,
    capacity: usize,
    /// Next fill to capacity fires "window ready"
    armed: bool,
    /// Bumped whenever the contents are discarded
    generation: u64,
}

impl FrameBuffer {
    /// Create an empty window with the given capacity (at least 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
            armed: true,
            generation: 0,
        }
    }

    /// Push a validated frame through the two-hand gate
    pub fn push(&mut self, frame: LandmarkFrame) -> BufferPush {
        let hand_count = frame.hand_count();
        if hand_count != 2 {
            let discarded = self.frames.len();
            self.clear();
            return BufferPush::Reset {
                hand_count,
                discarded,
            };
        }

        self.frames.push_back(frame);
        while self.frames.len() > self.capacity {
            self.frames.pop_front();
        }

        let window_ready = self.armed && self.frames.len() == self.capacity;
        if window_ready {
            self.armed = false;
        }

        BufferPush::Appended {
            count: self.frames.len(),
            window_ready,
        }
    }

    /// Drop the `n` oldest frames. Re-arms the ready signal if the window is no
    /// longer full.
    pub fn drop_oldest(&mut self, n: usize) -> usize {
        let n = n.min(self.frames.len());
        self.frames.drain(..n);
        if self.frames.len() < self.capacity {
            self.armed = true;
        }
        n
    }

    /// Let the next push that leaves the window full fire "window ready" again
    pub fn rearm(&mut self) {
        self.armed = true;
    }

    /// Discard every frame
    pub fn clear(&mut self) {
        self.frames.clear();
        self.armed = true;
        self.generation += 1;
    }

    /// Change capacity; the window restarts empty
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        self.frames = VecDeque::with_capacity(self.capacity);
        self.armed = true;
        self.generation += 1;
    }

    /// Copy of the current window, oldest first
    pub fn snapshot(&self) -> Vec<LandmarkFrame> {
        self.frames.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Changes every time the window is reset, cleared or resized; a window
    /// taken at one generation shares no frames with a later one.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn status(&self) -> BufferStatus {
        BufferStatus {
            count: self.frames.len(),
            capacity: self.capacity,
            ready: self.frames.len() == self.capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HAND_SIZE;

    fn two_hands(tag: f64) -> LandmarkFrame {
        LandmarkFrame::try_from(vec![tag; HAND_SIZE * 2]).unwrap()
    }

    fn left_only() -> LandmarkFrame {
        let mut v = vec![0.3; HAND_SIZE];
        v.extend(vec![0.0; HAND_SIZE]);
        LandmarkFrame::try_from(v).unwrap()
    }

    #[test]
    fn test_length_is_min_of_pushes_and_capacity() {
        let mut buffer = FrameBuffer::new(5);
        for k in 1..=12 {
            buffer.push(two_hands(k as f64));
            assert_eq!(buffer.len(), k.min(5));
        }
        assert!(buffer.status().ready);
    }

    #[test]
    fn test_eviction_removes_oldest() {
        let mut buffer = FrameBuffer::new(3);
        for k in 1..=5 {
            buffer.push(two_hands(k as f64));
        }
        let tags: Vec<f64> = buffer.snapshot().iter().map(|f| f.values()[0]).collect();
        assert_eq!(tags, vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_window_ready_fires_once_per_fill() {
        let mut buffer = FrameBuffer::new(4);
        let mut fired = 0;
        for k in 0..10 {
            let push = buffer.push(two_hands(k as f64 + 1.0));
            if matches!(push, BufferPush::Appended { window_ready: true, .. }) {
                fired += 1;
            }
        }
        assert_eq!(fired, 1);

        buffer.clear();
        for k in 0..4 {
            let push = buffer.push(two_hands(k as f64 + 1.0));
            assert_eq!(
                push,
                BufferPush::Appended {
                    count: k + 1,
                    window_ready: k == 3
                }
            );
        }
    }

    #[test]
    fn test_single_hand_resets_window() {
        let mut buffer = FrameBuffer::new(40);
        for _ in 0..39 {
            buffer.push(two_hands(0.5));
        }
        assert_eq!(
            buffer.push(left_only()),
            BufferPush::Reset {
                hand_count: 1,
                discarded: 39
            }
        );
        assert!(buffer.is_empty());

        let none = LandmarkFrame::try_from(vec![0.0; HAND_SIZE * 2]).unwrap();
        assert_eq!(
            buffer.push(none),
            BufferPush::Reset {
                hand_count: 0,
                discarded: 0
            }
        );
    }

    #[test]
    fn test_drop_oldest_rearms() {
        let mut buffer = FrameBuffer::new(4);
        for k in 0..4 {
            buffer.push(two_hands(k as f64 + 1.0));
        }
        assert_eq!(buffer.drop_oldest(2), 2);
        assert_eq!(buffer.snapshot()[0].values()[0], 3.0);

        buffer.push(two_hands(9.0));
        let push = buffer.push(two_hands(9.0));
        assert_eq!(
            push,
            BufferPush::Appended {
                count: 4,
                window_ready: true
            }
        );
        assert_eq!(buffer.drop_oldest(10), 4);
    }

    #[test]
    fn test_rearm_fires_on_next_full_push() {
        let mut buffer = FrameBuffer::new(2);
        buffer.push(two_hands(1.0));
        buffer.push(two_hands(2.0));
        assert_eq!(
            buffer.push(two_hands(3.0)),
            BufferPush::Appended {
                count: 2,
                window_ready: false
            }
        );
        buffer.rearm();
        assert_eq!(
            buffer.push(two_hands(4.0)),
            BufferPush::Appended {
                count: 2,
                window_ready: true
            }
        );
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut buffer = FrameBuffer::new(40);
        buffer.push(two_hands(1.0));
        buffer.clear();
        assert_eq!(buffer.status().count, 0);
        buffer.clear();
        assert_eq!(
            buffer.status(),
            BufferStatus {
                count: 0,
                capacity: 40,
                ready: false
            }
        );
    }

    #[test]
    fn test_generation_changes_only_when_contents_are_discarded() {
        let mut buffer = FrameBuffer::new(4);
        let start = buffer.generation();
        for k in 0..6 {
            buffer.push(two_hands(k as f64 + 1.0));
        }
        buffer.drop_oldest(2);
        assert_eq!(buffer.generation(), start);

        buffer.push(left_only());
        assert_eq!(buffer.generation(), start + 1);
        buffer.clear();
        buffer.set_capacity(8);
        assert_eq!(buffer.generation(), start + 3);
    }

    #[test]
    fn test_set_capacity_restarts_empty() {
        let mut buffer = FrameBuffer::new(4);
        buffer.push(two_hands(1.0));
        buffer.set_capacity(2);
        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), 2);
    }
}

//! Bounded transmit queue with pacing.
//!
//! Each slot owns one queue of already-encoded frames. The queue is a
//! circular buffer with head/tail indices modulo capacity; enqueueing into a
//! full queue is rejected without touching existing entries, so callers must
//! treat sends as best-effort under saturation.
//!
//! Draining is paced: [`PacketQueue::poll_transmit`] yields at most one
//! entry per cooldown interval. The channel value can only hold one frame
//! meaningfully; writing faster than the transport replicates means remote
//! observers never see the superseded frames.

use std::time::{Duration, Instant};

use bytes::Bytes;

/// One encoded frame awaiting transmission.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    /// Event id of the packet this frame carries.
    pub event_id: u32,
    /// The encoded frame, exactly one frame size long.
    pub frame: Bytes,
    /// Register in the reliability table before transmission.
    pub requires_ack: bool,
}

/// Bounded FIFO of encoded frames, drained at a fixed minimum interval.
pub struct PacketQueue {
    entries: Vec<Option<QueueEntry>>,
    head: usize,
    tail: usize,
    len: usize,
    cooldown: Duration,
    last_transmit: Option<Instant>,
}

impl PacketQueue {
    /// Create a queue with the given capacity and pacing cooldown.
    pub fn new(capacity: usize, cooldown: Duration) -> Self {
        assert!(capacity > 0, "queue capacity must be at least 1");
        Self {
            entries: (0..capacity).map(|_| None).collect(),
            head: 0,
            tail: 0,
            len: 0,
            cooldown,
            last_transmit: None,
        }
    }

    /// Append an entry. Returns `false` when the queue is full.
    pub fn enqueue(&mut self, entry: QueueEntry) -> bool {
        if self.len == self.entries.len() {
            return false;
        }
        self.entries[self.tail] = Some(entry);
        self.tail = (self.tail + 1) % self.entries.len();
        self.len += 1;
        true
    }

    /// Dequeue the head entry if the cooldown has elapsed.
    ///
    /// Returns `None` while the queue is empty or still cooling down. A
    /// returned entry counts as a transmission: the cooldown restarts at
    /// `now`.
    pub fn poll_transmit(&mut self, now: Instant) -> Option<QueueEntry> {
        if self.len == 0 {
            return None;
        }
        if let Some(last) = self.last_transmit {
            if now.duration_since(last) < self.cooldown {
                return None;
            }
        }

        let entry = self.entries[self.head].take();
        debug_assert!(entry.is_some(), "occupied slot at head");
        self.head = (self.head + 1) % self.entries.len();
        self.len -= 1;
        self.last_transmit = Some(now);
        entry
    }

    /// Number of queued entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the queue is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Check if the queue is at capacity.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.entries.len()
    }

    /// The configured capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(event_id: u32) -> QueueEntry {
        QueueEntry {
            event_id,
            frame: Bytes::from_static(b"frame"),
            requires_ack: false,
        }
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = PacketQueue::new(8, Duration::ZERO);
        let mut now = Instant::now();

        assert!(queue.enqueue(entry(1)));
        assert!(queue.enqueue(entry(2)));
        assert!(queue.enqueue(entry(3)));

        for expected in [1, 2, 3] {
            now += Duration::from_millis(1);
            let out = queue.poll_transmit(now).unwrap();
            assert_eq!(out.event_id, expected);
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_enqueue_rejected_at_capacity() {
        let mut queue = PacketQueue::new(2, Duration::ZERO);

        assert!(queue.enqueue(entry(1)));
        assert!(queue.enqueue(entry(2)));
        assert!(!queue.enqueue(entry(3)));
        assert!(queue.is_full());

        // existing entries are intact and still in order
        let mut now = Instant::now();
        now += Duration::from_millis(1);
        assert_eq!(queue.poll_transmit(now).unwrap().event_id, 1);
        now += Duration::from_millis(1);
        assert_eq!(queue.poll_transmit(now).unwrap().event_id, 2);
    }

    #[test]
    fn test_cooldown_paces_transmissions() {
        let cooldown = Duration::from_millis(100);
        let mut queue = PacketQueue::new(8, cooldown);
        let start = Instant::now();

        queue.enqueue(entry(1));
        queue.enqueue(entry(2));

        assert_eq!(queue.poll_transmit(start).unwrap().event_id, 1);
        // still cooling down
        assert!(queue
            .poll_transmit(start + Duration::from_millis(50))
            .is_none());
        assert_eq!(
            queue
                .poll_transmit(start + Duration::from_millis(100))
                .unwrap()
                .event_id,
            2
        );
    }

    #[test]
    fn test_first_transmit_is_immediate() {
        let mut queue = PacketQueue::new(4, Duration::from_secs(10));
        queue.enqueue(entry(1));
        assert!(queue.poll_transmit(Instant::now()).is_some());
    }

    #[test]
    fn test_empty_poll_does_not_restart_cooldown() {
        let cooldown = Duration::from_millis(100);
        let mut queue = PacketQueue::new(4, cooldown);
        let start = Instant::now();

        queue.enqueue(entry(1));
        assert!(queue.poll_transmit(start).is_some());

        // empty polls while cooling down must not push the window out
        assert!(queue.poll_transmit(start + Duration::from_millis(60)).is_none());

        queue.enqueue(entry(2));
        assert!(queue
            .poll_transmit(start + Duration::from_millis(100))
            .is_some());
    }

    #[test]
    fn test_wraparound_reuses_slots() {
        let mut queue = PacketQueue::new(2, Duration::ZERO);
        let mut now = Instant::now();

        for round in 0..5u32 {
            assert!(queue.enqueue(entry(round * 2)));
            assert!(queue.enqueue(entry(round * 2 + 1)));

            now += Duration::from_millis(1);
            assert_eq!(queue.poll_transmit(now).unwrap().event_id, round * 2);
            now += Duration::from_millis(1);
            assert_eq!(queue.poll_transmit(now).unwrap().event_id, round * 2 + 1);
        }
    }
}

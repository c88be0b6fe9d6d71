//! Bounded per-session delivery queue with drop-oldest overflow.

use crate::ieee_c37_118::frame::Frame;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// One item queued for delivery to a session. Frames are stamped and encoded
/// at send time; raw buffers go to the socket byte-for-byte.
#[derive(Debug, Clone)]
pub enum Outbound {
    Frame(Frame),
    Raw(Vec<u8>),
}

/// A bounded FIFO between the broadcast path and one session.
///
/// `push` never blocks: when the queue is full the oldest entry is evicted,
/// so a slow collector sees the freshest window of measurements and never
/// stalls the producer or its peers.
#[derive(Debug)]
pub struct DeliveryQueue {
    items: Mutex<VecDeque<Outbound>>,
    capacity: usize,
}

impl DeliveryQueue {
    pub fn new(capacity: usize) -> Self {
        DeliveryQueue {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Enqueues an item, evicting the oldest entry if the queue is full.
    pub fn push(&self, item: Outbound) {
        let mut items = self.items.lock();
        if items.len() == self.capacity {
            items.pop_front();
        }
        items.push_back(item);
    }

    pub fn pop(&self) -> Option<Outbound> {
        self.items.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(n: u8) -> Outbound {
        Outbound::Raw(vec![n])
    }

    fn raw_value(item: Outbound) -> u8 {
        match item {
            Outbound::Raw(bytes) => bytes[0],
            Outbound::Frame(_) => panic!("expected a raw item"),
        }
    }

    #[test]
    fn test_fifo_order() {
        let queue = DeliveryQueue::new(10);
        queue.push(raw(1));
        queue.push(raw(2));
        queue.push(raw(3));

        assert_eq!(queue.len(), 3);
        assert_eq!(raw_value(queue.pop().unwrap()), 1);
        assert_eq!(raw_value(queue.pop().unwrap()), 2);
        assert_eq!(raw_value(queue.pop().unwrap()), 3);
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let queue = DeliveryQueue::new(3);
        for n in 1..=4 {
            queue.push(raw(n));
        }

        assert_eq!(queue.len(), 3);
        assert_eq!(raw_value(queue.pop().unwrap()), 2);
        assert_eq!(raw_value(queue.pop().unwrap()), 3);
        assert_eq!(raw_value(queue.pop().unwrap()), 4);
    }

    #[test]
    fn test_sustained_overflow_keeps_newest_window() {
        let queue = DeliveryQueue::new(500);
        for n in 0..600u16 {
            queue.push(Outbound::Raw(n.to_be_bytes().to_vec()));
        }

        assert_eq!(queue.len(), 500);
        let first = match queue.pop().unwrap() {
            Outbound::Raw(bytes) => u16::from_be_bytes([bytes[0], bytes[1]]),
            Outbound::Frame(_) => panic!("expected a raw item"),
        };
        assert_eq!(first, 100);
    }
}

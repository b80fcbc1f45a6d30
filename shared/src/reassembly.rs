//! Receive-side reassembly of fragmented messages
//!
//! Fragments are keyed by sender address, room and message id, so frames of
//! different messages can interleave without mixing. A retransmitted frame
//! (its ACK got lost) is recognised and dropped instead of being surfaced a
//! second time.

use crate::frame::Frame;
use crate::room::RoomId;
use log::debug;
use std::collections::{HashMap, HashSet, VecDeque};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// How many completed messages are remembered for duplicate suppression
pub const DEFAULT_COMPLETED_WINDOW: usize = 256;

type MessageKey = (SocketAddr, RoomId, u32);

#[derive(Debug)]
struct PartialMessage {
    fragments: Vec<Option<Vec<u8>>>,
    received: usize,
    started: Instant,
}

impl PartialMessage {
    fn new(count: u16) -> Self {
        Self {
            fragments: vec![None; count as usize],
            received: 0,
            started: Instant::now(),
        }
    }

    fn join(self) -> Vec<u8> {
        self.fragments.into_iter().flatten().flatten().collect()
    }
}

#[derive(Debug)]
pub struct Reassembler {
    partial: HashMap<MessageKey, PartialMessage>,
    completed: VecDeque<MessageKey>,
    completed_set: HashSet<MessageKey>,
    completed_window: usize,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new(DEFAULT_COMPLETED_WINDOW)
    }
}

impl Reassembler {
    pub fn new(completed_window: usize) -> Self {
        Self {
            partial: HashMap::new(),
            completed: VecDeque::with_capacity(completed_window),
            completed_set: HashSet::with_capacity(completed_window),
            completed_window,
        }
    }

    /// Feeds one received fragment
    ///
    /// Returns the full message payload once the last missing fragment
    /// arrives, `None` otherwise (including for duplicates).
    pub fn accept(&mut self, from: SocketAddr, frame: &Frame) -> Option<Vec<u8>> {
        let key = (from, frame.room, frame.message_id);

        if self.completed_set.contains(&key) {
            debug!(
                "Dropping duplicate fragment {} of message {} from {}",
                frame.fragment_index, frame.message_id, from
            );
            return None;
        }

        let partial = self
            .partial
            .entry(key)
            .or_insert_with(|| PartialMessage::new(frame.fragment_count));

        // Same id reused with a different shape: the sender restarted
        if partial.fragments.len() != frame.fragment_count as usize {
            *partial = PartialMessage::new(frame.fragment_count);
        }

        let slot = &mut partial.fragments[frame.fragment_index as usize];
        if slot.is_some() {
            debug!(
                "Fragment {} of message {} from {} already received",
                frame.fragment_index, frame.message_id, from
            );
            return None;
        }
        *slot = Some(frame.payload.clone());
        partial.received += 1;

        if partial.received < partial.fragments.len() {
            return None;
        }

        let message = self.partial.remove(&key)?;
        self.remember_completed(key);
        Some(message.join())
    }

    fn remember_completed(&mut self, key: MessageKey) {
        if self.completed_window == 0 {
            return;
        }
        if self.completed.len() == self.completed_window {
            if let Some(oldest) = self.completed.pop_front() {
                self.completed_set.remove(&oldest);
            }
        }
        self.completed.push_back(key);
        self.completed_set.insert(key);
    }

    /// Drops partial messages that started more than `max_age` ago
    ///
    /// Returns the number of messages discarded.
    pub fn purge_older_than(&mut self, max_age: Duration) -> usize {
        let before = self.partial.len();
        self.partial
            .retain(|_, partial| partial.started.elapsed() <= max_age);
        before - self.partial.len()
    }

    /// Number of messages still waiting for fragments
    pub fn pending(&self) -> usize {
        self.partial.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::fragment;
    use crate::BUFF_SIZE;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    #[test]
    fn test_single_fragment_message() {
        let mut reassembler = Reassembler::default();
        let frames = fragment(RoomId::new(5), b"hello", 4000, 1).unwrap();

        let message = reassembler.accept(test_addr(), &frames[0]);
        assert_eq!(message.as_deref(), Some(&b"hello"[..]));
        assert_eq!(reassembler.pending(), 0);
    }

    #[test]
    fn test_multi_fragment_message() {
        let mut reassembler = Reassembler::default();
        let payload: Vec<u8> = (0..5000).map(|i| (i % 256) as u8).collect();
        let frames = fragment(RoomId::new(5), &payload, 4000, 9).unwrap();
        assert_eq!(frames.len(), 3);

        assert!(reassembler.accept(test_addr(), &frames[0]).is_none());
        assert!(reassembler.accept(test_addr(), &frames[1]).is_none());
        assert_eq!(reassembler.pending(), 1);

        let message = reassembler.accept(test_addr(), &frames[2]).unwrap();
        assert_eq!(message, payload);
        assert_eq!(reassembler.pending(), 0);
    }

    #[test]
    fn test_out_of_order_fragments() {
        let mut reassembler = Reassembler::default();
        let payload = vec![7u8; BUFF_SIZE * 2 + 10];
        let frames = fragment(RoomId::new(1), &payload, 4000, 2).unwrap();

        assert!(reassembler.accept(test_addr(), &frames[2]).is_none());
        assert!(reassembler.accept(test_addr(), &frames[0]).is_none());
        assert_eq!(reassembler.accept(test_addr(), &frames[1]), Some(payload));
    }

    #[test]
    fn test_duplicate_fragment_ignored() {
        let mut reassembler = Reassembler::default();
        let payload = vec![1u8; BUFF_SIZE + 1];
        let frames = fragment(RoomId::new(1), &payload, 4000, 2).unwrap();

        assert!(reassembler.accept(test_addr(), &frames[0]).is_none());
        assert!(reassembler.accept(test_addr(), &frames[0]).is_none());
        assert_eq!(reassembler.accept(test_addr(), &frames[1]), Some(payload));
    }

    #[test]
    fn test_retransmitted_message_not_surfaced_twice() {
        let mut reassembler = Reassembler::default();
        let frames = fragment(RoomId::new(5), b"hi", 4000, 11).unwrap();

        assert!(reassembler.accept(test_addr(), &frames[0]).is_some());
        assert!(reassembler.accept(test_addr(), &frames[0]).is_none());
        assert_eq!(reassembler.pending(), 0);
    }

    #[test]
    fn test_interleaved_senders_do_not_mix() {
        let mut reassembler = Reassembler::default();
        let a = vec![b'a'; BUFF_SIZE + 5];
        let b = vec![b'b'; BUFF_SIZE + 5];
        let frames_a = fragment(RoomId::new(3), &a, 4000, 1).unwrap();
        let frames_b = fragment(RoomId::new(3), &b, 4001, 1).unwrap();

        assert!(reassembler.accept(test_addr(), &frames_a[0]).is_none());
        assert!(reassembler.accept(test_addr2(), &frames_b[0]).is_none());
        assert_eq!(reassembler.accept(test_addr2(), &frames_b[1]), Some(b));
        assert_eq!(reassembler.accept(test_addr(), &frames_a[1]), Some(a));
    }

    #[test]
    fn test_completed_window_is_bounded() {
        let mut reassembler = Reassembler::new(2);
        let first = fragment(RoomId::new(0), b"1", 4000, 1).unwrap();
        let second = fragment(RoomId::new(0), b"2", 4000, 2).unwrap();
        let third = fragment(RoomId::new(0), b"3", 4000, 3).unwrap();

        assert!(reassembler.accept(test_addr(), &first[0]).is_some());
        assert!(reassembler.accept(test_addr(), &second[0]).is_some());
        assert!(reassembler.accept(test_addr(), &third[0]).is_some());

        // the first id fell out of the window, so it is accepted again
        assert!(reassembler.accept(test_addr(), &first[0]).is_some());
        assert!(reassembler.accept(test_addr(), &third[0]).is_none());
    }

    #[test]
    fn test_purge_stale_partials() {
        let mut reassembler = Reassembler::default();
        let frames = fragment(RoomId::new(1), &vec![0u8; BUFF_SIZE + 1], 4000, 5).unwrap();

        reassembler.accept(test_addr(), &frames[0]);
        assert_eq!(reassembler.purge_older_than(Duration::from_secs(60)), 0);
        assert_eq!(reassembler.pending(), 1);

        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(reassembler.purge_older_than(Duration::from_millis(1)), 1);
        assert_eq!(reassembler.pending(), 0);
    }
}

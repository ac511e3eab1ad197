//! Per-session bounded caches
//!
//! [`ResendCache`] remembers the last messages a session sent so they can be
//! replayed when the client reports a gap. [`GameDataCache`] mirrors the
//! client's table of recent game-data payloads so repeated inputs can travel
//! as a one-byte key.

use protocol::{Message, MessageNumber};
use std::collections::VecDeque;

/// The most recently sent messages, oldest first
#[derive(Debug)]
pub struct ResendCache {
    messages: VecDeque<Message>,
    capacity: usize,
}

impl ResendCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            messages: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Records a sent message, evicting the oldest one when full
    pub fn push(&mut self, message: Message) {
        if self.messages.len() == self.capacity {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
    }

    /// Messages numbered `from` up to the newest, in send order
    ///
    /// Returns nothing if `from` was already evicted or has not been sent:
    /// an evicted range is lost, not an error.
    pub fn since(&self, from: MessageNumber) -> Vec<Message> {
        let (Some(oldest), Some(newest)) = (self.messages.front(), self.messages.back()) else {
            return Vec::new();
        };

        if from.is_older_than(oldest.number()) || from.is_newer_than(newest.number()) {
            return Vec::new();
        }

        self.messages
            .iter()
            .skip_while(|m| m.number().is_older_than(from))
            .cloned()
            .collect()
    }

    /// The newest `count` messages, oldest first
    pub fn recent(&self, count: usize) -> Vec<Message> {
        let skip = self.messages.len().saturating_sub(count);
        self.messages.iter().skip(skip).cloned().collect()
    }

    pub fn oldest(&self) -> Option<MessageNumber> {
        self.messages.front().map(Message::number)
    }

    pub fn newest(&self) -> Option<MessageNumber> {
        self.messages.back().map(Message::number)
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Ring of recent game-data payloads addressed by a one-byte key
///
/// Both ends of a connection keep the same ring, so a payload seen before can
/// be referenced by its key instead of being sent again.
#[derive(Debug)]
pub struct GameDataCache {
    entries: Vec<Vec<u8>>,
    capacity: usize,
    next_slot: usize,
}

impl GameDataCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
            next_slot: 0,
        }
    }

    /// Stores `data`, overwriting the oldest slot when full, and returns its key
    pub fn add(&mut self, data: Vec<u8>) -> u8 {
        let slot = self.next_slot;
        if slot < self.entries.len() {
            self.entries[slot] = data;
        } else {
            self.entries.push(data);
        }
        self.next_slot = (slot + 1) % self.capacity;
        slot as u8
    }

    pub fn get(&self, key: u8) -> Option<&[u8]> {
        self.entries.get(key as usize).map(Vec::as_slice)
    }

    pub fn key_of(&self, data: &[u8]) -> Option<u8> {
        self.entries
            .iter()
            .position(|entry| entry.as_slice() == data)
            .map(|slot| slot as u8)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! Fixed-capacity ring storage
//!
//! `Ring` is the unsynchronized store behind [`MessageQueue`](super::MessageQueue).
//! Live entries occupy `head, head + 1, .., head + count - 1` modulo the
//! capacity; all other slots are `None`.

use super::entry::Entry;

pub(crate) struct Ring {
    slots: Box<[Option<Entry>]>,
    head: usize,
    count: usize,
}

impl Ring {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        debug_assert!(capacity > 0);
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            head: 0,
            count: 0,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.count
    }

    fn index(&self, offset: usize) -> usize {
        (self.head + offset) % self.capacity()
    }

    /// Append as the newest entry, returning the entry evicted to make room.
    pub(crate) fn push(&mut self, entry: Entry) -> Option<Entry> {
        let evicted = if self.count == self.capacity() {
            let oldest = self.slots[self.head].take();
            self.head = self.index(1);
            self.count -= 1;
            oldest
        } else {
            None
        };

        let tail = self.index(self.count);
        self.slots[tail] = Some(entry);
        self.count += 1;
        evicted
    }

    /// Remove and return up to `limit` qualifying entries, oldest first.
    ///
    /// `limit == 0` means no cap. An empty `channel` takes from the head
    /// without touching the rest of the ring; a non-empty one scans every
    /// live entry and compacts the survivors to the front.
    pub(crate) fn drain(&mut self, limit: usize, channel: &str) -> Vec<Entry> {
        if self.count == 0 {
            return Vec::new();
        }
        if channel.is_empty() {
            self.drain_head(limit)
        } else {
            self.drain_matching(limit, channel)
        }
    }

    fn drain_head(&mut self, limit: usize) -> Vec<Entry> {
        let n = if limit == 0 {
            self.count
        } else {
            self.count.min(limit)
        };

        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            let entry = self.slots[self.head]
                .take()
                .expect("live ring slot is occupied");
            out.push(entry);
            self.head = self.index(1);
            self.count -= 1;
        }
        if self.count == 0 {
            self.head = 0;
        }
        out
    }

    fn drain_matching(&mut self, limit: usize, channel: &str) -> Vec<Entry> {
        let mut out = Vec::new();
        let mut kept = Vec::with_capacity(self.count);

        for offset in 0..self.count {
            let idx = self.index(offset);
            let entry = self.slots[idx]
                .take()
                .expect("live ring slot is occupied");
            let room = limit == 0 || out.len() < limit;
            if room && entry.matches_channel(channel) {
                out.push(entry);
            } else {
                kept.push(entry);
            }
        }

        // Every slot is empty now; rewrite the survivors from index 0.
        self.head = 0;
        self.count = kept.len();
        for (slot, entry) in self.slots.iter_mut().zip(kept) {
            *slot = Some(entry);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(channel: &str, content: &str) -> Entry {
        Entry::new(channel, "u1", content).with_channel_name(format!("{}-name", channel))
    }

    fn contents(entries: &[Entry]) -> Vec<&str> {
        entries.iter().map(|e| e.content.as_str()).collect()
    }

    #[test]
    fn test_push_evicts_oldest_when_full() {
        let mut ring = Ring::with_capacity(3);
        assert!(ring.push(entry("a", "a")).is_none());
        assert!(ring.push(entry("a", "b")).is_none());
        assert!(ring.push(entry("a", "c")).is_none());
        let evicted = ring.push(entry("a", "d")).unwrap();
        assert_eq!(evicted.content, "a");
        assert_eq!(ring.len(), 3);
        assert_eq!(contents(&ring.drain(0, "")), vec!["b", "c", "d"]);
        assert_eq!(ring.len(), 0);
    }

    #[test]
    fn test_drain_head_respects_limit_and_wraps() {
        let mut ring = Ring::with_capacity(4);
        for c in ["1", "2", "3", "4", "5", "6"] {
            ring.push(entry("a", c));
        }
        assert_eq!(contents(&ring.drain(3, "")), vec!["3", "4", "5"]);
        ring.push(entry("a", "7"));
        ring.push(entry("a", "8"));
        assert_eq!(contents(&ring.drain(0, "")), vec!["6", "7", "8"]);
    }

    #[test]
    fn test_drain_empty_is_noop() {
        let mut ring = Ring::with_capacity(2);
        assert!(ring.drain(0, "").is_empty());
        assert!(ring.drain(5, "a").is_empty());
        assert_eq!(ring.len(), 0);
    }

    #[test]
    fn test_drain_matching_keeps_others_in_order() {
        let mut ring = Ring::with_capacity(8);
        ring.push(entry("a", "a1"));
        ring.push(entry("b", "b1"));
        ring.push(entry("a", "a2"));
        ring.push(entry("b", "b2"));
        ring.push(entry("a", "a3"));

        assert_eq!(contents(&ring.drain(2, "a")), vec!["a1", "a2"]);
        assert_eq!(ring.len(), 3);
        assert_eq!(contents(&ring.drain(0, "")), vec!["b1", "b2", "a3"]);
    }

    #[test]
    fn test_drain_matching_by_name() {
        let mut ring = Ring::with_capacity(4);
        ring.push(entry("a", "a1"));
        ring.push(entry("b", "b1"));
        assert_eq!(contents(&ring.drain(0, "b-name")), vec!["b1"]);
        assert_eq!(contents(&ring.drain(0, "")), vec!["a1"]);
    }

    #[test]
    fn test_compaction_after_wraparound() {
        let mut ring = Ring::with_capacity(3);
        for c in ["a1", "b1", "a2", "b2"] {
            let channel = &c[..1];
            ring.push(entry(channel, c));
        }
        // Ring now holds b1, a2, b2 with head != 0.
        assert_eq!(contents(&ring.drain(0, "b")), vec!["b1", "b2"]);
        ring.push(entry("c", "c1"));
        ring.push(entry("c", "c2"));
        assert_eq!(ring.len(), 3);
        assert_eq!(contents(&ring.drain(0, "")), vec!["a2", "c1", "c2"]);
    }
}

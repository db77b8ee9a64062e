//! State of mesh-under flooding.
use std::collections::{BTreeMap, VecDeque};

use crate::time::Instant;
use crate::wire::LinkAddress;

/// The broadcast sequence numbers recently seen from each originator.
#[derive(Debug)]
pub(crate) struct SeenCache {
    capacity: usize,
    seen: BTreeMap<LinkAddress, VecDeque<u8>>,
}

/// Flooded frames waiting for their forwarding jitter to pass.
#[derive(Debug, Default)]
pub(crate) struct Forwards {
    pending: BTreeMap<(Instant, u64), Vec<u8>>,
    sequence: u64,
}

impl SeenCache {
    /// Remember up to `capacity` sequence numbers per originator.
    pub(crate) fn new(capacity: usize) -> Self {
        SeenCache {
            capacity,
            seen: BTreeMap::new(),
        }
    }

    /// Record a sequence number, returning `true` if it had been seen before.
    ///
    /// Only the most recent numbers of each originator are remembered, older ones are forgotten
    /// first.
    pub(crate) fn record(&mut self, originator: LinkAddress, sequence: u8) -> bool {
        let seen = self.seen.entry(originator).or_default();
        if seen.contains(&sequence) {
            return true;
        }

        seen.push_back(sequence);
        while seen.len() > self.capacity {
            seen.pop_front();
        }
        false
    }
}

impl Forwards {
    /// Schedule a frame to be sent at an instant.
    pub(crate) fn push(&mut self, at: Instant, frame: Vec<u8>) {
        self.pending.insert((at, self.sequence), frame);
        self.sequence += 1;
    }

    /// Take the earliest frame due at or before `now`.
    pub(crate) fn pop_due(&mut self, now: Instant) -> Option<Vec<u8>> {
        let &(at, sequence) = self.pending.keys().next()?;
        if at > now {
            return None;
        }
        self.pending.remove(&(at, sequence))
    }

    /// The instant at which the next frame is due.
    pub(crate) fn next_due(&self) -> Option<Instant> {
        self.pending.keys().next().map(|&(at, _)| at)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn duplicates() {
        let mut cache = SeenCache::new(2);
        let one = LinkAddress::short(1);
        let two = LinkAddress::short(2);

        assert!(!cache.record(one, 7));
        assert!(cache.record(one, 7));
        // Per originator.
        assert!(!cache.record(two, 7));

        assert!(!cache.record(one, 8));
        assert!(!cache.record(one, 9));
        // Forgotten in favour of 8 and 9.
        assert!(!cache.record(one, 7));
        assert!(cache.record(one, 9));
    }

    #[test]
    fn forwards_in_order() {
        let mut forwards = Forwards::default();
        forwards.push(Instant::from_millis(5), vec![2]);
        forwards.push(Instant::from_millis(3), vec![1]);
        forwards.push(Instant::from_millis(5), vec![3]);
        assert_eq!(forwards.next_due(), Some(Instant::from_millis(3)));

        assert_eq!(forwards.pop_due(Instant::from_millis(2)), None);
        assert_eq!(forwards.pop_due(Instant::from_millis(5)), Some(vec![1]));
        assert_eq!(forwards.pop_due(Instant::from_millis(5)), Some(vec![2]));
        assert_eq!(forwards.pop_due(Instant::from_millis(5)), Some(vec![3]));
        assert_eq!(forwards.pop_due(Instant::from_millis(5)), None);
        assert_eq!(forwards.next_due(), None);
    }
}

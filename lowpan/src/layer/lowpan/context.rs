use std::collections::BTreeMap;

use crate::time::{Duration, Instant};
use crate::wire::{Ipv6Address, Ipv6Subnet};

/// The largest context id that the IPHC encoding can refer to.
pub const MAX_CONTEXT_ID: u8 = 15;

/// A compression context.
///
/// A prefix shared out of band between the nodes of a network, which lets addresses within it be
/// compressed to their interface id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context {
    /// The prefix that the context stands for.
    pub prefix: Ipv6Subnet,
    /// If the context may be used to compress new packets.
    ///
    /// An invalidated context is still used to decompress packets referring to it.
    pub compression_allowed: bool,
    /// The instant at which the context stops being valid.
    pub valid_until: Instant,
}

/// The compression contexts of an endpoint, keyed by context id.
#[derive(Debug, Default, Clone)]
pub struct ContextTable {
    entries: BTreeMap<u8, Context>,
}

impl Context {
    /// If the context may be chosen for compression at an instant.
    pub fn usable_for_compression(&self, now: Instant) -> bool {
        self.compression_allowed && self.valid_until > now
    }
}

impl ContextTable {
    /// Create an empty table.
    pub fn new() -> Self {
        ContextTable::default()
    }

    /// Add or replace a context.
    ///
    /// A lifetime of zero removes the context instead. Ids larger than [`MAX_CONTEXT_ID`] are
    /// ignored.
    ///
    /// [`MAX_CONTEXT_ID`]: constant.MAX_CONTEXT_ID.html
    pub fn add(
        &mut self,
        id: u8,
        prefix: Ipv6Subnet,
        compression_allowed: bool,
        lifetime: Duration,
        now: Instant,
    ) {
        if id > MAX_CONTEXT_ID {
            net_debug!("context: invalid id {}, ignored", id);
            return;
        }

        if lifetime == Duration::ZERO {
            net_debug!("context: id {} added with zero lifetime, removed", id);
            self.entries.remove(&id);
            return;
        }

        net_debug!("context: id {} set to {} until {}", id, prefix, now + lifetime);
        self.entries.insert(id, Context {
            prefix,
            compression_allowed,
            valid_until: now + lifetime,
        });
    }

    /// Get a context, regardless of its state.
    pub fn get(&self, id: u8) -> Option<Context> {
        let context = self.entries.get(&id).copied();
        if context.is_none() {
            net_debug!("context: id {} not found", id);
        }
        context
    }

    /// Allow compression with a context again and extend its lifetime.
    pub fn renew(&mut self, id: u8, lifetime: Duration, now: Instant) {
        match self.entries.get_mut(&id) {
            Some(context) => {
                context.compression_allowed = true;
                context.valid_until = now + lifetime;
            },
            None => net_debug!("context: renew of unknown id {}", id),
        }
    }

    /// Disallow compression with a context.
    ///
    /// It is kept so that packets still in flight can be decompressed.
    pub fn invalidate(&mut self, id: u8) {
        match self.entries.get_mut(&id) {
            Some(context) => context.compression_allowed = false,
            None => net_debug!("context: invalidate of unknown id {}", id),
        }
    }

    /// Remove a context.
    pub fn remove(&mut self, id: u8) {
        if self.entries.remove(&id).is_none() {
            net_debug!("context: remove of unknown id {}", id);
        }
    }

    /// Iterate over all contexts in order of their ids.
    pub fn contexts(&self) -> impl Iterator<Item=(u8, &Context)> + '_ {
        self.entries.iter().map(|(&id, context)| (id, context))
    }

    /// Find a context for the stateful compression of a unicast address.
    ///
    /// The first usable context, by id, whose prefix contains the address is returned.
    pub fn find_unicast(&self, addr: Ipv6Address, now: Instant) -> Option<(u8, Context)> {
        self.usable(now)
            .find(|(_, context)| context.prefix.contains(addr))
    }

    /// Find a context for the stateful compression of a multicast address.
    ///
    /// Only unicast-prefix-based addresses of the form `ffXX:XXLL:PPPP:PPPP:PPPP:PPPP:XXXX:XXXX`
    /// can be compressed, where `LL` is the prefix length and `P` the prefix of a context that is
    /// at most 64 bits long.
    pub fn find_multicast(&self, addr: Ipv6Address, now: Instant) -> Option<(u8, Context)> {
        let bytes = addr.as_bytes();
        self.usable(now).find(|(_, context)| {
            let len = context.prefix.prefix_len();
            len <= 64
                && bytes[3] == len
                && bytes[4..12] == context.prefix.address().as_bytes()[..8]
        })
    }

    /// Look up a context for decompression.
    ///
    /// Invalidated contexts are returned, expired ones are not.
    pub fn lookup(&self, id: u8, now: Instant) -> Option<Context> {
        match self.entries.get(&id) {
            None => {
                net_debug!("context: packet refers to unknown id {}", id);
                None
            },
            Some(context) if context.valid_until < now => {
                net_debug!("context: packet refers to expired id {}", id);
                None
            },
            Some(context) => Some(*context),
        }
    }

    fn usable(&self, now: Instant) -> impl Iterator<Item=(u8, Context)> + '_ {
        self.entries.iter()
            .filter(move |(_, context)| context.usable_for_compression(now))
            .map(|(&id, &context)| (id, context))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn prefix() -> Ipv6Subnet {
        Ipv6Subnet::new(Ipv6Address::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0), 64)
    }

    fn host() -> Ipv6Address {
        Ipv6Address::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1)
    }

    #[test]
    fn add_get_remove() {
        let mut table = ContextTable::new();
        let now = Instant::from_secs(1);
        table.add(0, prefix(), true, Duration::from_secs(10), now);
        assert_eq!(table.get(0), Some(Context {
            prefix: prefix(),
            compression_allowed: true,
            valid_until: Instant::from_secs(11),
        }));

        table.add(16, prefix(), true, Duration::from_secs(10), now);
        assert_eq!(table.get(16), None);
        assert_eq!(table.contexts().count(), 1);

        table.add(0, prefix(), true, Duration::ZERO, now);
        assert_eq!(table.get(0), None);

        table.add(3, prefix(), true, Duration::from_secs(10), now);
        table.remove(3);
        assert_eq!(table.get(3), None);
    }

    #[test]
    fn expiry() {
        let mut table = ContextTable::new();
        table.add(1, prefix(), true, Duration::from_secs(10), Instant::ZERO);
        assert_eq!(table.find_unicast(host(), Instant::from_secs(9)).map(|(id, _)| id), Some(1));
        assert_eq!(table.find_unicast(host(), Instant::from_secs(10)), None);

        // Decompression still works up to and including the expiry instant.
        assert!(table.lookup(1, Instant::from_secs(10)).is_some());
        assert!(table.lookup(1, Instant::from_millis(10_001)).is_none());
        assert!(table.lookup(2, Instant::ZERO).is_none());
    }

    #[test]
    fn invalidate_and_renew() {
        let mut table = ContextTable::new();
        table.add(1, prefix(), true, Duration::from_secs(10), Instant::ZERO);
        table.invalidate(1);
        assert_eq!(table.find_unicast(host(), Instant::ZERO), None);
        assert!(table.lookup(1, Instant::ZERO).is_some());

        table.renew(1, Duration::from_secs(20), Instant::from_secs(5));
        let context = table.get(1).unwrap();
        assert!(context.compression_allowed);
        assert_eq!(context.valid_until, Instant::from_secs(25));
        assert_eq!(table.find_unicast(host(), Instant::from_secs(24)).map(|(id, _)| id), Some(1));
    }

    #[test]
    fn first_match_by_id() {
        let mut table = ContextTable::new();
        table.add(5, prefix(), true, Duration::from_secs(10), Instant::ZERO);
        table.add(2, Ipv6Subnet::new(host(), 32), true, Duration::from_secs(10), Instant::ZERO);
        assert_eq!(table.find_unicast(host(), Instant::ZERO).map(|(id, _)| id), Some(2));
        let other = Ipv6Address::new(0x2001, 0xdb9, 0, 0, 0, 0, 0, 1);
        assert_eq!(table.find_unicast(other, Instant::ZERO), None);
    }

    #[test]
    fn multicast() {
        let mut table = ContextTable::new();
        table.add(4, prefix(), true, Duration::from_secs(10), Instant::ZERO);
        let group = Ipv6Address::new(0xff3e, 0x0040, 0x2001, 0x0db8, 0, 0, 0, 0x1234);
        assert_eq!(table.find_multicast(group, Instant::ZERO).map(|(id, _)| id), Some(4));

        let wrong_len = Ipv6Address::new(0xff3e, 0x0030, 0x2001, 0x0db8, 0, 0, 0, 0x1234);
        assert_eq!(table.find_multicast(wrong_len, Instant::ZERO), None);
    }
}

//! Fragmentation of outgoing and reassembly of incoming datagrams.
use std::collections::BTreeMap;

use crate::layer::{Error, Result};
use crate::storage::{Assembler, Insert};
use crate::time::{Duration, Instant};
use crate::wire::LinkAddress;
use crate::wire::sixlowpan::frag::{self, FIRST_HEADER_LEN, MAX_DATAGRAM_SIZE, SUBSEQUENT_HEADER_LEN};

use super::compress::Compressed;
use super::{DropReason, Trace};

/// Split a compressed packet into fragment frames.
///
/// The frames start with their fragmentation header. `extra` is room that must remain in each
/// frame for headers added later, such as the mesh header.
///
/// Fails with `BadSize` if the datagram is too large to be described by the fragment headers.
///
/// # Panics
/// This function panics if the mtu is too small to hold a fragment header, the compressed headers
/// and the extra room, or too small to carry any data in subsequent fragments.
pub(crate) fn fragment(compressed: &Compressed, mtu: usize, extra: usize, tag: u16)
    -> Result<Vec<Vec<u8>>>
{
    let datagram_size = compressed.datagram_size;
    if datagram_size > MAX_DATAGRAM_SIZE {
        net_debug!("lowpan: datagram of {} octets too large to fragment", datagram_size);
        return Err(Error::BadSize);
    }

    let frame = &compressed.frame[..];
    let compressed_hdr = compressed.compressed_header_len();

    let first_room = mtu.checked_sub(FIRST_HEADER_LEN + compressed_hdr + extra)
        .unwrap_or_else(|| panic!("mtu {} too small for the first fragment", mtu));
    let first_len = (first_room - first_room % 8 + compressed_hdr).min(frame.len());

    let room = mtu.checked_sub(SUBSEQUENT_HEADER_LEN + extra)
        .map(|room| room - room % 8)
        .filter(|&room| room > 0)
        .unwrap_or_else(|| panic!("mtu {} too small for subsequent fragments", mtu));

    let mut fragments = Vec::new();
    let first = frag::Repr::First {
        datagram_size: datagram_size as u16,
        datagram_tag: tag,
    };
    fragments.push(with_header(first, &frame[..first_len]));

    let mut data_offset = first_len;
    let mut offset = first_len + compressed.header_len - compressed_hdr;
    while data_offset < frame.len() {
        let len = room.min(frame.len() - data_offset);
        let subsequent = frag::Repr::Subsequent {
            datagram_size: datagram_size as u16,
            datagram_tag: tag,
            datagram_offset: (offset / 8) as u8,
        };
        fragments.push(with_header(subsequent, &frame[data_offset..data_offset + len]));
        data_offset += len;
        offset += len;
    }

    net_trace!("lowpan: datagram of {} octets, tag {:#06x}, in {} fragments",
        datagram_size, tag, fragments.len());
    Ok(fragments)
}

fn with_header(header: frag::Repr, data: &[u8]) -> Vec<u8> {
    let len = header.buffer_len();
    let mut frame = vec![0; len + data.len()];
    header.emit(&mut frame);
    frame[len..].copy_from_slice(data);
    frame
}

/// Identifies the datagram a fragment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct Key {
    pub(crate) src: LinkAddress,
    pub(crate) dst: LinkAddress,
    pub(crate) size: u16,
    pub(crate) tag: u16,
}

/// Why a fragment was not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Refused {
    /// It reaches past the end of the datagram.
    OutOfBounds,
    /// It overlaps a stored fragment without being its duplicate.
    Overlap,
}

#[derive(Debug)]
struct Buffer {
    assembler: Assembler,
    deadline: (Instant, u64),
}

/// The datagrams currently being reassembled.
#[derive(Debug)]
pub(crate) struct Reassembly {
    capacity: usize,
    timeout: Duration,
    buffers: BTreeMap<Key, Buffer>,
    /// Deadlines, with a sequence number to keep datagrams created at the same instant apart.
    expiry: BTreeMap<(Instant, u64), Key>,
    sequence: u64,
}

impl Reassembly {
    /// Create an empty set of buffers.
    ///
    /// A capacity of zero does not limit the number of buffers.
    pub(crate) fn new(capacity: usize, timeout: Duration) -> Self {
        Reassembly {
            capacity,
            timeout,
            buffers: BTreeMap::new(),
            expiry: BTreeMap::new(),
            sequence: 0,
        }
    }

    /// The number of incomplete datagrams.
    pub(crate) fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Store a fragment.
    ///
    /// Returns the concatenated fragment data once the datagram is complete. For the first
    /// fragment `covered` is the length of the uncompressed datagram it stands for, for all others
    /// it is the length of their data.
    pub(crate) fn insert(
        &mut self,
        key: Key,
        offset: usize,
        covered: usize,
        data: &[u8],
        now: Instant,
        trace: &mut impl Trace,
    ) -> core::result::Result<Option<Vec<u8>>, Refused> {
        if offset + covered > usize::from(key.size) {
            net_debug!("lowpan: fragment at {} of {} octets beyond datagram size {}",
                offset, covered, key.size);
            return Err(Refused::OutOfBounds);
        }

        if !self.buffers.contains_key(&key) {
            if self.capacity > 0 && self.buffers.len() >= self.capacity {
                self.evict_oldest(trace);
            }
            let deadline = (now + self.timeout, self.sequence);
            self.sequence += 1;
            self.expiry.insert(deadline, key);
            self.buffers.insert(key, Buffer {
                assembler: Assembler::new(usize::from(key.size)),
                deadline,
            });
        }

        // Inserted above if it was missing.
        let buffer = match self.buffers.get_mut(&key) {
            Some(buffer) => buffer,
            None => return Ok(None),
        };

        match buffer.assembler.insert(offset, covered, data) {
            Ok(Insert::Added) => (),
            Ok(Insert::Duplicate) => {
                net_trace!("lowpan: duplicate fragment at {} ignored", offset);
                return Ok(None);
            },
            Err(_) => {
                net_debug!("lowpan: fragment at {} overlaps {}", offset, buffer.assembler);
                if buffer.assembler.is_empty() {
                    self.remove(key);
                }
                return Err(Refused::Overlap);
            },
        }

        net_trace!("lowpan: tag {:#06x} now {}", key.tag, buffer.assembler);
        if !buffer.assembler.is_entire() {
            return Ok(None);
        }

        let assembled = buffer.assembler.assemble();
        self.remove(key);
        Ok(Some(assembled))
    }

    /// Drop all datagrams whose deadline is at or before `now`.
    pub(crate) fn expire(&mut self, now: Instant, trace: &mut impl Trace) {
        while let Some((&(deadline, _), &key)) = self.expiry.iter().next() {
            if deadline > now {
                break;
            }
            net_debug!("lowpan: datagram tag {:#06x} from {} timed out", key.tag, key.src);
            self.drop_buffer(key, DropReason::FragmentTimeout, trace);
        }
    }

    /// The earliest deadline of all incomplete datagrams.
    pub(crate) fn next_expiry(&self) -> Option<Instant> {
        self.expiry.keys().next().map(|&(deadline, _)| deadline)
    }

    fn evict_oldest(&mut self, trace: &mut impl Trace) {
        if let Some(&key) = self.expiry.values().next() {
            net_debug!("lowpan: buffer full, evicting datagram tag {:#06x} from {}", key.tag, key.src);
            self.drop_buffer(key, DropReason::FragmentBufferFull, trace);
        }
    }

    fn drop_buffer(&mut self, key: Key, reason: DropReason, trace: &mut impl Trace) {
        if let Some(buffer) = self.remove(key) {
            for data in buffer.assembler.fragments() {
                trace.dropped(reason, data);
            }
        }
    }

    fn remove(&mut self, key: Key) -> Option<Buffer> {
        let buffer = self.buffers.remove(&key)?;
        self.expiry.remove(&buffer.deadline);
        Some(buffer)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Default)]
    struct Drops(Vec<(DropReason, Vec<u8>)>);

    impl Trace for Drops {
        fn dropped(&mut self, reason: DropReason, data: &[u8]) {
            self.0.push((reason, data.to_vec()));
        }
    }

    fn key(tag: u16) -> Key {
        Key {
            src: LinkAddress::short(1),
            dst: LinkAddress::short(2),
            size: 24,
            tag,
        }
    }

    #[test]
    fn split_sizes() {
        // 8 octets of compressed headers standing for 48, then 200 octets of payload.
        let mut frame = vec![0xaa; 8];
        frame.extend((0..200).map(|i| i as u8));
        let compressed = Compressed { frame, header_len: 48, datagram_size: 248 };

        let fragments = fragment(&compressed, 80, 0, 0x1234).unwrap();
        // (80 - 4 - 8) rounded down to 64, plus the headers.
        assert_eq!(fragments[0].len(), 4 + 72);
        assert_eq!(&fragments[0][..4], &[0xc0, 0xf8, 0x12, 0x34]);

        // (80 - 5) rounded down to 72.
        assert_eq!(fragments[1].len(), 5 + 72);
        assert_eq!(fragments[1][4], (64 + 48) / 8);
        assert_eq!(fragments[2].len(), 5 + 200 - 64 - 72);
        assert_eq!(fragments[2][4], (64 + 48 + 72) / 8);
        assert_eq!(fragments.len(), 3);

        assert!(fragments.iter().all(|frame| frame.len() <= 80));
    }

    #[test]
    fn too_large() {
        let compressed = Compressed::uncompressed(&[0; 2048]);
        assert_eq!(fragment(&compressed, 127, 0, 0), Err(Error::BadSize));
    }

    #[test]
    #[should_panic]
    fn mtu_too_small() {
        let compressed = Compressed::uncompressed(&[0; 100]);
        let _ = fragment(&compressed, 12, 0, 0);
    }

    #[test]
    fn complete() {
        let mut buffers = Reassembly::new(0, Duration::from_secs(60));
        let mut drops = Drops::default();
        let now = Instant::ZERO;

        assert_eq!(buffers.insert(key(1), 16, 8, &[3; 8], now, &mut drops), Ok(None));
        // A duplicate does not disturb.
        assert_eq!(buffers.insert(key(1), 16, 8, &[3; 8], now, &mut drops), Ok(None));
        assert_eq!(buffers.len(), 1);
        assert_eq!(buffers.next_expiry(), Some(Instant::from_secs(60)));

        // The first fragment carries four octets standing for sixteen.
        let mut expected = vec![1; 4];
        expected.extend_from_slice(&[3; 8]);
        assert_eq!(buffers.insert(key(1), 0, 16, &[1; 4], now, &mut drops), Ok(Some(expected)));
        assert_eq!(buffers.len(), 0);
        assert_eq!(buffers.next_expiry(), None);
        assert!(drops.0.is_empty());
    }

    #[test]
    fn refused() {
        let mut buffers = Reassembly::new(0, Duration::from_secs(60));
        let mut drops = Drops::default();
        let now = Instant::ZERO;

        assert_eq!(buffers.insert(key(1), 16, 16, &[0; 16], now, &mut drops), Err(Refused::OutOfBounds));
        assert_eq!(buffers.len(), 0);

        assert_eq!(buffers.insert(key(1), 8, 8, &[0; 8], now, &mut drops), Ok(None));
        assert_eq!(buffers.insert(key(1), 8, 16, &[0; 16], now, &mut drops), Err(Refused::Overlap));
        assert_eq!(buffers.insert(key(1), 0, 16, &[0; 4], now, &mut drops), Err(Refused::Overlap));
        assert_eq!(buffers.len(), 1);
    }

    #[test]
    fn timeout() {
        let mut buffers = Reassembly::new(0, Duration::from_secs(60));
        let mut drops = Drops::default();

        buffers.insert(key(1), 0, 8, &[1; 8], Instant::ZERO, &mut drops).unwrap();
        buffers.insert(key(1), 16, 8, &[2; 8], Instant::from_secs(1), &mut drops).unwrap();
        buffers.insert(key(2), 0, 8, &[3; 8], Instant::from_secs(5), &mut drops).unwrap();
        assert_eq!(buffers.next_expiry(), Some(Instant::from_secs(60)));

        buffers.expire(Instant::from_millis(59_999), &mut drops);
        assert_eq!(buffers.len(), 2);

        buffers.expire(Instant::from_secs(60), &mut drops);
        assert_eq!(buffers.len(), 1);
        assert_eq!(drops.0, vec![
            (DropReason::FragmentTimeout, vec![1; 8]),
            (DropReason::FragmentTimeout, vec![2; 8]),
        ]);
        assert_eq!(buffers.next_expiry(), Some(Instant::from_secs(65)));
    }

    #[test]
    fn capacity() {
        let mut buffers = Reassembly::new(2, Duration::from_secs(60));
        let mut drops = Drops::default();
        let now = Instant::ZERO;

        buffers.insert(key(1), 0, 8, &[1; 8], now, &mut drops).unwrap();
        buffers.insert(key(2), 0, 8, &[2; 8], now, &mut drops).unwrap();
        // Another fragment of a known datagram does not evict.
        buffers.insert(key(2), 8, 8, &[2; 8], now, &mut drops).unwrap();
        assert!(drops.0.is_empty());

        buffers.insert(key(3), 0, 8, &[3; 8], now, &mut drops).unwrap();
        assert_eq!(buffers.len(), 2);
        assert_eq!(drops.0, vec![(DropReason::FragmentBufferFull, vec![1; 8])]);
    }
}

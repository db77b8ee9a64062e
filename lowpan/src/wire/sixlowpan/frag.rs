//! The fragmentation headers, [RFC 4944 § 5.3].
//!
//! ```text
//! First fragment:
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |1 1 0 0 0|    datagram_size    |         datagram_tag          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!
//! Subsequent fragments:
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |1 1 1 0 0|    datagram_size    |         datagram_tag          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |datagram_offset|
//! +-+-+-+-+-+-+-+-+
//! ```
//!
//! [RFC 4944 § 5.3]: https://tools.ietf.org/html/rfc4944#section-5.3
use byteorder::{ByteOrder, NetworkEndian};

use crate::wire::{Error, Result};

mod field {
    use crate::wire::field::Field;

    pub(crate) const SIZE: Field = 0..2;
    pub(crate) const TAG: Field = 2..4;
    pub(crate) const OFFSET: usize = 4;
}

const DISPATCH_MASK: u16 = 0xf800;
const FIRST: u16 = 0xc000;
const SUBSEQUENT: u16 = 0xe000;

/// The largest datagram size the 11-bit size field can express.
pub const MAX_DATAGRAM_SIZE: usize = 0x07ff;

/// Length of the first fragment header.
pub const FIRST_HEADER_LEN: usize = field::TAG.end;

/// Length of the subsequent fragment header.
pub const SUBSEQUENT_HEADER_LEN: usize = field::OFFSET + 1;

/// A high-level representation of a fragmentation header.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Repr {
    /// The header of the fragment at offset zero.
    First {
        /// Size of the reassembled, uncompressed datagram.
        datagram_size: u16,
        /// Tag shared by all fragments of a datagram.
        datagram_tag: u16,
    },
    /// The header of all other fragments.
    Subsequent {
        /// Size of the reassembled, uncompressed datagram.
        datagram_size: u16,
        /// Tag shared by all fragments of a datagram.
        datagram_tag: u16,
        /// Offset in the uncompressed datagram, in units of eight octets.
        datagram_offset: u8,
    },
}

impl Repr {
    /// Parse a fragmentation header from the front of a buffer.
    pub fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < FIRST_HEADER_LEN {
            return Err(Error::Truncated);
        }

        let size_field = NetworkEndian::read_u16(&buffer[field::SIZE]);
        let datagram_size = size_field & !DISPATCH_MASK;
        let datagram_tag = NetworkEndian::read_u16(&buffer[field::TAG]);

        match size_field & DISPATCH_MASK {
            FIRST => Ok(Repr::First { datagram_size, datagram_tag }),
            SUBSEQUENT => {
                let datagram_offset = *buffer.get(field::OFFSET).ok_or(Error::Truncated)?;
                Ok(Repr::Subsequent { datagram_size, datagram_tag, datagram_offset })
            },
            _ => Err(Error::Unrecognized),
        }
    }

    /// Size of the reassembled datagram.
    pub fn datagram_size(&self) -> u16 {
        match *self {
            Repr::First { datagram_size, .. } | Repr::Subsequent { datagram_size, .. } => datagram_size,
        }
    }

    /// The tag identifying the datagram.
    pub fn datagram_tag(&self) -> u16 {
        match *self {
            Repr::First { datagram_tag, .. } | Repr::Subsequent { datagram_tag, .. } => datagram_tag,
        }
    }

    /// The offset of the fragment data in octets.
    pub fn offset(&self) -> usize {
        match *self {
            Repr::First { .. } => 0,
            Repr::Subsequent { datagram_offset, .. } => usize::from(datagram_offset) << 3,
        }
    }

    /// Return the length of the header that will be emitted.
    pub fn buffer_len(&self) -> usize {
        match self {
            Repr::First { .. } => FIRST_HEADER_LEN,
            Repr::Subsequent { .. } => SUBSEQUENT_HEADER_LEN,
        }
    }

    /// Emit the header into the first `buffer_len` octets of a buffer.
    pub fn emit(&self, buffer: &mut [u8]) {
        let dispatch = match self {
            Repr::First { .. } => FIRST,
            Repr::Subsequent { .. } => SUBSEQUENT,
        };
        let size = self.datagram_size() & !DISPATCH_MASK;
        NetworkEndian::write_u16(&mut buffer[field::SIZE], dispatch | size);
        NetworkEndian::write_u16(&mut buffer[field::TAG], self.datagram_tag());
        if let Repr::Subsequent { datagram_offset, .. } = *self {
            buffer[field::OFFSET] = datagram_offset;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn first() {
        let bytes = [0xc4, 0xd0, 0x12, 0x34];
        let repr = Repr::parse(&bytes).unwrap();
        assert_eq!(repr, Repr::First { datagram_size: 1232, datagram_tag: 0x1234 });
        assert_eq!(repr.offset(), 0);
        let mut out = [0; 4];
        repr.emit(&mut out);
        assert_eq!(out, bytes);
    }

    #[test]
    fn subsequent() {
        let bytes = [0xe4, 0xd0, 0x12, 0x34, 0x0d];
        let repr = Repr::parse(&bytes).unwrap();
        assert_eq!(repr, Repr::Subsequent {
            datagram_size: 1232,
            datagram_tag: 0x1234,
            datagram_offset: 13,
        });
        assert_eq!(repr.offset(), 104);
        assert_eq!(repr.buffer_len(), 5);
        let mut out = [0; 5];
        repr.emit(&mut out);
        assert_eq!(out, bytes);
    }

    #[test]
    fn truncated() {
        assert_eq!(Repr::parse(&[0xe4, 0xd0, 0x12, 0x34]), Err(Error::Truncated));
        assert_eq!(Repr::parse(&[0xc4, 0xd0, 0x12]), Err(Error::Truncated));
        assert_eq!(Repr::parse(&[0x41, 0, 0, 0]), Err(Error::Unrecognized));
    }
}

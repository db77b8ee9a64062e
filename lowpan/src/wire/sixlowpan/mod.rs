/*! The 6LoWPAN headers.

Every 6LoWPAN frame is a stack of headers, each announced by its first octet, the *dispatch*. The
order on the wire is fixed: an optional mesh addressing header, an optional broadcast header, an
optional fragmentation header and finally the (possibly compressed) IPv6 datagram.

| Dispatch          | Header                                      | Module      |
|-------------------|---------------------------------------------|-------------|
| `00xxxxxx`        | Not a LoWPAN frame                          |             |
| `01000001`        | Uncompressed IPv6                           |             |
| `01000010`        | HC1 compressed IPv6                         | [`hc1`]     |
| `01010000`        | Broadcast (BC0)                             | [`Bc0Repr`] |
| `011xxxxx`        | IPHC compressed IPv6                        | [`iphc`]    |
| `10xxxxxx`        | Mesh addressing                             | [`mesh`]    |
| `11000xxx`        | First fragment                              | [`frag`]    |
| `11100xxx`        | Subsequent fragment                         | [`frag`]    |

After IPHC, a compressed next header is announced by a `LOWPAN_NHC` octet instead, see [`nhc`].

[`hc1`]: hc1/index.html
[`Bc0Repr`]: struct.Bc0Repr.html
[`iphc`]: iphc/index.html
[`mesh`]: mesh/index.html
[`frag`]: frag/index.html
[`nhc`]: nhc/index.html
*/
pub mod frag;
pub mod hc1;
pub mod iphc;
pub mod mesh;
pub mod nhc;

use super::{Error, Result};

/// Dispatch of an uncompressed IPv6 datagram.
pub const DISPATCH_IPV6: u8 = 0x41;
/// Dispatch of an HC1 compressed datagram.
pub const DISPATCH_HC1: u8 = 0x42;
/// Dispatch of the broadcast header.
pub const DISPATCH_BC0: u8 = 0x50;

/// The kind of a header as announced by its dispatch octet.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Dispatch {
    /// Not a LoWPAN frame, to be ignored.
    Nalp,
    /// An uncompressed IPv6 datagram follows the dispatch octet.
    Ipv6,
    /// An HC1 compressed datagram.
    Hc1,
    /// The broadcast header.
    Bc0,
    /// An IPHC compressed datagram.
    Iphc,
    /// The mesh addressing header.
    Mesh,
    /// The first fragment header.
    Frag1,
    /// A subsequent fragment header.
    FragN,
    /// A reserved or otherwise unknown value.
    Unknown(u8),
}

impl Dispatch {
    /// Classify a dispatch octet.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x00..=0x3f => Dispatch::Nalp,
            DISPATCH_IPV6 => Dispatch::Ipv6,
            DISPATCH_HC1 => Dispatch::Hc1,
            DISPATCH_BC0 => Dispatch::Bc0,
            0x60..=0x7f => Dispatch::Iphc,
            0x80..=0xbf => Dispatch::Mesh,
            0xc0..=0xc7 => Dispatch::Frag1,
            0xe0..=0xe7 => Dispatch::FragN,
            other => Dispatch::Unknown(other),
        }
    }

    /// Classify the header at the front of a buffer.
    pub fn peek(buffer: &[u8]) -> Result<Self> {
        buffer.first()
            .map(|&byte| Dispatch::from_byte(byte))
            .ok_or(Error::Truncated)
    }
}

/// The broadcast header, carrying a sequence number for duplicate suppression.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Bc0Repr {
    /// The sequence number.
    pub sequence: u8,
}

impl Bc0Repr {
    /// Length of the header.
    pub const LEN: usize = 2;

    /// Parse the header from the front of a buffer.
    pub fn parse(buffer: &[u8]) -> Result<Self> {
        match buffer {
            [DISPATCH_BC0, sequence, ..] => Ok(Bc0Repr { sequence: *sequence }),
            [DISPATCH_BC0] | [] => Err(Error::Truncated),
            _ => Err(Error::Unrecognized),
        }
    }

    /// Return the length of the header that will be emitted.
    pub fn buffer_len(&self) -> usize {
        Self::LEN
    }

    /// Emit the header into the first `buffer_len` octets of a buffer.
    pub fn emit(&self, buffer: &mut [u8]) {
        buffer[0] = DISPATCH_BC0;
        buffer[1] = self.sequence;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dispatch_ranges() {
        assert_eq!(Dispatch::from_byte(0x00), Dispatch::Nalp);
        assert_eq!(Dispatch::from_byte(0x3f), Dispatch::Nalp);
        assert_eq!(Dispatch::from_byte(0x40), Dispatch::Unknown(0x40));
        assert_eq!(Dispatch::from_byte(0x41), Dispatch::Ipv6);
        assert_eq!(Dispatch::from_byte(0x42), Dispatch::Hc1);
        assert_eq!(Dispatch::from_byte(0x50), Dispatch::Bc0);
        assert_eq!(Dispatch::from_byte(0x7b), Dispatch::Iphc);
        assert_eq!(Dispatch::from_byte(0xba), Dispatch::Mesh);
        assert_eq!(Dispatch::from_byte(0xc4), Dispatch::Frag1);
        assert_eq!(Dispatch::from_byte(0xc8), Dispatch::Unknown(0xc8));
        assert_eq!(Dispatch::from_byte(0xe4), Dispatch::FragN);
        assert_eq!(Dispatch::from_byte(0xf0), Dispatch::Unknown(0xf0));
        assert_eq!(Dispatch::peek(&[]), Err(Error::Truncated));
    }

    #[test]
    fn bc0() {
        let repr = Bc0Repr { sequence: 7 };
        let mut bytes = [0; 2];
        repr.emit(&mut bytes);
        assert_eq!(bytes, [0x50, 7]);
        assert_eq!(Bc0Repr::parse(&bytes), Ok(repr));
        assert_eq!(Bc0Repr::parse(&bytes[..1]), Err(Error::Truncated));
        assert_eq!(Bc0Repr::parse(&[0x41, 7]), Err(Error::Unrecognized));
    }
}

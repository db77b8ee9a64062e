//! The generic layout shared by IPv6 extension headers.
//!
//! Hop-by-Hop options, Routing, Fragment, Destination options and Mobility headers all start
//! with a next header octet and a length octet. The adaptation layer does not interpret their
//! content, it only needs to move the bytes after those two octets around.
//!
//! ```text
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |  Next Header  |  Hdr Ext Len  |                               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+                               +
//! |                         Header data                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
use super::{Error, IpProtocol as Protocol, Result};

mod field {
    use crate::wire::field::{Field, Rest};

    pub(crate) const NXT_HDR: usize = 0;
    pub(crate) const LENGTH:  usize = 1;
    pub(crate) const DATA:    Rest = 2..;

    /// The Fragment header has a fixed size and a reserved octet in place of the length.
    pub(crate) const FRAGMENT: Field = 0..8;
}

/// A high-level representation of an extension header.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Repr<'a> {
    /// The kind of this header, that is the next header value announcing it.
    pub kind: Protocol,
    /// The header following this one.
    pub next_header: Protocol,
    /// All octets after the next header and length octets.
    ///
    /// For a Fragment header this skips the reserved octet, which is not kept.
    pub data: &'a [u8],
}

impl<'a> Repr<'a> {
    /// Parse an extension header of the given kind from the front of a buffer.
    ///
    /// The buffer may contain further data after the header, the consumed length is available as
    /// [`buffer_len`].
    ///
    /// [`buffer_len`]: #method.buffer_len
    pub fn parse(kind: Protocol, buffer: &'a [u8]) -> Result<Self> {
        if !kind.is_extension_header() {
            return Err(Error::Unrecognized);
        }
        if buffer.len() < field::DATA.start {
            return Err(Error::Truncated);
        }

        let len = match kind {
            Protocol::Ipv6Frag => field::FRAGMENT.end,
            _ => (usize::from(buffer[field::LENGTH]) + 1) * 8,
        };

        if buffer.len() < len {
            return Err(Error::Truncated);
        }

        Ok(Repr {
            kind,
            next_header: Protocol::from(buffer[field::NXT_HDR]),
            data: &buffer[field::DATA.start..len],
        })
    }

    /// Rebuild a header from its data octets.
    ///
    /// Fails if the data does not make up a whole number of eight octet units.
    pub fn new(kind: Protocol, next_header: Protocol, data: &'a [u8]) -> Result<Self> {
        let repr = Repr { kind, next_header, data };
        let len = repr.buffer_len();
        match kind {
            Protocol::Ipv6Frag if len != field::FRAGMENT.end => Err(Error::Malformed),
            _ if len % 8 != 0 || len > 256 * 8 => Err(Error::Malformed),
            _ if !kind.is_extension_header() => Err(Error::Unrecognized),
            _ => Ok(repr),
        }
    }

    /// Return the length of the header.
    pub fn buffer_len(&self) -> usize {
        field::DATA.start + self.data.len()
    }

    /// Emit the header into the first `buffer_len` octets of a buffer.
    ///
    /// The reserved octet of a Fragment header is always emitted as zero. Receivers must ignore
    /// it and the compressed form has no room for it.
    ///
    /// # Panics
    /// This panics if the buffer is shorter than `buffer_len`.
    pub fn emit(&self, buffer: &mut [u8]) {
        let len = self.buffer_len();
        buffer[field::NXT_HDR] = self.next_header.into();
        buffer[field::LENGTH] = match self.kind {
            Protocol::Ipv6Frag => 0,
            _ => (len / 8 - 1) as u8,
        };
        buffer[field::DATA.start..len].copy_from_slice(self.data);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    static HOP_BY_HOP: [u8; 8] = [0x11, 0x00, 0x01, 0x04, 0x00, 0x00, 0x00, 0x00];

    static FRAGMENT: [u8; 8] = [0x11, 0x00, 0x00, 0x01, 0xde, 0xad, 0xbe, 0xef];

    #[test]
    fn parse_hop_by_hop() {
        let mut bytes = HOP_BY_HOP.to_vec();
        bytes.extend_from_slice(&[0xaa; 4]);
        let repr = Repr::parse(Protocol::HopByHop, &bytes).unwrap();
        assert_eq!(repr.next_header, Protocol::Udp);
        assert_eq!(repr.data, &HOP_BY_HOP[2..]);
        assert_eq!(repr.buffer_len(), 8);
    }

    #[test]
    fn parse_truncated() {
        let mut bytes = HOP_BY_HOP;
        bytes[1] = 1;
        assert_eq!(Repr::parse(Protocol::HopByHop, &bytes), Err(Error::Truncated));
        assert_eq!(Repr::parse(Protocol::HopByHop, &bytes[..1]), Err(Error::Truncated));
        assert_eq!(Repr::parse(Protocol::Udp, &bytes), Err(Error::Unrecognized));
    }

    #[test]
    fn fragment_fixed_length() {
        let repr = Repr::parse(Protocol::Ipv6Frag, &FRAGMENT).unwrap();
        assert_eq!(repr.data.len(), 6);
        let mut bytes = [0xff; 8];
        repr.emit(&mut bytes);
        assert_eq!(bytes, FRAGMENT);
    }

    #[test]
    fn fragment_reserved_cleared() {
        let mut bytes = FRAGMENT;
        bytes[1] = 0x5a;
        let repr = Repr::parse(Protocol::Ipv6Frag, &bytes).unwrap();
        assert_eq!(repr.data, &FRAGMENT[2..]);
        let mut emitted = [0xff; 8];
        repr.emit(&mut emitted);
        assert_eq!(emitted, FRAGMENT);
    }

    #[test]
    fn rebuild() {
        let repr = Repr::new(Protocol::Ipv6Opts, Protocol::Udp, &HOP_BY_HOP[2..]).unwrap();
        let mut bytes = [0; 8];
        repr.emit(&mut bytes);
        assert_eq!(bytes, HOP_BY_HOP);

        assert_eq!(Repr::new(Protocol::Ipv6Opts, Protocol::Udp, &[0; 5]), Err(Error::Malformed));
        assert_eq!(Repr::new(Protocol::Ipv6Frag, Protocol::Udp, &[0; 14]), Err(Error::Malformed));
    }
}

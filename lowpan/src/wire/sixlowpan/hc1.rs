//! The legacy `LOWPAN_HC1` header compression, [RFC 4944 § 10.1].
//!
//! ```text
//!  0                   1                   2
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |  HC1 dispatch |SA |DA |C|NH |0|   Hop Limit   | ...
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! The hop limit is always carried. Then follow, as required by the encoding: source prefix and
//! interface id, destination prefix and interface id, traffic class and flow label, next header.
//! A prefix is only ever compressed when it is the link-local prefix, an interface id only when
//! it is derived from the link layer address.
//!
//! [RFC 4944 § 10.1]: https://tools.ietf.org/html/rfc4944#section-10.1
use byteorder::{ByteOrder, NetworkEndian};

use super::DISPATCH_HC1;
use crate::wire::{Error, IpProtocol as Protocol, Result};

mod field {
    pub(crate) const DISPATCH: usize = 0;
    pub(crate) const ENCODING: usize = 1;
    pub(crate) const HOP_LIMIT: usize = 2;
    pub(crate) const VARIABLE: usize = 3;
}

const TCFL_COMPRESSED: u8 = 0x08;
const HC2_PRESENT: u8 = 0x01;

enum_with_unknown! {
    /// How the next header field is encoded.
    pub enum NextHeader(u8) {
        Inline = 0,
        Udp = 1,
        Icmp = 2,
        Tcp = 3,
    }
}

/// How one of the addresses is encoded.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum AddressMode {
    /// Prefix and interface id are carried inline.
    PrefixInlineIdInline = 0,
    /// The prefix is carried inline, the interface id is derived from the link address.
    PrefixInlineIdElided = 1,
    /// The prefix is link-local, the interface id is carried inline.
    PrefixElidedIdInline = 2,
    /// The prefix is link-local and the interface id is derived from the link address.
    PrefixElidedIdElided = 3,
}

impl AddressMode {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x3 {
            0 => AddressMode::PrefixInlineIdInline,
            1 => AddressMode::PrefixInlineIdElided,
            2 => AddressMode::PrefixElidedIdInline,
            _ => AddressMode::PrefixElidedIdElided,
        }
    }

    /// If the prefix octets are carried.
    pub fn prefix_inline(self) -> bool {
        match self {
            AddressMode::PrefixInlineIdInline | AddressMode::PrefixInlineIdElided => true,
            _ => false,
        }
    }

    /// If the interface id octets are carried.
    pub fn id_inline(self) -> bool {
        match self {
            AddressMode::PrefixInlineIdInline | AddressMode::PrefixElidedIdInline => true,
            _ => false,
        }
    }

    fn inline_len(self) -> usize {
        let prefix = if self.prefix_inline() { 8 } else { 0 };
        let id = if self.id_inline() { 8 } else { 0 };
        prefix + id
    }
}

/// One address of the compressed header.
///
/// Elided parts are zero after parsing.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Address {
    /// The encoding.
    pub mode: AddressMode,
    /// The upper 64 bits, if carried inline.
    pub prefix: [u8; 8],
    /// The lower 64 bits, if carried inline.
    pub id: [u8; 8],
}

/// A high-level representation of an HC1 header, including its dispatch octet.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Repr {
    /// The source address.
    pub src: Address,
    /// The destination address.
    pub dst: Address,
    /// The IPv6 traffic class.
    pub traffic_class: u8,
    /// The IPv6 flow label.
    pub flow_label: u32,
    /// The IPv6 next header.
    pub next_header: Protocol,
    /// The IPv6 hop limit.
    pub hop_limit: u8,
}

impl Repr {
    fn next_header_encoding(&self) -> NextHeader {
        match self.next_header {
            Protocol::Udp => NextHeader::Udp,
            Protocol::Icmpv6 => NextHeader::Icmp,
            Protocol::Tcp => NextHeader::Tcp,
            _ => NextHeader::Inline,
        }
    }

    fn tcfl_compressed(&self) -> bool {
        self.traffic_class == 0 && self.flow_label == 0
    }

    /// Parse the header from the front of a buffer.
    pub fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < field::VARIABLE {
            return Err(Error::Truncated);
        }
        if buffer[field::DISPATCH] != DISPATCH_HC1 {
            return Err(Error::Unrecognized);
        }

        let encoding = buffer[field::ENCODING];
        if encoding & HC2_PRESENT != 0 {
            return Err(Error::Unsupported);
        }

        let hop_limit = buffer[field::HOP_LIMIT];
        let mut rest = &buffer[field::VARIABLE..];

        let src = read_address(&mut rest, AddressMode::from_bits(encoding >> 6))?;
        let dst = read_address(&mut rest, AddressMode::from_bits(encoding >> 4))?;

        let (traffic_class, flow_label) = if encoding & TCFL_COMPRESSED != 0 {
            (0, 0)
        } else {
            let tcfl = take(&mut rest, 4)?;
            (tcfl[0], NetworkEndian::read_u24(&tcfl[1..]) & 0x000f_ffff)
        };

        let next_header = match NextHeader::from((encoding >> 1) & 0x3) {
            NextHeader::Udp => Protocol::Udp,
            NextHeader::Icmp => Protocol::Icmpv6,
            NextHeader::Tcp => Protocol::Tcp,
            _ => Protocol::from(take(&mut rest, 1)?[0]),
        };

        Ok(Repr {
            src,
            dst,
            traffic_class,
            flow_label,
            next_header,
            hop_limit,
        })
    }

    /// Return the length of the header that will be emitted.
    pub fn buffer_len(&self) -> usize {
        let tcfl = if self.tcfl_compressed() { 0 } else { 4 };
        let next_header = match self.next_header_encoding() {
            NextHeader::Inline => 1,
            _ => 0,
        };
        field::VARIABLE + self.src.mode.inline_len() + self.dst.mode.inline_len() + tcfl + next_header
    }

    /// Emit the header into the first `buffer_len` octets of a buffer.
    pub fn emit(&self, buffer: &mut [u8]) {
        let next_header = self.next_header_encoding();
        let mut encoding = (self.src.mode as u8) << 6 | (self.dst.mode as u8) << 4;
        if self.tcfl_compressed() {
            encoding |= TCFL_COMPRESSED;
        }
        encoding |= u8::from(next_header) << 1;

        buffer[field::DISPATCH] = DISPATCH_HC1;
        buffer[field::ENCODING] = encoding;
        buffer[field::HOP_LIMIT] = self.hop_limit;

        let mut offset = field::VARIABLE;
        let mut put = |bytes: &[u8]| {
            buffer[offset..offset + bytes.len()].copy_from_slice(bytes);
            offset += bytes.len();
        };

        for addr in [&self.src, &self.dst] {
            if addr.mode.prefix_inline() {
                put(&addr.prefix);
            }
            if addr.mode.id_inline() {
                put(&addr.id);
            }
        }

        if !self.tcfl_compressed() {
            let mut tcfl = [self.traffic_class, 0, 0, 0];
            NetworkEndian::write_u24(&mut tcfl[1..], self.flow_label & 0x000f_ffff);
            put(&tcfl);
        }

        if let NextHeader::Inline = next_header {
            put(&[self.next_header.into()]);
        }
    }
}

fn take<'a>(rest: &mut &'a [u8], len: usize) -> Result<&'a [u8]> {
    if rest.len() < len {
        return Err(Error::Truncated);
    }
    let (head, tail) = rest.split_at(len);
    *rest = tail;
    Ok(head)
}

fn read_address(rest: &mut &[u8], mode: AddressMode) -> Result<Address> {
    let mut addr = Address { mode, prefix: [0; 8], id: [0; 8] };
    if mode.prefix_inline() {
        addr.prefix.copy_from_slice(take(rest, 8)?);
    }
    if mode.id_inline() {
        addr.id.copy_from_slice(take(rest, 8)?);
    }
    Ok(addr)
}

#[cfg(test)]
mod test {
    use super::*;

    fn elided() -> Address {
        Address { mode: AddressMode::PrefixElidedIdElided, prefix: [0; 8], id: [0; 8] }
    }

    #[test]
    fn fully_compressed() {
        let repr = Repr {
            src: elided(),
            dst: elided(),
            traffic_class: 0,
            flow_label: 0,
            next_header: Protocol::Udp,
            hop_limit: 64,
        };
        assert_eq!(repr.buffer_len(), 3);
        let mut bytes = [0; 3];
        repr.emit(&mut bytes);
        assert_eq!(bytes, [0x42, 0xfa, 64]);
        assert_eq!(Repr::parse(&bytes), Ok(repr));
    }

    #[test]
    fn inline_fields() {
        let repr = Repr {
            src: Address {
                mode: AddressMode::PrefixInlineIdInline,
                prefix: [0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0],
                id: [0, 0, 0, 0, 0, 0, 0, 1],
            },
            dst: Address {
                mode: AddressMode::PrefixElidedIdInline,
                prefix: [0; 8],
                id: [0, 0, 0, 0, 0, 0, 0, 2],
            },
            traffic_class: 0x12,
            flow_label: 0x34567,
            next_header: Protocol::Ipv6NoNxt,
            hop_limit: 3,
        };
        assert_eq!(repr.buffer_len(), 3 + 16 + 8 + 4 + 1);
        let mut bytes = vec![0; repr.buffer_len()];
        repr.emit(&mut bytes);
        assert_eq!(&bytes[..3], &[0x42, 0x20, 3]);
        assert_eq!(&bytes[27..], &[0x12, 0x03, 0x45, 0x67, 0x3b]);
        assert_eq!(Repr::parse(&bytes), Ok(repr));
    }

    #[test]
    fn rejects_hc2() {
        assert_eq!(Repr::parse(&[0x42, 0xfb, 64]), Err(Error::Unsupported));
        assert_eq!(Repr::parse(&[0x42, 0xf8]), Err(Error::Truncated));
        assert_eq!(Repr::parse(&[0x42, 0xf8, 64]), Err(Error::Truncated));
        assert_eq!(Repr::parse(&[0x41, 0xfa, 64]), Err(Error::Unrecognized));
    }
}

//! `LOWPAN_NHC` next header compression, [RFC 6282 § 4].
//!
//! Two encodings are understood. Extension headers:
//!
//! ```text
//!   0   1   2   3   4   5   6   7
//! +---+---+---+---+---+---+---+---+
//! | 1 | 1 | 1 | 0 |    EID    |NH |  [next header] [length] [data]
//! +---+---+---+---+---+---+---+---+
//! ```
//!
//! and UDP:
//!
//! ```text
//!   0   1   2   3   4   5   6   7
//! +---+---+---+---+---+---+---+---+
//! | 1 | 1 | 1 | 1 | 0 | C |   P   |  [ports] [checksum]
//! +---+---+---+---+---+---+---+---+
//! ```
//!
//! An extension header with `EID = 7` stands for an encapsulated IPv6 header. It carries neither
//! next header nor length, an IPHC header follows directly.
//!
//! [RFC 6282 § 4]: https://tools.ietf.org/html/rfc6282#section-4
use byteorder::{ByteOrder, NetworkEndian};

use super::iphc::NextHeader;
use crate::wire::{Error, IpProtocol as Protocol, Result};

const EXT_MASK: u8 = 0xf0;
const EXT_VALUE: u8 = 0xe0;
const EXT_NH_BIT: u8 = 0x01;
const EID_SHIFT: u8 = 1;

const UDP_MASK: u8 = 0xf8;
const UDP_VALUE: u8 = 0xf0;
const UDP_CHECKSUM_ELIDED: u8 = 0x04;
const UDP_PORTS_MASK: u8 = 0x03;

/// The largest extension header data that the length octet can describe.
pub const MAX_EXTENSION_DATA: usize = 0xff;

enum_with_unknown! {
    /// Identifier of the header an extension `LOWPAN_NHC` octet encodes.
    pub enum ExtHeaderId(u8) {
        HopByHop = 0,
        Routing = 1,
        Fragment = 2,
        DestinationOptions = 3,
        Mobility = 4,
        Ipv6 = 7,
    }
}

impl ExtHeaderId {
    /// The IPv6 next header value of this header.
    pub fn protocol(self) -> Protocol {
        match self {
            ExtHeaderId::HopByHop => Protocol::HopByHop,
            ExtHeaderId::Routing => Protocol::Ipv6Route,
            ExtHeaderId::Fragment => Protocol::Ipv6Frag,
            ExtHeaderId::DestinationOptions => Protocol::Ipv6Opts,
            ExtHeaderId::Mobility => Protocol::Mobility,
            ExtHeaderId::Ipv6 => Protocol::Ipv6,
            ExtHeaderId::Unknown(_) => Protocol::Unknown(0xff),
        }
    }

    /// The identifier for an IPv6 next header value, if there is one.
    pub fn from_protocol(protocol: Protocol) -> Option<Self> {
        Some(match protocol {
            Protocol::HopByHop => ExtHeaderId::HopByHop,
            Protocol::Ipv6Route => ExtHeaderId::Routing,
            Protocol::Ipv6Frag => ExtHeaderId::Fragment,
            Protocol::Ipv6Opts => ExtHeaderId::DestinationOptions,
            Protocol::Mobility => ExtHeaderId::Mobility,
            Protocol::Ipv6 => ExtHeaderId::Ipv6,
            _ => return None,
        })
    }
}

/// The kind of a `LOWPAN_NHC` octet.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Dispatch {
    /// An IPv6 extension header, or an encapsulated IPv6 header.
    Extension,
    /// A UDP header.
    Udp,
}

impl Dispatch {
    /// Determine the kind of the compressed header at the front of a buffer.
    pub fn peek(buffer: &[u8]) -> Result<Self> {
        let byte = *buffer.first().ok_or(Error::Truncated)?;
        if byte & EXT_MASK == EXT_VALUE {
            Ok(Dispatch::Extension)
        } else if byte & UDP_MASK == UDP_VALUE {
            Ok(Dispatch::Udp)
        } else {
            Err(Error::Unrecognized)
        }
    }
}

/// A compressed extension header.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ExtensionRepr<'a> {
    /// Which header this is.
    pub id: ExtHeaderId,
    /// The header following this one.
    ///
    /// Always `Compressed` for an encapsulated IPv6 header.
    pub next_header: NextHeader,
    /// The octets of the uncompressed header after its next header and length octets.
    ///
    /// Empty for an encapsulated IPv6 header.
    pub data: &'a [u8],
}

impl<'a> ExtensionRepr<'a> {
    /// The marker for an encapsulated IPv6 header.
    pub const IPV6: ExtensionRepr<'static> = ExtensionRepr {
        id: ExtHeaderId::Ipv6,
        next_header: NextHeader::Compressed,
        data: &[],
    };

    /// Parse the header from the front of a buffer.
    ///
    /// Returns the header and the number of octets it occupied.
    pub fn parse(buffer: &'a [u8]) -> Result<(Self, usize)> {
        let byte = *buffer.first().ok_or(Error::Truncated)?;
        if byte & EXT_MASK != EXT_VALUE {
            return Err(Error::Unrecognized);
        }

        let id = ExtHeaderId::from((byte >> EID_SHIFT) & 0x7);
        if let ExtHeaderId::Ipv6 = id {
            return Ok((ExtensionRepr::IPV6, 1));
        }
        if let ExtHeaderId::Unknown(_) = id {
            return Err(Error::Unrecognized);
        }

        let mut offset = 1;
        let next_header = if byte & EXT_NH_BIT != 0 {
            NextHeader::Compressed
        } else {
            let value = *buffer.get(offset).ok_or(Error::Truncated)?;
            offset += 1;
            NextHeader::Uncompressed(Protocol::from(value))
        };

        let len = usize::from(*buffer.get(offset).ok_or(Error::Truncated)?);
        offset += 1;
        let data = buffer.get(offset..offset + len).ok_or(Error::Truncated)?;

        Ok((ExtensionRepr { id, next_header, data }, offset + len))
    }

    /// Return the length of the header that will be emitted.
    pub fn buffer_len(&self) -> usize {
        if let ExtHeaderId::Ipv6 = self.id {
            return 1;
        }
        let nh = match self.next_header {
            NextHeader::Compressed => 0,
            NextHeader::Uncompressed(_) => 1,
        };
        1 + nh + 1 + self.data.len()
    }

    /// Emit the header into the first `buffer_len` octets of a buffer.
    ///
    /// # Panics
    /// This function panics if the data is longer than [`MAX_EXTENSION_DATA`].
    ///
    /// [`MAX_EXTENSION_DATA`]: constant.MAX_EXTENSION_DATA.html
    pub fn emit(&self, buffer: &mut [u8]) {
        let mut byte = EXT_VALUE | (u8::from(self.id) & 0x7) << EID_SHIFT;
        if let ExtHeaderId::Ipv6 = self.id {
            buffer[0] = byte;
            return;
        }

        assert!(self.data.len() <= MAX_EXTENSION_DATA);
        let mut offset = 1;
        match self.next_header {
            NextHeader::Compressed => byte |= EXT_NH_BIT,
            NextHeader::Uncompressed(protocol) => {
                buffer[offset] = protocol.into();
                offset += 1;
            },
        }
        buffer[0] = byte;
        buffer[offset] = self.data.len() as u8;
        offset += 1;
        buffer[offset..offset + self.data.len()].copy_from_slice(self.data);
    }
}

/// How the UDP ports are compressed.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Ports {
    /// Both ports are carried in full.
    Inline = 0,
    /// The destination port is `0xf0xx`, its low octet is carried.
    DstCompressed = 1,
    /// The source port is `0xf0xx`, its low octet is carried.
    SrcCompressed = 2,
    /// Both ports are `0xf0bx`, their low nibbles are carried in one octet.
    BothCompressed = 3,
}

/// A compressed UDP header.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct UdpRepr {
    /// The source port.
    pub src_port: u16,
    /// The destination port.
    pub dst_port: u16,
    /// The checksum, `None` if it is elided and must be recomputed by the receiver.
    pub checksum: Option<u16>,
}

impl UdpRepr {
    /// The port compression that applies to the ports.
    pub fn ports(&self) -> Ports {
        if self.src_port & 0xfff0 == 0xf0b0 && self.dst_port & 0xfff0 == 0xf0b0 {
            Ports::BothCompressed
        } else if self.src_port & 0xff00 == 0xf000 {
            Ports::SrcCompressed
        } else if self.dst_port & 0xff00 == 0xf000 {
            Ports::DstCompressed
        } else {
            Ports::Inline
        }
    }

    /// Parse the header from the front of a buffer.
    ///
    /// Returns the header and the number of octets it occupied.
    pub fn parse(buffer: &[u8]) -> Result<(Self, usize)> {
        let byte = *buffer.first().ok_or(Error::Truncated)?;
        if byte & UDP_MASK != UDP_VALUE {
            return Err(Error::Unrecognized);
        }

        let (src_port, dst_port, mut offset) = match byte & UDP_PORTS_MASK {
            0 => {
                let ports = buffer.get(1..5).ok_or(Error::Truncated)?;
                (NetworkEndian::read_u16(&ports[..2]), NetworkEndian::read_u16(&ports[2..]), 5)
            },
            1 => {
                let ports = buffer.get(1..4).ok_or(Error::Truncated)?;
                (NetworkEndian::read_u16(&ports[..2]), 0xf000 | u16::from(ports[2]), 4)
            },
            2 => {
                let ports = buffer.get(1..4).ok_or(Error::Truncated)?;
                (0xf000 | u16::from(ports[0]), NetworkEndian::read_u16(&ports[1..]), 4)
            },
            _ => {
                let ports = *buffer.get(1).ok_or(Error::Truncated)?;
                (0xf0b0 | u16::from(ports >> 4), 0xf0b0 | u16::from(ports & 0x0f), 2)
            },
        };

        let checksum = if byte & UDP_CHECKSUM_ELIDED != 0 {
            None
        } else {
            let bytes = buffer.get(offset..offset + 2).ok_or(Error::Truncated)?;
            offset += 2;
            Some(NetworkEndian::read_u16(bytes))
        };

        Ok((UdpRepr { src_port, dst_port, checksum }, offset))
    }

    /// Return the length of the header that will be emitted.
    pub fn buffer_len(&self) -> usize {
        let ports = match self.ports() {
            Ports::Inline => 4,
            Ports::DstCompressed | Ports::SrcCompressed => 3,
            Ports::BothCompressed => 1,
        };
        let checksum = if self.checksum.is_some() { 2 } else { 0 };
        1 + ports + checksum
    }

    /// Emit the header into the first `buffer_len` octets of a buffer.
    pub fn emit(&self, buffer: &mut [u8]) {
        let ports = self.ports();
        let mut byte = UDP_VALUE | ports as u8;
        if self.checksum.is_none() {
            byte |= UDP_CHECKSUM_ELIDED;
        }
        buffer[0] = byte;

        let mut offset = 1;
        match ports {
            Ports::Inline => {
                NetworkEndian::write_u16(&mut buffer[1..3], self.src_port);
                NetworkEndian::write_u16(&mut buffer[3..5], self.dst_port);
                offset += 4;
            },
            Ports::DstCompressed => {
                NetworkEndian::write_u16(&mut buffer[1..3], self.src_port);
                buffer[3] = self.dst_port as u8;
                offset += 3;
            },
            Ports::SrcCompressed => {
                buffer[1] = self.src_port as u8;
                NetworkEndian::write_u16(&mut buffer[2..4], self.dst_port);
                offset += 3;
            },
            Ports::BothCompressed => {
                buffer[1] = ((self.src_port & 0xf) as u8) << 4 | (self.dst_port & 0xf) as u8;
                offset += 1;
            },
        }

        if let Some(checksum) = self.checksum {
            NetworkEndian::write_u16(&mut buffer[offset..offset + 2], checksum);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dispatch() {
        assert_eq!(Dispatch::peek(&[0xe2]), Ok(Dispatch::Extension));
        assert_eq!(Dispatch::peek(&[0xf7]), Ok(Dispatch::Udp));
        assert_eq!(Dispatch::peek(&[0xf8]), Err(Error::Unrecognized));
        assert_eq!(Dispatch::peek(&[]), Err(Error::Truncated));
    }

    #[test]
    fn udp_both_ports_compressed() {
        let repr = UdpRepr { src_port: 61617, dst_port: 61616, checksum: None };
        assert_eq!(repr.ports(), Ports::BothCompressed);
        assert_eq!(repr.buffer_len(), 2);
        let mut bytes = [0; 2];
        repr.emit(&mut bytes);
        assert_eq!(bytes, [0xf7, 0x10]);
        assert_eq!(UdpRepr::parse(&bytes), Ok((repr, 2)));
    }

    #[test]
    fn udp_port_modes() {
        let src = UdpRepr { src_port: 0xf012, dst_port: 5683, checksum: Some(0xbeef) };
        assert_eq!(src.ports(), Ports::SrcCompressed);
        let mut bytes = vec![0; src.buffer_len()];
        src.emit(&mut bytes);
        assert_eq!(bytes, [0xf2, 0x12, 0x16, 0x33, 0xbe, 0xef]);
        assert_eq!(UdpRepr::parse(&bytes), Ok((src, 6)));

        let dst = UdpRepr { src_port: 5683, dst_port: 0xf0ab, checksum: None };
        assert_eq!(dst.ports(), Ports::DstCompressed);
        let mut bytes = vec![0; dst.buffer_len()];
        dst.emit(&mut bytes);
        assert_eq!(bytes, [0xf5, 0x16, 0x33, 0xab]);
        assert_eq!(UdpRepr::parse(&bytes), Ok((dst, 4)));

        let inline = UdpRepr { src_port: 1, dst_port: 2, checksum: Some(0x024e) };
        assert_eq!(inline.ports(), Ports::Inline);
        let mut bytes = vec![0; inline.buffer_len()];
        inline.emit(&mut bytes);
        assert_eq!(bytes, [0xf0, 0x00, 0x01, 0x00, 0x02, 0x02, 0x4e]);
        assert_eq!(UdpRepr::parse(&bytes), Ok((inline, 7)));
    }

    #[test]
    fn udp_truncated() {
        assert_eq!(UdpRepr::parse(&[0xf0, 0x00, 0x01]), Err(Error::Truncated));
        assert_eq!(UdpRepr::parse(&[0xf3, 0x10]), Err(Error::Truncated));
    }

    #[test]
    fn extension_header() {
        let data = [0x01, 0x04, 0, 0, 0, 0];
        let repr = ExtensionRepr {
            id: ExtHeaderId::HopByHop,
            next_header: NextHeader::Compressed,
            data: &data,
        };
        assert_eq!(repr.buffer_len(), 8);
        let mut bytes = [0; 8];
        repr.emit(&mut bytes);
        assert_eq!(bytes, [0xe1, 0x06, 0x01, 0x04, 0, 0, 0, 0]);
        assert_eq!(ExtensionRepr::parse(&bytes), Ok((repr, 8)));
    }

    #[test]
    fn extension_header_inline_next() {
        let data = [0xaa; 6];
        let repr = ExtensionRepr {
            id: ExtHeaderId::DestinationOptions,
            next_header: NextHeader::Uncompressed(Protocol::Tcp),
            data: &data,
        };
        let mut bytes = vec![0; repr.buffer_len()];
        repr.emit(&mut bytes);
        assert_eq!(&bytes[..3], &[0xe6, 0x06, 0x06]);
        assert_eq!(ExtensionRepr::parse(&bytes), Ok((repr, 9)));
    }

    #[test]
    fn encapsulated_ipv6() {
        let mut bytes = [0; 1];
        ExtensionRepr::IPV6.emit(&mut bytes);
        assert_eq!(bytes, [0xee]);
        assert_eq!(ExtensionRepr::parse(&[0xee, 0x7e]), Ok((ExtensionRepr::IPV6, 1)));
    }

    #[test]
    fn unknown_extension() {
        assert_eq!(ExtensionRepr::parse(&[0xea, 0, 0]), Err(Error::Unrecognized));
        assert_eq!(ExtHeaderId::from_protocol(Protocol::Udp), None);
        assert_eq!(ExtHeaderId::from_protocol(Protocol::Ipv6Frag), Some(ExtHeaderId::Fragment));
        assert_eq!(ExtHeaderId::Mobility.protocol(), Protocol::Mobility);
    }
}

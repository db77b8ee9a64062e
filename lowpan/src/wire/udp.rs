use core::fmt;
use byteorder::{ByteOrder, NetworkEndian};

use super::{Checksum, Error, IpProtocol, Ipv6Address, Result};
use super::ip::checksum;

byte_wrapper! {
    /// A byte sequence representing a UDP datagram.
    pub struct udp([u8]);
}

mod field {
    #![allow(non_snake_case)]
    use crate::wire::field::Field;

    pub(crate) const SRC_PORT: Field = 0..2;
    pub(crate) const DST_PORT: Field = 2..4;
    pub(crate) const LENGTH:   Field = 4..6;
    pub(crate) const CHECKSUM: Field = 6..8;

    pub(crate) fn PAYLOAD(length: u16) -> Field {
        CHECKSUM.end..(length as usize)
    }
}

/// The length of the UDP header.
pub const HEADER_LEN: usize = field::CHECKSUM.end;

impl udp {
    /// Imbue a raw octet buffer with UDP structure.
    pub fn new_unchecked(data: &[u8]) -> &Self {
        Self::__from_macro_new_unchecked(data)
    }

    /// Imbue a mutable raw octet buffer with UDP structure.
    pub fn new_unchecked_mut(data: &mut [u8]) -> &mut Self {
        Self::__from_macro_new_unchecked_mut(data)
    }

    /// Shorthand for a combination of [new_unchecked] and [check_len].
    ///
    /// [new_unchecked]: #method.new_unchecked
    /// [check_len]: #method.check_len
    pub fn new_checked(data: &[u8]) -> Result<&Self> {
        Self::new_unchecked(data).check_len()?;
        Ok(Self::new_unchecked(data))
    }

    /// Get the underlying bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Get the underlying bytes mutably.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }

    /// Ensure that no accessor method will panic if called.
    /// Returns `Err(Error::Truncated)` if the buffer is too short.
    /// Returns `Err(Error::Malformed)` if the length field has a value smaller
    /// than the header length.
    ///
    /// The result of this check is invalidated by calling [set_len].
    ///
    /// [set_len]: #method.set_len
    pub fn check_len(&self) -> Result<()> {
        let buffer_len = self.0.len();
        if buffer_len < field::CHECKSUM.end {
            Err(Error::Truncated)
        } else {
            let field_len = self.len() as usize;
            if buffer_len < field_len {
                Err(Error::Truncated)
            } else if field_len < field::CHECKSUM.end {
                Err(Error::Malformed)
            } else {
                Ok(())
            }
        }
    }

    /// Return the source port field.
    #[inline]
    pub fn src_port(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::SRC_PORT])
    }

    /// Return the destination port field.
    #[inline]
    pub fn dst_port(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::DST_PORT])
    }

    /// Return the length field.
    #[inline]
    pub fn len(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::LENGTH])
    }

    /// Return the checksum field.
    #[inline]
    pub fn checksum(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::CHECKSUM])
    }

    /// Set the source port field.
    #[inline]
    pub fn set_src_port(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::SRC_PORT], value)
    }

    /// Set the destination port field.
    #[inline]
    pub fn set_dst_port(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::DST_PORT], value)
    }

    /// Set the length field.
    #[inline]
    pub fn set_len(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::LENGTH], value)
    }

    /// Set the checksum field.
    #[inline]
    pub fn set_checksum(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::CHECKSUM], value)
    }

    /// Compute and fill in the header checksum.
    pub fn fill_checksum(&mut self, src_addr: Ipv6Address, dst_addr: Ipv6Address) {
        self.set_checksum(0);
        let checksum = {
            !checksum::combine(&[
                checksum::pseudo_header(&src_addr, &dst_addr, IpProtocol::Udp,
                                        self.len() as u32),
                checksum::data(&self.0[..self.len() as usize])
            ])
        };
        // UDP checksum value of 0 means no checksum; if the checksum really is zero,
        // use all-ones, which indicates that the remote end must verify the checksum.
        // Arithmetically, RFC 1071 checksums of all-zeroes and all-ones behave identically,
        // so no action is necessary on the remote end.
        self.set_checksum(if checksum == 0 { 0xffff } else { checksum })
    }

    /// Validate the packet checksum.
    ///
    /// # Fuzzing
    /// This function always returns `true` when fuzzing.
    pub fn verify_checksum(&self, src_addr: Ipv6Address, dst_addr: Ipv6Address) -> bool {
        if cfg!(fuzzing) { return true }

        checksum::combine(&[
            checksum::pseudo_header(&src_addr, &dst_addr, IpProtocol::Udp,
                                    self.len() as u32),
            checksum::data(&self.0[..self.len() as usize])
        ]) == !0
    }

    /// Return a pointer to the payload.
    pub fn payload_slice(&self) -> &[u8] {
        let len = self.len();
        &self.0[field::PAYLOAD(len)]
    }

    /// Return a mutable pointer to the payload.
    pub fn payload_mut_slice(&mut self) -> &mut [u8] {
        let len = self.len();
        &mut self.0[field::PAYLOAD(len)]
    }
}

/// A high-level representation of an User Datagram Protocol header.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Repr {
    /// The source port.
    pub src_port: u16,
    /// The destination port.
    pub dst_port: u16,
    /// Length of header and payload.
    pub length: u16,
}

impl Repr {
    /// Parse an User Datagram Protocol packet and return a high-level representation.
    ///
    /// The checksum is verified against the pseudo header of the enclosing IPv6 header unless
    /// checks are disabled by `checksum`.
    pub fn parse(packet: &udp, addresses: (Ipv6Address, Ipv6Address), checksum: Checksum) -> Result<Repr> {
        packet.check_len()?;

        if checksum.manual() && !packet.verify_checksum(addresses.0, addresses.1) {
            return Err(Error::WrongChecksum);
        }

        Ok(Repr {
            src_port: packet.src_port(),
            dst_port: packet.dst_port(),
            length: packet.len(),
        })
    }

    /// Return the length of a packet that will be emitted from this high-level representation.
    pub fn buffer_len(&self) -> usize {
        self.length.into()
    }

    /// Emit a high-level representation into an User Datagram Protocol packet.
    ///
    /// The payload must already be in place when the checksum is computed.
    pub fn emit(&self, packet: &mut udp, addresses: (Ipv6Address, Ipv6Address), checksum: Checksum) {
        packet.set_src_port(self.src_port);
        packet.set_dst_port(self.dst_port);
        packet.set_len(self.length);

        if checksum.manual() {
            packet.fill_checksum(addresses.0, addresses.1)
        } else {
            // make sure we get a consistently zeroed checksum,
            // since implementations might rely on it
            packet.set_checksum(0);
        }
    }
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let payload_len = usize::from(self.length)
            .checked_sub(field::CHECKSUM.end);
        if let Some(payload_len) = payload_len {
            write!(f, "UDP src={} dst={} len={}",
                self.src_port, self.dst_port, payload_len)
        } else {
            write!(f, "UDP src={} dst={} len=??",
                self.src_port, self.dst_port)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SRC_ADDR: Ipv6Address = Ipv6Address([0xfe, 0x80, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
    const DST_ADDR: Ipv6Address = Ipv6Address::LINK_LOCAL_ALL_NODES;

    static PACKET_BYTES: [u8; 12] =
        [0x00, 0x01, 0x00, 0x02,
         0x00, 0x0c, 0x02, 0x4e,
         0xff, 0xff, 0xff, 0xff];

    static PAYLOAD_BYTES: [u8; 4] =
        [0xff, 0xff, 0xff, 0xff];

    #[test]
    fn test_deconstruct() {
        let packet = udp::new_unchecked(&PACKET_BYTES[..]);
        assert_eq!(packet.src_port(), 1);
        assert_eq!(packet.dst_port(), 2);
        assert_eq!(packet.len(), 12);
        assert_eq!(packet.checksum(), 0x024e);
        assert_eq!(packet.payload_slice(), &PAYLOAD_BYTES[..]);
        assert!(packet.verify_checksum(SRC_ADDR, DST_ADDR));
        assert!(!packet.verify_checksum(DST_ADDR, DST_ADDR));
    }

    #[test]
    fn test_construct() {
        let mut bytes = vec![0xa5; 12];
        let packet = udp::new_unchecked_mut(&mut bytes);
        packet.set_src_port(1);
        packet.set_dst_port(2);
        packet.set_len(12);
        packet.set_checksum(0xffff);
        packet.payload_mut_slice().copy_from_slice(&PAYLOAD_BYTES[..]);
        packet.fill_checksum(SRC_ADDR, DST_ADDR);
        assert_eq!(packet.as_bytes(), &PACKET_BYTES[..]);
    }

    #[test]
    fn test_impossible_len() {
        let mut bytes = vec![0; 12];
        let packet = udp::new_unchecked_mut(&mut bytes);
        packet.set_len(4);
        assert_eq!(packet.check_len(), Err(Error::Malformed));
    }

    fn packet_repr() -> Repr {
        Repr {
            src_port: 1,
            dst_port: 2,
            length: PACKET_BYTES.len() as u16,
        }
    }

    #[test]
    fn test_parse() {
        let packet = udp::new_unchecked(&PACKET_BYTES[..]);
        let repr = Repr::parse(packet, (SRC_ADDR, DST_ADDR), Checksum::Manual).unwrap();
        assert_eq!(repr, packet_repr());
        assert_eq!(
            Repr::parse(packet, (DST_ADDR, SRC_ADDR), Checksum::Ignored),
            Ok(packet_repr()));
    }

    #[test]
    fn test_parse_wrong_checksum() {
        let mut bytes = PACKET_BYTES;
        bytes[7] ^= 0x01;
        let packet = udp::new_unchecked(&bytes[..]);
        assert_eq!(
            Repr::parse(packet, (SRC_ADDR, DST_ADDR), Checksum::Manual),
            Err(Error::WrongChecksum));
    }

    #[test]
    fn test_emit() {
        let repr = packet_repr();
        let mut bytes = vec![0xa5; repr.buffer_len()];
        let packet = udp::new_unchecked_mut(&mut bytes);
        repr.emit(packet, (SRC_ADDR, DST_ADDR), Checksum::Ignored);
        assert_eq!(packet.checksum(), 0);
        packet.payload_mut_slice().copy_from_slice(&PAYLOAD_BYTES[..]);
        repr.emit(packet, (SRC_ADDR, DST_ADDR), Checksum::Manual);
        assert_eq!(packet.as_bytes(), &PACKET_BYTES[..]);
        assert_eq!(format!("{}", repr), "UDP src=1 dst=2 len=4");
    }
}

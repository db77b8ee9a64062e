//! The `LOWPAN_IPHC` header compression, [RFC 6282 § 3].
//!
//! ```text
//!   0                                       1
//!   0   1   2   3   4   5   6   7   8   9   0   1   2   3   4   5
//! +---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+
//! | 0 | 1 | 1 |  TF   |NH | HLIM  |CID|SAC|  SAM  | M |DAC|  DAM  |
//! +---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+
//! ```
//!
//! Followed by, where the encoding requires them: the context identifier octet, traffic class
//! and flow label, next header, hop limit, source address bits, destination address bits.
//!
//! This module only deals with the bits on the wire. Which addresses the inline bits stand for
//! depends on link addresses and the context table and is resolved by the adaptation layer.
//!
//! [RFC 6282 § 3]: https://tools.ietf.org/html/rfc6282#section-3
use byteorder::{ByteOrder, NetworkEndian};

use crate::wire::{Error, IpProtocol as Protocol, Result};

mod field {
    use crate::wire::field::Field;

    pub(crate) const BASE: Field = 0..2;
    pub(crate) const CID: usize = 2;
}

const DISPATCH_MASK: u8 = 0xe0;
const DISPATCH_VALUE: u8 = 0x60;

const TF_SHIFT: u8 = 3;
const NH_BIT: u8 = 0x04;
const HLIM_MASK: u8 = 0x03;

const CID_BIT: u8 = 0x80;
const SAC_BIT: u8 = 0x40;
const SAM_SHIFT: u8 = 4;
const M_BIT: u8 = 0x08;
const DAC_BIT: u8 = 0x04;
const DAM_MASK: u8 = 0x03;

/// How many bits of an address are carried inline.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub enum AddressMode {
    /// The full address, or nothing for a stateful unspecified source.
    Inline128 = 0,
    /// The lower 64 bits, or 48 bits of a multicast address.
    Inline64 = 1,
    /// The lower 16 bits, or 32 bits of a multicast address.
    Inline16 = 2,
    /// Nothing, or 8 bits of a multicast address.
    Elided = 3,
}

impl AddressMode {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x3 {
            0 => AddressMode::Inline128,
            1 => AddressMode::Inline64,
            2 => AddressMode::Inline16,
            _ => AddressMode::Elided,
        }
    }
}

/// Which of the four traffic class and flow label encodings is used.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TrafficFlow {
    /// ECN, DSCP and flow label are carried in four octets.
    Inline = 0,
    /// ECN and flow label are carried in three octets.
    DscpElided = 1,
    /// ECN and DSCP are carried in one octet.
    FlowLabelElided = 2,
    /// Both are zero.
    Elided = 3,
}

/// The encoding of the IPv6 next header field.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum NextHeader {
    /// A `LOWPAN_NHC` encoded header follows.
    Compressed,
    /// The value is carried inline, the following header is not compressed.
    Uncompressed(Protocol),
}

/// The address bits carried inline.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct InlineAddress {
    len: u8,
    bytes: [u8; 16],
}

impl InlineAddress {
    /// Wrap up to sixteen octets.
    ///
    /// # Panics
    /// This function panics if more than sixteen octets are given.
    pub fn new(data: &[u8]) -> Self {
        let mut bytes = [0; 16];
        bytes[..data.len()].copy_from_slice(data);
        InlineAddress { len: data.len() as u8, bytes }
    }

    /// The octets.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..usize::from(self.len)]
    }
}

/// A high-level representation of an IPHC header.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Repr {
    /// The IPv6 traffic class, DSCP in the upper six bits and ECN in the lower two.
    pub traffic_class: u8,
    /// The IPv6 flow label.
    pub flow_label: u32,
    /// The next header encoding.
    pub next_header: NextHeader,
    /// The IPv6 hop limit.
    pub hop_limit: u8,
    /// Context of the source address, meaningful for stateful compression.
    pub src_context_id: u8,
    /// Context of the destination address, meaningful for stateful compression.
    pub dst_context_id: u8,
    /// Source address compression is stateful.
    pub sac: bool,
    /// Source address mode.
    pub sam: AddressMode,
    /// The inline source address bits.
    pub src_inline: InlineAddress,
    /// The destination is a multicast address.
    pub m: bool,
    /// Destination address compression is stateful.
    pub dac: bool,
    /// Destination address mode.
    pub dam: AddressMode,
    /// The inline destination address bits.
    pub dst_inline: InlineAddress,
}

/// The number of inline source address octets.
pub fn src_inline_len(sac: bool, sam: AddressMode) -> usize {
    match (sac, sam) {
        (false, AddressMode::Inline128) => 16,
        // The unspecified address.
        (true, AddressMode::Inline128) => 0,
        (_, AddressMode::Inline64) => 8,
        (_, AddressMode::Inline16) => 2,
        (_, AddressMode::Elided) => 0,
    }
}

/// The number of inline destination address octets.
///
/// Returns `Err(Error::Malformed)` for the reserved combinations.
pub fn dst_inline_len(m: bool, dac: bool, dam: AddressMode) -> Result<usize> {
    match (m, dac, dam) {
        (false, false, AddressMode::Inline128) => Ok(16),
        (false, true, AddressMode::Inline128) => Err(Error::Malformed),
        (false, _, AddressMode::Inline64) => Ok(8),
        (false, _, AddressMode::Inline16) => Ok(2),
        (false, _, AddressMode::Elided) => Ok(0),
        (true, false, AddressMode::Inline128) => Ok(16),
        (true, false, AddressMode::Inline64) => Ok(6),
        (true, false, AddressMode::Inline16) => Ok(4),
        (true, false, AddressMode::Elided) => Ok(1),
        (true, true, AddressMode::Inline128) => Ok(6),
        (true, true, _) => Err(Error::Malformed),
    }
}

impl Repr {
    /// The traffic class and flow label encoding for these values.
    pub fn traffic_flow(&self) -> TrafficFlow {
        let dscp = self.traffic_class >> 2;
        match (self.traffic_class, self.flow_label) {
            (0, 0) => TrafficFlow::Elided,
            (_, 0) => TrafficFlow::FlowLabelElided,
            _ if dscp == 0 => TrafficFlow::DscpElided,
            _ => TrafficFlow::Inline,
        }
    }

    fn hop_limit_bits(&self) -> u8 {
        match self.hop_limit {
            1 => 1,
            64 => 2,
            255 => 3,
            _ => 0,
        }
    }

    fn has_cid(&self) -> bool {
        self.src_context_id != 0 || self.dst_context_id != 0
    }

    /// Parse the header from the front of a buffer.
    ///
    /// Returns the header and the number of octets it occupied.
    pub fn parse(buffer: &[u8]) -> Result<(Self, usize)> {
        if buffer.len() < field::BASE.end {
            return Err(Error::Truncated);
        }
        let (b0, b1) = (buffer[0], buffer[1]);
        if b0 & DISPATCH_MASK != DISPATCH_VALUE {
            return Err(Error::Unrecognized);
        }

        let mut rest = &buffer[field::BASE.end..];

        let (src_context_id, dst_context_id) = if b1 & CID_BIT != 0 {
            let cid = take(&mut rest, 1)?[0];
            (cid >> 4, cid & 0x0f)
        } else {
            (0, 0)
        };

        let (traffic_class, flow_label) = match (b0 >> TF_SHIFT) & 0x3 {
            0 => {
                let tf = take(&mut rest, 4)?;
                let ecn = tf[0] >> 6;
                let dscp = tf[0] & 0x3f;
                (dscp << 2 | ecn, NetworkEndian::read_u24(&tf[1..]) & 0x000f_ffff)
            },
            1 => {
                let tf = take(&mut rest, 3)?;
                let ecn = tf[0] >> 6;
                (ecn, NetworkEndian::read_u24(tf) & 0x000f_ffff)
            },
            2 => {
                let tf = take(&mut rest, 1)?[0];
                let ecn = tf >> 6;
                let dscp = tf & 0x3f;
                (dscp << 2 | ecn, 0)
            },
            _ => (0, 0),
        };

        let next_header = if b0 & NH_BIT != 0 {
            NextHeader::Compressed
        } else {
            NextHeader::Uncompressed(Protocol::from(take(&mut rest, 1)?[0]))
        };

        let hop_limit = match b0 & HLIM_MASK {
            1 => 1,
            2 => 64,
            3 => 255,
            _ => take(&mut rest, 1)?[0],
        };

        let sac = b1 & SAC_BIT != 0;
        let sam = AddressMode::from_bits(b1 >> SAM_SHIFT);
        let src_inline = InlineAddress::new(take(&mut rest, src_inline_len(sac, sam))?);

        let m = b1 & M_BIT != 0;
        let dac = b1 & DAC_BIT != 0;
        let dam = AddressMode::from_bits(b1 & DAM_MASK);
        let dst_inline = InlineAddress::new(take(&mut rest, dst_inline_len(m, dac, dam)?)?);

        let repr = Repr {
            traffic_class,
            flow_label,
            next_header,
            hop_limit,
            src_context_id,
            dst_context_id,
            sac,
            sam,
            src_inline,
            m,
            dac,
            dam,
            dst_inline,
        };

        Ok((repr, buffer.len() - rest.len()))
    }

    /// Return the length of the header that will be emitted.
    pub fn buffer_len(&self) -> usize {
        let cid = if self.has_cid() { 1 } else { 0 };
        let tf = match self.traffic_flow() {
            TrafficFlow::Inline => 4,
            TrafficFlow::DscpElided => 3,
            TrafficFlow::FlowLabelElided => 1,
            TrafficFlow::Elided => 0,
        };
        let nh = match self.next_header {
            NextHeader::Compressed => 0,
            NextHeader::Uncompressed(_) => 1,
        };
        let hlim = if self.hop_limit_bits() == 0 { 1 } else { 0 };
        field::BASE.end + cid + tf + nh + hlim
            + self.src_inline.as_bytes().len()
            + self.dst_inline.as_bytes().len()
    }

    /// Emit the header into the first `buffer_len` octets of a buffer.
    pub fn emit(&self, buffer: &mut [u8]) {
        let traffic_flow = self.traffic_flow();
        let hlim = self.hop_limit_bits();

        let mut b0 = DISPATCH_VALUE | (traffic_flow as u8) << TF_SHIFT | hlim;
        if let NextHeader::Compressed = self.next_header {
            b0 |= NH_BIT;
        }

        let mut b1 = (self.sam as u8) << SAM_SHIFT | self.dam as u8;
        if self.has_cid() { b1 |= CID_BIT; }
        if self.sac { b1 |= SAC_BIT; }
        if self.m { b1 |= M_BIT; }
        if self.dac { b1 |= DAC_BIT; }

        buffer[0] = b0;
        buffer[1] = b1;

        let mut offset = field::BASE.end;
        let mut put = |bytes: &[u8]| {
            buffer[offset..offset + bytes.len()].copy_from_slice(bytes);
            offset += bytes.len();
        };

        if self.has_cid() {
            put(&[self.src_context_id << 4 | (self.dst_context_id & 0x0f)]);
        }

        let ecn = self.traffic_class & 0x3;
        let dscp = self.traffic_class >> 2;
        let mut flow = [0; 3];
        NetworkEndian::write_u24(&mut flow, self.flow_label & 0x000f_ffff);
        match traffic_flow {
            TrafficFlow::Inline => {
                put(&[ecn << 6 | dscp]);
                put(&flow);
            },
            TrafficFlow::DscpElided => {
                flow[0] |= ecn << 6;
                put(&flow);
            },
            TrafficFlow::FlowLabelElided => put(&[ecn << 6 | dscp]),
            TrafficFlow::Elided => (),
        }

        if let NextHeader::Uncompressed(protocol) = self.next_header {
            put(&[protocol.into()]);
        }

        if hlim == 0 {
            put(&[self.hop_limit]);
        }

        put(self.src_inline.as_bytes());
        put(self.dst_inline.as_bytes());
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

#[cfg(test)]
mod test {
    use super::*;

    fn link_local_repr() -> Repr {
        Repr {
            traffic_class: 0,
            flow_label: 0,
            next_header: NextHeader::Compressed,
            hop_limit: 64,
            src_context_id: 0,
            dst_context_id: 0,
            sac: false,
            sam: AddressMode::Elided,
            src_inline: InlineAddress::default(),
            m: false,
            dac: false,
            dam: AddressMode::Elided,
            dst_inline: InlineAddress::default(),
        }
    }

    #[test]
    fn smallest() {
        let repr = link_local_repr();
        assert_eq!(repr.buffer_len(), 2);
        let mut bytes = [0; 2];
        repr.emit(&mut bytes);
        assert_eq!(bytes, [0x7e, 0x33]);
        assert_eq!(Repr::parse(&bytes), Ok((repr, 2)));
    }

    #[test]
    fn traffic_flow_choice() {
        let mut repr = link_local_repr();
        assert_eq!(repr.traffic_flow(), TrafficFlow::Elided);
        repr.traffic_class = 0xb8;
        assert_eq!(repr.traffic_flow(), TrafficFlow::FlowLabelElided);
        repr.flow_label = 0x12345;
        assert_eq!(repr.traffic_flow(), TrafficFlow::Inline);
        repr.traffic_class = 0x01;
        assert_eq!(repr.traffic_flow(), TrafficFlow::DscpElided);
    }

    #[test]
    fn traffic_class_inline() {
        let repr = Repr {
            // DSCP 0x2e, ECN 0x1.
            traffic_class: 0xb9,
            flow_label: 0xabcde,
            ..link_local_repr()
        };
        let mut bytes = vec![0; repr.buffer_len()];
        repr.emit(&mut bytes);
        assert_eq!(bytes, [0x66, 0x33, 0x6e, 0x0a, 0xbc, 0xde]);
        assert_eq!(Repr::parse(&bytes), Ok((repr, 6)));
    }

    #[test]
    fn dscp_elided() {
        let repr = Repr {
            traffic_class: 0x02,
            flow_label: 0xabcde,
            ..link_local_repr()
        };
        let mut bytes = vec![0; repr.buffer_len()];
        repr.emit(&mut bytes);
        assert_eq!(bytes, [0x6e, 0x33, 0x8a, 0xbc, 0xde]);
        assert_eq!(Repr::parse(&bytes), Ok((repr, 5)));
    }

    #[test]
    fn all_inline_with_context() {
        let repr = Repr {
            next_header: NextHeader::Uncompressed(Protocol::Tcp),
            hop_limit: 17,
            src_context_id: 3,
            dst_context_id: 0,
            sac: true,
            sam: AddressMode::Inline64,
            src_inline: InlineAddress::new(&[1, 2, 3, 4, 5, 6, 7, 8]),
            dam: AddressMode::Inline128,
            dst_inline: InlineAddress::new(&[0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]),
            ..link_local_repr()
        };
        assert_eq!(repr.buffer_len(), 2 + 1 + 1 + 1 + 8 + 16);
        let mut bytes = vec![0; repr.buffer_len()];
        repr.emit(&mut bytes);
        assert_eq!(&bytes[..5], &[0x78, 0xd0, 0x30, 0x06, 17]);
        assert_eq!(Repr::parse(&bytes), Ok((repr, bytes.len())));
    }

    #[test]
    fn multicast_modes() {
        assert_eq!(dst_inline_len(true, false, AddressMode::Elided), Ok(1));
        assert_eq!(dst_inline_len(true, false, AddressMode::Inline16), Ok(4));
        assert_eq!(dst_inline_len(true, false, AddressMode::Inline64), Ok(6));
        assert_eq!(dst_inline_len(true, true, AddressMode::Inline128), Ok(6));
        assert_eq!(dst_inline_len(true, true, AddressMode::Inline64), Err(Error::Malformed));
        assert_eq!(dst_inline_len(false, true, AddressMode::Inline128), Err(Error::Malformed));
        assert_eq!(src_inline_len(true, AddressMode::Inline128), 0);
    }

    #[test]
    fn reserved_destination() {
        // M=0, DAC=1, DAM=00
        assert_eq!(Repr::parse(&[0x7e, 0x34]), Err(Error::Malformed));
    }

    #[test]
    fn truncated() {
        assert_eq!(Repr::parse(&[0x7e]), Err(Error::Truncated));
        // Hop limit inline but missing.
        assert_eq!(Repr::parse(&[0x7c, 0x33]), Err(Error::Truncated));
        assert_eq!(Repr::parse(&[0x41, 0x33]), Err(Error::Unrecognized));
    }
}

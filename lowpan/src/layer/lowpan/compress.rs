//! Header compression and decompression.
//!
//! Compression first walks the uncompressed header chain and collects every header that can be
//! compressed: IPv6 headers, extension headers other than Mobility and a final UDP header. The
//! walk stops at the first header that can not be compressed, everything from there on is carried
//! as is. The collected headers are then emitted front to back, each announcing with its next
//! header bit whether another compressed header follows.
//!
//! Decompression parses the compressed headers in the same order but can only fill in the length
//! fields and the UDP checksum once the whole datagram is known, which for a fragmented datagram
//! is only after reassembly. The sizes of the uncompressed headers are known much earlier, which
//! is what reassembly needs from the first fragment.
use crate::layer::{Error, Result};
use crate::time::Instant;
use crate::wire::{Checksum, IpProtocol, Ipv6Address, Ipv6ExtRepr, Ipv6Repr, Ipv6Subnet};
use crate::wire::{LinkAddress, InterfaceId, IPV6_HEADER_LEN, UDP_HEADER_LEN};
use crate::wire::{ipv6_packet, udp_packet};
use crate::wire::sixlowpan::{hc1, iphc, nhc, Dispatch, DISPATCH_IPV6};

use super::context::ContextTable;
use super::DropReason;

/// Deepest chain of compressed headers handled in one datagram.
const MAX_CHAIN: usize = 16;

/// Everything compression and decompression depend on.
pub(crate) struct Codec<'a> {
    pub(crate) contexts: &'a ContextTable,
    pub(crate) now: Instant,
    pub(crate) checksum: Checksum,
    pub(crate) omit_udp_checksum: bool,
    pub(crate) use_iphc: bool,
}

/// A packet with its headers compressed.
#[derive(Debug)]
pub(crate) struct Compressed {
    /// The frame, starting with the dispatch of the compressed header.
    pub(crate) frame: Vec<u8>,
    /// Octets of the original packet that the compressed headers stand for.
    pub(crate) header_len: usize,
    /// The length of the original packet.
    pub(crate) datagram_size: usize,
}

/// Why a frame could not be decompressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Failure {
    /// Drop the frame and report it.
    Drop(DropReason),
    /// The peer violated the protocol in a way that we refuse to handle.
    Violation(&'static str),
}

/// Uncompressed headers whose length fields are yet to be filled.
#[derive(Debug)]
pub(crate) struct Decompressed {
    headers: Vec<u8>,
    consumed: usize,
    fixups: Vec<Fixup>,
}

#[derive(Debug, Clone, Copy)]
enum Fixup {
    Ipv6 {
        at: usize,
    },
    Udp {
        at: usize,
        checksum: Option<u16>,
        src_addr: Ipv6Address,
        dst_addr: Ipv6Address,
    },
}

/// A header found in the chain of an uncompressed packet.
enum Element<'a> {
    Ipv6(Ipv6Repr),
    Ext(Ipv6ExtRepr<'a>),
    Udp(&'a udp_packet),
}

/// A header found in a compressed frame.
enum Header<'a> {
    Ipv6(Ipv6Repr),
    Ext { kind: IpProtocol, data: &'a [u8] },
    Udp(nhc::UdpRepr),
}

impl From<crate::wire::Error> for Failure {
    fn from(_: crate::wire::Error) -> Self {
        Failure::Drop(DropReason::UnknownExtension)
    }
}

impl Element<'_> {
    fn len(&self) -> usize {
        match self {
            Element::Ipv6(_) => IPV6_HEADER_LEN,
            Element::Ext(ext) => ext.buffer_len(),
            Element::Udp(_) => UDP_HEADER_LEN,
        }
    }
}

impl Header<'_> {
    fn protocol(&self) -> IpProtocol {
        match self {
            Header::Ipv6(_) => IpProtocol::Ipv6,
            Header::Ext { kind, .. } => *kind,
            Header::Udp(_) => IpProtocol::Udp,
        }
    }
}

impl Compressed {
    /// Carry a packet uncompressed, behind the IPv6 dispatch.
    pub(crate) fn uncompressed(packet: &[u8]) -> Self {
        let mut frame = Vec::with_capacity(packet.len() + 1);
        frame.push(DISPATCH_IPV6);
        frame.extend_from_slice(packet);
        Compressed { frame, header_len: 0, datagram_size: packet.len() }
    }

    /// The octets of the frame that the compressed headers take up.
    pub(crate) fn compressed_header_len(&self) -> usize {
        self.frame.len() - (self.datagram_size - self.header_len)
    }
}

impl Decompressed {
    /// The length of the uncompressed headers.
    pub(crate) fn header_len(&self) -> usize {
        self.headers.len()
    }

    /// The octets of the frame taken up by compressed headers.
    pub(crate) fn consumed(&self) -> usize {
        self.consumed
    }

    /// Append the payload and fill in lengths and checksums.
    pub(crate) fn finish(self, payload: &[u8], checksum: Checksum) -> Vec<u8> {
        let mut packet = self.headers;
        packet.extend_from_slice(payload);
        let total = packet.len();

        for fixup in self.fixups {
            match fixup {
                Fixup::Ipv6 { at } => {
                    let header = ipv6_packet::new_unchecked_mut(&mut packet[at..]);
                    header.set_payload_len((total - at - IPV6_HEADER_LEN) as u16);
                },
                Fixup::Udp { at, checksum: inline, src_addr, dst_addr } => {
                    let udp = udp_packet::new_unchecked_mut(&mut packet[at..]);
                    udp.set_len((total - at) as u16);
                    match inline {
                        Some(value) => udp.set_checksum(value),
                        None if checksum.manual() => udp.fill_checksum(src_addr, dst_addr),
                        None => udp.set_checksum(0),
                    }
                },
            }
        }

        packet
    }
}

impl Codec<'_> {
    /// Compress with IPHC and `LOWPAN_NHC`.
    ///
    /// Fails with `BadSize` if the packet does not start with a complete IPv6 header.
    pub(crate) fn compress_iphc(&self, packet: &[u8], src: LinkAddress, dst: LinkAddress)
        -> Result<Compressed>
    {
        let (packet, chain) = extract_chain(packet)?;
        let header_len: usize = chain.iter().map(Element::len).sum();
        let mut frame = Vec::with_capacity(packet.len());

        for (idx, element) in chain.iter().enumerate() {
            let next = chain.get(idx + 1);
            match element {
                Element::Ipv6(repr) => {
                    if idx > 0 {
                        push_emit(&mut frame, nhc::ExtensionRepr::IPV6.buffer_len(),
                            |buf| nhc::ExtensionRepr::IPV6.emit(buf));
                    }
                    let next_header = match next {
                        Some(_) => iphc::NextHeader::Compressed,
                        None => iphc::NextHeader::Uncompressed(repr.next_header),
                    };
                    let iphc = self.iphc_repr(repr, next_header, src, dst);
                    push_emit(&mut frame, iphc.buffer_len(), |buf| iphc.emit(buf));
                },
                Element::Ext(ext) => {
                    let next_header = match next {
                        Some(_) => iphc::NextHeader::Compressed,
                        None => iphc::NextHeader::Uncompressed(ext.next_header),
                    };
                    // Extraction only admits headers that have an identifier.
                    let id = nhc::ExtHeaderId::from_protocol(ext.kind)
                        .ok_or(Error::Illegal)?;
                    let repr = nhc::ExtensionRepr { id, next_header, data: ext.data };
                    push_emit(&mut frame, repr.buffer_len(), |buf| repr.emit(buf));
                },
                Element::Udp(udp) => {
                    let (src_addr, dst_addr) = innermost_addresses(&chain[..idx]);
                    let elide = self.omit_udp_checksum
                        && (!self.checksum.manual() || udp.verify_checksum(src_addr, dst_addr));
                    let repr = nhc::UdpRepr {
                        src_port: udp.src_port(),
                        dst_port: udp.dst_port(),
                        checksum: if elide { None } else { Some(udp.checksum()) },
                    };
                    push_emit(&mut frame, repr.buffer_len(), |buf| repr.emit(buf));
                },
            }
        }

        net_trace!("lowpan: iphc compressed {} header octets to {}", header_len, frame.len());
        frame.extend_from_slice(&packet[header_len..]);
        Ok(Compressed { frame, header_len, datagram_size: packet.len() })
    }

    /// Compress with the legacy HC1 scheme.
    ///
    /// Only the IPv6 header is compressed, the rest of the packet is carried as is.
    pub(crate) fn compress_hc1(&self, packet: &[u8], src: LinkAddress, dst: LinkAddress)
        -> Result<Compressed>
    {
        let header = ipv6_packet::new_checked(packet).map_err(|_| Error::BadSize)?;
        let ip = Ipv6Repr::parse(header).map_err(|_| Error::BadSize)?;
        let packet = &packet[..header.total_len()];

        let repr = hc1::Repr {
            src: hc1_address(ip.src_addr, src),
            dst: hc1_address(ip.dst_addr, dst),
            traffic_class: ip.traffic_class,
            flow_label: ip.flow_label,
            next_header: ip.next_header,
            hop_limit: ip.hop_limit,
        };

        let mut frame = Vec::with_capacity(packet.len());
        push_emit(&mut frame, repr.buffer_len(), |buf| repr.emit(buf));
        frame.extend_from_slice(&packet[IPV6_HEADER_LEN..]);
        Ok(Compressed { frame, header_len: IPV6_HEADER_LEN, datagram_size: packet.len() })
    }

    /// Decompress the headers at the start of a frame.
    ///
    /// The frame must start with the IPv6, HC1 or IPHC dispatch.
    pub(crate) fn decompress(&self, frame: &[u8], src: LinkAddress, dst: LinkAddress)
        -> core::result::Result<Decompressed, Failure>
    {
        match Dispatch::peek(frame)? {
            Dispatch::Ipv6 => Ok(Decompressed {
                headers: Vec::new(),
                consumed: 1,
                fixups: Vec::new(),
            }),
            Dispatch::Hc1 if self.use_iphc => Err(Failure::Drop(DropReason::DisallowedCompression)),
            Dispatch::Iphc if !self.use_iphc => Err(Failure::Drop(DropReason::DisallowedCompression)),
            Dispatch::Hc1 => self.decompress_hc1(frame, src, dst),
            Dispatch::Iphc => self.decompress_iphc(frame, src, dst),
            _ => Err(Failure::Drop(DropReason::UnknownExtension)),
        }
    }

    fn decompress_hc1(&self, frame: &[u8], src: LinkAddress, dst: LinkAddress)
        -> core::result::Result<Decompressed, Failure>
    {
        let repr = hc1::Repr::parse(frame)?;
        let ip = Ipv6Repr {
            src_addr: hc1_rebuild(&repr.src, src),
            dst_addr: hc1_rebuild(&repr.dst, dst),
            next_header: repr.next_header,
            payload_len: 0,
            hop_limit: repr.hop_limit,
            traffic_class: repr.traffic_class,
            flow_label: repr.flow_label,
        };

        let mut headers = vec![0; IPV6_HEADER_LEN];
        ip.emit(ipv6_packet::new_unchecked_mut(&mut headers));
        Ok(Decompressed {
            headers,
            consumed: repr.buffer_len(),
            fixups: vec![Fixup::Ipv6 { at: 0 }],
        })
    }

    fn decompress_iphc(&self, frame: &[u8], src: LinkAddress, dst: LinkAddress)
        -> core::result::Result<Decompressed, Failure>
    {
        let mut rest = frame;
        let mut chain: Vec<Header> = Vec::new();
        let trailing;

        'ipv6: loop {
            let (repr, len) = iphc::Repr::parse(rest)?;
            rest = &rest[len..];
            chain.push(Header::Ipv6(self.ipv6_from_iphc(&repr, src, dst)?));

            let mut next = repr.next_header;
            loop {
                if chain.len() > MAX_CHAIN {
                    return Err(Failure::Drop(DropReason::UnknownExtension));
                }

                match next {
                    iphc::NextHeader::Uncompressed(protocol) => {
                        trailing = protocol;
                        break 'ipv6;
                    },
                    iphc::NextHeader::Compressed => (),
                }

                match nhc::Dispatch::peek(rest)? {
                    nhc::Dispatch::Udp => {
                        let (udp, len) = nhc::UdpRepr::parse(rest)?;
                        rest = &rest[len..];
                        chain.push(Header::Udp(udp));
                        trailing = IpProtocol::Udp;
                        break 'ipv6;
                    },
                    nhc::Dispatch::Extension => {
                        let (ext, len) = nhc::ExtensionRepr::parse(rest)?;
                        rest = &rest[len..];
                        match ext.id {
                            nhc::ExtHeaderId::Ipv6 => continue 'ipv6,
                            nhc::ExtHeaderId::Mobility => {
                                return Err(Failure::Violation("mobility header is not supported"));
                            },
                            id => {
                                chain.push(Header::Ext { kind: id.protocol(), data: ext.data });
                                next = ext.next_header;
                            },
                        }
                    },
                }
            }
        }

        let mut headers = Vec::new();
        let mut fixups = Vec::new();
        let mut addresses = (Ipv6Address::UNSPECIFIED, Ipv6Address::UNSPECIFIED);

        for (idx, header) in chain.iter().enumerate() {
            let next_header = chain.get(idx + 1)
                .map(Header::protocol)
                .unwrap_or(trailing);
            let at = headers.len();

            match header {
                Header::Ipv6(repr) => {
                    let repr = Ipv6Repr { next_header, ..*repr };
                    addresses = (repr.src_addr, repr.dst_addr);
                    headers.resize(at + IPV6_HEADER_LEN, 0);
                    repr.emit(ipv6_packet::new_unchecked_mut(&mut headers[at..]));
                    fixups.push(Fixup::Ipv6 { at });
                },
                Header::Ext { kind, data } => {
                    let repr = Ipv6ExtRepr::new(*kind, next_header, data)?;
                    headers.resize(at + repr.buffer_len(), 0);
                    repr.emit(&mut headers[at..]);
                },
                Header::Udp(repr) => {
                    headers.resize(at + UDP_HEADER_LEN, 0);
                    let udp = udp_packet::new_unchecked_mut(&mut headers[at..]);
                    udp.set_src_port(repr.src_port);
                    udp.set_dst_port(repr.dst_port);
                    fixups.push(Fixup::Udp {
                        at,
                        checksum: repr.checksum,
                        src_addr: addresses.0,
                        dst_addr: addresses.1,
                    });
                },
            }
        }

        Ok(Decompressed {
            headers,
            consumed: frame.len() - rest.len(),
            fixups,
        })
    }

    fn iphc_repr(
        &self,
        ip: &Ipv6Repr,
        next_header: iphc::NextHeader,
        src: LinkAddress,
        dst: LinkAddress,
    ) -> iphc::Repr {
        let (sac, sam, src_context_id, src_inline) = self.compress_src(ip.src_addr, src);
        let (m, dac, dam, dst_context_id, dst_inline) = self.compress_dst(ip.dst_addr, dst);
        iphc::Repr {
            traffic_class: ip.traffic_class,
            flow_label: ip.flow_label,
            next_header,
            hop_limit: ip.hop_limit,
            src_context_id,
            dst_context_id,
            sac,
            sam,
            src_inline,
            m,
            dac,
            dam,
            dst_inline,
        }
    }

    fn compress_src(&self, addr: Ipv6Address, link: LinkAddress)
        -> (bool, iphc::AddressMode, u8, iphc::InlineAddress)
    {
        if addr.is_unspecified() {
            return (true, iphc::AddressMode::Inline128, 0, iphc::InlineAddress::default());
        }

        if let Some((id, (mode, inline))) = self.stateful_unicast(addr, link) {
            return (true, mode, id, inline);
        }

        let (mode, inline) = stateless_unicast(addr, link);
        (false, mode, 0, inline)
    }

    fn compress_dst(&self, addr: Ipv6Address, link: LinkAddress)
        -> (bool, bool, iphc::AddressMode, u8, iphc::InlineAddress)
    {
        let bytes = addr.as_bytes();
        if addr.is_multicast() {
            if let Some((id, _)) = self.contexts.find_multicast(addr, self.now) {
                let inline = [bytes[1], bytes[2], bytes[12], bytes[13], bytes[14], bytes[15]];
                return (true, true, iphc::AddressMode::Inline128, id, iphc::InlineAddress::new(&inline));
            }

            let (mode, inline) = if bytes[1] == 0x02 && bytes[2..15].iter().all(|&b| b == 0) {
                (iphc::AddressMode::Elided, iphc::InlineAddress::new(&bytes[15..]))
            } else if bytes[2..13].iter().all(|&b| b == 0) {
                let inline = [bytes[1], bytes[13], bytes[14], bytes[15]];
                (iphc::AddressMode::Inline16, iphc::InlineAddress::new(&inline))
            } else if bytes[2..11].iter().all(|&b| b == 0) {
                let inline = [bytes[1], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15]];
                (iphc::AddressMode::Inline64, iphc::InlineAddress::new(&inline))
            } else {
                (iphc::AddressMode::Inline128, iphc::InlineAddress::new(bytes))
            };
            return (true, false, mode, 0, inline);
        }

        if let Some((id, (mode, inline))) = self.stateful_unicast(addr, link) {
            return (false, true, mode, id, inline);
        }

        let (mode, inline) = stateless_unicast(addr, link);
        (false, false, mode, 0, inline)
    }

    fn stateful_unicast(&self, addr: Ipv6Address, link: LinkAddress)
        -> Option<(u8, (iphc::AddressMode, iphc::InlineAddress))>
    {
        let (id, context) = self.contexts.find_unicast(addr, self.now)?;
        let cleaned = addr.without_prefix(context.prefix.prefix_len());
        let cleaned = cleaned.as_bytes();

        // Bits between the prefix and the interface id can not be expressed.
        if cleaned[..8].iter().any(|&b| b != 0) {
            return None;
        }

        let encoding = if link.autoconfigured(context.prefix) == addr {
            (iphc::AddressMode::Elided, iphc::InlineAddress::default())
        } else if cleaned[8..14] == [0, 0, 0, 0xff, 0xfe, 0] {
            (iphc::AddressMode::Inline16, iphc::InlineAddress::new(&cleaned[14..]))
        } else {
            (iphc::AddressMode::Inline64, iphc::InlineAddress::new(&cleaned[8..]))
        };
        Some((id, encoding))
    }

    fn ipv6_from_iphc(&self, repr: &iphc::Repr, src: LinkAddress, dst: LinkAddress)
        -> core::result::Result<Ipv6Repr, Failure>
    {
        let src_addr = match (repr.sac, repr.sam) {
            (true, iphc::AddressMode::Inline128) => Ipv6Address::UNSPECIFIED,
            (true, mode) => {
                let prefix = self.context_prefix(repr.src_context_id)?;
                rebuild_stateful(prefix, mode, repr.src_inline.as_bytes(), src)?
            },
            (false, mode) => rebuild_stateless(mode, repr.src_inline.as_bytes(), src),
        };

        let inline = repr.dst_inline.as_bytes();
        let dst_addr = match (repr.m, repr.dac) {
            (true, true) => {
                let prefix = self.context_prefix(repr.dst_context_id)?;
                let network = prefix.address();
                let mut bytes = [0; 16];
                bytes[0] = 0xff;
                bytes[1..3].copy_from_slice(&inline[..2]);
                bytes[3] = prefix.prefix_len();
                bytes[4..12].copy_from_slice(&network.as_bytes()[..8]);
                bytes[12..].copy_from_slice(&inline[2..6]);
                Ipv6Address(bytes)
            },
            (true, false) => rebuild_multicast(repr.dam, inline),
            (false, true) => {
                let prefix = self.context_prefix(repr.dst_context_id)?;
                rebuild_stateful(prefix, repr.dam, inline, dst)?
            },
            (false, false) => rebuild_stateless(repr.dam, inline, dst),
        };

        Ok(Ipv6Repr {
            src_addr,
            dst_addr,
            next_header: IpProtocol::Ipv6NoNxt,
            payload_len: 0,
            hop_limit: repr.hop_limit,
            traffic_class: repr.traffic_class,
            flow_label: repr.flow_label,
        })
    }

    fn context_prefix(&self, id: u8) -> core::result::Result<Ipv6Subnet, Failure> {
        self.contexts.lookup(id, self.now)
            .map(|context| context.prefix)
            .ok_or(Failure::Drop(DropReason::StatefulDecompressionProblem))
    }
}

/// Collect the compressible headers of a packet.
///
/// Also returns the packet trimmed to the length of its outer IPv6 header.
fn extract_chain(packet: &[u8]) -> Result<(&[u8], Vec<Element<'_>>)> {
    let header = ipv6_packet::new_checked(packet).map_err(|_| Error::BadSize)?;
    let outer = Ipv6Repr::parse(header).map_err(|_| Error::BadSize)?;
    let packet = &packet[..header.total_len()];

    let mut chain = vec![Element::Ipv6(outer)];
    let mut offset = IPV6_HEADER_LEN;
    let mut next = outer.next_header;

    while chain.len() < MAX_CHAIN {
        let rest = &packet[offset..];
        let element = match next {
            IpProtocol::Udp => match udp_packet::new_checked(rest) {
                Ok(udp) if usize::from(udp.len()) == rest.len() => Element::Udp(udp),
                _ => break,
            },
            IpProtocol::Ipv6 => {
                let inner = match ipv6_packet::new_checked(rest) {
                    Ok(inner) if inner.total_len() == rest.len() => inner,
                    _ => break,
                };
                match Ipv6Repr::parse(inner) {
                    Ok(repr) => Element::Ipv6(repr),
                    Err(_) => break,
                }
            },
            IpProtocol::Mobility => break,
            // The compressed Fragment header has no reserved octet.
            IpProtocol::Ipv6Frag if rest.get(1).map_or(true, |&reserved| reserved != 0) => break,
            kind if kind.is_extension_header() => match Ipv6ExtRepr::parse(kind, rest) {
                Ok(ext) if ext.data.len() <= nhc::MAX_EXTENSION_DATA => Element::Ext(ext),
                _ => break,
            },
            _ => break,
        };

        offset += element.len();
        next = match &element {
            Element::Ipv6(repr) => repr.next_header,
            Element::Ext(ext) => ext.next_header,
            Element::Udp(_) => {
                chain.push(element);
                break;
            },
        };
        chain.push(element);
    }

    Ok((packet, chain))
}

fn innermost_addresses(chain: &[Element]) -> (Ipv6Address, Ipv6Address) {
    chain.iter().rev()
        .find_map(|element| match element {
            Element::Ipv6(repr) => Some((repr.src_addr, repr.dst_addr)),
            _ => None,
        })
        .unwrap_or((Ipv6Address::UNSPECIFIED, Ipv6Address::UNSPECIFIED))
}

fn push_emit(frame: &mut Vec<u8>, len: usize, emit: impl FnOnce(&mut [u8])) {
    let at = frame.len();
    frame.resize(at + len, 0);
    emit(&mut frame[at..]);
}

fn stateless_unicast(addr: Ipv6Address, link: LinkAddress) -> (iphc::AddressMode, iphc::InlineAddress) {
    let bytes = addr.as_bytes();
    if addr == link.link_local() {
        (iphc::AddressMode::Elided, iphc::InlineAddress::default())
    } else if addr.is_link_local() {
        if bytes[8..14] == [0, 0, 0, 0xff, 0xfe, 0] {
            (iphc::AddressMode::Inline16, iphc::InlineAddress::new(&bytes[14..]))
        } else {
            (iphc::AddressMode::Inline64, iphc::InlineAddress::new(&bytes[8..]))
        }
    } else {
        (iphc::AddressMode::Inline128, iphc::InlineAddress::new(bytes))
    }
}

fn short_id(inline: &[u8]) -> InterfaceId {
    InterfaceId([0, 0, 0, 0xff, 0xfe, 0, inline[0], inline[1]])
}

fn long_id(inline: &[u8]) -> InterfaceId {
    let mut id = [0; 8];
    id.copy_from_slice(&inline[..8]);
    InterfaceId(id)
}

fn rebuild_stateless(mode: iphc::AddressMode, inline: &[u8], link: LinkAddress) -> Ipv6Address {
    match mode {
        iphc::AddressMode::Inline128 => Ipv6Address::from_bytes(inline),
        iphc::AddressMode::Inline64 => Ipv6Address::from_link_local_id(long_id(inline)),
        iphc::AddressMode::Inline16 => Ipv6Address::from_link_local_id(short_id(inline)),
        iphc::AddressMode::Elided => link.link_local(),
    }
}

fn rebuild_stateful(prefix: Ipv6Subnet, mode: iphc::AddressMode, inline: &[u8], link: LinkAddress)
    -> core::result::Result<Ipv6Address, Failure>
{
    match mode {
        iphc::AddressMode::Inline64 => Ok(Ipv6Address::from_prefix_and_id(prefix, long_id(inline))),
        iphc::AddressMode::Inline16 => Ok(Ipv6Address::from_prefix_and_id(prefix, short_id(inline))),
        iphc::AddressMode::Elided => Ok(link.autoconfigured(prefix)),
        // Reserved, parsing rejects it for destinations.
        iphc::AddressMode::Inline128 => Err(Failure::Drop(DropReason::UnknownExtension)),
    }
}

fn rebuild_multicast(mode: iphc::AddressMode, inline: &[u8]) -> Ipv6Address {
    let mut bytes = [0; 16];
    bytes[0] = 0xff;
    match mode {
        iphc::AddressMode::Inline128 => bytes.copy_from_slice(inline),
        iphc::AddressMode::Inline64 => {
            bytes[1] = inline[0];
            bytes[11..].copy_from_slice(&inline[1..6]);
        },
        iphc::AddressMode::Inline16 => {
            bytes[1] = inline[0];
            bytes[13..].copy_from_slice(&inline[1..4]);
        },
        iphc::AddressMode::Elided => {
            bytes[1] = 0x02;
            bytes[15] = inline[0];
        },
    }
    Ipv6Address(bytes)
}

fn hc1_address(addr: Ipv6Address, link: LinkAddress) -> hc1::Address {
    let bytes = addr.as_bytes();
    let derived = link.link_local().as_bytes()[8..] == bytes[8..];
    let mode = match (addr.is_link_local(), derived) {
        (true, true) => hc1::AddressMode::PrefixElidedIdElided,
        (true, false) => hc1::AddressMode::PrefixElidedIdInline,
        (false, true) => hc1::AddressMode::PrefixInlineIdElided,
        (false, false) => hc1::AddressMode::PrefixInlineIdInline,
    };

    let mut prefix = [0; 8];
    let mut id = [0; 8];
    prefix.copy_from_slice(&bytes[..8]);
    id.copy_from_slice(&bytes[8..]);
    hc1::Address { mode, prefix, id }
}

fn hc1_rebuild(addr: &hc1::Address, link: LinkAddress) -> Ipv6Address {
    let mut bytes = [0; 16];
    if addr.mode.prefix_inline() {
        bytes[..8].copy_from_slice(&addr.prefix);
    } else {
        bytes[..8].copy_from_slice(&Ipv6Subnet::LINK_LOCAL.address().as_bytes()[..8]);
    }
    if addr.mode.id_inline() {
        bytes[8..].copy_from_slice(&addr.id);
    } else {
        bytes[8..].copy_from_slice(&link.interface_id().0);
    }
    Ipv6Address(bytes)
}

/// The compressed header that starts a frame, for tracing.
pub(crate) fn describe(frame: &[u8]) -> &'static str {
    match Dispatch::peek(frame) {
        Ok(Dispatch::Ipv6) => "ipv6",
        Ok(Dispatch::Hc1) => "hc1",
        Ok(Dispatch::Iphc) => "iphc",
        Ok(Dispatch::Mesh) => "mesh",
        Ok(Dispatch::Bc0) => "bc0",
        Ok(Dispatch::Frag1) | Ok(Dispatch::FragN) => "fragment",
        _ => "unknown",
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::time::Duration;
    use crate::wire::UdpRepr;

    const SRC: LinkAddress = LinkAddress::short(0x0001);
    const DST: LinkAddress = LinkAddress::short(0x0002);

    fn codec(contexts: &ContextTable) -> Codec<'_> {
        Codec {
            contexts,
            now: Instant::ZERO,
            checksum: Checksum::Manual,
            omit_udp_checksum: true,
            use_iphc: true,
        }
    }

    fn datagram(src_addr: Ipv6Address, dst_addr: Ipv6Address, ports: (u16, u16), payload: &[u8]) -> Vec<u8> {
        let udp = UdpRepr { src_port: ports.0, dst_port: ports.1, length: (8 + payload.len()) as u16 };
        let ip = Ipv6Repr {
            src_addr,
            dst_addr,
            next_header: IpProtocol::Udp,
            payload_len: 8 + payload.len(),
            hop_limit: 64,
            traffic_class: 0,
            flow_label: 0,
        };
        let mut packet = vec![0; 48 + payload.len()];
        ip.emit(ipv6_packet::new_unchecked_mut(&mut packet));
        packet[48..].copy_from_slice(payload);
        udp.emit(udp_packet::new_unchecked_mut(&mut packet[40..]), (src_addr, dst_addr), Checksum::Manual);
        packet
    }

    fn roundtrip(codec: &Codec, packet: &[u8]) -> Compressed {
        let compressed = codec.compress_iphc(packet, SRC, DST).unwrap();
        let headers = codec.decompress(&compressed.frame, SRC, DST).unwrap();
        let payload = &compressed.frame[headers.consumed()..];
        assert_eq!(headers.header_len(), compressed.header_len);
        assert_eq!(headers.finish(payload, Checksum::Manual), packet);
        compressed
    }

    #[test]
    fn link_local_fully_elided() {
        let contexts = ContextTable::new();
        let codec = codec(&contexts);
        let packet = datagram(SRC.link_local(), DST.link_local(), (61617, 61616), b"hello");
        let compressed = roundtrip(&codec, &packet);
        // IPHC (2) + UDP NHC with both ports in one octet (2), checksum elided.
        assert_eq!(&compressed.frame[..4], &[0x7e, 0x33, 0xf7, 0x10]);
        assert_eq!(compressed.header_len, 48);
    }

    #[test]
    fn link_local_inline() {
        let contexts = ContextTable::new();
        let codec = codec(&contexts);
        let src = Ipv6Address::new(0xfe80, 0, 0, 0, 0, 0xff, 0xfe00, 0x1234);
        let dst = Ipv6Address::new(0xfe80, 0, 0, 0, 0x0211, 0x22ff, 0xfe33, 0x4455);
        let packet = datagram(src, dst, (5683, 5683), b"coap");
        let compressed = roundtrip(&codec, &packet);
        assert_eq!(compressed.frame[1], 0x21);
    }

    #[test]
    fn global_inline() {
        let contexts = ContextTable::new();
        let codec = codec(&contexts);
        let src = Ipv6Address::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1);
        let dst = Ipv6Address::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 2);
        let packet = datagram(src, dst, (1000, 2000), &[0xaa; 20]);
        roundtrip(&codec, &packet);
    }

    #[test]
    fn stateful() {
        let mut contexts = ContextTable::new();
        let prefix = Ipv6Subnet::new(Ipv6Address::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0), 64);
        contexts.add(1, prefix, true, Duration::from_secs(100), Instant::ZERO);
        let codec = codec(&contexts);

        let src = SRC.autoconfigured(prefix);
        let dst = Ipv6Address::new(0x2001, 0xdb8, 0, 0, 0, 0xff, 0xfe00, 0x0042);
        let packet = datagram(src, dst, (1000, 2000), b"x");
        let compressed = roundtrip(&codec, &packet);
        // CID, SAC, SAM elided, DAC, DAM 16 bits.
        assert_eq!(compressed.frame[1], 0x80 | 0x40 | 0x30 | 0x04 | 0x02);
        assert_eq!(compressed.frame[2], 0x11);

        // Without the context the receiver can not restore the addresses.
        let empty = ContextTable::new();
        let receiver = super::test::codec(&empty);
        assert_eq!(
            receiver.decompress(&compressed.frame, SRC, DST).unwrap_err(),
            Failure::Drop(DropReason::StatefulDecompressionProblem));
    }

    #[test]
    fn multicast() {
        let mut contexts = ContextTable::new();
        let prefix = Ipv6Subnet::new(Ipv6Address::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0), 64);
        contexts.add(2, prefix, true, Duration::from_secs(100), Instant::ZERO);
        let codec = codec(&contexts);

        let groups = [
            (Ipv6Address::LINK_LOCAL_ALL_NODES, 1),
            (Ipv6Address::new(0xff05, 0, 0, 0, 0, 0, 0x00ab, 0xcdef), 4),
            (Ipv6Address::new(0xff05, 0, 0, 0, 0, 0x00ab, 0xcdef, 0x0123), 6),
            (Ipv6Address::new(0xff3e, 0x0040, 0x2001, 0x0db8, 0, 0, 0, 0x1234), 6),
            (Ipv6Address::new(0xff05, 0x1234, 0, 0, 0, 0, 0, 1), 16),
        ];

        for &(group, inline) in groups.iter() {
            let packet = datagram(SRC.link_local(), group, (1000, 2000), b"m");
            let compressed = roundtrip(&codec, &packet);
            // Source elided, no context octet unless stateful.
            let iphc_len = if group.as_bytes()[1] == 0x3e { 3 } else { 2 };
            let udp_len = 1 + 4;
            assert_eq!(compressed.frame.len(), iphc_len + inline + udp_len + 1, "{}", group);
        }
    }

    #[test]
    fn unspecified_source() {
        let contexts = ContextTable::new();
        let codec = codec(&contexts);
        let packet = datagram(Ipv6Address::UNSPECIFIED, Ipv6Address::LINK_LOCAL_ALL_NODES, (546, 547), b"dhcp");
        let compressed = roundtrip(&codec, &packet);
        assert_eq!(compressed.frame[1] & 0x70, 0x40);
    }

    #[test]
    fn checksum_inline_when_wrong() {
        let contexts = ContextTable::new();
        let codec = codec(&contexts);
        let mut packet = datagram(SRC.link_local(), DST.link_local(), (1000, 2000), b"bad");
        packet[46] ^= 0xff;
        let compressed = roundtrip(&codec, &packet);
        // Ports inline, checksum inline.
        assert_eq!(compressed.frame[2], 0xf0);
    }

    #[test]
    fn extension_headers() {
        let contexts = ContextTable::new();
        let codec = codec(&contexts);
        let inner = datagram(SRC.link_local(), DST.link_local(), (1000, 2000), b"ext");

        // Hop-by-hop with a PadN option, followed by the UDP header.
        let mut packet = inner[..40].to_vec();
        packet[6] = IpProtocol::HopByHop.into();
        packet.extend_from_slice(&[0x11, 0x00, 0x01, 0x04, 0, 0, 0, 0]);
        packet.extend_from_slice(&inner[40..]);
        let payload_len = (packet.len() - 40) as u16;
        ipv6_packet::new_unchecked_mut(&mut packet).set_payload_len(payload_len);

        let compressed = roundtrip(&codec, &packet);
        assert_eq!(compressed.header_len, 56);
        // IPHC, then hop-by-hop NHC with NH set.
        assert_eq!(compressed.frame[2], 0xe1);
    }

    #[test]
    fn long_extension_header_inline() {
        let contexts = ContextTable::new();
        let codec = codec(&contexts);
        let inner = datagram(SRC.link_local(), DST.link_local(), (1000, 2000), b"ext");

        // 264 octets of hop-by-hop, too long for the NHC length octet.
        let mut packet = inner[..40].to_vec();
        packet[6] = IpProtocol::HopByHop.into();
        packet.extend_from_slice(&[0x11, 32, 0x01, 255]);
        packet.extend_from_slice(&[0; 255]);
        packet.extend_from_slice(&[0x01, 3, 0, 0, 0]);
        packet.extend_from_slice(&inner[40..]);
        let payload_len = (packet.len() - 40) as u16;
        ipv6_packet::new_unchecked_mut(&mut packet).set_payload_len(payload_len);
        assert_eq!(packet.len(), 40 + 264 + 8 + 3);

        let compressed = roundtrip(&codec, &packet);
        assert_eq!(compressed.header_len, 40);
        // Next header inline, the extension header follows verbatim.
        assert_eq!(&compressed.frame[..4], &[0x7a, 0x33, 0x00, 0x11]);
    }

    #[test]
    fn fragment_header_reserved_kept() {
        let contexts = ContextTable::new();
        let codec = codec(&contexts);
        let inner = datagram(SRC.link_local(), DST.link_local(), (1000, 2000), b"ext");

        let mut packet = inner[..40].to_vec();
        packet[6] = IpProtocol::Ipv6Frag.into();
        packet.extend_from_slice(&[0x11, 0x00, 0x00, 0x00, 0xde, 0xad, 0xbe, 0xef]);
        packet.extend_from_slice(&inner[40..]);
        let payload_len = (packet.len() - 40) as u16;
        ipv6_packet::new_unchecked_mut(&mut packet).set_payload_len(payload_len);

        let compressed = roundtrip(&codec, &packet);
        assert_eq!(compressed.header_len, 56);

        // A set reserved octet stays inline with the rest of the header.
        packet[41] = 0x5a;
        let compressed = roundtrip(&codec, &packet);
        assert_eq!(compressed.header_len, 40);
        assert_eq!(&compressed.frame[2..5], &[0x2c, 0x11, 0x5a]);
    }

    #[test]
    fn mobility_not_compressed() {
        let contexts = ContextTable::new();
        let codec = codec(&contexts);
        let inner = datagram(SRC.link_local(), DST.link_local(), (1000, 2000), b"");

        let mut packet = inner[..40].to_vec();
        packet[6] = IpProtocol::Mobility.into();
        packet.extend_from_slice(&[0x3b, 0x00, 0, 0, 0, 0, 0, 0]);
        ipv6_packet::new_unchecked_mut(&mut packet).set_payload_len(8);

        let compressed = roundtrip(&codec, &packet);
        assert_eq!(compressed.header_len, 40);
    }

    #[test]
    fn mobility_violation() {
        let contexts = ContextTable::new();
        let codec = codec(&contexts);
        // IPHC with NH compressed, then a Mobility NHC.
        let frame = [0x7e, 0x33, 0xe8, 0x3b, 0x06, 0, 0, 0, 0, 0, 0];
        assert_eq!(
            codec.decompress(&frame, SRC, DST).unwrap_err(),
            Failure::Violation("mobility header is not supported"));
    }

    #[test]
    fn tunneled() {
        let contexts = ContextTable::new();
        let codec = codec(&contexts);
        let inner = datagram(
            Ipv6Address::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1),
            Ipv6Address::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 2),
            (1000, 2000),
            b"tunnel");

        let outer = Ipv6Repr {
            src_addr: SRC.link_local(),
            dst_addr: DST.link_local(),
            next_header: IpProtocol::Ipv6,
            payload_len: inner.len(),
            hop_limit: 255,
            traffic_class: 0,
            flow_label: 0,
        };
        let mut packet = vec![0; 40];
        outer.emit(ipv6_packet::new_unchecked_mut(&mut packet));
        packet.extend_from_slice(&inner);

        let compressed = roundtrip(&codec, &packet);
        assert_eq!(compressed.header_len, 88);
        assert_eq!(compressed.frame[2], 0xee);
    }

    #[test]
    fn traffic_class_and_flow_label() {
        let contexts = ContextTable::new();
        let codec = codec(&contexts);
        let mut packet = datagram(SRC.link_local(), DST.link_local(), (1000, 2000), b"tf");
        {
            let ip = ipv6_packet::new_unchecked_mut(&mut packet);
            ip.set_traffic_class(0xb9);
            ip.set_flow_label(0x12345);
            ip.set_hop_limit(17);
        }
        // Addresses and hop limit do not affect the UDP checksum.
        roundtrip(&codec, &packet);
    }

    #[test]
    fn hc1() {
        let contexts = ContextTable::new();
        let codec = Codec { use_iphc: false, ..codec(&contexts) };
        let global = Ipv6Address::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 7);
        let packet = datagram(SRC.link_local(), global, (1000, 2000), b"legacy");

        let compressed = codec.compress_hc1(&packet, SRC, DST).unwrap();
        assert_eq!(compressed.header_len, 40);
        // Source fully elided, destination inline, UDP encoded.
        assert_eq!(&compressed.frame[..3], &[0x42, 0xca, 64]);

        let headers = codec.decompress(&compressed.frame, SRC, DST).unwrap();
        let payload = &compressed.frame[headers.consumed()..];
        assert_eq!(headers.finish(payload, Checksum::Manual), packet);

        // The iphc receiver refuses it.
        let iphc = super::test::codec(&contexts);
        assert_eq!(
            iphc.decompress(&compressed.frame, SRC, DST).unwrap_err(),
            Failure::Drop(DropReason::DisallowedCompression));
    }

    #[test]
    fn bad_packet() {
        let contexts = ContextTable::new();
        let codec = codec(&contexts);
        assert_eq!(codec.compress_iphc(&[0x60; 20], SRC, DST).unwrap_err(), Error::BadSize);
        assert_eq!(codec.decompress(&[0x50, 0], SRC, DST).unwrap_err(), Failure::Drop(DropReason::UnknownExtension));
    }
}

/*! Low-level packet access and construction.

# An overview over packet representations

The `wire` module deals with the packet *representation*. It provides two levels of
functionality.

 * First, it provides functions to extract fields from sequences of octets, and to insert fields
   into sequences of octets. This happens in the lowercase structures e.g. [`ipv6_packet`] or
   [`udp_packet`].
 * Second, it provides a compact, high-level representation of header data that can be created from
   parsing and emitted into a sequence of octets. This happens through the `Repr` family of structs
   and enums, e.g. [`Ipv6Repr`] or the headers in [`sixlowpan`].

[`ipv6_packet`]: struct.ipv6_packet.html
[`udp_packet`]: struct.udp_packet.html
[`Ipv6Repr`]: struct.Ipv6Repr.html
[`sixlowpan`]: sixlowpan/index.html

The uncompressed headers (IPv6, its extension headers and UDP) are what the adaptation layer
accepts from and hands to the network layer. The [`sixlowpan`] module contains the compressed and
link-specific headers that only ever appear between two 6LoWPAN interfaces.

The `packet` family of data structures guarantees that, if the `packet::check_len()` method
returned `Ok(())`, then no field accessor or setter method will panic; however, the guarantee only
hold while specific fields are mutated, which are listed in the documentation for the specific
packet.

In the `Repr` family of data structures, the `Repr::parse()` method never panics and the
`Repr::emit()` method never panics as long as the underlying buffer is at least
`Repr::buffer_len()` octets long.

# Examples

To emit an IPv6 header into an octet buffer, and then parse it back:

```rust
use lowpan::wire::*;
let repr = Ipv6Repr {
    src_addr: Ipv6Address::new(0xfe80, 0, 0, 0, 0, 0, 0, 1),
    dst_addr: Ipv6Address::LINK_LOCAL_ALL_NODES,
    next_header: IpProtocol::Udp,
    payload_len: 10,
    hop_limit: 64,
    traffic_class: 0,
    flow_label: 0,
};
let mut buffer = vec![0; repr.buffer_len() + repr.payload_len];
{ // emission
    let packet = ipv6_packet::new_unchecked_mut(&mut buffer);
    repr.emit(packet);
}
{ // parsing
    let packet = ipv6_packet::new_checked(&buffer)
        .expect("truncated packet");
    let parsed = Ipv6Repr::parse(packet)
        .expect("malformed packet");
    assert_eq!(repr, parsed);
}
```
*/
// Copyright (C) 2016 whitequark@whitequark.org
// Copyright (C) 2019 Andreas Molzer <andreas.molzer@tum.de>
//
// in large parts from `smoltcp` originally distributed under 0-clause BSD
//
// Applies to files in this folder unless otherwise noted. These are:
// * `error.rs`
// * `ethernet.rs`
// * `ip.rs`
// * `ipv6.rs`
// * `mod.rs` (this file)
// * `udp.rs`

mod field {
    pub(crate) type Field = ::core::ops::Range<usize>;
    pub(crate) type Rest  = ::core::ops::RangeFrom<usize>;
}

mod ethernet;
mod error;
pub(crate) mod ip;
mod ipv6;
mod link;
mod udp;

pub mod ipv6ext;
pub mod sixlowpan;

/// Describes how to handle checksums.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Checksum {
    /// Checksum must be computed or checked manually.
    Manual,

    /// The checksum field is filled or checked by the NIC.
    Ignored,
}

pub use self::ethernet::{
    EtherType as EthernetProtocol,
    Address as EthernetAddress,
    ParseAddressError as EthernetParseError};

pub use self::error::{
    Error,
    Result};

pub use self::ip::Protocol as IpProtocol;

pub use self::ipv6::{
    InterfaceId,
    ipv6 as ipv6_packet,
    Address as Ipv6Address,
    Repr as Ipv6Repr,
    Subnet as Ipv6Subnet,
    HEADER_LEN as IPV6_HEADER_LEN,
    MIN_MTU as IPV6_MIN_MTU};

pub use self::ipv6ext::Repr as Ipv6ExtRepr;

pub use self::link::Address as LinkAddress;

pub use self::udp::{
    udp as udp_packet,
    Repr as UdpRepr,
    HEADER_LEN as UDP_HEADER_LEN};

impl Checksum {
    /// Check if a checksum should be calculated by the library.
    ///
    /// Otherwise it is ignored due to the assumption that it was offloaded or is otherwise
    /// undesirable to check.
    pub fn manual(self) -> bool {
        match self {
            Checksum::Manual => true,
            Checksum::Ignored => false,
        }
    }
}

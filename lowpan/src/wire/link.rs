//! Addresses of the links under the adaptation layer.
use core::{fmt, str::FromStr};

use super::{EthernetAddress, EthernetParseError, InterfaceId, Ipv6Address, Ipv6Subnet};
use super::ethernet::parse_octets;

/// A link layer address as handed to and from the lower device.
///
/// IEEE 802.15.4 knows 16-bit short and 64-bit extended addresses. Simulated links frequently use
/// 48-bit addresses instead which are handled as well. All three derive an IPv6 interface id in
/// the way [RFC 4944 § 6] and [RFC 2464 § 4] describe.
///
/// [RFC 4944 § 6]: https://tools.ietf.org/html/rfc4944#section-6
/// [RFC 2464 § 4]: https://tools.ietf.org/html/rfc2464#section-4
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum Address {
    /// A 16-bit short address.
    Short([u8; 2]),
    /// A 48-bit address.
    Ethernet(EthernetAddress),
    /// A 64-bit extended address.
    Extended([u8; 8]),
}

impl Address {
    /// The 16-bit broadcast address.
    pub const BROADCAST_SHORT: Address = Address::Short([0xff, 0xff]);

    /// Construct a short address from its numeric value.
    pub const fn short(value: u16) -> Self {
        Address::Short(value.to_be_bytes())
    }

    /// Construct an extended address from its numeric value.
    pub const fn extended(value: u64) -> Self {
        Address::Extended(value.to_be_bytes())
    }

    /// Return the address as a sequence of octets, in big-endian.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Address::Short(bytes) => bytes,
            Address::Ethernet(addr) => addr.as_bytes(),
            Address::Extended(bytes) => bytes,
        }
    }

    /// The interface id derived from this address.
    pub fn interface_id(&self) -> InterfaceId {
        match *self {
            Address::Short(bytes) => InterfaceId::from_short(bytes),
            Address::Ethernet(addr) => InterfaceId::from_vendor_ether(addr),
            Address::Extended(bytes) => InterfaceId::from_extended(bytes),
        }
    }

    /// The autoconfigured link-local address `fe80::/64` of this interface.
    pub fn link_local(&self) -> Ipv6Address {
        Ipv6Address::from_link_local_id(self.interface_id())
    }

    /// The autoconfigured address within a prefix.
    ///
    /// Bits covered by the prefix are taken from the prefix, all others from the interface id.
    pub fn autoconfigured(&self, prefix: Ipv6Subnet) -> Ipv6Address {
        Ipv6Address::from_prefix_and_id(prefix, self.interface_id())
    }

    /// Convert to an address that fits the mesh addressing header.
    ///
    /// Short and extended addresses are kept. A 48-bit address is reduced to its last two octets
    /// with the multicast and broadcast status preserved, the way 16-bit addresses encode it.
    pub fn to_mesh(&self) -> Address {
        match *self {
            Address::Ethernet(addr) if addr.is_broadcast() => Address::BROADCAST_SHORT,
            Address::Ethernet(addr) if addr.is_multicast() => {
                let bytes = addr.as_bytes();
                Address::Short([0x80 | (bytes[4] & 0x1f), bytes[5]])
            },
            Address::Ethernet(addr) => {
                let bytes = addr.as_bytes();
                // Keep it out of the multicast range.
                Address::Short([bytes[4] & 0x7f, bytes[5]])
            },
            other => other,
        }
    }

    /// Query whether this is a broadcast address.
    pub fn is_broadcast(&self) -> bool {
        match self {
            Address::Short(bytes) => *bytes == [0xff, 0xff],
            Address::Ethernet(addr) => addr.is_broadcast(),
            Address::Extended(_) => false,
        }
    }

    /// Query whether this is a multicast address.
    ///
    /// Short addresses reserve `0x8000..=0x9fff` for multicast, see [RFC 4944 § 9].
    ///
    /// [RFC 4944 § 9]: https://tools.ietf.org/html/rfc4944#section-9
    pub fn is_multicast(&self) -> bool {
        match self {
            Address::Short(bytes) => bytes[0] & 0xe0 == 0x80,
            Address::Ethernet(addr) => addr.is_multicast() && !addr.is_broadcast(),
            Address::Extended(_) => false,
        }
    }
}

impl From<EthernetAddress> for Address {
    fn from(addr: EthernetAddress) -> Self {
        Address::Ethernet(addr)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Address::Ethernet(addr) => write!(f, "{}", addr),
            other => {
                for (i, byte) in other.as_bytes().iter().enumerate() {
                    if i > 0 {
                        f.write_str(":")?;
                    }
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            },
        }
    }
}

/// Parses the colon separated octets of any of the address kinds, told apart by their count.
impl FromStr for Address {
    type Err = EthernetParseError;

    fn from_str(src: &str) -> core::result::Result<Self, EthernetParseError> {
        match src.split(':').count() {
            2 => {
                let mut short = [0; 2];
                parse_octets(src, &mut short)?;
                Ok(Address::Short(short))
            },
            6 => src.parse().map(Address::Ethernet),
            8 => {
                let mut extended = [0; 8];
                parse_octets(src, &mut extended)?;
                Ok(Address::Extended(extended))
            },
            _ => Err(EthernetParseError::Separator),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn short_link_local() {
        let addr = Address::short(0x0001);
        assert_eq!(addr.link_local(), Ipv6Address::new(0xfe80, 0, 0, 0, 0, 0x00ff, 0xfe00, 0x0001));
    }

    #[test]
    fn ethernet_link_local() {
        let addr = Address::Ethernet(EthernetAddress([0, 0, 0, 0, 0, 1]));
        assert_eq!(addr.link_local(), Ipv6Address::new(0xfe80, 0, 0, 0, 0x0200, 0x00ff, 0xfe00, 0x0001));
    }

    #[test]
    fn extended_link_local() {
        let addr = Address::extended(0x0011_2233_4455_6677);
        assert_eq!(addr.link_local(), Ipv6Address::new(0xfe80, 0, 0, 0, 0x0211, 0x2233, 0x4455, 0x6677));
    }

    #[test]
    fn autoconfigured_in_prefix() {
        let prefix = Ipv6Subnet::new(Ipv6Address::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0), 64);
        let addr = Address::short(0x1234);
        assert_eq!(addr.autoconfigured(prefix), Ipv6Address::new(0x2001, 0xdb8, 0, 0, 0, 0x00ff, 0xfe00, 0x1234));
    }

    #[test]
    fn mesh_conversion() {
        let unicast = Address::Ethernet(EthernetAddress([0, 0, 0, 0, 0x12, 0x34]));
        assert_eq!(unicast.to_mesh(), Address::short(0x1234));
        assert!(!unicast.to_mesh().is_multicast());

        let high = Address::Ethernet(EthernetAddress([0, 0, 0, 0, 0xff, 0x34]));
        assert_eq!(high.to_mesh(), Address::short(0x7f34));

        let multicast = Address::Ethernet(EthernetAddress([0x33, 0x33, 0, 0, 0x00, 0x01]));
        assert!(multicast.to_mesh().is_multicast());
        assert_eq!(multicast.to_mesh(), Address::short(0x8001));

        let broadcast = Address::Ethernet(EthernetAddress::BROADCAST);
        assert_eq!(broadcast.to_mesh(), Address::BROADCAST_SHORT);
        assert!(Address::BROADCAST_SHORT.is_broadcast());

        let extended = Address::extended(7);
        assert_eq!(extended.to_mesh(), extended);
    }

    #[test]
    fn display() {
        assert_eq!(format!("{}", Address::short(0xab01)), "ab:01");
        assert_eq!(format!("{}", Address::extended(1)), "00:00:00:00:00:00:00:01");
    }

    #[test]
    fn parse() {
        assert_eq!("ab:01".parse(), Ok(Address::short(0xab01)));
        assert_eq!("00:00:00:00:00:00:00:01".parse(), Ok(Address::extended(1)));
        assert_eq!("02:00:00:00:00:01".parse(), Ok(Address::Ethernet(EthernetAddress([2, 0, 0, 0, 0, 1]))));
        assert_eq!("01:02:03".parse::<Address>(), Err(EthernetParseError::Separator));
        assert_eq!("ab:zz".parse::<Address>(), Err(EthernetParseError::Component));
    }
}

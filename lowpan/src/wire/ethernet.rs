use core::{fmt, str::FromStr};

use thiserror::Error;

enum_with_unknown! {
    /// Link layer protocol type.
    ///
    /// The adaptation layer hands every frame to the lower device tagged with one of these, and
    /// receives them tagged with whatever the peer used.
    pub enum EtherType(u16) {
        Ipv6 = 0x86DD,
        /// The protocol number registered for 6LoWPAN frames on links that carry a type field.
        SixLowPan = 0xA0ED,
    }
}

impl fmt::Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EtherType::Ipv6 => write!(f, "IPv6"),
            EtherType::SixLowPan => write!(f, "6LoWPAN"),
            EtherType::Unknown(id) => write!(f, "0x{:04x}", id)
        }
    }
}

/// A six-octet IEEE 802 address.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Address(pub [u8; 6]);

impl Address {
    /// The broadcast address.
    pub const BROADCAST: Address = Address([0xff; 6]);

    /// Construct an Ethernet address from a sequence of octets, in big-endian.
    ///
    /// # Panics
    /// The function panics if `data` is not six octets long.
    pub fn from_bytes(data: &[u8]) -> Address {
        let mut bytes = [0; 6];
        bytes.copy_from_slice(data);
        Address(bytes)
    }

    /// Return an Ethernet address as a sequence of octets, in big-endian.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Query whether the address is an unicast address.
    pub fn is_unicast(&self) -> bool {
        !(self.is_broadcast() ||
          self.is_multicast())
    }

    /// Query whether this address is the broadcast address.
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Query whether the "multicast" bit in the OUI is set.
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    /// Query whether the "locally administered" bit in the OUI is set.
    pub fn is_local(&self) -> bool {
        self.0[0] & 0x02 != 0
    }
}

/// The error of parsing an address from its colon separated text form.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ParseAddressError {
    /// A component was not a hexadecimal octet.
    #[error("invalid address component")]
    Component,
    /// There were too few or too many components.
    #[error("unexpected number of address components")]
    Separator,
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bytes = self.0;
        write!(f, "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
               bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5])
    }
}

impl FromStr for Address {
    type Err = ParseAddressError;

    fn from_str(src: &str) -> core::result::Result<Self, ParseAddressError> {
        let mut parsed = [0; 6];
        parse_octets(src, &mut parsed)?;
        Ok(Address(parsed))
    }
}

/// Parse exactly `into.len()` colon separated hexadecimal octets.
pub(crate) fn parse_octets(src: &str, into: &mut [u8]) -> core::result::Result<(), ParseAddressError> {
    let mut components = src.split(':');
    for c in into.iter_mut() {
        let part = components
            .next()
            .ok_or(ParseAddressError::Separator)?;
        *c = u8::from_str_radix(part, 16)
            .map_err(|_| ParseAddressError::Component)?;
    }

    if components.next().is_some() {
        Err(ParseAddressError::Separator)
    } else {
        Ok(())
    }
}

//! The mesh addressing header, [RFC 4944 § 5.2].
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |1 0|V|F|HopsLft| [Deep Hops]   | originator address, final address
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! `V` and `F` are set when the originator or final destination, respectively, is a 16-bit short
//! address. A hops left value of `0xF` announces an additional octet with the real count.
//!
//! [RFC 4944 § 5.2]: https://tools.ietf.org/html/rfc4944#section-5.2
use crate::wire::{Error, LinkAddress, Result};

mod field {
    pub(crate) const DISPATCH: usize = 0;
    pub(crate) const DEEP_HOPS: usize = 1;
}

const DISPATCH_MASK: u8 = 0xc0;
const DISPATCH_VALUE: u8 = 0x80;
const ORIGINATOR_SHORT: u8 = 0x20;
const FINAL_SHORT: u8 = 0x10;
const HOPS_MASK: u8 = 0x0f;

/// A high-level representation of a mesh addressing header.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Repr {
    /// The number of hops the frame may still be forwarded.
    pub hops_left: u8,
    /// The node that introduced the frame into the mesh.
    pub originator: LinkAddress,
    /// The node that the frame is meant for.
    pub final_destination: LinkAddress,
}

impl Repr {
    /// Parse a mesh header from the front of a buffer.
    ///
    /// Returns the header and the number of octets it occupied. A hops left count below 15 may
    /// still arrive in the deep octet, so this can differ from `buffer_len`.
    pub fn parse(buffer: &[u8]) -> Result<(Self, usize)> {
        let dispatch = *buffer.get(field::DISPATCH).ok_or(Error::Truncated)?;
        if dispatch & DISPATCH_MASK != DISPATCH_VALUE {
            return Err(Error::Unrecognized);
        }

        let mut offset = field::DEEP_HOPS;
        let hops_left = match dispatch & HOPS_MASK {
            HOPS_MASK => {
                offset += 1;
                *buffer.get(field::DEEP_HOPS).ok_or(Error::Truncated)?
            },
            hops => hops,
        };

        let originator = read_address(buffer, &mut offset, dispatch & ORIGINATOR_SHORT != 0)?;
        let final_destination = read_address(buffer, &mut offset, dispatch & FINAL_SHORT != 0)?;

        let repr = Repr {
            hops_left,
            originator,
            final_destination,
        };
        Ok((repr, offset))
    }

    /// Return the length of the header that will be emitted.
    pub fn buffer_len(&self) -> usize {
        let deep = if self.hops_left >= HOPS_MASK { 1 } else { 0 };
        1 + deep
            + self.originator.to_mesh().as_bytes().len()
            + self.final_destination.to_mesh().as_bytes().len()
    }

    /// Emit the header into the first `buffer_len` octets of a buffer.
    ///
    /// 48-bit addresses are reduced to short addresses, see [`LinkAddress::to_mesh`].
    ///
    /// [`LinkAddress::to_mesh`]: ../../enum.LinkAddress.html#method.to_mesh
    pub fn emit(&self, buffer: &mut [u8]) {
        let originator = self.originator.to_mesh();
        let final_destination = self.final_destination.to_mesh();

        let mut dispatch = DISPATCH_VALUE;
        if let LinkAddress::Short(_) = originator {
            dispatch |= ORIGINATOR_SHORT;
        }
        if let LinkAddress::Short(_) = final_destination {
            dispatch |= FINAL_SHORT;
        }

        let mut offset = field::DEEP_HOPS;
        if self.hops_left >= HOPS_MASK {
            dispatch |= HOPS_MASK;
            buffer[field::DEEP_HOPS] = self.hops_left;
            offset += 1;
        } else {
            dispatch |= self.hops_left;
        }
        buffer[field::DISPATCH] = dispatch;

        for addr in [originator, final_destination] {
            let bytes = addr.as_bytes();
            buffer[offset..offset + bytes.len()].copy_from_slice(bytes);
            offset += bytes.len();
        }
    }
}

fn read_address(buffer: &[u8], offset: &mut usize, short: bool) -> Result<LinkAddress> {
    let len = if short { 2 } else { 8 };
    let bytes = buffer.get(*offset..*offset + len).ok_or(Error::Truncated)?;
    *offset += len;
    Ok(if short {
        LinkAddress::Short([bytes[0], bytes[1]])
    } else {
        let mut ext = [0; 8];
        ext.copy_from_slice(bytes);
        LinkAddress::Extended(ext)
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::wire::EthernetAddress;

    static SHORT_MESH: [u8; 5] = [0xba, 0x00, 0x01, 0xff, 0xff];

    static DEEP_MESH: [u8; 12] = [
        0xaf, 0x20,
        0x00, 0x01,
        0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77,
    ];

    #[test]
    fn parse_short() {
        let (repr, len) = Repr::parse(&SHORT_MESH).unwrap();
        assert_eq!(len, SHORT_MESH.len());
        assert_eq!(repr, Repr {
            hops_left: 10,
            originator: LinkAddress::short(1),
            final_destination: LinkAddress::BROADCAST_SHORT,
        });
        assert_eq!(repr.buffer_len(), SHORT_MESH.len());
    }

    #[test]
    fn deep_hops() {
        let repr = Repr {
            hops_left: 0x20,
            originator: LinkAddress::short(1),
            final_destination: LinkAddress::extended(0x0011_2233_4455_6677),
        };
        let mut bytes = [0; 12];
        assert_eq!(repr.buffer_len(), 12);
        repr.emit(&mut bytes);
        assert_eq!(bytes, DEEP_MESH);
        assert_eq!(Repr::parse(&bytes), Ok((repr, bytes.len())));
    }

    #[test]
    fn fifteen_hops_use_deep_octet() {
        let repr = Repr {
            hops_left: 15,
            originator: LinkAddress::short(1),
            final_destination: LinkAddress::short(2),
        };
        let mut bytes = vec![0; repr.buffer_len()];
        repr.emit(&mut bytes);
        assert_eq!(bytes, [0xbf, 15, 0, 1, 0, 2]);
        assert_eq!(Repr::parse(&bytes), Ok((repr, bytes.len())));
    }

    #[test]
    fn ethernet_reduced() {
        let repr = Repr {
            hops_left: 3,
            originator: EthernetAddress([0, 0, 0, 0, 0, 5]).into(),
            final_destination: EthernetAddress::BROADCAST.into(),
        };
        let mut bytes = vec![0; repr.buffer_len()];
        repr.emit(&mut bytes);
        assert_eq!(bytes, [0xb3, 0x00, 0x05, 0xff, 0xff]);
    }

    #[test]
    fn truncated() {
        assert_eq!(Repr::parse(&SHORT_MESH[..4]), Err(Error::Truncated));
        assert_eq!(Repr::parse(&[]), Err(Error::Truncated));
        assert_eq!(Repr::parse(&[0x41]), Err(Error::Unrecognized));
    }

    #[test]
    fn few_hops_in_deep_octet() {
        let (repr, len) = Repr::parse(&[0xbf, 3, 0, 1, 0, 2]).unwrap();
        assert_eq!(len, 6);
        assert_eq!(repr, Repr {
            hops_left: 3,
            originator: LinkAddress::short(1),
            final_destination: LinkAddress::short(2),
        });
        // Emitted in the short form again.
        assert_eq!(repr.buffer_len(), 5);
    }
}

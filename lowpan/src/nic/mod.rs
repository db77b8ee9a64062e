//! Encapsulates the link layer device below the adaptation layer.
//!
//! The adaptation layer does not talk to a radio directly. It hands complete link frames to a
//! [`Device`] together with the link addresses and a protocol number, and it gets handed received
//! frames in the same shape. Which medium carries them is none of its business.
//!
//! The included [`Loopback`] device stores every frame it is asked to send, which is enough to
//! connect two adaptation layers in tests or in a simulation host.
//!
//! [`Device`]: trait.Device.html
//! [`Loopback`]: loopback/struct.Loopback.html
pub mod loopback;

use crate::layer::Result;
use crate::wire::LinkAddress;

pub use self::loopback::Loopback;

/// How a received frame was addressed on the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    /// Addressed to this device.
    Host,
    /// Addressed to the link broadcast address.
    Broadcast,
    /// Addressed to a link multicast group.
    Multicast,
    /// Addressed to another device, seen in promiscuous mode.
    OtherHost,
}

/// A link layer device.
pub trait Device {
    /// The link address of this device.
    fn address(&self) -> LinkAddress;

    /// The link broadcast address.
    fn broadcast(&self) -> LinkAddress;

    /// The largest frame that can be sent in one piece.
    fn mtu(&self) -> u16;

    /// If frames can be sent with a source address other than our own.
    fn supports_send_from(&self) -> bool;

    /// Transmit a frame from our own address.
    ///
    /// An error indicates that the device refused the frame. It has not been sent in this case.
    fn send(&mut self, frame: &[u8], dst: LinkAddress, protocol: u16) -> Result<()>;

    /// Transmit a frame with an explicit source address.
    fn send_from(&mut self, frame: &[u8], src: LinkAddress, dst: LinkAddress, protocol: u16)
        -> Result<()>;
}

impl<D: Device + ?Sized> Device for &'_ mut D {
    fn address(&self) -> LinkAddress {
        (**self).address()
    }

    fn broadcast(&self) -> LinkAddress {
        (**self).broadcast()
    }

    fn mtu(&self) -> u16 {
        (**self).mtu()
    }

    fn supports_send_from(&self) -> bool {
        (**self).supports_send_from()
    }

    fn send(&mut self, frame: &[u8], dst: LinkAddress, protocol: u16) -> Result<()> {
        (**self).send(frame, dst, protocol)
    }

    fn send_from(&mut self, frame: &[u8], src: LinkAddress, dst: LinkAddress, protocol: u16)
        -> Result<()>
    {
        (**self).send_from(frame, src, dst, protocol)
    }
}

//! Implementation of a software loop-back device.
use std::collections::VecDeque;

use crate::layer::{Error, Result};
use crate::wire::{EthernetProtocol, LinkAddress};

use super::{Device, PacketType};

/// A software loop-back device.
///
/// Maintains a queue of the frames sent through it. A host can pop them and deliver them to
/// another adaptation layer, or inspect them in a test.
#[derive(Debug)]
pub struct Loopback {
    address: LinkAddress,
    broadcast: LinkAddress,
    mtu: u16,
    send_from: bool,
    refuse: bool,
    sent: VecDeque<Frame>,
}

/// One frame handed to the device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// The frame contents.
    pub payload: Vec<u8>,
    /// The link source.
    pub src: LinkAddress,
    /// The link destination.
    pub dst: LinkAddress,
    /// The protocol number it was sent with.
    pub protocol: u16,
}

impl Loopback {
    /// Create a loop-back device with a link address and mtu.
    ///
    /// The broadcast address is chosen to match the kind of link address.
    pub fn new(address: LinkAddress, mtu: u16) -> Self {
        let broadcast = match address {
            LinkAddress::Ethernet(_) => LinkAddress::Ethernet(crate::wire::EthernetAddress::BROADCAST),
            _ => LinkAddress::BROADCAST_SHORT,
        };

        Loopback {
            address,
            broadcast,
            mtu,
            send_from: true,
            refuse: false,
            sent: VecDeque::new(),
        }
    }

    /// Choose if `send_from` is supported.
    pub fn set_supports_send_from(&mut self, supported: bool) {
        self.send_from = supported;
    }

    /// Make the device refuse all frames, as if its queue was full.
    pub fn set_refuse(&mut self, refuse: bool) {
        self.refuse = refuse;
    }

    /// Take the oldest frame that was sent.
    pub fn pop(&mut self) -> Option<Frame> {
        self.sent.pop_front()
    }

    /// Take all frames that were sent, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item=Frame> + '_ {
        self.sent.drain(..)
    }

    /// The frames sent and not yet taken.
    pub fn sent(&self) -> impl Iterator<Item=&Frame> + '_ {
        self.sent.iter()
    }

    /// How a frame with this destination is seen by a device with our address.
    pub fn packet_type(&self, dst: LinkAddress) -> PacketType {
        if dst == self.address {
            PacketType::Host
        } else if dst == self.broadcast || dst.is_broadcast() {
            PacketType::Broadcast
        } else if dst.is_multicast() {
            PacketType::Multicast
        } else {
            PacketType::OtherHost
        }
    }

    fn push(&mut self, frame: &[u8], src: LinkAddress, dst: LinkAddress, protocol: u16) -> Result<()> {
        if self.refuse {
            return Err(Error::Illegal);
        }

        // A device with an mtu would not accept larger frames.
        if frame.len() > usize::from(self.mtu) {
            return Err(Error::BadSize);
        }

        net_trace!("loopback: {} octets {} -> {} {}", frame.len(), src, dst, EthernetProtocol::from(protocol));
        self.sent.push_back(Frame {
            payload: frame.to_vec(),
            src,
            dst,
            protocol,
        });
        Ok(())
    }
}

impl Device for Loopback {
    fn address(&self) -> LinkAddress {
        self.address
    }

    fn broadcast(&self) -> LinkAddress {
        self.broadcast
    }

    fn mtu(&self) -> u16 {
        self.mtu
    }

    fn supports_send_from(&self) -> bool {
        self.send_from
    }

    fn send(&mut self, frame: &[u8], dst: LinkAddress, protocol: u16) -> Result<()> {
        let src = self.address;
        self.push(frame, src, dst, protocol)
    }

    fn send_from(&mut self, frame: &[u8], src: LinkAddress, dst: LinkAddress, protocol: u16)
        -> Result<()>
    {
        if !self.send_from {
            return Err(Error::Illegal);
        }
        self.push(frame, src, dst, protocol)
    }
}

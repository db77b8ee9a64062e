//! The 6LoWPAN adaptation layer.
//!
//! An [`Endpoint`] wraps a lower link [`Device`] and offers an IPv6-capable device on top of it.
//! Outgoing datagrams are compressed, optionally wrapped in a mesh header and fragmented to fit
//! the link. Received frames are unwrapped, reassembled and decompressed before being handed to a
//! [`Recv`] handler.
//!
//! ## Compression contexts
//!
//! Stateful address compression refers to prefixes shared out of band between all nodes of a
//! network. They are managed on the endpoint with [`add_context`], [`renew_context`],
//! [`invalidate_context`] and [`remove_context`]. An invalidated context is no longer used for
//! compression but packets referring to it are still decompressed until it expires.
//!
//! ## Sending
//!
//! ```
//! use lowpan::layer::lowpan::{Config, Endpoint};
//! use lowpan::nic::Loopback;
//! use lowpan::time::Instant;
//! use lowpan::wire::{IpProtocol, Ipv6Repr, LinkAddress, ipv6_packet};
//!
//! let nic = Loopback::new(LinkAddress::short(1), 127);
//! let mut endpoint = Endpoint::new(nic, Config::default());
//!
//! let dst = LinkAddress::short(2);
//! let repr = Ipv6Repr {
//!     src_addr: LinkAddress::short(1).link_local(),
//!     dst_addr: dst.link_local(),
//!     next_header: IpProtocol::Ipv6NoNxt,
//!     payload_len: 0,
//!     hop_limit: 64,
//!     traffic_class: 0,
//!     flow_label: 0,
//! };
//! let mut packet = vec![0; 40];
//! repr.emit(ipv6_packet::new_unchecked_mut(&mut packet));
//!
//! endpoint.send(&packet, dst, Instant::ZERO).unwrap();
//! // All of the header could be compressed.
//! assert_eq!(endpoint.lower_mut().pop().unwrap().payload, [0x7a, 0x33, 0x3b]);
//! ```
//!
//! ## Receiving
//!
//! Frames from the lower device are passed to [`receive`] together with a handler. The handler is
//! called synchronously for every datagram that is complete with that frame. Frames that only
//! contribute a fragment are buffered.
//!
//! ## Timers
//!
//! Two kinds of work are delayed: fragment buffers expire if their datagram is not completed in
//! time, and frames forwarded under the mesh-under scheme are sent after a random jitter. Call
//! [`poll`] at the instant reported by [`poll_at`] to perform them.
//!
//! [`Endpoint`]: struct.Endpoint.html
//! [`Device`]: ../../nic/trait.Device.html
//! [`Recv`]: trait.Recv.html
//! [`add_context`]: struct.Endpoint.html#method.add_context
//! [`renew_context`]: struct.Endpoint.html#method.renew_context
//! [`invalidate_context`]: struct.Endpoint.html#method.invalidate_context
//! [`remove_context`]: struct.Endpoint.html#method.remove_context
//! [`receive`]: struct.Endpoint.html#method.receive
//! [`poll`]: struct.Endpoint.html#method.poll
//! [`poll_at`]: struct.Endpoint.html#method.poll_at
use rand::Rng;
use rand::distributions::{Distribution, Uniform};
use thiserror::Error;

use crate::layer::FnHandler;
use crate::nic::PacketType;
use crate::time::Duration;
use crate::wire::{Checksum, LinkAddress};

mod compress;
mod context;
mod endpoint;
mod fragment;
mod mesh;


pub use self::context::{Context, ContextTable, MAX_CONTEXT_ID};
pub use self::endpoint::Endpoint;

/// The protocol number of 6LoWPAN frames on the lower device.
pub const PROTOCOL: u16 = 0xa0ed;

/// The protocol number of delivered IPv6 datagrams.
pub const IPV6_PROTOCOL: u16 = 0x86dd;

/// Configuration of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Compress with IPHC, or with HC1 when `false`.
    pub use_iphc: bool,
    /// Elide UDP checksums when compressing with IPHC.
    pub omit_udp_checksum: bool,
    /// How many datagrams may be reassembled at once, zero for no limit.
    pub fragment_reassembly_list_size: usize,
    /// How long an incomplete datagram is kept.
    pub fragment_expiration_timeout: Duration,
    /// Compressed packets shorter than this are sent uncompressed instead.
    pub compression_threshold: usize,
    /// Hand frames to the lower device with `ether_type` instead of the 6LoWPAN protocol number.
    pub force_ether_type: bool,
    /// The protocol number used with `force_ether_type`.
    pub ether_type: u16,
    /// Flood all frames with mesh and broadcast headers.
    pub use_mesh_under: bool,
    /// The hops left of flooded frames.
    pub mesh_under_radius: u8,
    /// How many sequence numbers are remembered per originator.
    pub mesh_cache_length: usize,
    /// The delay before forwarding a flooded frame.
    pub mesh_under_jitter: Jitter,
    /// If UDP checksums are computed and verified.
    pub checksum: Checksum,
    /// What to do when a peer violates the protocol.
    pub violation_policy: ViolationPolicy,
    /// Seed of the generator for datagram tags and jitter.
    pub seed: u64,
}

/// A uniform delay range, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Jitter {
    /// The shortest delay.
    pub min_millis: u64,
    /// The longest delay, inclusive.
    pub max_millis: u64,
}

/// The reaction to a protocol violation by a peer.
///
/// Violations are overlapping fragments that are not duplicates, and compressed Mobility headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationPolicy {
    /// Panic.
    Abort,
    /// Drop the offending frame with [`DropReason::UnknownExtension`].
    ///
    /// [`DropReason::UnknownExtension`]: enum.DropReason.html#variant.UnknownExtension
    Drop,
}

/// Why a received frame was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum DropReason {
    /// The datagram was not completed in time.
    #[error("fragment timeout")]
    FragmentTimeout,
    /// The datagram was evicted to make room for another.
    #[error("fragment buffer full")]
    FragmentBufferFull,
    /// A header could not be understood.
    #[error("unknown extension")]
    UnknownExtension,
    /// The frame was compressed with the scheme that is not configured.
    #[error("disallowed compression")]
    DisallowedCompression,
    /// A compression context is missing or expired.
    #[error("stateful decompression problem")]
    StatefulDecompressionProblem,
}

/// Observer of the frames passing through an endpoint.
///
/// All methods default to doing nothing.
pub trait Trace {
    /// A frame is sent, before a mesh header is added.
    fn tx(&mut self, frame: &[u8]) {
        let _ = frame;
    }

    /// A frame was received from the lower device.
    fn rx(&mut self, frame: &[u8]) {
        let _ = frame;
    }

    /// Received data was dropped.
    fn dropped(&mut self, reason: DropReason, data: &[u8]) {
        let _ = (reason, data);
    }
}

impl Trace for () { }

impl<T: Trace + ?Sized> Trace for &'_ mut T {
    fn tx(&mut self, frame: &[u8]) {
        (**self).tx(frame)
    }

    fn rx(&mut self, frame: &[u8]) {
        (**self).rx(frame)
    }

    fn dropped(&mut self, reason: DropReason, data: &[u8]) {
        (**self).dropped(reason, data)
    }
}

/// A frame handed over by the lower device.
#[derive(Debug, Clone, Copy)]
pub struct Incoming<'a> {
    /// The frame contents.
    pub payload: &'a [u8],
    /// The link source.
    pub src: LinkAddress,
    /// The link destination.
    pub dst: LinkAddress,
    /// How the lower device saw the frame addressed.
    pub packet_type: PacketType,
}

/// A received IPv6 datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// The complete datagram.
    pub payload: Vec<u8>,
    /// Always the IPv6 protocol number.
    pub protocol: u16,
    /// The link source, the originator for frames received under mesh-under.
    pub src: LinkAddress,
    /// The link destination, the final destination for frames received under mesh-under.
    pub dst: LinkAddress,
    /// How the lower device saw the frame addressed.
    pub packet_type: PacketType,
}

/// The upper layer receiving datagrams.
pub trait Recv {
    /// Receive a datagram.
    fn receive(&mut self, delivery: Delivery);

    /// Observe a datagram in promiscuous mode, before it is received.
    fn receive_promiscuous(&mut self, delivery: &Delivery) {
        let _ = delivery;
    }
}

impl<F: FnMut(Delivery)> Recv for FnHandler<F> {
    fn receive(&mut self, delivery: Delivery) {
        self.0(delivery)
    }
}

impl<R: Recv + ?Sized> Recv for &'_ mut R {
    fn receive(&mut self, delivery: Delivery) {
        (**self).receive(delivery)
    }

    fn receive_promiscuous(&mut self, delivery: &Delivery) {
        (**self).receive_promiscuous(delivery)
    }
}

impl Config {
    /// Choose between IPHC and HC1.
    pub fn with_iphc(self, use_iphc: bool) -> Self {
        Config { use_iphc, ..self }
    }

    /// Choose if UDP checksums are elided.
    pub fn with_omit_udp_checksum(self, omit_udp_checksum: bool) -> Self {
        Config { omit_udp_checksum, ..self }
    }

    /// Limit the number of concurrently reassembled datagrams.
    pub fn with_fragment_reassembly_list_size(self, fragment_reassembly_list_size: usize) -> Self {
        Config { fragment_reassembly_list_size, ..self }
    }

    /// Set the lifetime of incomplete datagrams.
    pub fn with_fragment_expiration_timeout(self, fragment_expiration_timeout: Duration) -> Self {
        Config { fragment_expiration_timeout, ..self }
    }

    /// Set the size below which packets are not compressed.
    pub fn with_compression_threshold(self, compression_threshold: usize) -> Self {
        Config { compression_threshold, ..self }
    }

    /// Send frames with an explicit protocol number.
    pub fn with_ether_type(self, ether_type: u16) -> Self {
        Config { force_ether_type: true, ether_type, ..self }
    }

    /// Choose if frames are flooded with mesh-under.
    pub fn with_mesh_under(self, use_mesh_under: bool) -> Self {
        Config { use_mesh_under, ..self }
    }

    /// Set the hops left of flooded frames.
    pub fn with_mesh_under_radius(self, mesh_under_radius: u8) -> Self {
        Config { mesh_under_radius, ..self }
    }

    /// Set how many sequence numbers are remembered per originator.
    pub fn with_mesh_cache_length(self, mesh_cache_length: usize) -> Self {
        Config { mesh_cache_length, ..self }
    }

    /// Set the forwarding delay of flooded frames.
    pub fn with_mesh_under_jitter(self, mesh_under_jitter: Jitter) -> Self {
        Config { mesh_under_jitter, ..self }
    }

    /// Choose if UDP checksums are computed and verified.
    pub fn with_checksum(self, checksum: Checksum) -> Self {
        Config { checksum, ..self }
    }

    /// Choose the reaction to protocol violations.
    pub fn with_violation_policy(self, violation_policy: ViolationPolicy) -> Self {
        Config { violation_policy, ..self }
    }

    /// Seed the random generator.
    pub fn with_seed(self, seed: u64) -> Self {
        Config { seed, ..self }
    }

    /// The protocol number of sent frames.
    pub fn protocol(&self) -> u16 {
        if self.force_ether_type {
            self.ether_type
        } else {
            PROTOCOL
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            use_iphc: true,
            omit_udp_checksum: true,
            fragment_reassembly_list_size: 0,
            fragment_expiration_timeout: Duration::from_secs(60),
            compression_threshold: 0,
            force_ether_type: false,
            ether_type: 0xffff,
            use_mesh_under: false,
            mesh_under_radius: 10,
            mesh_cache_length: 10,
            mesh_under_jitter: Jitter { min_millis: 0, max_millis: 10 },
            checksum: Checksum::Manual,
            violation_policy: ViolationPolicy::Abort,
            seed: 0,
        }
    }
}

impl Jitter {
    /// No delay at all.
    pub const NONE: Jitter = Jitter { min_millis: 0, max_millis: 0 };

    /// Draw a delay.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let (low, high) = if self.min_millis <= self.max_millis {
            (self.min_millis, self.max_millis)
        } else {
            (self.max_millis, self.min_millis)
        };
        Duration::from_millis(Uniform::new_inclusive(low, high).sample(rng))
    }
}

use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;

use crate::layer::{Error, FnHandler, Result};
use crate::nic::Device;
use crate::time::{Duration, Expiration, Instant};
use crate::wire::{Ipv6Subnet, LinkAddress, IPV6_MIN_MTU};
use crate::wire::sixlowpan::{frag, mesh, Bc0Repr, Dispatch};

use super::compress::{self, Codec, Compressed, Failure};
use super::context::{Context, ContextTable};
use super::fragment::{self, Key, Reassembly, Refused};
use super::mesh::{Forwards, SeenCache};
use super::{Config, Delivery, DropReason, Incoming, Recv, Trace, ViolationPolicy, IPV6_PROTOCOL};

/// A 6LoWPAN adaptation layer on top of a link device.
///
/// Owns the lower device, the compression contexts, the buffers of datagrams being reassembled
/// and the state of mesh-under flooding. All operations are synchronous; work that has to wait
/// is performed by [`poll`].
///
/// [`poll`]: #method.poll
pub struct Endpoint<D, T = ()> {
    lower: D,
    config: Config,
    contexts: ContextTable,
    reassembly: Reassembly,
    seen: SeenCache,
    forwards: Forwards,
    /// The broadcast sequence number of the next flooded frame.
    bc0_sequence: u8,
    rng: StdRng,
    trace: T,
}

impl<D: Device> Endpoint<D> {
    /// Create an endpoint on a lower device.
    pub fn new(lower: D, config: Config) -> Self {
        Endpoint {
            lower,
            config,
            contexts: ContextTable::new(),
            reassembly: Reassembly::new(
                config.fragment_reassembly_list_size,
                config.fragment_expiration_timeout),
            seen: SeenCache::new(config.mesh_cache_length),
            forwards: Forwards::default(),
            bc0_sequence: 0,
            rng: StdRng::seed_from_u64(config.seed),
            trace: (),
        }
    }
}

impl<D: Device, T: Trace> Endpoint<D, T> {
    /// Install an observer of sent, received and dropped frames.
    pub fn with_trace<U: Trace>(self, trace: U) -> Endpoint<D, U> {
        Endpoint {
            lower: self.lower,
            config: self.config,
            contexts: self.contexts,
            reassembly: self.reassembly,
            seen: self.seen,
            forwards: self.forwards,
            bc0_sequence: self.bc0_sequence,
            rng: self.rng,
            trace,
        }
    }

    /// The configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The lower device.
    pub fn lower(&self) -> &D {
        &self.lower
    }

    /// The lower device, mutably.
    pub fn lower_mut(&mut self) -> &mut D {
        &mut self.lower
    }

    /// The installed observer.
    pub fn trace(&self) -> &T {
        &self.trace
    }

    /// The installed observer, mutably.
    pub fn trace_mut(&mut self) -> &mut T {
        &mut self.trace
    }

    /// The link address, that of the lower device.
    pub fn address(&self) -> LinkAddress {
        self.lower.address()
    }

    /// The mtu offered to IPv6.
    ///
    /// Fragmentation makes the link carry the IPv6 minimum mtu regardless of its frame size.
    pub fn mtu(&self) -> u16 {
        IPV6_MIN_MTU as u16
    }

    /// Always `true`, link addresses must be resolved for sending.
    pub fn needs_arp(&self) -> bool {
        true
    }

    /// If the lower device can send from other addresses.
    pub fn supports_send_from(&self) -> bool {
        self.lower.supports_send_from()
    }

    /// The number of datagrams currently being reassembled.
    pub fn reassembling(&self) -> usize {
        self.reassembly.len()
    }

    /// Add or replace a compression context.
    ///
    /// A lifetime of zero removes the context. Ids above 15 are ignored.
    pub fn add_context(
        &mut self,
        id: u8,
        prefix: Ipv6Subnet,
        compression_allowed: bool,
        lifetime: Duration,
        now: Instant,
    ) {
        self.contexts.add(id, prefix, compression_allowed, lifetime, now)
    }

    /// Get a compression context.
    pub fn get_context(&self, id: u8) -> Option<Context> {
        self.contexts.get(id)
    }

    /// Allow compression with a context again and extend its lifetime.
    pub fn renew_context(&mut self, id: u8, lifetime: Duration, now: Instant) {
        self.contexts.renew(id, lifetime, now)
    }

    /// Stop compressing with a context, while still decompressing with it.
    pub fn invalidate_context(&mut self, id: u8) {
        self.contexts.invalidate(id)
    }

    /// Remove a compression context.
    pub fn remove_context(&mut self, id: u8) {
        self.contexts.remove(id)
    }

    /// Iterate over all compression contexts.
    pub fn contexts(&self) -> impl Iterator<Item=(u8, &Context)> + '_ {
        self.contexts.contexts()
    }

    /// Send an IPv6 datagram to a link destination.
    ///
    /// Fails with `BadSize` if the packet is not an IPv6 datagram or is too large to be
    /// fragmented, and with the error of the lower device if it refuses a frame.
    ///
    /// Headers too large for the first fragment are sent uncompressed instead.
    ///
    /// # Panics
    /// This method panics if the lower device mtu is too small to fragment the datagram.
    pub fn send(&mut self, packet: &[u8], dst: LinkAddress, now: Instant) -> Result<()> {
        let src = self.lower.address();
        self.transmit(packet, src, dst, false, now)
    }

    /// Send an IPv6 datagram with an explicit link source.
    ///
    /// Fails with `Illegal` if the lower device does not support it.
    ///
    /// # Panics
    /// This method panics if the lower device mtu is too small to fragment the datagram.
    pub fn send_from(&mut self, packet: &[u8], src: LinkAddress, dst: LinkAddress, now: Instant)
        -> Result<()>
    {
        if !self.lower.supports_send_from() {
            return Err(Error::Illegal);
        }
        self.transmit(packet, src, dst, true, now)
    }

    /// Process a frame from the lower device.
    ///
    /// Completed datagrams are handed to the handler, first to its promiscuous receive.
    ///
    /// # Panics
    /// This method panics on a protocol violation by the peer unless the endpoint is configured
    /// with [`ViolationPolicy::Drop`].
    ///
    /// [`ViolationPolicy::Drop`]: enum.ViolationPolicy.html#variant.Drop
    pub fn receive(&mut self, frame: Incoming, now: Instant, mut handler: impl Recv) {
        self.trace.rx(frame.payload);

        let mut data = frame.payload;
        let (mut src, mut dst) = (frame.src, frame.dst);

        if let Ok(Dispatch::Mesh) = Dispatch::peek(data) {
            let (header, rest) = match self.receive_mesh(data, now) {
                Some(unwrapped) => unwrapped,
                None => return,
            };
            src = header.originator;
            dst = header.final_destination;
            data = rest;
        }

        let reassembled;
        if let Ok(Dispatch::Frag1) | Ok(Dispatch::FragN) = Dispatch::peek(data) {
            reassembled = match self.receive_fragment(data, src, dst, now) {
                Some(datagram) => datagram,
                None => return,
            };
            net_trace!("lowpan: reassembled {} octets from {}", reassembled.len(), src);
            data = &reassembled;
        }

        let decompressed = self.codec(now).decompress(data, src, dst);
        let headers = match decompressed {
            Ok(headers) => headers,
            Err(failure) => return self.fail(failure, data),
        };
        net_trace!("lowpan: {} from {}, {} octets of headers",
            compress::describe(data), src, headers.header_len());

        let consumed = headers.consumed();
        let payload = headers.finish(&data[consumed..], self.config.checksum);
        let delivery = Delivery {
            payload,
            protocol: IPV6_PROTOCOL,
            src,
            dst,
            packet_type: frame.packet_type,
        };

        handler.receive_promiscuous(&delivery);
        handler.receive(delivery);
    }

    /// Process a frame from the lower device with a closure as the handler.
    pub fn receive_with<F: FnMut(Delivery)>(&mut self, frame: Incoming, now: Instant, handler: F) {
        self.receive(frame, now, FnHandler(handler))
    }

    /// Perform all delayed work due at or before `now`.
    ///
    /// Expired fragment buffers are dropped and due mesh forwards are sent.
    pub fn poll(&mut self, now: Instant) {
        self.reassembly.expire(now, &mut self.trace);

        let protocol = self.config.protocol();
        let broadcast = self.lower.broadcast();
        while let Some(frame) = self.forwards.pop_due(now) {
            if let Err(err) = self.lower.send(&frame, broadcast, protocol) {
                net_warn!("lowpan: forward of {} octets refused: {}", frame.len(), err);
            }
        }
    }

    /// The next instant at which `poll` has work to do.
    pub fn poll_at(&self) -> Expiration {
        Expiration::from(self.reassembly.next_expiry())
            .min(Expiration::from(self.forwards.next_due()))
    }

    fn codec(&self, now: Instant) -> Codec<'_> {
        Codec {
            contexts: &self.contexts,
            now,
            checksum: self.config.checksum,
            omit_udp_checksum: self.config.omit_udp_checksum,
            use_iphc: self.config.use_iphc,
        }
    }

    fn transmit(&mut self, packet: &[u8], src: LinkAddress, dst: LinkAddress, explicit: bool, now: Instant)
        -> Result<()>
    {
        let mesh_header = if self.config.use_mesh_under {
            Some(mesh::Repr {
                hops_left: self.config.mesh_under_radius,
                originator: src.to_mesh(),
                final_destination: dst.to_mesh(),
            })
        } else {
            None
        };

        // The receiver only learns the mesh addresses, so they are the ones compressed against.
        let (link_src, link_dst) = match mesh_header {
            Some(header) => (header.originator, header.final_destination),
            None => (src, dst),
        };

        let compressed = if self.config.use_iphc {
            self.codec(now).compress_iphc(packet, link_src, link_dst)?
        } else {
            self.codec(now).compress_hc1(packet, link_src, link_dst)?
        };

        let extra = mesh_header.map_or(0, |header| header.buffer_len() + Bc0Repr::LEN);
        let mtu = usize::from(self.lower.mtu());
        let compressed = if compressed.frame.len() + extra < self.config.compression_threshold {
            net_trace!("lowpan: compressed to {} octets, below threshold, sent uncompressed",
                compressed.frame.len());
            Compressed::uncompressed(&packet[..compressed.datagram_size])
        } else if compressed.frame.len() + extra > mtu
            && compressed.compressed_header_len() + frag::FIRST_HEADER_LEN + extra > mtu
        {
            // The first fragment must carry all compressed headers, the uncompressed form can be
            // split anywhere.
            net_debug!("lowpan: {} octets of compressed headers do not fit a fragment, sent uncompressed",
                compressed.compressed_header_len());
            Compressed::uncompressed(&packet[..compressed.datagram_size])
        } else {
            compressed
        };

        let frames = if compressed.frame.len() + extra > mtu {
            let tag = self.rng.gen();
            fragment::fragment(&compressed, mtu, extra, tag)?
        } else {
            vec![compressed.frame]
        };

        let protocol = self.config.protocol();
        let target = match mesh_header {
            Some(_) => self.lower.broadcast(),
            None => dst,
        };

        for frame in frames {
            self.trace.tx(&frame);
            let frame = match mesh_header {
                Some(header) => self.wrap_mesh(header, &frame),
                None => frame,
            };

            if explicit {
                self.lower.send_from(&frame, src, target, protocol)?;
            } else {
                self.lower.send(&frame, target, protocol)?;
            }
        }

        Ok(())
    }

    fn wrap_mesh(&mut self, header: mesh::Repr, frame: &[u8]) -> Vec<u8> {
        let bc0 = Bc0Repr { sequence: self.bc0_sequence };
        self.bc0_sequence = self.bc0_sequence.wrapping_add(1);
        with_mesh(header, bc0, frame)
    }

    /// Unwrap the mesh and broadcast headers, forwarding the frame if required.
    ///
    /// Returns the remaining frame if it is to be processed locally.
    fn receive_mesh<'a>(&mut self, data: &'a [u8], now: Instant) -> Option<(mesh::Repr, &'a [u8])> {
        let (header, header_len) = match mesh::Repr::parse(data) {
            Ok(parsed) => parsed,
            Err(_) => {
                self.report_drop(DropReason::UnknownExtension, data);
                return None;
            },
        };

        let rest = &data[header_len..];
        let bc0 = match Dispatch::peek(rest) {
            Ok(Dispatch::Bc0) => Bc0Repr::parse(rest).ok(),
            _ => None,
        };
        let bc0 = match bc0 {
            Some(bc0) => bc0,
            None => {
                net_debug!("lowpan: mesh header from {} without broadcast header", header.originator);
                self.report_drop(DropReason::UnknownExtension, data);
                return None;
            },
        };
        let rest = &rest[bc0.buffer_len()..];

        let own = self.lower.address().to_mesh();
        if header.originator == own {
            net_trace!("lowpan: own flood {} echoed back", bc0.sequence);
            return None;
        }

        if self.seen.record(header.originator, bc0.sequence) {
            net_trace!("lowpan: duplicate flood {} from {}", bc0.sequence, header.originator);
            return None;
        }

        let final_destination = header.final_destination;
        let group = final_destination.is_broadcast() || final_destination.is_multicast();
        let local = group || final_destination == own;

        if header.hops_left > 0 && final_destination != own {
            match final_destination {
                LinkAddress::Short(_) => {
                    let forward = mesh::Repr { hops_left: header.hops_left - 1, ..header };
                    let at = now + self.config.mesh_under_jitter.sample(&mut self.rng);
                    net_trace!("lowpan: forwarding flood {} from {} at {}", bc0.sequence, header.originator, at);
                    self.forwards.push(at, with_mesh(forward, bc0, rest));
                },
                _ => {
                    net_debug!("lowpan: can not forward to {}", final_destination);
                    self.report_drop(DropReason::UnknownExtension, data);
                    return None;
                },
            }
        }

        if local {
            Some((header, rest))
        } else {
            None
        }
    }

    /// Store a fragment, returning the datagram if it is complete.
    fn receive_fragment(&mut self, data: &[u8], src: LinkAddress, dst: LinkAddress, now: Instant)
        -> Option<Vec<u8>>
    {
        let header = match frag::Repr::parse(data) {
            Ok(header) => header,
            Err(_) => {
                self.report_drop(DropReason::UnknownExtension, data);
                return None;
            },
        };

        let payload = &data[header.buffer_len()..];
        let key = Key {
            src,
            dst,
            size: header.datagram_size(),
            tag: header.datagram_tag(),
        };

        let (offset, covered) = match header {
            frag::Repr::First { .. } => {
                let decompressed = self.codec(now).decompress(payload, src, dst);
                match decompressed {
                    Ok(headers) => (0, headers.header_len() + payload.len() - headers.consumed()),
                    Err(failure) => {
                        self.fail(failure, data);
                        return None;
                    },
                }
            },
            frag::Repr::Subsequent { .. } => (header.offset(), payload.len()),
        };

        match self.reassembly.insert(key, offset, covered, payload, now, &mut self.trace) {
            Ok(datagram) => datagram,
            Err(Refused::OutOfBounds) => {
                self.report_drop(DropReason::UnknownExtension, data);
                None
            },
            Err(Refused::Overlap) => {
                self.violation("overlapping fragments", data);
                None
            },
        }
    }

    fn fail(&mut self, failure: Failure, data: &[u8]) {
        match failure {
            Failure::Drop(reason) => self.report_drop(reason, data),
            Failure::Violation(what) => self.violation(what, data),
        }
    }

    fn violation(&mut self, what: &str, data: &[u8]) {
        match self.config.violation_policy {
            ViolationPolicy::Abort => panic!("lowpan: protocol violation, {}", what),
            ViolationPolicy::Drop => {
                net_warn!("lowpan: protocol violation, {}", what);
                self.report_drop(DropReason::UnknownExtension, data)
            },
        }
    }

    fn report_drop(&mut self, reason: DropReason, data: &[u8]) {
        net_debug!("lowpan: dropped {} octets, {}", data.len(), reason);
        self.trace.dropped(reason, data);
    }
}

fn with_mesh(header: mesh::Repr, bc0: Bc0Repr, frame: &[u8]) -> Vec<u8> {
    let mesh_len = header.buffer_len();
    let len = mesh_len + bc0.buffer_len();
    let mut wrapped = vec![0; len + frame.len()];
    header.emit(&mut wrapped);
    bc0.emit(&mut wrapped[mesh_len..]);
    wrapped[len..].copy_from_slice(frame);
    wrapped
}

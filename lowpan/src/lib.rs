//! A 6LoWPAN adaptation layer for simulated low-power links.
//!
//! ## Table of contents
//!
//! This is also a recommended reading order but feel free to skip ahead, each chapter tries to be
//! somewhat self-contained.
//!
//! 1. [Design](#design-and-relevant-core-concepts)
//! 2. [The wire module](wire/index.html)
//!    1. [IPv6, extension headers and UDP](wire/index.html#an-overview-over-packet-representations)
//!    1. [The 6LoWPAN headers](wire/sixlowpan/index.html)
//! 3. [The adaptation layer](layer/lowpan/index.html)
//!    1. [Compression contexts](layer/lowpan/index.html#compression-contexts)
//!    1. [Sending](layer/lowpan/index.html#sending)
//!    1. [Receiving](layer/lowpan/index.html#receiving)
//!    1. [Timers](layer/lowpan/index.html#timers)
//! 4. [Lower layer devices](nic/index.html)
//! 5. Internals
//!    1. [The storage module](storage/index.html)
//!
//! ## Design and relevant core concepts
//!
//! The adaptation layer sits between an IPv6 stack and a link with a small MTU, such as an IEEE
//! 802.15.4 radio. Outgoing IPv6 datagrams are compressed (IPHC or the legacy HC1 scheme),
//! optionally wrapped for mesh-under flooding, and split into fragments when they do not fit a
//! single link frame. Incoming frames walk the same path in reverse.
//!
//! The crate never reads a clock and never spawns work on its own. Every operation that depends
//! on time takes the current [`Instant`] as an argument and pending work (fragment buffer
//! expiry, delayed mesh forwarding) is advanced by calling [`poll`] from the host event loop.
//! [`poll_at`] names the next instant at which doing so is required. All state is owned by a
//! single endpoint and processing is strictly sequential.
//!
//! [`Instant`]: time/struct.Instant.html
//! [`poll`]: layer/lowpan/struct.Endpoint.html#method.poll
//! [`poll_at`]: layer/lowpan/struct.Endpoint.html#method.poll_at
#![warn(missing_docs)]
#![warn(unreachable_pub)]

#[macro_use] mod macros;
pub mod layer;
pub mod nic;
pub mod storage;
pub mod time;
pub mod wire;

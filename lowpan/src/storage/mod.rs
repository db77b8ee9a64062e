//! Buffer structures that hold no protocol state of their own.
//!
//! The [`Assembler`] collects the pieces of one fragmented datagram. Keying, timeouts and
//! capacity bounds are the business of the layer that owns the buffers.
//!
//! [`Assembler`]: assembler/struct.Assembler.html
pub mod assembler;

pub use self::assembler::{Assembler, Contig, Insert, Overlap};

//! The process logic of protocol layers.
//!
//! ## Layering
//!
//! Each protocol layer is split into two parts; the packet logic contained in `wire` and the
//! processing part in this module. An endpoint represents the local state of a protocol. This
//! state can be used to process packets of that layer. The state is open to modifications as part
//! of a user program while processing does not take place, similar to reconfiguration on the OS
//! level with utilities such as `ip` or `iwpan`.
//!
//! ## Receiving
//!
//! Layer implementations process packets by handing them to the layer conceptually above them.
//! This functionality is provided via abstract traits accepting the processed packets of that
//! layer. A closure can be used in place of a full implementation by wrapping it in
//! [`FnHandler`].
//!
//! ## Sending
//!
//! Sending happens synchronously: the endpoint transforms the packet and passes every resulting
//! frame to the device below before returning. Only work that must be delayed is kept in the
//! endpoint, and it is advanced by polling.
//!
//! [`FnHandler`]: struct.FnHandler.html
use thiserror::Error;

pub mod lowpan;

/// The result type of layer operations.
pub type Result<T> = core::result::Result<T, Error>;

/// The error type of layer operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
pub enum Error {
    /// The operation was not permitted.
    ///
    /// Returned when the device, endpoint, receiver or sender does not allow or implement an
    /// operation.
    #[error("operation not permitted")]
    Illegal,

    /// The packet does not have a size that can be handled.
    ///
    /// Returned for packets too large to be fragmented and for frames that exceed the device mtu.
    #[error("bad packet size")]
    BadSize,

    /// Some layer tried to operate on a packet but failed.
    #[error("invalid packet: {0}")]
    Wire(#[from] crate::wire::Error),
}

/// A standard wrapper for a function implementing receive traits.
///
/// Keeps the type alias overhead low by providing a single wrapper type that implements the
/// receive traits for all layers, where applicable.
pub struct FnHandler<F>(pub F);

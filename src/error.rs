//! Error definitions shared across library modules.
//! Each enum models one failure domain (identifier decoding, address
//! claiming, channel transfers, report publication) and wraps the driver
//! error type where a lower layer is involved.
use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Errors raised while decoding a 29-bit CAN identifier.
pub enum IdentifierError {
    /// The two class bits do not match any defined message class.
    #[error("Unrecognized class bits {class_bits:#04b}")]
    UnknownClass { class_bits: u8 },
    /// Report-class bit pattern carrying a control-urgency priority.
    /// The four lowest priority codes are reserved and never valid for
    /// report traffic.
    #[error("Reserved priority {priority} on report identifier")]
    ReservedPriority { priority: u8 },
}

#[derive(Error, Debug)]
/// Errors encountered while claiming or defending a node address.
pub enum ClaimError<E: core::fmt::Debug> {
    /// CAN bus rejected a frame during transmission.
    #[error("CAN bus send error: {0:?}")]
    Send(E),

    /// Unable to receive frames from the bus.
    #[error("CAN bus receive error: {0:?}")]
    Receive(E),

    /// Every claim attempt collided; the retry budget is exhausted.
    #[error("No address available")]
    NoAddressAvailable,
}

#[derive(Error, Debug)]
/// Errors returned by a channel `send` operation.
pub enum SendError<E: core::fmt::Debug> {
    /// The node has not completed address claiming yet. Transient while a
    /// re-claim is in progress; callers may retry.
    #[error("Node address not claimed")]
    NotClaimed,
    /// The transfer did not complete within the caller's deadline.
    #[error("Send timed out")]
    Timeout,
    /// Failure surfaced verbatim from the segmented transport.
    #[error("Transport error: {0:?}")]
    Transport(E),
}

#[derive(Error, Debug)]
/// Errors returned by a channel `receive` operation.
pub enum ReceiveError<E: core::fmt::Debug> {
    /// No complete transfer arrived within the caller's deadline.
    #[error("Receive timed out")]
    Timeout,
    /// The reassembled payload does not fit the caller's buffer. The
    /// transfer is rejected entirely; nothing is delivered.
    #[error("Payload of {len} bytes exceeds buffer of {capacity}")]
    Truncated { len: usize, capacity: usize },
    /// Failure surfaced verbatim from the segmented transport.
    #[error("Transport error: {0:?}")]
    Transport(E),
}

#[derive(Error, Debug)]
/// Errors returned by the best-effort report publication path.
pub enum PublishError<E: core::fmt::Debug> {
    /// A foreground transfer holds the send slot; the report is skipped.
    #[error("Send slot busy")]
    Busy,
    /// The node currently has no claimed address.
    #[error("Node address not claimed")]
    NotClaimed,
    /// The frame could not be handed to the driver within the frame-send
    /// timeout.
    #[error("Publish timed out")]
    Timeout,
    /// Failure surfaced verbatim from the CAN driver.
    #[error("Bus error: {0:?}")]
    Bus(E),
}

#[derive(Error, Debug)]
/// Errors returned by one request/response service cycle.
pub enum ProcessError<TE: core::fmt::Debug, RE: core::fmt::Debug> {
    /// Waiting for the inbound request failed.
    #[error(transparent)]
    Receive(ReceiveError<RE>),
    /// Returning the response to the originator failed.
    #[error(transparent)]
    Send(SendError<TE>),
}

#[derive(Error, Debug)]
/// Fatal conditions surfaced by the network-management monitor loop.
pub enum MonitorError<E: core::fmt::Debug> {
    /// The management-plane bus handle failed.
    #[error("CAN bus error: {0:?}")]
    Bus(E),
    /// The address was lost to a conflict and no replacement could be
    /// claimed.
    #[error(transparent)]
    AddressLost(ClaimError<E>),
}

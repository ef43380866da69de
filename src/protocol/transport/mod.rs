//! CAN transport layer: frame representation, 29-bit identifier
//! management, channel multiplexing, and bus abstraction traits.
//!
//! ## Timing Constants
//!
//! These constants define recommended delays and timeouts for reliable
//! operation on a shared CAN bus.

pub mod can_frame;
pub mod can_id;
pub mod multiplexer;
pub mod traits;

/// Recommended timeout for sending a single CAN frame (ms).
///
/// Prevents indefinite blocking when the bus is faulty, disconnected, or
/// saturated.
///
/// # Timeout rationale
///
/// On a CAN bus @ 500 kbps with arbitration:
/// - Maximum time for one frame (8 bytes): ~0.25 ms (no contention)
/// - With arbitration and retransmissions: ~10–20 ms
/// - Safety margin ×5 → 100 ms
///
/// # Implementation notes
///
/// [`CanBus`](traits::can_bus::CanBus) implementations **SHOULD**
/// enforce a timeout on `send()` to avoid infinite waits.
pub const CAN_SEND_TIMEOUT_MS: u32 = 100;

/// Recommended timeout for a complete channel payload transfer (ms).
///
/// Covers the worst case of a maximum-size segmented transfer with flow
/// control round trips on a loaded bus. Every multiplexer call takes an
/// explicit deadline; this is the value to reach for absent a better one.
pub const TRANSFER_TIMEOUT_MS: u32 = 1_000;

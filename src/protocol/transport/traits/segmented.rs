//! Abstraction over the segmented (multi-frame) transport used for channel
//! payloads. Segmentation mechanics (flow control, block size, frame
//! timing) live below this boundary; the core only moves already-assembled
//! payloads.
use crate::protocol::transport::can_id::CanId;
use futures_util::Future;

/// Outbound half of the segmented transport.
pub trait TransportTx {
    type Error: core::fmt::Debug;
    /// Transmit `payload` under the given channel identifier, segmenting
    /// as needed. Completes when the last frame is acknowledged by the
    /// driver.
    fn send<'a>(
        &'a mut self,
        id: CanId,
        payload: &'a [u8],
    ) -> impl Future<Output = Result<(), Self::Error>> + 'a;
}

/// Inbound half of the segmented transport.
pub trait TransportRx {
    type Error: core::fmt::Debug;
    /// Wait for the next fully reassembled payload. Writes up to
    /// `buf.len()` bytes and returns the payload's true total length with
    /// the arriving identifier. A returned length larger than the buffer
    /// means the transfer did not fit; the multiplexer rejects such
    /// transfers entirely instead of delivering a truncated prefix.
    fn recv<'a>(
        &'a mut self,
        buf: &'a mut [u8],
    ) -> impl Future<Output = Result<(usize, CanId), Self::Error>> + 'a;
}

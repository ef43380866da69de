//! Application-side producer of periodic report payloads.

/// Single-frame telemetry report handed to the publish scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Report {
    /// 16-bit data id published in the identifier.
    pub data_id: u16,
    /// Payload bytes, up to the eight-byte CAN frame limit.
    pub data: [u8; 8],
    /// Number of valid payload bytes.
    pub len: usize,
}

impl Report {
    /// Report carrying `payload`, truncated to eight bytes.
    pub fn new(data_id: u16, payload: &[u8]) -> Self {
        let len = payload.len().min(8);
        let mut data = [0u8; 8];
        data[..len].copy_from_slice(&payload[..len]);
        Self { data_id, data, len }
    }
}

/// Supplier polled by the publish scheduler at every enabled fire.
pub trait ReportSource {
    /// Produce the next report, or `None` when there is nothing to publish
    /// this cycle.
    fn next_report(&mut self) -> impl core::future::Future<Output = Option<Report>> + '_;
}

/// Test doubles to simulate the CAN bus, segmented transport, timer, and
/// entropy source during integration tests.
use canlink::protocol::transport::{
    can_frame::CanFrame,
    can_id::CanId,
    traits::{
        can_bus::CanBus,
        link_timer::LinkTimer,
        report_source::{Report, ReportSource},
        request_handler::RequestHandler,
        segmented::{TransportRx, TransportTx},
    },
};
use rand_core::RngCore;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{sleep, Duration};

//==================================================================================MOCK_CAN_BUS
#[derive(Clone)]
#[allow(dead_code)]
/// In-memory CAN bus reproducing the `CanBus` trait behavior.
pub struct MockCanBus {
    tx: mpsc::UnboundedSender<CanFrame>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<CanFrame>>>,
}

#[allow(dead_code)]
impl MockCanBus {
    /// Construct a pair of interconnected buses (DUT ↔ host).
    pub fn create_pair() -> (Self, Self) {
        let (dut_tx, host_rx) = mpsc::unbounded_channel();
        let (host_tx, dut_rx) = mpsc::unbounded_channel();

        let dut_bus = Self {
            tx: dut_tx,
            rx: Arc::new(Mutex::new(dut_rx)),
        };

        let host_bus = Self {
            tx: host_tx,
            rx: Arc::new(Mutex::new(host_rx)),
        };

        (dut_bus, host_bus)
    }
}

impl CanBus for MockCanBus {
    type Error = ();

    async fn send<'a>(&'a mut self, frame: &'a CanFrame) -> Result<(), Self::Error> {
        self.tx.send(frame.clone()).map_err(|_| ())?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<CanFrame, Self::Error> {
        let mut rx = self.rx.lock().await;
        rx.recv().await.ok_or(())
    }
}

//==================================================================================MOCK_TRANSPORT
#[allow(dead_code)]
/// Outbound half of an in-memory segmented transport. An optional delay
/// simulates a slow multi-frame transfer.
pub struct MockTransportTx {
    tx: mpsc::UnboundedSender<(CanId, Vec<u8>)>,
    pub delay_ms: u64,
}

impl TransportTx for MockTransportTx {
    type Error = ();

    async fn send<'a>(&'a mut self, id: CanId, payload: &'a [u8]) -> Result<(), Self::Error> {
        if self.delay_ms > 0 {
            sleep(Duration::from_millis(self.delay_ms)).await;
        }
        self.tx.send((id, payload.to_vec())).map_err(|_| ())?;
        Ok(())
    }
}

#[allow(dead_code)]
/// Inbound half of an in-memory segmented transport.
pub struct MockTransportRx {
    rx: mpsc::UnboundedReceiver<(CanId, Vec<u8>)>,
}

impl TransportRx for MockTransportRx {
    type Error = ();

    async fn recv<'a>(&'a mut self, buf: &'a mut [u8]) -> Result<(usize, CanId), Self::Error> {
        let (id, data) = self.rx.recv().await.ok_or(())?;
        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);
        Ok((data.len(), id))
    }
}

#[allow(dead_code)]
/// Host-side handles observing and injecting transfers.
pub struct TransportProbe {
    /// Transfers the DUT sent out.
    pub from_dut: mpsc::UnboundedReceiver<(CanId, Vec<u8>)>,
    /// Inject a transfer toward the DUT.
    pub to_dut: mpsc::UnboundedSender<(CanId, Vec<u8>)>,
}

#[allow(dead_code)]
/// Build the DUT transport halves plus the matching host probe.
pub fn transport_endpoints() -> (MockTransportTx, MockTransportRx, TransportProbe) {
    let (dut_tx, from_dut) = mpsc::unbounded_channel();
    let (to_dut, dut_rx) = mpsc::unbounded_channel();

    (
        MockTransportTx {
            tx: dut_tx,
            delay_ms: 0,
        },
        MockTransportRx { rx: dut_rx },
        TransportProbe { from_dut, to_dut },
    )
}

//==================================================================================MOCK_TIMER
#[derive(Clone, Copy)]
#[allow(dead_code)]
/// Timer based on `tokio::time::sleep` to drive delays in tests.
pub struct MockTimer {
    start: Instant,
}

#[allow(dead_code)]
impl MockTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl LinkTimer for MockTimer {
    async fn delay_ms(&mut self, millis: u32) {
        sleep(Duration::from_millis(millis as u64)).await;
    }

    fn now_ms(&mut self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

//==================================================================================SCRIPTED_RNG
#[allow(dead_code)]
/// Deterministic rng cycling through a scripted sequence of words, so claim
/// nonces, candidates, and backoff jitter are predictable per test.
pub struct ScriptedRng {
    values: Vec<u32>,
    idx: usize,
}

#[allow(dead_code)]
impl ScriptedRng {
    pub fn new(values: &[u32]) -> Self {
        Self {
            values: values.to_vec(),
            idx: 0,
        }
    }
}

impl RngCore for ScriptedRng {
    fn next_u32(&mut self) -> u32 {
        let value = self.values[self.idx % self.values.len()];
        self.idx += 1;
        value
    }

    fn next_u64(&mut self) -> u64 {
        let high = self.next_u32() as u64;
        (high << 32) | self.next_u32() as u64
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let word = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&word[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

//==================================================================================APP_DOUBLES
#[allow(dead_code)]
/// Report source producing numbered payloads under one data id.
pub struct CountingSource {
    pub data_id: u16,
    pub counter: u8,
}

impl ReportSource for CountingSource {
    async fn next_report(&mut self) -> Option<Report> {
        self.counter = self.counter.wrapping_add(1);
        Some(Report::new(self.data_id, &[self.counter]))
    }
}

#[allow(dead_code)]
/// Request handler echoing the request payload back unchanged.
pub struct EchoHandler;

impl RequestHandler for EchoHandler {
    async fn handle<'a>(
        &'a mut self,
        request: &'a [u8],
        _source: u8,
        response: &'a mut [u8],
    ) -> usize {
        let n = request.len().min(response.len());
        response[..n].copy_from_slice(&request[..n]);
        n
    }
}

#[allow(dead_code)]
/// Utility loop: drain incoming frames without responding (quiet network).
pub async fn simulate_quiet_network(mut host_bus: MockCanBus) {
    while let Ok(_frame) = host_bus.recv().await {
        // Receive a discovery or claim frame from the DUT and ignore it.
    }
}

//! Explicitly-owned node instance tying the layers together:
//! address claim at startup, channel send/receive, the request/response
//! service cycle, and the background network and publication actors.
use crate::error::{ClaimError, MonitorError, ProcessError, ReceiveError, SendError};
use crate::protocol::management::address_claiming::ClaimConfig;
use crate::protocol::management::address_manager::{AddressCell, AddressMonitor};
use crate::protocol::publish::{self, PublishSchedule, PublishStats};
use crate::protocol::transport::can_id::PRIO_REPORT_LOW;
use crate::protocol::transport::multiplexer::Multiplexer;
use crate::protocol::transport::traits::can_bus::CanBus;
use crate::protocol::transport::traits::link_timer::LinkTimer;
use crate::protocol::transport::traits::report_source::ReportSource;
use crate::protocol::transport::traits::request_handler::RequestHandler;
use crate::protocol::transport::traits::segmented::{TransportRx, TransportTx};
use core::sync::atomic::{AtomicBool, Ordering};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use rand_core::RngCore;

/// How long the network actor listens before rechecking the closed flag.
const MONITOR_POLL_MS: u32 = 100;

//==================================================================================NODE_CONFIG
/// Node tuning knobs. `Default` carries the wire-format defaults.
#[derive(Clone, Copy, Debug)]
pub struct NodeConfig {
    /// Claim windows, backoff bounds, retry budget, and the bus id.
    pub claim: ClaimConfig,
    /// Priority stamped on report frames (high or low report priority).
    pub report_priority: u8,
    /// Initial report cadence (ms).
    pub report_interval_ms: u32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            claim: ClaimConfig::default(),
            report_priority: PRIO_REPORT_LOW,
            report_interval_ms: 1_000,
        }
    }
}

//==================================================================================CAN_NODE
/// One node on the bus.
///
/// All state hangs off this instance; there are no globals. The caller
/// provides the [`AddressCell`] (typically a `static`) because both the
/// multiplexer and the address monitor hold it for the node's lifetime.
pub struct CanNode<'a, B, TX, RX, T, R>
where
    B: CanBus,
    TX: TransportTx,
    RX: TransportRx,
    T: LinkTimer,
    R: RngCore,
{
    mux: Multiplexer<'a, B, TX, RX, T>,
    monitor: Mutex<CriticalSectionRawMutex, AddressMonitor<'a, B, T, R>>,
    schedule: PublishSchedule,
    closed: AtomicBool,
    report_priority: u8,
    address: &'a AddressCell,
}

impl<'a, B, TX, RX, T, R> CanNode<'a, B, TX, RX, T, R>
where
    B: CanBus,
    TX: TransportTx,
    RX: TransportRx,
    T: LinkTimer,
    R: RngCore,
{
    /// Claim an address and bring up the node.
    ///
    /// `mgmt_bus` carries the single-frame network-management plane,
    /// `report_bus` the outbound report frames; channel payloads go through
    /// the segmented transport halves. Returns once an address is claimed
    /// or the claim fails definitively.
    #[allow(clippy::too_many_arguments)]
    pub async fn init(
        mgmt_bus: B,
        report_bus: B,
        transport_tx: TX,
        transport_rx: RX,
        timer: T,
        rng: R,
        identity: u64,
        config: NodeConfig,
        address: &'a AddressCell,
    ) -> Result<CanNode<'a, B, TX, RX, T, R>, ClaimError<B::Error>> {
        let monitor = AddressMonitor::claim(
            mgmt_bus,
            timer.clone(),
            rng,
            identity,
            config.claim,
            address,
        )
        .await?;

        let mux = Multiplexer::new(
            transport_tx,
            transport_rx,
            report_bus,
            timer,
            config.claim.bus_id,
            address,
        );

        Ok(Self {
            mux,
            monitor: Mutex::new(monitor),
            schedule: PublishSchedule::new(config.report_interval_ms),
            closed: AtomicBool::new(false),
            report_priority: config.report_priority,
            address,
        })
    }

    /// Currently claimed address, or `None` during a re-negotiation.
    pub fn address(&self) -> Option<u8> {
        self.address.get()
    }

    /// Send a channel payload to `target`, waiting at most `timeout_ms`.
    /// Concurrent senders queue on the single send slot.
    pub async fn send(
        &self,
        payload: &[u8],
        target: u8,
        timeout_ms: u32,
    ) -> Result<(), SendError<TX::Error>> {
        self.mux.send(payload, target, timeout_ms).await
    }

    /// Wait for the next channel payload addressed to this node and copy it
    /// into `buf`. Returns the payload length and the sender's address.
    pub async fn receive(
        &self,
        buf: &mut [u8],
        timeout_ms: u32,
    ) -> Result<(usize, u8), ReceiveError<RX::Error>> {
        self.mux.receive(buf, timeout_ms).await
    }

    /// One request/response service cycle.
    ///
    /// Waits up to `timeout_ms` for an inbound request, hands it to
    /// `handler`, and returns the non-empty response to the requester.
    /// Errors are returned to the caller; retry policy is theirs. Call in a
    /// loop to serve continuously.
    pub async fn process<H: RequestHandler>(
        &self,
        handler: &mut H,
        request_buf: &mut [u8],
        response_buf: &mut [u8],
        timeout_ms: u32,
    ) -> Result<(), ProcessError<TX::Error, RX::Error>> {
        let (len, source) = self
            .mux
            .receive(request_buf, timeout_ms)
            .await
            .map_err(ProcessError::Receive)?;

        let response_len = handler
            .handle(&request_buf[..len], source, response_buf)
            .await;

        if response_len > 0 {
            self.mux
                .send(&response_buf[..response_len], source, timeout_ms)
                .await
                .map_err(ProcessError::Send)?;
        }

        Ok(())
    }

    /// Turn periodic report publication on or off.
    pub fn enable_reports(&self, enabled: bool) {
        self.schedule.set_enabled(enabled);
    }

    /// Change the report cadence. Takes effect at the next fire.
    pub fn set_report_interval(&self, interval_ms: u32) {
        self.schedule.set_interval_ms(interval_ms);
    }

    /// Publication counters (attempted and skipped fires).
    pub fn publish_stats(&self) -> PublishStats {
        self.schedule.stats()
    }

    /// Drive the network-management plane: defend the claimed address and
    /// reclaim a new one when the defense is lost.
    ///
    /// Runs until [`close`](CanNode::close) or a fatal error (bus failure
    /// or claim exhaustion). The monitor lock is released between polls so
    /// [`discover`](CanNode::discover) can interleave.
    pub async fn run_network(&self) -> Result<(), MonitorError<B::Error>> {
        while !self.closed.load(Ordering::Relaxed) {
            let mut monitor = self.monitor.lock().await;
            monitor.poll(MONITOR_POLL_MS).await?;
        }
        Ok(())
    }

    /// Drive the periodic report publication from `source` until the node
    /// is closed. `timer` paces the cadence; a busy send slot skips the
    /// cycle instead of delaying foreground traffic.
    pub async fn run_publisher<S: ReportSource>(&self, source: &mut S, timer: &mut T) {
        publish::run_publisher(
            &self.mux,
            &self.schedule,
            &self.closed,
            source,
            timer,
            self.report_priority,
        )
        .await;
    }

    /// Enumerate neighbouring nodes: broadcast a discovery probe and
    /// collect claim responses for `window_ms` into `neighbours` as
    /// `(address, identity)` pairs, deduplicated by address. Returns the
    /// neighbour count.
    pub async fn discover(
        &self,
        window_ms: u32,
        neighbours: &mut [(u8, u64)],
    ) -> Result<usize, MonitorError<B::Error>> {
        let mut monitor = self.monitor.lock().await;
        monitor.discover(window_ms, neighbours).await
    }

    /// Tear the node down: background actors exit at their next iteration
    /// and the address cell drops to anonymous, so new operations fail with
    /// `NotClaimed`. Outstanding transfers finish or time out.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
        self.address.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}

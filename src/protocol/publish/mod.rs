//! Periodic report publication.
//!
//! A timer-driven actor emits single-frame reports at a fixed cadence,
//! yielding to foreground channel traffic instead of competing with it:
//! when the send slot is busy the cycle is skipped, never queued.
use crate::protocol::transport::can_frame::CanFrame;
use crate::protocol::transport::can_id::CanId;
use crate::protocol::transport::multiplexer::Multiplexer;
use crate::protocol::transport::traits::can_bus::CanBus;
use crate::protocol::transport::traits::link_timer::LinkTimer;
use crate::protocol::transport::traits::report_source::{Report, ReportSource};
use crate::protocol::transport::traits::segmented::{TransportRx, TransportTx};
use crate::protocol::transport::CAN_SEND_TIMEOUT_MS;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

//==================================================================================PUBLISH_SCHEDULE
/// Shared publication settings and counters.
///
/// All fields are atomics so the foreground can toggle publication while
/// the scheduler actor runs; no lock is involved.
pub struct PublishSchedule {
    enabled: AtomicBool,
    interval_ms: AtomicU32,
    attempted: AtomicU32,
    skipped: AtomicU32,
}

/// Snapshot of the publication counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublishStats {
    /// Enabled fires that produced a report and tried to send it.
    pub attempted: u32,
    /// Attempts dropped because the slot was busy, the address was gone,
    /// or the driver failed.
    pub skipped: u32,
}

impl PublishSchedule {
    /// Schedule starting disabled at the given cadence.
    pub const fn new(interval_ms: u32) -> Self {
        Self {
            enabled: AtomicBool::new(false),
            interval_ms: AtomicU32::new(interval_ms),
            attempted: AtomicU32::new(0),
            skipped: AtomicU32::new(0),
        }
    }

    /// Turn periodic publication on or off. Takes effect at the next fire.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Change the cadence. Takes effect when computing the next fire time.
    pub fn set_interval_ms(&self, interval_ms: u32) {
        self.interval_ms.store(interval_ms.max(1), Ordering::Relaxed);
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> PublishStats {
        PublishStats {
            attempted: self.attempted.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }

    fn record_attempt(&self) {
        self.attempted.fetch_add(1, Ordering::Relaxed);
    }

    fn record_skip(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }
}

//==================================================================================PUBLISHER_LOOP
/// Drive the publication cadence until `closed` is set.
///
/// Fires at `last_fire + interval`; an overrunning cycle re-anchors the
/// schedule to the present instead of bursting the backlog. Disabled fires
/// reschedule silently. A busy send slot or a missing address skips the
/// cycle; cadence is best-effort, latency is not guaranteed.
pub async fn run_publisher<B, TX, RX, T, S>(
    mux: &Multiplexer<'_, B, TX, RX, T>,
    schedule: &PublishSchedule,
    closed: &AtomicBool,
    source: &mut S,
    timer: &mut T,
    priority: u8,
) where
    B: CanBus,
    TX: TransportTx,
    RX: TransportRx,
    T: LinkTimer,
    S: ReportSource,
{
    let mut last_fire = timer.now_ms();

    while !closed.load(Ordering::Relaxed) {
        let interval = schedule.interval_ms() as u64;
        let next_fire = last_fire + interval;

        let now = timer.now_ms();
        if next_fire > now {
            timer.delay_ms((next_fire - now) as u32).await;
        }

        // Re-anchor after an overrun of a full period or more.
        let now = timer.now_ms();
        last_fire = if now >= next_fire + interval {
            now
        } else {
            next_fire
        };

        if !schedule.is_enabled() {
            continue;
        }
        let Some(report) = source.next_report().await else {
            continue;
        };
        let Some(address) = mux.address() else {
            // Address re-negotiation in progress.
            schedule.record_skip();
            continue;
        };

        schedule.record_attempt();
        let frame = build_report_frame(&report, priority, address);
        match mux.try_publish(&frame, CAN_SEND_TIMEOUT_MS).await {
            Ok(()) => {}
            Err(_error) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("Report {} skipped: {}", report.data_id, defmt::Debug2Format(&_error));
                schedule.record_skip();
            }
        }
    }
}

/// Single report frame under the node's claimed source address.
pub fn build_report_frame(report: &Report, priority: u8, source: u8) -> CanFrame {
    let id = CanId::report(report.data_id, source).with_priority(priority);
    CanFrame::new(id, &report.data[..report.len])
}

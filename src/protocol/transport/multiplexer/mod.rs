//! Channel transfer multiplexer.
//!
//! Owns exactly one send slot and one receive slot. Each slot is an
//! [`embassy_sync::mutex::Mutex`]; holding the guard IS holding the
//! transfer context, so concurrent senders serialize on the lock and the
//! report path can probe it without blocking via `try_lock`. Dropping the
//! guard (completion, error, or timeout) frees the slot.
use crate::error::{PublishError, ReceiveError, SendError};
use crate::protocol::management::address_manager::AddressCell;
use crate::protocol::transport::can_frame::CanFrame;
use crate::protocol::transport::can_id::{CanId, Message, ADDR_BROADCAST};
use crate::protocol::transport::traits::can_bus::CanBus;
use crate::protocol::transport::traits::link_timer::LinkTimer;
use crate::protocol::transport::traits::segmented::{TransportRx, TransportTx};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use futures_util::future::{select, Either};
use futures_util::pin_mut;

/// Resources consumed by one outbound transfer: the segmented transport,
/// the raw bus handle used for single-frame reports, and a timer for
/// deadlines.
struct TxSlot<B: CanBus, TX: TransportTx, T: LinkTimer> {
    transport: TX,
    bus: B,
    timer: T,
}

/// Resources consumed by one inbound transfer.
struct RxSlot<RX: TransportRx, T: LinkTimer> {
    transport: RX,
    timer: T,
}

//==================================================================================MULTIPLEXER
/// Routes channel payloads and report frames over the shared bus while
/// enforcing the one-send/one-receive concurrency contract.
pub struct Multiplexer<'a, B: CanBus, TX: TransportTx, RX: TransportRx, T: LinkTimer> {
    tx: Mutex<CriticalSectionRawMutex, TxSlot<B, TX, T>>,
    rx: Mutex<CriticalSectionRawMutex, RxSlot<RX, T>>,
    /// Claimed source address, shared with the management plane.
    address: &'a AddressCell,
    bus_id: u8,
}

impl<'a, B: CanBus, TX: TransportTx, RX: TransportRx, T: LinkTimer>
    Multiplexer<'a, B, TX, RX, T>
{
    /// Bind the transport halves and the report bus handle to the shared
    /// address cell.
    pub fn new(
        transport_tx: TX,
        transport_rx: RX,
        report_bus: B,
        timer: T,
        bus_id: u8,
        address: &'a AddressCell,
    ) -> Self {
        Self {
            tx: Mutex::new(TxSlot {
                transport: transport_tx,
                bus: report_bus,
                timer: timer.clone(),
            }),
            rx: Mutex::new(RxSlot {
                transport: transport_rx,
                timer,
            }),
            address,
            bus_id,
        }
    }

    /// Claimed source address, or `None` while unclaimed.
    pub fn address(&self) -> Option<u8> {
        self.address.get()
    }

    /// Send `payload` to `target` as a channel transfer.
    ///
    /// Waits for the send slot if another sender holds it, then races the
    /// segmented transmission against `timeout_ms`.
    pub async fn send(
        &self,
        payload: &[u8],
        target: u8,
        timeout_ms: u32,
    ) -> Result<(), SendError<TX::Error>> {
        let mut slot = self.tx.lock().await;
        let source = self.address.get().ok_or(SendError::NotClaimed)?;
        let id = CanId::channel(self.bus_id, target, source);

        let TxSlot {
            transport, timer, ..
        } = &mut *slot;

        let deadline = timer.delay_ms(timeout_ms);
        pin_mut!(deadline);
        let transfer = transport.send(id, payload);
        pin_mut!(transfer);

        match select(transfer, deadline).await {
            Either::Left((result, _)) => result.map_err(SendError::Transport),
            // Dropping the transfer future releases the slot on return.
            Either::Right(_) => Err(SendError::Timeout),
        }
    }

    /// Wait for the next channel transfer addressed to this node (or to
    /// broadcast) and copy it into `buf`.
    ///
    /// Transfers for other targets or foreign bus ids are skipped without
    /// being delivered. A payload larger than `buf` rejects the transfer
    /// entirely with `Truncated`; nothing is partially delivered.
    pub async fn receive(
        &self,
        buf: &mut [u8],
        timeout_ms: u32,
    ) -> Result<(usize, u8), ReceiveError<RX::Error>> {
        let mut slot = self.rx.lock().await;
        let RxSlot { transport, timer } = &mut *slot;

        let deadline = timer.delay_ms(timeout_ms);
        pin_mut!(deadline);

        loop {
            let arrival = {
                let transfer = transport.recv(&mut *buf);
                pin_mut!(transfer);

                match select(transfer, deadline.as_mut()).await {
                    Either::Left((result, _)) => result.map_err(ReceiveError::Transport)?,
                    Either::Right(_) => return Err(ReceiveError::Timeout),
                }
            };

            let (len, id) = arrival;
            let Ok(Message::Channel {
                bus_id,
                target,
                source,
                ..
            }) = id.classify()
            else {
                continue;
            };
            if bus_id != self.bus_id {
                continue;
            }
            if target != ADDR_BROADCAST && Some(target) != self.address.get() {
                continue;
            }
            if len > buf.len() {
                return Err(ReceiveError::Truncated {
                    len,
                    capacity: buf.len(),
                });
            }
            return Ok((len, source));
        }
    }

    /// Best-effort single-frame send for the report path.
    ///
    /// Never waits for the slot: a foreground transfer in progress yields
    /// `Busy` immediately so the caller can skip the cycle. An address
    /// re-negotiation in progress yields `NotClaimed` likewise.
    pub async fn try_publish(
        &self,
        frame: &CanFrame,
        timeout_ms: u32,
    ) -> Result<(), PublishError<B::Error>> {
        let Ok(mut slot) = self.tx.try_lock() else {
            return Err(PublishError::Busy);
        };
        if self.address.get().is_none() {
            return Err(PublishError::NotClaimed);
        }

        let TxSlot { bus, timer, .. } = &mut *slot;

        let deadline = timer.delay_ms(timeout_ms);
        pin_mut!(deadline);
        let emission = bus.send(frame);
        pin_mut!(emission);

        match select(emission, deadline).await {
            Either::Left((result, _)) => result.map_err(PublishError::Bus),
            Either::Right(_) => Err(PublishError::Timeout),
        }
    }
}

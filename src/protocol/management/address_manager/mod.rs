//! Automated lifecycle management for node addresses:
//! initial claim, conflict detection, defense, and reclaim.
use crate::error::{ClaimError, MonitorError};
use crate::protocol::management::address_claiming::{
    build_claim_frame, build_discovery_frame, claim_address, claim_identity, ClaimConfig,
};
use crate::protocol::transport::can_frame::CanFrame;
use crate::protocol::transport::can_id::{Message, ADDR_ANONYMOUS, ADDR_BROADCAST};
use crate::protocol::transport::traits::{can_bus::CanBus, link_timer::LinkTimer};
use core::sync::atomic::{AtomicU8, Ordering};
use futures_util::future::{select, Either};
use futures_util::pin_mut;
use rand_core::RngCore;

//==================================================================================ADDRESS_CELL
/// Shared cell publishing the node's claimed address.
///
/// The monitor writes it; the channel and report paths read it on every
/// operation. `ADDR_ANONYMOUS` encodes the unclaimed state, so the cell is
/// a single atomic byte with plain load/store semantics.
pub struct AddressCell(AtomicU8);

impl AddressCell {
    /// Cell starting in the unclaimed state.
    pub const fn new() -> Self {
        Self(AtomicU8::new(ADDR_ANONYMOUS))
    }

    /// Currently claimed address, or `None` while unclaimed.
    pub fn get(&self) -> Option<u8> {
        match self.0.load(Ordering::Relaxed) {
            ADDR_ANONYMOUS => None,
            address => Some(address),
        }
    }

    /// Publish a freshly claimed address.
    pub fn set(&self, address: u8) {
        self.0.store(address, Ordering::Relaxed);
    }

    /// Drop back to the unclaimed state.
    pub fn clear(&self) {
        self.0.store(ADDR_ANONYMOUS, Ordering::Relaxed);
    }
}

impl Default for AddressCell {
    fn default() -> Self {
        Self::new()
    }
}

//==================================================================================ADDRESS_MONITOR
/// Owner of the network-management plane.
/// Claims the initial address, then defends it against discovery probes and
/// competing claims, reclaiming a new one when the defense is lost.
pub struct AddressMonitor<'a, C: CanBus, T: LinkTimer, R: RngCore> {
    /// CAN bus handle reserved for single-frame management traffic.
    bus: C,
    /// Timer driving listening windows and claim backoff.
    timer: T,
    /// Entropy source for nonces, candidates, and backoff jitter.
    rng: R,
    /// 64-bit node identifier carried in claim frames.
    identity: u64,
    /// Claim windows and retry budget, reused on every reclaim.
    config: ClaimConfig,
    /// Shared cell the rest of the node reads the address from.
    address: &'a AddressCell,
}

impl<'a, C: CanBus, T: LinkTimer, R: RngCore> AddressMonitor<'a, C, T, R> {
    /// Perform the initial claim and instantiate the monitor with the
    /// obtained address published in `address`.
    ///
    /// This async constructor returns once the claim succeeds or fails
    /// definitively.
    pub async fn claim(
        mut bus: C,
        mut timer: T,
        mut rng: R,
        identity: u64,
        config: ClaimConfig,
        address: &'a AddressCell,
    ) -> Result<Self, ClaimError<C::Error>> {
        let claimed = claim_address(&mut bus, &mut timer, &mut rng, identity, &config).await?;
        address.set(claimed);

        Ok(Self {
            bus,
            timer,
            rng,
            identity,
            config,
            address,
        })
    }

    /// Address currently held, or `None` during a re-negotiation.
    pub fn current_address(&self) -> Option<u8> {
        self.address.get()
    }

    /// Wait up to `window_ms` for one management frame and apply the
    /// address rules to it. Returns normally when the window elapses
    /// quietly, so callers can interleave their own checks between polls.
    pub async fn poll(&mut self, window_ms: u32) -> Result<(), MonitorError<C::Error>> {
        let frame = {
            let tick = self.timer.delay_ms(window_ms);
            pin_mut!(tick);
            let recv = self.bus.recv();
            pin_mut!(recv);

            match select(tick, recv).await {
                Either::Left(_) => return Ok(()),
                Either::Right((incoming, _)) => incoming.map_err(MonitorError::Bus)?,
            }
        };
        self.handle_frame(&frame).await
    }

    /// Apply the address-management rules to one inbound frame.
    ///
    /// Channel and report frames are not ours to police and are ignored.
    /// Discovery probes for our address are answered with a claim; a
    /// competing claim for our address triggers the identity tiebreak, and
    /// losing it drops the cell to anonymous and runs a full reclaim.
    pub async fn handle_frame(&mut self, frame: &CanFrame) -> Result<(), MonitorError<C::Error>> {
        let Some(current) = self.address.get() else {
            return Ok(());
        };

        let Ok(Message::Network { target, source, .. }) = frame.id.classify() else {
            return Ok(());
        };

        if source == ADDR_ANONYMOUS {
            // Discovery probe: answer for our own address, and for the
            // broadcast target used by neighbour enumeration.
            if target == current || target == ADDR_BROADCAST {
                #[cfg(feature = "defmt")]
                defmt::debug!("Discovery probe for {}, defending", target);
                self.defend(current).await.map_err(MonitorError::Bus)?;
            }
        } else if source == current {
            match claim_identity(frame) {
                Some(theirs) if theirs < self.identity => {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("Address {} lost to a stronger claim, reclaiming", current);
                    self.reclaim().await.map_err(MonitorError::AddressLost)?;
                }
                Some(theirs) if theirs > self.identity => {
                    self.defend(current).await.map_err(MonitorError::Bus)?;
                }
                // Same identity (our own claim echoed back) or no payload.
                _ => {}
            }
        }

        Ok(())
    }

    /// Broadcast a discovery probe at the broadcast target and collect the
    /// claim responses for `window_ms`, deduplicated by source address.
    /// Returns the number of neighbours written into `neighbours`.
    pub async fn discover(
        &mut self,
        window_ms: u32,
        neighbours: &mut [(u8, u64)],
    ) -> Result<usize, MonitorError<C::Error>> {
        let nonce = (self.rng.next_u32() & 0xFF) as u8;
        let probe = build_discovery_frame(nonce, ADDR_BROADCAST);
        self.bus.send(&probe).await.map_err(MonitorError::Bus)?;

        let mut count = 0;
        let window = self.timer.delay_ms(window_ms);
        pin_mut!(window);

        loop {
            let recv = self.bus.recv();
            pin_mut!(recv);

            match select(window.as_mut(), recv).await {
                Either::Left(_) => return Ok(count),
                Either::Right((incoming, _)) => {
                    let frame = incoming.map_err(MonitorError::Bus)?;
                    let Ok(Message::Network { source, .. }) = frame.id.classify() else {
                        continue;
                    };
                    if source == ADDR_ANONYMOUS {
                        continue;
                    }
                    let Some(identity) = claim_identity(&frame) else {
                        continue;
                    };
                    // Some devices answer more than once; keep the first.
                    if count < neighbours.len()
                        && !neighbours[..count].iter().any(|(a, _)| *a == source)
                    {
                        neighbours[count] = (source, identity);
                        count += 1;
                    }
                }
            }
        }
    }

    /// Re-issue a claim to defend `address`.
    async fn defend(&mut self, address: u8) -> Result<(), C::Error> {
        let claim = build_claim_frame(self.config.bus_id, address, self.identity);
        self.bus.send(&claim).await
    }

    /// Attempt to acquire a new address after losing the previous one.
    async fn reclaim(&mut self) -> Result<(), ClaimError<C::Error>> {
        // Anonymous until the new claim lands; sends fail transiently.
        self.address.clear();

        let claimed = claim_address(
            &mut self.bus,
            &mut self.timer,
            &mut self.rng,
            self.identity,
            &self.config,
        )
        .await?;

        self.address.set(claimed);
        Ok(())
    }
}

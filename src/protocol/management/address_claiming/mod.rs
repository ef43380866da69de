//! Distributed address-claim algorithm:
//! broadcast a discovery probe, assert a claim, and fall back to a fresh
//! random candidate when another node contests it.
use crate::error::ClaimError;
use crate::protocol::transport::can_frame::CanFrame;
use crate::protocol::transport::can_id::{CanId, Message, ADDR_ANONYMOUS, ADDR_MAX};
use crate::protocol::transport::traits::can_bus::CanBus;
use crate::protocol::transport::traits::link_timer::LinkTimer;
use futures_util::future::{select, Either};
use futures_util::pin_mut;
use rand_core::RngCore;

//==================================================================================CLAIM_CONFIG
/// Tunable windows and retry budget for the claim cycle.
#[derive(Clone, Copy, Debug)]
pub struct ClaimConfig {
    /// Bus identifier stamped into the marker byte of claim frames.
    pub bus_id: u8,
    /// Listening window after the discovery broadcast (ms).
    pub discovery_window_ms: u32,
    /// Listening window after the claim broadcast (ms).
    pub contest_window_ms: u32,
    /// Fixed part of the post-collision backoff (ms).
    pub backoff_base_ms: u32,
    /// Random spread added to the backoff (ms). The actual delay is
    /// `backoff_base_ms + rng % backoff_spread_ms`.
    pub backoff_spread_ms: u32,
    /// Collision rounds tolerated before giving up entirely.
    pub max_attempts: u8,
}

impl Default for ClaimConfig {
    fn default() -> Self {
        Self {
            bus_id: crate::protocol::transport::can_id::BUS_ID_DEFAULT,
            discovery_window_ms: 250,
            contest_window_ms: 100,
            backoff_base_ms: 20,
            backoff_spread_ms: 100,
            max_attempts: 8,
        }
    }
}

//==================================================================================CLAIM_CYCLE
/// Outcome of one listening window.
enum Verdict {
    /// The window elapsed without a winning contestant.
    Undisputed,
    /// A contestant with a stronger key took the candidate.
    Lost,
}

/// How an inbound frame relates to the candidate under negotiation.
enum Contest {
    /// Not about our candidate, or our own frame echoed back.
    Ignored,
    /// Contestant with a weaker key; we keep the candidate.
    Won,
    /// Contestant with a stronger key; we must retry elsewhere.
    Lost,
}

/// Execute a full address-claim cycle and return the acquired address.
///
/// `identity` is the node's 64-bit unique identifier, carried as the claim
/// frame payload so that two nodes asserting the same address can still be
/// told apart.
///
/// Strategy:
/// 1. Draw a random nonce and a random candidate address.
/// 2. Broadcast a discovery probe and listen for contestants.
/// 3. If undisputed, broadcast a claim and hold a shorter contest window.
/// 4. On loss at either step, back off and retry with fresh random values,
///    up to the configured attempt budget.
pub async fn claim_address<C: CanBus, T: LinkTimer, R: RngCore>(
    bus: &mut C,
    timer: &mut T,
    rng: &mut R,
    identity: u64,
    config: &ClaimConfig,
) -> Result<u8, ClaimError<C::Error>> {
    for _attempt in 0..config.max_attempts {
        let nonce = (rng.next_u32() & 0xFF) as u8;
        let candidate = random_candidate(rng);

        #[cfg(feature = "defmt")]
        defmt::info!(
            "Discovery for candidate address {} (nonce {})",
            candidate,
            nonce
        );

        // Step 1: anonymous discovery probe.
        let probe = build_discovery_frame(nonce, candidate);
        bus.send(&probe).await.map_err(ClaimError::Send)?;

        // While discovering our only key is the nonce.
        match listen_window(
            bus,
            timer,
            config.discovery_window_ms,
            candidate,
            nonce,
            identity,
            None,
        )
        .await?
        {
            Verdict::Lost => {
                back_off(timer, rng, config).await;
                continue;
            }
            Verdict::Undisputed => {}
        }

        #[cfg(feature = "defmt")]
        defmt::info!("Discovery quiet, claiming address {}", candidate);

        // Step 2: assert the claim, then hold the contest window. From here
        // our key is the candidate itself and we defend against weaker
        // contestants instead of staying silent.
        let claim = build_claim_frame(config.bus_id, candidate, identity);
        bus.send(&claim).await.map_err(ClaimError::Send)?;

        match listen_window(
            bus,
            timer,
            config.contest_window_ms,
            candidate,
            candidate,
            identity,
            Some(claim),
        )
        .await?
        {
            Verdict::Lost => {
                #[cfg(feature = "defmt")]
                defmt::warn!("Lost contest for address {}, retrying", candidate);
                back_off(timer, rng, config).await;
                continue;
            }
            Verdict::Undisputed => {
                #[cfg(feature = "defmt")]
                defmt::info!("Address {} claimed", candidate);
                return Ok(candidate);
            }
        }
    }

    // Retry budget exhausted: no address available.
    Err(ClaimError::NoAddressAvailable)
}

/// Listen on `bus` for `window_ms`, watching for frames that contest
/// `candidate`.
///
/// `my_key` is our side of the tiebreak (nonce before the claim, the
/// candidate address after). `defense` is the frame re-broadcast whenever a
/// weaker contestant shows up; `None` while we have not asserted anything
/// yet.
async fn listen_window<C: CanBus, T: LinkTimer>(
    bus: &mut C,
    timer: &mut T,
    window_ms: u32,
    candidate: u8,
    my_key: u8,
    identity: u64,
    defense: Option<CanFrame>,
) -> Result<Verdict, ClaimError<C::Error>> {
    let window = timer.delay_ms(window_ms);
    pin_mut!(window);

    loop {
        let need_defense = {
            let recv = bus.recv();
            pin_mut!(recv);

            match select(window.as_mut(), recv).await {
                Either::Left(_) => return Ok(Verdict::Undisputed),

                Either::Right((incoming, _)) => {
                    let frame = incoming.map_err(ClaimError::Receive)?;
                    match evaluate_contest(&frame, candidate, my_key, identity) {
                        Contest::Ignored => false,
                        Contest::Won => defense.is_some(),
                        Contest::Lost => {
                            #[cfg(feature = "defmt")]
                            defmt::warn!("Contest lost on candidate {}", candidate);
                            return Ok(Verdict::Lost);
                        }
                    }
                }
            }
        }; // recv borrow is dropped here

        // Defensive transmission (outside the `recv` borrow scope).
        if need_defense {
            if let Some(frame) = &defense {
                bus.send(frame).await.map_err(ClaimError::Send)?;
            }
        }
    }
}

/// Decide a contest round for `candidate` against an inbound frame.
///
/// The primary key is the source address (nonce for anonymous frames); the
/// numerically lower key wins. Equal keys fall back to the identity payload
/// of claim frames; an equal or absent identity is our own transmission
/// echoed back.
fn evaluate_contest(frame: &CanFrame, candidate: u8, my_key: u8, identity: u64) -> Contest {
    let Some(their_key) = contest_key(frame, candidate) else {
        return Contest::Ignored;
    };
    if their_key != my_key {
        return if their_key < my_key {
            Contest::Lost
        } else {
            Contest::Won
        };
    }
    match claim_identity(frame) {
        Some(theirs) if theirs < identity => Contest::Lost,
        Some(theirs) if theirs > identity => Contest::Won,
        _ => Contest::Ignored,
    }
}

/// Randomized post-collision delay so repeated collisions desynchronize.
async fn back_off<T: LinkTimer, R: RngCore>(timer: &mut T, rng: &mut R, config: &ClaimConfig) {
    let mut delay = config.backoff_base_ms;
    if config.backoff_spread_ms > 0 {
        delay += rng.next_u32() % config.backoff_spread_ms;
    }
    timer.delay_ms(delay).await;
}

/// Draw a candidate from the assignable range `0..=ADDR_MAX`.
fn random_candidate<R: RngCore>(rng: &mut R) -> u8 {
    (rng.next_u32() % (ADDR_MAX as u32 + 1)) as u8
}

//==================================================================================CLAIM_FRAMES
/// Anonymous discovery probe for `candidate`, carrying our `nonce` in the
/// marker byte.
pub fn build_discovery_frame(nonce: u8, candidate: u8) -> CanFrame {
    CanFrame::empty(CanId::network(nonce, candidate, ADDR_ANONYMOUS))
}

/// Claim frame asserting ownership of `address` (target and source both
/// carry the claimed address; the payload carries the 64-bit identity).
pub fn build_claim_frame(bus_id: u8, address: u8, identity: u64) -> CanFrame {
    CanFrame::new(
        CanId::network(bus_id, address, address),
        &identity.to_le_bytes(),
    )
}

/// Tiebreak key of an inbound frame contesting `candidate`, or `None` when
/// the frame is not a network-management frame about `candidate`.
///
/// A claimed node's key is its source address; an anonymous contender's key
/// is the nonce from the marker byte.
pub(super) fn contest_key(frame: &CanFrame, candidate: u8) -> Option<u8> {
    match frame.id.classify() {
        Ok(Message::Network {
            marker,
            target,
            source,
            ..
        }) if target == candidate => {
            if source == ADDR_ANONYMOUS {
                Some(marker)
            } else {
                Some(source)
            }
        }
        _ => None,
    }
}

/// Extract the 64-bit identity from a claim frame payload.
pub(super) fn claim_identity(frame: &CanFrame) -> Option<u64> {
    if frame.len != 8 {
        return None;
    }
    Some(u64::from_le_bytes(frame.data))
}

//! `canlink` library: transport and addressing layer for device-management
//! protocols carried over a CAN bus, usable in a `no_std` environment.
//! The crate maps protocol concepts (requests, responses, periodic reports,
//! node addresses) onto 29-bit CAN identifiers, claims a unique bus address
//! without central coordination, and multiplexes segmented and single-frame
//! traffic through one explicitly-owned node instance.
#![no_std]
//==================================================================================
/// Domain and low-level errors (identifier decoding, address claiming,
/// channel transfers, publication, and related issues).
pub mod error;
/// Node instance: initialization, channel send/receive, request dispatch,
/// and the background network/publish actors.
pub mod node;
/// Protocol implementation: identifier codec and classification, transport
/// multiplexing, network management, and report publication.
pub mod protocol;
//==================================================================================

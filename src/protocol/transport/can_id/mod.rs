//! Creation, extraction, and classification of the 29-bit CAN identifiers
//! carrying device-management traffic (priority, message class, and
//! addressing fields).
use crate::error::IdentifierError;

//==================================================================================ADDRESSING

/// Highest node address that can be claimed.
pub const ADDR_MAX: u8 = 0xFD;
/// Source address used before a node has claimed an address.
pub const ADDR_ANONYMOUS: u8 = 0xFE;
/// Target address reaching every node on the bus.
pub const ADDR_BROADCAST: u8 = 0xFF;

/// Default bus id for channel traffic (ISO 15765-2 normal fixed
/// addressing, N_TAtype = physical).
pub const BUS_ID_DEFAULT: u8 = 0xDA;

//==================================================================================PRIORITIES

// Lower numeric value wins CAN arbitration, so the most urgent traffic
// carries the smallest code.

/// Emergency control traffic (reserved band).
pub const PRIO_CONTROL_EMERGENCY: u8 = 0;
/// High-urgency control traffic (reserved band).
pub const PRIO_CONTROL_HIGH: u8 = 2;
/// Low-urgency control traffic (reserved band).
pub const PRIO_CONTROL_LOW: u8 = 3;
/// Network management (discovery and claim frames).
pub const PRIO_NETWORK: u8 = 4;
/// High-priority report traffic.
pub const PRIO_REPORT_HIGH: u8 = 5;
/// Channel (request/response) traffic.
pub const PRIO_CHANNEL: u8 = 6;
/// Low-priority report traffic.
pub const PRIO_REPORT_LOW: u8 = 7;

/// Priorities below this threshold are reserved for control urgency and
/// never valid on report identifiers.
pub const PRIO_REPORT_MIN: u8 = 4;

//==================================================================================BIT_LAYOUT

const PRIO_POS: u32 = 26;
const CLASS_POS: u32 = 24;
const MARKER_POS: u32 = 16;
const TARGET_POS: u32 = 8;
const DATA_ID_POS: u32 = 8;

const ID_MASK: u32 = 0x1FFF_FFFF;

/// Class bits for channel (request/response) identifiers.
pub const CLASS_CHANNEL: u8 = 0b00;
/// Class bits for report (single-frame telemetry) identifiers.
pub const CLASS_REPORT: u8 = 0b10;
/// Class bits for network-management identifiers.
pub const CLASS_NETWORK: u8 = 0b11;

//==================================================================================CAN_ID
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Encapsulates an extended CAN identifier (29 bits) and exposes accessors
/// for priority, message class, and the class-specific address fields.
pub struct CanId(pub u32);

impl CanId {
    /// Channel identifier (priority 6) for a request/response transfer.
    pub fn channel(bus_id: u8, target: u8, source: u8) -> Self {
        Self::pack(PRIO_CHANNEL, CLASS_CHANNEL, bus_id, target, source)
    }

    /// Report identifier. The 16-bit data id spans the marker and target
    /// bytes. Defaults to the low report priority; use [`with_priority`]
    /// for high-priority reports.
    ///
    /// [`with_priority`]: CanId::with_priority
    pub fn report(data_id: u16, source: u8) -> Self {
        let id = ((PRIO_REPORT_LOW as u32) << PRIO_POS)
            | ((CLASS_REPORT as u32) << CLASS_POS)
            | ((data_id as u32) << DATA_ID_POS)
            | (source as u32);
        Self(id & ID_MASK)
    }

    /// Network-management identifier (priority 4). The marker byte carries
    /// a random nonce on discovery frames and the bus id on claim frames.
    pub fn network(marker: u8, target: u8, source: u8) -> Self {
        Self::pack(PRIO_NETWORK, CLASS_NETWORK, marker, target, source)
    }

    /// Replace the 3-bit priority field, masking stray bits.
    pub fn with_priority(self, priority: u8) -> Self {
        let cleared = self.0 & !(0x7 << PRIO_POS);
        Self(cleared | (((priority & 0x07) as u32) << PRIO_POS))
    }

    // Out-of-range inputs truncate by masking; validation lives in the
    // classifier and the engines above it.
    fn pack(priority: u8, class: u8, marker: u8, target: u8, source: u8) -> Self {
        let id = (((priority & 0x07) as u32) << PRIO_POS)
            | (((class & 0x03) as u32) << CLASS_POS)
            | ((marker as u32) << MARKER_POS)
            | ((target as u32) << TARGET_POS)
            | (source as u32);
        Self(id & ID_MASK)
    }

    // Getters used to deconstruct the identifier
    /// Returns the priority (3 bits, value 0-7) encoded in the identifier.
    pub fn priority(&self) -> u8 {
        ((self.0 >> PRIO_POS) & 0x07) as u8
    }

    /// Returns the two message-class bits.
    pub fn class_bits(&self) -> u8 {
        ((self.0 >> CLASS_POS) & 0x03) as u8
    }

    /// Variable byte at bits 16-23: bus id on channel identifiers, nonce or
    /// bus id on network-management identifiers, data-id high byte on
    /// report identifiers.
    pub fn marker(&self) -> u8 {
        ((self.0 >> MARKER_POS) & 0xFF) as u8
    }

    /// Target address byte (channel and network-management identifiers).
    pub fn target(&self) -> u8 {
        ((self.0 >> TARGET_POS) & 0xFF) as u8
    }

    /// 16-bit data id of a report identifier.
    pub fn data_id(&self) -> u16 {
        ((self.0 >> DATA_ID_POS) & 0xFFFF) as u16
    }

    /// Eight-bit source address (logical node identifier on the bus).
    pub fn source(&self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    /// Raw identifier value, masked to 29 bits.
    pub fn raw(&self) -> u32 {
        self.0 & ID_MASK
    }

    //==============================================================================CLASSIFY
    /// Assign the identifier to exactly one message class.
    ///
    /// The class bits alone decide channel vs network management. Report
    /// classification additionally requires a priority at or above
    /// [`PRIO_REPORT_MIN`]; the reserved control band must never carry
    /// report semantics even when the class bits match. Any other pattern
    /// is a decode error and the frame must be dropped, not misrouted.
    pub fn classify(&self) -> Result<Message, IdentifierError> {
        let priority = self.priority();
        match self.class_bits() {
            CLASS_CHANNEL => Ok(Message::Channel {
                priority,
                bus_id: self.marker(),
                target: self.target(),
                source: self.source(),
            }),
            CLASS_REPORT => {
                if priority < PRIO_REPORT_MIN {
                    return Err(IdentifierError::ReservedPriority { priority });
                }
                Ok(Message::Report {
                    priority,
                    data_id: self.data_id(),
                    source: self.source(),
                })
            }
            CLASS_NETWORK => Ok(Message::Network {
                priority,
                marker: self.marker(),
                target: self.target(),
                source: self.source(),
            }),
            other => Err(IdentifierError::UnknownClass { class_bits: other }),
        }
    }
}

//==================================================================================MESSAGE
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Decoded view of an identifier, one variant per message class.
pub enum Message {
    /// Request/response transfer over the segmented transport.
    Channel {
        priority: u8,
        bus_id: u8,
        target: u8,
        source: u8,
    },
    /// Single-frame telemetry publication.
    Report {
        priority: u8,
        data_id: u16,
        source: u8,
    },
    /// Address discovery/claim traffic.
    Network {
        priority: u8,
        /// Nonce on discovery frames, bus id on claim frames.
        marker: u8,
        target: u8,
        source: u8,
    },
}

//==================================================================================EMBEDDED_CAN

impl From<CanId> for embedded_can::ExtendedId {
    fn from(id: CanId) -> Self {
        // Masked to 29 bits, so the conversion cannot be out of range.
        embedded_can::ExtendedId::new(id.raw()).unwrap_or(embedded_can::ExtendedId::MAX)
    }
}

impl From<embedded_can::ExtendedId> for CanId {
    fn from(id: embedded_can::ExtendedId) -> Self {
        Self(id.as_raw())
    }
}

//==================================================================================TESTS
#[cfg(test)]
#[path = "tests.rs"]
mod tests;

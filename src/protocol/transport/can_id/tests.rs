//! Unit tests for the `CanId` codec and classifier.
use super::*;

//==================================================================================CAN_ID
#[test]
/// Channel encode scenario: priority 6, bus id 0xDA, target 0x05, source
/// 0x02 must land bit-exact.
fn test_channel_encode() {
    let can_id = CanId::channel(BUS_ID_DEFAULT, 0x05, 0x02);
    assert_eq!(can_id.0, 0x18DA_0502);
    assert_eq!(can_id.priority(), PRIO_CHANNEL);
    assert_eq!(can_id.class_bits(), CLASS_CHANNEL);
    assert_eq!(can_id.marker(), 0xDA);
    assert_eq!(can_id.target(), 0x05);
    assert_eq!(can_id.source(), 0x02);
}

#[test]
/// Report data id splits into a high byte at bits 16-23 and a low byte at
/// bits 8-15.
fn test_report_data_id_split() {
    let can_id = CanId::report(0x1234, 0x03);
    assert_eq!(can_id.0, 0x1E12_3403);
    assert_eq!(can_id.marker(), 0x12);
    assert_eq!(can_id.target(), 0x34);
    assert_eq!(can_id.data_id(), 0x1234);
    assert_eq!(can_id.source(), 0x03);
}

#[test]
/// Network-management identifiers carry the nonce byte, the candidate
/// target, and the anonymous source.
fn test_network_encode() {
    let can_id = CanId::network(0xAB, 0x10, ADDR_ANONYMOUS);
    assert_eq!(can_id.0, 0x13AB_10FE);
    assert_eq!(can_id.priority(), PRIO_NETWORK);
    assert_eq!(can_id.class_bits(), CLASS_NETWORK);
}

#[test]
/// Round trip: decoding a constructed identifier returns the original
/// tuple for every class.
fn test_round_trip() {
    let channel = CanId::channel(0xDA, 0x05, 0x02);
    assert_eq!(
        channel.classify(),
        Ok(Message::Channel {
            priority: 6,
            bus_id: 0xDA,
            target: 0x05,
            source: 0x02,
        })
    );

    let report = CanId::report(0x1234, 0x03).with_priority(PRIO_REPORT_HIGH);
    assert_eq!(
        report.classify(),
        Ok(Message::Report {
            priority: 5,
            data_id: 0x1234,
            source: 0x03,
        })
    );

    let network = CanId::network(0x42, 0x10, ADDR_ANONYMOUS);
    assert_eq!(
        network.classify(),
        Ok(Message::Network {
            priority: 4,
            marker: 0x42,
            target: 0x10,
            source: ADDR_ANONYMOUS,
        })
    );
}

#[test]
/// The priority must be capped to 3 bits to avoid touching the reserved
/// upper bits.
fn test_priority_masks_extra_bits() {
    let can_id = CanId::channel(0xDA, 0x05, 0x02).with_priority(0b1111_0000);
    assert_eq!(can_id.0 & !ID_MASK, 0, "Bits above 29 must remain clear");
    assert_eq!(can_id.priority(), 0);
    // Remaining fields untouched by the priority rewrite
    assert_eq!(can_id.marker(), 0xDA);
    assert_eq!(can_id.source(), 0x02);
}

//==================================================================================CLASSIFIER
#[test]
/// Class bits 0b01 match no defined message class and must surface a
/// decode error.
fn test_unknown_class_rejected() {
    let can_id = CanId(0x0100_0000 | (6 << 26));
    assert_eq!(
        can_id.classify(),
        Err(IdentifierError::UnknownClass { class_bits: 0b01 })
    );
}

#[test]
/// Report-class patterns carrying a control-band priority are invalid.
fn test_report_control_priority_rejected() {
    for priority in 0..PRIO_REPORT_MIN {
        let can_id = CanId::report(0x0100, 0x07).with_priority(priority);
        assert_eq!(
            can_id.classify(),
            Err(IdentifierError::ReservedPriority { priority })
        );
    }
    // The threshold itself is valid report territory.
    let can_id = CanId::report(0x0100, 0x07).with_priority(PRIO_REPORT_MIN);
    assert!(can_id.classify().is_ok());
}

#[test]
/// Every combination of class bits and priority maps to exactly one
/// outcome: one of the three classes, or a decode error.
fn test_classification_partition() {
    for class in 0u8..4 {
        for priority in 0u8..8 {
            let can_id = CanId(
                ((priority as u32) << 26) | ((class as u32) << 24) | 0x00DA_0502,
            );
            let result = can_id.classify();
            match (class, priority) {
                (CLASS_CHANNEL, _) => {
                    assert!(matches!(result, Ok(Message::Channel { .. })))
                }
                (CLASS_REPORT, p) if p >= PRIO_REPORT_MIN => {
                    assert!(matches!(result, Ok(Message::Report { .. })))
                }
                (CLASS_REPORT, _) => assert!(matches!(
                    result,
                    Err(IdentifierError::ReservedPriority { .. })
                )),
                (CLASS_NETWORK, _) => {
                    assert!(matches!(result, Ok(Message::Network { .. })))
                }
                _ => assert!(matches!(
                    result,
                    Err(IdentifierError::UnknownClass { .. })
                )),
            }
        }
    }
}

//==================================================================================EMBEDDED_CAN
#[test]
/// Conversion to the HAL identifier type and back preserves the raw value.
fn test_extended_id_conversion() {
    let can_id = CanId::channel(0xDA, 0x05, 0x02);
    let extended: embedded_can::ExtendedId = can_id.into();
    assert_eq!(extended.as_raw(), 0x18DA_0502);
    assert_eq!(CanId::from(extended), can_id);
}

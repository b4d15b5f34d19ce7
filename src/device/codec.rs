//! Translation between characteristic payloads and typed values.
//!
//! The byte layouts were reverse engineered from the vendor app and are fixed. Decoding never
//! fails the session; callers log the error and drop the payload.

use std::fmt::Write;
use uuid::Uuid;

use crate::device::constants::{
    BATTERY_MAX_VOLTAGE, BATTERY_MIN_VOLTAGE, ROCKING_DISC_ENGAGED_FLAG, ROCKING_DURATION,
    ROCKING_ERROR_BRAKE_NOT_ENGAGED, ROCKING_ERROR_MASK, ROCKING_INTENSITY_MASK,
    ROCKING_STOP_ON_DISCONNECT_FLAG,
};
use crate::device::types::{
    Characteristic, CommandIntent, NotificationEvent, RockingError, RockingEvent, StatusEvent,
    TelemetryEvent,
};
use crate::error::CodecError;

const STATUS_MIN_LENGTH: usize = 4;
const ROCKING_MIN_LENGTH: usize = 4;

/// Lowercase hex, two digits per byte, no separator.
pub fn to_hex(raw: &[u8]) -> String {
    let mut hex = String::with_capacity(raw.len() * 2);
    for byte in raw {
        // writing to a String can not fail
        let _ = write!(hex, "{:02x}", byte);
    }
    hex
}

/// Combine two bytes into a u16, the first byte being the low byte.
fn pair(low: u8, high: u8) -> u16 {
    u16::from(low) | (u16::from(high) << 8)
}

fn battery_percent(battery_volts: u16) -> u8 {
    let range = f32::from(BATTERY_MAX_VOLTAGE - BATTERY_MIN_VOLTAGE);
    let above_min = f32::from(battery_volts) - f32::from(BATTERY_MIN_VOLTAGE);

    (above_min / range * 100.0_f32)
        .clamp(0.0_f32, 100.0_f32)
        .round() as u8
}

pub fn decode_status(raw: &[u8]) -> Result<StatusEvent, CodecError> {
    if raw.len() < STATUS_MIN_LENGTH {
        return Err(CodecError::MalformedPayload {
            characteristic: Characteristic::Status,
            length: raw.len(),
        });
    }

    let battery_volts = u16::from(raw[3]) * 2;

    Ok(StatusEvent {
        raw: raw.to_vec(),
        battery_percent: battery_percent(battery_volts),
    })
}

pub fn decode_notification(source_id: Uuid, raw: &[u8]) -> NotificationEvent {
    NotificationEvent {
        source_id,
        raw: raw.to_vec(),
        hex: to_hex(raw),
    }
}

/// Returns `Ok(None)` for partial frames shorter than 4 bytes.
pub fn decode_rocking(raw: &[u8]) -> Result<Option<RockingEvent>, CodecError> {
    if raw.len() < ROCKING_MIN_LENGTH {
        return Ok(None);
    }

    // set_time is stored in bytes 3 and 4
    if raw.len() < 5 {
        return Err(CodecError::MalformedPayload {
            characteristic: Characteristic::Rocking,
            length: raw.len(),
        });
    }

    let error = if raw[0] ^ ROCKING_ERROR_MASK != ROCKING_ERROR_BRAKE_NOT_ENGAGED {
        RockingError::Unknown
    } else {
        RockingError::BrakeNotEngaged
    };

    Ok(Some(RockingEvent {
        error,
        intensity: raw[0] & ROCKING_INTENSITY_MASK,
        time_left_seconds: pair(raw[1], raw[2]),
        set_time_seconds: pair(raw[3], raw[4]),
        disc_engaged: raw[0] & ROCKING_DISC_ENGAGED_FLAG != 0,
        raw: raw.to_vec(),
    }))
}

/// Decode a payload received on `characteristic`.
pub fn decode(
    characteristic: Characteristic,
    source_id: Uuid,
    raw: &[u8],
) -> Result<Option<TelemetryEvent>, CodecError> {
    match characteristic {
        Characteristic::Status => decode_status(raw).map(|event| Some(TelemetryEvent::Status(event))),
        Characteristic::Notification => {
            Ok(Some(TelemetryEvent::Notification(decode_notification(source_id, raw))))
        },
        Characteristic::Rocking => decode_rocking(raw).map(|event| event.map(TelemetryEvent::Rocking)),
    }
}

pub fn encode_command(intent: &CommandIntent) -> Vec<u8> {
    match *intent {
        CommandIntent::SetSupportLevel { level } => vec![level as u8],
        CommandIntent::SetRocking { intensity, stop_on_disconnect } => {
            let mut flags = intensity as u8;
            if stop_on_disconnect {
                flags |= ROCKING_STOP_ON_DISCONNECT_FLAG;
            }

            let [low, high] = ROCKING_DURATION.to_le_bytes();
            vec![flags, low, high]
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::constants::{make_notification_uuid, make_rocking_uuid, make_status_uuid};
    use crate::device::types::{RockingIntensity, SupportLevel};

    #[test]
    fn status_battery_percentage() {
        assert_eq!(decode_status(&[0, 0, 0, 100]).unwrap().battery_percent, 0);
        assert_eq!(decode_status(&[0, 0, 0, 157]).unwrap().battery_percent, 0);
        assert_eq!(decode_status(&[0, 0, 0, 190]).unwrap().battery_percent, 100);
        assert_eq!(decode_status(&[0, 0, 0, 255]).unwrap().battery_percent, 100);
        // 348 volts: 33 / 65 * 100 = 50.77
        assert_eq!(decode_status(&[0, 0, 0, 174]).unwrap().battery_percent, 51);
    }

    #[test]
    fn status_battery_percentage_is_always_in_range() {
        for byte in 0..=u8::MAX {
            let event = decode_status(&[1, 2, 3, byte, 5]).unwrap();
            assert!(event.battery_percent <= 100);
            assert_eq!(event.battery_percent, decode_status(&[9, 9, 9, byte]).unwrap().battery_percent);
        }
    }

    #[test]
    fn status_keeps_raw_bytes() {
        let event = decode_status(&[0xde, 0xad, 0xbe, 0xef, 0x01]).unwrap();
        assert_eq!(event.raw, vec![0xde, 0xad, 0xbe, 0xef, 0x01]);
    }

    #[test]
    fn status_too_short() {
        assert_eq!(
            decode_status(&[0, 0, 0]),
            Err(CodecError::MalformedPayload { characteristic: Characteristic::Status, length: 3 }),
        );
    }

    #[test]
    fn notification_hex() {
        let uuid = make_notification_uuid();
        let event = decode_notification(uuid, &[0x0a, 0xff, 0x00]);
        assert_eq!(event.source_id, uuid);
        assert_eq!(event.raw, vec![0x0a, 0xff, 0x00]);
        assert_eq!(event.hex, "0aff00");

        assert_eq!(decode_notification(uuid, &[]).hex, "");
    }

    #[test]
    fn rocking_telemetry() {
        let event = decode_rocking(&[0x94, 0x0A, 0x00, 0x37, 0x00]).unwrap().unwrap();
        assert_eq!(event.error, RockingError::BrakeNotEngaged);
        assert_eq!(event.intensity, 4);
        assert!(event.disc_engaged);
        assert_eq!(event.time_left_seconds, 10);
        assert_eq!(event.set_time_seconds, 55);
    }

    #[test]
    fn rocking_telemetry_unknown_error() {
        let event = decode_rocking(&[0x03, 0x2c, 0x01, 0x37, 0x01, 0xff]).unwrap().unwrap();
        assert_eq!(event.error, RockingError::Unknown);
        assert_eq!(event.intensity, 3);
        assert!(!event.disc_engaged);
        assert_eq!(event.time_left_seconds, 300);
        assert_eq!(event.set_time_seconds, 311);
    }

    #[test]
    fn rocking_partial_frames_are_ignored() {
        for length in 0..4 {
            assert_eq!(decode_rocking(&vec![0x94; length]), Ok(None));
        }
    }

    #[test]
    fn rocking_four_bytes_is_malformed() {
        assert_eq!(
            decode_rocking(&[0x94, 0x0A, 0x00, 0x37]),
            Err(CodecError::MalformedPayload { characteristic: Characteristic::Rocking, length: 4 }),
        );
    }

    #[test]
    fn decode_dispatches_per_characteristic() {
        assert!(matches!(
            decode(Characteristic::Status, make_status_uuid(), &[0, 0, 0, 190]),
            Ok(Some(TelemetryEvent::Status(StatusEvent { battery_percent: 100, .. }))),
        ));
        assert!(matches!(
            decode(Characteristic::Notification, make_notification_uuid(), &[1]),
            Ok(Some(TelemetryEvent::Notification(_))),
        ));
        assert_eq!(decode(Characteristic::Rocking, make_rocking_uuid(), &[1, 2]), Ok(None));
        assert!(decode(Characteristic::Status, make_status_uuid(), &[]).is_err());
    }

    #[test]
    fn encode_support_level() {
        let intent = CommandIntent::SetSupportLevel { level: SupportLevel::Eco };
        assert_eq!(encode_command(&intent), vec![1]);
        let intent = CommandIntent::SetSupportLevel { level: SupportLevel::Boost };
        assert_eq!(encode_command(&intent), vec![3]);
    }

    #[test]
    fn encode_rocking() {
        let intent = CommandIntent::SetRocking {
            intensity: RockingIntensity::Medium,
            stop_on_disconnect: true,
        };
        assert_eq!(encode_command(&intent), vec![18, 55, 0]);

        let intent = CommandIntent::SetRocking {
            intensity: RockingIntensity::Off,
            stop_on_disconnect: false,
        };
        assert_eq!(encode_command(&intent), vec![0, 55, 0]);
    }
}

use uuid::Uuid;

/**
 * Company identifier found in the manufacturer data of the advertisements sent by the device.
 */
pub const MANUFACTURER_ID: u16 = 1933;

/**
 * How often (milliseconds) to re-issue discovery when no matching device was found.
 */
pub const DISCOVERY_INTERVAL: u64 = 1000;

/**
 * How often (milliseconds) to poll the transport until a new connection reports itself as connected.
 */
pub const CONNECTION_POLL_DELAY: u64 = 100;

/**
 * How often (milliseconds) to check that an active connection is still alive.
 */
pub const LIVENESS_INTERVAL: u64 = 1000;

/**
 * How long (milliseconds) a write to a characteristic may take.
 */
pub const WRITE_DEADLINE: u64 = 2000;

/**
 * How long (milliseconds) checking if the peripheral is still connected may take
 */
pub const IS_CONNECTED_DEADLINE: u64 = 2000;

/**
 * Notifies battery status. Byte 3 holds half the battery voltage.
 */
pub const STATUS_CHARACTERISTIC: &str = "a1fc0102-78d3-40c2-9b6f-3c5f7b2797df";

/**
 * Generic notifications. Support level writes are also sent here.
 */
pub const NOTIFICATION_CHARACTERISTIC: &str = "a1fc0103-78d3-40c2-9b6f-3c5f7b2797df";

/**
 * Rocking telemetry notifications and rocking commands.
 */
pub const ROCKING_CHARACTERISTIC: &str = "a1fc0104-78d3-40c2-9b6f-3c5f7b2797df";

/**
 * Battery voltage (decivolts) that is reported as 0% and 100%.
 */
pub const BATTERY_MIN_VOLTAGE: u16 = 315;
pub const BATTERY_MAX_VOLTAGE: u16 = 380;

/**
 * Duration (seconds) sent along with every rocking command.
 */
pub const ROCKING_DURATION: u16 = 55;

pub const ROCKING_STOP_ON_DISCONNECT_FLAG: u8 = 0b0001_0000;
pub const ROCKING_DISC_ENGAGED_FLAG: u8 = 0b0001_0000;
pub const ROCKING_INTENSITY_MASK: u8 = 0x0F;
pub const ROCKING_ERROR_MASK: u8 = 0x80;
pub const ROCKING_ERROR_BRAKE_NOT_ENGAGED: u8 = 20;

pub fn make_status_uuid() -> Uuid {
    Uuid::from_u128(0xa1fc0102_78d3_40c2_9b6f_3c5f7b2797df)
}

pub fn make_notification_uuid() -> Uuid {
    Uuid::from_u128(0xa1fc0103_78d3_40c2_9b6f_3c5f7b2797df)
}

pub fn make_rocking_uuid() -> Uuid {
    Uuid::from_u128(0xa1fc0104_78d3_40c2_9b6f_3c5f7b2797df)
}

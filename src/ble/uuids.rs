//! GATT identifiers for the trainer and steering plate.

use uuid::Uuid;

/// Bluetooth SIG base UUID (`0000xxxx-0000-1000-8000-00805f9b34fb`)
const BLUETOOTH_BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5f9b_34fb;

/// Expand a 16-bit SIG-assigned id onto the Bluetooth base UUID.
pub const fn sig_uuid(short: u16) -> Uuid {
    Uuid::from_u128(BLUETOOTH_BASE_UUID | ((short as u128) << 96))
}

/// Fitness Machine Service (0x1826)
pub const FTMS_SERVICE: Uuid = sig_uuid(0x1826);

/// Indoor Bike Data characteristic (0x2AD2, notify)
pub const FTMS_INDOOR_BIKE_DATA: Uuid = sig_uuid(0x2AD2);

/// Fitness Machine Control Point characteristic (0x2AD9, write)
pub const FTMS_CONTROL_POINT: Uuid = sig_uuid(0x2AD9);

/// Cycling Power Service (0x1818)
pub const CPS_SERVICE: Uuid = sig_uuid(0x1818);

/// Cycling Power Measurement characteristic (0x2A63, notify)
pub const CPS_MEASUREMENT: Uuid = sig_uuid(0x2A63);

/// Sterzo steering plate service
pub const STERZO_SERVICE: Uuid = Uuid::from_u128(0x347b0001_7635_408b_8918_8ff3949ce592);

/// Sterzo steering angle characteristic (notify)
pub const STERZO_STEERING: Uuid = Uuid::from_u128(0x347b0030_7635_408b_8918_8ff3949ce592);

/// Sterzo control point characteristic (write)
pub const STERZO_CONTROL_POINT: Uuid = Uuid::from_u128(0x347b0031_7635_408b_8918_8ff3949ce592);

/// Sterzo challenge characteristic (notify)
pub const STERZO_CHALLENGE: Uuid = Uuid::from_u128(0x347b0032_7635_408b_8918_8ff3949ce592);

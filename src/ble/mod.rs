//! # BLE Abstraction Module
//!
//! The boundary between the device protocols and whatever BLE stack the host
//! provides.
//!
//! This module handles:
//! - Service and characteristic UUIDs for FTMS, CPS and Sterzo
//! - The `Characteristic` and `Peripheral` traits a transport adapter implements
//! - Notification streams as cancellable `Subscription`s
//!
//! Scanning, pairing and GATT discovery belong to the adapter; the protocols
//! only ever see resolved characteristics.

pub mod characteristic;
pub mod uuids;

pub use characteristic::{Characteristic, Peripheral, Subscription, SUBSCRIPTION_CAPACITY};

//! Sensor interface for the Corsair Commander Core XT
//!
//! This crate turns the controller's endpoint payloads into hwmon-style
//! sensors on top of a `ccxt_transport::Session`:
//!
//! - payload decoders with channel validation (`decode`)
//! - cached connectivity, labels, targets and firmware (`state`)
//! - sensor addressing and visibility (`sensor`)
//! - the device facade with attach/detach lifecycle (`device`)
//! - a blocking wrapper for synchronous callers (`sync`)

pub mod decode;
pub mod device;
pub mod error;
pub mod sensor;
pub mod state;
pub mod sync;

pub use decode::FanInventory;
pub use device::Commander;
pub use error::HwmonError;
pub use sensor::{Access, FanAttr, Sensor, SensorValue};
pub use state::{ChannelLimits, ChannelSet, DeviceState, FirmwareVersion};
pub use sync::SyncCommander;

pub use ccxt_transport::ErrorKind;

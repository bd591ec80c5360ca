// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! USB vendor-request bridge to an I2C bus and two 8-bit GPIO ports.
//!
//! A host talks to the device exclusively through control transfers on EP0.
//! Four vendor requests are understood:
//!
//! - `0x22` moves an arbitrary number of bytes to or from an I2C target,
//!   chunked through the 64-byte EP0 buffer.
//! - `0x23` reads or writes the direction or value register of GPIO port A or
//!   B. Value writes only touch bits configured as outputs.
//! - `0xA3` makes the device drop off the bus and come back, so the host
//!   enumerates it again.
//! - `0xA4` selects or reports the I2C bus speed (100 kHz or 400 kHz).
//!
//! Everything in this library is hardware-independent. The actual chip is
//! reached through the traits in [`hal`], which the RP2040 firmware in
//! `main.rs` implements on top of raw registers, and which the tests implement
//! on top of simulated hardware.
//!
//! Control flow, for one control transfer:
//!
//! 1. The firmware copies the SETUP packet out of the controller and decodes
//!    it with [`ControlRequest::parse`].
//! 2. [`Bridge::handle_setup`] works out what the request means
//!    ([`dispatch::route`]) and runs it. Any data stage goes through the
//!    [`TransferBuffer`], which owns EP0's buffer for the duration.
//! 3. The status stage is completed, and the firmware goes back to polling.
//!
//! Bus reset and high-speed negotiation are handled separately by the
//! [`DescriptorSwitch`], which can be poked from interrupt context.

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod descriptor;
pub mod dispatch;
pub mod ep0;
pub mod error;
pub mod gpio;
pub mod hal;
pub mod i2c;
pub mod lifecycle;
pub mod setup;
pub mod speed;
pub mod state;

pub use config::Config;
pub use dispatch::{Bridge, Route, Status, VendorRequest};
pub use ep0::{TransferBuffer, EP0_BUFFER_SIZE};
pub use error::{Error, I2cError};
pub use gpio::{GpioAccess, GpioRegister, Port};
pub use setup::{ControlRequest, RequestKind, UsbDir};
pub use speed::{DescriptorSet, DescriptorSwitch, SpeedDescriptors};
pub use state::{BusSpeed, DeviceContext};

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mutable device state that outlives a single control transfer.

/// I2C SCL rate.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BusSpeed {
    /// 100 kHz.
    Standard,
    /// 400 kHz.
    Fast,
}

impl BusSpeed {
    /// Interprets the flag byte of a speed request: zero is standard, anything
    /// else is fast.
    pub fn from_flag(flag: u8) -> Self {
        if flag != 0 {
            Self::Fast
        } else {
            Self::Standard
        }
    }

    pub fn is_fast(self) -> bool {
        self == Self::Fast
    }
}

/// Everything the dispatcher remembers between transfers. There is exactly
/// one of these, owned by the `Bridge`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceContext {
    /// Value from the last SET_CONFIGURATION, 0 if unconfigured.
    pub configuration: u8,
    /// Value from the last SET_INTERFACE.
    pub alternate_setting: u8,
    pub speed: BusSpeed,
    /// I2C transfers that failed on the bus but were answered anyway.
    pub i2c_errors: u32,
}

impl DeviceContext {
    pub const fn new(speed: BusSpeed) -> Self {
        Self {
            configuration: 0,
            alternate_setting: 0,
            speed,
            i2c_errors: 0,
        }
    }
}

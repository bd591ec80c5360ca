// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Runtime knobs. Pin assignments are not here; they are fixed per board by
//! cargo feature in the firmware.

use crate::state::BusSpeed;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// How long to wait for the host to pick up or fill the EP0 buffer before
    /// giving up on the transfer. USB 2.0 gives the host 5 seconds for a data
    /// stage, so waiting any longer than that is pointless.
    pub ep0_timeout_us: u32,
    /// Delay between acknowledging a re-enumerate request and dropping off the
    /// bus. Gives the host time to see the status stage.
    pub renumerate_delay_ms: u32,
    /// How long to stay disconnected during re-enumeration.
    pub disconnect_ms: u32,
    /// I2C speed selected at power-up.
    pub default_speed: BusSpeed,
}

impl Config {
    pub const DEFAULT: Self = Self {
        ep0_timeout_us: 5_000_000,
        renumerate_delay_ms: 1000,
        disconnect_ms: 1500,
        default_speed: BusSpeed::Standard,
    };
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}

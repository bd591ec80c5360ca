// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device-level requests: I2C speed and re-enumeration. Also power-up.

use crate::config::Config;
use crate::ep0::TransferBuffer;
use crate::error::Error;
use crate::hal::{BusPresence, Clock, ControlEndpoint, I2cBus};
use crate::setup::UsbDir;
use crate::state::{BusSpeed, DeviceContext};

/// Brings the I2C side to its power-up state.
pub fn init<B: I2cBus>(bus: &mut B, ctx: &mut DeviceContext, config: &Config) {
    set_speed(bus, ctx, config.default_speed);
}

pub fn set_speed<B: I2cBus>(bus: &mut B, ctx: &mut DeviceContext, speed: BusSpeed) {
    bus.set_fast_mode(speed.is_fast());
    ctx.speed = speed;
    log::debug!("I2C speed {:?}", speed);
}

/// Sends the host one byte: 1 if the bus runs at 400 kHz, 0 otherwise.
pub fn report_speed<E, C>(ep0: &mut TransferBuffer<E, C>, ctx: &DeviceContext) -> Result<(), Error>
where
    E: ControlEndpoint,
    C: Clock,
{
    ep0.send_bytes(&[u8::from(ctx.speed.is_fast())])
}

/// Drops off the bus and comes back, making the host enumerate us from
/// scratch.
///
/// The request is acknowledged first, because once we disconnect there's
/// nobody left to do it. Does not return until we're back on the bus.
pub fn renumerate<E, C, P>(ep0: &mut TransferBuffer<E, C>, presence: &mut P, config: &Config)
where
    E: ControlEndpoint,
    C: Clock,
    P: BusPresence,
{
    ep0.acknowledge(UsbDir::Out);
    ep0.clock().delay_ms(config.renumerate_delay_ms);

    log::debug!("disconnecting for re-enumeration");
    presence.disconnect();
    ep0.clock().delay_ms(config.disconnect_ms);
    presence.connect();
}

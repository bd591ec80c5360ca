// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Control request dispatch.
//!
//! Work happens in two steps. `route` looks at a `ControlRequest` and decides
//! what it means, without touching anything; `Bridge::handle_setup` then
//! carries that out against the hardware. Keeping the first step pure means
//! the whole decode table can be tested on its own.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::config::Config;
use crate::ep0::TransferBuffer;
use crate::error::Error;
use crate::gpio::{self, GpioAccess};
use crate::hal::{BusPresence, Clock, ControlEndpoint, GpioPorts, I2cBus};
use crate::i2c::{self, I2cTransaction};
use crate::lifecycle;
use crate::setup::{ControlRequest, RequestKind, UsbDir, UsbSetupRequest};
use crate::speed::{DescriptorSwitch, SpeedDescriptors};
use crate::state::{BusSpeed, DeviceContext};

/// The vendor requests we implement, by `request` code.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
pub enum VendorRequest {
    /// Read or write an I2C device. Address in byte 2, byte count in
    /// `length`.
    I2cIo = 0x22,
    /// Read or write a GPIO register. Register in byte 2, port in byte 4.
    Gpio = 0x23,
    /// Disconnect and reconnect. OUT only.
    Renumerate = 0xA3,
    /// OUT: set I2C speed from the flag in byte 2. IN: report it.
    I2cSpeed = 0xA4,
}

/// What a control request turned out to mean.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Route {
    SetSpeed(BusSpeed),
    QuerySpeed,
    Renumerate,
    I2c(I2cTransaction),
    Gpio(GpioAccess, UsbDir),
    SetConfiguration(u8),
    GetConfiguration,
    SetInterface(u8),
    GetInterface,
    /// A request we don't understand, which the host gets acknowledged
    /// anyway.
    Ignored,
    /// A standard request that belongs to the enumeration code (addresses,
    /// descriptors and so on). Left alone entirely.
    Deferred,
}

/// How `Bridge::handle_setup` dealt with a request. On the wire `Handled` and
/// `Ignored` look the same.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Status {
    Handled,
    Ignored,
    /// Not touched, not acknowledged. The caller has to answer it.
    Deferred,
}

pub fn route(req: &ControlRequest) -> Route {
    match req.kind() {
        RequestKind::Vendor => route_vendor(req),
        RequestKind::Standard => route_standard(req),
        _ => Route::Ignored,
    }
}

fn route_vendor(req: &ControlRequest) -> Route {
    // Only requests addressed to the device as a whole are ours.
    let dir = match req.request_type {
        ControlRequest::VENDOR_OUT => UsbDir::Out,
        ControlRequest::VENDOR_IN => UsbDir::In,
        _ => return Route::Ignored,
    };

    match (VendorRequest::from_u8(req.request), dir) {
        (Some(VendorRequest::I2cSpeed), UsbDir::Out) => {
            Route::SetSpeed(BusSpeed::from_flag(req.value_low()))
        }
        (Some(VendorRequest::I2cSpeed), UsbDir::In) => Route::QuerySpeed,
        (Some(VendorRequest::Renumerate), UsbDir::Out) => Route::Renumerate,
        (Some(VendorRequest::I2cIo), _) => Route::I2c(I2cTransaction::from_request(req)),
        // A GPIO write with no data stage has nothing to write.
        (Some(VendorRequest::Gpio), UsbDir::Out) if req.length == 0 => Route::Ignored,
        (Some(VendorRequest::Gpio), dir) => match GpioAccess::from_request(req) {
            Some(access) => Route::Gpio(access, dir),
            None => Route::Ignored,
        },
        _ => Route::Ignored,
    }
}

fn route_standard(req: &ControlRequest) -> Route {
    match (req.standard_request(), req.direction()) {
        (Some(UsbSetupRequest::SetConfiguration), UsbDir::Out) => {
            Route::SetConfiguration(req.value_low())
        }
        (Some(UsbSetupRequest::GetConfiguration), UsbDir::In) => Route::GetConfiguration,
        (Some(UsbSetupRequest::SetInterface), UsbDir::Out) => Route::SetInterface(req.value_low()),
        (Some(UsbSetupRequest::GetInterface), UsbDir::In) => Route::GetInterface,
        _ => Route::Deferred,
    }
}

/// The device: hardware handles plus the state that persists between
/// transfers.
pub struct Bridge<'a, E, C, B, G, P> {
    ep0: TransferBuffer<E, C>,
    i2c: B,
    gpio: G,
    presence: P,
    descriptors: &'a DescriptorSwitch,
    ctx: DeviceContext,
    config: Config,
}

impl<'a, E, C, B, G, P> Bridge<'a, E, C, B, G, P>
where
    E: ControlEndpoint,
    C: Clock,
    B: I2cBus,
    G: GpioPorts,
    P: BusPresence,
{
    /// Builds the bridge and puts the I2C bus in its power-up state.
    pub fn new(
        ep: E,
        clock: C,
        i2c: B,
        gpio: G,
        presence: P,
        descriptors: &'a DescriptorSwitch,
        config: Config,
    ) -> Self {
        let mut bridge = Self {
            ep0: TransferBuffer::new(ep, clock, config.ep0_timeout_us),
            i2c,
            gpio,
            presence,
            descriptors,
            ctx: DeviceContext::new(config.default_speed),
            config,
        };
        lifecycle::init(&mut bridge.i2c, &mut bridge.ctx, &bridge.config);
        bridge
    }

    /// Services one control transfer, data stage and status stage included.
    ///
    /// On error EP0 has been stalled, so the host sees the transfer fail.
    pub fn handle_setup(&mut self, req: &ControlRequest) -> Result<Status, Error> {
        self.ep0.begin();

        let route = route(req);
        log::debug!("SETUP {:02x?} -> {:?}", req.to_bytes(), route);

        let status = match route {
            Route::Deferred => return Ok(Status::Deferred),
            Route::Ignored => {
                log::warn!(
                    "ignoring request {:#04x} (type {:#04x})",
                    req.request,
                    req.request_type
                );
                Status::Ignored
            }
            route => {
                let result = self.execute(route);
                self.stall_on_error(req, result)?;
                Status::Handled
            }
        };

        self.ep0.acknowledge(req.direction());
        Ok(status)
    }

    /// Lets the caller answer a request that `handle_setup` returned as
    /// `Status::Deferred`. `answer` gets EP0 and the current descriptor
    /// pairing; if it fails, EP0 is stalled just as for any other request.
    pub fn answer_deferred<F>(&mut self, req: &ControlRequest, answer: F) -> Result<(), Error>
    where
        F: FnOnce(&mut TransferBuffer<E, C>, SpeedDescriptors) -> Result<(), Error>,
    {
        let speed = self.descriptors.snapshot();
        let result = answer(&mut self.ep0, speed);
        self.stall_on_error(req, result)
    }

    fn stall_on_error(
        &mut self,
        req: &ControlRequest,
        result: Result<(), Error>,
    ) -> Result<(), Error> {
        if let Err(e) = result {
            log::error!("request {:#04x} failed: {}", req.request, e);
            self.ep0.stall();
            return Err(e);
        }
        Ok(())
    }

    fn execute(&mut self, route: Route) -> Result<(), Error> {
        match route {
            Route::SetSpeed(speed) => lifecycle::set_speed(&mut self.i2c, &mut self.ctx, speed),
            Route::QuerySpeed => lifecycle::report_speed(&mut self.ep0, &self.ctx)?,
            Route::Renumerate => {
                lifecycle::renumerate(&mut self.ep0, &mut self.presence, &self.config)
            }
            Route::I2c(txn) => i2c::transfer(&mut self.ep0, &mut self.i2c, &mut self.ctx, &txn)?,
            Route::Gpio(access, dir) => gpio::access(&mut self.ep0, &mut self.gpio, access, dir)?,
            Route::SetConfiguration(value) => self.ctx.configuration = value,
            Route::GetConfiguration => self.ep0.send_bytes(&[self.ctx.configuration])?,
            Route::SetInterface(value) => self.ctx.alternate_setting = value,
            Route::GetInterface => self.ep0.send_bytes(&[self.ctx.alternate_setting])?,
            Route::Ignored | Route::Deferred => (),
        }
        Ok(())
    }

    pub fn on_bus_reset(&mut self) {
        self.ctx.configuration = 0;
        self.ctx.alternate_setting = 0;
        self.descriptors.on_bus_reset();
    }

    /// Asks the controller whether high speed stuck, and updates the
    /// descriptor switch to match.
    pub fn on_high_speed_grant(&mut self) {
        self.descriptors.on_high_speed_grant(self.presence.high_speed());
    }

    pub fn context(&self) -> &DeviceContext {
        &self.ctx
    }

    pub fn descriptors(&self) -> &'a DescriptorSwitch {
        self.descriptors
    }

    pub fn ep0(&mut self) -> &mut TransferBuffer<E, C> {
        &mut self.ep0
    }

    pub fn i2c(&mut self) -> &mut B {
        &mut self.i2c
    }

    pub fn gpio(&mut self) -> &mut G {
        &mut self.gpio
    }

    pub fn presence(&mut self) -> &mut P {
        &mut self.presence
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! GPIO register access on behalf of the host.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::ep0::TransferBuffer;
use crate::error::Error;
use crate::hal::{Clock, ControlEndpoint, GpioPorts};
use crate::setup::{ControlRequest, UsbDir};

/// The two 8-bit ports, by the id the host uses for them.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
pub enum Port {
    A = 0,
    B = 1,
}

/// Which register of a port a GPIO request is about.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
pub enum GpioRegister {
    /// Output enable; a set bit makes the pin an output.
    Direction = 0x24,
    /// Pin levels.
    Value = 0x25,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GpioAccess {
    pub register: GpioRegister,
    pub port: Port,
}

impl GpioAccess {
    /// Register selector lives in byte 2 of the SETUP packet, the port id in
    /// byte 4. Either one being unknown makes the request meaningless, and we
    /// get `None`.
    pub fn from_request(req: &ControlRequest) -> Option<Self> {
        Some(Self {
            register: GpioRegister::from_u8(req.value_low())?,
            port: Port::from_u8(req.index_low())?,
        })
    }
}

/// Replaces the bits of `current` selected by `mask` with those of `supplied`.
///
/// Used for value writes with the direction register as the mask, so that
/// input pins keep reading back what's on the wire.
pub const fn masked_merge(current: u8, mask: u8, supplied: u8) -> u8 {
    (current & !mask) | (supplied & mask)
}

/// Sends the register named by `access` to the host as a single byte.
pub fn read<E, C, G>(
    ep0: &mut TransferBuffer<E, C>,
    gpio: &G,
    access: GpioAccess,
) -> Result<(), Error>
where
    E: ControlEndpoint,
    C: Clock,
    G: GpioPorts,
{
    ep0.wait_free()?;
    ep0.contents_mut()[0] = match access.register {
        GpioRegister::Direction => gpio.direction(access.port),
        GpioRegister::Value => gpio.value(access.port),
    };
    ep0.send(1)
}

/// Takes one byte from the host and stores it in the register named by
/// `access`. Direction writes go straight through; value writes only change
/// output bits.
pub fn write<E, C, G>(
    ep0: &mut TransferBuffer<E, C>,
    gpio: &mut G,
    access: GpioAccess,
) -> Result<(), Error>
where
    E: ControlEndpoint,
    C: Clock,
    G: GpioPorts,
{
    let n = ep0.receive()?;
    if n == 0 {
        return Err(Error::ShortTransfer { remaining: 1 });
    }
    let supplied = ep0.contents()[0];
    let port = access.port;

    match access.register {
        GpioRegister::Direction => gpio.set_direction(port, supplied),
        GpioRegister::Value => {
            let merged = masked_merge(gpio.value(port), gpio.direction(port), supplied);
            gpio.set_value(port, merged);
        }
    }
    log::debug!("GPIO {:?} {:?} <- {:#04x}", port, access.register, supplied);
    Ok(())
}

/// Runs a GPIO request in the direction the host asked for.
pub fn access<E, C, G>(
    ep0: &mut TransferBuffer<E, C>,
    gpio: &mut G,
    access: GpioAccess,
    dir: UsbDir,
) -> Result<(), Error>
where
    E: ControlEndpoint,
    C: Clock,
    G: GpioPorts,
{
    match dir {
        UsbDir::In => read(ep0, gpio, access),
        UsbDir::Out => write(ep0, gpio, access),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn merge_keeps_input_bits() {
        // Low nibble is output; high bit is an input currently reading 1.
        assert_eq!(masked_merge(0b1000_0000, 0b0000_1111, 0b0000_0101), 0b1000_0101);
    }

    #[test]
    fn merge_with_no_outputs_changes_nothing() {
        assert_eq!(masked_merge(0x5A, 0x00, 0xFF), 0x5A);
    }

    #[test]
    fn merge_with_all_outputs_is_overwrite() {
        assert_eq!(masked_merge(0x5A, 0xFF, 0x3C), 0x3C);
    }

    #[test]
    fn access_decodes_register_and_port() {
        let req = ControlRequest::vendor(UsbDir::In, 0x23, 0x0025, 0x0001, 1);
        assert_eq!(
            GpioAccess::from_request(&req),
            Some(GpioAccess {
                register: GpioRegister::Value,
                port: Port::B,
            })
        );
    }

    #[test]
    fn access_rejects_unknown_selectors() {
        let bad_register = ControlRequest::vendor(UsbDir::In, 0x23, 0x0026, 0, 1);
        assert_eq!(GpioAccess::from_request(&bad_register), None);
        let bad_port = ControlRequest::vendor(UsbDir::In, 0x23, 0x0024, 2, 1);
        assert_eq!(GpioAccess::from_request(&bad_port), None);
    }

    proptest! {
        #[test]
        fn merge_law(v: u8, m: u8, s: u8) {
            let r = masked_merge(v, m, s);
            prop_assert_eq!(r, (v & !m) | (s & m));
            // Inputs untouched, outputs follow the host.
            prop_assert_eq!(r & !m, v & !m);
            prop_assert_eq!(r & m, s & m);
        }
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The seams between the bridge logic and the chip.
//!
//! Each trait here is small and maps onto one piece of hardware. The RP2040
//! firmware implements them on raw registers; tests implement them on plain
//! memory.

use crate::error::I2cError;
use crate::gpio::Port;
use crate::setup::UsbDir;

/// Endpoint 0 as seen by the code servicing a control transfer: one data
/// buffer, shared between directions, and a flag saying who owns it.
///
/// While `busy` returns `true` the controller owns the buffer (it's either
/// sending what we put there, or waiting for the host to fill it) and the
/// contents must not be touched.
pub trait ControlEndpoint {
    /// Returns `true` while the controller owns the buffer.
    fn busy(&mut self) -> bool;

    /// The buffer contents. Only meaningful while `busy` is false.
    fn buffer(&self) -> &[u8; 64];

    fn buffer_mut(&mut self) -> &mut [u8; 64];

    /// Hands the first `len` bytes of the buffer to the controller to be sent
    /// on the next IN.
    fn arm_in(&mut self, len: usize);

    /// Hands the (empty) buffer to the controller to be filled by the next
    /// OUT. Until this is called the host's data packets are NAKed.
    fn arm_out(&mut self);

    /// Number of bytes the host put in the buffer during the last OUT.
    fn out_len(&self) -> usize;

    /// Finishes the status stage of a transfer whose data stage went in
    /// direction `dir` (or which had no data stage, for `UsbDir::Out`).
    fn complete_status(&mut self, dir: UsbDir);

    /// Answers the current transfer with a STALL handshake.
    fn stall(&mut self);
}

/// A bit-level I2C bus driver, 7-bit addressing.
pub trait I2cBus {
    /// Reads `buf.len()` bytes from the device at `addr`.
    fn read(&mut self, addr: u8, buf: &mut [u8]) -> Result<(), I2cError>;

    /// Writes all of `data` to the device at `addr`.
    fn write(&mut self, addr: u8, data: &[u8]) -> Result<(), I2cError>;

    /// Switches the SCL clock between 100 kHz (`false`) and 400 kHz (`true`).
    fn set_fast_mode(&mut self, fast: bool);
}

/// Two 8-bit GPIO ports, each with a direction register (bit set = output)
/// and a value register.
pub trait GpioPorts {
    fn direction(&self, port: Port) -> u8;

    fn set_direction(&mut self, port: Port, mask: u8);

    /// Current pin levels. Input bits reflect whatever is driving the pin.
    fn value(&self, port: Port) -> u8;

    fn set_value(&mut self, port: Port, value: u8);
}

/// Our presence on the USB.
pub trait BusPresence {
    /// Stop signalling presence to the host (drop the D+ pull-up).
    fn disconnect(&mut self);

    fn connect(&mut self);

    /// Whether the last reset handshake ended in high-speed operation.
    fn high_speed(&self) -> bool;
}

/// A free-running microsecond counter.
pub trait Clock {
    /// Microseconds since some arbitrary point. Wraps.
    fn now_us(&self) -> u32;

    /// Spins for at least `ms` milliseconds.
    fn delay_ms(&self, ms: u32) {
        let start = self.now_us();
        let us = ms.saturating_mul(1000);
        while self.now_us().wrapping_sub(start) < us {}
    }
}

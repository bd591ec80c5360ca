// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types.
//!
//! Very little is allowed to fail in this firmware: the host protocol has no
//! error channel beyond STALL. What can fail is waiting on the host (it may
//! simply stop talking to us) and the I2C bus.

use thiserror::Error;

/// Failures of a control transfer that the firmware must react to, usually by
/// stalling EP0 so the host sees the transfer fail instead of hanging.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    /// The EP0 buffer stayed owned by the controller for longer than
    /// `Config::ep0_timeout_us`.
    #[error("timed out waiting for the EP0 buffer")]
    Timeout,
    /// Somebody asked to stage more bytes than the EP0 buffer holds.
    #[error("{len} bytes do not fit in the EP0 buffer")]
    Overrun { len: usize },
    /// The host finished an OUT data packet with no bytes in it while the
    /// request still promised more.
    #[error("host sent an empty packet with {remaining} bytes outstanding")]
    ShortTransfer { remaining: usize },
}

/// Failures reported by an I2C bus driver.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum I2cError {
    /// No device acknowledged the address.
    #[error("no ACK from I2C address {addr:#04x}")]
    Nack { addr: u8 },
    /// The controller aborted the transfer; `reason` is the raw abort cause
    /// as reported by the hardware.
    #[error("I2C transfer aborted (reason {reason:#x})")]
    Abort { reason: u32 },
    /// The bus stopped moving, most likely a target holding SCL low.
    #[error("I2C bus stuck")]
    Stuck,
}

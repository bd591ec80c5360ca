// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! I2C transfers tunneled through EP0.
//!
//! The host asks for `length` bytes in one control transfer, but EP0 only
//! holds 64 at a time, so the data stage is moved in pieces. Each piece is a
//! complete I2C transaction of its own (START, address, data, STOP). Devices
//! that need a single long transaction won't be happy with more than 64
//! bytes, but that's how the protocol has always worked.

use crate::ep0::{TransferBuffer, EP0_BUFFER_SIZE};
use crate::error::Error;
use crate::hal::{Clock, ControlEndpoint, I2cBus};
use crate::setup::{ControlRequest, UsbDir};
use crate::state::DeviceContext;

/// One I2C request from the host.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct I2cTransaction {
    /// 7-bit target address. Passed to the bus as-is.
    pub addr: u8,
    /// Total bytes to move.
    pub len: u16,
    pub dir: UsbDir,
}

impl I2cTransaction {
    /// The address is in byte 2 of the SETUP packet, the byte count is the
    /// data stage length.
    pub fn from_request(req: &ControlRequest) -> Self {
        Self {
            addr: req.value_low(),
            len: req.length,
            dir: req.direction(),
        }
    }
}

/// Sizes of the pieces a read of `total` bytes gets split into: full buffers,
/// then whatever is left.
pub fn chunk_sizes(total: usize) -> impl Iterator<Item = usize> {
    (0..total)
        .step_by(EP0_BUFFER_SIZE)
        .map(move |start| (total - start).min(EP0_BUFFER_SIZE))
}

/// Runs `txn` to completion in whichever direction it goes.
pub fn transfer<E, C, B>(
    ep0: &mut TransferBuffer<E, C>,
    bus: &mut B,
    ctx: &mut DeviceContext,
    txn: &I2cTransaction,
) -> Result<(), Error>
where
    E: ControlEndpoint,
    C: Clock,
    B: I2cBus,
{
    match txn.dir {
        UsbDir::In => read(ep0, bus, ctx, txn.addr, usize::from(txn.len)),
        UsbDir::Out => write(ep0, bus, ctx, txn.addr, usize::from(txn.len)),
    }
}

/// Device-to-host: read from the bus into the buffer, ship it, repeat.
///
/// If the bus read fails the host still gets its chunk, as zeros. The failure
/// is counted in `ctx.i2c_errors`.
pub fn read<E, C, B>(
    ep0: &mut TransferBuffer<E, C>,
    bus: &mut B,
    ctx: &mut DeviceContext,
    addr: u8,
    len: usize,
) -> Result<(), Error>
where
    E: ControlEndpoint,
    C: Clock,
    B: I2cBus,
{
    for chunk in chunk_sizes(len) {
        ep0.wait_free()?;

        let data = ep0.contents_mut();
        data.fill(0);
        if let Err(e) = bus.read(addr, &mut data[..chunk]) {
            log::warn!("I2C read of {} bytes from {:#04x} failed: {}", chunk, addr, e);
            data[..chunk].fill(0);
            ctx.i2c_errors = ctx.i2c_errors.wrapping_add(1);
        }

        ep0.send(chunk)?;
    }
    Ok(())
}

/// Host-to-device: let the host fill the buffer, push what it sent onto the
/// bus, repeat until `len` bytes have gone by.
///
/// The host decides how big each piece is; we take its word for it.
pub fn write<E, C, B>(
    ep0: &mut TransferBuffer<E, C>,
    bus: &mut B,
    ctx: &mut DeviceContext,
    addr: u8,
    len: usize,
) -> Result<(), Error>
where
    E: ControlEndpoint,
    C: Clock,
    B: I2cBus,
{
    let mut remaining = len;
    while remaining != 0 {
        let n = ep0.receive()?;
        if n == 0 {
            return Err(Error::ShortTransfer { remaining });
        }
        if n > EP0_BUFFER_SIZE {
            return Err(Error::Overrun { len: n });
        }

        if let Err(e) = bus.write(addr, &ep0.contents()[..n]) {
            log::warn!("I2C write of {} bytes to {:#04x} failed: {}", n, addr, e);
            ctx.i2c_errors = ctx.i2c_errors.wrapping_add(1);
        }

        if n > remaining {
            log::warn!("host sent {} bytes with only {} expected", n, remaining);
        }
        remaining = remaining.saturating_sub(n);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_sizes_split_at_buffer_size() {
        let sizes: Vec<usize> = chunk_sizes(130).collect();
        assert_eq!(sizes, [64, 64, 2]);
    }

    #[test]
    fn chunk_sizes_exact_multiple_has_no_tail() {
        let sizes: Vec<usize> = chunk_sizes(128).collect();
        assert_eq!(sizes, [64, 64]);
    }

    #[test]
    fn zero_length_means_no_chunks() {
        assert_eq!(chunk_sizes(0).count(), 0);
    }

    #[test]
    fn transaction_from_request() {
        let req = ControlRequest::vendor(UsbDir::Out, 0x22, 0x0050, 0, 130);
        let txn = I2cTransaction::from_request(&req);
        assert_eq!(
            txn,
            I2cTransaction {
                addr: 0x50,
                len: 130,
                dir: UsbDir::Out,
            }
        );
    }
}

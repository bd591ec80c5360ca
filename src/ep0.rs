// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ownership of the EP0 data buffer during a control transfer.
//!
//! The buffer is shared with the USB controller, which uses a flag to say
//! whose turn it is. Every access from our side goes through
//! `TransferBuffer`, which waits for our turn before touching the contents and
//! hands the buffer back explicitly when it's done. Waiting is bounded: a host
//! that wanders off in the middle of a data stage produces `Error::Timeout`
//! rather than a wedged device.

use crate::error::Error;
use crate::hal::{Clock, ControlEndpoint};
use crate::setup::UsbDir;

/// Capacity of the EP0 buffer, and so the largest single data stage packet.
pub const EP0_BUFFER_SIZE: usize = 64;

pub struct TransferBuffer<E, C> {
    ep: E,
    clock: C,
    timeout_us: u32,
    /// Set once the status stage of the current transfer has been dealt with,
    /// so that it's only done once no matter who gets there first.
    acknowledged: bool,
}

impl<E: ControlEndpoint, C: Clock> TransferBuffer<E, C> {
    pub fn new(ep: E, clock: C, timeout_us: u32) -> Self {
        Self {
            ep,
            clock,
            timeout_us,
            acknowledged: false,
        }
    }

    /// Resets per-transfer state. Call when a new SETUP arrives.
    pub fn begin(&mut self) {
        self.acknowledged = false;
    }

    /// Polls until the controller hands the buffer back, or the timeout
    /// expires.
    pub fn wait_free(&mut self) -> Result<(), Error> {
        let start = self.clock.now_us();
        while self.ep.busy() {
            if self.clock.now_us().wrapping_sub(start) >= self.timeout_us {
                log::error!("EP0 still busy after {} us", self.timeout_us);
                return Err(Error::Timeout);
            }
        }
        Ok(())
    }

    /// Buffer contents. Callers must have waited for the buffer first.
    pub fn contents(&self) -> &[u8; EP0_BUFFER_SIZE] {
        self.ep.buffer()
    }

    pub fn contents_mut(&mut self) -> &mut [u8; EP0_BUFFER_SIZE] {
        self.ep.buffer_mut()
    }

    /// Marks the first `len` bytes of the buffer as ready for the host.
    pub fn send(&mut self, len: usize) -> Result<(), Error> {
        if len > EP0_BUFFER_SIZE {
            return Err(Error::Overrun { len });
        }
        log::trace!("EP0 IN {} bytes", len);
        self.ep.arm_in(len);
        Ok(())
    }

    /// Waits for the buffer, copies `bytes` into it and sends them.
    pub fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        if bytes.len() > EP0_BUFFER_SIZE {
            return Err(Error::Overrun { len: bytes.len() });
        }
        self.wait_free()?;
        self.ep.buffer_mut()[..bytes.len()].copy_from_slice(bytes);
        self.send(bytes.len())
    }

    /// Lets the host send the next OUT packet and waits for it. Returns how
    /// many bytes actually arrived, which is whatever the host chose to send.
    pub fn receive(&mut self) -> Result<usize, Error> {
        self.ep.arm_out();
        self.wait_free()?;
        let n = self.ep.out_len();
        log::trace!("EP0 OUT {} bytes", n);
        Ok(n)
    }

    /// Completes the status stage, once per transfer.
    pub fn acknowledge(&mut self, dir: UsbDir) {
        if !self.acknowledged {
            self.ep.complete_status(dir);
            self.acknowledged = true;
        }
    }

    pub fn stall(&mut self) {
        self.ep.stall();
        self.acknowledged = true;
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn endpoint(&self) -> &E {
        &self.ep
    }

    pub fn endpoint_mut(&mut self) -> &mut E {
        &mut self.ep
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Which configuration descriptor set is "ours" at the current bus speed.
//!
//! A USB 2.0 device has one configuration per speed. Whichever matches the
//! speed we're running at is served in answer to GET_DESCRIPTOR(Configuration);
//! the other one is served, retagged, in answer to
//! GET_DESCRIPTOR(OtherSpeedConfiguration).
//!
//! Bus events arrive in interrupt context and descriptor requests are served
//! from the main loop, so the pairing is published with a single atomic store.
//! A reader either sees the old pair or the new one, never half of each.

use core::sync::atomic::{AtomicU8, Ordering};

/// The two configuration descriptor sets.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DescriptorSet {
    FullSpeed,
    HighSpeed,
}

impl DescriptorSet {
    pub fn other(self) -> Self {
        match self {
            Self::FullSpeed => Self::HighSpeed,
            Self::HighSpeed => Self::FullSpeed,
        }
    }
}

/// A consistent view of the switch: `active` is served tagged as the
/// configuration descriptor, `other` tagged as the other-speed one.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SpeedDescriptors {
    pub active: DescriptorSet,
    pub other: DescriptorSet,
}

impl SpeedDescriptors {
    fn with_active(active: DescriptorSet) -> Self {
        Self {
            active,
            other: active.other(),
        }
    }
}

const FULL_SPEED: u8 = 0;
const HIGH_SPEED: u8 = 1;

pub struct DescriptorSwitch {
    active: AtomicU8,
}

impl DescriptorSwitch {
    /// Starts out at full speed, as after a bus reset.
    pub const fn new() -> Self {
        Self {
            active: AtomicU8::new(FULL_SPEED),
        }
    }

    pub fn snapshot(&self) -> SpeedDescriptors {
        let active = match self.active.load(Ordering::Acquire) {
            HIGH_SPEED => DescriptorSet::HighSpeed,
            _ => DescriptorSet::FullSpeed,
        };
        SpeedDescriptors::with_active(active)
    }

    /// Every reset starts over at full speed, whatever came before.
    pub fn on_bus_reset(&self) {
        self.active.store(FULL_SPEED, Ordering::Release);
        log::trace!("bus reset: full-speed descriptors");
    }

    /// Called when the controller reports the end of high-speed chirp
    /// negotiation. Switches to the high-speed set only if `negotiated`.
    pub fn on_high_speed_grant(&self, negotiated: bool) {
        if negotiated {
            self.active.store(HIGH_SPEED, Ordering::Release);
            log::trace!("high speed granted: high-speed descriptors");
        }
    }
}

impl Default for DescriptorSwitch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FS: SpeedDescriptors = SpeedDescriptors {
        active: DescriptorSet::FullSpeed,
        other: DescriptorSet::HighSpeed,
    };
    const HS: SpeedDescriptors = SpeedDescriptors {
        active: DescriptorSet::HighSpeed,
        other: DescriptorSet::FullSpeed,
    };

    #[test]
    fn starts_at_full_speed() {
        assert_eq!(DescriptorSwitch::new().snapshot(), FS);
    }

    #[test]
    fn grant_switches_only_when_negotiated() {
        let sw = DescriptorSwitch::new();
        sw.on_high_speed_grant(false);
        assert_eq!(sw.snapshot(), FS);
        sw.on_high_speed_grant(true);
        assert_eq!(sw.snapshot(), HS);
        // A failed negotiation doesn't undo an earlier one either.
        sw.on_high_speed_grant(false);
        assert_eq!(sw.snapshot(), HS);
    }

    #[test]
    fn reset_always_goes_back_to_full_speed() {
        let sw = DescriptorSwitch::new();
        sw.on_bus_reset();
        assert_eq!(sw.snapshot(), FS);
        sw.on_high_speed_grant(true);
        sw.on_bus_reset();
        assert_eq!(sw.snapshot(), FS);
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod common;

use common::{bridge, Event};
use proptest::prelude::*;
use usb_bridge::{ControlRequest, DescriptorSwitch, Status, UsbDir};

const DIRECTION: u16 = 0x24;
const VALUE: u16 = 0x25;

fn gpio(dir: UsbDir, register: u16, port: u16) -> ControlRequest {
    ControlRequest::vendor(dir, 0x23, register, port, 1)
}

#[test]
fn value_write_only_touches_outputs() {
    let switch = DescriptorSwitch::new();
    let (mut bridge, journal) = bridge(&switch);
    bridge.gpio().value[0] = 0b1000_0000;
    bridge.gpio().direction[0] = 0b0000_1111;
    bridge.ep0().endpoint_mut().host_sends(&[&[0b0000_0101]]);

    assert_eq!(bridge.handle_setup(&gpio(UsbDir::Out, VALUE, 0)), Ok(Status::Handled));

    assert_eq!(bridge.gpio().value[0], 0b1000_0101);
    assert_eq!(bridge.gpio().direction[0], 0b0000_1111);
    assert_eq!(journal.events(), [Event::Status(UsbDir::Out)]);
}

#[test]
fn direction_write_is_taken_verbatim() {
    let switch = DescriptorSwitch::new();
    let (mut bridge, _journal) = bridge(&switch);
    bridge.gpio().direction[1] = 0xF0;
    bridge.gpio().value[1] = 0x33;
    bridge.ep0().endpoint_mut().host_sends(&[&[0x0F]]);

    assert_eq!(bridge.handle_setup(&gpio(UsbDir::Out, DIRECTION, 1)), Ok(Status::Handled));

    assert_eq!(bridge.gpio().direction[1], 0x0F);
    assert_eq!(bridge.gpio().value[1], 0x33);
}

#[test]
fn reads_return_one_byte() {
    let switch = DescriptorSwitch::new();
    let (mut bridge, journal) = bridge(&switch);
    bridge.gpio().direction = [0x11, 0x22];
    bridge.gpio().value = [0x33, 0x44];

    for (register, port) in [(DIRECTION, 0), (DIRECTION, 1), (VALUE, 0), (VALUE, 1)] {
        assert_eq!(bridge.handle_setup(&gpio(UsbDir::In, register, port)), Ok(Status::Handled));
    }

    assert_eq!(
        journal.in_packets(),
        vec![vec![0x11], vec![0x22], vec![0x33], vec![0x44]]
    );
}

#[test]
fn unknown_register_or_port_is_ignored() {
    let switch = DescriptorSwitch::new();
    let (mut bridge, journal) = bridge(&switch);
    bridge.gpio().value = [0x12, 0x34];
    bridge.ep0().endpoint_mut().host_sends(&[&[0xFF]]);

    assert_eq!(bridge.handle_setup(&gpio(UsbDir::Out, VALUE, 2)), Ok(Status::Ignored));
    assert_eq!(bridge.handle_setup(&gpio(UsbDir::In, 0x26, 0)), Ok(Status::Ignored));

    assert_eq!(bridge.gpio().value, [0x12, 0x34]);
    // The host's data packet was never asked for.
    assert_eq!(bridge.ep0().endpoint().unsent(), 1);
    assert!(journal.in_packets().is_empty());
}

#[test]
fn ports_are_independent() {
    let switch = DescriptorSwitch::new();
    let (mut bridge, _journal) = bridge(&switch);
    bridge.gpio().direction = [0xFF, 0xFF];
    bridge.ep0().endpoint_mut().host_sends(&[&[0xAA]]);

    assert_eq!(bridge.handle_setup(&gpio(UsbDir::Out, VALUE, 1)), Ok(Status::Handled));

    assert_eq!(bridge.gpio().value, [0x00, 0xAA]);
}

proptest! {
    #[test]
    fn value_write_is_a_masked_merge(v: u8, m: u8, s: u8) {
        let switch = DescriptorSwitch::new();
        let (mut bridge, _journal) = bridge(&switch);
        bridge.gpio().value[0] = v;
        bridge.gpio().direction[0] = m;
        bridge.ep0().endpoint_mut().host_sends(&[&[s]]);

        prop_assert_eq!(bridge.handle_setup(&gpio(UsbDir::Out, VALUE, 0)), Ok(Status::Handled));

        let result = bridge.gpio().value[0];
        prop_assert_eq!(result, (v & !m) | (s & m));
        prop_assert_eq!(result & !m, v & !m);
    }

    #[test]
    fn direction_write_overwrites(old: u8, s: u8) {
        let switch = DescriptorSwitch::new();
        let (mut bridge, _journal) = bridge(&switch);
        bridge.gpio().direction[0] = old;
        bridge.ep0().endpoint_mut().host_sends(&[&[s]]);

        prop_assert_eq!(bridge.handle_setup(&gpio(UsbDir::Out, DIRECTION, 0)), Ok(Status::Handled));
        prop_assert_eq!(bridge.gpio().direction[0], s);
    }
}

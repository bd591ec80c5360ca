// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Descriptor layouts and this device's descriptor tables.
//!
//! The device presents a single vendor-specific interface with no endpoints
//! besides EP0. The VID:PID is the one existing host tools for the FX2-based
//! version of this bridge look for.

use byteorder::LittleEndian;
use num_derive::FromPrimitive;
use zerocopy::{AsBytes, U16};

use crate::speed::{DescriptorSet, SpeedDescriptors};

/// Types of USB descriptor.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive, AsBytes)]
#[repr(u8)]
pub enum UsbDescType {
    Device = 0x01,
    Config = 0x02,
    String = 0x03,
    Interface = 0x04,
    Endpoint = 0x05,
    DeviceQualifier = 0x06,
    /// A configuration descriptor for the speed we're _not_ running at.
    OtherSpeedConfig = 0x07,
}

/// Describes a device. This is the most broad description in USB and is
/// typically the first thing the host asks for.
#[repr(C)]
#[derive(Debug, AsBytes)]
pub struct UsbDeviceDescriptor {
    /// Length of this structure, must be 18.
    pub length: u8,
    /// Type of this descriptor, must be `Device`.
    pub descriptor_type: UsbDescType,
    /// Version of the device descriptor / USB protocol, in binary-coded
    /// decimal.
    pub bcd_usb: U16<LittleEndian>,
    pub device_class: u8,
    pub device_subclass: u8,
    pub device_protocol: u8,
    /// Maximum packet size on EP0.
    pub max_packet_size0: u8,
    pub vendor: U16<LittleEndian>,
    pub product: U16<LittleEndian>,
    /// Device version number, as BCD again.
    pub bcd_device: U16<LittleEndian>,
    /// Indices into the string descriptor table.
    pub manufacturer_s: u8,
    pub product_s: u8,
    pub serial_s: u8,
    pub num_configurations: u8,
}

/// Description of a single available device configuration.
#[repr(C)]
#[derive(Debug, AsBytes)]
pub struct UsbConfigurationDescriptor {
    /// Length of this structure, must be 9.
    pub length: u8,
    /// `Config`, or `OtherSpeedConfig` when describing the other speed.
    pub descriptor_type: UsbDescType,
    /// Total length of all descriptors in this configuration, concatenated.
    pub total_length: U16<LittleEndian>,
    pub num_interfaces: u8,
    /// Number to use when requesting this configuration via a
    /// `SetConfiguration` request.
    pub configuration_value: u8,
    pub configuration_s: u8,
    /// Bit 7 must be set; bit 6 self-powered; bit 5 remote wakeup.
    pub attributes: u8,
    /// Maximum device power consumption in units of 2mA.
    pub max_power: u8,
}

/// Description of an interface within a configuration.
#[repr(C)]
#[derive(Debug, AsBytes)]
pub struct UsbInterfaceDescriptor {
    /// Length of this structure, must be 9.
    pub length: u8,
    /// Type of this descriptor, must be `Interface`.
    pub descriptor_type: UsbDescType,
    pub interface_number: u8,
    pub alternate_setting: u8,
    /// Number of endpoint descriptors in this interface, not counting EP0.
    pub num_endpoints: u8,
    pub interface_class: u8,
    pub interface_subclass: u8,
    pub interface_protocol: u8,
    pub interface_s: u8,
}

/// A configuration descriptor together with what follows it on the wire.
pub struct ConfigurationSet {
    pub config: UsbConfigurationDescriptor,
    pub interface: UsbInterfaceDescriptor,
}

const CONFIG_LEN: usize = core::mem::size_of::<UsbConfigurationDescriptor>();
const INTERFACE_LEN: usize = core::mem::size_of::<UsbInterfaceDescriptor>();

pub static DEVICE_DESCRIPTOR: UsbDeviceDescriptor = UsbDeviceDescriptor {
    length: core::mem::size_of::<UsbDeviceDescriptor>() as u8,
    descriptor_type: UsbDescType::Device,
    bcd_usb: U16::from_bytes(u16::to_le_bytes(0x0200)),
    device_class: 0xFF,
    device_subclass: 0xFF,
    device_protocol: 0xFF,
    max_packet_size0: 64,
    vendor: U16::from_bytes(u16::to_le_bytes(0x04B4)),
    product: U16::from_bytes(u16::to_le_bytes(0x1004)),
    bcd_device: U16::from_bytes(u16::to_le_bytes(0x0001)),
    manufacturer_s: 1,
    product_s: 2,
    serial_s: 0,
    num_configurations: 1,
};

// The two sets only differ in their identity. We have no bulk endpoints,
// which is where the max packet sizes would differ between speeds.
pub static FULL_SPEED_CONFIG: ConfigurationSet = ConfigurationSet {
    config: configuration_descriptor(),
    interface: interface_descriptor(),
};

pub static HIGH_SPEED_CONFIG: ConfigurationSet = ConfigurationSet {
    config: configuration_descriptor(),
    interface: interface_descriptor(),
};

const fn configuration_descriptor() -> UsbConfigurationDescriptor {
    UsbConfigurationDescriptor {
        length: CONFIG_LEN as u8,
        descriptor_type: UsbDescType::Config,
        total_length: U16::from_bytes(u16::to_le_bytes((CONFIG_LEN + INTERFACE_LEN) as u16)),
        num_interfaces: 1,
        configuration_value: 1,
        configuration_s: 0,
        attributes: 0x80,
        max_power: 0x32,
    }
}

const fn interface_descriptor() -> UsbInterfaceDescriptor {
    UsbInterfaceDescriptor {
        length: INTERFACE_LEN as u8,
        descriptor_type: UsbDescType::Interface,
        interface_number: 0,
        alternate_setting: 0,
        num_endpoints: 0,
        interface_class: 0xFF,
        interface_subclass: 0,
        interface_protocol: 0,
        interface_s: 0,
    }
}

pub static LANG_DESCRIPTOR: &[u8] = &[4, 0x03, 0x09, 0x04];

pub static DESCRIPTOR_STRINGS: &[&[u8]] = &[
    b"R\0a\0s\0p\0b\0e\0r\0r\0y\0 \0P\0i\0",
    b"I\02\0C\0/\0G\0P\0I\0O\0 \0B\0r\0i\0d\0g\0e\0",
];

pub fn configuration_set(set: DescriptorSet) -> &'static ConfigurationSet {
    match set {
        DescriptorSet::FullSpeed => &FULL_SPEED_CONFIG,
        DescriptorSet::HighSpeed => &HIGH_SPEED_CONFIG,
    }
}

/// Renders `set` into `out` with its descriptor type byte forced to `tag`.
/// Returns the number of bytes written; output is cut short if `out` is.
pub fn write_configuration(set: DescriptorSet, tag: UsbDescType, out: &mut [u8]) -> usize {
    let set = configuration_set(set);
    let mut full = [0; CONFIG_LEN + INTERFACE_LEN];
    full[..CONFIG_LEN].copy_from_slice(set.config.as_bytes());
    full[1] = tag as u8;
    full[CONFIG_LEN..].copy_from_slice(set.interface.as_bytes());

    let n = full.len().min(out.len());
    out[..n].copy_from_slice(&full[..n]);
    n
}

/// Answers GET_DESCRIPTOR for `Config` or `OtherSpeedConfig` according to the
/// speed switch. Any other type gets `None`.
pub fn write_speed_configuration(
    speed: SpeedDescriptors,
    requested: UsbDescType,
    out: &mut [u8],
) -> Option<usize> {
    let set = match requested {
        UsbDescType::Config => speed.active,
        UsbDescType::OtherSpeedConfig => speed.other,
        _ => return None,
    };
    Some(write_configuration(set, requested, out))
}

/// Renders string descriptor `index`, where 0 is the language table. Unknown
/// indices give `None`.
pub fn write_string(index: usize, out: &mut [u8]) -> Option<usize> {
    if index == 0 {
        let n = LANG_DESCRIPTOR.len().min(out.len());
        out[..n].copy_from_slice(&LANG_DESCRIPTOR[..n]);
        return Some(n);
    }
    let s = DESCRIPTOR_STRINGS.get(index - 1)?;
    let len = 2 + s.len();
    if out.len() < len {
        return None;
    }
    out[0] = len as u8;
    out[1] = UsbDescType::String as u8;
    out[2..len].copy_from_slice(s);
    Some(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speed::DescriptorSwitch;

    #[test]
    fn configuration_is_tagged_on_the_way_out() {
        let mut out = [0; 64];
        let n = write_configuration(DescriptorSet::HighSpeed, UsbDescType::OtherSpeedConfig, &mut out);
        assert_eq!(n, 18);
        assert_eq!(out[0], 9);
        assert_eq!(out[1], 0x07);
        assert_eq!(out[2], 18);
        assert_eq!(out[9], 9);
        assert_eq!(out[10], UsbDescType::Interface as u8);
        // The static tables are untouched.
        assert_eq!(HIGH_SPEED_CONFIG.config.descriptor_type, UsbDescType::Config);
    }

    #[test]
    fn configuration_truncates_to_request() {
        let mut out = [0; 9];
        assert_eq!(write_configuration(DescriptorSet::FullSpeed, UsbDescType::Config, &mut out), 9);
        assert_eq!(out[1], 0x02);
    }

    #[test]
    fn speed_configuration_follows_switch() {
        let sw = DescriptorSwitch::new();
        let mut out = [0; 64];

        let n = write_speed_configuration(sw.snapshot(), UsbDescType::OtherSpeedConfig, &mut out);
        assert_eq!(n, Some(18));
        assert_eq!(out[1], 0x07);

        sw.on_high_speed_grant(true);
        let n = write_speed_configuration(sw.snapshot(), UsbDescType::Config, &mut out);
        assert_eq!(n, Some(18));
        assert_eq!(out[1], 0x02);

        assert_eq!(write_speed_configuration(sw.snapshot(), UsbDescType::Device, &mut out), None);
    }

    #[test]
    fn strings() {
        let mut out = [0; 64];
        assert_eq!(write_string(0, &mut out), Some(4));
        assert_eq!(&out[..4], &[4, 0x03, 0x09, 0x04]);

        let n = write_string(1, &mut out).unwrap();
        assert_eq!(n, 2 + DESCRIPTOR_STRINGS[0].len());
        assert_eq!(out[0] as usize, n);
        assert_eq!(out[1], 0x03);

        assert_eq!(write_string(3, &mut out), None);
    }

    #[test]
    fn device_descriptor_is_eighteen_bytes() {
        assert_eq!(DEVICE_DESCRIPTOR.as_bytes().len(), 18);
        assert_eq!(&DEVICE_DESCRIPTOR.as_bytes()[8..12], &[0xB4, 0x04, 0x04, 0x10]);
    }
}

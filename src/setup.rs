// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! SETUP packet layout and decoding.

use byteorder::LittleEndian;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use zerocopy::{AsBytes, FromBytes, LayoutVerified, Unaligned, U16};

/// USB deals in two different transfer directions, called OUT (host-to-device)
/// and IN (device-to-host). In the vast majority of cases, OUT is represented
/// by a 0 byte, and IN by an `0x80` byte.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
pub enum UsbDir {
    Out = 0,
    In = 0x80,
}

impl UsbDir {
    pub const fn of_endpoint_addr(addr: u8) -> Self {
        if addr & Self::In as u8 != 0 {
            Self::In
        } else {
            Self::Out
        }
    }
}

/// Layout of an 8-byte USB SETUP packet.
#[repr(C)]
#[derive(Debug, AsBytes, FromBytes, Unaligned)]
pub struct UsbSetupPacket {
    /// Bit 7 is the direction (see `UsbDir`), bits 6:5 are the `RequestKind`,
    /// bits 4:0 the recipient.
    pub request_type: u8,
    /// Request code. Its meaning depends on the `RequestKind`.
    pub request: u8,
    /// A simple argument of up to 16 bits, specific to the request.
    pub value: U16<LittleEndian>,
    /// A second argument, usually an interface or endpoint index.
    pub index: U16<LittleEndian>,
    /// If data will be transferred after this request (in the direction given
    /// by `request_type`), this gives the number of bytes (OUT) or maximum
    /// number of bytes (IN).
    pub length: U16<LittleEndian>,
}

/// Bits 6:5 of `request_type`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
pub enum RequestKind {
    Standard = 0,
    Class = 1,
    Vendor = 2,
    Reserved = 3,
}

/// The standard SETUP requests that this device has an opinion about.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
pub enum UsbSetupRequest {
    GetStatus = 0x00,
    ClearFeature = 0x01,
    SetFeature = 0x03,
    /// Notifies the device that it's being moved to a different address on the
    /// bus. Always an OUT.
    SetAddress = 0x05,
    /// Asks the device to send a certain descriptor back to the host. Always
    /// used on an IN request.
    GetDescriptor = 0x06,
    GetConfiguration = 0x08,
    /// Configures a device by choosing one of the options listed in its
    /// descriptors. Always an OUT.
    SetConfiguration = 0x09,
    GetInterface = 0x0A,
    SetInterface = 0x0B,
}

/// A decoded SETUP packet. Built once per control transfer and never changed
/// afterwards.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ControlRequest {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub length: u16,
}

impl ControlRequest {
    /// `request_type` of a vendor request to the device, host-to-device.
    pub const VENDOR_OUT: u8 = 0x40;
    /// `request_type` of a vendor request to the device, device-to-host.
    pub const VENDOR_IN: u8 = 0xC0;

    /// Decodes the raw 8 bytes of a SETUP packet, as found in the USB
    /// controller. Returns `None` if `packet` is not exactly 8 bytes.
    pub fn parse(packet: &[u8]) -> Option<Self> {
        let setup = LayoutVerified::<_, UsbSetupPacket>::new(packet)?.into_ref();
        Some(Self {
            request_type: setup.request_type,
            request: setup.request,
            value: setup.value.get(),
            index: setup.index.get(),
            length: setup.length.get(),
        })
    }

    /// Builds a vendor request aimed at the device.
    pub const fn vendor(dir: UsbDir, request: u8, value: u16, index: u16, length: u16) -> Self {
        Self {
            request_type: match dir {
                UsbDir::Out => Self::VENDOR_OUT,
                UsbDir::In => Self::VENDOR_IN,
            },
            request,
            value,
            index,
            length,
        }
    }

    /// Builds a standard request aimed at the device.
    pub const fn standard(dir: UsbDir, request: UsbSetupRequest, value: u16, index: u16, length: u16) -> Self {
        Self {
            request_type: dir as u8,
            request: request as u8,
            value,
            index,
            length,
        }
    }

    pub fn direction(&self) -> UsbDir {
        UsbDir::of_endpoint_addr(self.request_type)
    }

    pub fn kind(&self) -> RequestKind {
        RequestKind::from_u8((self.request_type >> 5) & 0b11).unwrap_or(RequestKind::Reserved)
    }

    /// Recipient field: 0 device, 1 interface, 2 endpoint, 3 other.
    pub fn recipient(&self) -> u8 {
        self.request_type & 0x1F
    }

    pub fn standard_request(&self) -> Option<UsbSetupRequest> {
        if self.kind() != RequestKind::Standard {
            return None;
        }
        UsbSetupRequest::from_u8(self.request)
    }

    /// Byte 2 of the SETUP packet.
    pub fn value_low(&self) -> u8 {
        self.value as u8
    }

    /// Byte 3 of the SETUP packet.
    pub fn value_high(&self) -> u8 {
        (self.value >> 8) as u8
    }

    /// Byte 4 of the SETUP packet.
    pub fn index_low(&self) -> u8 {
        self.index as u8
    }

    /// Returns the raw packet, as it would appear on the wire.
    pub fn to_bytes(&self) -> [u8; 8] {
        let v = self.value.to_le_bytes();
        let i = self.index.to_le_bytes();
        let l = self.length.to_le_bytes();
        [self.request_type, self.request, v[0], v[1], i[0], i[1], l[0], l[1]]
    }
}

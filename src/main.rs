// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! RP2040 firmware for the USB I2C/GPIO bridge.
//!
//! This is the part of the bridge that knows it's running on an RP2040. It
//! brings the chip up, owns every register, and implements the traits from
//! `usb_bridge::hal` on top of them. All protocol decisions are made in the
//! library; this file just moves bytes and flips bits.
//!
//! It uses no HAL and no interrupts. The main loop polls the USB
//! controller's interrupt status register and handles whatever it finds, one
//! thing at a time. Control transfers run to completion inside the loop
//! body, spinning on the EP0 buffer flags as they go (with a timeout, see
//! `Config::ep0_timeout_us`).
//!
//! Pin usage, per board:
//!
//! | | Pico | Feather RP2040 |
//! |---|---|---|
//! | GPIO port A | GPIO0-7 | GPIO18-25 |
//! | GPIO port B | GPIO8-15 | GPIO6-13 |
//! | I2C | I2C0, SDA 16, SCL 17 | I2C1, SDA 2, SCL 3 |
//! | activity LED | 25 | none (13 is in port B) |
//!
//! # A note on `unsafe`
//!
//! The vast majority of `unsafe` here is inside register `write` closures,
//! because `rp2040_pac` marks raw `bits` writes as unsafe. The remainder is
//! the EP0 buffer in USB SRAM, which is commented where it happens.

#![no_std]
#![no_main]

use core::cell::UnsafeCell;

use cortex_m_rt::entry;
use num_traits::FromPrimitive;
use zerocopy::AsBytes;

use panic_halt as _;

use usb_bridge::descriptor::{self, UsbDescType, DEVICE_DESCRIPTOR};
use usb_bridge::hal::{BusPresence, Clock, ControlEndpoint, GpioPorts, I2cBus};
use usb_bridge::setup::UsbSetupRequest;
use usb_bridge::{
    Bridge, Config, ControlRequest, DescriptorSwitch, Error, I2cError, Port, SpeedDescriptors,
    Status, TransferBuffer, UsbDir, EP0_BUFFER_SIZE,
};

cfg_if::cfg_if! {
    if #[cfg(feature = "target-pico")] {
        const LED_PIN: Option<u8> = Some(25); // any activity
        const PORT_BASE: [u8; 2] = [0, 8];
        const I2C_SDA_PIN: u8 = 16;
        const I2C_SCL_PIN: u8 = 17;

        fn i2c_block(p: &rp2040_pac::Peripherals) -> &rp2040_pac::i2c0::RegisterBlock {
            p.RESETS.reset.modify(|_, w| w.i2c0().clear_bit());
            while !p.RESETS.reset_done.read().i2c0().bit() {}
            &p.I2C0
        }

        // The Pi Pico uses a Winbond W25Q080 chip.
        #[link_section = ".boot2"]
        #[used]
        static BOOT2: [u8; 256] = rp2040_boot2::BOOT_LOADER_W25Q080;
    } else if #[cfg(feature = "target-feather")] {
        const LED_PIN: Option<u8> = None;
        const PORT_BASE: [u8; 2] = [18, 6];
        const I2C_SDA_PIN: u8 = 2;
        const I2C_SCL_PIN: u8 = 3;

        fn i2c_block(p: &rp2040_pac::Peripherals) -> &rp2040_pac::i2c0::RegisterBlock {
            p.RESETS.reset.modify(|_, w| w.i2c1().clear_bit());
            while !p.RESETS.reset_done.read().i2c1().bit() {}
            &p.I2C1
        }

        // The Adafruit board uses a GigaDevices flash chip, which needs its
        // own second-stage bootloader.
        #[link_section = ".boot2"]
        #[used]
        static BOOT2: [u8; 256] = rp2040_boot2::BOOT_LOADER_GD25Q64CS;
    } else {
        compile_error!("missing or unknown target-* feature");
    }
}

/// clk_sys, and so clk_peri, once `main` has set up the PLL.
const PERI_HZ: u32 = 132_000_000;

/// EP0 buffer 0 sits at a fixed offset into USB DPRAM, right after the
/// endpoint control registers.
const EP0_BUFFER_OFFSET: usize = 0x100;

/// Bus events can come from interrupt context on other ports of this
/// firmware, so the descriptor switch lives outside of `main`.
static DESCRIPTORS: DescriptorSwitch = DescriptorSwitch::new();

type Device<'a> = Bridge<'a, Ep0<'a>, Timer<'a>, I2c<'a>, Gpio<'a>, Presence<'a>>;

#[entry]
fn main() -> ! {
    let p = rp2040_pac::Peripherals::take().unwrap();

    //////////////////////////////////////////////////////////////////////////
    // Pins. Bank 0 and its pads come out of reset, then everything we use
    // gets its function selected.

    p.RESETS.reset.modify(|_, w| w.io_bank0().clear_bit().pads_bank0().clear_bit());
    while !p.RESETS.reset_done.read().io_bank0().bit() {}
    while !p.RESETS.reset_done.read().pads_bank0().bit() {}

    if let Some(pin) = LED_PIN {
        p.IO_BANK0.gpio[pin as usize].gpio_ctrl.write(|w| w.funcsel().sio());
        p.SIO.gpio_oe_set.write(|w| unsafe { w.bits(1 << pin) });
    }

    // The two bridged ports start out as inputs, which is the SIO default.
    for base in PORT_BASE {
        for pin in base..base + 8 {
            p.IO_BANK0.gpio[pin as usize].gpio_ctrl.write(|w| w.funcsel().sio());
        }
    }

    // I2C is function 3 on every pin that has it. The bus wants pull-ups; the
    // internal ones are weak but enough for short wires at 100 kHz.
    for pin in [I2C_SDA_PIN, I2C_SCL_PIN] {
        p.IO_BANK0.gpio[pin as usize].gpio_ctrl.write(|w| unsafe { w.funcsel().bits(3) });
        p.PADS_BANK0.gpio[pin as usize].modify(|_, w| w.pue().set_bit().pde().clear_bit());
    }

    //////////////////////////////////////////////////////////////////////////
    // Clocks. XOSC, then PLL_SYS to 132 MHz for the CPU and peripherals, then
    // PLL_USB to the 48 MHz that USB requires.

    p.XOSC.ctrl.write(|w| unsafe { w.bits(0xfab_aa0) });
    while !p.XOSC.status.read().stable().bit() {}
    p.CLOCKS.clk_ref_ctrl.write(|w| w.src().xosc_clksrc());
    while p.CLOCKS.clk_ref_selected.read().bits() != (1 << 2) {}
    p.ROSC.ctrl.write(|w| unsafe { w.bits(0xd1e_fa4) });

    // REFDIV = 1, FBDIV = 132 => VCO 1584 MHz; POSTDIV 6 * 2 => 132 MHz.
    p.RESETS.reset.modify(|_, w| w.pll_sys().clear_bit());
    while !p.RESETS.reset_done.read().pll_sys().bit() {}
    p.PLL_SYS.cs.write(|w| unsafe { w.refdiv().bits(1) });
    p.PLL_SYS.fbdiv_int.write(|w| unsafe { w.fbdiv_int().bits(132) });
    p.PLL_SYS.pwr.write(|w| w.pd().clear_bit().vcopd().clear_bit());
    while !p.PLL_SYS.cs.read().lock().bit() {}
    p.PLL_SYS.prim.write(|w| unsafe { w.postdiv1().bits(6).postdiv2().bits(2) });
    p.PLL_SYS.pwr.modify(|_, w| w.postdivpd().clear_bit());

    p.CLOCKS.clk_sys_ctrl.write(|w| w.auxsrc().clksrc_pll_sys());
    p.CLOCKS.clk_sys_ctrl.modify(|_, w| w.src().clksrc_clk_sys_aux());
    while p.CLOCKS.clk_sys_selected.read().bits() != (1 << 1) {}

    // clk_peri feeds the I2C block; PERI_HZ assumes it follows clk_sys.
    p.CLOCKS.clk_peri_ctrl.write(|w| w.auxsrc().clk_sys().enable().set_bit());

    // REFDIV = 1, FBDIV = 100 => VCO 1200 MHz; POSTDIV 5 * 5 => 48 MHz.
    p.RESETS.reset.modify(|_, w| w.pll_usb().clear_bit());
    while !p.RESETS.reset_done.read().pll_usb().bit() {}
    p.PLL_USB.cs.write(|w| unsafe { w.refdiv().bits(1) });
    p.PLL_USB.fbdiv_int.write(|w| unsafe { w.fbdiv_int().bits(100) });
    p.PLL_USB.pwr.write(|w| w.pd().clear_bit().vcopd().clear_bit());
    while !p.PLL_USB.cs.read().lock().bit() {}
    p.PLL_USB.prim.write(|w| unsafe { w.postdiv1().bits(5).postdiv2().bits(5) });
    p.PLL_USB.pwr.modify(|_, w| w.postdivpd().clear_bit());
    p.CLOCKS.clk_usb_ctrl.write(|w| w.auxsrc().clksrc_pll_usb().enable().set_bit());

    //////////////////////////////////////////////////////////////////////////
    // Microsecond timer. The TIMER block counts watchdog ticks, and the
    // watchdog tick generator divides clk_ref (now the 12 MHz crystal) down
    // to 1 MHz.

    p.WATCHDOG.tick.write(|w| unsafe { w.cycles().bits(12).enable().set_bit() });
    p.RESETS.reset.modify(|_, w| w.timer().clear_bit());
    while !p.RESETS.reset_done.read().timer().bit() {}

    let timer = Timer { timer: &p.TIMER };

    //////////////////////////////////////////////////////////////////////////
    // I2C.

    let mut i2c = I2c {
        regs: i2c_block(&p),
        timer,
    };
    i2c.init();

    //////////////////////////////////////////////////////////////////////////
    // USB. All we have is EP0.

    p.RESETS.reset.modify(|_, w| w.usbctrl().set_bit());
    p.RESETS.reset.modify(|_, w| w.usbctrl().clear_bit());
    while !p.RESETS.reset_done.read().usbctrl().bit() {}

    p.USBCTRL_DPRAM.setup_packet_low.write(|w| unsafe { w.bits(0) });
    p.USBCTRL_DPRAM.setup_packet_high.write(|w| unsafe { w.bits(0) });
    for epc in &p.USBCTRL_DPRAM.ep_control {
        epc.write(|w| unsafe { w.bits(0) });
    }
    for epb in &p.USBCTRL_DPRAM.ep_buffer_control {
        epb.write(|w| unsafe { w.bits(0) });
    }

    p.USBCTRL_REGS.usb_muxing.write(|w| w.to_phy().set_bit().softcon().set_bit());
    // Not every board wires up VBUS detect, so pretend we always see it.
    p.USBCTRL_REGS.usb_pwr.write(|w| w.vbus_detect().set_bit().vbus_detect_override_en().set_bit());
    p.USBCTRL_REGS.main_ctrl.write(|w| w.controller_en().set_bit().host_ndevice().clear_bit());
    p.USBCTRL_REGS.inte.write(|w| w.bus_reset().set_bit().setup_req().set_bit());

    let ep0 = Ep0 {
        dpram: &p.USBCTRL_DPRAM,
        regs: &p.USBCTRL_REGS,
        buffer: ep0_buffer(),
        armed: None,
        next_pid_in: true,
        next_pid_out: true,
    };
    ep0.clear_buffer();

    let mut bridge: Device<'_> = Bridge::new(
        ep0,
        timer,
        i2c,
        Gpio { sio: &p.SIO },
        Presence { regs: &p.USBCTRL_REGS },
        &DESCRIPTORS,
        Config::DEFAULT,
    );

    // Pull-up on D+. From here on the host can see us.
    bridge.presence().connect();

    //////////////////////////////////////////////////////////////////////////
    // Main loop.

    loop {
        let ints = p.USBCTRL_REGS.ints.read();

        if ints.setup_req().bit() {
            raise_pin(&p.SIO, LED_PIN);
            p.USBCTRL_REGS.sie_status.write(|w| w.setup_rec().set_bit());

            // The PAC models the setup packet as two 32-bit registers.
            let mut setup_packet = [0; 8];
            setup_packet[..4].copy_from_slice(&p.USBCTRL_DPRAM.setup_packet_low.read().bits().to_le_bytes());
            setup_packet[4..].copy_from_slice(&p.USBCTRL_DPRAM.setup_packet_high.read().bits().to_le_bytes());

            if let Some(req) = ControlRequest::parse(&setup_packet) {
                bridge.ep0().endpoint_mut().setup_received();
                // Both calls log and stall EP0 on failure. The host will retry
                // or give up, and either way the next SETUP starts clean.
                if let Ok(Status::Deferred) = bridge.handle_setup(&req) {
                    let _ = bridge.answer_deferred(&req, |ep0, speed| {
                        enumerate(ep0, speed, &req, &p.USBCTRL_REGS)
                    });
                }
            }
            lower_pin(&p.SIO, LED_PIN);
        }

        if ints.bus_reset().bit() {
            raise_pin(&p.SIO, LED_PIN);
            p.USBCTRL_REGS.sie_status.write(|w| w.bus_reset().set_bit());
            p.USBCTRL_REGS.addr_endp.write(|w| unsafe { w.address().bits(0) });

            bridge.ep0().endpoint_mut().setup_received();
            bridge.on_bus_reset();
            // This controller can't do high speed, but a reset is where the
            // negotiation would have happened, so ask anyway.
            bridge.on_high_speed_grant();
            lower_pin(&p.SIO, LED_PIN);
        }
    }
}

/// Standard requests that the bridge leaves to us: addressing and
/// descriptors, mostly.
fn enumerate(
    ep0: &mut TransferBuffer<Ep0<'_>, Timer<'_>>,
    speed: SpeedDescriptors,
    req: &ControlRequest,
    usb: &rp2040_pac::USBCTRL_REGS,
) -> Result<(), Error> {
    match (req.direction(), req.standard_request()) {
        (UsbDir::Out, Some(UsbSetupRequest::SetAddress)) => {
            // The status stage has to go out from our old address, so the
            // new one is only applied once it's been collected.
            ep0.acknowledge(UsbDir::Out);
            ep0.wait_free()?;
            usb.addr_endp.write(|w| unsafe { w.address().bits(req.value_low() & 0x7F) });
        }
        (UsbDir::In, Some(UsbSetupRequest::GetDescriptor)) => {
            let mut tmp = [0; EP0_BUFFER_SIZE];
            let len = match UsbDescType::from_u8(req.value_high()) {
                Some(UsbDescType::Device) => {
                    let d = DEVICE_DESCRIPTOR.as_bytes();
                    tmp[..d.len()].copy_from_slice(d);
                    Some(d.len())
                }
                Some(ty @ (UsbDescType::Config | UsbDescType::OtherSpeedConfig)) => {
                    descriptor::write_speed_configuration(speed, ty, &mut tmp)
                }
                Some(UsbDescType::String) => {
                    descriptor::write_string(usize::from(req.value_low()), &mut tmp)
                }
                // Including DeviceQualifier, which a full-speed-only device
                // is supposed to refuse.
                _ => None,
            };
            match len {
                Some(len) => {
                    let len = len.min(usize::from(req.length));
                    ep0.send_bytes(&tmp[..len])?;
                    ep0.acknowledge(UsbDir::In);
                }
                None => ep0.stall(),
            }
        }
        (UsbDir::In, Some(UsbSetupRequest::GetStatus)) => {
            // Bus powered, no remote wakeup, nothing halted.
            ep0.send_bytes(&[0, 0])?;
            ep0.acknowledge(UsbDir::In);
        }
        (UsbDir::Out, _) => {
            // Any other OUT gets the same zero-length status phase as the ones
            // we understand. This keeps the host from spinning forever while
            // we NAK.
            ep0.acknowledge(UsbDir::Out);
        }
        (UsbDir::In, _) => ep0.stall(),
    }
    Ok(())
}

fn ep0_buffer() -> &'static UnsafeCell<[u8; 64]> {
    let addr = rp2040_pac::USBCTRL_DPRAM::ptr() as usize + EP0_BUFFER_OFFSET;
    // Safety: this is 64 bytes of plain SRAM at a fixed address, reserved by
    // the hardware for EP0. Nothing else in this program refers to it, and
    // it's only accessed while the controller doesn't own it (see `Ep0`).
    unsafe { &*(addr as *const UnsafeCell<[u8; 64]>) }
}

////////////////////////////////////////////////////////////////////////////
// EP0.

struct Ep0<'a> {
    dpram: &'a rp2040_pac::USBCTRL_DPRAM,
    regs: &'a rp2040_pac::USBCTRL_REGS,
    buffer: &'static UnsafeCell<[u8; 64]>,
    /// Direction we last handed the buffer to the controller in, which is the
    /// buffer control register whose AVAILABLE bit says whether it's done.
    armed: Option<UsbDir>,
    /// DATA0/1 PID expected next in each direction. `true` means DATA1.
    next_pid_in: bool,
    next_pid_out: bool,
}

// Buffer control register indices, IN before OUT.
const EP0_IN_BC: usize = 0;
const EP0_OUT_BC: usize = 1;

impl Ep0<'_> {
    /// Every data stage and status stage starts with DATA1, and a new SETUP
    /// cancels whatever was in flight.
    fn setup_received(&mut self) {
        self.next_pid_in = true;
        self.next_pid_out = true;
        self.armed = None;
    }

    fn clear_buffer(&self) {
        // Safety: the controller isn't running yet.
        unsafe { *self.buffer.get() = [0; 64] };
    }

    fn start_rx(&mut self, len: usize) {
        let pid = self.next_pid_out;
        self.dpram.ep_buffer_control[EP0_OUT_BC].write(|w| unsafe {
            w.pid_0().bit(pid)
                // Not full: the host fills it.
                .full_0().clear_bit()
                .available_0().set_bit()
                .length_0().bits(len as u16)
        });
        self.next_pid_out = !pid;
        self.armed = Some(UsbDir::Out);
    }
}

impl ControlEndpoint for Ep0<'_> {
    fn busy(&mut self) -> bool {
        let bc = match self.armed {
            Some(UsbDir::In) => EP0_IN_BC,
            Some(UsbDir::Out) => EP0_OUT_BC,
            None => return false,
        };
        // The hardware clears AVAILABLE when it's done with the buffer.
        self.dpram.ep_buffer_control[bc].read().available_0().bit()
    }

    fn buffer(&self) -> &[u8; 64] {
        // Safety: shared access from our side; `TransferBuffer` only looks
        // at the contents after the controller has handed them back.
        unsafe { &*self.buffer.get() }
    }

    fn buffer_mut(&mut self) -> &mut [u8; 64] {
        // Safety: as above, and `&mut self` means no other reference from
        // our side is live.
        unsafe { &mut *self.buffer.get() }
    }

    fn arm_in(&mut self, len: usize) {
        let pid = self.next_pid_in;
        self.dpram.ep_buffer_control[EP0_IN_BC].write(|w| unsafe {
            w.pid_0().bit(pid)
                // We have put data in, and it's for the host now.
                .full_0().set_bit()
                .available_0().set_bit()
                .length_0().bits(len as u16)
        });
        self.next_pid_in = !pid;
        self.armed = Some(UsbDir::In);
    }

    fn arm_out(&mut self) {
        self.start_rx(EP0_BUFFER_SIZE);
    }

    fn out_len(&self) -> usize {
        self.dpram.ep_buffer_control[EP0_OUT_BC].read().length_0().bits() as usize
    }

    fn complete_status(&mut self, dir: UsbDir) {
        match dir {
            // Zero-length IN.
            UsbDir::Out => self.arm_in(0),
            // Wait for the host's zero-length OUT.
            UsbDir::In => self.start_rx(0),
        }
    }

    fn stall(&mut self) {
        self.regs.ep_stall_arm.write(|w| w.ep0_in().set_bit().ep0_out().set_bit());
        for bc in [EP0_IN_BC, EP0_OUT_BC] {
            self.dpram.ep_buffer_control[bc].write(|w| w.stall().set_bit());
        }
        self.armed = None;
    }
}

////////////////////////////////////////////////////////////////////////////
// Timer.

#[derive(Copy, Clone)]
struct Timer<'a> {
    timer: &'a rp2040_pac::TIMER,
}

impl Clock for Timer<'_> {
    fn now_us(&self) -> u32 {
        // The raw low word doesn't latch the high word, which we don't want.
        self.timer.timerawl.read().bits()
    }
}

////////////////////////////////////////////////////////////////////////////
// I2C, on the DesignWare controller.

const IC_CON_MASTER_MODE: u32 = 1 << 0;
const IC_CON_SPEED_FAST: u32 = 2 << 1;
const IC_CON_RESTART_EN: u32 = 1 << 5;
const IC_CON_SLAVE_DISABLE: u32 = 1 << 6;
const IC_CON_TX_EMPTY_CTRL: u32 = 1 << 8;

const IC_DATA_CMD_READ: u32 = 1 << 8;
const IC_DATA_CMD_STOP: u32 = 1 << 9;

const IC_RAW_TX_ABRT: u32 = 1 << 6;
const IC_RAW_STOP_DET: u32 = 1 << 9;
const IC_STATUS_TFNF: u32 = 1 << 1;
const IC_ABRT_7B_ADDR_NOACK: u32 = 1 << 0;

/// Longest we'll wait for the controller to make progress on one byte. A
/// byte takes 90 us at 100 kHz, so this only trips if the bus is stuck.
const I2C_BYTE_TIMEOUT_US: u32 = 10_000;

struct I2c<'a> {
    regs: &'a rp2040_pac::i2c0::RegisterBlock,
    timer: Timer<'a>,
}

impl I2c<'_> {
    fn init(&mut self) {
        self.regs.ic_enable.write(|w| unsafe { w.bits(0) });
        // The timing registers decide the actual speed, so the controller
        // always runs in "fast" mode and we pick the counts.
        self.regs.ic_con.write(|w| unsafe {
            w.bits(
                IC_CON_MASTER_MODE
                    | IC_CON_SPEED_FAST
                    | IC_CON_RESTART_EN
                    | IC_CON_SLAVE_DISABLE
                    | IC_CON_TX_EMPTY_CTRL,
            )
        });
        self.regs.ic_tx_tl.write(|w| unsafe { w.bits(0) });
        self.regs.ic_rx_tl.write(|w| unsafe { w.bits(0) });
        self.set_fast_mode(false);
    }

    fn set_baud(&mut self, hz: u32) {
        let period = (PERI_HZ + hz / 2) / hz;
        let lcnt = period * 3 / 5;
        let hcnt = period - lcnt;
        let spklen = if lcnt < 16 { 1 } else { lcnt / 16 };
        // 300 ns of SDA hold, for anything below 1 MHz.
        let sda_hold = PERI_HZ * 3 / 10_000_000 + 1;

        self.regs.ic_enable.write(|w| unsafe { w.bits(0) });
        self.regs.ic_fs_scl_hcnt.write(|w| unsafe { w.bits(hcnt) });
        self.regs.ic_fs_scl_lcnt.write(|w| unsafe { w.bits(lcnt) });
        self.regs.ic_fs_spklen.write(|w| unsafe { w.bits(spklen) });
        self.regs.ic_sda_hold.modify(|r, w| unsafe { w.bits((r.bits() & !0xFFFF) | sda_hold) });
        self.regs.ic_enable.write(|w| unsafe { w.bits(1) });
    }

    fn target(&mut self, addr: u8) {
        self.regs.ic_enable.write(|w| unsafe { w.bits(0) });
        self.regs.ic_tar.write(|w| unsafe { w.bits(u32::from(addr & 0x7F)) });
        self.regs.ic_enable.write(|w| unsafe { w.bits(1) });
    }

    /// If the controller gave up on the transfer, clears the condition and
    /// says why.
    fn check_abort(&self, addr: u8) -> Result<(), I2cError> {
        if self.regs.ic_raw_intr_stat.read().bits() & IC_RAW_TX_ABRT == 0 {
            return Ok(());
        }
        let reason = self.regs.ic_tx_abrt_source.read().bits();
        // Read-to-clear.
        let _ = self.regs.ic_clr_tx_abrt.read();
        let _ = self.regs.ic_clr_stop_det.read();
        if reason & IC_ABRT_7B_ADDR_NOACK != 0 {
            Err(I2cError::Nack { addr })
        } else {
            Err(I2cError::Abort { reason })
        }
    }

    /// Spins until `ready` holds, the controller aborts, or the bus looks
    /// stuck.
    fn wait(&self, addr: u8, ready: impl Fn(&Self) -> bool) -> Result<(), I2cError> {
        let start = self.timer.now_us();
        loop {
            self.check_abort(addr)?;
            if ready(self) {
                return Ok(());
            }
            if self.timer.now_us().wrapping_sub(start) >= I2C_BYTE_TIMEOUT_US {
                return Err(I2cError::Stuck);
            }
        }
    }

    fn wait_tx_space(&self, addr: u8) -> Result<(), I2cError> {
        self.wait(addr, |i2c| i2c.regs.ic_status.read().bits() & IC_STATUS_TFNF != 0)
    }

    fn wait_stop(&self, addr: u8) -> Result<(), I2cError> {
        self.wait(addr, |i2c| {
            i2c.regs.ic_raw_intr_stat.read().bits() & IC_RAW_STOP_DET != 0
        })?;
        let _ = self.regs.ic_clr_stop_det.read();
        Ok(())
    }
}

impl I2cBus for I2c<'_> {
    fn read(&mut self, addr: u8, buf: &mut [u8]) -> Result<(), I2cError> {
        if buf.is_empty() {
            return Ok(());
        }
        self.target(addr);
        let last = buf.len() - 1;
        for (i, byte) in buf.iter_mut().enumerate() {
            let stop = if i == last { IC_DATA_CMD_STOP } else { 0 };
            self.wait_tx_space(addr)?;
            self.regs.ic_data_cmd.write(|w| unsafe { w.bits(IC_DATA_CMD_READ | stop) });
            self.wait(addr, |i2c| i2c.regs.ic_rxflr.read().bits() != 0)?;
            *byte = self.regs.ic_data_cmd.read().bits() as u8;
        }
        self.wait_stop(addr)
    }

    fn write(&mut self, addr: u8, data: &[u8]) -> Result<(), I2cError> {
        if data.is_empty() {
            return Ok(());
        }
        self.target(addr);
        let last = data.len() - 1;
        for (i, &byte) in data.iter().enumerate() {
            let stop = if i == last { IC_DATA_CMD_STOP } else { 0 };
            self.wait_tx_space(addr)?;
            self.regs.ic_data_cmd.write(|w| unsafe { w.bits(u32::from(byte) | stop) });
        }
        self.wait_stop(addr)?;
        // An address NACK can show up alongside the STOP.
        self.check_abort(addr)
    }

    fn set_fast_mode(&mut self, fast: bool) {
        self.set_baud(if fast { 400_000 } else { 100_000 });
    }
}

////////////////////////////////////////////////////////////////////////////
// GPIO ports, as 8-bit windows onto the SIO registers.

struct Gpio<'a> {
    sio: &'a rp2040_pac::SIO,
}

fn port_shift(port: Port) -> u32 {
    u32::from(PORT_BASE[port as usize])
}

impl GpioPorts for Gpio<'_> {
    fn direction(&self, port: Port) -> u8 {
        (self.sio.gpio_oe.read().bits() >> port_shift(port)) as u8
    }

    fn set_direction(&mut self, port: Port, mask: u8) {
        let shift = port_shift(port);
        self.sio.gpio_oe_set.write(|w| unsafe { w.bits(u32::from(mask) << shift) });
        self.sio.gpio_oe_clr.write(|w| unsafe { w.bits(u32::from(!mask) << shift) });
    }

    fn value(&self, port: Port) -> u8 {
        (self.sio.gpio_in.read().bits() >> port_shift(port)) as u8
    }

    fn set_value(&mut self, port: Port, value: u8) {
        let shift = port_shift(port);
        self.sio.gpio_out_set.write(|w| unsafe { w.bits(u32::from(value) << shift) });
        self.sio.gpio_out_clr.write(|w| unsafe { w.bits(u32::from(!value) << shift) });
    }
}

////////////////////////////////////////////////////////////////////////////
// Bus presence.

struct Presence<'a> {
    regs: &'a rp2040_pac::USBCTRL_REGS,
}

impl BusPresence for Presence<'_> {
    fn disconnect(&mut self) {
        self.regs.sie_ctrl.modify(|_, w| w.pullup_en().clear_bit());
    }

    fn connect(&mut self) {
        self.regs.sie_ctrl.modify(|_, w| w.pullup_en().set_bit());
    }

    fn high_speed(&self) -> bool {
        // Full speed is all this controller does.
        false
    }
}

////////////////////////////////////////////////////////////////////////////
// Assorted RP2040 support stuff.

/// Raise the activity pin, if this board has one.
///
/// The pin must already be configured as an SIO output.
#[inline(always)]
fn raise_pin(sio: &rp2040_pac::SIO, pin: Option<u8>) {
    if let Some(pin) = pin {
        sio.gpio_out_set.write(|w| unsafe { w.bits(1 << pin) });
    }
}

/// Lower the activity pin, if this board has one.
#[inline(always)]
fn lower_pin(sio: &rp2040_pac::SIO, pin: Option<u8>) {
    if let Some(pin) = pin {
        sio.gpio_out_clr.write(|w| unsafe { w.bits(1 << pin) });
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Simulated hardware for driving a `Bridge` from tests.
//!
//! The simulated host is scripted: OUT data it will send is queued up front,
//! and everything the device does on the bus is written to a shared journal
//! with the simulated time it happened at.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use usb_bridge::hal::{BusPresence, Clock, ControlEndpoint, GpioPorts, I2cBus};
use usb_bridge::{Bridge, Config, DescriptorSwitch, I2cError, Port, UsbDir};

/// Microseconds that pass every time somebody looks at the clock.
pub const TICK_US: u32 = 100;

/// Cloning gives another handle on the same time.
#[derive(Clone)]
pub struct SimClock {
    now: Rc<Cell<u32>>,
}

impl SimClock {
    pub fn peek(&self) -> u32 {
        self.now.get()
    }
}

impl Clock for SimClock {
    fn now_us(&self) -> u32 {
        let t = self.now.get().wrapping_add(TICK_US);
        self.now.set(t);
        t
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Data the host collected on an IN.
    In(Vec<u8>),
    Status(UsbDir),
    Stall,
    Disconnect,
    Connect,
}

pub struct Journal {
    pub clock: SimClock,
    events: RefCell<Vec<(u32, Event)>>,
}

impl Journal {
    fn record(&self, event: Event) {
        self.events.borrow_mut().push((self.clock.peek(), event));
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().iter().map(|(_, e)| e.clone()).collect()
    }

    pub fn timed_events(&self) -> Vec<(u32, Event)> {
        self.events.borrow().clone()
    }

    /// Payloads of every IN the host received, in order.
    pub fn in_packets(&self) -> Vec<Vec<u8>> {
        self.events
            .borrow()
            .iter()
            .filter_map(|(_, e)| match e {
                Event::In(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

enum Pending {
    Idle,
    In,
    Out,
}

/// EP0 plus a scripted host on the other end of it.
pub struct SimEp0 {
    journal: Rc<Journal>,
    buf: [u8; 64],
    pending: Pending,
    /// Polls of `busy` the controller takes to get through a packet.
    latency: u32,
    countdown: u32,
    out_len: usize,
    host_out: VecDeque<Vec<u8>>,
    /// When false, INs are never picked up and stay armed forever.
    pub host_collects: bool,
}

impl SimEp0 {
    /// Queues packets the host will send on its next OUTs.
    pub fn host_sends(&mut self, packets: &[&[u8]]) {
        self.host_out.extend(packets.iter().map(|p| p.to_vec()));
    }

    pub fn unsent(&self) -> usize {
        self.host_out.len()
    }
}

impl ControlEndpoint for SimEp0 {
    fn busy(&mut self) -> bool {
        if self.countdown > 0 {
            self.countdown -= 1;
            return true;
        }
        match self.pending {
            Pending::Idle => false,
            Pending::In if self.host_collects => {
                self.pending = Pending::Idle;
                false
            }
            // The host has stopped reading.
            Pending::In => true,
            Pending::Out => match self.host_out.pop_front() {
                Some(packet) => {
                    // A packet longer than the buffer stands in for a
                    // controller reporting a bogus length; only the length
                    // is passed on.
                    let n = packet.len().min(self.buf.len());
                    self.buf[..n].copy_from_slice(&packet[..n]);
                    self.out_len = packet.len();
                    self.pending = Pending::Idle;
                    false
                }
                // The host has nothing more to say.
                None => true,
            },
        }
    }

    fn buffer(&self) -> &[u8; 64] {
        &self.buf
    }

    fn buffer_mut(&mut self) -> &mut [u8; 64] {
        assert!(
            matches!(self.pending, Pending::Idle),
            "buffer touched while the controller owns it"
        );
        &mut self.buf
    }

    fn arm_in(&mut self, len: usize) {
        self.journal.record(Event::In(self.buf[..len].to_vec()));
        self.pending = Pending::In;
        self.countdown = self.latency;
    }

    fn arm_out(&mut self) {
        self.pending = Pending::Out;
        self.countdown = self.latency;
    }

    fn out_len(&self) -> usize {
        self.out_len
    }

    fn complete_status(&mut self, dir: UsbDir) {
        self.journal.record(Event::Status(dir));
    }

    fn stall(&mut self) {
        self.journal.record(Event::Stall);
    }
}

/// An I2C bus where every device answers reads with an incrementing byte
/// pattern, unless it's been told to NACK.
#[derive(Default)]
pub struct SimI2c {
    pub reads: Vec<(u8, usize)>,
    pub writes: Vec<(u8, Vec<u8>)>,
    pub speed_changes: Vec<bool>,
    pub nack_addr: Option<u8>,
    next: u8,
}

impl I2cBus for SimI2c {
    fn read(&mut self, addr: u8, buf: &mut [u8]) -> Result<(), I2cError> {
        self.reads.push((addr, buf.len()));
        if self.nack_addr == Some(addr) {
            // Leave garbage behind, as a real controller might.
            buf.fill(0xEE);
            return Err(I2cError::Nack { addr });
        }
        for b in buf {
            *b = self.next;
            self.next = self.next.wrapping_add(1);
        }
        Ok(())
    }

    fn write(&mut self, addr: u8, data: &[u8]) -> Result<(), I2cError> {
        self.writes.push((addr, data.to_vec()));
        if self.nack_addr == Some(addr) {
            return Err(I2cError::Nack { addr });
        }
        Ok(())
    }

    fn set_fast_mode(&mut self, fast: bool) {
        self.speed_changes.push(fast);
    }
}

#[derive(Default)]
pub struct SimGpio {
    pub direction: [u8; 2],
    pub value: [u8; 2],
}

impl GpioPorts for SimGpio {
    fn direction(&self, port: Port) -> u8 {
        self.direction[port as usize]
    }

    fn set_direction(&mut self, port: Port, mask: u8) {
        self.direction[port as usize] = mask;
    }

    fn value(&self, port: Port) -> u8 {
        self.value[port as usize]
    }

    fn set_value(&mut self, port: Port, value: u8) {
        self.value[port as usize] = value;
    }
}

pub struct SimPresence {
    journal: Rc<Journal>,
    pub high_speed: bool,
}

impl BusPresence for SimPresence {
    fn disconnect(&mut self) {
        self.journal.record(Event::Disconnect);
    }

    fn connect(&mut self) {
        self.journal.record(Event::Connect);
    }

    fn high_speed(&self) -> bool {
        self.high_speed
    }
}

pub type SimBridge<'a> = Bridge<'a, SimEp0, SimClock, SimI2c, SimGpio, SimPresence>;

/// Builds a bridge on simulated hardware with the default configuration.
pub fn bridge(switch: &DescriptorSwitch) -> (SimBridge<'_>, Rc<Journal>) {
    bridge_with(switch, Config::DEFAULT)
}

pub fn bridge_with(switch: &DescriptorSwitch, config: Config) -> (SimBridge<'_>, Rc<Journal>) {
    let clock = SimClock {
        now: Rc::new(Cell::new(0)),
    };
    let journal = Rc::new(Journal {
        clock: clock.clone(),
        events: RefCell::new(Vec::new()),
    });
    let ep = SimEp0 {
        journal: journal.clone(),
        buf: [0xA5; 64],
        pending: Pending::Idle,
        latency: 3,
        countdown: 0,
        out_len: 0,
        host_out: VecDeque::new(),
        host_collects: true,
    };
    let presence = SimPresence {
        journal: journal.clone(),
        high_speed: false,
    };
    let bridge = Bridge::new(
        ep,
        clock,
        SimI2c::default(),
        SimGpio::default(),
        presence,
        switch,
        config,
    );
    (bridge, journal)
}

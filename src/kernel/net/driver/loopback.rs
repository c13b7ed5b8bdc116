//! An Ethernet device whose wire ends in a [`Responder`].
//!
//! Every transmitted frame is shown to the responder, which may queue frames
//! that the next [`NetDevice::poll`] delivers. Delays only advance a counter,
//! so a simulated dump runs as fast as the host allows while the number of
//! polls and the virtual time spent stay observable.

use crate::error::{Error, Result};
use crate::net::device::{
    DeviceCaps, DeviceEvent, NetDevice, NetDeviceFlags, NetDeviceType, RxFlags, RxFrame,
};
use crate::net::ethernet::MacAddr;
use heapless::{Deque, Vec};

/// Deep enough to hold the acknowledgements for one full window.
pub const RX_RING: usize = 64;

/// Largest frame a ring slot holds: a 1500 byte MTU plus Ethernet header and FCS.
pub const RX_FRAME_MAX: usize = 1518;

pub struct RxQueue {
    frames: Deque<Vec<u8, RX_FRAME_MAX>, RX_RING>,
    dropped: u32,
}

impl RxQueue {
    const fn new() -> Self {
        Self {
            frames: Deque::new(),
            dropped: 0,
        }
    }

    /// Queues a frame for delivery; a full ring drops it like real hardware would.
    pub fn push(&mut self, frame: &[u8]) -> Result<()> {
        let slot = Vec::from_slice(frame).map_err(|_| Error::FrameTooLarge)?;
        if self.frames.push_back(slot).is_err() {
            self.dropped += 1;
            return Err(Error::QueueFull);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

/// The far end of the simulated wire.
pub trait Responder {
    fn on_transmit(&mut self, frame: &[u8], rx: &mut RxQueue);

    fn on_poll(&mut self, _rx: &mut RxQueue) {}
}

/// A wire nobody listens on.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl Responder for Silent {
    fn on_transmit(&mut self, _frame: &[u8], _rx: &mut RxQueue) {}
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoopbackStats {
    pub tx_frames: u64,
    pub tx_bytes: u64,
    pub tx_errors: u64,
    pub rx_frames: u64,
    pub polls: u64,
    pub delay_us: u64,
    pub starts: u32,
    pub ends: u32,
}

pub struct LoopbackDevice<R> {
    name: [u8; 16],
    hw_addr: MacAddr,
    mtu: usize,
    flags: NetDeviceFlags,
    caps: DeviceCaps,
    rx_flags: RxFlags,
    rx: RxQueue,
    responder: R,
    stats: LoopbackStats,
    fail_transmits: u32,
    fail_with: Error,
}

impl<R: Responder> LoopbackDevice<R> {
    pub fn new(name: &str, hw_addr: MacAddr, mtu: usize, responder: R) -> Self {
        let mut name_buf = [0u8; 16];
        let bytes = name.as_bytes();
        let len = bytes.len().min(15);
        name_buf[..len].copy_from_slice(&bytes[..len]);
        Self {
            name: name_buf,
            hw_addr,
            mtu,
            flags: NetDeviceFlags::UP | NetDeviceFlags::RUNNING | NetDeviceFlags::BROADCAST,
            caps: DeviceCaps::NETDUMP,
            rx_flags: RxFlags::empty(),
            rx: RxQueue::new(),
            responder,
            stats: LoopbackStats::default(),
            fail_transmits: 0,
            fail_with: Error::QueueFull,
        }
    }

    pub fn set_flags(&mut self, flags: NetDeviceFlags) {
        self.flags = flags;
    }

    pub fn set_caps(&mut self, caps: DeviceCaps) {
        self.caps = caps;
    }

    /// Flags stamped on every delivered frame, as a checksum-offloading NIC would.
    pub fn set_rx_flags(&mut self, flags: RxFlags) {
        self.rx_flags = flags;
    }

    /// Makes the next `count` transmits fail with `err` without reaching the wire.
    pub fn fail_next_transmits(&mut self, count: u32, err: Error) {
        self.fail_transmits = count;
        self.fail_with = err;
    }

    /// Delivers `frame` on a later poll, bypassing the responder.
    pub fn inject(&mut self, frame: &[u8]) -> Result<()> {
        self.rx.push(frame)
    }

    pub fn stats(&self) -> LoopbackStats {
        self.stats
    }

    pub fn responder(&self) -> &R {
        &self.responder
    }

    pub fn responder_mut(&mut self) -> &mut R {
        &mut self.responder
    }
}

impl<R: Responder> NetDevice for LoopbackDevice<R> {
    fn name(&self) -> &str {
        let end = self
            .name
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(self.name.len());
        core::str::from_utf8(&self.name[..end]).unwrap_or("")
    }

    fn dev_type(&self) -> NetDeviceType {
        NetDeviceType::Ethernet
    }

    fn mtu(&self) -> usize {
        self.mtu
    }

    fn flags(&self) -> NetDeviceFlags {
        self.flags
    }

    fn hw_addr(&self) -> MacAddr {
        self.hw_addr
    }

    fn caps(&self) -> DeviceCaps {
        self.caps
    }

    fn transmit(&mut self, frame: &[u8]) -> Result<()> {
        if self.fail_transmits > 0 {
            self.fail_transmits -= 1;
            self.stats.tx_errors += 1;
            return Err(self.fail_with);
        }
        self.stats.tx_frames += 1;
        self.stats.tx_bytes += frame.len() as u64;
        self.responder.on_transmit(frame, &mut self.rx);
        Ok(())
    }

    fn poll(&mut self, budget: usize, rx: &mut dyn FnMut(RxFrame<'_>)) -> usize {
        self.stats.polls += 1;
        self.responder.on_poll(&mut self.rx);
        let mut delivered = 0;
        while delivered < budget {
            let Some(slot) = self.rx.frames.pop_front() else {
                break;
            };
            rx(RxFrame {
                data: &slot,
                flags: self.rx_flags,
            });
            delivered += 1;
        }
        self.stats.rx_frames += delivered as u64;
        delivered
    }

    fn event(&mut self, event: DeviceEvent) {
        match event {
            DeviceEvent::Start => self.stats.starts += 1,
            DeviceEvent::End => self.stats.ends += 1,
        }
    }

    fn delay_us(&mut self, us: u32) {
        self.stats.delay_us += us as u64;
    }
}

//! The driver side of the dump path.
//!
//! A driver that can carry a dump implements [`NetDevice`]. The dump code never
//! waits on interrupts: it calls [`NetDevice::poll`] in a loop, and the driver
//! hands every received frame to the callback before returning. How the driver
//! reroutes its input path during the dump is its own business; it learns that
//! a dump is starting or ending through [`NetDevice::event`].

use crate::error::{Error, Result};
use crate::net::ethernet::MacAddr;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NetDeviceFlags: u16 {
        const UP = 0x0001;
        const BROADCAST = 0x0002;
        const LOOPBACK = 0x0008;
        const RUNNING = 0x0040;
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DeviceCaps: u32 {
            const NETDUMP = 1 << 0;
        /// Verifies IPv4/UDP checksums in hardware and reports it through [`RxFlags`].
        const RXCSUM = 1 << 1;
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RxFlags: u8 {
        const IP_CHECKED = 1 << 0;
        const IP_VALID = 1 << 1;
        const CSUM_DATA_VALID = 1 << 2;
    }
}

impl RxFlags {
    pub fn ip_csum_ok(self) -> bool {
        self.contains(RxFlags::IP_CHECKED | RxFlags::IP_VALID)
    }

    pub fn data_csum_ok(self) -> bool {
        self.contains(RxFlags::CSUM_DATA_VALID)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetDeviceType {
    Loopback,
    Ethernet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    /// Dump starting: take over the input path, quiesce interrupts.
    Start,
    End,
}

#[derive(Debug, Clone, Copy)]
pub struct RxFrame<'a> {
    pub data: &'a [u8],
    pub flags: RxFlags,
}

impl<'a> RxFrame<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            flags: RxFlags::empty(),
        }
    }
}

pub trait NetDevice {
    fn name(&self) -> &str;
    fn dev_type(&self) -> NetDeviceType;
    fn mtu(&self) -> usize;
    fn flags(&self) -> NetDeviceFlags;
    fn hw_addr(&self) -> MacAddr;
    fn caps(&self) -> DeviceCaps;

    /// Queues one Ethernet frame. Must not block; a full ring is `QueueFull`.
    fn transmit(&mut self, frame: &[u8]) -> Result<()>;

    /// Services the device once, passing each received frame (at most `budget`) to `rx`.
    /// Returns the number of frames delivered.
    fn poll(&mut self, budget: usize, rx: &mut dyn FnMut(RxFrame<'_>)) -> usize;

    fn event(&mut self, _event: DeviceEvent) {}

    fn delay_us(&mut self, us: u32);
}

pub const POLL_BUDGET: usize = 1000;

pub fn is_usable<D: NetDevice + ?Sized>(dev: &D) -> bool {
    dev.flags()
        .contains(NetDeviceFlags::UP | NetDeviceFlags::RUNNING)
}

/// Hands `frame` to the driver, failing fast if the link is not up.
pub fn transmit<D: NetDevice + ?Sized>(dev: &mut D, frame: &[u8]) -> Result<()> {
    if !is_usable(dev) {
        return Err(Error::NetworkDown);
    }
    crate::trace!(DRIVER, "[dev] {} tx {} bytes", dev.name(), frame.len());
    dev.transmit(frame)
}

pub fn poll<D: NetDevice + ?Sized>(dev: &mut D, rx: &mut dyn FnMut(RxFrame<'_>)) -> usize {
    let n = dev.poll(POLL_BUDGET, rx);
    if n > 0 {
        crate::trace!(DRIVER, "[dev] {} rx {} frames", dev.name(), n);
    }
    n
}

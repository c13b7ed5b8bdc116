//! Fixed-capacity frame buffer with headroom for prepending headers.
//!
//! ```text
//! |<-- headroom -->|<-- data (head..tail) -->|<-- tailroom -->|
//! 0              head                      tail          BUF_SIZE
//! ```
//!
//! The TX path starts with `head == tail == HEADROOM`, appends the payload
//! and then pushes UDP, IP and Ethernet headers in front of it. Nothing here
//! allocates, so a buffer can live on the stack of the panic path.

use crate::error::{Error, Result};

/// Ethernet (14) + IPv4 (20) + UDP (8), rounded up.
pub const HEADROOM: usize = 64;

/// Largest frame this crate ever builds or accepts from a driver.
pub const BUF_SIZE: usize = 4352;

#[derive(Clone)]
pub struct PacketBuf {
    buf: [u8; BUF_SIZE],
    head: usize,
    tail: usize,
}

impl PacketBuf {
    pub const fn new() -> Self {
        Self {
            buf: [0; BUF_SIZE],
            head: HEADROOM,
            tail: HEADROOM,
        }
    }

    /// Copies a received frame, with no headroom reserved.
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        if data.len() > BUF_SIZE {
            return Err(Error::BufferFull);
        }
        let mut pkt = Self::new();
        pkt.head = 0;
        pkt.tail = data.len();
        pkt.buf[..data.len()].copy_from_slice(data);
        Ok(pkt)
    }

    pub fn len(&self) -> usize {
        self.tail - self.head
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf[self.head..self.tail]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buf[self.head..self.tail]
    }

    pub fn append(&mut self, data: &[u8]) -> Result<()> {
        self.append_zeroed(data.len())?.copy_from_slice(data);
        Ok(())
    }

    pub fn append_zeroed(&mut self, len: usize) -> Result<&mut [u8]> {
        if BUF_SIZE - self.tail < len {
            return Err(Error::BufferFull);
        }
        let start = self.tail;
        self.tail += len;
        let region = &mut self.buf[start..self.tail];
        region.fill(0);
        Ok(region)
    }

    /// Extends the data region `len` bytes to the front and returns the new header area, zeroed.
    pub fn push_header(&mut self, len: usize) -> Result<&mut [u8]> {
        if self.head < len {
            return Err(Error::BufferFull);
        }
        self.head -= len;
        let region = &mut self.buf[self.head..self.head + len];
        region.fill(0);
        Ok(region)
    }

    /// Drops `len` bytes from the front of the data region.
    pub fn pull_header(&mut self, len: usize) -> Result<()> {
        if self.len() < len {
            return Err(Error::PacketTooShort);
        }
        self.head += len;
        Ok(())
    }
}

impl Default for PacketBuf {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for PacketBuf {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PacketBuf")
            .field("head", &self.head)
            .field("tail", &self.tail)
            .finish()
    }
}

use crate::error::{Error, Result};
use crate::net::packet::PacketBuf;
use core::fmt;

pub const ETHERTYPE_IP: u16 = 0x0800;
pub const ETHERTYPE_ARP: u16 = 0x0806;
pub const ETHERTYPE_VLAN: u16 = 0x8100;

#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const BROADCAST: MacAddr = MacAddr([0xff; 6]);
    pub const ZERO: MacAddr = MacAddr([0; 6]);
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

pub mod wire {
    use crate::error::{Error, Result};
    use crate::net::util::{read_u16, write_u16};

    pub mod field {
        pub type Field = core::ops::Range<usize>;

        pub const DST: Field = 0..6;
        pub const SRC: Field = 6..12;
        pub const ETHERTYPE: Field = 12..14;
    }

    pub const HEADER_LEN: usize = field::ETHERTYPE.end;

    pub struct Packet<'a> {
        buffer: &'a [u8],
    }

    impl<'a> Packet<'a> {
        pub fn new_checked(buffer: &'a [u8]) -> Result<Self> {
            if buffer.len() < HEADER_LEN {
                return Err(Error::PacketTooShort);
            }
            Ok(Self { buffer })
        }

        pub fn dst(&self) -> [u8; 6] {
            let mut mac = [0u8; 6];
            mac.copy_from_slice(&self.buffer[field::DST]);
            mac
        }

        pub fn src(&self) -> [u8; 6] {
            let mut mac = [0u8; 6];
            mac.copy_from_slice(&self.buffer[field::SRC]);
            mac
        }

        pub fn ethertype(&self) -> u16 {
            read_u16(&self.buffer[field::ETHERTYPE])
        }

        pub fn payload(&self) -> &'a [u8] {
            &self.buffer[HEADER_LEN..]
        }
    }

    pub struct PacketMut<'a> {
        buffer: &'a mut [u8],
    }

    impl<'a> PacketMut<'a> {
        pub fn new_unchecked(buffer: &'a mut [u8]) -> Self {
            Self { buffer }
        }

        pub fn set_dst(&mut self, value: [u8; 6]) {
            self.buffer[field::DST].copy_from_slice(&value);
        }

        pub fn set_src(&mut self, value: [u8; 6]) {
            self.buffer[field::SRC].copy_from_slice(&value);
        }

        pub fn set_ethertype(&mut self, value: u16) {
            write_u16(&mut self.buffer[field::ETHERTYPE], value);
        }
    }
}

pub use wire::HEADER_LEN;

#[derive(Debug, Clone, Copy)]
pub struct EthFrame<'a> {
    pub dst: MacAddr,
    pub src: MacAddr,
    pub ethertype: u16,
    pub payload: &'a [u8],
}

/// Prepends an Ethernet header to `pkt`.
pub fn wrap_ethernet(
    pkt: &mut PacketBuf,
    src: MacAddr,
    dst: MacAddr,
    ethertype: u16,
) -> Result<()> {
    let mut hdr = wire::PacketMut::new_unchecked(pkt.push_header(HEADER_LEN)?);
    hdr.set_dst(dst.0);
    hdr.set_src(src.0);
    hdr.set_ethertype(ethertype);
    Ok(())
}

/// Strips the Ethernet header. 802.1Q tagged frames are not supported.
pub fn input(data: &[u8]) -> Result<EthFrame<'_>> {
    let pkt = wire::Packet::new_checked(data)?;
    let ethertype = pkt.ethertype();
    if ethertype == ETHERTYPE_VLAN {
        return Err(Error::VlanTagged);
    }
    crate::trace!(
        ETHER,
        "[ether] {} -> {} type={:#06x} len={}",
        MacAddr(pkt.src()),
        MacAddr(pkt.dst()),
        ethertype,
        data.len()
    );
    Ok(EthFrame {
        dst: MacAddr(pkt.dst()),
        src: MacAddr(pkt.src()),
        ethertype,
        payload: pkt.payload(),
    })
}

use crate::error::{Error, Result};
use crate::net::ethernet::{wrap_ethernet, MacAddr, ETHERTYPE_ARP, ETHERTYPE_IP};
use crate::net::ip::IpAddr;
use crate::net::packet::PacketBuf;

const ARP_HTYPE_ETHERNET: u16 = 1;
const ARP_HLEN_ETH: u8 = 6;
const ARP_PLEN_IPV4: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpOp {
    Request,
    Reply,
    Other(u16),
}

impl From<u16> for ArpOp {
    fn from(value: u16) -> Self {
        match value {
            1 => ArpOp::Request,
            2 => ArpOp::Reply,
            other => ArpOp::Other(other),
        }
    }
}

impl From<ArpOp> for u16 {
    fn from(op: ArpOp) -> u16 {
        match op {
            ArpOp::Request => 1,
            ArpOp::Reply => 2,
            ArpOp::Other(other) => other,
        }
    }
}

pub mod wire {
    use crate::error::{Error, Result};
    use crate::net::util::{read_u16, read_u32, write_u16, write_u32};

    pub mod field {
        pub type Field = core::ops::Range<usize>;

        pub const HTYPE: Field = 0..2;
        pub const PTYPE: Field = 2..4;
        pub const HLEN: usize = 4;
        pub const PLEN: usize = 5;
        pub const OPER: Field = 6..8;
        pub const SHA: Field = 8..14;
        pub const SPA: Field = 14..18;
        pub const THA: Field = 18..24;
        pub const TPA: Field = 24..28;
    }

    pub const PACKET_LEN: usize = field::TPA.end;

    pub struct Packet<'a> {
        buffer: &'a [u8],
    }

    impl<'a> Packet<'a> {
        pub fn new_checked(buffer: &'a [u8]) -> Result<Self> {
            if buffer.len() < PACKET_LEN {
                return Err(Error::PacketTooShort);
            }
            Ok(Self { buffer })
        }

        pub fn htype(&self) -> u16 {
            read_u16(&self.buffer[field::HTYPE])
        }

        pub fn ptype(&self) -> u16 {
            read_u16(&self.buffer[field::PTYPE])
        }

        pub fn hlen(&self) -> u8 {
            self.buffer[field::HLEN]
        }

        pub fn plen(&self) -> u8 {
            self.buffer[field::PLEN]
        }

        pub fn oper(&self) -> u16 {
            read_u16(&self.buffer[field::OPER])
        }

        pub fn sha(&self) -> [u8; 6] {
            let mut sha = [0u8; 6];
            sha.copy_from_slice(&self.buffer[field::SHA]);
            sha
        }

        pub fn spa(&self) -> u32 {
            read_u32(&self.buffer[field::SPA])
        }

        pub fn tha(&self) -> [u8; 6] {
            let mut tha = [0u8; 6];
            tha.copy_from_slice(&self.buffer[field::THA]);
            tha
        }

        pub fn tpa(&self) -> u32 {
            read_u32(&self.buffer[field::TPA])
        }
    }

    pub struct PacketMut<'a> {
        buffer: &'a mut [u8],
    }

    impl<'a> PacketMut<'a> {
        pub fn new_unchecked(buffer: &'a mut [u8]) -> Self {
            Self { buffer }
        }

        pub fn set_htype(&mut self, value: u16) {
            write_u16(&mut self.buffer[field::HTYPE], value);
        }

        pub fn set_ptype(&mut self, value: u16) {
            write_u16(&mut self.buffer[field::PTYPE], value);
        }

        pub fn set_hlen(&mut self, value: u8) {
            self.buffer[field::HLEN] = value;
        }

        pub fn set_plen(&mut self, value: u8) {
            self.buffer[field::PLEN] = value;
        }

        pub fn set_oper(&mut self, value: u16) {
            write_u16(&mut self.buffer[field::OPER], value);
        }

        pub fn set_sha(&mut self, value: [u8; 6]) {
            self.buffer[field::SHA].copy_from_slice(&value);
        }

        pub fn set_spa(&mut self, value: u32) {
            write_u32(&mut self.buffer[field::SPA], value);
        }

        pub fn set_tha(&mut self, value: [u8; 6]) {
            self.buffer[field::THA].copy_from_slice(&value);
        }

        pub fn set_tpa(&mut self, value: u32) {
            write_u32(&mut self.buffer[field::TPA], value);
        }
    }
}

/// An Ethernet/IPv4 ARP packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpPacket {
    pub op: ArpOp,
    pub sender_mac: MacAddr,
    pub sender_ip: IpAddr,
    pub target_mac: MacAddr,
    pub target_ip: IpAddr,
}

impl ArpPacket {
    pub fn request(sender_mac: MacAddr, sender_ip: IpAddr, target_ip: IpAddr) -> Self {
        Self {
            op: ArpOp::Request,
            sender_mac,
            sender_ip,
            target_mac: MacAddr::ZERO,
            target_ip,
        }
    }

    /// The reply to this request as sent by `our_mac`: sender and target swapped, opcode flipped.
    pub fn reply_to(&self, our_mac: MacAddr) -> Self {
        Self {
            op: ArpOp::Reply,
            sender_mac: our_mac,
            sender_ip: self.target_ip,
            target_mac: self.sender_mac,
            target_ip: self.sender_ip,
        }
    }

    pub fn emit(&self, buf: &mut [u8]) {
        let mut pkt = wire::PacketMut::new_unchecked(buf);
        pkt.set_htype(ARP_HTYPE_ETHERNET);
        pkt.set_ptype(ETHERTYPE_IP);
        pkt.set_hlen(ARP_HLEN_ETH);
        pkt.set_plen(ARP_PLEN_IPV4);
        pkt.set_oper(self.op.into());
        pkt.set_sha(self.sender_mac.0);
        pkt.set_spa(self.sender_ip.0);
        pkt.set_tha(self.target_mac.0);
        pkt.set_tpa(self.target_ip.0);
    }

    /// Builds the full Ethernet frame; requests are broadcast, replies unicast to the target.
    pub fn to_frame(&self) -> Result<PacketBuf> {
        let mut pkt = PacketBuf::new();
        self.emit(pkt.append_zeroed(wire::PACKET_LEN)?);
        let dst = match self.op {
            ArpOp::Request => MacAddr::BROADCAST,
            _ => self.target_mac,
        };
        wrap_ethernet(&mut pkt, self.sender_mac, dst, ETHERTYPE_ARP)?;
        Ok(pkt)
    }
}

/// Parses an ARP payload, accepting only Ethernet hardware and IPv4 protocol addresses.
pub fn parse(data: &[u8]) -> Result<ArpPacket> {
    let pkt = wire::Packet::new_checked(data)?;
    if pkt.htype() != ARP_HTYPE_ETHERNET
        || pkt.ptype() != ETHERTYPE_IP
        || pkt.hlen() != ARP_HLEN_ETH
        || pkt.plen() != ARP_PLEN_IPV4
    {
        return Err(Error::UnsupportedProtocol);
    }
    let arp = ArpPacket {
        op: ArpOp::from(pkt.oper()),
        sender_mac: MacAddr(pkt.sha()),
        sender_ip: IpAddr(pkt.spa()),
        target_mac: MacAddr(pkt.tha()),
        target_ip: IpAddr(pkt.tpa()),
    };
    crate::trace!(
        ARP,
        "[arp] {:?} sender={}/{} target={}",
        arp.op,
        arp.sender_ip,
        arp.sender_mac,
        arp.target_ip
    );
    Ok(arp)
}

use super::ip::{self, IpAddr, Ipv4Datagram, PROTOCOL_UDP};
use crate::error::{Error, Result};
use crate::net::packet::PacketBuf;
use crate::net::util::Checksum;

pub mod wire {
    use crate::error::{Error, Result};
    use crate::net::util::{read_u16, write_u16};

    pub mod field {
        pub type Field = core::ops::Range<usize>;

        pub const SRC_PORT: Field = 0..2;
        pub const DST_PORT: Field = 2..4;
        pub const LENGTH: Field = 4..6;
        pub const CHECKSUM: Field = 6..8;
    }

    pub const HEADER_LEN: usize = field::CHECKSUM.end;

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

        pub fn src_port(&self) -> u16 {
            read_u16(&self.buffer[field::SRC_PORT])
        }

        pub fn dst_port(&self) -> u16 {
            read_u16(&self.buffer[field::DST_PORT])
        }

        pub fn len(&self) -> usize {
            read_u16(&self.buffer[field::LENGTH]) as usize
        }

        pub fn checksum(&self) -> u16 {
            read_u16(&self.buffer[field::CHECKSUM])
        }
    }

    pub struct PacketMut<'a> {
        buffer: &'a mut [u8],
    }

    impl<'a> PacketMut<'a> {
        pub fn new_unchecked(buffer: &'a mut [u8]) -> Self {
            Self { buffer }
        }

        pub fn set_src_port(&mut self, value: u16) {
            write_u16(&mut self.buffer[field::SRC_PORT], value);
        }

        pub fn set_dst_port(&mut self, value: u16) {
            write_u16(&mut self.buffer[field::DST_PORT], value);
        }

        pub fn set_len(&mut self, value: u16) {
            write_u16(&mut self.buffer[field::LENGTH], value);
        }

        pub fn set_checksum(&mut self, value: u16) {
            write_u16(&mut self.buffer[field::CHECKSUM], value);
        }
    }
}

pub use wire::HEADER_LEN;

/// UDP + IPv4 header bytes in front of every payload.
pub const UDPIP_HEADER_LEN: usize = HEADER_LEN + ip::HEADER_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpEndpoint {
    pub addr: IpAddr,
    pub port: u16,
}

impl UdpEndpoint {
    pub const fn new(addr: IpAddr, port: u16) -> Self {
        Self { addr, port }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UdpDatagram<'a> {
    pub src: UdpEndpoint,
    pub dst: UdpEndpoint,
    pub payload: &'a [u8],
}

/// One's-complement sum of the pseudo header and `segment`.
fn pseudo_sum(src: IpAddr, dst: IpAddr, segment: &[u8]) -> Checksum {
    let mut sum = Checksum::new();
    sum.add_bytes(&src.to_bytes())
        .add_bytes(&dst.to_bytes())
        .add_u16(PROTOCOL_UDP as u16)
        .add_u16(segment.len() as u16)
        .add_bytes(segment);
    sum
}

/// Prepends a UDP header over the payload already in `pkt`.
///
/// A computed checksum of zero goes on the wire as 0xffff, zero meaning "none".
pub fn fill_header(pkt: &mut PacketBuf, src: UdpEndpoint, dst: UdpEndpoint) -> Result<()> {
    let total_len = HEADER_LEN + pkt.len();
    if total_len > u16::MAX as usize {
        return Err(Error::FrameTooLarge);
    }
    {
        let mut hdr = wire::PacketMut::new_unchecked(pkt.push_header(HEADER_LEN)?);
        hdr.set_src_port(src.port);
        hdr.set_dst_port(dst.port);
        hdr.set_len(total_len as u16);
        hdr.set_checksum(0);
    }
    let csum = match pseudo_sum(src.addr, dst.addr, pkt.as_slice()).finish() {
        0 => 0xffff,
        csum => csum,
    };
    wire::PacketMut::new_unchecked(pkt.as_mut_slice()).set_checksum(csum);
    Ok(())
}

/// Prepends UDP and IPv4 headers over the payload already in `pkt`.
pub fn encapsulate(pkt: &mut PacketBuf, src: UdpEndpoint, dst: UdpEndpoint) -> Result<()> {
    fill_header(pkt, src, dst)?;
    ip::fill_header(pkt, src.addr, dst.addr, PROTOCOL_UDP)
}

pub fn build_udp_ip_frame(payload: &[u8], src: UdpEndpoint, dst: UdpEndpoint) -> Result<PacketBuf> {
    let mut pkt = PacketBuf::new();
    pkt.append(payload)?;
    encapsulate(&mut pkt, src, dst)?;
    Ok(pkt)
}

pub fn verify_checksum(src: IpAddr, dst: IpAddr, segment: &[u8]) -> bool {
    match wire::Packet::new_checked(segment) {
        Ok(hdr) if hdr.checksum() == 0 => true,
        Ok(_) => pseudo_sum(src, dst, segment).sum() == 0xffff,
        Err(_) => false,
    }
}

pub fn input<'a>(datagram: &Ipv4Datagram<'a>, hw_csum_ok: bool) -> Result<UdpDatagram<'a>> {
    if datagram.protocol != PROTOCOL_UDP {
        return Err(Error::UnsupportedProtocol);
    }
    let data = datagram.payload;
    let hdr = wire::Packet::new_checked(data)?;
    let len = hdr.len();
    if len < HEADER_LEN || len > data.len() {
        return Err(Error::InvalidLength);
    }
    if !hw_csum_ok && !verify_checksum(datagram.src, datagram.dst, &data[..len]) {
        return Err(Error::ChecksumError);
    }
    let udp = UdpDatagram {
        src: UdpEndpoint::new(datagram.src, hdr.src_port()),
        dst: UdpEndpoint::new(datagram.dst, hdr.dst_port()),
        payload: &data[HEADER_LEN..len],
    };
    crate::trace!(
        UDP,
        "[udp] {}:{} -> {}:{} {} bytes",
        udp.src.addr,
        udp.src.port,
        udp.dst.addr,
        udp.dst.port,
        udp.payload.len()
    );
    Ok(udp)
}

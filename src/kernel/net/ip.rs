use crate::error::{Error, Result};
use crate::net::packet::PacketBuf;
use crate::net::util::Checksum;
use core::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct IpAddr(pub u32);

impl IpAddr {
    pub const UNSPECIFIED: IpAddr = IpAddr(0);
    pub const LOOPBACK: IpAddr = IpAddr(0x7F00_0001);

    pub const fn new(a: u8, b: u8, c: u8, d: u8) -> Self {
        IpAddr(u32::from_be_bytes([a, b, c, d]))
    }

    pub fn to_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    pub fn is_unspecified(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for IpAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.to_bytes();
        write!(f, "{}.{}.{}.{}", a, b, c, d)
    }
}

impl fmt::Debug for IpAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

pub const PROTOCOL_UDP: u8 = 17;

const IP_VERSION: u8 = 4;
const TOS_LOWDELAY: u8 = 0x10;
const DEFAULT_TTL: u8 = 255;

pub mod wire {
    use crate::error::{Error, Result};
    use crate::net::util::{read_u16, read_u32, write_u16, write_u32};

    pub mod field {
        pub type Field = core::ops::Range<usize>;

        pub const VER_IHL: usize = 0;
        pub const TOS: usize = 1;
        pub const LENGTH: Field = 2..4;
        pub const IDENT: Field = 4..6;
        pub const FLG_OFF: Field = 6..8;
        pub const TTL: usize = 8;
        pub const PROTOCOL: usize = 9;
        pub const CHECKSUM: Field = 10..12;
        pub const SRC_ADDR: Field = 12..16;
        pub const DST_ADDR: Field = 16..20;

        pub const FLG_DF: u16 = 0x4000;
        pub const FLG_MF: u16 = 0x2000;
        pub const OFF_MASK: u16 = 0x1fff;
    }

    pub const HEADER_LEN: usize = field::DST_ADDR.end;

    pub struct Packet<'a> {
        buffer: &'a [u8],
    }

    impl<'a> Packet<'a> {
        pub fn new_checked(buffer: &'a [u8]) -> Result<Self> {
            if buffer.len() < HEADER_LEN {
                return Err(Error::PacketTooShort);
            }
            let packet = Self { buffer };
            let header_len = packet.header_len();
            if header_len < HEADER_LEN || header_len > buffer.len() {
                return Err(Error::InvalidHeaderLen);
            }
            Ok(packet)
        }

        pub fn version(&self) -> u8 {
            self.buffer[field::VER_IHL] >> 4
        }

        pub fn header_len(&self) -> usize {
            ((self.buffer[field::VER_IHL] & 0x0f) as usize) * 4
        }

        pub fn total_len(&self) -> usize {
            read_u16(&self.buffer[field::LENGTH]) as usize
        }

        pub fn ident(&self) -> u16 {
            read_u16(&self.buffer[field::IDENT])
        }

        pub fn flags_offset(&self) -> u16 {
            read_u16(&self.buffer[field::FLG_OFF])
        }

        pub fn ttl(&self) -> u8 {
            self.buffer[field::TTL]
        }

        pub fn protocol(&self) -> u8 {
            self.buffer[field::PROTOCOL]
        }

        pub fn src_addr(&self) -> u32 {
            read_u32(&self.buffer[field::SRC_ADDR])
        }

        pub fn dst_addr(&self) -> u32 {
            read_u32(&self.buffer[field::DST_ADDR])
        }

        pub fn header(&self) -> &'a [u8] {
            &self.buffer[..self.header_len()]
        }
    }

    pub struct PacketMut<'a> {
        buffer: &'a mut [u8],
    }

    impl<'a> PacketMut<'a> {
        pub fn new_unchecked(buffer: &'a mut [u8]) -> Self {
            Self { buffer }
        }

        pub fn set_version_ihl(&mut self, version: u8, header_len: usize) {
            self.buffer[field::VER_IHL] = (version << 4) | ((header_len / 4) as u8 & 0x0f);
        }

        pub fn set_tos(&mut self, value: u8) {
            self.buffer[field::TOS] = value;
        }

        pub fn set_total_len(&mut self, value: u16) {
            write_u16(&mut self.buffer[field::LENGTH], value);
        }

        pub fn set_ident(&mut self, value: u16) {
            write_u16(&mut self.buffer[field::IDENT], value);
        }

        pub fn set_flags_offset(&mut self, value: u16) {
            write_u16(&mut self.buffer[field::FLG_OFF], value);
        }

        pub fn set_ttl(&mut self, value: u8) {
            self.buffer[field::TTL] = value;
        }

        pub fn set_protocol(&mut self, value: u8) {
            self.buffer[field::PROTOCOL] = value;
        }

        pub fn set_checksum(&mut self, value: u16) {
            write_u16(&mut self.buffer[field::CHECKSUM], value);
        }

        pub fn set_src_addr(&mut self, value: u32) {
            write_u32(&mut self.buffer[field::SRC_ADDR], value);
        }

        pub fn set_dst_addr(&mut self, value: u32) {
            write_u32(&mut self.buffer[field::DST_ADDR], value);
        }
    }
}

pub use wire::HEADER_LEN;

/// A validated IPv4 datagram with options stripped and link padding trimmed.
#[derive(Debug, Clone, Copy)]
pub struct Ipv4Datagram<'a> {
    pub src: IpAddr,
    pub dst: IpAddr,
    pub protocol: u8,
    pub payload: &'a [u8],
}

/// Prepends an option-less IPv4 header (DF set, fixed TTL) to `pkt`.
pub fn fill_header(pkt: &mut PacketBuf, src: IpAddr, dst: IpAddr, protocol: u8) -> Result<()> {
    let total_len = HEADER_LEN + pkt.len();
    if total_len > u16::MAX as usize {
        return Err(Error::FrameTooLarge);
    }
    let buf = pkt.push_header(HEADER_LEN)?;
    {
        let mut hdr = wire::PacketMut::new_unchecked(buf);
        hdr.set_version_ihl(IP_VERSION, HEADER_LEN);
        hdr.set_tos(TOS_LOWDELAY);
        hdr.set_total_len(total_len as u16);
        hdr.set_ident(0);
        hdr.set_flags_offset(wire::field::FLG_DF);
        hdr.set_ttl(DEFAULT_TTL);
        hdr.set_protocol(protocol);
        hdr.set_checksum(0);
        hdr.set_src_addr(src.0);
        hdr.set_dst_addr(dst.0);
    }
    let csum = Checksum::new().add_bytes(&buf[..HEADER_LEN]).finish();
    wire::PacketMut::new_unchecked(buf).set_checksum(csum);
    Ok(())
}

/// Validates an inbound IPv4 header.
///
/// The header checksum is verified in software unless the driver already did
/// (`hw_csum_ok`). Fragments are refused since nothing here reassembles.
pub fn input(data: &[u8], hw_csum_ok: bool) -> Result<Ipv4Datagram<'_>> {
    let pkt = wire::Packet::new_checked(data)?;
    if pkt.version() != IP_VERSION {
        return Err(Error::UnsupportedProtocol);
    }
    if !hw_csum_ok && Checksum::new().add_bytes(pkt.header()).sum() != 0xffff {
        return Err(Error::ChecksumError);
    }
    let total_len = pkt.total_len();
    let header_len = pkt.header_len();
    if total_len < header_len || total_len > data.len() {
        return Err(Error::InvalidLength);
    }
    let flg_off = pkt.flags_offset();
    if flg_off & (wire::field::FLG_MF | wire::field::OFF_MASK) != 0 {
        return Err(Error::Fragmented);
    }
    let datagram = Ipv4Datagram {
        src: IpAddr(pkt.src_addr()),
        dst: IpAddr(pkt.dst_addr()),
        protocol: pkt.protocol(),
        payload: &data[header_len..total_len],
    };
    crate::trace!(
        IP,
        "[ip] {} -> {} proto={} len={}",
        datagram.src,
        datagram.dst,
        datagram.protocol,
        total_len
    );
    Ok(datagram)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::util::verify_checksum;

    const SRC: IpAddr = IpAddr::new(10, 0, 0, 1);
    const DST: IpAddr = IpAddr::new(10, 0, 0, 2);

    fn datagram(payload: &[u8]) -> PacketBuf {
        let mut pkt = PacketBuf::new();
        pkt.append(payload).unwrap();
        fill_header(&mut pkt, SRC, DST, PROTOCOL_UDP).unwrap();
        pkt
    }

    #[test]
    fn header_fields() {
        let pkt = datagram(&[1, 2, 3, 4]);
        let hdr = wire::Packet::new_checked(pkt.as_slice()).unwrap();
        assert_eq!(hdr.version(), 4);
        assert_eq!(hdr.header_len(), 20);
        assert_eq!(hdr.total_len(), 24);
        assert_eq!(hdr.flags_offset(), wire::field::FLG_DF);
        assert_eq!(hdr.ttl(), 255);
        assert_eq!(hdr.protocol(), PROTOCOL_UDP);
        assert_eq!(IpAddr(hdr.src_addr()), SRC);
        assert_eq!(IpAddr(hdr.dst_addr()), DST);
        assert!(verify_checksum(hdr.header()));
    }

    #[test]
    fn input_accepts_and_trims_padding() {
        let pkt = datagram(&[9; 6]);
        let mut padded = [0u8; 46];
        padded[..pkt.len()].copy_from_slice(pkt.as_slice());
        let d = input(&padded, false).unwrap();
        assert_eq!(d.src, SRC);
        assert_eq!(d.dst, DST);
        assert_eq!(d.payload, &[9; 6]);
    }

    #[test]
    fn input_strips_options() {
        let mut buf = [0u8; 28];
        {
            let mut hdr = wire::PacketMut::new_unchecked(&mut buf);
            hdr.set_version_ihl(4, 24);
            hdr.set_total_len(28);
            hdr.set_protocol(PROTOCOL_UDP);
            hdr.set_src_addr(SRC.0);
            hdr.set_dst_addr(DST.0);
        }
        buf[24..28].copy_from_slice(&[7, 7, 7, 7]);
        let csum = Checksum::new().add_bytes(&buf[..24]).finish();
        wire::PacketMut::new_unchecked(&mut buf).set_checksum(csum);
        assert_eq!(input(&buf, false).unwrap().payload, &[7, 7, 7, 7]);
    }

    #[test]
    fn input_rejects_bad_checksum_unless_hw_validated() {
        let mut pkt = datagram(&[0; 4]);
        pkt.as_mut_slice()[wire::field::TTL] = 1;
        assert_eq!(input(pkt.as_slice(), false).err(), Some(Error::ChecksumError));
        assert!(input(pkt.as_slice(), true).is_ok());
    }

    #[test]
    fn input_rejects_fragments() {
        for flg_off in [wire::field::FLG_MF, 0x0010] {
            let mut pkt = datagram(&[0; 4]);
            let buf = pkt.as_mut_slice();
            {
                let mut hdr = wire::PacketMut::new_unchecked(buf);
                hdr.set_flags_offset(flg_off);
                hdr.set_checksum(0);
            }
            let csum = Checksum::new().add_bytes(&buf[..HEADER_LEN]).finish();
            wire::PacketMut::new_unchecked(buf).set_checksum(csum);
            assert_eq!(input(pkt.as_slice(), false).err(), Some(Error::Fragmented));
        }
    }

    #[test]
    fn input_rejects_bad_version_and_length() {
        let mut pkt = datagram(&[0; 4]);
        pkt.as_mut_slice()[0] = 0x65;
        assert_eq!(input(pkt.as_slice(), true).err(), Some(Error::UnsupportedProtocol));

        let pkt = datagram(&[0; 4]);
        assert_eq!(input(&pkt.as_slice()[..22], true).err(), Some(Error::InvalidLength));
        assert_eq!(input(&pkt.as_slice()[..19], true).err(), Some(Error::PacketTooShort));
    }
}

use super::session::Session;
use super::wire::{self, MsgHeader};
use super::NETDUMP_ACKPORT;
use crate::error::{Error, Result};
use crate::net::device::{self, NetDevice};
use crate::net::ethernet::{wrap_ethernet, MacAddr, ETHERTYPE_IP};
use crate::net::packet::PacketBuf;
use crate::net::udp::{self, UdpEndpoint};

/// Builds the frame for one message fragment, addressed to the server through
/// the resolved next hop. An IP packet larger than `mtu` is `FrameTooLarge`;
/// nothing is truncated.
pub fn build_frame(
    session: &Session,
    src_mac: MacAddr,
    mtu: usize,
    hdr: &MsgHeader,
    data: &[u8],
) -> Result<PacketBuf> {
    let gw_mac = session.gateway_mac().ok_or(Error::InvalidState)?;
    if udp::UDPIP_HEADER_LEN + wire::HEADER_LEN + data.len() > mtu {
        return Err(Error::FrameTooLarge);
    }
    let mut pkt = PacketBuf::new();
    hdr.emit(pkt.append_zeroed(wire::HEADER_LEN)?);
    pkt.append(data)?;
    let src = UdpEndpoint::new(session.client(), NETDUMP_ACKPORT);
    let dst = UdpEndpoint::new(session.server(), session.server_port());
    udp::encapsulate(&mut pkt, src, dst)?;
    wrap_ethernet(&mut pkt, src_mac, gw_mac, ETHERTYPE_IP)?;
    Ok(pkt)
}

pub fn udp_output<D: NetDevice + ?Sized>(
    session: &mut Session,
    dev: &mut D,
    hdr: &MsgHeader,
    data: &[u8],
) -> Result<()> {
    let pkt = build_frame(session, dev.hw_addr(), dev.mtu(), hdr, data)?;
    crate::trace!(
        NETDUMP,
        "[netdump] tx seq={} type={:?} off={} len={}",
        hdr.seqno,
        hdr.msg_type,
        hdr.offset,
        hdr.len
    );
    device::transmit(dev, pkt.as_slice())?;
    session.stats.frames_sent += 1;
    Ok(())
}

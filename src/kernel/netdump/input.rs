use super::session::{AckOutcome, Session};
use super::wire;
use super::NETDUMP_ACKPORT;
use crate::error::{Error, Result};
use crate::net::arp::{ArpOp, ArpPacket};
use crate::net::device::{self, DeviceCaps, NetDevice, RxFrame};
use crate::net::ethernet::MacAddr;
use crate::net::protocol::{self, Ingress};
use crate::net::udp::UdpDatagram;

/// Handles one frame polled from the NIC. Never fails: anything that is not
/// an ARP exchange with us or an acknowledgement from the server is dropped.
pub fn handle_frame(session: &mut Session, our_mac: MacAddr, frame: RxFrame<'_>) {
    let result = match protocol::ingress(frame) {
        Ok(Ingress::Arp(arp)) => handle_arp(session, our_mac, &arp),
        Ok(Ingress::Udp { datagram, .. }) => handle_ack(session, &datagram),
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        session.note_drop(e);
    }
}

fn handle_arp(session: &mut Session, our_mac: MacAddr, arp: &ArpPacket) -> Result<()> {
    if arp.sender_ip == session.client() {
        log::warn!(
            "netdump: {} also claims our address {}",
            arp.sender_mac,
            arp.sender_ip
        );
        return Err(Error::UnexpectedSource);
    }
    match arp.op {
        ArpOp::Request if arp.target_ip == session.client() => {
            crate::trace!(NETDUMP, "[netdump] answering who-has from {}", arp.sender_ip);
            session.queue_arp_reply(arp.reply_to(our_mac));
            Ok(())
        }
        ArpOp::Reply if arp.sender_ip == session.gateway() => {
            if !session.is_resolved() {
                log::info!(
                    "netdump: gateway {} is at {}",
                    arp.sender_ip,
                    arp.sender_mac
                );
            }
            session.set_gateway_mac(arp.sender_mac);
            Ok(())
        }
        _ => Err(Error::UnexpectedDestination),
    }
}

fn handle_ack(session: &mut Session, datagram: &UdpDatagram<'_>) -> Result<()> {
    if datagram.src.addr != session.server() {
        return Err(Error::UnexpectedSource);
    }
    if datagram.dst.addr != session.client() {
        return Err(Error::UnexpectedDestination);
    }
    if datagram.dst.port != NETDUMP_ACKPORT {
        return Err(Error::UnexpectedPort);
    }
    let seqno = wire::parse_ack(datagram.payload)?;

    if session.latch_server_port(datagram.src.port) {
        log::info!("netdump: server replies from port {}", datagram.src.port);
    }

    match session.acks.record(seqno) {
        AckOutcome::Recorded => {
            session.stats.acks += 1;
            crate::trace!(NETDUMP, "[netdump] ack {}", seqno);
        }
        AckOutcome::Duplicate => {
            crate::trace!(NETDUMP, "[netdump] duplicate ack {}", seqno);
        }
        AckOutcome::Stale => {
            session.stats.stale_acks += 1;
            crate::trace!(NETDUMP, "[netdump] stale ack {}", seqno);
        }
        AckOutcome::OutOfWindow => {
            session.stats.bogus_acks += 1;
            log::warn!(
                "netdump: ack {} beyond window starting at {}",
                seqno,
                session.acks.base()
            );
        }
    }
    Ok(())
}

/// Polls the NIC once, classifying whatever arrives, then sends any ARP
/// replies that came due.
pub fn network_poll<D: NetDevice + ?Sized>(session: &mut Session, dev: &mut D) {
    let our_mac = dev.hw_addr();
    // Checksum flags mean nothing from a driver that does not offload them.
    let trust_flags = dev.caps().contains(DeviceCaps::RXCSUM);
    device::poll(dev, &mut |frame| {
        let frame = if trust_flags {
            frame
        } else {
            RxFrame::new(frame.data)
        };
        handle_frame(session, our_mac, frame)
    });
    while let Some(reply) = session.next_arp_reply() {
        let sent = reply
            .to_frame()
            .and_then(|frame| device::transmit(dev, frame.as_slice()));
        match sent {
            Ok(()) => session.stats.arp_replies += 1,
            Err(e) => log::debug!("netdump: arp reply to {} failed: {}", reply.target_ip, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::device::RxFlags;
    use crate::net::ethernet::{wrap_ethernet, ETHERTYPE_IP};
    use crate::net::ip::{self, IpAddr};
    use crate::net::packet::PacketBuf;
    use crate::net::udp::{self, UdpEndpoint};
    use crate::netdump::config::NetdumpConfig;
    use crate::netdump::NETDUMP_PORT;

    const OUR_MAC: MacAddr = MacAddr([2, 0, 0, 0, 0, 1]);
    const SRV_MAC: MacAddr = MacAddr([2, 0, 0, 0, 0, 2]);
    const CLIENT: IpAddr = IpAddr::new(10, 0, 0, 10);
    const SERVER: IpAddr = IpAddr::new(10, 0, 0, 20);

    fn session() -> Session {
        let config = NetdumpConfig::new("em0", CLIENT, SERVER).unwrap();
        let mut s = Session::new(config);
        s.acks.reset(1);
        s
    }

    fn ack_frame(src: UdpEndpoint, dst: UdpEndpoint, seqno: u32) -> PacketBuf {
        let mut payload = [0u8; wire::ACK_LEN];
        wire::emit_ack(&mut payload, seqno);
        let mut pkt = udp::build_udp_ip_frame(&payload, src, dst).unwrap();
        wrap_ethernet(&mut pkt, SRV_MAC, OUR_MAC, ETHERTYPE_IP).unwrap();
        pkt
    }

    fn server(port: u16) -> UdpEndpoint {
        UdpEndpoint::new(SERVER, port)
    }

    fn us() -> UdpEndpoint {
        UdpEndpoint::new(CLIENT, NETDUMP_ACKPORT)
    }

    fn deliver(s: &mut Session, pkt: &PacketBuf) {
        handle_frame(s, OUR_MAC, RxFrame::new(pkt.as_slice()));
    }

    #[test]
    fn valid_ack_sets_bit_and_latches_port() {
        let mut s = session();
        deliver(&mut s, &ack_frame(server(54321), us(), 2));
        assert_eq!(s.acks().received(), 0b10);
        assert_eq!(s.server_port(), 54321);

        deliver(&mut s, &ack_frame(server(40000), us(), 1));
        assert_eq!(s.acks().received(), 0b11);
        assert_eq!(s.server_port(), 54321);
    }

    #[test]
    fn ack_from_other_host_ignored() {
        let mut s = session();
        let stranger = UdpEndpoint::new(IpAddr::new(10, 0, 0, 99), NETDUMP_PORT);
        deliver(&mut s, &ack_frame(stranger, us(), 1));
        assert_eq!(s.acks().received(), 0);
        assert_eq!(s.server_port(), NETDUMP_PORT);
        assert_eq!(s.stats().drops, 1);
    }

    #[test]
    fn ack_to_other_port_ignored() {
        let mut s = session();
        deliver(&mut s, &ack_frame(server(NETDUMP_PORT), UdpEndpoint::new(CLIENT, 9), 1));
        assert_eq!(s.acks().received(), 0);
    }

    #[test]
    fn ack_to_other_address_ignored() {
        let mut s = session();
        let elsewhere = UdpEndpoint::new(IpAddr::new(10, 0, 0, 11), NETDUMP_ACKPORT);
        deliver(&mut s, &ack_frame(server(NETDUMP_PORT), elsewhere, 1));
        assert_eq!(s.acks().received(), 0);
    }

    #[test]
    fn fragmented_ack_ignored() {
        let mut s = session();
        let mut pkt = ack_frame(server(NETDUMP_PORT), us(), 1);
        pkt.pull_header(crate::net::ethernet::HEADER_LEN).unwrap();
        ip::wire::PacketMut::new_unchecked(pkt.as_mut_slice())
            .set_flags_offset(ip::wire::field::FLG_MF);
        wrap_ethernet(&mut pkt, SRV_MAC, OUR_MAC, ETHERTYPE_IP).unwrap();
        // Trust the (now stale) header checksum so only the fragment check can reject it.
        let frame = RxFrame {
            data: pkt.as_slice(),
            flags: RxFlags::IP_CHECKED | RxFlags::IP_VALID,
        };
        handle_frame(&mut s, OUR_MAC, frame);
        assert_eq!(s.acks().received(), 0);
    }

    #[test]
    fn checksum_flags_count_only_with_offload() {
        use crate::net::driver::loopback::{LoopbackDevice, Silent};

        let mut pkt = ack_frame(server(NETDUMP_PORT), us(), 1);
        pkt.as_mut_slice()[crate::net::ethernet::HEADER_LEN + ip::wire::field::TTL] = 1;
        let mut dev = LoopbackDevice::new("em0", OUR_MAC, 1500, Silent);
        dev.set_rx_flags(RxFlags::IP_CHECKED | RxFlags::IP_VALID | RxFlags::CSUM_DATA_VALID);

        let mut s = session();
        dev.inject(pkt.as_slice()).unwrap();
        network_poll(&mut s, &mut dev);
        assert_eq!(s.acks().received(), 0);

        dev.set_caps(DeviceCaps::NETDUMP | DeviceCaps::RXCSUM);
        dev.inject(pkt.as_slice()).unwrap();
        network_poll(&mut s, &mut dev);
        assert_eq!(s.acks().received(), 1);
    }

    #[test]
    fn truncated_ack_ignored() {
        let mut s = session();
        let mut pkt = udp::build_udp_ip_frame(&[0, 0, 1], server(NETDUMP_PORT), us()).unwrap();
        wrap_ethernet(&mut pkt, SRV_MAC, OUR_MAC, ETHERTYPE_IP).unwrap();
        deliver(&mut s, &pkt);
        assert_eq!(s.acks().received(), 0);
        assert_eq!(s.server_port(), NETDUMP_PORT);
    }

    #[test]
    fn arp_request_for_us_is_answered() {
        let mut s = session();
        let req = ArpPacket::request(SRV_MAC, SERVER, CLIENT);
        deliver(&mut s, &req.to_frame().unwrap());
        let reply = s.next_arp_reply().unwrap();
        assert_eq!(reply.op, ArpOp::Reply);
        assert_eq!(reply.sender_mac, OUR_MAC);
        assert_eq!(reply.target_ip, SERVER);
    }

    #[test]
    fn arp_request_for_someone_else_is_ignored() {
        let mut s = session();
        let req = ArpPacket::request(SRV_MAC, SERVER, IpAddr::new(10, 0, 0, 77));
        deliver(&mut s, &req.to_frame().unwrap());
        assert!(s.next_arp_reply().is_none());
    }

    #[test]
    fn arp_reply_from_gateway_resolves() {
        let mut s = session();
        let reply = ArpPacket::request(OUR_MAC, CLIENT, SERVER).reply_to(SRV_MAC);
        deliver(&mut s, &reply.to_frame().unwrap());
        assert_eq!(s.gateway_mac(), Some(SRV_MAC));
    }

    #[test]
    fn arp_reply_from_other_host_does_not_resolve() {
        let mut s = session();
        let other = IpAddr::new(10, 0, 0, 30);
        let reply = ArpPacket::request(OUR_MAC, CLIENT, other).reply_to(SRV_MAC);
        deliver(&mut s, &reply.to_frame().unwrap());
        assert!(!s.is_resolved());
        assert_eq!(s.gateway_mac(), None);
    }
}

//! A scripted dump server for exercising the client over a loopback wire.

use crate::net::arp::{self, ArpOp};
use crate::net::device::RxFrame;
use crate::net::driver::loopback::{Responder, RxQueue};
use crate::net::ethernet::{self, wrap_ethernet, MacAddr, ETHERTYPE_ARP, ETHERTYPE_IP};
use crate::net::ip::IpAddr;
use crate::net::protocol::{ingress, Ingress};
use crate::net::udp::{self, UdpEndpoint};
use crate::netdump::wire::{self, MessageType, MsgHeader};
use crate::netdump::NETDUMP_ACKPORT;

pub const CLIENT_MAC: MacAddr = MacAddr([2, 0, 0, 0, 0, 1]);
pub const SERVER_MAC: MacAddr = MacAddr([2, 0, 0, 0, 0, 2]);
pub const CLIENT: IpAddr = IpAddr::new(10, 0, 0, 10);
pub const SERVER: IpAddr = IpAddr::new(10, 0, 0, 20);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Received {
    pub seqno: u32,
    pub msg_type: MessageType,
    pub offset: u64,
    pub len: u32,
    pub dst_port: u16,
    pub data: Vec<u8>,
}

/// Decides whether a message is acknowledged, given how many times its
/// sequence number has now been seen.
pub type AckPolicy = fn(&Received, usize) -> bool;

pub struct DumpServer {
    pub ip: IpAddr,
    pub mac: MacAddr,
    pub reply_port: u16,
    pub answer_arp: bool,
    pub ack: AckPolicy,
    pub received: Vec<Received>,
    pub arp_requests: usize,
}

impl Default for DumpServer {
    fn default() -> Self {
        Self {
            ip: SERVER,
            mac: SERVER_MAC,
            reply_port: 54321,
            answer_arp: true,
            ack: |_, _| true,
            received: Vec::new(),
            arp_requests: 0,
        }
    }
}

impl DumpServer {
    pub fn with_policy(ack: AckPolicy) -> Self {
        Self {
            ack,
            ..Self::default()
        }
    }

    pub fn of_type(&self, msg_type: MessageType) -> impl Iterator<Item = &Received> {
        self.received.iter().filter(move |r| r.msg_type == msg_type)
    }

    /// Seqnos of the frames sent in transmission order.
    pub fn seqnos(&self) -> Vec<u32> {
        self.received.iter().map(|r| r.seqno).collect()
    }

    fn on_arp(&mut self, payload: &[u8], rx: &mut RxQueue) {
        let Ok(req) = arp::parse(payload) else { return };
        if req.op != ArpOp::Request || req.target_ip != self.ip {
            return;
        }
        self.arp_requests += 1;
        if self.answer_arp {
            let frame = req.reply_to(self.mac).to_frame().unwrap();
            let _ = rx.push(frame.as_slice());
        }
    }

    fn on_message(&mut self, frame: &[u8], rx: &mut RxQueue) {
        let Ok(Ingress::Udp { src_mac, datagram }) = ingress(RxFrame::new(frame)) else {
            return;
        };
        if datagram.dst.addr != self.ip || datagram.src.port != NETDUMP_ACKPORT {
            return;
        }
        let Ok(hdr) = MsgHeader::parse(datagram.payload) else { return };
        let rec = Received {
            seqno: hdr.seqno,
            msg_type: hdr.msg_type,
            offset: hdr.offset,
            len: hdr.len,
            dst_port: datagram.dst.port,
            data: datagram.payload[wire::HEADER_LEN..].to_vec(),
        };
        let seen = 1 + self.received.iter().filter(|r| r.seqno == rec.seqno).count();
        let ack = (self.ack)(&rec, seen);
        self.received.push(rec);
        if !ack {
            return;
        }
        let mut payload = [0u8; wire::ACK_LEN];
        wire::emit_ack(&mut payload, hdr.seqno);
        let src = UdpEndpoint::new(self.ip, self.reply_port);
        let mut pkt = udp::build_udp_ip_frame(&payload, src, datagram.src).unwrap();
        wrap_ethernet(&mut pkt, self.mac, src_mac, ETHERTYPE_IP).unwrap();
        let _ = rx.push(pkt.as_slice());
    }
}

impl Responder for DumpServer {
    fn on_transmit(&mut self, frame: &[u8], rx: &mut RxQueue) {
        let Ok(eth) = ethernet::input(frame) else { return };
        match eth.ethertype {
            ETHERTYPE_ARP => self.on_arp(eth.payload, rx),
            ETHERTYPE_IP => self.on_message(frame, rx),
            _ => {}
        }
    }
}

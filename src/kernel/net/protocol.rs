use crate::error::{Error, Result};
use crate::net::arp::{self, ArpPacket};
use crate::net::device::RxFrame;
use crate::net::ethernet::{self, MacAddr, ETHERTYPE_ARP, ETHERTYPE_IP};
use crate::net::ip;
use crate::net::udp::{self, UdpDatagram};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ProtocolType {
    IP = ETHERTYPE_IP,
    ARP = ETHERTYPE_ARP,
}

impl ProtocolType {
    pub fn from_ethertype(ethertype: u16) -> Option<Self> {
        match ethertype {
            ETHERTYPE_IP => Some(ProtocolType::IP),
            ETHERTYPE_ARP => Some(ProtocolType::ARP),
            _ => None,
        }
    }
}

/// A received frame after link, network and transport validation.
#[derive(Debug, Clone, Copy)]
pub enum Ingress<'a> {
    Arp(ArpPacket),
    Udp {
        src_mac: MacAddr,
        datagram: UdpDatagram<'a>,
    },
}

/// Demultiplexes one raw frame. Anything other than well-formed ARP or
/// unfragmented IPv4/UDP is an error for the caller to drop.
pub fn ingress(frame: RxFrame<'_>) -> Result<Ingress<'_>> {
    let eth = ethernet::input(frame.data)?;
    match ProtocolType::from_ethertype(eth.ethertype) {
        Some(ProtocolType::ARP) => Ok(Ingress::Arp(arp::parse(eth.payload)?)),
        Some(ProtocolType::IP) => {
            let datagram = ip::input(eth.payload, frame.flags.ip_csum_ok())?;
            let datagram = udp::input(&datagram, frame.flags.data_csum_ok())?;
            Ok(Ingress::Udp {
                src_mac: eth.src,
                datagram,
            })
        }
        None => Err(Error::UnsupportedProtocol),
    }
}

use super::input::network_poll;
use super::session::Session;
use crate::error::{Error, Result};
use crate::net::arp::ArpPacket;
use crate::net::device::{self, NetDevice};
use crate::net::ethernet::MacAddr;

/// Finds the hardware address of the next hop toward the server.
///
/// A resolved session answers at once without touching the wire. Otherwise a
/// broadcast who-has goes out each round, followed by up to `polls` polls.
/// A failed broadcast only costs its round.
pub fn arp_gateway<D: NetDevice + ?Sized>(session: &mut Session, dev: &mut D) -> Result<MacAddr> {
    if let Some(mac) = session.gateway_mac() {
        return Ok(mac);
    }

    let gateway = session.gateway();
    let tunables = session.config().tunables;
    let request = ArpPacket::request(dev.hw_addr(), session.client(), gateway);
    let frame = request.to_frame()?;

    for round in 0..tunables.arp_rounds() {
        crate::trace!(NETDUMP, "[netdump] who-has {} (round {})", gateway, round);
        if let Err(e) = device::transmit(dev, frame.as_slice()) {
            log::debug!("netdump: arp request for {} failed: {}", gateway, e);
        }
        for _ in 0..tunables.polls {
            network_poll(session, dev);
            if let Some(mac) = session.gateway_mac() {
                return Ok(mac);
            }
            dev.delay_us(tunables.poll_delay_us);
        }
    }

    log::error!("netdump: failed to ARP the gateway {}", gateway);
    Err(Error::Timeout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::arp::{self, ArpOp};
    use crate::net::driver::loopback::{LoopbackDevice, Responder, RxQueue, Silent};
    use crate::net::ethernet::{self as eth, ETHERTYPE_ARP};
    use crate::net::ip::IpAddr;
    use crate::netdump::config::{NetdumpConfig, Tunables};

    const OUR_MAC: MacAddr = MacAddr([2, 0, 0, 0, 0, 1]);
    const GW_MAC: MacAddr = MacAddr([2, 0, 0, 0, 0, 0xfe]);
    const CLIENT: IpAddr = IpAddr::new(192, 168, 1, 10);
    const SERVER: IpAddr = IpAddr::new(10, 1, 1, 1);
    const GATEWAY: IpAddr = IpAddr::new(192, 168, 1, 1);

    /// Answers who-has for the gateway after ignoring the first `ignore` requests.
    #[derive(Default)]
    struct Router {
        ignore: u32,
        requests: u32,
        targets: Option<IpAddr>,
    }

    impl Responder for Router {
        fn on_transmit(&mut self, frame: &[u8], rx: &mut RxQueue) {
            let Ok(eth) = eth::input(frame) else { return };
            if eth.ethertype != ETHERTYPE_ARP || eth.dst != MacAddr::BROADCAST {
                return;
            }
            let Ok(req) = arp::parse(eth.payload) else { return };
            if req.op != ArpOp::Request {
                return;
            }
            self.requests += 1;
            self.targets = Some(req.target_ip);
            if self.requests <= self.ignore || req.target_ip != GATEWAY {
                return;
            }
            let reply = req.reply_to(GW_MAC);
            let frame = reply.to_frame().unwrap();
            rx.push(frame.as_slice()).unwrap();
        }
    }

    fn session(tunables: Tunables) -> Session {
        let config = NetdumpConfig::new("em0", CLIENT, SERVER)
            .unwrap()
            .with_gateway(GATEWAY)
            .with_tunables(tunables);
        Session::new(config)
    }

    fn small() -> Tunables {
        Tunables {
            retries: 3,
            polls: 5,
            ..Tunables::default()
        }
    }

    #[test]
    fn resolves_through_the_gateway() {
        let mut s = session(small());
        let mut dev = LoopbackDevice::new("em0", OUR_MAC, 1500, Router::default());
        assert_eq!(arp_gateway(&mut s, &mut dev), Ok(GW_MAC));
        assert_eq!(s.gateway_mac(), Some(GW_MAC));
        assert_eq!(dev.responder().requests, 1);
        assert_eq!(dev.responder().targets, Some(GATEWAY));
    }

    #[test]
    fn resolves_the_server_without_a_gateway() {
        let config = NetdumpConfig::new("em0", CLIENT, GATEWAY)
            .unwrap()
            .with_tunables(small());
        let mut s = Session::new(config);
        let mut dev = LoopbackDevice::new("em0", OUR_MAC, 1500, Router::default());
        assert_eq!(arp_gateway(&mut s, &mut dev), Ok(GW_MAC));
        assert_eq!(dev.responder().targets, Some(GATEWAY));
    }

    #[test]
    fn resolved_session_stays_off_the_wire() {
        let mut s = session(small());
        s.set_gateway_mac(GW_MAC);
        let mut dev = LoopbackDevice::new("em0", OUR_MAC, 1500, Router::default());
        assert_eq!(arp_gateway(&mut s, &mut dev), Ok(GW_MAC));
        assert_eq!(dev.stats().tx_frames, 0);
        assert_eq!(dev.stats().polls, 0);
    }

    #[test]
    fn rebroadcasts_when_ignored() {
        let mut s = session(small());
        let router = Router {
            ignore: 2,
            ..Router::default()
        };
        let mut dev = LoopbackDevice::new("em0", OUR_MAC, 1500, router);
        assert_eq!(arp_gateway(&mut s, &mut dev), Ok(GW_MAC));
        assert_eq!(dev.responder().requests, 3);
    }

    #[test]
    fn gives_up_after_the_budget() {
        let mut s = session(small());
        let mut dev = LoopbackDevice::new("em0", OUR_MAC, 1500, Silent);
        assert_eq!(arp_gateway(&mut s, &mut dev), Err(Error::Timeout));
        let stats = dev.stats();
        assert_eq!(stats.tx_frames, 3);
        assert_eq!(stats.polls, 15);
        assert_eq!(stats.delay_us, 15 * 500);
        assert!(!s.is_resolved());
    }

    #[test]
    fn arp_retries_override_the_transmit_budget() {
        let mut s = session(Tunables {
            arp_retries: Some(1),
            ..small()
        });
        let mut dev = LoopbackDevice::new("em0", OUR_MAC, 1500, Silent);
        assert_eq!(arp_gateway(&mut s, &mut dev), Err(Error::Timeout));
        assert_eq!(dev.stats().tx_frames, 1);
    }

    #[test]
    fn failed_broadcast_uses_up_a_round() {
        let mut s = session(small());
        let mut dev = LoopbackDevice::new("em0", OUR_MAC, 1500, Router::default());
        dev.fail_next_transmits(1, Error::QueueFull);
        assert_eq!(arp_gateway(&mut s, &mut dev), Ok(GW_MAC));
        assert_eq!(dev.stats().tx_errors, 1);
        assert_eq!(dev.responder().requests, 1);
        assert_eq!(dev.stats().polls, 6);
    }
}

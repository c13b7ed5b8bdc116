use super::config::NetdumpConfig;
use super::NETDUMP_PORT;
use crate::error::Error;
use crate::net::arp::ArpPacket;
use crate::net::ethernet::MacAddr;
use crate::net::ip::IpAddr;
use crate::net::trace::RateLimit;
use heapless::Deque;

/// Fragments one message may span; one bit each in the acknowledgement bitmaps.
pub const ACK_WINDOW: usize = u64::BITS as usize;

const ARP_REPLY_QUEUE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    Recorded,
    Duplicate,
    Stale,
    OutOfWindow,
}

/// Acknowledgement state of the message currently being sent.
///
/// Bit `i` of `expected` is set for every fragment of the message, bit `i` of
/// `received` once sequence number `base + i` has been acknowledged.
/// `received` only grows until the next [`AckWindow::reset`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AckWindow {
    base: u32,
    received: u64,
    expected: u64,
}

impl AckWindow {
    pub fn reset(&mut self, base: u32) {
        self.base = base;
        self.received = 0;
        self.expected = 0;
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn expect(&mut self, index: usize) {
        debug_assert!(index < ACK_WINDOW);
        self.expected |= 1u64 << index;
    }

    pub fn is_acked(&self, index: usize) -> bool {
        index < ACK_WINDOW && self.received & (1u64 << index) != 0
    }

    pub fn record(&mut self, seqno: u32) -> AckOutcome {
        let off = seqno.wrapping_sub(self.base);
        if (off as i32) < 0 {
            return AckOutcome::Stale;
        }
        if off as usize >= ACK_WINDOW {
            return AckOutcome::OutOfWindow;
        }
        let bit = 1u64 << off;
        if self.received & bit != 0 {
            return AckOutcome::Duplicate;
        }
        self.received |= bit;
        AckOutcome::Recorded
    }

    pub fn complete(&self) -> bool {
        self.received & self.expected == self.expected
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn expected(&self) -> u64 {
        self.expected
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub frames_sent: u64,
    pub retransmits: u64,
    pub acks: u64,
    pub stale_acks: u64,
    pub bogus_acks: u64,
    pub drops: u64,
    pub arp_replies: u64,
    pub last_rounds: u32,
}

/// Everything the dump path knows about the conversation with the server.
pub struct Session {
    config: NetdumpConfig,
    pub(crate) seqno: u32,
    server_port: u16,
    port_latched: bool,
    gw_mac: Option<MacAddr>,
    pub(crate) acks: AckWindow,
    arp_replies: Deque<ArpPacket, ARP_REPLY_QUEUE>,
    drop_log: RateLimit,
    pub(crate) stats: SessionStats,
}

impl Session {
    pub fn new(config: NetdumpConfig) -> Self {
        Self {
            config,
            seqno: 1,
            server_port: NETDUMP_PORT,
            port_latched: false,
            gw_mac: None,
            acks: AckWindow::default(),
            arp_replies: Deque::new(),
            drop_log: RateLimit::default(),
            stats: SessionStats::default(),
        }
    }

    /// Forgets the server port learned by an earlier dump.
    pub fn begin(&mut self) {
        self.server_port = NETDUMP_PORT;
        self.port_latched = false;
        self.arp_replies.clear();
    }

    pub fn config(&self) -> &NetdumpConfig {
        &self.config
    }

    pub fn client(&self) -> IpAddr {
        self.config.client
    }

    pub fn server(&self) -> IpAddr {
        self.config.server
    }

    pub fn gateway(&self) -> IpAddr {
        self.config.gateway()
    }

    pub fn seqno(&self) -> u32 {
        self.seqno
    }

    pub fn server_port(&self) -> u16 {
        self.server_port
    }

    pub fn gateway_mac(&self) -> Option<MacAddr> {
        self.gw_mac
    }

    pub fn is_resolved(&self) -> bool {
        self.gw_mac.is_some()
    }

    pub fn acks(&self) -> &AckWindow {
        &self.acks
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub(crate) fn set_gateway_mac(&mut self, mac: MacAddr) {
        self.gw_mac = Some(mac);
    }

    /// Returns true if the port was latched by this call.
    pub(crate) fn latch_server_port(&mut self, port: u16) -> bool {
        if self.port_latched {
            return false;
        }
        self.server_port = port;
        self.port_latched = true;
        true
    }

    pub(crate) fn queue_arp_reply(&mut self, reply: ArpPacket) {
        if self.arp_replies.push_back(reply).is_err() {
            self.stats.drops += 1;
        }
    }

    pub(crate) fn next_arp_reply(&mut self) -> Option<ArpPacket> {
        self.arp_replies.pop_front()
    }

    pub(crate) fn note_drop(&mut self, why: Error) {
        self.stats.drops += 1;
        if self.drop_log.allow() {
            log::debug!(
                "netdump: dropped packet: {} ({} drops so far)",
                why,
                self.stats.drops
            );
        }
    }
}

use super::NETDUMP_DATASIZE;
use crate::error::{Error, Result};
use crate::net::ip::IpAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tunables {
    /// Transmit rounds per message before giving up.
    pub retries: u32,
    /// Polls per round while waiting for acknowledgements or an ARP reply.
    pub polls: u32,
    pub poll_delay_us: u32,
    /// Resolver rounds; the transmit budget when unset.
    pub arp_retries: Option<u32>,
    /// Largest fragment payload, further capped by the interface MTU.
    pub max_data_size: usize,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            retries: 10,
            polls: 2000,
            poll_delay_us: 500,
            arp_retries: None,
            max_data_size: NETDUMP_DATASIZE,
        }
    }
}

impl Tunables {
    pub fn arp_rounds(&self) -> u32 {
        self.arp_retries.unwrap_or(self.retries)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NetdumpConfig {
    pub enabled: bool,
    pub client: IpAddr,
    pub server: IpAddr,
    /// Next hop; the server itself when unset.
    pub gateway: Option<IpAddr>,
    pub ifname: heapless::String<16>,
    /// Where the server should store the dump, sent with the herald.
    pub path: heapless::String<64>,
    pub tunables: Tunables,
}

impl NetdumpConfig {
    pub fn new(ifname: &str, client: IpAddr, server: IpAddr) -> Result<Self> {
        let mut config = Self {
            enabled: true,
            client,
            server,
            ..Self::default()
        };
        config
            .ifname
            .push_str(ifname)
            .map_err(|_| Error::InvalidLength)?;
        Ok(config)
    }

    pub fn with_gateway(mut self, gateway: IpAddr) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn with_path(mut self, path: &str) -> Result<Self> {
        self.path.clear();
        self.path.push_str(path).map_err(|_| Error::InvalidLength)?;
        Ok(self)
    }

    pub fn with_tunables(mut self, tunables: Tunables) -> Self {
        self.tunables = tunables;
        self
    }

    pub fn gateway(&self) -> IpAddr {
        match self.gateway {
            Some(gw) if !gw.is_unspecified() => gw,
            _ => self.server,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.is_unspecified() {
            return Err(Error::NotConfigured("server address"));
        }
        if self.client.is_unspecified() {
            return Err(Error::NotConfigured("client address"));
        }
        if self.ifname.is_empty() {
            return Err(Error::NotConfigured("interface"));
        }
        let t = &self.tunables;
        if t.retries == 0 || t.polls == 0 || t.arp_rounds() == 0 {
            return Err(Error::NotConfigured("retry budget"));
        }
        if t.max_data_size == 0 || t.max_data_size > NETDUMP_DATASIZE {
            return Err(Error::NotConfigured("max data size"));
        }
        Ok(())
    }
}

//! The panic-time entry point.
//!
//! [`Netdump`] owns the device and the session for one boot and borrows the
//! staging buffer, normally a static of
//! [`STAGING_CAPACITY`](super::STAGING_CAPACITY) bytes set aside at boot. The
//! shutdown hook starts it, the dump framework feeds it chunks, and
//! [`Netdump::finish`] closes the transaction. Any failure is terminal: the
//! orchestrator stops, tells the driver the dump is over, and leaves the
//! other dump devices in place for the framework to fall back on.

use super::resolver::arp_gateway;
use super::send::{message_span, netdump_send};
use super::session::Session;
use super::wire::MessageType;
use super::{NetdumpConfig, KDH_SIZE};
use crate::error::{Error, Result};
use crate::net::device::{DeviceEvent, NetDevice};
use crate::net::interface;
use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RebootFlags: u32 {
        const NOSYNC = 0x4;
        const HALT = 0x8;
        const DUMP = 0x100;
        const POWEROFF = 0x4000;
    }
}

/// The kernel's notion of the active dump device.
pub trait DumperRegistry {
    /// Unregisters every other dump device; called once a network dump has
    /// fully succeeded.
    fn clear_dumper(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpState {
    Idle,
    Resolving,
    Heralding,
    Dumping,
    Finishing,
    Done,
    Aborted,
}

pub struct Netdump<'a, D, G> {
    dev: D,
    registry: G,
    session: Session,
    staging: &'a mut [u8],
    state: DumpState,
}

impl<'a, D: NetDevice, G: DumperRegistry> Netdump<'a, D, G> {
    pub fn new(dev: D, registry: G, config: NetdumpConfig, staging: &'a mut [u8]) -> Self {
        Self {
            dev,
            registry,
            session: Session::new(config),
            staging,
            state: DumpState::Idle,
        }
    }

    pub fn state(&self) -> DumpState {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn device(&self) -> &D {
        &self.dev
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.dev
    }

    pub fn registry(&self) -> &G {
        &self.registry
    }

    /// Shutdown hook. Starts a dump if one was requested and netdump is on.
    pub fn on_shutdown(&mut self, howto: RebootFlags) -> Result<()> {
        if !howto.contains(RebootFlags::DUMP) || !self.session.config().enabled {
            return Ok(());
        }
        self.start()
    }

    /// Checks the configuration, finds the gateway and announces the dump.
    /// One attempt per boot: any failure leaves the orchestrator `Aborted`.
    pub fn start(&mut self) -> Result<()> {
        if self.state != DumpState::Idle {
            return Err(Error::InvalidState);
        }
        let config = self.session.config();
        if !config.enabled {
            return Err(Error::NotConfigured("netdump"));
        }
        let usable = config
            .validate()
            .and_then(|()| interface::check(&self.dev, &config.ifname));
        if let Err(e) = usable {
            log::error!("netdump: cannot dump over {}: {}", config.ifname, e);
            self.state = DumpState::Aborted;
            return Err(e);
        }

        log::info!(
            "netdump: dumping to {} via {}",
            self.session.server(),
            self.session.config().ifname
        );
        self.dev.event(DeviceEvent::Start);
        self.session.begin();

        self.state = DumpState::Resolving;
        if let Err(e) = arp_gateway(&mut self.session, &mut self.dev) {
            return Err(self.abort(e));
        }

        self.state = DumpState::Heralding;
        let path = self.session.config().path.clone();
        if let Err(e) = netdump_send(
            &mut self.session,
            &mut self.dev,
            MessageType::Herald,
            0,
            path.as_bytes(),
        ) {
            log::error!("netdump: server {} did not answer", self.session.server());
            return Err(self.abort(e));
        }

        self.state = DumpState::Dumping;
        Ok(())
    }

    /// Dump callback: sends `length` bytes of `virt` found at `offset` in the
    /// dump stream. Offset 0 is the kernel dump header; everything after it is
    /// core data, addressed relative to the end of the header region.
    ///
    /// The bytes are staged first, since the memory they come from may be
    /// reused while the transfer is retried. A call with no data and zero
    /// length marks the end of a pass and sends nothing. A chunk needing more
    /// fragments than can be in flight at once goes out as several messages.
    pub fn dump_chunk(
        &mut self,
        virt: Option<&[u8]>,
        _physical: u64,
        offset: u64,
        length: usize,
    ) -> Result<()> {
        match self.state {
            DumpState::Dumping => {}
            DumpState::Aborted => return Err(Error::DumpFailed),
            _ => return Err(Error::InvalidState),
        }
        if length == 0 {
            return Ok(());
        }
        if length > self.staging.len() {
            log::error!(
                "netdump: {} byte chunk exceeds the {} byte staging buffer",
                length,
                self.staging.len()
            );
            return Err(self.abort(Error::ChunkTooLarge));
        }
        let Some(src) = virt.and_then(|v| v.get(..length)) else {
            return Err(self.abort(Error::InvalidLength));
        };
        let (msg_type, at) = match offset {
            0 => (MessageType::Kdh, 0),
            _ => match offset.checked_sub(KDH_SIZE) {
                Some(at) => (MessageType::Vmcore, at),
                None => return Err(self.abort(Error::InvalidLength)),
            },
        };

        let max_data = self.session.config().tunables.max_data_size;
        let span = match message_span(self.dev.mtu(), max_data) {
            Ok(span) => span,
            Err(e) => return Err(self.abort(e)),
        };

        self.staging[..length].copy_from_slice(src);
        crate::trace!(
            NETDUMP,
            "[netdump] chunk {:?} at {} ({} bytes)",
            msg_type,
            at,
            length
        );
        let mut sent = 0;
        while sent < length {
            let end = length.min(sent + span);
            let Some(pos) = at.checked_add(sent as u64) else {
                return Err(self.abort(Error::InvalidLength));
            };
            let data = &self.staging[sent..end];
            if let Err(e) = netdump_send(&mut self.session, &mut self.dev, msg_type, pos, data) {
                log::error!("netdump: failed to send chunk at offset {}: {}", offset, e);
                return Err(self.abort(e));
            }
            sent = end;
        }
        Ok(())
    }

    /// Closes the transaction. On success the other dump devices are
    /// unregistered, since the dump already lives on the server.
    pub fn finish(&mut self) -> Result<()> {
        match self.state {
            DumpState::Dumping => {}
            DumpState::Aborted => return Err(Error::DumpFailed),
            _ => return Err(Error::InvalidState),
        }
        self.state = DumpState::Finishing;
        if let Err(e) = netdump_send(
            &mut self.session,
            &mut self.dev,
            MessageType::Finished,
            0,
            &[],
        ) {
            log::error!("netdump: failed to close the transaction");
            return Err(self.abort(e));
        }
        self.registry.clear_dumper();
        self.state = DumpState::Done;
        self.dev.event(DeviceEvent::End);
        let stats = self.session.stats();
        log::info!(
            "netdump: finished ({} frames, {} retransmitted)",
            stats.frames_sent,
            stats.retransmits
        );
        Ok(())
    }

    fn abort(&mut self, err: Error) -> Error {
        log::error!("netdump: aborted while {:?}: {}", self.state, err);
        self.state = DumpState::Aborted;
        self.dev.event(DeviceEvent::End);
        err
    }
}

use super::input::network_poll;
use super::output::udp_output;
use super::session::{Session, ACK_WINDOW};
use super::wire::{self, MessageType, MsgHeader};
use crate::error::{Error, Result};
use crate::net::device::NetDevice;
use crate::net::udp::UDPIP_HEADER_LEN;

/// One MTU-sized slice of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    /// Position in the message; the fragment travels as `base + index`.
    pub index: usize,
    pub offset: usize,
    pub len: usize,
}

/// Payload bytes that fit in one frame on a link with the given MTU.
pub fn fragment_size(mtu: usize, max_data: usize) -> Result<usize> {
    let room = mtu
        .checked_sub(UDPIP_HEADER_LEN + wire::HEADER_LEN)
        .filter(|room| *room > 0)
        .ok_or(Error::FrameTooLarge)?;
    Ok(room.min(max_data))
}

/// Most bytes one message can carry without overflowing the ack window.
pub fn message_span(mtu: usize, max_data: usize) -> Result<usize> {
    Ok(fragment_size(mtu, max_data)? * ACK_WINDOW)
}

/// An empty message still travels as one empty fragment.
pub fn fragment_count(len: usize, size: usize) -> usize {
    if len == 0 {
        1
    } else {
        len.div_ceil(size)
    }
}

pub fn fragments(len: usize, size: usize) -> impl Iterator<Item = Fragment> {
    (0..fragment_count(len, size)).map(move |index| {
        let offset = index * size;
        Fragment {
            index,
            offset,
            len: size.min(len - offset),
        }
    })
}

/// Delivers one message to the server, fragment by fragment.
///
/// Each round transmits every fragment not yet acknowledged and then polls
/// for acknowledgements. Acknowledgements accumulate across rounds, so a
/// retransmission only fills the holes. On success the sequence number
/// advances past the message.
///
/// A transmit failure for lack of resources ends that round's transmissions
/// early; if the last round ended that way the result is `ResourceExhausted`,
/// otherwise running out of rounds is `Timeout`.
pub fn netdump_send<D: NetDevice + ?Sized>(
    session: &mut Session,
    dev: &mut D,
    msg_type: MessageType,
    offset: u64,
    data: &[u8],
) -> Result<()> {
    let tunables = session.config().tunables;
    let size = fragment_size(dev.mtu(), tunables.max_data_size)?;
    let count = fragment_count(data.len(), size);
    if count > ACK_WINDOW {
        log::error!(
            "netdump: {} bytes need {} fragments, more than the {} that can be in flight",
            data.len(),
            count,
            ACK_WINDOW
        );
        return Err(Error::TooManyFragments);
    }
    // Fragment offsets below stay in range once the end of the message does.
    if offset.checked_add(data.len() as u64).is_none() {
        return Err(Error::InvalidLength);
    }

    let base = session.seqno;
    session.acks.reset(base);
    for index in 0..count {
        session.acks.expect(index);
    }

    let mut starved = None;
    for round in 1..=tunables.retries {
        starved = None;
        for frag in fragments(data.len(), size) {
            if session.acks.is_acked(frag.index) {
                continue;
            }
            let hdr = MsgHeader {
                seqno: base.wrapping_add(frag.index as u32),
                msg_type,
                offset: offset + frag.offset as u64,
                len: frag.len as u32,
            };
            match udp_output(session, dev, &hdr, &data[frag.offset..frag.offset + frag.len]) {
                Ok(()) if round > 1 => session.stats.retransmits += 1,
                Ok(()) => {}
                Err(e) if e.is_resource() => {
                    crate::trace!(NETDUMP, "[netdump] seq {} not sent: {}", hdr.seqno, e);
                    starved = Some(e);
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        for _ in 0..tunables.polls {
            network_poll(session, dev);
            if session.acks.complete() {
                session.seqno = base.wrapping_add(count as u32);
                session.stats.last_rounds = round;
                return Ok(());
            }
            dev.delay_us(tunables.poll_delay_us);
        }
        crate::trace!(
            NETDUMP,
            "[netdump] round {}: acked {:#x} of {:#x}",
            round,
            session.acks.received(),
            session.acks.expected()
        );
    }

    match starved {
        Some(e) => {
            log::error!("netdump: {:?} message not sent: {}", msg_type, e);
            Err(Error::ResourceExhausted)
        }
        None => {
            log::error!(
                "netdump: no acknowledgement for {:?} message at seqno {}",
                msg_type,
                base
            );
            Err(Error::Timeout)
        }
    }
}

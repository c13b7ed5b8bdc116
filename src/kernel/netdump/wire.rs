use crate::error::{Error, Result};
use crate::net::util::{read_u32, read_u64, write_u32, write_u64};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum MessageType {
    Herald = 1,
    Finished = 2,
    Vmcore = 3,
    Kdh = 4,
}

impl TryFrom<u32> for MessageType {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            1 => Ok(MessageType::Herald),
            2 => Ok(MessageType::Finished),
            3 => Ok(MessageType::Vmcore),
            4 => Ok(MessageType::Kdh),
            _ => Err(Error::UnsupportedProtocol),
        }
    }
}

pub mod field {
    pub type Field = core::ops::Range<usize>;

    pub const SEQNO: Field = 0..4;
    pub const TYPE: Field = 4..8;
    pub const OFFSET: Field = 8..16;
    pub const LEN: Field = 16..20;
    pub const PAD: Field = 20..24;

    pub const ACK_SEQNO: Field = 0..4;
}

pub const HEADER_LEN: usize = field::PAD.end;
pub const ACK_LEN: usize = field::ACK_SEQNO.end;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgHeader {
    pub seqno: u32,
    pub msg_type: MessageType,
    pub offset: u64,
    pub len: u32,
}

impl MsgHeader {
    pub fn emit(&self, buf: &mut [u8]) {
        write_u32(&mut buf[field::SEQNO], self.seqno);
        write_u32(&mut buf[field::TYPE], self.msg_type as u32);
        write_u64(&mut buf[field::OFFSET], self.offset);
        write_u32(&mut buf[field::LEN], self.len);
        buf[field::PAD].fill(0);
    }

    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_LEN {
            return Err(Error::PacketTooShort);
        }
        Ok(Self {
            seqno: read_u32(&buf[field::SEQNO]),
            msg_type: MessageType::try_from(read_u32(&buf[field::TYPE]))?,
            offset: read_u64(&buf[field::OFFSET]),
            len: read_u32(&buf[field::LEN]),
        })
    }
}

/// Sequence number carried by an acknowledgement. Trailing bytes are ignored.
pub fn parse_ack(buf: &[u8]) -> Result<u32> {
    if buf.len() < ACK_LEN {
        return Err(Error::PacketTooShort);
    }
    Ok(read_u32(&buf[field::ACK_SEQNO]))
}

pub fn emit_ack(buf: &mut [u8], seqno: u32) {
    write_u32(&mut buf[field::ACK_SEQNO], seqno);
}

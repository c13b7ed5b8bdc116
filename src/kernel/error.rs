use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    #[error("packet too short")]
    PacketTooShort,
    #[error("invalid header length")]
    InvalidHeaderLen,
    #[error("invalid length")]
    InvalidLength,
    #[error("checksum mismatch")]
    ChecksumError,
    #[error("unsupported protocol")]
    UnsupportedProtocol,
    #[error("vlan tagged frame")]
    VlanTagged,
    #[error("ip fragment")]
    Fragmented,
    #[error("unexpected source address")]
    UnexpectedSource,
    #[error("unexpected destination address")]
    UnexpectedDestination,
    #[error("unexpected port")]
    UnexpectedPort,

    #[error("frame exceeds interface mtu")]
    FrameTooLarge,
    #[error("buffer full")]
    BufferFull,

    #[error("network is down")]
    NetworkDown,
    #[error("transmit queue full")]
    QueueFull,

    #[error("timed out")]
    Timeout,
    #[error("resources exhausted")]
    ResourceExhausted,
    #[error("message needs more fragments than the ack window holds")]
    TooManyFragments,
    #[error("chunk larger than staging buffer")]
    ChunkTooLarge,

    #[error("not configured: {0}")]
    NotConfigured(&'static str),
    #[error("device not found")]
    DeviceNotFound,
    #[error("unsupported device")]
    UnsupportedDevice,

    #[error("invalid state")]
    InvalidState,
    #[error("dump already failed")]
    DumpFailed,
}

impl Error {
    /// Transient transmit-side failures that a later retransmit round may clear.
    pub fn is_resource(self) -> bool {
        matches!(
            self,
            Error::QueueFull | Error::BufferFull | Error::NetworkDown | Error::ResourceExhausted
        )
    }
}

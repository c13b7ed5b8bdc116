//! Kernel crash dumps over UDP.
//!
//! After a panic the normal network stack cannot be trusted, so this client
//! builds its own frames and polls the NIC directly. The server is told a dump
//! is coming (HERALD), receives the kernel dump header (KDH) and the memory
//! image (VMCORE) in chunks, and is told when the dump is over (FINISHED).
//! Every message is split into MTU-sized fragments that the server
//! acknowledges one by one; see [`send::netdump_send`].

pub mod config;
pub mod dumper;
pub mod input;
pub mod output;
pub mod resolver;
pub mod send;
pub mod session;
#[cfg(test)]
mod testing;
pub mod wire;

pub use config::{NetdumpConfig, Tunables};
pub use dumper::{DumpState, DumperRegistry, Netdump, RebootFlags};
pub use session::{AckWindow, Session};
pub use wire::MessageType;

/// Well-known server port; also the destination until the server picks another.
pub const NETDUMP_PORT: u16 = 20023;
/// Client port: messages leave from it and acknowledgements arrive on it.
pub const NETDUMP_ACKPORT: u16 = 20024;
/// Upper bound on one fragment's payload.
pub const NETDUMP_DATASIZE: usize = 4096;
/// Size of the kernel dump header region at the start of the dump stream.
pub const KDH_SIZE: u64 = 512;
/// Largest chunk the dump framework may hand over in one call.
pub const STAGING_CAPACITY: usize = 64 * 1024;

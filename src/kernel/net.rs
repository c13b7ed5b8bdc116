pub mod arp;
pub mod device;
pub mod driver;
pub mod ethernet;
pub mod interface;
pub mod ip;
pub mod packet;
pub mod protocol;
pub mod trace;
pub mod udp;
pub mod util;

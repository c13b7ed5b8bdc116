use crate::error::{Error, Result};
use crate::net::device::{is_usable, DeviceCaps, NetDevice, NetDeviceType};

/// Checks that `dev` is named `ifname` and can carry a dump right now.
pub fn check<D: NetDevice + ?Sized>(dev: &D, ifname: &str) -> Result<()> {
    if dev.name() != ifname {
        return Err(Error::DeviceNotFound);
    }
    if dev.dev_type() != NetDeviceType::Ethernet || !dev.caps().contains(DeviceCaps::NETDUMP) {
        log::warn!("netdump: {} does not support polled dumps", ifname);
        return Err(Error::UnsupportedDevice);
    }
    if !is_usable(dev) {
        log::warn!("netdump: {} is not up", ifname);
        return Err(Error::NetworkDown);
    }
    Ok(())
}

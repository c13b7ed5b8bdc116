use core::sync::atomic::{AtomicU32, Ordering};

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Flags: u32 {
        const ETHER = 1 << 0;
        const ARP = 1 << 1;
        const IP = 1 << 2;
        const UDP = 1 << 4;
        const DRIVER = 1 << 7;
        const NETDUMP = 1 << 8;
    }
}

static TRACE_FLAGS: AtomicU32 = AtomicU32::new(0);

pub fn is_enabled(flag: Flags) -> bool {
    Flags::from_bits_truncate(TRACE_FLAGS.load(Ordering::Relaxed)).contains(flag)
}

pub fn set_enabled(flags: Flags) {
    TRACE_FLAGS.store(flags.bits(), Ordering::Relaxed);
}

#[macro_export]
macro_rules! trace {
    ($flag:ident, $($arg:tt)*) => {
        if $crate::net::trace::is_enabled($crate::net::trace::Flags::$flag) {
            log::trace!($($arg)*)
        }
    };
}

/// Lets one event in every `period` through.
#[derive(Debug, Clone, Copy)]
pub struct RateLimit {
    period: u32,
    seen: u32,
}

impl RateLimit {
    pub const DEFAULT_PERIOD: u32 = 64;

    pub const fn new(period: u32) -> Self {
        Self { period, seen: 0 }
    }

    pub fn allow(&mut self) -> bool {
        let pass = self.period == 0 || self.seen % self.period == 0;
        self.seen = self.seen.wrapping_add(1);
        pass
    }

    pub fn suppressed(&self) -> u32 {
        if self.period == 0 {
            return 0;
        }
        self.seen - self.seen.div_ceil(self.period)
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PERIOD)
    }
}

#![cfg_attr(not(test), no_std)]

pub mod error;
pub mod net;
pub mod netdump;

pub use error::{Error, Result};

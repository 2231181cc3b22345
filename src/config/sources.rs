//! Configuration sources layered over the defaults.

pub mod environment;
pub mod file;

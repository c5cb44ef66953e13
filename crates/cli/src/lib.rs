//! Library half of the `pd` binary, shared with the integration tests

pub mod cmd;
pub mod config;
pub mod daemon;
pub mod locks;
pub mod logging;
pub mod util;

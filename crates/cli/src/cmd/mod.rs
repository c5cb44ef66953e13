//! CLI command implementations

pub mod apply;
pub mod check;
pub mod gc;
pub mod init;
pub mod log;
pub mod retry;
pub mod revert;
pub mod start;
pub mod status;
pub mod stop;

//! Workflow integration tests
//!
//! Each module drives several commands in sequence and checks the tree.

pub mod apply_check_log;
pub mod edge_cases;
pub mod revert_retry_gc;

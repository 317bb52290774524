//! CLI command implementations

pub mod checkout;
pub mod gc;
pub mod init;
pub mod log;
pub mod prune;
pub mod rm;
pub mod show;
pub mod snapshot;
pub mod status;
pub mod verify;
pub mod wipe;

//! warmvol - branch-scoped block-storage cache volumes for CI runners
//!
//! At job start a volume cloned from the newest snapshot of the branch (or
//! of the default branch) is attached and mounted under a dependent
//! service; at job end it is snapshotted and deleted.

pub mod cache;
pub mod cli;
pub mod cloud;
pub mod config;
pub mod error;
pub mod host;
pub mod ui;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{WarmvolError, WarmvolResult};

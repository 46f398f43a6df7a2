//! CLI command implementations

pub mod config;
mod context;
pub mod locate;
pub mod restore;
pub mod snapshot;

pub use config::execute as config;
pub use locate::execute as locate;
pub use restore::execute as restore;
pub use snapshot::execute as snapshot;

//! CLI command implementations

pub mod check;
pub mod config;
pub mod get;

pub use check::execute as check;
pub use config::execute as config;
pub use get::execute as get;

//! Subcommand modules for the `blatz` binary.

pub mod align;
pub mod client;
pub mod server;

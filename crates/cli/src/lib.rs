//! fabricctl — operator CLI for the fabric bridge-domain orchestrator.

pub mod client;
pub mod commands;
pub mod output;

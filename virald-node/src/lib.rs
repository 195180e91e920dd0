//! # virald Node
//!
//! Node daemon library: configuration, control plane registration and the
//! HTTP API in front of [`virald_provider::VmManager`].

pub mod cli;
pub mod config;
pub mod http_server;
pub mod registration;
pub mod server;

//! # virald Provider
//!
//! Provider abstraction layer for provisioning VMs on heterogeneous backends.
//!
//! This crate provides a unified lifecycle API over:
//! - **Docker** - `qemux/qemu-docker` containers driven by `docker compose`
//! - **UTM** - native macOS VMs driven by `utmctl`
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │               VmManager                 │
//! │   (discovery, selection, delegation)    │
//! └─────────────────────┬───────────────────┘
//!                       │ VmProvider trait
//!         ┌─────────────┴─────────────┐
//!         ▼                           ▼
//! ┌───────────────────┐     ┌───────────────────┐
//! │    UtmProvider    │     │  DockerProvider   │
//! │  (utmctl + text)  │     │ (compose/inspect) │
//! └───────────────────┘     └───────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use virald_provider::{ProviderSettings, VmConfig, VmManager};
//!
//! #[tokio::main]
//! async fn main() {
//!     let manager = VmManager::with_default_providers(&ProviderSettings::default()).await;
//!
//!     let vm = manager
//!         .create_vm(VmConfig::new("https://example/image.iso"))
//!         .await
//!         .unwrap();
//!     println!("{} -> {}", vm.id, vm.connection_url);
//! }
//! ```

pub mod command;
pub mod compose;
pub mod docker;
pub mod error;
pub mod manager;
pub mod registry;
pub mod traits;
pub mod types;
pub mod utm;

pub use command::{CommandOutput, CommandRunner, SystemCommandRunner};
pub use docker::DockerProvider;
pub use error::{ErrorKind, ProviderError, Result};
pub use manager::{ProviderKind, ProviderSettings, VmManager};
pub use traits::VmProvider;
pub use types::*;
pub use utm::UtmProvider;

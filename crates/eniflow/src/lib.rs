//! eniflow - network interface lifecycle reconciler
//!
//! Drives a network interface (ENI) and its attachment to a compute
//! instance toward a declared state against an eventually consistent
//! provider API. Each operation issues at most the provider calls it needs
//! and then polls, at a fixed interval and within a bounded time, until the
//! provider reports the target state.
//!
//! # Example
//!
//! ```ignore
//! use eniflow::{Reconciler, ReconcilerConfig};
//! use eniflow::eniflow_cloud::CreateInterfaceRequest;
//!
//! let reconciler = Reconciler::new(provider, ReconcilerConfig::from_env()?)?;
//!
//! let eni = reconciler
//!     .create_interface(&CreateInterfaceRequest::new("vsw-1", "sg-1").with_name("web"))
//!     .await?;
//! let attachment = reconciler.attach_interface(&eni.id, "i-001").await?;
//!
//! reconciler.detach_interface(&attachment.id).await?;
//! reconciler.delete_interface(&eni.id).await?;
//! ```

pub mod attachment;
pub mod config;
pub mod error;
pub mod interface;
pub mod listing;
pub mod poller;
pub mod reconciler;

pub use eniflow_cloud;

// Re-exports
pub use attachment::DETACH_RETRYABLE_CONFLICTS;
pub use config::{MAX_PAGE_SIZE, MAX_TIMEOUT_SECS, ReconcilerConfig};
pub use error::{EniError, Result};
pub use interface::DELETE_RETRYABLE_CONFLICTS;
pub use poller::{PollResult, Poller, Probe};
pub use reconciler::Reconciler;

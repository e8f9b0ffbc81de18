//! eniflow provider contract
//!
//! This crate defines what the reconciler needs from a cloud provider in
//! order to manage a network interface (ENI) and its attachment to an
//! instance: the typed entity snapshots, the one-call-per-operation
//! provider trait, and the classification of provider errors.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                    eniflow                       │
//! │        (Poller + Lifecycle Reconciler)           │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                eniflow-cloud                     │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │            Provider Contract              │   │
//! │  │  trait NetworkProvider { ... }            │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────────────┐    │
//! │  │    Model     │  │  Error Classifier    │    │
//! │  └──────────────┘  └──────────────────────┘    │
//! └───────┬─────────────────────────────────────────┘
//!         │
//! ┌───────▼───────────────┐
//! │  eniflow-cloud-memory │
//! │  (in-memory provider) │
//! └───────────────────────┘
//! ```

pub mod classify;
pub mod error;
pub mod model;
pub mod provider;

// Re-exports
pub use classify::{ConflictCode, ErrorClass, classify};
pub use error::{ProviderError, Result};
pub use model::{
    Attachment, AttachmentId, Instance, InterfaceStatus, InterfaceType, InvalidAttachmentId,
    InvariantViolation, NetworkInterface, PrivateIpAddress, PublicIp,
};
pub use provider::{
    CreateInterfaceRequest, InterfaceFilter, InterfaceUpdate, NetworkProvider, PageRequest,
};

//! In-memory network provider for eniflow
//!
//! This crate implements the NetworkProvider trait entirely in memory,
//! reproducing the parts of a real control plane the reconciler has to cope
//! with.
//!
//! # Features
//!
//! - Read-after-write lag: accepted mutations surface after a configurable
//!   number of further calls
//! - Provider-side protections (primary interface, busy interface, busy
//!   instance, unknown subnet or instance) reported with real error codes
//! - Scripted failures and stalled operations
//! - Per-operation call counters
//!
//! # Example
//!
//! ```ignore
//! use eniflow_cloud::{CreateInterfaceRequest, NetworkProvider};
//! use eniflow_cloud_memory::{MemoryConfig, MemoryProvider};
//!
//! let provider = MemoryProvider::new(MemoryConfig { convergence_calls: 2 });
//! provider.add_subnet("subnet-1", "vpc-1", "zone-a");
//!
//! let id = provider
//!     .create_interface(&CreateInterfaceRequest::new("subnet-1", "sg-1"))
//!     .await?;
//! ```

pub mod provider;

pub use provider::{MemoryConfig, MemoryProvider, Operation, codes};

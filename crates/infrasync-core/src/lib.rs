//! InfraSync core
//!
//! This crate holds the vocabulary shared by every part of InfraSync:
//! the resource model, the pull-based discovery protocol that service
//! adapters implement, and the drift detector that compares live resources
//! against a recorded state snapshot.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │              infrasync (import / sync)            │
//! └─────────────────┬────────────────────────────────┘
//!                   │
//! ┌─────────────────▼────────────────────────────────┐
//! │                 infrasync-core                    │
//! │  ┌──────────────────────────────────────────┐    │
//! │  │   Discovery protocol                      │    │
//! │  │   trait ResourceImporter / Iterator       │    │
//! │  └──────────────────────────────────────────┘    │
//! │  ┌──────────────┐  ┌──────────────────────┐      │
//! │  │ Resource     │  │ Drift detection      │      │
//! │  │ model        │  │ + state snapshots    │      │
//! │  └──────────────┘  └──────────────────────┘      │
//! └───────┬─────────────────┬────────────────────────┘
//!         │                 │
//! ┌───────▼───────┐ ┌───────▼───────┐
//! │ google        │ │  provisioner  │
//! │ adapters      │ │  (terraform)  │
//! └───────────────┘ └───────────────┘
//! ```

pub mod drift;
pub mod error;
pub mod iterator;
pub mod model;
pub mod state;

// Re-exports
pub use drift::{Change, ComparedField, Comparison, DriftDetector, DriftResult, EXISTENCE};
pub use error::{DiscoveryError, DriftError, Result};
pub use iterator::{
    Connector, NameLedger, PageSource, PagedIterator, ResourceImporter, ResourceIterator,
    collect_resources, guarded,
};
pub use model::{Provider, ProviderKind, Resource, ResourceType, Service, sanitize_name};
pub use state::{LocalStateSource, ResourceState, StateSnapshot, StateSource};

//! InfraSync application layer
//!
//! Wires service adapters, the provisioner and the drift detector into the
//! two runs the CLI exposes: importing live resources as declarative
//! definitions, and synchronizing those definitions against recorded state.

pub mod error;
pub mod import;
pub mod scaffold;
pub mod sync;

pub use error::{ImportError, ScaffoldError, SyncError};
pub use import::{ImportOrchestrator, ImportSummary, ServiceImport};
pub use scaffold::{Scaffold, ScaffoldReport, config_template};
pub use sync::{SyncCoordinator, SyncOptions, SyncResult, SyncTarget};

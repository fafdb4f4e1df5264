//! InfraSync provisioning
//!
//! Drives the external declarative tool (Terraform or OpenTofu) and owns the
//! on-disk layout of everything InfraSync writes: definitions, pending import
//! intents and files regenerated from state.

pub mod error;
pub mod hcl;
pub mod layout;
pub mod provisioner;
pub mod terraform;

pub use error::{ProvisionError, Result};
pub use layout::{ArtifactLayout, import_block};
pub use provisioner::{ImportRequest, Provisioner};
pub use terraform::TerraformRunner;

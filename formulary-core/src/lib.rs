//! Formulary core library: domain types, formula loading, install layout,
//! and the service descriptor.
//!
//! Public API surface:
//! - [`types`]: newtypes and the [`Formula`] / [`Artifact`] structs
//! - [`error`]: [`FormulaError`]
//! - [`formula`]: load + validate formula YAML files
//! - [`layout`]: [`InstallLayout`], the prefix-relative path scheme
//! - [`service`]: [`ServiceDescriptor`] and [`describe_service`]

pub mod error;
pub mod formula;
pub mod layout;
pub mod service;
pub mod types;

pub use error::FormulaError;
pub use layout::InstallLayout;
pub use service::{describe_service, ServiceDescriptor};
pub use types::{Artifact, Formula, FormulaName, InstallSpec};

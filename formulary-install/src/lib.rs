//! # formulary-install
//!
//! Fetch, verify and install one formula's artifact into an
//! [`InstallLayout`](formulary_core::InstallLayout).
//!
//! Call [`install_formula`] for the whole staged pipeline, or use the
//! building blocks directly: [`fetch::fetch`], [`writer::install_executable`],
//! [`writer::seed_config`], [`self_test::self_test`].

pub mod archive;
pub mod deps;
pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod receipt;
pub mod self_test;
pub mod writer;

pub use error::{InstallError, Stage};
pub use fetch::{Fetcher, SourceFetcher};
pub use pipeline::{install_formula, uninstall, InstallReport, InstallState, UninstallReport};
pub use receipt::{InstallReceipt, ServiceRecord};
pub use self_test::{self_test, SelfTestReport};
pub use writer::{ConfigOutcome, WriteResult};

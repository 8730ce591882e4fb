//! # formulary-render
//!
//! Tera-based templates that turn a [`ServiceDescriptor`] into the files a
//! host supervisor consumes (launchd plist, systemd unit) and into the
//! post-install caveats text.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use formulary_core::{describe_service, FormulaName, InstallLayout};
//! use formulary_render::{Renderer, UnitKind};
//! use std::path::Path;
//!
//! let layout = InstallLayout::new(Path::new("/opt/fm"), &FormulaName::from("demo"), "demo.sh");
//! let descriptor = describe_service(&layout);
//! if let Ok(renderer) = Renderer::new() {
//!     if let Ok(unit) = renderer.render(&descriptor, "demo.yaml", UnitKind::Systemd) {
//!         println!("{unit}");
//!     }
//! }
//! ```
//!
//! [`ServiceDescriptor`]: formulary_core::ServiceDescriptor

pub mod context;
pub mod engine;
pub mod error;

pub use context::ServiceContext;
pub use engine::{Renderer, TemplateEngine, UnitKind};
pub use error::RenderError;

//! Host supervision for installed clients: launchd and systemd back-ends
//! behind the [`Supervisor`] trait, plus a foreground runner for hosts that
//! have neither.

mod error;
pub mod launchd;
pub mod paths;
pub mod runner;
pub mod supervisor;
pub mod systemd;

pub use error::ServiceError;
pub use launchd::Launchd;
pub use runner::{run_blocking, supervise, ExitReason, RestartPolicy, SuperviseSummary};
pub use supervisor::{detect_supervisor, Supervisor, SupervisorKind};
pub use systemd::Systemd;

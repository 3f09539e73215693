//! `ConsoleApplication` convergence: spec mapping, manifests, readiness and the pass itself.

pub(crate) mod controller;
pub mod mapper;
pub mod readiness;
pub mod reconciler;
pub mod resources;

pub(crate) use controller::{error_policy, reconcile_console_app};
pub use mapper::{MapperError, Prerequisite, RequiredResource, ResourceMapper};
pub use readiness::{Outcome, Readiness};
pub use reconciler::{GitCredential, Reconciler};
pub use resources::AppResources;

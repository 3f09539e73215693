//! Git hosting abstraction used to check that a source repository can be read.
//!
//! The crate knows two hosting services, GitHub and GitLab. A [`RepoProber`]
//! classifies a repository URL plus ref as reachable or not, returning a
//! [`ProbeReason`] that callers record verbatim in their status.

pub mod error;
pub mod metadata;
pub mod prober;
pub mod provider;

pub use error::ScmError;
pub use metadata::{BranchInfo, HttpMetadataService, MetadataService};
pub use prober::{GitReachabilityProber, ProbeReason, Reachability, RepoProber};
pub use provider::{GitProvider, RepoLocation};

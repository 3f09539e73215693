//! Repository reachability probe.

use crate::error::ScmError;
use crate::metadata::MetadataService;
use crate::provider::RepoLocation;
use async_trait::async_trait;
use std::fmt;
use tracing::{info, warn};

/// Why a repository was or was not reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeReason {
    Succeeded,
    RepoNotFound,
    RepoNotReachable,
    RateLimitExceeded,
    UnsupportedHostType,
    InvalidUrl,
    AccessTokenRequired,
}

impl ProbeReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ProbeReason::Succeeded => "Succeeded",
            ProbeReason::RepoNotFound => "RepoNotFound",
            ProbeReason::RepoNotReachable => "RepoNotReachable",
            ProbeReason::RateLimitExceeded => "RateLimitExceeded",
            ProbeReason::UnsupportedHostType => "UnsupportedHostType",
            ProbeReason::InvalidUrl => "InvalidURL",
            ProbeReason::AccessTokenRequired => "AccessTokenRequired",
        }
    }

    /// Map a failed lookup onto the reason recorded for it.
    pub fn from_error(err: &ScmError) -> Self {
        match err {
            ScmError::InvalidUrl(_) => ProbeReason::InvalidUrl,
            ScmError::UnsupportedHost(_) => ProbeReason::UnsupportedHostType,
            ScmError::Http { status: 404, .. } => ProbeReason::RepoNotFound,
            ScmError::Http {
                status: 403 | 429, ..
            } => ProbeReason::RateLimitExceeded,
            ScmError::Http { .. } | ScmError::Transport(_) => ProbeReason::RepoNotReachable,
        }
    }
}

impl fmt::Display for ProbeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reachability {
    pub reachable: bool,
    pub reason: ProbeReason,
}

impl Reachability {
    pub fn reachable() -> Self {
        Self {
            reachable: true,
            reason: ProbeReason::Succeeded,
        }
    }

    pub fn unreachable(reason: ProbeReason) -> Self {
        Self {
            reachable: false,
            reason,
        }
    }
}

/// Classifies a repository and ref as readable or not.
#[async_trait]
pub trait RepoProber: Send + Sync {
    async fn probe(&self, url: &str, reference: &str, credential: Option<&str>) -> Reachability;
}

/// [`RepoProber`] that makes at most one metadata call per probe.
pub struct GitReachabilityProber<M> {
    metadata: M,
}

impl<M: MetadataService> GitReachabilityProber<M> {
    pub fn new(metadata: M) -> Self {
        Self { metadata }
    }
}

#[async_trait]
impl<M: MetadataService> RepoProber for GitReachabilityProber<M> {
    async fn probe(&self, url: &str, reference: &str, credential: Option<&str>) -> Reachability {
        let location = match RepoLocation::parse(url) {
            Ok(location) => location,
            Err(e) => {
                warn!(%url, error = %e, "Repository URL rejected before probing");
                return Reachability::unreachable(ProbeReason::from_error(&e));
            }
        };

        let credential = credential.filter(|c| !c.is_empty());
        if credential.is_none() && location.provider.requires_token() {
            warn!(provider = %location.provider, repo = %location.full_name(), "Access token required but none supplied");
            return Reachability::unreachable(ProbeReason::AccessTokenRequired);
        }

        match self.metadata.get_branch(&location, reference, credential).await {
            Ok(branch) => {
                info!(provider = %location.provider, repo = %location.full_name(), branch = %branch.name, "Repository reachable");
                Reachability::reachable()
            }
            Err(e) => {
                let reason = ProbeReason::from_error(&e);
                warn!(provider = %location.provider, repo = %location.full_name(), error = %e, %reason, "Repository not reachable");
                Reachability::unreachable(reason)
            }
        }
    }
}

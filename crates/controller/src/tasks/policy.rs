//! How a convergence pass ends, and how long to wait before the next one.

use crate::tasks::config::RequeueConfig;
use crate::tasks::store::ResourceKind;
use crate::tasks::types::Error;
use kube::runtime::controller::Action;
use std::time::Duration;

/// Decision reached by a convergence pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// Terminal success or failure; wait for the spec or an owned resource to change
    Done,
    RequeueAfter(Duration),
    RequeueNow,
}

impl PassOutcome {
    pub fn requeue_after(self) -> Option<Duration> {
        match self {
            PassOutcome::RequeueAfter(delay) => Some(delay),
            PassOutcome::RequeueNow => Some(Duration::ZERO),
            PassOutcome::Done => None,
        }
    }

    pub fn into_action(self) -> Action {
        match self.requeue_after() {
            Some(delay) => Action::requeue(delay),
            None => Action::await_change(),
        }
    }
}

impl From<PassOutcome> for Action {
    fn from(outcome: PassOutcome) -> Self {
        outcome.into_action()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequeuePolicy {
    pub build_poll: Duration,
    pub workload_poll: Duration,
    pub created: Duration,
    pub error_backoff: Duration,
    pub conflict: Duration,
}

impl RequeuePolicy {
    pub fn from_config(config: &RequeueConfig) -> Self {
        Self {
            build_poll: Duration::from_secs(config.build_poll_seconds),
            workload_poll: Duration::from_secs(config.workload_poll_seconds),
            created: Duration::from_secs(config.created_seconds),
            error_backoff: Duration::from_secs(config.error_backoff_seconds),
            conflict: Duration::from_secs(config.conflict_seconds),
        }
    }

    /// Right after creating a resource
    pub fn after_create(&self) -> PassOutcome {
        PassOutcome::RequeueAfter(self.created)
    }

    /// While a resource of `kind` exists but is not ready
    pub fn poll(&self, kind: ResourceKind) -> PassOutcome {
        let delay = match kind {
            ResourceKind::BuildConfig => self.build_poll,
            ResourceKind::Deployment => self.workload_poll,
            ResourceKind::ImageStream | ResourceKind::Service | ResourceKind::Route => {
                self.created
            }
        };
        PassOutcome::RequeueAfter(delay)
    }

    /// Requeue after a pass failed with `err`
    pub fn on_error(&self, err: &Error) -> Action {
        match err {
            Error::ObjectDeleted(_) => Action::await_change(),
            Error::SpecChanged(_) => Action::requeue(Duration::ZERO),
            e if e.is_conflict() => Action::requeue(self.conflict),
            _ => Action::requeue(self.error_backoff),
        }
    }
}

impl Default for RequeuePolicy {
    fn default() -> Self {
        Self::from_config(&RequeueConfig::default())
    }
}

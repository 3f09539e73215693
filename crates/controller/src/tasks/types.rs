use crate::tasks::app::Reconciler;
use crate::tasks::store::StoreError;
use kube::{Resource, ResourceExt};
use std::fmt;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Object store error: {0}")]
    StoreError(#[from] StoreError),

    #[error("Missing object key")]
    MissingObjectKey,

    #[error("ConsoleApplication {0} was deleted during the pass")]
    ObjectDeleted(AppKey),

    #[error("ConsoleApplication {0} spec changed during the pass")]
    SpecChanged(AppKey),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl Error {
    /// Status writes kept conflicting after every retry
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::StoreError(StoreError::Conflict(_)))
    }
}

/// Namespace and name of a `ConsoleApplication`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppKey {
    pub namespace: String,
    pub name: String,
}

impl AppKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of a namespaced object, `None` when it carries no namespace
    pub fn from_resource<K: Resource>(resource: &K) -> Option<Self> {
        Some(Self::new(resource.namespace()?, resource.name_any()))
    }
}

impl fmt::Display for AppKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

// Context for controllers
pub(crate) struct Context {
    /// Watched namespace, `None` for the whole cluster
    pub namespace: Option<String>,
    pub reconciler: Reconciler,
}

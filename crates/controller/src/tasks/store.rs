//! Object and credential store capabilities used by the convergence loop,
//! plus their Kubernetes API implementations.

use crate::crds::{Build, BuildConfig, ConsoleApplication, ImageStream, Route};
use crate::tasks::types::AppKey;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Secret, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

/// Kinds of resources created for a `ConsoleApplication`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    ImageStream,
    BuildConfig,
    Deployment,
    Service,
    Route,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::ImageStream => "ImageStream",
            ResourceKind::BuildConfig => "BuildConfig",
            ResourceKind::Deployment => "Deployment",
            ResourceKind::Service => "Service",
            ResourceKind::Route => "Route",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resource the controller creates, tagged by kind
#[derive(Debug, Clone)]
pub enum ManagedObject {
    ImageStream(ImageStream),
    BuildConfig(BuildConfig),
    Deployment(Deployment),
    Service(Service),
    Route(Route),
}

impl ManagedObject {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ManagedObject::ImageStream(_) => ResourceKind::ImageStream,
            ManagedObject::BuildConfig(_) => ResourceKind::BuildConfig,
            ManagedObject::Deployment(_) => ResourceKind::Deployment,
            ManagedObject::Service(_) => ResourceKind::Service,
            ManagedObject::Route(_) => ResourceKind::Route,
        }
    }

    pub fn meta(&self) -> &ObjectMeta {
        match self {
            ManagedObject::ImageStream(o) => o.meta(),
            ManagedObject::BuildConfig(o) => o.meta(),
            ManagedObject::Deployment(o) => o.meta(),
            ManagedObject::Service(o) => o.meta(),
            ManagedObject::Route(o) => o.meta(),
        }
    }

    pub fn meta_mut(&mut self) -> &mut ObjectMeta {
        match self {
            ManagedObject::ImageStream(o) => o.meta_mut(),
            ManagedObject::BuildConfig(o) => o.meta_mut(),
            ManagedObject::Deployment(o) => o.meta_mut(),
            ManagedObject::Service(o) => o.meta_mut(),
            ManagedObject::Route(o) => o.meta_mut(),
        }
    }

    pub fn name(&self) -> &str {
        self.meta().name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.meta().namespace.as_deref()
    }
}

macro_rules! impl_from_object {
    ($($kind:ident),*) => {
        $(
            impl From<$kind> for ManagedObject {
                fn from(object: $kind) -> Self {
                    ManagedObject::$kind(object)
                }
            }
        )*
    };
}

impl_from_object!(ImageStream, BuildConfig, Deployment, Service, Route);

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Create lost a race with another writer
    #[error("{kind} {name} already exists")]
    AlreadyExists { kind: ResourceKind, name: String },

    /// Optimistic-concurrency check failed on a status write
    #[error("conflict updating status of {0}")]
    Conflict(String),

    /// The API refused the object for a reason retrying will not fix
    #[error("{kind} {name} was rejected: {message}")]
    Rejected {
        kind: ResourceKind,
        name: String,
        message: String,
    },

    #[error("{kind} {name} has no namespace")]
    MissingNamespace { kind: String, name: String },

    #[error(transparent)]
    Kube(#[from] kube::Error),
}

/// Reads and writes `ConsoleApplication`s and the resources they own
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_app(&self, key: &AppKey) -> Result<Option<ConsoleApplication>, StoreError>;

    /// Write `app.status`, guarded by `app.metadata.resource_version`
    async fn update_app_status(
        &self,
        app: &ConsoleApplication,
    ) -> Result<ConsoleApplication, StoreError>;

    async fn get(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ManagedObject>, StoreError>;

    async fn create(&self, object: ManagedObject) -> Result<ManagedObject, StoreError>;

    async fn list_builds(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<Build>, StoreError>;
}

/// Reads Secret data
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BTreeMap<String, Vec<u8>>>, StoreError>;
}

/// Mark `object` as controlled by `app` so it is garbage collected with it
pub fn set_owner(object: &mut ObjectMeta, app: &ConsoleApplication) {
    match app.controller_owner_ref(&()) {
        Some(owner) => object.owner_references = Some(vec![owner]),
        None => warn!(
            application = %app.name_any(),
            "ConsoleApplication has no uid, created object will not be owned"
        ),
    }
}

/// [`ObjectStore`] and [`CredentialStore`] over the Kubernetes API
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn get_typed<K>(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + fmt::Debug,
        <K as Resource>::DynamicType: Default,
    {
        Ok(self.api::<K>(namespace).get_opt(name).await?)
    }

    async fn create_typed<K>(&self, kind: ResourceKind, object: K) -> Result<K, StoreError>
    where
        K: Resource<Scope = NamespaceResourceScope>
            + Clone
            + DeserializeOwned
            + Serialize
            + fmt::Debug,
        <K as Resource>::DynamicType: Default,
    {
        let name = object.name_any();
        let namespace = object
            .namespace()
            .ok_or_else(|| StoreError::MissingNamespace {
                kind: kind.to_string(),
                name: name.clone(),
            })?;

        debug!(%kind, %name, %namespace, "Creating resource");
        match self
            .api::<K>(&namespace)
            .create(&PostParams::default(), &object)
            .await
        {
            Ok(created) => Ok(created),
            Err(kube::Error::Api(ae)) if ae.code == 409 => {
                Err(StoreError::AlreadyExists { kind, name })
            }
            Err(kube::Error::Api(ae)) if (400..500).contains(&ae.code) && ae.code != 429 => {
                Err(StoreError::Rejected {
                    kind,
                    name,
                    message: ae.message,
                })
            }
            Err(e) => Err(StoreError::Kube(e)),
        }
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get_app(&self, key: &AppKey) -> Result<Option<ConsoleApplication>, StoreError> {
        self.get_typed(&key.namespace, &key.name).await
    }

    async fn update_app_status(
        &self,
        app: &ConsoleApplication,
    ) -> Result<ConsoleApplication, StoreError> {
        let name = app.name_any();
        let namespace = app
            .namespace()
            .ok_or_else(|| StoreError::MissingNamespace {
                kind: "ConsoleApplication".to_string(),
                name: name.clone(),
            })?;

        let patch = json!({
            "metadata": { "resourceVersion": app.resource_version() },
            "status": app.status,
        });

        match self
            .api::<ConsoleApplication>(&namespace)
            .patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
        {
            Ok(updated) => Ok(updated),
            Err(kube::Error::Api(ae)) if ae.code == 409 => Err(StoreError::Conflict(name)),
            Err(e) => Err(StoreError::Kube(e)),
        }
    }

    async fn get(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ManagedObject>, StoreError> {
        let object = match kind {
            ResourceKind::ImageStream => self
                .get_typed::<ImageStream>(namespace, name)
                .await?
                .map(ManagedObject::from),
            ResourceKind::BuildConfig => self
                .get_typed::<BuildConfig>(namespace, name)
                .await?
                .map(ManagedObject::from),
            ResourceKind::Deployment => self
                .get_typed::<Deployment>(namespace, name)
                .await?
                .map(ManagedObject::from),
            ResourceKind::Service => self
                .get_typed::<Service>(namespace, name)
                .await?
                .map(ManagedObject::from),
            ResourceKind::Route => self
                .get_typed::<Route>(namespace, name)
                .await?
                .map(ManagedObject::from),
        };
        Ok(object)
    }

    async fn create(&self, object: ManagedObject) -> Result<ManagedObject, StoreError> {
        let kind = object.kind();
        let created: ManagedObject = match object {
            ManagedObject::ImageStream(o) => self.create_typed(kind, o).await?.into(),
            ManagedObject::BuildConfig(o) => self.create_typed(kind, o).await?.into(),
            ManagedObject::Deployment(o) => self.create_typed(kind, o).await?.into(),
            ManagedObject::Service(o) => self.create_typed(kind, o).await?.into(),
            ManagedObject::Route(o) => self.create_typed(kind, o).await?.into(),
        };
        Ok(created)
    }

    async fn list_builds(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<Build>, StoreError> {
        let builds = self
            .api::<Build>(namespace)
            .list(&ListParams::default().labels(label_selector))
            .await?;
        Ok(builds.items)
    }
}

#[async_trait]
impl CredentialStore for KubeStore {
    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BTreeMap<String, Vec<u8>>>, StoreError> {
        let secret = self.get_typed::<Secret>(namespace, name).await?;
        Ok(secret.map(|s| {
            s.data
                .unwrap_or_default()
                .into_iter()
                .map(|(key, value)| (key, value.0))
                .collect()
        }))
    }
}

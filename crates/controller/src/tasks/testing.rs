//! In-memory stores and prober for exercising the convergence loop.

use crate::crds::{
    Build, BuildPhase, BuildSpec, BuildStatus, ConsoleApplication, ConsoleApplicationSpec,
    ImageStream, ImageStreamSpec, ImageStreamStatus, NamedTagEventList,
};
use crate::tasks::store::{CredentialStore, ManagedObject, ObjectStore, ResourceKind, StoreError};
use crate::tasks::types::AppKey;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use k8s_openapi::api::apps::v1::{DeploymentCondition, DeploymentStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use scm::{ProbeReason, Reachability, RepoProber};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

type ObjectKey = (ResourceKind, String, String);

/// A builder-image application `demo/shop` at generation 1
pub fn builder_image_app() -> ConsoleApplication {
    let spec: ConsoleApplicationSpec = serde_yaml::from_str(
        r"
applicationName: storefront
git:
  url: https://github.com/acme/shop
importStrategy: BuilderImage
buildConfiguration:
  builderImage:
    image: nodejs
    tag: 20-ubi9
deploymentConfiguration:
  expose:
    targetPort: 3000
",
    )
    .unwrap();
    let mut app = ConsoleApplication::new("shop", spec);
    app.metadata.namespace = Some("demo".to_string());
    app.metadata.uid = Some("0b7e4c1a-5d3f-4b8e-9a52-3f0d6c2e1a77".to_string());
    app.metadata.generation = Some(1);
    app
}

/// A build of `shop` created `created_secs` after a fixed epoch
pub fn build(name: &str, created_secs: i64, phase: BuildPhase) -> Build {
    let mut build = Build::new(name, BuildSpec {});
    build.metadata.namespace = Some("demo".to_string());
    build.metadata.labels = Some(BTreeMap::from([("app".to_string(), "shop".to_string())]));
    build.metadata.creation_timestamp =
        Some(Time(Utc.timestamp_opt(1_700_000_000 + created_secs, 0).unwrap()));
    build.status = Some(BuildStatus {
        phase,
        reason: None,
        message: None,
    });
    build
}

#[derive(Default)]
struct State {
    apps: HashMap<AppKey, ConsoleApplication>,
    objects: HashMap<ObjectKey, ManagedObject>,
    builds: Vec<Build>,
    created: Vec<ResourceKind>,
    rejected: HashMap<ResourceKind, String>,
    raced: HashSet<ResourceKind>,
    conflicts: usize,
    status_writes: usize,
    resource_version: u64,
}

#[derive(Default)]
pub struct FakeStore {
    state: Mutex<State>,
}

impl FakeStore {
    /// A store whose `openshift` namespace carries the builder image stream with `tag`
    pub fn with_builder_image(image: &str, tag: &str) -> Self {
        let mut stream = ImageStream::new(image, ImageStreamSpec::default());
        stream.metadata.namespace = Some("openshift".to_string());
        stream.status = Some(ImageStreamStatus {
            docker_image_repository: None,
            tags: vec![NamedTagEventList {
                tag: tag.to_string(),
            }],
        });

        let store = Self::default();
        store.insert(stream.into());
        store
    }

    fn insert(&self, object: ManagedObject) {
        let key = (
            object.kind(),
            object.namespace().unwrap_or_default().to_string(),
            object.name().to_string(),
        );
        self.state.lock().unwrap().objects.insert(key, object);
    }

    pub fn put_app(&self, mut app: ConsoleApplication) {
        let mut state = self.state.lock().unwrap();
        state.resource_version += 1;
        app.metadata.resource_version = Some(state.resource_version.to_string());
        let key = AppKey::from_resource(&app).unwrap();
        state.apps.insert(key, app);
    }

    pub fn app(&self, key: &AppKey) -> Option<ConsoleApplication> {
        self.state.lock().unwrap().apps.get(key).cloned()
    }

    /// Simulate a spec edit
    pub fn bump_generation(&self, key: &AppKey) {
        let mut state = self.state.lock().unwrap();
        state.resource_version += 1;
        let version = state.resource_version.to_string();
        if let Some(app) = state.apps.get_mut(key) {
            app.metadata.generation = app.metadata.generation.map(|g| g + 1);
            app.metadata.resource_version = Some(version);
        }
    }

    pub fn object(&self, kind: ResourceKind, namespace: &str, name: &str) -> Option<ManagedObject> {
        let key = (kind, namespace.to_string(), name.to_string());
        self.state.lock().unwrap().objects.get(&key).cloned()
    }

    pub fn add_build(&self, build: Build) {
        self.state.lock().unwrap().builds.push(build);
    }

    /// Replace the conditions reported on a Deployment
    pub fn set_deployment_conditions(&self, namespace: &str, name: &str, conditions: &[(&str, &str)]) {
        let key = (ResourceKind::Deployment, namespace.to_string(), name.to_string());
        let mut state = self.state.lock().unwrap();
        if let Some(ManagedObject::Deployment(deployment)) = state.objects.get_mut(&key) {
            deployment.status = Some(DeploymentStatus {
                conditions: Some(
                    conditions
                        .iter()
                        .map(|(type_, status)| DeploymentCondition {
                            type_: type_.to_string(),
                            status: status.to_string(),
                            ..Default::default()
                        })
                        .collect(),
                ),
                ..Default::default()
            });
        }
    }

    /// Let the router admit a Route under `host`
    pub fn set_route_host(&self, namespace: &str, name: &str, host: &str) {
        let key = (ResourceKind::Route, namespace.to_string(), name.to_string());
        let mut state = self.state.lock().unwrap();
        if let Some(ManagedObject::Route(route)) = state.objects.get_mut(&key) {
            route.spec.host = Some(host.to_string());
        }
    }

    pub fn reject_creates(&self, kind: ResourceKind, message: &str) {
        self.state
            .lock()
            .unwrap()
            .rejected
            .insert(kind, message.to_string());
    }

    /// Another writer creates objects of `kind` first
    pub fn race_creates(&self, kind: ResourceKind) {
        self.state.lock().unwrap().raced.insert(kind);
    }

    pub fn conflict_next_status_writes(&self, count: usize) {
        self.state.lock().unwrap().conflicts = count;
    }

    pub fn created_kinds(&self) -> Vec<ResourceKind> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn status_writes(&self) -> usize {
        self.state.lock().unwrap().status_writes
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn get_app(&self, key: &AppKey) -> Result<Option<ConsoleApplication>, StoreError> {
        Ok(self.app(key))
    }

    async fn update_app_status(
        &self,
        app: &ConsoleApplication,
    ) -> Result<ConsoleApplication, StoreError> {
        let key = AppKey::from_resource(app).unwrap();
        let mut state = self.state.lock().unwrap();
        if state.conflicts > 0 {
            state.conflicts -= 1;
            state.resource_version += 1;
            let version = state.resource_version.to_string();
            if let Some(stored) = state.apps.get_mut(&key) {
                stored.metadata.resource_version = Some(version);
            }
            return Err(StoreError::Conflict(key.to_string()));
        }

        state.resource_version += 1;
        let version = state.resource_version.to_string();
        let Some(stored) = state.apps.get_mut(&key) else {
            return Err(StoreError::Conflict(key.to_string()));
        };
        if stored.metadata.resource_version != app.metadata.resource_version {
            return Err(StoreError::Conflict(key.to_string()));
        }
        stored.status = app.status.clone();
        stored.metadata.resource_version = Some(version);
        let updated = stored.clone();
        state.status_writes += 1;
        Ok(updated)
    }

    async fn get(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ManagedObject>, StoreError> {
        Ok(self.object(kind, namespace, name))
    }

    async fn create(&self, object: ManagedObject) -> Result<ManagedObject, StoreError> {
        let kind = object.kind();
        let name = object.name().to_string();
        {
            let mut state = self.state.lock().unwrap();
            if let Some(message) = state.rejected.get(&kind) {
                return Err(StoreError::Rejected {
                    kind,
                    name,
                    message: message.clone(),
                });
            }
            if state.raced.contains(&kind) {
                drop(state);
                self.insert(object);
                return Err(StoreError::AlreadyExists { kind, name });
            }
            state.created.push(kind);
        }
        self.insert(object.clone());
        Ok(object)
    }

    async fn list_builds(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<Build>, StoreError> {
        let (label, value) = label_selector.split_once('=').unwrap_or((label_selector, ""));
        let state = self.state.lock().unwrap();
        Ok(state
            .builds
            .iter()
            .filter(|b| b.metadata.namespace.as_deref() == Some(namespace))
            .filter(|b| {
                b.metadata
                    .labels
                    .as_ref()
                    .and_then(|l| l.get(label))
                    .is_some_and(|v| v == value)
            })
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct FakeCredentials {
    secrets: HashMap<(String, String), BTreeMap<String, Vec<u8>>>,
}

impl FakeCredentials {
    pub fn with_secret(
        mut self,
        namespace: &str,
        name: &str,
        data: BTreeMap<String, Vec<u8>>,
    ) -> Self {
        self.secrets
            .insert((namespace.to_string(), name.to_string()), data);
        self
    }
}

#[async_trait]
impl CredentialStore for FakeCredentials {
    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BTreeMap<String, Vec<u8>>>, StoreError> {
        Ok(self
            .secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }
}

/// Answers every probe the same way and records what it was asked
pub struct FakeProber {
    answer: Reachability,
    calls: AtomicUsize,
    last_credential: Mutex<Option<String>>,
}

impl FakeProber {
    fn answering(answer: Reachability) -> Self {
        Self {
            answer,
            calls: AtomicUsize::new(0),
            last_credential: Mutex::new(None),
        }
    }

    pub fn reachable() -> Self {
        Self::answering(Reachability {
            reachable: true,
            reason: ProbeReason::Succeeded,
        })
    }

    pub fn unreachable(reason: ProbeReason) -> Self {
        Self::answering(Reachability {
            reachable: false,
            reason,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_credential(&self) -> Option<String> {
        self.last_credential.lock().unwrap().clone()
    }
}

#[async_trait]
impl RepoProber for FakeProber {
    async fn probe(&self, _url: &str, _reference: &str, credential: Option<&str>) -> Reachability {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_credential.lock().unwrap() = credential.map(str::to_string);
        self.answer.clone()
    }
}

#![allow(clippy::disallowed_macros)]

//! End-to-end convergence scenarios driven through the public reconciler API
//! against an in-memory object store.

use app_controller::crds::{
    Build, BuildPhase, BuildSpec, BuildStatus, ConditionStatus, ConditionType, ConsoleApplication,
    ImageStream, ImageStreamSpec, ImageStreamStatus, NamedTagEventList, Reason,
};
use app_controller::tasks::store::{
    CredentialStore, ManagedObject, ObjectStore, ResourceKind, StoreError,
};
use app_controller::{AppKey, ControllerConfig, PassOutcome, Reconciler};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use k8s_openapi::api::apps::v1::{DeploymentCondition, DeploymentStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use scm::{
    GitReachabilityProber, HttpMetadataService, ProbeReason, Reachability, RepoProber,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tracing::info;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt::try_init();
    });
}

type ObjectKey = (ResourceKind, String, String);

#[derive(Default)]
struct Cluster {
    apps: HashMap<AppKey, ConsoleApplication>,
    objects: HashMap<ObjectKey, ManagedObject>,
    builds: Vec<Build>,
    creates: Vec<ResourceKind>,
    version: u64,
}

/// Object store backed by a map, recording every create in order
#[derive(Default)]
struct MemoryStore {
    cluster: Mutex<Cluster>,
}

impl MemoryStore {
    fn seeded(app: ConsoleApplication) -> Self {
        let store = Self::default();
        {
            let mut cluster = store.cluster.lock().unwrap();
            let mut stream = ImageStream::new("python", ImageStreamSpec::default());
            stream.metadata.namespace = Some("openshift".to_string());
            stream.status = Some(ImageStreamStatus {
                docker_image_repository: None,
                tags: vec![
                    NamedTagEventList {
                        tag: "3.11-ubi9".to_string(),
                    },
                    NamedTagEventList {
                        tag: "3.12-ubi9".to_string(),
                    },
                ],
            });
            cluster.objects.insert(
                (ResourceKind::ImageStream, "openshift".to_string(), "python".to_string()),
                stream.into(),
            );

            cluster.version = 1;
            let mut app = app;
            app.metadata.resource_version = Some("1".to_string());
            cluster.apps.insert(AppKey::from_resource(&app).unwrap(), app);
        }
        store
    }

    fn app(&self) -> ConsoleApplication {
        self.cluster.lock().unwrap().apps[&key()].clone()
    }

    fn condition(&self, condition_type: ConditionType) -> Option<(ConditionStatus, Reason)> {
        self.app()
            .status?
            .condition(condition_type)
            .map(|c| (c.status, c.reason))
    }

    fn creates(&self) -> Vec<ResourceKind> {
        self.cluster.lock().unwrap().creates.clone()
    }

    fn exists(&self, kind: ResourceKind) -> bool {
        self.cluster
            .lock()
            .unwrap()
            .objects
            .contains_key(&(kind, "team-a".to_string(), "inventory".to_string()))
    }

    fn start_build(&self, name: &str, created_secs: i64, phase: BuildPhase) {
        let mut build = Build::new(name, BuildSpec {});
        build.metadata.namespace = Some("team-a".to_string());
        build.metadata.labels = Some(BTreeMap::from([(
            "app".to_string(),
            "inventory".to_string(),
        )]));
        build.metadata.creation_timestamp =
            Some(Time(Utc.timestamp_opt(1_720_000_000 + created_secs, 0).unwrap()));
        build.status = Some(BuildStatus {
            phase,
            reason: Some("GenericBuildFailed".to_string()),
            message: None,
        });
        self.cluster.lock().unwrap().builds.push(build);
    }

    fn roll_out(&self, available: &str) {
        let key = (ResourceKind::Deployment, "team-a".to_string(), "inventory".to_string());
        let mut cluster = self.cluster.lock().unwrap();
        if let Some(ManagedObject::Deployment(deployment)) = cluster.objects.get_mut(&key) {
            deployment.status = Some(DeploymentStatus {
                conditions: Some(vec![
                    DeploymentCondition {
                        type_: "Progressing".to_string(),
                        status: "True".to_string(),
                        ..Default::default()
                    },
                    DeploymentCondition {
                        type_: "Available".to_string(),
                        status: available.to_string(),
                        ..Default::default()
                    },
                ]),
                ..Default::default()
            });
        }
    }

    fn admit_route(&self, host: &str) {
        let key = (ResourceKind::Route, "team-a".to_string(), "inventory".to_string());
        let mut cluster = self.cluster.lock().unwrap();
        if let Some(ManagedObject::Route(route)) = cluster.objects.get_mut(&key) {
            route.spec.host = Some(host.to_string());
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get_app(&self, key: &AppKey) -> Result<Option<ConsoleApplication>, StoreError> {
        Ok(self.cluster.lock().unwrap().apps.get(key).cloned())
    }

    async fn update_app_status(
        &self,
        app: &ConsoleApplication,
    ) -> Result<ConsoleApplication, StoreError> {
        let key = AppKey::from_resource(app).unwrap();
        let mut cluster = self.cluster.lock().unwrap();
        cluster.version += 1;
        let version = cluster.version.to_string();
        let stored = cluster
            .apps
            .get_mut(&key)
            .ok_or_else(|| StoreError::Conflict(key.to_string()))?;
        if stored.metadata.resource_version != app.metadata.resource_version {
            return Err(StoreError::Conflict(key.to_string()));
        }
        stored.status = app.status.clone();
        stored.metadata.resource_version = Some(version);
        Ok(stored.clone())
    }

    async fn get(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ManagedObject>, StoreError> {
        let key = (kind, namespace.to_string(), name.to_string());
        Ok(self.cluster.lock().unwrap().objects.get(&key).cloned())
    }

    async fn create(&self, object: ManagedObject) -> Result<ManagedObject, StoreError> {
        let key = (
            object.kind(),
            object.namespace().unwrap_or_default().to_string(),
            object.name().to_string(),
        );
        let mut cluster = self.cluster.lock().unwrap();
        if cluster.objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                kind: key.0,
                name: key.2,
            });
        }
        cluster.creates.push(object.kind());
        cluster.objects.insert(key, object.clone());
        Ok(object)
    }

    async fn list_builds(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<Build>, StoreError> {
        let (label, value) = label_selector.split_once('=').unwrap();
        Ok(self
            .cluster
            .lock()
            .unwrap()
            .builds
            .iter()
            .filter(|b| b.metadata.namespace.as_deref() == Some(namespace))
            .filter(|b| {
                b.metadata
                    .labels
                    .as_ref()
                    .is_some_and(|l| l.get(label).map(String::as_str) == Some(value))
            })
            .cloned()
            .collect())
    }
}

struct NoSecrets;

#[async_trait]
impl CredentialStore for NoSecrets {
    async fn get_secret(
        &self,
        _namespace: &str,
        _name: &str,
    ) -> Result<Option<BTreeMap<String, Vec<u8>>>, StoreError> {
        Ok(None)
    }
}

struct AlwaysReachable;

#[async_trait]
impl RepoProber for AlwaysReachable {
    async fn probe(&self, _url: &str, _reference: &str, _credential: Option<&str>) -> Reachability {
        Reachability {
            reachable: true,
            reason: ProbeReason::Succeeded,
        }
    }
}

fn key() -> AppKey {
    AppKey::new("team-a", "inventory")
}

fn application(manifest: &str) -> ConsoleApplication {
    let mut app: ConsoleApplication = serde_yaml::from_str(manifest).unwrap();
    app.metadata.uid = Some("6f1c2d9e-8a47-4c35-b0e2-91d4f7a3c5b8".to_string());
    app.metadata.generation = Some(1);
    app
}

fn builder_image_app() -> ConsoleApplication {
    application(
        r"
apiVersion: apps.console.dev/v1alpha1
kind: ConsoleApplication
metadata:
  name: inventory
  namespace: team-a
  labels:
    team: a
spec:
  applicationName: warehouse
  git:
    url: https://github.com/acme/inventory.git
    reference: release-1.4
  importStrategy: BuilderImage
  buildConfiguration:
    builderImage:
      image: python
      tag: 3.12-ubi9
    env:
      - name: PIP_INDEX_URL
        value: https://pypi.internal/simple
  deploymentConfiguration:
    replicas: 2
    expose:
      targetPort: 8000
      createRoute: true
",
    )
}

fn reconciler(store: &Arc<MemoryStore>, prober: Arc<dyn RepoProber>) -> Reconciler {
    Reconciler::new(
        store.clone(),
        Arc::new(NoSecrets),
        prober,
        Arc::new(ControllerConfig::default()),
    )
}

#[tokio::test]
async fn builder_image_application_converges_in_order() {
    init_tracing();
    let store = Arc::new(MemoryStore::seeded(builder_image_app()));
    let reconciler = reconciler(&store, Arc::new(AlwaysReachable));

    // pass 1: image stream and build config
    let outcome = reconciler.reconcile(&key()).await.unwrap();
    assert_eq!(outcome, PassOutcome::RequeueAfter(Duration::from_secs(3)));
    assert_eq!(
        store.creates(),
        vec![ResourceKind::ImageStream, ResourceKind::BuildConfig]
    );
    assert_eq!(
        store.condition(ConditionType::Progressing),
        Some((ConditionStatus::True, Reason::RequirementsBeingMet))
    );

    // build polling
    let outcome = reconciler.reconcile(&key()).await.unwrap();
    assert_eq!(outcome, PassOutcome::RequeueAfter(Duration::from_secs(30)));
    store.start_build("inventory-1", 0, BuildPhase::Running);
    reconciler.reconcile(&key()).await.unwrap();
    assert!(!store.exists(ResourceKind::Deployment));

    store.start_build("inventory-2", 120, BuildPhase::Complete);
    let outcome = reconciler.reconcile(&key()).await.unwrap();
    assert_eq!(outcome, PassOutcome::RequeueAfter(Duration::from_secs(3)));
    assert!(store.exists(ResourceKind::Deployment));
    assert!(!store.exists(ResourceKind::Service));

    // rollout polling
    let outcome = reconciler.reconcile(&key()).await.unwrap();
    assert_eq!(outcome, PassOutcome::RequeueAfter(Duration::from_secs(10)));
    store.roll_out("False");
    let outcome = reconciler.reconcile(&key()).await.unwrap();
    assert_eq!(outcome, PassOutcome::RequeueAfter(Duration::from_secs(10)));
    assert!(!store.exists(ResourceKind::Service));

    store.roll_out("True");
    reconciler.reconcile(&key()).await.unwrap();
    assert!(store.exists(ResourceKind::Service));
    assert!(!store.exists(ResourceKind::Route));

    reconciler.reconcile(&key()).await.unwrap();
    assert!(store.exists(ResourceKind::Route));
    store.admit_route("inventory-team-a.apps.example.com");

    let outcome = reconciler.reconcile(&key()).await.unwrap();
    info!(?outcome, "final pass");
    assert_eq!(outcome, PassOutcome::Done);
    assert_eq!(
        store.creates(),
        vec![
            ResourceKind::ImageStream,
            ResourceKind::BuildConfig,
            ResourceKind::Deployment,
            ResourceKind::Service,
            ResourceKind::Route,
        ]
    );
    assert_eq!(
        store.condition(ConditionType::Ready),
        Some((ConditionStatus::True, Reason::AllResourcesReady))
    );
    assert_eq!(
        store.condition(ConditionType::Progressing),
        Some((ConditionStatus::False, Reason::RequirementsMet))
    );
    assert_eq!(
        store.app().status.unwrap().application_url.as_deref(),
        Some("https://inventory-team-a.apps.example.com")
    );
}

#[tokio::test]
async fn converged_application_is_left_alone() {
    init_tracing();
    let store = Arc::new(MemoryStore::seeded(builder_image_app()));
    let reconciler = reconciler(&store, Arc::new(AlwaysReachable));

    reconciler.reconcile(&key()).await.unwrap();
    store.start_build("inventory-1", 0, BuildPhase::Complete);
    reconciler.reconcile(&key()).await.unwrap();
    reconciler.reconcile(&key()).await.unwrap();
    store.roll_out("True");
    for _ in 0..3 {
        reconciler.reconcile(&key()).await.unwrap();
    }
    assert_eq!(
        store.condition(ConditionType::Ready),
        Some((ConditionStatus::True, Reason::AllResourcesReady))
    );

    let settled = store.app();
    for _ in 0..5 {
        let outcome = reconciler.reconcile(&key()).await.unwrap();
        assert_eq!(outcome, PassOutcome::Done);
    }

    let after = store.app();
    assert_eq!(after.status, settled.status);
    assert_eq!(after.metadata.resource_version, settled.metadata.resource_version);
    assert_eq!(store.creates().len(), 5);
}

#[tokio::test]
async fn failed_build_creates_nothing_further() {
    init_tracing();
    let store = Arc::new(MemoryStore::seeded(builder_image_app()));
    let reconciler = reconciler(&store, Arc::new(AlwaysReachable));

    reconciler.reconcile(&key()).await.unwrap();
    store.start_build("inventory-1", 0, BuildPhase::Failed);

    let outcome = reconciler.reconcile(&key()).await.unwrap();
    assert_eq!(outcome, PassOutcome::Done);
    assert_eq!(
        store.condition(ConditionType::Ready),
        Some((ConditionStatus::False, Reason::BuildsFailed))
    );

    // terminal: further passes change nothing
    reconciler.reconcile(&key()).await.unwrap();
    assert_eq!(
        store.creates(),
        vec![ResourceKind::ImageStream, ResourceKind::BuildConfig]
    );
}

#[tokio::test]
async fn missing_source_secret_stops_before_probing() {
    init_tracing();
    let mut app = builder_image_app();
    app.spec.git.source_secret_ref = Some("inventory-git".to_string());
    let store = Arc::new(MemoryStore::seeded(app));
    let reconciler = reconciler(&store, Arc::new(AlwaysReachable));

    let outcome = reconciler.reconcile(&key()).await.unwrap();

    assert_eq!(outcome, PassOutcome::Done);
    assert_eq!(
        store.condition(ConditionType::Ready),
        Some((ConditionStatus::False, Reason::SecretResourceNotFound))
    );
    assert_eq!(store.condition(ConditionType::GitRepoReachable), None);
    assert!(store.creates().is_empty());
}

#[tokio::test]
async fn rejected_repository_urls_are_recorded() {
    init_tracing();
    let metadata = HttpMetadataService::new(
        "http://127.0.0.1:9",
        "http://127.0.0.1:9",
        Duration::from_secs(1),
    )
    .unwrap();
    let prober: Arc<dyn RepoProber> = Arc::new(GitReachabilityProber::new(metadata));

    for (url, reason) in [
        ("not a url", Reason::InvalidUrl),
        ("https://example.com/acme/inventory", Reason::UnsupportedHostType),
    ] {
        let mut app = builder_image_app();
        app.spec.git.url = url.to_string();
        let store = Arc::new(MemoryStore::seeded(app));
        let reconciler = reconciler(&store, prober.clone());

        let outcome = reconciler.reconcile(&key()).await.unwrap();

        assert_eq!(outcome, PassOutcome::Done, "{url}");
        assert_eq!(
            store.condition(ConditionType::GitRepoReachable),
            Some((ConditionStatus::False, reason)),
            "{url}"
        );
        assert_eq!(
            store.condition(ConditionType::Ready),
            Some((ConditionStatus::False, reason)),
            "{url}"
        );
        assert!(store.creates().is_empty());
    }
}

#[tokio::test]
async fn missing_repository_is_reported_from_the_hosting_api() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/inventory/branches/release-1.4"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let metadata =
        HttpMetadataService::new(server.uri(), server.uri(), Duration::from_secs(5)).unwrap();
    let store = Arc::new(MemoryStore::seeded(builder_image_app()));
    let reconciler = reconciler(&store, Arc::new(GitReachabilityProber::new(metadata)));

    reconciler.reconcile(&key()).await.unwrap();
    // the recorded answer is reused, so the API is hit once
    reconciler.reconcile(&key()).await.unwrap();

    assert_eq!(
        store.condition(ConditionType::GitRepoReachable),
        Some((ConditionStatus::False, Reason::RepoNotFound))
    );
    assert!(store.creates().is_empty());
}

use crate::crds::{BuildConfig, ConsoleApplication, ImageStream, Route};
use futures::{Stream, StreamExt};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::NamespaceResourceScope;
use kube::runtime::controller::Controller;
use kube::runtime::watcher::Config;
use kube::runtime::{predicates, reflector, watcher, WatchStreamExt};
use kube::{Api, Client, Resource};
use scm::{GitReachabilityProber, HttpMetadataService};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, Instrument};

pub mod app;
pub mod conditions;
pub mod config;
pub mod policy;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used items
pub use app::{GitCredential, Reconciler};
pub use config::ControllerConfig;
pub use policy::{PassOutcome, RequeuePolicy};
pub use store::{CredentialStore, KubeStore, ObjectStore};
pub use types::{AppKey, Error, Result};

// Context is crate-internal only
use app::{error_policy, reconcile_console_app};
use types::Context;

fn scoped_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = NamespaceResourceScope>,
    <K as Resource>::DynamicType: Default,
{
    match namespace {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    }
}

/// Drops `ConsoleApplication` events that leave `metadata.generation` untouched,
/// so the controller's own status writes do not start a new pass
fn spec_changes<S>(
    events: S,
) -> impl Stream<Item = std::result::Result<ConsoleApplication, watcher::Error>>
where
    S: Stream<Item = std::result::Result<ConsoleApplication, watcher::Error>>,
{
    events.predicate_filter(predicates::generation)
}

/// Main entry point for the `ConsoleApplication` controller
#[instrument(skip(client, config), fields(namespace = namespace.as_deref().unwrap_or("*")))]
pub async fn run_app_controller(
    client: Client,
    namespace: Option<String>,
    config: ControllerConfig,
) -> Result<()> {
    info!("Starting ConsoleApplication controller");

    if let Err(validation_error) = config.validate() {
        error!("Configuration validation failed: {}", validation_error);
        return Err(Error::ConfigError(validation_error.to_string()));
    }
    debug!("Configuration validation passed");

    let metadata = HttpMetadataService::new(
        &config.git.github_api_url,
        &config.git.gitlab_api_url,
        config.git.timeout(),
    )
    .map_err(|e| Error::ConfigError(format!("Failed to build Git hosting client: {e}")))?;
    let prober = Arc::new(GitReachabilityProber::new(metadata));

    let store = Arc::new(KubeStore::new(client.clone()));
    let config = Arc::new(config);
    let reconciler = Reconciler::new(store.clone(), store, prober, config);

    let context = Arc::new(Context {
        namespace: namespace.clone(),
        reconciler,
    });
    debug!("Controller context created successfully");

    let scope = namespace.as_deref();
    let watcher_config = Config::default().any_semantic();

    let (reader, writer) = reflector::store();
    let apps = spec_changes(
        watcher(
            scoped_api::<ConsoleApplication>(&client, scope),
            watcher_config.clone(),
        )
        .default_backoff()
        .reflect(writer)
        .applied_objects(),
    );

    Controller::for_stream(apps, reader)
    .owns(scoped_api::<ImageStream>(&client, scope), watcher_config.clone())
    .owns(scoped_api::<BuildConfig>(&client, scope), watcher_config.clone())
    .owns(scoped_api::<Deployment>(&client, scope), watcher_config.clone())
    .owns(scoped_api::<Service>(&client, scope), watcher_config.clone())
    .owns(scoped_api::<Route>(&client, scope), watcher_config)
    .run(reconcile_console_app, error_policy, context)
    .for_each(|reconciliation_result| {
        let span = tracing::info_span!("app_reconciliation_result");
        async move {
            match reconciliation_result {
                Ok(resource) => {
                    debug!(resource = ?resource, "ConsoleApplication reconciliation successful");
                }
                Err(reconciliation_err) => {
                    error!(
                        error = ?reconciliation_err,
                        "ConsoleApplication reconciliation error"
                    );
                }
            }
        }
        .instrument(span)
    })
    .await;

    info!("ConsoleApplication controller shutting down");
    Ok(())
}

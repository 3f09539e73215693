//! Convergence loop for a single `ConsoleApplication`.
//!
//! Every pass starts from the top and re-derives what to do from the stored
//! object and the current state of its resources. Progress is carried between
//! passes only through the persisted status.

use super::mapper::{RequiredResource, ResourceMapper};
use super::readiness::{self, Observed, Outcome};
use crate::crds::{
    Build, ConditionStatus, ConditionType, ConsoleApplication, ConsoleApplicationStatus, Reason,
};
use crate::tasks::conditions::StatusField;
use crate::tasks::config::ControllerConfig;
use crate::tasks::policy::{PassOutcome, RequeuePolicy};
use crate::tasks::store::{set_owner, CredentialStore, ManagedObject, ObjectStore, StoreError};
use crate::tasks::types::{AppKey, Error, Result};
use scm::RepoProber;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Access token read from the source Secret, held only for the current pass
pub struct GitCredential(String);

impl GitCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for GitCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("GitCredential(<redacted>)")
    }
}

/// Either carry on to the next step or end the pass with an outcome
type Step<T = ()> = ControlFlow<PassOutcome, T>;

/// Runs convergence passes against injected stores and prober
#[derive(Clone)]
pub struct Reconciler {
    objects: Arc<dyn ObjectStore>,
    credentials: Arc<dyn CredentialStore>,
    prober: Arc<dyn RepoProber>,
    config: Arc<ControllerConfig>,
    policy: RequeuePolicy,
}

impl Reconciler {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        credentials: Arc<dyn CredentialStore>,
        prober: Arc<dyn RepoProber>,
        config: Arc<ControllerConfig>,
    ) -> Self {
        let policy = RequeuePolicy::from_config(&config.requeue);
        Self {
            objects,
            credentials,
            prober,
            config,
            policy,
        }
    }

    pub fn policy(&self) -> &RequeuePolicy {
        &self.policy
    }

    /// Run one convergence pass for the application at `key`
    #[instrument(skip(self), fields(application = %key.name, namespace = %key.namespace))]
    pub async fn reconcile(&self, key: &AppKey) -> Result<PassOutcome> {
        let Some(app) = self.objects.get_app(key).await? else {
            info!("ConsoleApplication no longer exists, nothing to do");
            return Ok(PassOutcome::Done);
        };

        let pass = Pass {
            reconciler: self,
            key,
            app,
            dirty: false,
        };

        match pass.run().await {
            Err(Error::ObjectDeleted(_)) => {
                info!("ConsoleApplication was deleted during the pass, abandoning it");
                Ok(PassOutcome::Done)
            }
            Err(Error::SpecChanged(_)) => {
                info!("ConsoleApplication spec changed during the pass, starting over");
                Ok(PassOutcome::RequeueNow)
            }
            result => result,
        }
    }
}

/// State of one pass: the fetched object and whether its status has unsaved changes
struct Pass<'a> {
    reconciler: &'a Reconciler,
    key: &'a AppKey,
    app: ConsoleApplication,
    dirty: bool,
}

impl Pass<'_> {
    fn status(&self) -> Option<&ConsoleApplicationStatus> {
        self.app.status.as_ref()
    }

    fn status_mut(&mut self) -> &mut ConsoleApplicationStatus {
        self.app.status.get_or_insert_with(Default::default)
    }

    fn set_condition(
        &mut self,
        condition_type: ConditionType,
        status: ConditionStatus,
        reason: Reason,
        message: impl Into<String>,
    ) {
        let changed = self
            .status_mut()
            .set_condition(condition_type, status, reason, message);
        self.dirty |= changed;
    }

    async fn run(mut self) -> Result<PassOutcome> {
        // Init
        if self.status().map_or(true, |s| s.conditions.is_empty()) {
            let changed = self.status_mut().mark_started();
            self.dirty |= changed;
            self.persist().await?;
        }

        let credential = match self.resolve_credential().await? {
            ControlFlow::Continue(credential) => credential,
            ControlFlow::Break(outcome) => return Ok(outcome),
        };

        if let ControlFlow::Break(outcome) = self.check_git(credential.as_ref()).await? {
            return Ok(outcome);
        }
        drop(credential);

        // the mapper reads the spec while the pass keeps writing status
        let app = self.app.clone();
        let key = self.key;
        let config = Arc::clone(&self.reconciler.config);
        let mapper = ResourceMapper::new(&app, &key.namespace, &config);

        if let ControlFlow::Break(outcome) = self.check_prerequisites(&mapper).await? {
            return Ok(outcome);
        }

        let required = match mapper.map_resources() {
            Ok(required) => required,
            Err(e) => return self.fail(Reason::RequirementsNotMet, e.to_string()).await,
        };

        for resource in &required {
            if let ControlFlow::Break(outcome) = self.converge(resource, &mapper).await? {
                return Ok(outcome);
            }
        }

        let changed = self.status_mut().mark_succeeded();
        self.dirty |= changed;
        if changed {
            info!("All resources are ready");
        }
        self.persist().await?;
        Ok(PassOutcome::Done)
    }

    async fn resolve_credential(&mut self) -> Result<Step<Option<GitCredential>>> {
        let Some(secret_name) = self.app.spec.git.secret_ref().map(str::to_string) else {
            return Ok(ControlFlow::Continue(None));
        };

        let data = self
            .reconciler
            .credentials
            .get_secret(&self.key.namespace, &secret_name)
            .await?;
        let Some(data) = data else {
            warn!(secret = %secret_name, "Source secret not found");
            return self
                .fail(
                    Reason::SecretResourceNotFound,
                    format!("Secret {secret_name} not found"),
                )
                .await
                .map(ControlFlow::Break);
        };

        let secret_key = &self.reconciler.config.git.secret_key;
        let credential = match data.get(secret_key).map(|v| String::from_utf8(v.clone())) {
            Some(Ok(token)) if !token.trim().is_empty() => {
                Some(GitCredential::new(token.trim()))
            }
            Some(Err(_)) => {
                warn!(secret = %secret_name, key = %secret_key, "Secret value is not valid UTF-8, probing without a credential");
                None
            }
            _ => {
                warn!(secret = %secret_name, key = %secret_key, "Secret has no value under the configured key, probing without a credential");
                None
            }
        };
        Ok(ControlFlow::Continue(credential))
    }

    async fn check_git(&mut self, credential: Option<&GitCredential>) -> Result<Step> {
        let generation = self.app.metadata.generation;
        let recorded = self
            .status()
            .and_then(|s| s.condition(ConditionType::GitRepoReachable))
            .filter(|c| {
                !self.reconciler.config.git.recheck_every_pass
                    && c.observed_generation == generation
            })
            .map(|c| (c.status == ConditionStatus::True, c.reason));

        let (reachable, reason) = match recorded {
            Some(recorded) => {
                debug!("Reusing recorded repository reachability");
                recorded
            }
            None => {
                let git = &self.app.spec.git;
                let probe = self
                    .reconciler
                    .prober
                    .probe(&git.url, &git.reference, credential.map(GitCredential::expose))
                    .await;

                let reason = Reason::from(probe.reason);
                let status = ConditionStatus::from_bool(probe.reachable);
                self.set_condition(
                    ConditionType::GitRepoReachable,
                    status,
                    reason,
                    format!("Git Repository Reachable: {status}"),
                );
                let stamped = self
                    .status_mut()
                    .set_observed_generation(ConditionType::GitRepoReachable, generation);
                self.dirty |= stamped;
                self.persist().await?;
                (probe.reachable, reason)
            }
        };

        if reachable {
            return Ok(ControlFlow::Continue(()));
        }
        let url = self.app.spec.git.url.clone();
        self.fail(reason, format!("Git repository {url} is not reachable: {reason}"))
            .await
            .map(ControlFlow::Break)
    }

    async fn check_prerequisites(&mut self, mapper: &ResourceMapper<'_>) -> Result<Step> {
        if let Err(e) = mapper.sanity_check() {
            return self
                .fail(Reason::RequirementsNotMet, e.to_string())
                .await
                .map(ControlFlow::Break);
        }

        for prerequisite in mapper.required_prerequisites() {
            let (kind, namespace, name) = prerequisite.lookup();
            let found = self.reconciler.objects.get(kind, namespace, name).await?;
            if let Err((reason, message)) = prerequisite.evaluate(found.as_ref()) {
                return self
                    .fail(reason, message)
                    .await
                    .map(ControlFlow::Break);
            }
        }

        Ok(ControlFlow::Continue(()))
    }

    /// Create the resource if absent, otherwise classify it and record the result
    async fn converge(
        &mut self,
        required: &RequiredResource,
        mapper: &ResourceMapper<'_>,
    ) -> Result<Step> {
        let namespace = mapper.resources().namespace().to_string();
        let existing = self
            .reconciler
            .objects
            .get(required.kind, &namespace, required.name())
            .await?;
        let Some(existing) = existing else {
            return self.create(required).await;
        };

        let builds: Vec<Build>;
        let observed = match &existing {
            ManagedObject::BuildConfig(_) => {
                builds = self
                    .reconciler
                    .objects
                    .list_builds(&namespace, &mapper.resources().selector())
                    .await?;
                Observed::Builds(&builds)
            }
            ManagedObject::Deployment(deployment) => Observed::Workload(deployment),
            object => Observed::Present(object),
        };
        let readiness = readiness::classify(&observed, required);
        debug!(kind = %required.kind, outcome = ?readiness.outcome, message = %readiness.message, "Classified resource");

        match readiness.outcome {
            Outcome::Ready => {
                if let Some(reason) = readiness.reason {
                    self.set_condition(
                        required.condition_type,
                        ConditionStatus::True,
                        reason,
                        readiness.message,
                    );
                }
                if let ManagedObject::Route(route) = &existing {
                    if let Some(url) = route.url() {
                        let changed = self.status_mut().set_field(StatusField::ApplicationUrl(url));
                        self.dirty |= changed;
                    }
                }
                self.persist().await?;
                Ok(ControlFlow::Continue(()))
            }
            Outcome::NotReadyRetryable => {
                if let Some(reason) = readiness.reason {
                    self.set_condition(
                        required.condition_type,
                        ConditionStatus::Unknown,
                        reason,
                        readiness.message,
                    );
                }
                self.persist().await?;
                Ok(ControlFlow::Break(self.reconciler.policy.poll(required.kind)))
            }
            Outcome::Failed => {
                let reason = readiness.reason.unwrap_or(required.create_failed_reason);
                self.set_condition(
                    required.condition_type,
                    ConditionStatus::False,
                    reason,
                    readiness.message.clone(),
                );
                self.fail(reason, readiness.message)
                    .await
                    .map(ControlFlow::Break)
            }
        }
    }

    async fn create(&mut self, required: &RequiredResource) -> Result<Step> {
        let mut object = required.object.clone();
        set_owner(object.meta_mut(), &self.app);

        match self.reconciler.objects.create(object).await {
            Ok(created) => {
                info!(kind = %required.kind, name = %created.name(), "Created resource");
            }
            Err(StoreError::AlreadyExists { kind, name }) => {
                info!(%kind, %name, "Resource already exists, treating it as created");
            }
            Err(StoreError::Rejected { kind, name, message }) => {
                warn!(%kind, %name, %message, "Resource creation rejected");
                self.set_condition(
                    required.condition_type,
                    ConditionStatus::False,
                    required.create_failed_reason,
                    message.clone(),
                );
                return self
                    .fail(required.create_failed_reason, message)
                    .await
                    .map(ControlFlow::Break);
            }
            Err(e) => return Err(e.into()),
        }

        let Some(reason) = required.created_reason else {
            return Ok(ControlFlow::Continue(()));
        };
        self.set_condition(
            required.condition_type,
            ConditionStatus::Unknown,
            reason,
            format!("{} {} created", required.kind, required.name()),
        );
        self.persist().await?;
        Ok(ControlFlow::Break(self.reconciler.policy.after_create()))
    }

    /// Terminal failure: record it and wait for an external change
    async fn fail(&mut self, reason: Reason, message: impl Into<String>) -> Result<PassOutcome> {
        let message = message.into();
        warn!(%reason, %message, "ConsoleApplication requirements not met");
        let changed = self.status_mut().mark_failed(reason, message);
        self.dirty |= changed;
        self.persist().await?;
        Ok(PassOutcome::Done)
    }

    /// Write status if it changed, retrying optimistic-concurrency conflicts
    async fn persist(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        let retries = self.reconciler.config.status_update_retries;
        let mut attempt = 0;
        loop {
            match self.reconciler.objects.update_app_status(&self.app).await {
                Ok(updated) => {
                    self.app.metadata.resource_version = updated.metadata.resource_version;
                    self.dirty = false;
                    return Ok(());
                }
                Err(StoreError::Conflict(_)) if attempt < retries => {
                    attempt += 1;
                    debug!(attempt, "Status update conflicted, re-fetching");
                    let Some(latest) = self.reconciler.objects.get_app(self.key).await? else {
                        return Err(Error::ObjectDeleted(self.key.clone()));
                    };
                    if latest.metadata.generation != self.app.metadata.generation {
                        return Err(Error::SpecChanged(self.key.clone()));
                    }
                    self.app.metadata.resource_version = latest.metadata.resource_version;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

//! Maps a `ConsoleApplication` spec onto the ordered list of resources it needs.

use super::resources::AppResources;
use crate::crds::{BuildOption, ConditionType, ConsoleApplication, ImportStrategy, Reason};
use crate::tasks::config::ControllerConfig;
use crate::tasks::store::{ManagedObject, ResourceKind};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapperError {
    #[error("{0}")]
    RequirementsNotMet(String),
}

/// A gate that must pass before anything is created
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prerequisite {
    /// `{image}:{tag}` must exist as an ImageStreamTag in `namespace`
    BuilderImageTag {
        namespace: String,
        image: String,
        tag: String,
    },
}

impl Prerequisite {
    /// The object to fetch to evaluate this gate
    pub fn lookup(&self) -> (ResourceKind, &str, &str) {
        match self {
            Prerequisite::BuilderImageTag {
                namespace, image, ..
            } => (ResourceKind::ImageStream, namespace, image),
        }
    }

    /// Evaluate against the fetched object, returning the failure reason and message
    pub fn evaluate(&self, found: Option<&ManagedObject>) -> Result<(), (Reason, String)> {
        match self {
            Prerequisite::BuilderImageTag {
                namespace,
                image,
                tag,
            } => match found {
                Some(ManagedObject::ImageStream(stream)) if stream.has_tag(tag) => Ok(()),
                Some(ManagedObject::ImageStream(_)) => Err((
                    Reason::ImageStreamNotFound,
                    format!("ImageStreamTag {namespace}/{image}:{tag} not found"),
                )),
                _ => Err((
                    Reason::ImageStreamNotFound,
                    format!("ImageStream {namespace}/{image} not found"),
                )),
            },
        }
    }
}

/// One resource the application needs, with the status vocabulary for it
#[derive(Debug, Clone)]
pub struct RequiredResource {
    pub kind: ResourceKind,
    pub object: ManagedObject,
    pub condition_type: ConditionType,
    pub create_failed_reason: Reason,
    /// Transitional reason after a create; `None` continues in the same pass
    pub created_reason: Option<Reason>,
    /// `None` leaves the condition alone while the resource is healthy
    pub not_ready_reason: Option<Reason>,
    pub ready_reason: Option<Reason>,
}

impl RequiredResource {
    pub fn name(&self) -> &str {
        self.object.name()
    }
}

pub struct ResourceMapper<'a> {
    app: &'a ConsoleApplication,
    config: &'a ControllerConfig,
    resources: AppResources<'a>,
}

impl<'a> ResourceMapper<'a> {
    pub fn new(app: &'a ConsoleApplication, namespace: &str, config: &'a ControllerConfig) -> Self {
        Self {
            app,
            config,
            resources: AppResources::new(app, namespace, config),
        }
    }

    pub fn resources(&self) -> &AppResources<'a> {
        &self.resources
    }

    fn uses_build_config(&self) -> bool {
        let build = &self.app.spec.build_configuration;
        self.app.spec.import_strategy == ImportStrategy::BuilderImage
            && build.build_option == BuildOption::BuildConfig
    }

    pub fn sanity_check(&self) -> Result<(), MapperError> {
        let spec = &self.app.spec;
        if spec.import_strategy == ImportStrategy::BuilderImage {
            let builder = &spec.build_configuration.builder_image;
            if builder.image.trim().is_empty() || builder.tag.trim().is_empty() {
                return Err(MapperError::RequirementsNotMet(
                    "Builder image and tag are required for the BuilderImage import strategy"
                        .to_string(),
                ));
            }
        }

        let port = spec.deployment_configuration.expose.target_port;
        if !(1..=65535).contains(&port) {
            return Err(MapperError::RequirementsNotMet(format!(
                "Target port {port} is out of range"
            )));
        }

        if spec.deployment_configuration.replicas.is_some_and(|r| r < 0) {
            return Err(MapperError::RequirementsNotMet(
                "Replicas must not be negative".to_string(),
            ));
        }

        Ok(())
    }

    pub fn required_prerequisites(&self) -> Vec<Prerequisite> {
        if self.app.spec.import_strategy != ImportStrategy::BuilderImage {
            return Vec::new();
        }
        let builder = &self.app.spec.build_configuration.builder_image;
        vec![Prerequisite::BuilderImageTag {
            namespace: self.config.builder_image_namespace.clone(),
            image: builder.image.clone(),
            tag: builder.tag.clone(),
        }]
    }

    /// Resources in creation order
    pub fn map_resources(&self) -> Result<Vec<RequiredResource>, MapperError> {
        self.sanity_check()?;

        let mut required = vec![RequiredResource {
            kind: ResourceKind::ImageStream,
            object: self.resources.image_stream().into(),
            condition_type: ConditionType::BuildReady,
            create_failed_reason: Reason::ImageStreamCreationFailed,
            created_reason: None,
            not_ready_reason: None,
            ready_reason: None,
        }];

        if self.uses_build_config() {
            required.push(RequiredResource {
                kind: ResourceKind::BuildConfig,
                object: self.resources.build_config().into(),
                condition_type: ConditionType::BuildReady,
                create_failed_reason: Reason::BuildConfigCreationFailed,
                created_reason: Some(Reason::BuildConfigCreated),
                not_ready_reason: Some(Reason::BuildInProgress),
                ready_reason: Some(Reason::BuildCompleted),
            });
        }

        required.push(RequiredResource {
            kind: ResourceKind::Deployment,
            object: self.resources.deployment().into(),
            condition_type: ConditionType::WorkloadReady,
            create_failed_reason: Reason::WorkloadCreationFailed,
            created_reason: Some(Reason::WorkloadNotReady),
            not_ready_reason: Some(Reason::WorkloadNotReady),
            ready_reason: Some(Reason::WorkloadReady),
        });

        required.push(RequiredResource {
            kind: ResourceKind::Service,
            object: self.resources.service().into(),
            condition_type: ConditionType::ServiceReady,
            create_failed_reason: Reason::ServiceCreationFailed,
            created_reason: Some(Reason::ServiceNotReady),
            not_ready_reason: Some(Reason::ServiceNotReady),
            ready_reason: Some(Reason::ServiceReady),
        });

        if self.app.spec.deployment_configuration.expose.create_route {
            required.push(RequiredResource {
                kind: ResourceKind::Route,
                object: self.resources.route().into(),
                condition_type: ConditionType::RouteReady,
                create_failed_reason: Reason::RouteCreationFailed,
                created_reason: Some(Reason::RouteNotReady),
                not_ready_reason: Some(Reason::RouteNotReady),
                ready_reason: Some(Reason::RouteReady),
            });
        }

        Ok(required)
    }
}

//! Desired manifests for the resources owned by a `ConsoleApplication`.

use crate::crds::{
    BuildConfig, BuildConfigSpec, BuildOutput, BuildSource, BuildStrategy, BuildTriggerPolicy,
    ConsoleApplication, GitBuildSource, ImageChangeTrigger, ImageStream, ImageStreamSpec,
    LocalObjectReference, ObjectReference, Route, RoutePort, RouteSpec, RouteTargetReference,
    SourceBuildStrategy, TlsConfig, WebHookTrigger,
};
use crate::tasks::config::ControllerConfig;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, PodSpec, PodTemplateSpec, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;
use std::collections::BTreeMap;

pub const MANAGED_BY: &str = "console-application-operator";

const LABEL_APP: &str = "app";
const LABEL_NAME: &str = "app.kubernetes.io/name";
const LABEL_INSTANCE: &str = "app.kubernetes.io/instance";
const LABEL_COMPONENT: &str = "app.kubernetes.io/component";
const LABEL_PART_OF: &str = "app.kubernetes.io/part-of";
const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

const ANNOTATION_VCS_URI: &str = "app.openshift.io/vcs-uri";
const ANNOTATION_VCS_REF: &str = "app.openshift.io/vcs-ref";
const ANNOTATION_RESOLVE_NAMES: &str = "alpha.image.policy.openshift.io/resolve-names";
const ANNOTATION_IMAGE_TRIGGERS: &str = "image.openshift.io/triggers";
const ANNOTATION_HOST_GENERATED: &str = "openshift.io/host.generated";

/// Builds the manifests for one application
pub struct AppResources<'a> {
    app: &'a ConsoleApplication,
    config: &'a ControllerConfig,
    name: String,
    namespace: String,
}

impl<'a> AppResources<'a> {
    pub fn new(app: &'a ConsoleApplication, namespace: &str, config: &'a ControllerConfig) -> Self {
        Self {
            app,
            config,
            name: app.name_any(),
            namespace: namespace.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Selector matching the pods and builds of this application
    pub fn selector(&self) -> String {
        format!("{LABEL_APP}={}", self.name)
    }

    fn labels(&self) -> BTreeMap<String, String> {
        let mut labels = self.app.labels().clone();
        for (key, value) in [
            (LABEL_APP, self.name.as_str()),
            (LABEL_NAME, self.name.as_str()),
            (LABEL_INSTANCE, self.name.as_str()),
            (LABEL_COMPONENT, self.name.as_str()),
            (LABEL_PART_OF, self.app.spec.application_name.as_str()),
            (LABEL_MANAGED_BY, MANAGED_BY),
        ] {
            labels.insert(key.to_string(), value.to_string());
        }
        labels
    }

    fn annotations(&self, extra: &[(&str, String)]) -> BTreeMap<String, String> {
        let mut annotations = self.app.annotations().clone();
        // the last-applied annotation describes the ConsoleApplication, not us
        annotations.remove("kubectl.kubernetes.io/last-applied-configuration");
        annotations.insert(ANNOTATION_VCS_URI.to_string(), self.app.spec.git.url.clone());
        annotations.insert(
            ANNOTATION_VCS_REF.to_string(),
            self.app.spec.git.reference.clone(),
        );
        for (key, value) in extra {
            annotations.insert((*key).to_string(), value.clone());
        }
        annotations
    }

    fn metadata(&self, extra_annotations: &[(&str, String)]) -> ObjectMeta {
        ObjectMeta {
            name: Some(self.name.clone()),
            namespace: Some(self.namespace.clone()),
            labels: Some(self.labels()),
            annotations: Some(self.annotations(extra_annotations)),
            ..Default::default()
        }
    }

    fn target_port(&self) -> i32 {
        self.app.spec.deployment_configuration.expose.target_port
    }

    fn port_name(&self) -> String {
        format!("{}-tcp", self.target_port())
    }

    /// `{name}:latest`, the tag builds push to and the Deployment runs
    fn output_tag(&self) -> String {
        format!("{}:latest", self.name)
    }

    pub fn image_stream(&self) -> ImageStream {
        let mut stream = ImageStream::new(&self.name, ImageStreamSpec::default());
        stream.metadata = self.metadata(&[]);
        stream
    }

    pub fn build_config(&self) -> BuildConfig {
        let git = &self.app.spec.git;
        let build = &self.app.spec.build_configuration;

        let spec = BuildConfigSpec {
            source: BuildSource {
                source_type: "Git".to_string(),
                git: Some(GitBuildSource {
                    uri: git.url.clone(),
                    reference: Some(git.reference.clone()),
                }),
                context_dir: Some(git.context_dir.clone()),
                source_secret: git.secret_ref().map(|name| LocalObjectReference {
                    name: name.to_string(),
                }),
            },
            strategy: BuildStrategy {
                strategy_type: "Source".to_string(),
                source_strategy: Some(SourceBuildStrategy {
                    from: ObjectReference::image_stream_tag(
                        format!("{}:{}", build.builder_image.image, build.builder_image.tag),
                        Some(self.config.builder_image_namespace.clone()),
                    ),
                    env: build.env.iter().map(EnvVar::from).collect(),
                }),
            },
            output: BuildOutput {
                to: Some(ObjectReference::image_stream_tag(self.output_tag(), None)),
            },
            triggers: vec![
                BuildTriggerPolicy {
                    trigger_type: "ConfigChange".to_string(),
                    image_change: None,
                    generic: None,
                },
                BuildTriggerPolicy {
                    trigger_type: "ImageChange".to_string(),
                    image_change: Some(ImageChangeTrigger::default()),
                    generic: None,
                },
                BuildTriggerPolicy {
                    trigger_type: "Generic".to_string(),
                    image_change: None,
                    generic: Some(WebHookTrigger {
                        secret: format!("{}-generic-webhook-secret", self.name),
                    }),
                },
            ],
        };

        let mut build_config = BuildConfig::new(&self.name, spec);
        build_config.metadata = self.metadata(&[]);
        build_config
    }

    pub fn deployment(&self) -> Deployment {
        let deployment = &self.app.spec.deployment_configuration;
        let image = format!(
            "{}/{}/{}",
            self.config.image_registry,
            self.namespace,
            self.output_tag()
        );
        let triggers = format!(
            r#"[{{"from":{{"kind":"ImageStreamTag","name":"{}","namespace":"{}"}},"fieldPath":"spec.template.spec.containers[?(@.name==\"{}\")].image","pause":"false"}}]"#,
            self.output_tag(),
            self.namespace,
            self.name
        );

        let mut pod_labels = self.app.labels().clone();
        pod_labels.insert(LABEL_APP.to_string(), self.name.clone());

        Deployment {
            metadata: self.metadata(&[
                (ANNOTATION_RESOLVE_NAMES, "*".to_string()),
                (ANNOTATION_IMAGE_TRIGGERS, triggers),
            ]),
            spec: Some(DeploymentSpec {
                replicas: Some(deployment.replicas.unwrap_or(1)),
                selector: LabelSelector {
                    match_labels: Some(BTreeMap::from([(
                        LABEL_APP.to_string(),
                        self.name.clone(),
                    )])),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(pod_labels),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        containers: vec![Container {
                            name: self.name.clone(),
                            image: Some(image),
                            env: Some(deployment.env.iter().map(EnvVar::from).collect()),
                            ports: Some(vec![ContainerPort {
                                container_port: self.target_port(),
                                protocol: Some("TCP".to_string()),
                                ..Default::default()
                            }]),
                            ..Default::default()
                        }],
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn service(&self) -> Service {
        Service {
            metadata: self.metadata(&[]),
            spec: Some(ServiceSpec {
                selector: Some(BTreeMap::from([(
                    LABEL_APP.to_string(),
                    self.name.clone(),
                )])),
                ports: Some(vec![ServicePort {
                    name: Some(self.port_name()),
                    port: self.target_port(),
                    target_port: Some(IntOrString::Int(self.target_port())),
                    protocol: Some("TCP".to_string()),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn route(&self) -> Route {
        let spec = RouteSpec {
            host: None,
            to: RouteTargetReference {
                kind: "Service".to_string(),
                name: self.name.clone(),
                weight: None,
            },
            port: Some(RoutePort {
                target_port: IntOrString::String(self.port_name()),
            }),
            tls: Some(TlsConfig {
                termination: "edge".to_string(),
                insecure_edge_termination_policy: Some("Redirect".to_string()),
            }),
            wildcard_policy: Some("None".to_string()),
        };

        let mut route = Route::new(&self.name, spec);
        route.metadata = self.metadata(&[(ANNOTATION_HOST_GENERATED, "true".to_string())]);
        route
    }
}

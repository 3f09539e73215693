//! `ConsoleApplication` Custom Resource Definition

use super::condition::{known_conditions, AppCondition};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

fn default_application_name() -> String {
    "console-application".to_string()
}

fn default_context_dir() -> String {
    "/".to_string()
}

fn default_reference() -> String {
    "main".to_string()
}

fn default_target_port() -> i32 {
    8080
}

fn default_create_route() -> bool {
    true
}

/// Environment variable passed to a build or to the running workload
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Eq)]
pub struct EnvVar {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl From<&EnvVar> for k8s_openapi::api::core::v1::EnvVar {
    fn from(env: &EnvVar) -> Self {
        k8s_openapi::api::core::v1::EnvVar {
            name: env.name.clone(),
            value: env.value.clone(),
            ..Default::default()
        }
    }
}

/// Source repository of the application
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema)]
pub struct GitSource {
    /// Repository URL (GitHub or GitLab)
    pub url: String,

    /// Subdirectory of the repository to build from
    #[serde(default = "default_context_dir", rename = "contextDir")]
    pub context_dir: String,

    /// Branch to build
    #[serde(default = "default_reference")]
    pub reference: String,

    /// Name of a Secret in the same namespace holding the access token
    #[serde(default, rename = "sourceSecretRef", skip_serializing_if = "Option::is_none")]
    pub source_secret_ref: Option<String>,
}

impl GitSource {
    /// Secret reference, ignoring an empty string
    pub fn secret_ref(&self) -> Option<&str> {
        self.source_secret_ref.as_deref().filter(|s| !s.is_empty())
    }
}

/// How the application image is produced
#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq)]
pub enum ImportStrategy {
    BuilderImage,
    Dockerfile,
}

/// Mechanism used to run builds
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, JsonSchema, PartialEq, Eq)]
pub enum BuildOption {
    #[default]
    BuildConfig,
}

/// Builder image reference, an `ImageStreamTag` in the builder image namespace
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
pub struct BuilderImage {
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub tag: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
pub struct BuildConfiguration {
    #[serde(default, rename = "builderImage")]
    pub builder_image: BuilderImage,

    #[serde(default, rename = "buildOption")]
    pub build_option: BuildOption,

    /// Environment passed to builds
    #[serde(default)]
    pub env: Vec<EnvVar>,
}

/// Kind of workload to run
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, JsonSchema, PartialEq, Eq)]
pub enum ResourceType {
    #[default]
    Deployment,
}

/// Network exposure of the workload
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema)]
pub struct Expose {
    /// Container port, also used for the Service and Route
    #[serde(default = "default_target_port", rename = "targetPort")]
    pub target_port: i32,

    /// Whether to create a Route for external access
    #[serde(default = "default_create_route", rename = "createRoute")]
    pub create_route: bool,
}

impl Default for Expose {
    fn default() -> Self {
        Self {
            target_port: default_target_port(),
            create_route: default_create_route(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
pub struct DeploymentConfiguration {
    #[serde(default, rename = "resourceType")]
    pub resource_type: ResourceType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// Environment of the running container
    #[serde(default)]
    pub env: Vec<EnvVar>,

    #[serde(default)]
    pub expose: Expose,
}

/// `ConsoleApplication` CRD: a Git repository imported into a running, routed workload
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(group = "apps.console.dev", version = "v1alpha1", kind = "ConsoleApplication")]
#[kube(namespaced)]
#[kube(status = "ConsoleApplicationStatus")]
#[kube(shortname = "capp")]
#[kube(
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[kube(
    printcolumn = r#"{"name":"Reason","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].reason"}"#
)]
#[kube(printcolumn = r#"{"name":"URL","type":"string","jsonPath":".status.applicationURL"}"#)]
#[kube(printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#)]
pub struct ConsoleApplicationSpec {
    /// Groups the created resources (`app.kubernetes.io/part-of`)
    #[serde(default = "default_application_name", rename = "applicationName")]
    pub application_name: String,

    pub git: GitSource,

    #[serde(rename = "importStrategy")]
    pub import_strategy: ImportStrategy,

    #[serde(default, rename = "buildConfiguration")]
    pub build_configuration: BuildConfiguration,

    #[serde(default, rename = "deploymentConfiguration")]
    pub deployment_configuration: DeploymentConfiguration,
}

/// Status of the `ConsoleApplication`
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
pub struct ConsoleApplicationStatus {
    /// At most one entry per condition type, in insertion order
    #[serde(default, deserialize_with = "known_conditions")]
    pub conditions: Vec<AppCondition>,

    /// External URL, set once the Route has a host
    #[serde(
        default,
        rename = "applicationURL",
        skip_serializing_if = "Option::is_none"
    )]
    pub application_url: Option<String>,
}

//! Typed views of the OpenShift kinds the controller creates and observes.
//!
//! Only the fields the controller reads or writes are modelled. The CRDs are
//! owned by the platform, so no schema is generated for them.

use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// Reference to another object, as used by builds and image streams
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ObjectReference {
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ObjectReference {
    pub fn image_stream_tag(name: impl Into<String>, namespace: Option<String>) -> Self {
        Self {
            kind: "ImageStreamTag".to_string(),
            name: name.into(),
            namespace,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct LocalObjectReference {
    pub name: String,
}

// --- image.openshift.io/v1 ---

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default)]
#[kube(group = "image.openshift.io", version = "v1", kind = "ImageStream")]
#[kube(namespaced, schema = "disabled")]
#[kube(status = "ImageStreamStatus")]
#[serde(rename_all = "camelCase")]
pub struct ImageStreamSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_policy: Option<ImageLookupPolicy>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct ImageLookupPolicy {
    #[serde(default)]
    pub local: bool,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ImageStreamStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_image_repository: Option<String>,
    #[serde(default)]
    pub tags: Vec<NamedTagEventList>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct NamedTagEventList {
    pub tag: String,
}

impl ImageStream {
    /// Whether the stream has imported or built `tag`
    pub fn has_tag(&self, tag: &str) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| s.tags.iter().any(|t| t.tag == tag))
    }
}

// --- build.openshift.io/v1 ---

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug)]
#[kube(group = "build.openshift.io", version = "v1", kind = "BuildConfig")]
#[kube(namespaced, schema = "disabled")]
#[serde(rename_all = "camelCase")]
pub struct BuildConfigSpec {
    pub source: BuildSource,
    pub strategy: BuildStrategy,
    pub output: BuildOutput,
    #[serde(default)]
    pub triggers: Vec<BuildTriggerPolicy>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BuildSource {
    #[serde(rename = "type")]
    pub source_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitBuildSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_secret: Option<LocalObjectReference>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct GitBuildSource {
    pub uri: String,
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BuildStrategy {
    #[serde(rename = "type")]
    pub strategy_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_strategy: Option<SourceBuildStrategy>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct SourceBuildStrategy {
    pub from: ObjectReference,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<k8s_openapi::api::core::v1::EnvVar>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct BuildOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<ObjectReference>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BuildTriggerPolicy {
    #[serde(rename = "type")]
    pub trigger_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_change: Option<ImageChangeTrigger>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generic: Option<WebHookTrigger>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct ImageChangeTrigger {}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct WebHookTrigger {
    pub secret: String,
}

/// A single build run. Read only: builds are started by the platform.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default)]
#[kube(group = "build.openshift.io", version = "v1", kind = "Build")]
#[kube(namespaced, schema = "disabled")]
#[kube(status = "BuildStatus")]
pub struct BuildSpec {}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct BuildStatus {
    #[serde(default)]
    pub phase: BuildPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BuildPhase {
    #[default]
    New,
    Pending,
    Running,
    Complete,
    Failed,
    Error,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl BuildPhase {
    /// The build has not reached a terminal phase yet
    pub fn is_active(self) -> bool {
        matches!(self, BuildPhase::New | BuildPhase::Pending | BuildPhase::Running)
    }
}

impl Build {
    pub fn phase(&self) -> BuildPhase {
        self.status.as_ref().map(|s| s.phase).unwrap_or_default()
    }
}

// --- route.openshift.io/v1 ---

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug)]
#[kube(group = "route.openshift.io", version = "v1", kind = "Route")]
#[kube(namespaced, schema = "disabled")]
#[kube(status = "RouteStatus")]
#[serde(rename_all = "camelCase")]
pub struct RouteSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub to: RouteTargetReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<RoutePort>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wildcard_policy: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct RouteTargetReference {
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i32>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RoutePort {
    pub target_port: IntOrString,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfig {
    pub termination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure_edge_termination_policy: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct RouteStatus {
    #[serde(default)]
    pub ingress: Vec<RouteIngress>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RouteIngress {
    #[serde(default)]
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router_name: Option<String>,
}

impl Route {
    /// Admitted host name, preferring the spec over the first ingress
    pub fn host(&self) -> Option<&str> {
        self.spec
            .host
            .as_deref()
            .filter(|h| !h.is_empty())
            .or_else(|| {
                self.status
                    .as_ref()
                    .and_then(|s| s.ingress.iter().map(|i| i.host.as_str()).find(|h| !h.is_empty()))
            })
    }

    /// `https://` when the route terminates TLS, `http://` otherwise
    pub fn url(&self) -> Option<String> {
        let host = self.host()?;
        let scheme = if self.spec.tls.is_some() { "https" } else { "http" };
        Some(format!("{scheme}://{host}"))
    }
}

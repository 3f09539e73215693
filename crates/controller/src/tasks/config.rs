//! Controller Configuration
//!
//! Loaded from a mounted YAML file (or a `ConfigMap`). Every field has a
//! default so a partial file only overrides what it names.

use k8s_openapi::api::core::v1::ConfigMap;
use kube::{api::Api, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_builder_image_namespace() -> String {
    "openshift".to_string()
}

fn default_image_registry() -> String {
    "image-registry.openshift-image-registry.svc:5000".to_string()
}

fn default_secret_key() -> String {
    "password".to_string()
}

fn default_github_api_url() -> String {
    scm::metadata::DEFAULT_GITHUB_API_URL.to_string()
}

fn default_gitlab_api_url() -> String {
    scm::metadata::DEFAULT_GITLAB_API_URL.to_string()
}

fn default_git_timeout() -> u64 {
    10
}

fn default_build_poll() -> u64 {
    30
}

fn default_workload_poll() -> u64 {
    10
}

fn default_created() -> u64 {
    3
}

fn default_error_backoff() -> u64 {
    15
}

fn default_conflict() -> u64 {
    1
}

fn default_status_update_retries() -> u32 {
    3
}

/// Main controller configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControllerConfig {
    /// Namespace holding the builder ImageStreams
    #[serde(default = "default_builder_image_namespace", rename = "builderImageNamespace")]
    pub builder_image_namespace: String,

    /// Internal registry host the built images are pushed to
    #[serde(default = "default_image_registry", rename = "imageRegistry")]
    pub image_registry: String,

    /// Repository access configuration
    #[serde(default)]
    pub git: GitConfig,

    /// Retry intervals
    #[serde(default)]
    pub requeue: RequeueConfig,

    /// Attempts at writing status after an optimistic-concurrency conflict
    #[serde(default = "default_status_update_retries", rename = "statusUpdateRetries")]
    pub status_update_retries: u32,
}

/// Repository access configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GitConfig {
    /// Key of the access token inside the referenced Secret
    #[serde(default = "default_secret_key", rename = "secretKey")]
    pub secret_key: String,

    /// Probe the repository on every pass instead of reusing the recorded answer
    #[serde(default, rename = "recheckEveryPass")]
    pub recheck_every_pass: bool,

    #[serde(default = "default_github_api_url", rename = "githubApiUrl")]
    pub github_api_url: String,

    #[serde(default = "default_gitlab_api_url", rename = "gitlabApiUrl")]
    pub gitlab_api_url: String,

    /// Request timeout for repository probes
    #[serde(default = "default_git_timeout", rename = "timeoutSeconds")]
    pub timeout_seconds: u64,
}

impl GitConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for GitConfig {
    fn default() -> Self {
        GitConfig {
            secret_key: default_secret_key(),
            recheck_every_pass: false,
            github_api_url: default_github_api_url(),
            gitlab_api_url: default_gitlab_api_url(),
            timeout_seconds: default_git_timeout(),
        }
    }
}

/// Retry intervals in seconds
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RequeueConfig {
    /// Polling while no build exists yet or the latest build is running
    #[serde(default = "default_build_poll", rename = "buildPollSeconds")]
    pub build_poll_seconds: u64,

    /// Polling while the Deployment rolls out
    #[serde(default = "default_workload_poll", rename = "workloadPollSeconds")]
    pub workload_poll_seconds: u64,

    /// Delay after creating a resource
    #[serde(default = "default_created", rename = "createdSeconds")]
    pub created_seconds: u64,

    /// Backoff after an infrastructure error
    #[serde(default = "default_error_backoff", rename = "errorBackoffSeconds")]
    pub error_backoff_seconds: u64,

    /// Delay after exhausting status update retries on conflict
    #[serde(default = "default_conflict", rename = "conflictSeconds")]
    pub conflict_seconds: u64,
}

impl Default for RequeueConfig {
    fn default() -> Self {
        RequeueConfig {
            build_poll_seconds: default_build_poll(),
            workload_poll_seconds: default_workload_poll(),
            created_seconds: default_created(),
            error_backoff_seconds: default_error_backoff(),
            conflict_seconds: default_conflict(),
        }
    }
}

impl ControllerConfig {
    /// Validate that configuration has required fields
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.builder_image_namespace.trim().is_empty() {
            return Err(anyhow::anyhow!("builderImageNamespace must not be empty"));
        }
        if self.image_registry.trim().is_empty() {
            return Err(anyhow::anyhow!("imageRegistry must not be empty"));
        }
        if self.git.secret_key.trim().is_empty() {
            return Err(anyhow::anyhow!("git.secretKey must not be empty"));
        }
        if self.git.timeout_seconds == 0 {
            return Err(anyhow::anyhow!("git.timeoutSeconds must be greater than zero"));
        }

        let intervals = [
            ("buildPollSeconds", self.requeue.build_poll_seconds),
            ("workloadPollSeconds", self.requeue.workload_poll_seconds),
            ("createdSeconds", self.requeue.created_seconds),
            ("errorBackoffSeconds", self.requeue.error_backoff_seconds),
            ("conflictSeconds", self.requeue.conflict_seconds),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(anyhow::anyhow!("requeue.{name} must be greater than zero"));
            }
        }

        if self.status_update_retries == 0 {
            return Err(anyhow::anyhow!("statusUpdateRetries must be at least 1"));
        }

        Ok(())
    }

    /// Load configuration from mounted `ConfigMap` file
    pub fn from_mounted_file(config_path: &str) -> Result<Self, anyhow::Error> {
        let config_str = std::fs::read_to_string(config_path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {config_path}: {e}"))?;

        let config: ControllerConfig = serde_yaml::from_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse config YAML: {e}"))?;

        Ok(config)
    }

    /// Load configuration from a `ConfigMap` through the API
    pub async fn from_configmap(
        client: &Client,
        namespace: &str,
        name: &str,
    ) -> Result<Self, anyhow::Error> {
        let api: Api<ConfigMap> = Api::namespaced(client.clone(), namespace);
        let cm = api.get(name).await?;

        let data = cm
            .data
            .ok_or_else(|| anyhow::anyhow!("ConfigMap has no data"))?;
        let config_str = data
            .get("config.yaml")
            .ok_or_else(|| anyhow::anyhow!("ConfigMap missing config.yaml"))?;

        let config: ControllerConfig = serde_yaml::from_str(config_str)?;
        Ok(config)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            builder_image_namespace: default_builder_image_namespace(),
            image_registry: default_image_registry(),
            git: GitConfig::default(),
            requeue: RequeueConfig::default(),
            status_update_retries: default_status_update_retries(),
        }
    }
}

//! Status condition wire types shared by the `ConsoleApplication` status

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Condition types recorded on a `ConsoleApplication`
#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq, Hash)]
pub enum ConditionType {
    Ready,
    Progressing,
    GitRepoReachable,
    BuildReady,
    WorkloadReady,
    ServiceReady,
    RouteReady,
}

impl ConditionType {
    pub fn as_str(self) -> &'static str {
        match self {
            ConditionType::Ready => "Ready",
            ConditionType::Progressing => "Progressing",
            ConditionType::GitRepoReachable => "GitRepoReachable",
            ConditionType::BuildReady => "BuildReady",
            ConditionType::WorkloadReady => "WorkloadReady",
            ConditionType::ServiceReady => "ServiceReady",
            ConditionType::RouteReady => "RouteReady",
        }
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Truth value of a condition
#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl ConditionStatus {
    pub fn from_bool(value: bool) -> Self {
        if value {
            ConditionStatus::True
        } else {
            ConditionStatus::False
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConditionStatus::True => "True",
            ConditionStatus::False => "False",
            ConditionStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable, machine-readable reason codes
#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq, Hash)]
pub enum Reason {
    // Lifecycle
    Init,
    RequirementsBeingMet,
    RequirementsNotMet,
    RequirementsMet,
    AllResourcesReady,
    SecretResourceNotFound,

    // Repository probe
    Succeeded,
    RepoNotFound,
    RepoNotReachable,
    RateLimitExceeded,
    UnsupportedHostType,
    #[serde(rename = "InvalidURL")]
    InvalidUrl,
    AccessTokenRequired,

    // Image stream and build
    ImageStreamNotFound,
    ImageStreamCreationFailed,
    BuildConfigCreated,
    BuildConfigCreationFailed,
    BuildsNotFound,
    BuildInProgress,
    BuildCompleted,
    BuildsFailed,

    // Workload
    WorkloadCreationFailed,
    WorkloadNotReady,
    WorkloadReady,

    // Service and route
    ServiceCreationFailed,
    ServiceNotReady,
    ServiceReady,
    RouteCreationFailed,
    RouteNotReady,
    RouteReady,
}

impl Reason {
    pub fn as_str(self) -> &'static str {
        match self {
            Reason::Init => "Init",
            Reason::RequirementsBeingMet => "RequirementsBeingMet",
            Reason::RequirementsNotMet => "RequirementsNotMet",
            Reason::RequirementsMet => "RequirementsMet",
            Reason::AllResourcesReady => "AllResourcesReady",
            Reason::SecretResourceNotFound => "SecretResourceNotFound",
            Reason::Succeeded => "Succeeded",
            Reason::RepoNotFound => "RepoNotFound",
            Reason::RepoNotReachable => "RepoNotReachable",
            Reason::RateLimitExceeded => "RateLimitExceeded",
            Reason::UnsupportedHostType => "UnsupportedHostType",
            Reason::InvalidUrl => "InvalidURL",
            Reason::AccessTokenRequired => "AccessTokenRequired",
            Reason::ImageStreamNotFound => "ImageStreamNotFound",
            Reason::ImageStreamCreationFailed => "ImageStreamCreationFailed",
            Reason::BuildConfigCreated => "BuildConfigCreated",
            Reason::BuildConfigCreationFailed => "BuildConfigCreationFailed",
            Reason::BuildsNotFound => "BuildsNotFound",
            Reason::BuildInProgress => "BuildInProgress",
            Reason::BuildCompleted => "BuildCompleted",
            Reason::BuildsFailed => "BuildsFailed",
            Reason::WorkloadCreationFailed => "WorkloadCreationFailed",
            Reason::WorkloadNotReady => "WorkloadNotReady",
            Reason::WorkloadReady => "WorkloadReady",
            Reason::ServiceCreationFailed => "ServiceCreationFailed",
            Reason::ServiceNotReady => "ServiceNotReady",
            Reason::ServiceReady => "ServiceReady",
            Reason::RouteCreationFailed => "RouteCreationFailed",
            Reason::RouteNotReady => "RouteNotReady",
            Reason::RouteReady => "RouteReady",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<scm::ProbeReason> for Reason {
    fn from(reason: scm::ProbeReason) -> Self {
        match reason {
            scm::ProbeReason::Succeeded => Reason::Succeeded,
            scm::ProbeReason::RepoNotFound => Reason::RepoNotFound,
            scm::ProbeReason::RepoNotReachable => Reason::RepoNotReachable,
            scm::ProbeReason::RateLimitExceeded => Reason::RateLimitExceeded,
            scm::ProbeReason::UnsupportedHostType => Reason::UnsupportedHostType,
            scm::ProbeReason::InvalidUrl => Reason::InvalidUrl,
            scm::ProbeReason::AccessTokenRequired => Reason::AccessTokenRequired,
        }
    }
}

/// Condition for the `ConsoleApplication`
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppCondition {
    /// Type of condition
    #[serde(rename = "type")]
    pub condition_type: ConditionType,

    /// Status of the condition (True, False, or Unknown)
    pub status: ConditionStatus,

    /// Reason for the condition's last transition
    pub reason: Reason,

    /// Human-readable message about the condition
    #[serde(default)]
    pub message: String,

    /// Last time the status changed (RFC3339 format)
    pub last_transition_time: String,

    /// Spec generation the condition was computed for, when it depends on the spec
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// Reads a condition list, skipping entries whose type or reason this
/// controller does not write. Skipped entries count as never recorded.
pub(crate) fn known_conditions<'de, D>(deserializer: D) -> Result<Vec<AppCondition>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|entry| serde_json::from_value(entry).ok())
        .collect())
}

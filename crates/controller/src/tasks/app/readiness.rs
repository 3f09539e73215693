//! Readiness classification per resource kind.

use super::mapper::RequiredResource;
use crate::crds::{Build, BuildPhase, Reason};
use crate::tasks::store::{ManagedObject, ResourceKind};
use k8s_openapi::api::apps::v1::Deployment;
use kube::ResourceExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ready,
    NotReadyRetryable,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Readiness {
    pub outcome: Outcome,
    /// `None` when the resource records nothing for this outcome
    pub reason: Option<Reason>,
    pub message: String,
}

impl Readiness {
    fn new(outcome: Outcome, reason: impl Into<Option<Reason>>, message: impl Into<String>) -> Self {
        Self {
            outcome,
            reason: reason.into(),
            message: message.into(),
        }
    }

    pub fn ready(reason: impl Into<Option<Reason>>, message: impl Into<String>) -> Self {
        Self::new(Outcome::Ready, reason, message)
    }

    pub fn not_ready(reason: impl Into<Option<Reason>>, message: impl Into<String>) -> Self {
        Self::new(Outcome::NotReadyRetryable, reason, message)
    }

    pub fn failed(reason: Reason, message: impl Into<String>) -> Self {
        Self::new(Outcome::Failed, reason, message)
    }
}

/// What the loop fetched for an existing resource
pub enum Observed<'a> {
    /// Builds started from a BuildConfig
    Builds(&'a [Build]),
    Workload(&'a Deployment),
    Present(&'a ManagedObject),
}

pub type Classifier = fn(&Observed<'_>, &RequiredResource) -> Readiness;

const CLASSIFIERS: [(ResourceKind, Classifier); 5] = [
    (ResourceKind::ImageStream, classify_presence),
    (ResourceKind::BuildConfig, classify_builds),
    (ResourceKind::Deployment, classify_workload),
    (ResourceKind::Service, classify_presence),
    (ResourceKind::Route, classify_presence),
];

pub fn classifier_for(kind: ResourceKind) -> Classifier {
    CLASSIFIERS
        .iter()
        .find(|(k, _)| *k == kind)
        .map_or(classify_presence as Classifier, |(_, classifier)| *classifier)
}

pub fn classify(observed: &Observed<'_>, required: &RequiredResource) -> Readiness {
    classifier_for(required.kind)(observed, required)
}

/// Most recently created build, ties broken by name
pub fn latest_build(builds: &[Build]) -> Option<&Build> {
    builds.iter().max_by(|a, b| {
        let created = |build: &Build| build.metadata.creation_timestamp.as_ref().map(|t| t.0);
        created(a)
            .cmp(&created(b))
            .then_with(|| a.name_any().cmp(&b.name_any()))
    })
}

/// Existence is the readiness contract for these kinds
fn classify_presence(_observed: &Observed<'_>, required: &RequiredResource) -> Readiness {
    Readiness::ready(
        required.ready_reason,
        format!("{} {} is ready", required.kind, required.name()),
    )
}

fn classify_builds(observed: &Observed<'_>, required: &RequiredResource) -> Readiness {
    let Observed::Builds(builds) = observed else {
        return classify_presence(observed, required);
    };

    let Some(latest) = latest_build(builds) else {
        return Readiness::not_ready(
            Reason::BuildsNotFound,
            format!("No builds found for BuildConfig {}", required.name()),
        );
    };

    let name = latest.name_any();
    match latest.phase() {
        BuildPhase::Complete => {
            Readiness::ready(required.ready_reason, format!("Build {name} completed"))
        }
        phase if phase.is_active() => Readiness::not_ready(
            required.not_ready_reason,
            format!("Build {name} is {phase:?}"),
        ),
        // not a phase we know to be terminal
        BuildPhase::Unknown => Readiness::not_ready(
            required.not_ready_reason,
            format!("Build {name} is in an unrecognized phase"),
        ),
        phase => {
            let detail = latest
                .status
                .as_ref()
                .and_then(|s| s.message.as_deref().or(s.reason.as_deref()))
                .map(|d| format!(": {d}"))
                .unwrap_or_default();
            Readiness::failed(Reason::BuildsFailed, format!("Build {name} {phase:?}{detail}"))
        }
    }
}

fn classify_workload(observed: &Observed<'_>, required: &RequiredResource) -> Readiness {
    let Observed::Workload(deployment) = observed else {
        return classify_presence(observed, required);
    };

    let conditions = deployment
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_deref())
        .unwrap_or_default();
    if conditions.is_empty() {
        return Readiness::not_ready(
            required.not_ready_reason,
            format!("Deployment {} has not reported status yet", required.name()),
        );
    }

    let find = |type_: &str| conditions.iter().find(|c| c.type_ == type_);
    let available = find("Available").is_some_and(|c| c.status == "True");
    let progressing = find("Progressing");

    match progressing.map(|c| c.status.as_str()) {
        Some("False") => {
            let detail = progressing
                .and_then(|c| c.message.clone())
                .unwrap_or_else(|| "rollout stalled".to_string());
            Readiness::failed(
                required.create_failed_reason,
                format!("Deployment {} failed to progress: {detail}", required.name()),
            )
        }
        Some("True") | None if available => Readiness::ready(
            required.ready_reason,
            format!("Deployment {} is available", required.name()),
        ),
        _ => Readiness::not_ready(
            required.not_ready_reason,
            format!("Deployment {} is rolling out", required.name()),
        ),
    }
}

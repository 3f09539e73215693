//! Condition store for `ConsoleApplication` status.
//!
//! Conditions are upserted by type. `last_transition_time` only moves when the
//! status value flips, and every mutator reports whether it changed anything so
//! callers can skip writes for passes that observed nothing new.

use crate::crds::{AppCondition, ConditionStatus, ConditionType, ConsoleApplicationStatus, Reason};
use chrono::{DateTime, SecondsFormat, Utc};

/// Free-form status attributes outside the condition list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusField {
    ApplicationUrl(String),
}

impl ConsoleApplicationStatus {
    pub fn condition(&self, condition_type: ConditionType) -> Option<&AppCondition> {
        self.conditions
            .iter()
            .find(|c| c.condition_type == condition_type)
    }

    pub fn is_condition_true(&self, condition_type: ConditionType) -> bool {
        self.condition(condition_type)
            .is_some_and(|c| c.status == ConditionStatus::True)
    }

    /// Upsert a condition, returning whether anything changed
    pub fn set_condition(
        &mut self,
        condition_type: ConditionType,
        status: ConditionStatus,
        reason: Reason,
        message: impl Into<String>,
    ) -> bool {
        self.set_condition_at(condition_type, status, reason, message, Utc::now())
    }

    pub fn set_condition_at(
        &mut self,
        condition_type: ConditionType,
        status: ConditionStatus,
        reason: Reason,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> bool {
        let message = message.into();
        let timestamp = now.to_rfc3339_opts(SecondsFormat::Secs, true);

        let Some(existing) = self
            .conditions
            .iter_mut()
            .find(|c| c.condition_type == condition_type)
        else {
            self.conditions.push(AppCondition {
                condition_type,
                status,
                reason,
                message,
                last_transition_time: timestamp,
                observed_generation: None,
            });
            return true;
        };

        let mut changed = false;
        if existing.status != status {
            existing.status = status;
            existing.last_transition_time = timestamp;
            changed = true;
        }
        if existing.reason != reason {
            existing.reason = reason;
            changed = true;
        }
        if existing.message != message {
            existing.message = message;
            changed = true;
        }
        changed
    }

    /// Stamp the spec generation a condition was computed for
    pub fn set_observed_generation(
        &mut self,
        condition_type: ConditionType,
        generation: Option<i64>,
    ) -> bool {
        match self
            .conditions
            .iter_mut()
            .find(|c| c.condition_type == condition_type)
        {
            Some(condition) if condition.observed_generation != generation => {
                condition.observed_generation = generation;
                true
            }
            _ => false,
        }
    }

    pub fn set_field(&mut self, field: StatusField) -> bool {
        match field {
            StatusField::ApplicationUrl(url) => {
                if self.application_url.as_deref() == Some(url.as_str()) {
                    return false;
                }
                self.application_url = Some(url);
                true
            }
        }
    }

    /// First pass: Ready=Unknown (only if nothing was recorded yet), Progressing=True
    pub fn mark_started(&mut self) -> bool {
        let mut changed = false;
        if self.conditions.is_empty() {
            changed |= self.set_condition(
                ConditionType::Ready,
                ConditionStatus::Unknown,
                Reason::Init,
                "Initializing ConsoleApplication",
            );
        }
        changed |= self.set_condition(
            ConditionType::Progressing,
            ConditionStatus::True,
            Reason::RequirementsBeingMet,
            "Requirements are being met",
        );
        changed
    }

    pub fn mark_failed(&mut self, reason: Reason, message: impl Into<String>) -> bool {
        let mut changed =
            self.set_condition(ConditionType::Ready, ConditionStatus::False, reason, message);
        changed |= self.set_condition(
            ConditionType::Progressing,
            ConditionStatus::False,
            Reason::RequirementsNotMet,
            "Requirements are not met",
        );
        changed
    }

    pub fn mark_succeeded(&mut self) -> bool {
        let mut changed = self.set_condition(
            ConditionType::Ready,
            ConditionStatus::True,
            Reason::AllResourcesReady,
            "All resources are successfully created and ready",
        );
        changed |= self.set_condition(
            ConditionType::Progressing,
            ConditionStatus::False,
            Reason::RequirementsMet,
            "All requirements are met",
        );
        changed
    }
}

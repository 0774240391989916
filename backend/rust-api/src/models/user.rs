use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{bson_datetime_as_chrono, bson_datetime_as_chrono_option};

fn default_target_emission() -> f64 {
    100.0
}

/// User model stored in MongoDB "users" collection.
///
/// Accounts are created by the auth service; this crate only reads them and
/// adjusts the emission, tree and onboarding fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub email: String,
    /// Monthly kg CO2e goal
    #[serde(default = "default_target_emission")]
    pub target_emission: f64,
    #[serde(default)]
    pub total_emission: f64,
    #[serde(default)]
    pub total_trees: u32,
    /// `YYYY-MM` of the last month whose savings trees were settled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trees_awarded_through: Option<String>,
    #[serde(default)]
    pub onboarding_completed: bool,
    #[serde(default)]
    pub onboarding_steps: Vec<CompletedStep>,
    #[serde(with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: ObjectId::new(),
            name: name.into(),
            email: email.into(),
            target_emission: default_target_emission(),
            total_emission: 0.0,
            total_trees: 0,
            trees_awarded_through: None,
            onboarding_completed: false,
            onboarding_steps: Vec::new(),
            created_at: now,
            updated_at: None,
        }
    }

    pub fn has_completed_step(&self, step: OnboardingStep) -> bool {
        self.onboarding_steps.iter().any(|s| s.step_id == step)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    Welcome,
    SetTarget,
    FirstActivity,
    ExploreDashboard,
}

impl OnboardingStep {
    pub const ALL: [OnboardingStep; 4] = [
        OnboardingStep::Welcome,
        OnboardingStep::SetTarget,
        OnboardingStep::FirstActivity,
        OnboardingStep::ExploreDashboard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OnboardingStep::Welcome => "welcome",
            OnboardingStep::SetTarget => "set_target",
            OnboardingStep::FirstActivity => "first_activity",
            OnboardingStep::ExploreDashboard => "explore_dashboard",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|step| step.as_str() == raw)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompletedStep {
    pub step_id: OnboardingStep,
    #[serde(with = "bson_datetime_as_chrono")]
    pub completed_at: DateTime<Utc>,
}

/// Optional payload for `POST /onboarding/step/{stepId}`
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CompleteStepRequest {
    #[validate(range(exclusive_min = 0.0))]
    pub target_emission: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct OnboardingStatus {
    pub onboarding_completed: bool,
    pub completed_steps: Vec<OnboardingStep>,
    pub remaining_steps: Vec<OnboardingStep>,
    pub total_steps: usize,
}

impl OnboardingStatus {
    pub fn for_user(user: &User) -> Self {
        let completed_steps: Vec<OnboardingStep> =
            user.onboarding_steps.iter().map(|s| s.step_id).collect();
        let remaining_steps = OnboardingStep::ALL
            .into_iter()
            .filter(|step| !completed_steps.contains(step))
            .collect();

        OnboardingStatus {
            onboarding_completed: user.onboarding_completed,
            completed_steps,
            remaining_steps,
            total_steps: OnboardingStep::ALL.len(),
        }
    }
}

//! Blueprints (`/api/blueprints`)
//!
//! A blueprint is a fabric instance built from a template. Changes land in
//! the staging graph and reach the devices only when deployed. The
//! per-blueprint collections live in the submodules.

pub mod policies;
pub mod remote_gateways;
pub mod security_zones;

pub use policies::*;
pub use remote_gateways::*;
pub use security_zones::*;

use crate::client::ApstraClient;
use crate::common::query::{Labeled, list_polished, one_by_label};
use crate::common::{IdResponse, ObjectId};
use crate::error::ApstraError;
use crate::polish::{Polish, parse_optional_timestamp, unknown_value};
use crate::retry::with_conflict_retry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

pub(crate) const BLUEPRINTS_PATH: &str = "/api/blueprints";

pub(crate) fn blueprint_path(blueprint_id: &ObjectId, suffix: &str) -> String {
    format!("{}/{}{}", BLUEPRINTS_PATH, blueprint_id, suffix)
}

/// Which of the blueprint's graphs a request addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlueprintType {
    #[default]
    Staging,
    Operation,
}

impl BlueprintType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Staging => "staging",
            Self::Operation => "operation",
        }
    }
}

impl fmt::Display for BlueprintType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference design a blueprint was created with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefDesign {
    TwoStageL3Clos,
    Freeform,
}

impl RefDesign {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TwoStageL3Clos => "two_stage_l3clos",
            Self::Freeform => "freeform",
        }
    }

    fn parse(s: &str) -> Result<Self, ApstraError> {
        match s {
            "two_stage_l3clos" => Ok(Self::TwoStageL3Clos),
            "freeform" => Ok(Self::Freeform),
            other => Err(unknown_value("reference design", other)),
        }
    }
}

/// Blueprint summary as listed by `GET /api/blueprints`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBlueprintStatus {
    pub id: ObjectId,
    pub label: String,
    pub design: String,
    #[serde(default)]
    pub status: String,
    pub version: u64,
    #[serde(default)]
    pub deployed_version: Option<u64>,
    #[serde(default)]
    pub has_uncommitted_changes: bool,
    #[serde(default)]
    pub build_errors_count: u64,
    #[serde(default)]
    pub build_warnings_count: u64,
    #[serde(default)]
    pub anomaly_counts: BTreeMap<String, u64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_modified_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlueprintStatus {
    pub id: ObjectId,
    pub label: String,
    pub design: RefDesign,
    pub status: String,
    pub version: u64,
    pub deployed_version: Option<u64>,
    pub has_uncommitted_changes: bool,
    pub build_errors_count: u64,
    pub build_warnings_count: u64,
    pub anomaly_counts: BTreeMap<String, u64>,
    pub created_at: Option<DateTime<Utc>>,
    pub last_modified_at: Option<DateTime<Utc>>,
}

impl BlueprintStatus {
    /// Total anomaly count, as reported under the `all` key
    pub fn anomalies(&self) -> u64 {
        self.anomaly_counts.get("all").copied().unwrap_or(0)
    }
}

impl Polish for RawBlueprintStatus {
    type Polished = BlueprintStatus;

    fn polish(self) -> Result<BlueprintStatus, ApstraError> {
        Ok(BlueprintStatus {
            design: RefDesign::parse(&self.design)?,
            created_at: parse_optional_timestamp("created_at", self.created_at.as_deref())?,
            last_modified_at: parse_optional_timestamp("last_modified_at", self.last_modified_at.as_deref())?,
            id: self.id,
            label: self.label,
            status: self.status,
            version: self.version,
            deployed_version: self.deployed_version,
            has_uncommitted_changes: self.has_uncommitted_changes,
            build_errors_count: self.build_errors_count,
            build_warnings_count: self.build_warnings_count,
            anomaly_counts: self.anomaly_counts,
        })
    }
}

impl Labeled for BlueprintStatus {
    fn label(&self) -> &str {
        &self.label
    }
}

/// Create a blueprint from a design template
#[derive(Debug, Clone)]
pub struct CreateBlueprintFromTemplateRequest {
    pub label: String,
    pub template_id: ObjectId,
    pub design: RefDesign,
}

#[derive(Debug, Serialize)]
struct RawCreateBlueprintFromTemplate<'a> {
    design: &'static str,
    init_type: &'static str,
    label: &'a str,
    template_id: &'a ObjectId,
}

/// Deployment state of the staging graph relative to the deployed one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStatus {
    #[serde(default)]
    pub status: String,
    pub staging_version: u64,
    #[serde(default)]
    pub deployed_version: Option<u64>,
    #[serde(default)]
    pub deploy_error: Option<String>,
}

#[derive(Debug, Serialize)]
struct DeployRequest<'a> {
    version: u64,
    description: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitCheckState {
    InProgress,
    Success,
    Error,
}

impl CommitCheckState {
    fn parse(s: &str) -> Result<Self, ApstraError> {
        match s {
            "in_progress" | "pending" => Ok(Self::InProgress),
            "success" => Ok(Self::Success),
            "error" | "failure" => Ok(Self::Error),
            other => Err(unknown_value("commit check state", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCommitCheckResult {
    pub state: String,
    #[serde(default)]
    pub version: Option<u64>,
    #[serde(default)]
    pub errors: Vec<serde_json::Value>,
    #[serde(default)]
    pub warnings: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommitCheckResult {
    pub state: CommitCheckState,
    pub version: Option<u64>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl CommitCheckResult {
    pub fn passed(&self) -> bool {
        self.state == CommitCheckState::Success && self.errors.is_empty()
    }
}

/// Messages come back as plain strings or as objects with a `message` field
fn message_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Object(ref map) => match map.get("message").and_then(|m| m.as_str()) {
            Some(m) => m.to_string(),
            None => value.to_string(),
        },
        other => other.to_string(),
    }
}

impl Polish for RawCommitCheckResult {
    type Polished = CommitCheckResult;

    fn polish(self) -> Result<CommitCheckResult, ApstraError> {
        Ok(CommitCheckResult {
            state: CommitCheckState::parse(&self.state)?,
            version: self.version,
            errors: self.errors.into_iter().map(message_text).collect(),
            warnings: self.warnings.into_iter().map(message_text).collect(),
        })
    }
}

impl ApstraClient {
    pub async fn list_blueprints(&self) -> Result<Vec<BlueprintStatus>, ApstraError> {
        list_polished::<RawBlueprintStatus>(&self.http, BLUEPRINTS_PATH).await
    }

    /// Status summary of a single blueprint
    pub async fn get_blueprint_status(&self, id: &ObjectId) -> Result<BlueprintStatus, ApstraError> {
        self.list_blueprints()
            .await?
            .into_iter()
            .find(|bp| &bp.id == id)
            .ok_or_else(|| ApstraError::NotFound(format!("blueprint '{}' not found", id)))
    }

    pub async fn get_blueprint_status_by_label(&self, label: &str) -> Result<BlueprintStatus, ApstraError> {
        one_by_label(self.list_blueprints().await?, label, "blueprint")
    }

    pub async fn create_blueprint_from_template(
        &self,
        request: &CreateBlueprintFromTemplateRequest,
    ) -> Result<ObjectId, ApstraError> {
        if request.label.is_empty() {
            return Err(ApstraError::InvalidRequest("blueprint label must not be empty".to_string()));
        }
        if request.design == RefDesign::Freeform {
            return Err(ApstraError::InvalidRequest(
                "freeform blueprints are not created from templates".to_string(),
            ));
        }

        let body = RawCreateBlueprintFromTemplate {
            design: request.design.as_str(),
            init_type: "template_reference",
            label: &request.label,
            template_id: &request.template_id,
        };
        info!("Creating blueprint '{}' from template {}", request.label, request.template_id);
        let response: IdResponse = self.http.post(BLUEPRINTS_PATH, &body).await?;
        Ok(response.id)
    }

    pub async fn delete_blueprint(&self, id: &ObjectId) -> Result<(), ApstraError> {
        self.http.delete(&blueprint_path(id, "")).await
    }

    pub async fn get_blueprint_diff_status(&self, id: &ObjectId) -> Result<DiffStatus, ApstraError> {
        self.http.get(&blueprint_path(id, "/diff-status")).await
    }

    /// Deploy the current staging revision.
    ///
    /// The revision is re-read on every attempt; a 409 means the staging
    /// graph moved underneath us and the deploy is retried with backoff.
    pub async fn deploy_blueprint(&self, id: &ObjectId, description: &str) -> Result<u64, ApstraError> {
        let path = blueprint_path(id, "/deploy");
        let path = path.as_str();
        with_conflict_retry(self.http.backoff(), self.http.max_retries(), move || async move {
            let diff = self.get_blueprint_diff_status(id).await?;
            let request = DeployRequest {
                version: diff.staging_version,
                description,
            };
            self.http.put(path, &request).await?;
            info!("Deployed blueprint {} at revision {}", id, diff.staging_version);
            Ok(diff.staging_version)
        })
        .await
    }

    /// Ask the controller to validate the staging graph
    pub async fn start_commit_check(&self, id: &ObjectId) -> Result<(), ApstraError> {
        let _: serde_json::Value = self
            .http
            .post(&blueprint_path(id, "/commit-check"), &serde_json::json!({}))
            .await?;
        Ok(())
    }

    pub async fn get_commit_check_result(&self, id: &ObjectId) -> Result<CommitCheckResult, ApstraError> {
        let raw: RawCommitCheckResult = self.http.get(&blueprint_path(id, "/commit-check-result")).await?;
        raw.polish()
    }

    /// Start a commit check and poll until it finishes or `timeout` elapses
    pub async fn commit_check(&self, id: &ObjectId, timeout: Duration) -> Result<CommitCheckResult, ApstraError> {
        self.start_commit_check(id).await?;

        let deadline = tokio::time::Instant::now() + timeout;
        let mut backoff = self.http.backoff();
        loop {
            let result = self.get_commit_check_result(id).await?;
            if result.state != CommitCheckState::InProgress {
                return Ok(result);
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Err(ApstraError::Timeout(format!(
                    "commit check of blueprint {} still in progress after {:?}",
                    id, timeout
                )));
            }
            let delay = backoff.next_backoff().min(deadline - now);
            debug!("Commit check of blueprint {} in progress, polling again in {:?}", id, delay);
            tokio::time::sleep(delay).await;
        }
    }
}

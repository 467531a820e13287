use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::FailureKind;
use crate::events::{UserRole, WorkflowAnswer};

/// Body of `POST /api/workflow`
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowRequest {
    pub query: String,
    pub user_id: UserRole,
}

/// Envelope returned by the backend
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Option<WorkflowAnswer>,
    #[serde(default)]
    pub error: Option<String>,
}

impl WorkflowResponse {
    /// Collapse the envelope into an answer or a failure
    pub fn into_result(self) -> Result<WorkflowAnswer, FailureKind> {
        if !self.success {
            let message = self
                .error
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(FailureKind::Backend(message));
        }
        self.data.ok_or(FailureKind::EmptyResponse)?.resolve()
    }
}

/// Something that can answer a query for a role
#[async_trait]
pub trait QueryBackend: Send + Sync {
    async fn query(&self, query: &str, role: UserRole) -> Result<WorkflowAnswer, FailureKind>;
}

/// HTTP client for the HR assistant backend
#[derive(Clone)]
pub struct HrApiClient {
    endpoint: String,
    client: reqwest::Client,
}

impl HrApiClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            endpoint: config.workflow_url(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl QueryBackend for HrApiClient {
    async fn query(&self, query: &str, role: UserRole) -> Result<WorkflowAnswer, FailureKind> {
        let payload = WorkflowRequest {
            query: query.to_string(),
            user_id: role,
        };

        tracing::debug!(endpoint = %self.endpoint, role = %role, "sending query");

        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(FailureKind::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "backend rejected query");
            return Err(FailureKind::Status(status.as_u16(), error_text));
        }

        let body = response.text().await.map_err(FailureKind::from_reqwest)?;
        let envelope: WorkflowResponse =
            serde_json::from_str(&body).map_err(|e| FailureKind::Decode(e.to_string()))?;

        envelope.into_result()
    }
}

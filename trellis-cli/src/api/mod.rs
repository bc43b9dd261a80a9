//! API client module
//!
//! HTTP client for communicating with the Trellis orchestrator API.

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use trellis_core::PipelineOutcome;
use trellis_core::domain::build::Build;
use trellis_core::domain::pipeline::Pipeline;
use trellis_core::domain::project::Project;
use trellis_core::dto::pipeline::CreatePipelineRequest;
use trellis_core::dto::project::{AddMember, CreateProject};
use uuid::Uuid;

/// HTTP client for the Trellis orchestrator API
pub struct ApiClient {
    base_url: String,
    client: Client,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    /// Request a pipeline
    ///
    /// Both an assembled and a rejected pipeline come back as an outcome;
    /// only transport and request errors fail.
    pub async fn create_pipeline(&self, req: &CreatePipelineRequest) -> Result<PipelineOutcome> {
        let url = format!("{}/pipeline/create", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(req)
            .send()
            .await
            .context("Failed to send create pipeline request")?;

        if response.status() == StatusCode::UNPROCESSABLE_ENTITY {
            return response
                .json()
                .await
                .context("Failed to parse response JSON");
        }

        self.handle_response(response).await
    }

    /// List the pipelines of a project, newest first
    pub async fn list_pipelines(&self, project_id: Uuid) -> Result<Vec<Pipeline>> {
        let url = format!("{}/pipeline/list", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("project_id", project_id.to_string())])
            .send()
            .await
            .context("Failed to send list pipelines request")?;

        self.handle_response(response).await
    }

    pub async fn get_pipeline(&self, id: Uuid) -> Result<Pipeline> {
        let url = format!("{}/pipeline/{}", self.base_url, id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to send get pipeline request")?;

        self.handle_response(response).await
    }

    /// Builds of a pipeline in stage order
    pub async fn list_builds(&self, id: Uuid) -> Result<Vec<Build>> {
        let url = format!("{}/pipeline/{}/builds", self.base_url, id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to send list builds request")?;

        self.handle_response(response).await
    }

    pub async fn delete_pipeline(&self, id: Uuid) -> Result<()> {
        let url = format!("{}/pipeline/{}", self.base_url, id);
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .context("Failed to send delete pipeline request")?;

        self.handle_empty_response(response).await
    }

    pub async fn create_project(&self, req: &CreateProject) -> Result<Project> {
        let url = format!("{}/project/create", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(req)
            .send()
            .await
            .context("Failed to send create project request")?;

        self.handle_response(response).await
    }

    pub async fn get_project(&self, id: Uuid) -> Result<Project> {
        let url = format!("{}/project/{}", self.base_url, id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to send get project request")?;

        self.handle_response(response).await
    }

    pub async fn add_member(&self, project_id: Uuid, req: &AddMember) -> Result<()> {
        let url = format!("{}/project/{}/member", self.base_url, project_id);
        let response = self
            .client
            .post(&url)
            .json(req)
            .send()
            .await
            .context("Failed to send add member request")?;

        self.handle_empty_response(response).await
    }

    /// Handle API response and deserialize JSON
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Request failed with status {}: {}", status, error_text);
        }

        response
            .json()
            .await
            .context("Failed to parse response JSON")
    }

    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Request failed with status {}: {}", status, error_text);
        }

        Ok(())
    }
}

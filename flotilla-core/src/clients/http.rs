//! HTTP-backed clients for the fleet service and the artifact store.

use crate::clients::{FleetClient, ObjectStore};
use crate::error::{FlotillaError, Result};
use crate::types::{App, DeploymentStatus, Stack, StoreLocation};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Fleet-management service client speaking the JSON API.
#[derive(Debug, Clone)]
pub struct HttpFleetClient {
    base_url: String,
    http: Client,
    token: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateDeploymentRequest<'a> {
    stack_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    app_id: Option<&'a str>,
    command: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateDeploymentResponse {
    deployment_id: String,
}

#[derive(Debug, Deserialize)]
struct DeploymentRecord {
    status: String,
}

impl HttpFleetClient {
    /// Create a client for the service at `base_url`.
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| FlotillaError::Remote { reason: e.to_string() })?;
        Ok(Self { base_url: base_url.into(), http, token })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[async_trait]
impl FleetClient for HttpFleetClient {
    async fn describe_stack(&self, stack_id: &str) -> Result<Stack> {
        let response = self
            .request(self.http.get(self.url(&format!("stacks/{stack_id}"))))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| FlotillaError::Remote { reason: e.to_string() })?;
        response
            .json()
            .await
            .map_err(|e| FlotillaError::Remote { reason: e.to_string() })
    }

    async fn list_apps(&self, stack_id: &str) -> Result<Vec<App>> {
        let response = self
            .request(self.http.get(self.url(&format!("stacks/{stack_id}/apps"))))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| FlotillaError::Remote { reason: e.to_string() })?;
        response
            .json()
            .await
            .map_err(|e| FlotillaError::Remote { reason: e.to_string() })
    }

    async fn create_deployment(
        &self,
        stack_id: &str,
        app_id: Option<&str>,
        command: &str,
    ) -> Result<Option<String>> {
        let body = CreateDeploymentRequest { stack_id, app_id, command };
        let response = self
            .request(self.http.post(self.url("deployments")).json(&body))
            .send()
            .await
            .map_err(|e| FlotillaError::Remote { reason: e.to_string() })?;

        // The service rejects commands with 409 when no running instance
        // is eligible to execute them.
        if response.status() == StatusCode::CONFLICT {
            return Ok(None);
        }
        let response = response
            .error_for_status()
            .map_err(|e| FlotillaError::Remote { reason: e.to_string() })?;
        let created: CreateDeploymentResponse = response
            .json()
            .await
            .map_err(|e| FlotillaError::Remote { reason: e.to_string() })?;
        Ok(Some(created.deployment_id))
    }

    async fn deployment_status(&self, deployment_id: &str) -> Result<Option<DeploymentStatus>> {
        let response = self
            .request(self.http.get(self.url(&format!("deployments/{deployment_id}"))))
            .send()
            .await
            .map_err(|e| FlotillaError::Remote { reason: e.to_string() })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response
            .error_for_status()
            .map_err(|e| FlotillaError::Remote { reason: e.to_string() })?;
        let record: DeploymentRecord = response
            .json()
            .await
            .map_err(|e| FlotillaError::Remote { reason: e.to_string() })?;
        Ok(DeploymentStatus::parse(&record.status))
    }
}

/// Artifact store client addressing objects as `{base}/{bucket}/{key}`.
#[derive(Debug, Clone)]
pub struct HttpObjectStore {
    base_url: String,
    http: Client,
    token: Option<String>,
}

impl HttpObjectStore {
    /// Create a client for the store at `base_url`.
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| FlotillaError::Store { reason: e.to_string() })?;
        Ok(Self { base_url: base_url.into(), http, token })
    }

    fn url(&self, location: &StoreLocation, key: &str) -> String {
        format!("{}/{}/{}", self.base_url.trim_end_matches('/'), location.bucket, key)
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put(&self, location: &StoreLocation, key: &str, body: Vec<u8>) -> Result<()> {
        self.request(self.http.put(self.url(location, key)))
            .header("x-acl", "private")
            .body(body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| FlotillaError::Store { reason: e.to_string() })?;
        Ok(())
    }

    async fn get(&self, location: &StoreLocation, key: &str) -> Result<Option<Vec<u8>>> {
        let response = self
            .request(self.http.get(self.url(location, key)))
            .send()
            .await
            .map_err(|e| FlotillaError::Store { reason: e.to_string() })?;

        // Absent objects are an expected outcome, not an error.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response
            .error_for_status()
            .map_err(|e| FlotillaError::Store { reason: e.to_string() })?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FlotillaError::Store { reason: e.to_string() })?;
        Ok(Some(bytes.to_vec()))
    }
}

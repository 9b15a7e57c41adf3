//! HTTP warehouse session
//!
//! Statements are rendered at this boundary and posted to the warehouse SQL
//! API; stage uploads use the files endpoint of the same API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use stagehand_core::Statement;
use std::path::Path;
use std::time::Duration;

use crate::WarehouseSession;
use crate::error::{Result, SessionError};

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Where and as whom statements run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Account base URL, e.g. `https://xy12345.snowflakecomputing.com`
    pub account_url: String,
    /// Bearer token
    pub token: String,
    pub warehouse: String,
    pub role: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub timeout: Duration,
}

impl ConnectionSettings {
    pub fn new(
        account_url: impl Into<String>,
        token: impl Into<String>,
        warehouse: impl Into<String>,
    ) -> Self {
        Self {
            account_url: account_url.into(),
            token: token.into(),
            warehouse: warehouse.into(),
            role: None,
            database: None,
            schema: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Serialize)]
struct StatementRequest<'a> {
    statement: String,
    warehouse: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    timeout: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatementResponse {
    #[serde(default)]
    statement_handle: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Warehouse session over the HTTP SQL API
#[derive(Debug, Clone)]
pub struct HttpSession {
    /// Account base URL without trailing slash
    base_url: String,
    settings: ConnectionSettings,
    client: Client,
}

impl HttpSession {
    /// Create a session with a client honouring the configured timeout
    ///
    /// # Errors
    /// Returns `InvalidConfig` if the URL, token or warehouse is empty.
    pub fn new(settings: ConnectionSettings) -> Result<Self> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Self::with_client(settings, client)
    }

    /// Create a session with a custom HTTP client
    pub fn with_client(settings: ConnectionSettings, client: Client) -> Result<Self> {
        if settings.account_url.trim().is_empty() {
            return Err(SessionError::InvalidConfig(
                "account URL cannot be empty".to_string(),
            ));
        }
        if settings.token.is_empty() {
            return Err(SessionError::InvalidConfig(
                "token cannot be empty".to_string(),
            ));
        }
        if settings.warehouse.trim().is_empty() {
            return Err(SessionError::InvalidConfig(
                "warehouse cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            base_url: settings.account_url.trim_end_matches('/').to_string(),
            settings,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn statements_url(&self) -> String {
        format!("{}/api/v2/statements", self.base_url)
    }

    fn stage_file_url(&self, stage: &str, file_name: &str) -> String {
        format!(
            "{}/api/v2/stages/{}/files/{}",
            self.base_url,
            stage.trim_start_matches('@').trim_end_matches('/'),
            file_name
        )
    }

    fn statement_request(&self, statement: &Statement) -> StatementRequest<'_> {
        StatementRequest {
            statement: statement.to_string(),
            warehouse: &self.settings.warehouse,
            database: self.settings.database.as_deref(),
            schema: self.settings.schema.as_deref(),
            role: self.settings.role.as_deref(),
            timeout: self.settings.timeout.as_secs(),
        }
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(SessionError::api_error(status.as_u16(), error_text));
        }

        Ok(response)
    }
}

#[async_trait]
impl WarehouseSession for HttpSession {
    async fn execute(&self, statement: &Statement) -> Result<()> {
        let body = self.statement_request(statement);
        tracing::debug!(kind = statement.kind(), object = %statement.target(), "Sending statement");

        let response = self
            .client
            .post(self.statements_url())
            .bearer_auth(&self.settings.token)
            .json(&body)
            .send()
            .await?;

        let response: StatementResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| SessionError::ParseError(format!("Failed to parse JSON response: {e}")))?;

        tracing::debug!(
            handle = response.statement_handle.as_deref().unwrap_or("-"),
            message = response.message.as_deref().unwrap_or(""),
            "Statement accepted"
        );
        Ok(())
    }

    async fn put_file(&self, path: &Path, stage: &str) -> Result<()> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                SessionError::InvalidConfig(format!("{} has no file name", path.display()))
            })?;

        let bytes = tokio::fs::read(path).await.map_err(|source| SessionError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let response = self
            .client
            .put(self.stage_file_url(stage, file_name))
            .bearer_auth(&self.settings.token)
            .query(&[("overwrite", "true"), ("auto_compress", "false")])
            .body(bytes)
            .send()
            .await?;

        Self::check_status(response).await?;
        Ok(())
    }
}

//! HTTPS implementation of [`RemoteIndex`].

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};

use crate::error::RemoteError;
use crate::{Config, Result};

use super::types::{
    Chunk, DeleteBranchRequest, DeleteFilesRequest, DeleteProjectRequest, ManifestQuery,
    SearchRequest, SearchResult, ServerManifest, UpsertRequest,
};
use super::RemoteIndex;

const API_PREFIX: &str = "api/codebase-indexing";

/// Derive the service base URL from a bearer token.
///
/// Tokens are issued per region as `mi_<region>_<secret>`; the region segment
/// selects the tenancy endpoint. Unrecognizable tokens fall back to the `us`
/// region so a bad token fails with 401 rather than a DNS error.
#[must_use]
pub fn derive_base_url(token: &str) -> String {
    let region = token
        .split('_')
        .nth(1)
        .filter(|r| !r.is_empty() && r.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()))
        .unwrap_or("us");

    format!("https://index.{region}.mooring.dev")
}

/// Stateless HTTPS client for the index service.
pub struct HttpRemoteIndex {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpRemoteIndex {
    /// Build a client from engine configuration.
    ///
    /// The base URL is taken from the config override when present,
    /// otherwise derived from the token.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| derive_base_url(&config.api_token));

        let http = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(RemoteError::transport)?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: config.api_token.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{API_PREFIX}/{path}", self.base_url)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, self.endpoint(path))
            .bearer_auth(&self.token)
    }

    /// Send a request and map non-success statuses to [`RemoteError`].
    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response> {
        let response = builder.send().await.map_err(RemoteError::transport)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::Status {
            status: status.as_u16(),
            body,
        }
        .into())
    }
}

#[async_trait]
impl RemoteIndex for HttpRemoteIndex {
    async fn upsert(&self, chunks: Vec<Chunk>) -> Result<()> {
        let body = UpsertRequest { chunks };
        self.send(self.request(Method::PUT, "upsert").json(&body))
            .await?;
        Ok(())
    }

    async fn search(&self, request: SearchRequest) -> Result<Vec<SearchResult>> {
        let response = self
            .send(self.request(Method::POST, "search").json(&request))
            .await?;

        response
            .json::<Vec<SearchResult>>()
            .await
            .map_err(|e| RemoteError::transport(format!("invalid search response: {e}")).into())
    }

    async fn delete_files(&self, request: DeleteFilesRequest) -> Result<()> {
        self.send(self.request(Method::DELETE, "files").json(&request))
            .await?;
        Ok(())
    }

    async fn delete_branch(&self, request: DeleteBranchRequest) -> Result<()> {
        self.send(self.request(Method::DELETE, "branch").json(&request))
            .await?;
        Ok(())
    }

    async fn delete_project(&self, request: DeleteProjectRequest) -> Result<()> {
        self.send(self.request(Method::DELETE, "project").json(&request))
            .await?;
        Ok(())
    }

    async fn manifest(&self, query: ManifestQuery) -> Result<Option<ServerManifest>> {
        let builder = self.request(Method::GET, "manifest").query(&[
            ("organizationId", query.organization_id.as_str()),
            ("projectId", query.project_id.as_str()),
            ("gitBranch", query.git_branch.as_str()),
        ]);

        let response = builder.send().await.map_err(RemoteError::transport)?;
        let status = response.status();

        // An absent manifest is a normal answer, not an error.
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let manifest = response
            .json::<ServerManifest>()
            .await
            .map_err(|e| RemoteError::transport(format!("invalid manifest response: {e}")))?;

        Ok(Some(manifest))
    }
}

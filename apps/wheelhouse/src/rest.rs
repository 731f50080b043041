//! Asynchronous client for the console's REST collaborators.
//!
//! Everything here is stateless request/response used by the
//! surrounding UI: process control, statistics, cache and certificate
//! inspection, configuration management, and session handling. The
//! synchronization core itself never calls these.

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status: {status} body={body}")]
    UnexpectedStatus { status: StatusCode, body: String },
}

#[derive(Clone)]
pub struct ConsoleApi {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl ConsoleApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.http.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn expect_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, ApiError> {
        let res = builder.send().await?;
        if res.status().is_success() {
            Ok(res.json::<T>().await?)
        } else {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            Err(ApiError::UnexpectedStatus { status, body })
        }
    }

    async fn expect_ok(builder: RequestBuilder) -> Result<(), ApiError> {
        let res = builder.send().await?;
        if res.status().is_success() {
            Ok(())
        } else {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            Err(ApiError::UnexpectedStatus { status, body })
        }
    }

    // Process control.

    pub async fn start_process(&self, id: &str) -> Result<(), ApiError> {
        Self::expect_ok(self.request(Method::POST, &format!("/api/processes/{id}/start"))).await
    }

    pub async fn stop_process(&self, id: &str) -> Result<(), ApiError> {
        Self::expect_ok(self.request(Method::POST, &format!("/api/processes/{id}/stop"))).await
    }

    pub async fn restart_process(&self, id: &str) -> Result<(), ApiError> {
        Self::expect_ok(self.request(Method::POST, &format!("/api/processes/{id}/restart"))).await
    }

    // Statistics.

    pub async fn stats_summary<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        Self::expect_json(self.request(Method::GET, "/api/stats/summary")).await
    }

    pub async fn stats_detailed<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        Self::expect_json(self.request(Method::GET, "/api/stats/detailed")).await
    }

    // Cache.

    pub async fn cache_stats<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        Self::expect_json(self.request(Method::GET, "/api/cache/stats")).await
    }

    pub async fn cache_entries<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        Self::expect_json(self.request(Method::GET, "/api/cache/entries")).await
    }

    pub async fn clear_cache(&self) -> Result<(), ApiError> {
        Self::expect_ok(self.request(Method::POST, "/api/cache/clear")).await
    }

    pub async fn delete_cache_entry(&self, key: &str) -> Result<(), ApiError> {
        Self::expect_ok(self.request(Method::DELETE, &format!("/api/cache/entries/{key}"))).await
    }

    // Certificates.

    pub async fn list_certificates<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        Self::expect_json(self.request(Method::GET, "/api/certificates")).await
    }

    // Configuration.

    pub async fn get_config<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        Self::expect_json(self.request(Method::GET, "/api/config")).await
    }

    pub async fn save_config<B: Serialize>(&self, config: &B) -> Result<(), ApiError> {
        Self::expect_ok(self.request(Method::PUT, "/api/config").json(config)).await
    }

    pub async fn validate_config<B: Serialize, T: DeserializeOwned>(
        &self,
        config: &B,
    ) -> Result<T, ApiError> {
        Self::expect_json(self.request(Method::POST, "/api/config/validate").json(config)).await
    }

    pub async fn list_backups<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        Self::expect_json(self.request(Method::GET, "/api/config/backups")).await
    }

    pub async fn restore_backup(&self, backup_id: &str) -> Result<(), ApiError> {
        Self::expect_ok(
            self.request(Method::POST, &format!("/api/config/backups/{backup_id}/restore")),
        )
        .await
    }

    // Session.

    pub async fn session_check<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        Self::expect_json(self.request(Method::GET, "/api/auth/session")).await
    }

    pub async fn login<T: DeserializeOwned>(
        &self,
        username: &str,
        password: &str,
    ) -> Result<T, ApiError> {
        let body = serde_json::json!({ "username": username, "password": password });
        Self::expect_json(self.request(Method::POST, "/api/auth/login").json(&body)).await
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        Self::expect_ok(self.request(Method::POST, "/api/auth/logout")).await
    }
}

// SPDX-License-Identifier: MPL-2.0

use crate::config::BackendConfig;
use crate::supabase::ClientError;
use crate::supabase::query::Query;
use reqwest::{Method, RequestBuilder, Response};
use serde_json::Value;
use std::future::Future;
use std::sync::RwLock;
use tracing::warn;

/// Row-level access to the hosted tables.
///
/// Everything the client does goes through these five verbs, so tests can
/// substitute an in-memory implementation for the HTTP one.
pub trait Transport: Send + Sync {
    fn select(
        &self,
        query: &Query,
    ) -> impl Future<Output = Result<Vec<Value>, ClientError>> + Send;

    /// Insert one row. With `returning` the stored row comes back.
    fn insert(
        &self,
        table: &str,
        row: Value,
        returning: bool,
    ) -> impl Future<Output = Result<Vec<Value>, ClientError>> + Send;

    fn update(
        &self,
        query: &Query,
        patch: Value,
    ) -> impl Future<Output = Result<(), ClientError>> + Send;

    fn delete(&self, query: &Query) -> impl Future<Output = Result<(), ClientError>> + Send;

    /// Exact row count of a table
    fn count(&self, table: &str) -> impl Future<Output = Result<u64, ClientError>> + Send;
}

/// Falls back to reqwest's defaults (no timeouts) when the builder is rejected
pub(crate) fn build_http(builder: reqwest::ClientBuilder) -> reqwest::Client {
    builder.build().unwrap_or_else(|e| {
        warn!("Failed to configure HTTP client, using defaults: {}", e);
        reqwest::Client::new()
    })
}

/// PostgREST over HTTPS.
pub struct HttpTransport {
    http: reqwest::Client,
    config: BackendConfig,
    access_token: RwLock<Option<String>>,
}

impl HttpTransport {
    pub fn new(config: BackendConfig) -> Self {
        let http = build_http(
            reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(20))
                .connect_timeout(std::time::Duration::from_secs(5)),
        );

        Self {
            http,
            config,
            access_token: RwLock::new(None),
        }
    }

    pub fn set_access_token(&self, token: Option<String>) {
        if let Ok(mut guard) = self.access_token.write() {
            *guard = token;
        }
    }

    /// The user's JWT when signed in; the anon key otherwise
    fn bearer(&self) -> String {
        self.access_token
            .read()
            .ok()
            .and_then(|t| t.clone())
            .unwrap_or_else(|| self.config.anon_key.clone())
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.http
            .request(method, self.config.endpoint(&format!("rest/v1/{table}")))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(self.bearer())
    }
}

impl Transport for HttpTransport {
    async fn select(&self, query: &Query) -> Result<Vec<Value>, ClientError> {
        let response = self
            .request(Method::GET, query.table_name())
            .query(&query.to_pairs())
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json::<Vec<Value>>().await?)
    }

    async fn insert(
        &self,
        table: &str,
        row: Value,
        returning: bool,
    ) -> Result<Vec<Value>, ClientError> {
        let prefer = if returning {
            "return=representation"
        } else {
            "return=minimal"
        };
        let response = self
            .request(Method::POST, table)
            .header("Prefer", prefer)
            .json(&row)
            .send()
            .await?;
        let response = check_status(response).await?;

        if returning {
            Ok(response.json::<Vec<Value>>().await?)
        } else {
            Ok(Vec::new())
        }
    }

    async fn update(&self, query: &Query, patch: Value) -> Result<(), ClientError> {
        let response = self
            .request(Method::PATCH, query.table_name())
            .header("Prefer", "return=minimal")
            .query(&query.to_pairs())
            .json(&patch)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn delete(&self, query: &Query) -> Result<(), ClientError> {
        let response = self
            .request(Method::DELETE, query.table_name())
            .query(&query.to_pairs())
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn count(&self, table: &str) -> Result<u64, ClientError> {
        let response = self
            .request(Method::HEAD, table)
            .header("Prefer", "count=exact")
            .query(&[("select", "id")])
            .send()
            .await?;
        let response = check_status(response).await?;

        response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or_else(|| ClientError::InvalidResponse("missing row count".to_string()))
    }
}

/// Turn non-2xx responses into [`ClientError::Api`], keeping PostgREST's message.
async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Api {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

/// PostgREST and GoTrue put the human-readable part in different fields
pub(crate) fn error_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|v| {
            ["message", "msg", "error_description", "error"]
                .iter()
                .find_map(|key| v.get(*key).and_then(Value::as_str))
        })
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}

/// `Content-Range: 0-24/3573` → 3573. An unknown total (`*`) yields None.
pub(crate) fn parse_content_range_total(header: &str) -> Option<u64> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_builder_falls_back_to_default_client() {
        // A header value with a newline makes build() fail
        let builder = reqwest::Client::builder().user_agent("parley\nbroken");
        let http = build_http(builder);
        assert!(http.get("https://example.invalid/").build().is_ok());
    }

    #[test]
    fn test_content_range_total() {
        assert_eq!(parse_content_range_total("0-24/3573"), Some(3573));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("0-24/*"), None);
        assert_eq!(parse_content_range_total("garbage"), None);
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(r#"{"code":"23505","message":"duplicate key value"}"#),
            "duplicate key value"
        );
        assert_eq!(
            error_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
            "Invalid login credentials"
        );
        assert_eq!(error_message("  bad gateway \n"), "bad gateway");
    }

    #[test]
    fn test_bearer_falls_back_to_anon_key() {
        let config = BackendConfig::new("https://abc.supabase.co", "anon").unwrap();
        let transport = HttpTransport::new(config);
        assert_eq!(transport.bearer(), "anon");

        transport.set_access_token(Some("jwt".to_string()));
        assert_eq!(transport.bearer(), "jwt");

        transport.set_access_token(None);
        assert_eq!(transport.bearer(), "anon");
    }
}

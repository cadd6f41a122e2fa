// SPDX-License-Identifier: MPL-2.0

use crate::state::AppSettings;
use thiserror::Error;
use url::Url;

pub const APP_ID: &str = "io.github.parley.Parley";
pub const APP_NAME: &str = "Parley";

#[cfg(feature = "devel")]
pub const IS_DEVEL: bool = true;
#[cfg(not(feature = "devel"))]
pub const IS_DEVEL: bool = false;

pub const ENV_BACKEND_URL: &str = "SUPABASE_URL";
pub const ENV_ANON_KEY: &str = "SUPABASE_ANON_KEY";

/// Most recent messages shown when a channel is opened
pub const MESSAGE_PAGE_SIZE: usize = 100;
/// Maximum rows returned by a username search
pub const SEARCH_LIMIT: usize = 10;
pub const MIN_PASSWORD_LEN: usize = 6;
pub const DEFAULT_CHANNEL_NAME: &str = "general";

/// Sender profiles younger than this are served from the local cache
pub const PROFILE_CACHE_MAX_AGE_SECS: i64 = 10 * 60;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing backend url (set {ENV_BACKEND_URL})")]
    MissingUrl,
    #[error("missing anon key (set {ENV_ANON_KEY})")]
    MissingAnonKey,
    #[error("invalid backend url: {0}")]
    InvalidUrl(String),
}

/// Where the hosted backend lives and the public key used to talk to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub url: Url,
    pub anon_key: String,
}

impl BackendConfig {
    /// Environment first, then the `backend` section of the settings file.
    pub fn resolve(settings: &AppSettings) -> Result<Self, ConfigError> {
        let env_url = std::env::var(ENV_BACKEND_URL).ok();
        let env_key = std::env::var(ENV_ANON_KEY).ok();
        let stored = settings.backend.as_ref();

        let url = env_url
            .or_else(|| stored.map(|b| b.url.clone()))
            .filter(|u| !u.trim().is_empty())
            .ok_or(ConfigError::MissingUrl)?;
        let anon_key = env_key
            .or_else(|| stored.map(|b| b.anon_key.clone()))
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingAnonKey)?;

        Self::new(&url, &anon_key)
    }

    pub fn new(url: &str, anon_key: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(url.trim()).map_err(|e| ConfigError::InvalidUrl(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl(format!(
                "unsupported scheme {}",
                url.scheme()
            )));
        }
        Ok(Self {
            url,
            anon_key: anon_key.trim().to_string(),
        })
    }

    /// Join a path like `rest/v1/channels` onto the project url.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn realtime_url(&self) -> Result<Url, ConfigError> {
        let mut url = self.url.clone();
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|_| ConfigError::InvalidUrl("cannot derive websocket url".to_string()))?;
        let base = url.as_str().trim_end_matches('/').to_string();
        let mut url = Url::parse(&format!("{base}/realtime/v1/websocket"))
            .map_err(|e| ConfigError::InvalidUrl(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("apikey", &self.anon_key)
            .append_pair("vsn", "1.0.0");
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let config = BackendConfig::new("https://abc.supabase.co/", "key").unwrap();
        assert_eq!(
            config.endpoint("/rest/v1/channels"),
            "https://abc.supabase.co/rest/v1/channels"
        );
    }

    #[test]
    fn test_realtime_url_uses_websocket_scheme() {
        let config = BackendConfig::new("https://abc.supabase.co", "anon").unwrap();
        let url = config.realtime_url().unwrap();
        assert_eq!(url.scheme(), "wss");
        assert_eq!(url.path(), "/realtime/v1/websocket");
        assert!(url.query().unwrap().contains("apikey=anon"));

        let local = BackendConfig::new("http://localhost:54321", "anon").unwrap();
        assert_eq!(local.realtime_url().unwrap().scheme(), "ws");
    }

    #[test]
    fn test_rejects_non_http_url() {
        assert!(matches!(
            BackendConfig::new("ftp://example.com", "k"),
            Err(ConfigError::InvalidUrl(_))
        ));
        assert!(BackendConfig::new("not a url", "k").is_err());
    }
}

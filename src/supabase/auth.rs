// SPDX-License-Identifier: MPL-2.0

use crate::config::BackendConfig;
use crate::state::validation::{validate_password_change, validate_username};
use crate::supabase::ClientError;
use crate::supabase::rest::{build_http, error_message};
use crate::supabase::types::Session;
use reqwest::Response;
use serde::Deserialize;
use serde_json::json;

/// Result of a sign-up: projects with e-mail confirmation return no session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    SignedIn(Session),
    ConfirmationRequired,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: AuthUser,
}

impl TokenResponse {
    fn into_session(self, now: i64) -> Session {
        let expires_at = self
            .expires_at
            .unwrap_or_else(|| now + self.expires_in.unwrap_or(3600));
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user_id: self.user.id,
            email: self.user.email,
        }
    }
}

/// Email/password accounts on the hosted auth service.
pub struct AuthClient {
    http: reqwest::Client,
    config: BackendConfig,
}

impl AuthClient {
    pub fn new(config: BackendConfig) -> Self {
        let http = build_http(
            reqwest::Client::builder().timeout(std::time::Duration::from_secs(20)),
        );
        Self { http, config }
    }

    fn url(&self, path: &str) -> String {
        self.config.endpoint(&format!("auth/v1/{path}"))
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        let response = self
            .http
            .post(self.url("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.config.anon_key)
            .json(&json!({ "email": email.trim(), "password": password }))
            .send()
            .await?;

        let token: TokenResponse = auth_json(response).await?;
        Ok(token.into_session(now()))
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<SignUpOutcome, ClientError> {
        let username = validate_username(username)?;
        validate_password_change(password, password)?;

        let response = self
            .http
            .post(self.url("signup"))
            .header("apikey", &self.config.anon_key)
            .json(&json!({
                "email": email.trim(),
                "password": password,
                "data": { "username": username },
            }))
            .send()
            .await?;

        let body: serde_json::Value = auth_json(response).await?;
        parse_sign_up(body, now())
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<Session, ClientError> {
        let response = self
            .http
            .post(self.url("token"))
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.config.anon_key)
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        let token: TokenResponse = auth_json(response).await?;
        Ok(token.into_session(now()))
    }

    pub async fn update_password(
        &self,
        session: &Session,
        new_password: &str,
        confirmation: &str,
    ) -> Result<(), ClientError> {
        validate_password_change(new_password, confirmation)?;

        let response = self
            .http
            .put(self.url("user"))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(&session.access_token)
            .json(&json!({ "password": new_password }))
            .send()
            .await?;

        let _: serde_json::Value = auth_json(response).await?;
        Ok(())
    }

    pub async fn sign_out(&self, session: &Session) -> Result<(), ClientError> {
        let response = self
            .http
            .post(self.url("logout"))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(&session.access_token)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            Err(ClientError::Api {
                status,
                message: error_message(&body),
            })
        }
    }
}

async fn auth_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ClientError::Auth(error_message(&body)));
    }
    Ok(serde_json::from_str(&body)?)
}

fn parse_sign_up(body: serde_json::Value, now: i64) -> Result<SignUpOutcome, ClientError> {
    if body.get("access_token").is_some() {
        let token: TokenResponse = serde_json::from_value(body)?;
        Ok(SignUpOutcome::SignedIn(token.into_session(now)))
    } else {
        Ok(SignUpOutcome::ConfirmationRequired)
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_uses_expires_in_when_absolute_missing() {
        let token: TokenResponse = serde_json::from_value(json!({
            "access_token": "jwt",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "refresh",
            "user": { "id": "u1", "email": "a@example.com" }
        }))
        .unwrap();

        let session = token.into_session(1_000);
        assert_eq!(session.expires_at, 4_600);
        assert_eq!(session.user_id, "u1");
        assert_eq!(session.email.as_deref(), Some("a@example.com"));
    }

    #[test]
    fn test_sign_up_without_session_needs_confirmation() {
        let body = json!({ "id": "u1", "email": "a@example.com", "confirmation_sent_at": "2025-01-01T00:00:00Z" });
        assert_eq!(
            parse_sign_up(body, 0).unwrap(),
            SignUpOutcome::ConfirmationRequired
        );
    }

    #[test]
    fn test_sign_up_with_session() {
        let body = json!({
            "access_token": "jwt",
            "refresh_token": "r",
            "expires_at": 99,
            "user": { "id": "u1" }
        });
        match parse_sign_up(body, 0).unwrap() {
            SignUpOutcome::SignedIn(session) => {
                assert_eq!(session.expires_at, 99);
                assert_eq!(session.email, None);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}

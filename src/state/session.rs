// SPDX-License-Identifier: MPL-2.0

use crate::config::APP_ID;
use crate::supabase::Session;
use secret_service::{Collection, EncryptionType, SecretService};
use thiserror::Error;

const SECRET_LABEL: &str = "Parley Session";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("secret service unavailable: {0}")]
    SecretService(String),
    #[error("session not found")]
    NotFound,
    #[error("invalid session data: {0}")]
    InvalidData(String),
}

impl From<secret_service::Error> for SessionError {
    fn from(e: secret_service::Error) -> Self {
        SessionError::SecretService(e.to_string())
    }
}

/// Persists the signed-in session via libsecret.
pub struct SessionManager;

impl SessionManager {
    /// Default collection, unlocked
    async fn collection<'a>(ss: &'a SecretService<'a>) -> Result<Collection<'a>, SessionError> {
        let collection = ss.get_default_collection().await?;
        if collection.is_locked().await.unwrap_or(true) {
            collection.unlock().await?;
        }
        Ok(collection)
    }

    pub async fn store(session: &Session) -> Result<(), SessionError> {
        let ss = SecretService::connect(EncryptionType::Dh).await?;
        let collection = Self::collection(&ss).await?;

        let session_json =
            serde_json::to_string(session).map_err(|e| SessionError::InvalidData(e.to_string()))?;

        // One stored session per app; a new sign-in replaces the previous user
        Self::clear_items(&collection).await?;
        let attributes = vec![("application", APP_ID), ("user_id", session.user_id.as_str())];

        collection
            .create_item(
                SECRET_LABEL,
                attributes.into_iter().collect(),
                session_json.as_bytes(),
                true, // replace existing
                "text/plain",
            )
            .await?;

        tracing::debug!("Session stored");
        Ok(())
    }

    pub async fn load() -> Result<Session, SessionError> {
        let ss = SecretService::connect(EncryptionType::Dh).await?;
        let collection = Self::collection(&ss).await?;

        let attributes = vec![("application", APP_ID)];
        let items = collection
            .search_items(attributes.into_iter().collect())
            .await?;

        let item = items.first().ok_or(SessionError::NotFound)?;
        let secret = item.get_secret().await?;

        serde_json::from_slice(&secret).map_err(|e| SessionError::InvalidData(e.to_string()))
    }

    pub async fn clear() -> Result<(), SessionError> {
        let ss = SecretService::connect(EncryptionType::Dh).await?;
        let collection = Self::collection(&ss).await?;
        Self::clear_items(&collection).await?;
        tracing::debug!("Session cleared");
        Ok(())
    }

    async fn clear_items(collection: &Collection<'_>) -> Result<(), SessionError> {
        let attributes = vec![("application", APP_ID)];
        let items = collection
            .search_items(attributes.into_iter().collect())
            .await?;

        for item in items {
            item.delete().await?;
        }
        Ok(())
    }
}

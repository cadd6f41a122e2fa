// SPDX-License-Identifier: MPL-2.0

mod auth;
mod client;
mod query;
mod realtime;
mod rest;
mod types;

pub use auth::{AuthClient, SignUpOutcome};
pub use client::ParleyClient;
pub use realtime::RealtimeClient;
pub use rest::{HttpTransport, Transport};
pub use types::{
    AdminOverview, Channel, ChannelKind, Friendship, FriendshipStatus, MemberRole, Message,
    Profile, Server, ServerMember, Session, format_date, format_time,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("request failed ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("realtime error: {0}")]
    Realtime(String),
    #[error("{0}")]
    Validation(#[from] crate::state::ValidationError),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::InvalidResponse(e.to_string())
    }
}

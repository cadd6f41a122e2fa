// SPDX-License-Identifier: MPL-2.0

use serde::{Deserialize, Serialize};

/// Auth session issued by the backend's password grant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds
    pub expires_at: i64,
    pub user_id: String,
    pub email: Option<String>,
}

impl Session {
    pub fn is_expired(&self, now: i64) -> bool {
        // The last minute counts as expired
        now >= self.expires_at - 60
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub is_owner: bool,
    pub created_at: String,
}

impl Profile {
    /// Display name when set, otherwise the username
    pub fn display_label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.username)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Server {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub icon_url: Option<String>,
    pub owner_id: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Text,
    /// Modeled by the schema, never offered in the UI
    Voice,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Channel {
    pub id: String,
    pub server_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ChannelKind,
    pub position: i32,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub channel_id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
    /// Sender, embedded by the `profiles(*)` join or attached after a realtime insert
    #[serde(default, rename = "profiles", skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
}

impl Message {
    pub fn sender_label(&self) -> &str {
        self.profile
            .as_ref()
            .map(Profile::display_label)
            .unwrap_or("Unknown")
    }

    pub fn sender_is_owner(&self) -> bool {
        self.profile.as_ref().is_some_and(|p| p.is_owner)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Owner,
    Admin,
    Member,
}

impl MemberRole {
    pub fn can_manage_channels(self) -> bool {
        matches!(self, Self::Owner | Self::Admin)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerMember {
    pub id: String,
    pub server_id: String,
    pub user_id: String,
    pub role: MemberRole,
    pub joined_at: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FriendshipStatus {
    Pending,
    Accepted,
    Blocked,
}

impl FriendshipStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Blocked => "blocked",
        }
    }
}

/// Directional: `user_id` sent the request, `friend_id` received it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Friendship {
    pub id: String,
    pub user_id: String,
    pub friend_id: String,
    pub status: FriendshipStatus,
    pub created_at: String,
    #[serde(default)]
    pub requester: Option<Profile>,
    #[serde(default)]
    pub addressee: Option<Profile>,
}

/// Everything the admin panel shows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminOverview {
    pub users: Vec<Profile>,
    pub servers: Vec<Server>,
    pub total_messages: u64,
}

impl AdminOverview {
    pub fn total_users(&self) -> usize {
        self.users.len()
    }

    pub fn total_servers(&self) -> usize {
        self.servers.len()
    }
}

/// Local wall-clock time for a message header, e.g. "14:05"
pub fn format_time(timestamp: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(timestamp)
        .map(|dt| dt.with_timezone(&chrono::Local).format("%H:%M").to_string())
        .unwrap_or_default()
}

/// Local calendar date, e.g. "Mar 4, 2025"
pub fn format_date(timestamp: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(timestamp)
        .map(|dt| {
            dt.with_timezone(&chrono::Local)
                .format("%b %-d, %Y")
                .to_string()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_with_embedded_profile() {
        let message: Message = serde_json::from_value(json!({
            "id": "m1",
            "channel_id": "c1",
            "user_id": "u1",
            "content": "hello",
            "created_at": "2025-01-01T10:00:00+00:00",
            "updated_at": "2025-01-01T10:00:00+00:00",
            "profiles": {
                "id": "u1",
                "username": "alice",
                "display_name": null,
                "avatar_url": null,
                "is_owner": true,
                "created_at": "2024-12-01T00:00:00+00:00"
            }
        }))
        .unwrap();

        assert_eq!(message.sender_label(), "alice");
        assert!(message.sender_is_owner());
    }

    #[test]
    fn test_message_without_profile_is_unknown() {
        let message: Message = serde_json::from_value(json!({
            "id": "m1",
            "channel_id": "c1",
            "user_id": "u1",
            "content": "hello",
            "created_at": "2025-01-01T10:00:00+00:00",
            "updated_at": "2025-01-01T10:00:00+00:00"
        }))
        .unwrap();

        assert_eq!(message.sender_label(), "Unknown");
        assert!(!message.sender_is_owner());
    }

    #[test]
    fn test_channel_kind_uses_type_field() {
        let channel: Channel = serde_json::from_value(json!({
            "id": "c1",
            "server_id": "s1",
            "name": "general",
            "type": "voice",
            "position": 3,
            "created_at": "2025-01-01T10:00:00+00:00"
        }))
        .unwrap();
        assert_eq!(channel.kind, ChannelKind::Voice);
        assert_eq!(serde_json::to_value(channel).unwrap()["type"], "voice");
    }

    #[test]
    fn test_roles() {
        assert!(MemberRole::Owner.can_manage_channels());
        assert!(MemberRole::Admin.can_manage_channels());
        assert!(!MemberRole::Member.can_manage_channels());
    }

    #[test]
    fn test_blank_display_name_falls_back_to_username() {
        let profile = Profile {
            id: "u1".into(),
            username: "bob".into(),
            display_name: Some("  ".into()),
            avatar_url: None,
            is_owner: false,
            created_at: String::new(),
        };
        assert_eq!(profile.display_label(), "bob");
    }

    #[test]
    fn test_session_expiry_margin() {
        let session = Session {
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_at: 1_000,
            user_id: "u".into(),
            email: None,
        };
        assert!(!session.is_expired(900));
        assert!(session.is_expired(950));
    }

    #[test]
    fn test_format_invalid_timestamp_is_empty() {
        assert_eq!(format_time("yesterday"), "");
        assert_eq!(format_date(""), "");
        assert!(!format_date("2025-03-04T12:00:00Z").is_empty());
    }
}

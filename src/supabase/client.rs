// SPDX-License-Identifier: MPL-2.0

use crate::cache::{CacheDb, ProfileCache};
use crate::config::{
    DEFAULT_CHANNEL_NAME, MESSAGE_PAGE_SIZE, PROFILE_CACHE_MAX_AGE_SECS, SEARCH_LIMIT,
};
use crate::state::ValidationError;
use crate::state::validation::normalize_name;
use crate::supabase::ClientError;
use crate::supabase::query::Query;
use crate::supabase::rest::Transport;
use crate::supabase::types::{
    AdminOverview, Channel, ChannelKind, Friendship, FriendshipStatus, MemberRole, Message,
    Profile, Server, ServerMember,
};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

/// Embeds both sides of a friendship through their foreign keys
const FRIENDSHIP_SELECT: &str = "*,requester:profiles!friendships_user_id_fkey(*),addressee:profiles!friendships_friend_id_fkey(*)";

/// Position for a channel appended after `existing`
pub fn next_channel_position(existing: &[Channel]) -> i32 {
    existing
        .iter()
        .map(|c| c.position)
        .max()
        .map_or(0, |max| max + 1)
}

/// Every query and mutation the app issues, typed.
pub struct ParleyClient<T: Transport> {
    transport: T,
}

impl<T: Transport> ParleyClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    // Servers and channels

    pub async fn list_servers(&self, user_id: &str) -> Result<Vec<Server>, ClientError> {
        let query = Query::table("server_members")
            .select("servers(*)")
            .eq("user_id", user_id);

        let rows = self.transport.select(&query).await?;
        rows.into_iter()
            .filter_map(|mut row| match row.get_mut("servers").map(Value::take) {
                Some(Value::Null) | None => None,
                Some(server) => Some(decode::<Server>(server)),
            })
            .collect()
    }

    pub async fn list_channels(&self, server_id: &str) -> Result<Vec<Channel>, ClientError> {
        let query = Query::table("channels")
            .select("*")
            .eq("server_id", server_id)
            .order("position", true);
        decode_rows(self.transport.select(&query).await?)
    }

    /// The caller's membership row in a server, if any
    pub async fn membership(
        &self,
        server_id: &str,
        user_id: &str,
    ) -> Result<Option<ServerMember>, ClientError> {
        let query = Query::table("server_members")
            .select("*")
            .eq("server_id", server_id)
            .eq("user_id", user_id)
            .limit(1);
        let rows = self.transport.select(&query).await?;
        rows.into_iter().next().map(decode).transpose()
    }

    /// Creates the server, the owner's membership and a single `general` channel.
    pub async fn create_server(&self, user_id: &str, name: &str) -> Result<Server, ClientError> {
        let name = normalize_name(name).ok_or(ValidationError::EmptyName)?;

        let rows = self
            .transport
            .insert("servers", json!({ "name": name, "owner_id": user_id }), true)
            .await?;
        let server: Server = first_row(rows)?;

        self.transport
            .insert(
                "server_members",
                json!({
                    "server_id": server.id,
                    "user_id": user_id,
                    "role": MemberRole::Owner.as_str(),
                }),
                false,
            )
            .await?;

        self.transport
            .insert(
                "channels",
                json!({
                    "server_id": server.id,
                    "name": DEFAULT_CHANNEL_NAME,
                    "type": ChannelKind::Text,
                    "position": 0,
                }),
                false,
            )
            .await?;

        info!(server_id = %server.id, "Created server");
        Ok(server)
    }

    /// Appends a text channel after the server's current last position.
    pub async fn create_channel(&self, server_id: &str, name: &str) -> Result<Channel, ClientError> {
        let name = normalize_name(name).ok_or(ValidationError::EmptyName)?;
        let existing = self.list_channels(server_id).await?;
        let position = next_channel_position(&existing);

        let rows = self
            .transport
            .insert(
                "channels",
                json!({
                    "server_id": server_id,
                    "name": name,
                    "type": ChannelKind::Text,
                    "position": position,
                }),
                true,
            )
            .await?;

        let channel: Channel = first_row(rows)?;
        info!(channel_id = %channel.id, position, "Created channel");
        Ok(channel)
    }

    pub async fn delete_server(&self, server_id: &str) -> Result<(), ClientError> {
        let query = Query::table("servers").eq("id", server_id);
        self.transport.delete(&query).await?;
        info!(%server_id, "Deleted server");
        Ok(())
    }

    // Messages

    /// The latest page of a channel, oldest first
    pub async fn recent_messages(&self, channel_id: &str) -> Result<Vec<Message>, ClientError> {
        let query = Query::table("messages")
            .select("*,profiles(*)")
            .eq("channel_id", channel_id)
            .order("created_at", false)
            .limit(MESSAGE_PAGE_SIZE);

        let mut messages: Vec<Message> = decode_rows(self.transport.select(&query).await?)?;
        messages.reverse();
        Ok(messages)
    }

    /// Inserts only. The message comes back through the channel subscription.
    pub async fn send_message(
        &self,
        channel_id: &str,
        user_id: &str,
        content: &str,
    ) -> Result<(), ClientError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }

        self.transport
            .insert(
                "messages",
                json!({
                    "channel_id": channel_id,
                    "user_id": user_id,
                    "content": content,
                }),
                false,
            )
            .await?;
        debug!(%channel_id, "Message sent");
        Ok(())
    }

    /// Decode a realtime insert record and attach its sender
    pub fn message_from_record(
        &self,
        record: Value,
        sender: Option<Profile>,
    ) -> Result<Message, ClientError> {
        let mut message: Message = decode(record)?;
        message.profile = sender;
        Ok(message)
    }

    /// Turn a realtime insert into a displayable message. The sender comes from
    /// the profile cache while fresh, otherwise it is fetched and cached.
    pub async fn resolve_insert(
        &self,
        cache: Option<&CacheDb>,
        record: Value,
    ) -> Result<Message, ClientError> {
        let Some(sender_id) = record.get("user_id").and_then(Value::as_str) else {
            return Err(ClientError::InvalidResponse(
                "insert without user_id".to_string(),
            ));
        };
        let sender_id = sender_id.to_string();
        let sender = self.resolve_sender(cache, &sender_id).await;
        self.message_from_record(record, sender)
    }

    async fn resolve_sender(&self, cache: Option<&CacheDb>, user_id: &str) -> Option<Profile> {
        if let Some(db) = cache {
            match ProfileCache::new(db).get_fresh(user_id, PROFILE_CACHE_MAX_AGE_SECS) {
                Ok(Some(profile)) => return Some(profile),
                Ok(None) => {}
                Err(e) => warn!("Profile cache lookup failed: {}", e),
            }
        }

        match self.profile(user_id).await {
            Ok(profile) => {
                if let Some(db) = cache
                    && let Err(e) = ProfileCache::new(db).store(&profile)
                {
                    warn!("Failed to cache sender profile: {}", e);
                }
                Some(profile)
            }
            Err(e) => {
                warn!(%user_id, "Failed to resolve sender: {}", e);
                None
            }
        }
    }

    // Profiles

    pub async fn profile(&self, id: &str) -> Result<Profile, ClientError> {
        let query = Query::table("profiles").select("*").eq("id", id).limit(1);
        let rows = self.transport.select(&query).await?;
        first_row(rows)
    }

    pub async fn update_display_name(
        &self,
        user_id: &str,
        display_name: &str,
    ) -> Result<(), ClientError> {
        let display_name = normalize_name(display_name);
        let query = Query::table("profiles").eq("id", user_id);
        self.transport
            .update(&query, json!({ "display_name": display_name }))
            .await?;
        info!("Display name updated");
        Ok(())
    }

    // Friends

    /// Case-insensitive username search, never including the caller
    pub async fn search_profiles(
        &self,
        user_id: &str,
        term: &str,
    ) -> Result<Vec<Profile>, ClientError> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }

        let query = Query::table("profiles")
            .select("*")
            .ilike_contains("username", term)
            .neq("id", user_id)
            .limit(SEARCH_LIMIT);
        let mut profiles: Vec<Profile> = decode_rows(self.transport.select(&query).await?)?;
        profiles.retain(|p| p.id != user_id);
        profiles.truncate(SEARCH_LIMIT);
        Ok(profiles)
    }

    /// Every friendship the caller is on either side of
    pub async fn friendships(&self, user_id: &str) -> Result<Vec<Friendship>, ClientError> {
        let query = Query::table("friendships")
            .select(FRIENDSHIP_SELECT)
            .or_eq(&[("user_id", user_id), ("friend_id", user_id)]);
        decode_rows(self.transport.select(&query).await?)
    }

    pub async fn send_friend_request(
        &self,
        user_id: &str,
        friend_id: &str,
    ) -> Result<(), ClientError> {
        if user_id == friend_id {
            return Err(ValidationError::SelfFriendship.into());
        }

        self.transport
            .insert(
                "friendships",
                json!({
                    "user_id": user_id,
                    "friend_id": friend_id,
                    "status": FriendshipStatus::Pending.as_str(),
                }),
                false,
            )
            .await?;
        info!(%friend_id, "Friend request sent");
        Ok(())
    }

    pub async fn accept_friend_request(&self, friendship_id: &str) -> Result<(), ClientError> {
        let query = Query::table("friendships").eq("id", friendship_id);
        self.transport
            .update(
                &query,
                json!({ "status": FriendshipStatus::Accepted.as_str() }),
            )
            .await
    }

    /// Declines a pending request or ends an accepted friendship
    pub async fn remove_friendship(&self, friendship_id: &str) -> Result<(), ClientError> {
        let query = Query::table("friendships").eq("id", friendship_id);
        self.transport.delete(&query).await
    }

    // Admin

    pub async fn admin_overview(&self) -> Result<AdminOverview, ClientError> {
        let users_query = Query::table("profiles")
            .select("*")
            .order("created_at", false);
        let servers_query = Query::table("servers")
            .select("*")
            .order("created_at", false);

        let (users, servers, total_messages) = tokio::try_join!(
            self.transport.select(&users_query),
            self.transport.select(&servers_query),
            self.transport.count("messages"),
        )?;

        Ok(AdminOverview {
            users: decode_rows(users)?,
            servers: decode_rows(servers)?,
            total_messages,
        })
    }

    pub async fn delete_profile(&self, user_id: &str) -> Result<(), ClientError> {
        let query = Query::table("profiles").eq("id", user_id);
        self.transport.delete(&query).await?;
        info!(%user_id, "Deleted user");
        Ok(())
    }
}

fn decode<R: DeserializeOwned>(row: Value) -> Result<R, ClientError> {
    Ok(serde_json::from_value(row)?)
}

fn decode_rows<R: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<R>, ClientError> {
    rows.into_iter().map(decode).collect()
}

fn first_row<R: DeserializeOwned>(rows: Vec<Value>) -> Result<R, ClientError> {
    let row = rows
        .into_iter()
        .next()
        .ok_or_else(|| ClientError::InvalidResponse("no row returned".to_string()))?;
    decode(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Select(Query),
        Insert {
            table: String,
            row: Value,
            returning: bool,
        },
        Update(Query, Value),
        Delete(Query),
        Count(String),
    }

    /// Records every call and answers selects/inserts from a script.
    /// Selects on a table listed in `tables` ignore the script.
    #[derive(Default)]
    struct RecordingTransport {
        calls: Mutex<Vec<Call>>,
        responses: Mutex<VecDeque<Vec<Value>>>,
        tables: HashMap<String, Vec<Value>>,
        count: u64,
        /// Selects on this table fail
        unreachable: Option<String>,
    }

    impl RecordingTransport {
        fn with_responses(responses: Vec<Vec<Value>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                ..Default::default()
            }
        }

        fn next_response(&self) -> Vec<Value> {
            self.responses.lock().unwrap().pop_front().unwrap_or_default()
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn inserts_into(&self, table: &str) -> Vec<Value> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Insert { table: t, row, .. } if t == table => Some(row),
                    _ => None,
                })
                .collect()
        }
    }

    impl Transport for RecordingTransport {
        async fn select(&self, query: &Query) -> Result<Vec<Value>, ClientError> {
            self.calls.lock().unwrap().push(Call::Select(query.clone()));
            if self.unreachable.as_deref() == Some(query.table_name()) {
                return Err(ClientError::Network("connection refused".to_string()));
            }
            match self.tables.get(query.table_name()) {
                Some(rows) => Ok(rows.clone()),
                None => Ok(self.next_response()),
            }
        }

        async fn insert(
            &self,
            table: &str,
            row: Value,
            returning: bool,
        ) -> Result<Vec<Value>, ClientError> {
            self.calls.lock().unwrap().push(Call::Insert {
                table: table.to_string(),
                row,
                returning,
            });
            if returning {
                Ok(self.next_response())
            } else {
                Ok(Vec::new())
            }
        }

        async fn update(&self, query: &Query, patch: Value) -> Result<(), ClientError> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Update(query.clone(), patch));
            Ok(())
        }

        async fn delete(&self, query: &Query) -> Result<(), ClientError> {
            self.calls.lock().unwrap().push(Call::Delete(query.clone()));
            Ok(())
        }

        async fn count(&self, table: &str) -> Result<u64, ClientError> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Count(table.to_string()));
            Ok(self.count)
        }
    }

    fn server_row(id: &str) -> Value {
        json!({
            "id": id,
            "name": "Rustaceans",
            "icon_url": null,
            "owner_id": "me",
            "created_at": "2025-01-01T00:00:00Z"
        })
    }

    fn channel_row(id: &str, position: i32) -> Value {
        json!({
            "id": id,
            "server_id": "s1",
            "name": format!("chan-{position}"),
            "type": "text",
            "position": position,
            "created_at": "2025-01-01T00:00:00Z"
        })
    }

    fn profile_row(id: &str, username: &str) -> Value {
        json!({
            "id": id,
            "username": username,
            "display_name": null,
            "avatar_url": null,
            "is_owner": false,
            "created_at": "2025-01-01T00:00:00Z"
        })
    }

    fn message_row(id: &str, created_at: &str) -> Value {
        json!({
            "id": id,
            "channel_id": "c1",
            "user_id": "u1",
            "content": format!("message {id}"),
            "created_at": created_at,
            "updated_at": created_at,
            "profiles": profile_row("u1", "alice")
        })
    }

    fn channel(position: i32) -> Channel {
        serde_json::from_value(channel_row(&format!("c{position}"), position)).unwrap()
    }

    #[test]
    fn test_next_channel_position() {
        assert_eq!(next_channel_position(&[]), 0);
        assert_eq!(next_channel_position(&[channel(0)]), 1);
        assert_eq!(next_channel_position(&[channel(4), channel(1), channel(2)]), 5);
    }

    #[tokio::test]
    async fn test_create_server_adds_owner_and_one_general_channel() {
        let transport = RecordingTransport::with_responses(vec![vec![server_row("s1")]]);
        let client = ParleyClient::new(transport);

        let server = client.create_server("me", "  Rustaceans ").await.unwrap();
        assert_eq!(server.id, "s1");

        let transport = client.transport();
        let servers = transport.inserts_into("servers");
        assert_eq!(servers, vec![json!({ "name": "Rustaceans", "owner_id": "me" })]);

        let members = transport.inserts_into("server_members");
        assert_eq!(members.len(), 1);
        assert_eq!(members[0]["role"], "owner");
        assert_eq!(members[0]["user_id"], "me");

        let channels = transport.inserts_into("channels");
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0]["name"], "general");
        assert_eq!(channels[0]["position"], 0);
        assert_eq!(channels[0]["type"], "text");
        assert_eq!(channels[0]["server_id"], "s1");
    }

    #[tokio::test]
    async fn test_create_server_rejects_blank_name_without_requests() {
        let client = ParleyClient::new(RecordingTransport::default());
        let err = client.create_server("me", "   ").await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(ValidationError::EmptyName)));
        assert!(client.transport().calls().is_empty());
    }

    #[tokio::test]
    async fn test_create_channel_appends_after_max_position() {
        let transport = RecordingTransport::with_responses(vec![
            vec![channel_row("c0", 0), channel_row("c3", 3), channel_row("c1", 1)],
            vec![channel_row("c4", 4)],
        ]);
        let client = ParleyClient::new(transport);

        let created = client.create_channel("s1", "random").await.unwrap();
        assert_eq!(created.position, 4);

        let inserted = client.transport().inserts_into("channels");
        assert_eq!(inserted[0]["position"], 4);
        assert_eq!(inserted[0]["name"], "random");
    }

    #[tokio::test]
    async fn test_create_first_channel_uses_position_zero() {
        let transport = RecordingTransport::with_responses(vec![vec![], vec![channel_row("c0", 0)]]);
        let client = ParleyClient::new(transport);

        client.create_channel("s1", "general").await.unwrap();
        assert_eq!(client.transport().inserts_into("channels")[0]["position"], 0);
    }

    #[tokio::test]
    async fn test_list_servers_skips_missing_embeds() {
        let transport = RecordingTransport::with_responses(vec![vec![
            json!({ "servers": server_row("s1") }),
            json!({ "servers": null }),
            json!({ "servers": server_row("s2") }),
        ]]);
        let client = ParleyClient::new(transport);

        let servers = client.list_servers("me").await.unwrap();
        let ids: Vec<_> = servers.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["s1", "s2"]);

        match &client.transport().calls()[0] {
            Call::Select(q) => {
                assert_eq!(q.table_name(), "server_members");
                assert_eq!(q.filter_value("user_id"), Some("eq.me"));
            }
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_deleted_server_is_gone_on_next_load() {
        let transport = RecordingTransport::with_responses(vec![
            vec![json!({ "servers": server_row("s1") }), json!({ "servers": server_row("s2") })],
            vec![json!({ "servers": server_row("s2") })],
        ]);
        let client = ParleyClient::new(transport);

        assert_eq!(client.list_servers("me").await.unwrap().len(), 2);
        client.delete_server("s1").await.unwrap();
        let remaining = client.list_servers("me").await.unwrap();
        assert!(remaining.iter().all(|s| s.id != "s1"));

        assert!(client.transport().calls().iter().any(|c| matches!(
            c,
            Call::Delete(q) if q.table_name() == "servers" && q.filter_value("id") == Some("eq.s1")
        )));
    }

    #[tokio::test]
    async fn test_recent_messages_are_latest_page_oldest_first() {
        // The backend answers newest first
        let transport = RecordingTransport::with_responses(vec![vec![
            message_row("m3", "2025-01-01T10:03:00Z"),
            message_row("m2", "2025-01-01T10:02:00Z"),
            message_row("m1", "2025-01-01T10:01:00Z"),
        ]]);
        let client = ParleyClient::new(transport);

        let messages = client.recent_messages("c1").await.unwrap();
        let ids: Vec<_> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["m1", "m2", "m3"]);
        assert_eq!(messages[0].sender_label(), "alice");

        match &client.transport().calls()[0] {
            Call::Select(q) => {
                assert_eq!(q.limit_value(), Some(100));
                assert_eq!(q.filter_value("channel_id"), Some("eq.c1"));
                assert!(q.to_pairs().contains(&("order".into(), "created_at.desc".into())));
            }
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_message_trims_and_skips_empty() {
        let client = ParleyClient::new(RecordingTransport::default());

        assert!(client.send_message("c1", "me", "  \n").await.is_err());
        assert!(client.transport().calls().is_empty());

        client.send_message("c1", "me", "  hello ").await.unwrap();
        let rows = client.transport().inserts_into("messages");
        assert_eq!(
            rows,
            vec![json!({ "channel_id": "c1", "user_id": "me", "content": "hello" })]
        );
    }

    #[tokio::test]
    async fn test_search_excludes_self_and_caps_results() {
        let mut rows: Vec<Value> = (0..12)
            .map(|i| profile_row(&format!("u{i}"), &format!("alice{i}")))
            .collect();
        rows.push(profile_row("me", "alice_me"));
        let client = ParleyClient::new(RecordingTransport::with_responses(vec![rows]));

        let results = client.search_profiles("me", " ALI ").await.unwrap();
        assert!(results.len() <= 10);
        assert!(results.iter().all(|p| p.id != "me"));

        match &client.transport().calls()[0] {
            Call::Select(q) => {
                assert_eq!(q.table_name(), "profiles");
                assert_eq!(q.filter_value("username"), Some("ilike.%ALI%"));
                assert_eq!(q.filter_value("id"), Some("neq.me"));
                assert_eq!(q.limit_value(), Some(10));
            }
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_blank_search_sends_nothing() {
        let client = ParleyClient::new(RecordingTransport::default());
        assert!(client.search_profiles("me", "   ").await.unwrap().is_empty());
        assert!(client.transport().calls().is_empty());
    }

    #[tokio::test]
    async fn test_friend_request_lifecycle() {
        let client = ParleyClient::new(RecordingTransport::default());

        assert!(client.send_friend_request("me", "me").await.is_err());

        client.send_friend_request("me", "u2").await.unwrap();
        assert_eq!(
            client.transport().inserts_into("friendships"),
            vec![json!({ "user_id": "me", "friend_id": "u2", "status": "pending" })]
        );

        client.accept_friend_request("f1").await.unwrap();
        client.remove_friendship("f1").await.unwrap();

        let calls = client.transport().calls();
        assert!(calls.iter().any(|c| matches!(
            c,
            Call::Update(q, patch) if q.filter_value("id") == Some("eq.f1") && patch["status"] == "accepted"
        )));
        assert!(calls.iter().any(|c| matches!(
            c,
            Call::Delete(q) if q.table_name() == "friendships" && q.filter_value("id") == Some("eq.f1")
        )));
    }

    #[tokio::test]
    async fn test_friendships_query_covers_both_sides() {
        let client = ParleyClient::new(RecordingTransport::default());
        client.friendships("me").await.unwrap();

        match &client.transport().calls()[0] {
            Call::Select(q) => {
                assert_eq!(q.filter_value("or"), Some("(user_id.eq.me,friend_id.eq.me)"));
            }
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_blank_display_name_clears_it() {
        let client = ParleyClient::new(RecordingTransport::default());
        client.update_display_name("me", "   ").await.unwrap();
        client.update_display_name("me", " Al ").await.unwrap();

        let patches: Vec<Value> = client
            .transport()
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Update(_, patch) => Some(patch),
                _ => None,
            })
            .collect();
        assert_eq!(patches, vec![json!({ "display_name": null }), json!({ "display_name": "Al" })]);
    }

    #[tokio::test]
    async fn test_admin_overview_counts() {
        let transport = RecordingTransport {
            tables: HashMap::from([
                (
                    "profiles".to_string(),
                    vec![profile_row("u1", "a"), profile_row("u2", "b")],
                ),
                ("servers".to_string(), vec![server_row("s1")]),
            ]),
            count: 42,
            ..Default::default()
        };
        let client = ParleyClient::new(transport);

        let overview = client.admin_overview().await.unwrap();
        assert_eq!(overview.total_users(), 2);
        assert_eq!(overview.total_servers(), 1);
        assert_eq!(overview.total_messages, 42);
    }

    #[tokio::test]
    async fn test_membership_is_optional() {
        let client = ParleyClient::new(RecordingTransport::default());
        assert_eq!(client.membership("s1", "me").await.unwrap(), None);

        let transport = RecordingTransport::with_responses(vec![vec![json!({
            "id": "sm1",
            "server_id": "s1",
            "user_id": "me",
            "role": "admin",
            "joined_at": "2025-01-01T00:00:00Z"
        })]]);
        let client = ParleyClient::new(transport);
        let member = client.membership("s1", "me").await.unwrap().unwrap();
        assert!(member.role.can_manage_channels());
    }

    #[test]
    fn test_message_from_realtime_record() {
        let client = ParleyClient::new(RecordingTransport::default());
        let mut record = message_row("m9", "2025-01-01T10:00:00Z");
        record.as_object_mut().unwrap().remove("profiles");

        let sender: Profile = serde_json::from_value(profile_row("u1", "alice")).unwrap();
        let message = client.message_from_record(record, Some(sender)).unwrap();
        assert_eq!(message.sender_label(), "alice");
    }

    fn realtime_record() -> Value {
        let mut record = message_row("m9", "2025-01-01T10:00:00Z");
        record.as_object_mut().unwrap().remove("profiles");
        record
    }

    fn cache_db() -> (tempfile::TempDir, CacheDb) {
        let dir = tempfile::tempdir().unwrap();
        let db = CacheDb::open_at(&dir.path().join("cache.db")).unwrap();
        (dir, db)
    }

    fn profile_selects(transport: &RecordingTransport) -> usize {
        transport
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::Select(q) if q.table_name() == "profiles"))
            .count()
    }

    #[tokio::test]
    async fn test_insert_sender_from_fresh_cache_skips_fetch() {
        let (_dir, db) = cache_db();
        let cached: Profile = serde_json::from_value(profile_row("u1", "alice")).unwrap();
        ProfileCache::new(&db).store(&cached).unwrap();

        let client = ParleyClient::new(RecordingTransport::default());
        let message = client
            .resolve_insert(Some(&db), realtime_record())
            .await
            .unwrap();

        assert_eq!(message.sender_label(), "alice");
        assert_eq!(profile_selects(client.transport()), 0);
    }

    #[tokio::test]
    async fn test_insert_sender_refetched_when_cache_is_stale() {
        let (_dir, db) = cache_db();
        let cached: Profile = serde_json::from_value(profile_row("u1", "old_alice")).unwrap();
        ProfileCache::new(&db).store(&cached).unwrap();
        db.conn()
            .execute("UPDATE profiles SET fetched_at = 0 WHERE id = 'u1'", [])
            .unwrap();

        let transport =
            RecordingTransport::with_responses(vec![vec![profile_row("u1", "alice")]]);
        let client = ParleyClient::new(transport);
        let message = client
            .resolve_insert(Some(&db), realtime_record())
            .await
            .unwrap();

        assert_eq!(message.sender_label(), "alice");
        assert_eq!(profile_selects(client.transport()), 1);
        let fresh = ProfileCache::new(&db)
            .get_fresh("u1", PROFILE_CACHE_MAX_AGE_SECS)
            .unwrap()
            .unwrap();
        assert_eq!(fresh.username, "alice");
    }

    #[tokio::test]
    async fn test_uncached_sender_is_fetched_once_then_cached() {
        let (_dir, db) = cache_db();
        let transport =
            RecordingTransport::with_responses(vec![vec![profile_row("u1", "alice")]]);
        let client = ParleyClient::new(transport);

        let first = client
            .resolve_insert(Some(&db), realtime_record())
            .await
            .unwrap();
        let second = client
            .resolve_insert(Some(&db), realtime_record())
            .await
            .unwrap();

        assert_eq!(first.sender_label(), "alice");
        assert_eq!(second.sender_label(), "alice");
        assert_eq!(profile_selects(client.transport()), 1);
    }

    #[tokio::test]
    async fn test_failed_sender_fetch_keeps_message() {
        let (_dir, db) = cache_db();
        let transport = RecordingTransport {
            unreachable: Some("profiles".to_string()),
            ..Default::default()
        };
        let client = ParleyClient::new(transport);

        let message = client
            .resolve_insert(Some(&db), realtime_record())
            .await
            .unwrap();

        assert_eq!(message.id, "m9");
        assert_eq!(message.sender_label(), "Unknown");
        assert!(ProfileCache::new(&db).get_fresh("u1", i64::MAX).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_without_sender_is_rejected_without_requests() {
        let client = ParleyClient::new(RecordingTransport::default());
        let mut record = realtime_record();
        record.as_object_mut().unwrap().remove("user_id");

        assert!(client.resolve_insert(None, record).await.is_err());
        assert!(client.transport().calls().is_empty());
    }
}

// SPDX-License-Identifier: MPL-2.0

//! What the main window is showing: the selected server or pseudo-view, its
//! channels, the open channel's messages, and what the user may do there.

use crate::supabase::{Channel, ChannelKind, Message, Server, ServerMember};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    /// Nothing selected yet
    #[default]
    Home,
    Friends,
    Server(String),
}

#[derive(Debug, Default)]
pub struct Dashboard {
    servers: Vec<Server>,
    selection: Selection,
    channels: Vec<Channel>,
    channel_id: Option<String>,
    membership: Option<ServerMember>,
    messages: Vec<Message>,
}

impl Dashboard {
    pub fn servers(&self) -> &[Server] {
        &self.servers
    }

    pub fn set_servers(&mut self, servers: Vec<Server>) {
        self.servers = servers;
        if let Selection::Server(id) = &self.selection {
            if !self.servers.iter().any(|s| &s.id == id) {
                self.select(Selection::Home);
            }
        }
    }

    pub fn add_server(&mut self, server: Server) {
        if !self.servers.iter().any(|s| s.id == server.id) {
            self.servers.push(server);
        }
    }

    /// Drop a deleted server, leaving it if it was open
    pub fn remove_server(&mut self, server_id: &str) {
        self.servers.retain(|s| s.id != server_id);
        if self.selected_server_id() == Some(server_id) {
            self.select(Selection::Home);
        }
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selected_server_id(&self) -> Option<&str> {
        match &self.selection {
            Selection::Server(id) => Some(id),
            _ => None,
        }
    }

    pub fn selected_server(&self) -> Option<&Server> {
        let id = self.selected_server_id()?;
        self.servers.iter().find(|s| s.id == id)
    }

    /// Switch views. Everything scoped to the previous server is dropped.
    /// Returns false when the selection didn't change.
    pub fn select(&mut self, selection: Selection) -> bool {
        if self.selection == selection {
            return false;
        }
        self.selection = selection;
        self.channels.clear();
        self.channel_id = None;
        self.membership = None;
        self.messages.clear();
        true
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Keep the text channels in position order and make sure one is open.
    /// Returns the channel to open if the selection changed.
    pub fn set_channels(&mut self, mut channels: Vec<Channel>) -> Option<String> {
        channels.retain(|c| c.kind == ChannelKind::Text);
        channels.sort_by_key(|c| c.position);
        self.channels = channels;

        let still_valid = self
            .channel_id
            .as_ref()
            .is_some_and(|id| self.channels.iter().any(|c| &c.id == id));
        if still_valid {
            return None;
        }

        self.messages.clear();
        self.channel_id = self.channels.first().map(|c| c.id.clone());
        self.channel_id.clone()
    }

    pub fn add_channel(&mut self, channel: Channel) {
        if channel.kind == ChannelKind::Text && !self.channels.iter().any(|c| c.id == channel.id) {
            self.channels.push(channel);
            self.channels.sort_by_key(|c| c.position);
        }
    }

    pub fn selected_channel_id(&self) -> Option<&str> {
        self.channel_id.as_deref()
    }

    pub fn selected_channel(&self) -> Option<&Channel> {
        let id = self.channel_id.as_deref()?;
        self.channels.iter().find(|c| c.id == id)
    }

    /// Returns false for unknown channels or when it's already open
    pub fn select_channel(&mut self, channel_id: &str) -> bool {
        if self.channel_id.as_deref() == Some(channel_id)
            || !self.channels.iter().any(|c| c.id == channel_id)
        {
            return false;
        }
        self.channel_id = Some(channel_id.to_string());
        self.messages.clear();
        true
    }

    pub fn set_membership(&mut self, membership: Option<ServerMember>) {
        self.membership = membership;
    }

    /// Owners and admins may add channels and edit the server
    pub fn can_manage_channels(&self) -> bool {
        self.membership
            .as_ref()
            .is_some_and(|m| m.role.can_manage_channels())
    }

    pub fn is_server_owner(&self, user_id: &str) -> bool {
        self.selected_server().is_some_and(|s| s.owner_id == user_id)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Replace the history of the open channel. Pages for other channels are ignored.
    pub fn set_messages(&mut self, channel_id: &str, messages: Vec<Message>) -> bool {
        if self.channel_id.as_deref() != Some(channel_id) {
            return false;
        }
        self.messages = messages;
        true
    }

    /// Append an incoming message. Returns false for duplicates and other channels.
    pub fn push_message(&mut self, message: Message) -> bool {
        if self.channel_id.as_deref() != Some(message.channel_id.as_str())
            || self.messages.iter().any(|m| m.id == message.id)
        {
            return false;
        }
        self.messages.push(message);
        true
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supabase::MemberRole;

    fn server(id: &str) -> Server {
        Server {
            id: id.into(),
            name: format!("server {id}"),
            icon_url: None,
            owner_id: "owner".into(),
            created_at: String::new(),
        }
    }

    fn channel(id: &str, position: i32, kind: ChannelKind) -> Channel {
        Channel {
            id: id.into(),
            server_id: "s1".into(),
            name: id.into(),
            kind,
            position,
            created_at: String::new(),
        }
    }

    fn message(id: &str, channel_id: &str) -> Message {
        Message {
            id: id.into(),
            channel_id: channel_id.into(),
            user_id: "u1".into(),
            content: "hi".into(),
            created_at: String::new(),
            updated_at: String::new(),
            profile: None,
        }
    }

    fn member(role: MemberRole) -> ServerMember {
        ServerMember {
            id: "m".into(),
            server_id: "s1".into(),
            user_id: "me".into(),
            role,
            joined_at: String::new(),
        }
    }

    fn open_server(dashboard: &mut Dashboard) {
        dashboard.set_servers(vec![server("s1"), server("s2")]);
        dashboard.select(Selection::Server("s1".into()));
    }

    #[test]
    fn test_channels_sorted_text_only_and_first_selected() {
        let mut dashboard = Dashboard::default();
        open_server(&mut dashboard);

        let opened = dashboard.set_channels(vec![
            channel("b", 2, ChannelKind::Text),
            channel("v", 0, ChannelKind::Voice),
            channel("a", 1, ChannelKind::Text),
        ]);

        assert_eq!(opened.as_deref(), Some("a"));
        let ids: Vec<_> = dashboard.channels().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn test_reloading_channels_keeps_valid_selection() {
        let mut dashboard = Dashboard::default();
        open_server(&mut dashboard);
        dashboard.set_channels(vec![channel("a", 0, ChannelKind::Text), channel("b", 1, ChannelKind::Text)]);
        assert!(dashboard.select_channel("b"));

        let opened = dashboard.set_channels(vec![
            channel("a", 0, ChannelKind::Text),
            channel("b", 1, ChannelKind::Text),
            channel("c", 2, ChannelKind::Text),
        ]);
        assert_eq!(opened, None);
        assert_eq!(dashboard.selected_channel_id(), Some("b"));
    }

    #[test]
    fn test_server_switch_resets_channel_state() {
        let mut dashboard = Dashboard::default();
        open_server(&mut dashboard);
        dashboard.set_channels(vec![channel("a", 0, ChannelKind::Text)]);
        dashboard.set_membership(Some(member(MemberRole::Owner)));
        dashboard.push_message(message("m1", "a"));

        assert!(dashboard.select(Selection::Server("s2".into())));
        assert!(dashboard.channels().is_empty());
        assert_eq!(dashboard.selected_channel_id(), None);
        assert!(dashboard.messages().is_empty());
        assert!(!dashboard.can_manage_channels());

        assert!(!dashboard.select(Selection::Server("s2".into())));
    }

    #[test]
    fn test_friends_view_clears_server_state() {
        let mut dashboard = Dashboard::default();
        open_server(&mut dashboard);
        dashboard.set_channels(vec![channel("a", 0, ChannelKind::Text)]);

        dashboard.select(Selection::Friends);
        assert_eq!(dashboard.selected_server_id(), None);
        assert!(dashboard.channels().is_empty());
    }

    #[test]
    fn test_permissions_follow_role() {
        let mut dashboard = Dashboard::default();
        open_server(&mut dashboard);

        assert!(!dashboard.can_manage_channels());
        dashboard.set_membership(Some(member(MemberRole::Member)));
        assert!(!dashboard.can_manage_channels());
        dashboard.set_membership(Some(member(MemberRole::Admin)));
        assert!(dashboard.can_manage_channels());
        assert!(dashboard.is_server_owner("owner"));
        assert!(!dashboard.is_server_owner("me"));
    }

    #[test]
    fn test_push_message_dedups_and_ignores_other_channels() {
        let mut dashboard = Dashboard::default();
        open_server(&mut dashboard);
        dashboard.set_channels(vec![channel("a", 0, ChannelKind::Text)]);
        dashboard.set_messages("a", vec![message("m1", "a")]);

        assert!(!dashboard.push_message(message("m1", "a")));
        assert!(!dashboard.push_message(message("m2", "elsewhere")));
        assert!(dashboard.push_message(message("m2", "a")));
        assert_eq!(dashboard.messages().len(), 2);
    }

    #[test]
    fn test_stale_history_is_ignored() {
        let mut dashboard = Dashboard::default();
        open_server(&mut dashboard);
        dashboard.set_channels(vec![channel("a", 0, ChannelKind::Text), channel("b", 1, ChannelKind::Text)]);
        dashboard.select_channel("b");

        assert!(!dashboard.set_messages("a", vec![message("m1", "a")]));
        assert!(dashboard.messages().is_empty());
    }

    #[test]
    fn test_removing_open_server_goes_home() {
        let mut dashboard = Dashboard::default();
        open_server(&mut dashboard);

        dashboard.remove_server("s1");
        assert_eq!(dashboard.selection(), &Selection::Home);
        assert_eq!(dashboard.servers().len(), 1);

        dashboard.select(Selection::Server("s2".into()));
        dashboard.set_servers(vec![server("s1")]);
        assert_eq!(dashboard.selection(), &Selection::Home);
    }

    #[test]
    fn test_select_unknown_channel_is_rejected() {
        let mut dashboard = Dashboard::default();
        open_server(&mut dashboard);
        dashboard.set_channels(vec![channel("a", 0, ChannelKind::Text)]);
        assert!(!dashboard.select_channel("zzz"));
        assert!(!dashboard.select_channel("a"));
    }
}

// SPDX-License-Identifier: MPL-2.0

//! Row-insert notifications over the backend's Phoenix websocket.
//!
//! One [`Subscription`] owns one socket joined to one topic. There is no
//! reconnection: when the socket drops, the subscription ends and
//! [`Subscription::next_insert`] returns `None`.

use crate::config::BackendConfig;
use crate::supabase::ClientError;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};
use url::Url;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);
const JOIN_REF: &str = "1";

/// A decoded server frame, reduced to what the client acts on
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RealtimeEvent {
    /// The `record` of an INSERT change
    Insert(Value),
    JoinOk,
    JoinError(String),
    Closed(String),
    Other,
}

pub(crate) fn join_frame(topic: &str, table: &str, filter: &str, access_token: &str) -> String {
    json!({
        "topic": topic,
        "event": "phx_join",
        "payload": {
            "config": {
                "broadcast": { "ack": false, "self": false },
                "presence": { "key": "" },
                "postgres_changes": [{
                    "event": "INSERT",
                    "schema": "public",
                    "table": table,
                    "filter": filter,
                }],
                "private": false,
            },
            "access_token": access_token,
        },
        "ref": JOIN_REF,
        "join_ref": JOIN_REF,
    })
    .to_string()
}

pub(crate) fn heartbeat_frame(msg_ref: u64) -> String {
    json!({
        "topic": "phoenix",
        "event": "heartbeat",
        "payload": {},
        "ref": msg_ref.to_string(),
    })
    .to_string()
}

pub(crate) fn leave_frame(topic: &str, msg_ref: u64) -> String {
    json!({
        "topic": topic,
        "event": "phx_leave",
        "payload": {},
        "ref": msg_ref.to_string(),
        "join_ref": JOIN_REF,
    })
    .to_string()
}

/// Hands a refreshed JWT to an already joined topic
pub(crate) fn access_token_frame(topic: &str, access_token: &str, msg_ref: u64) -> String {
    json!({
        "topic": topic,
        "event": "access_token",
        "payload": { "access_token": access_token },
        "ref": msg_ref.to_string(),
        "join_ref": JOIN_REF,
    })
    .to_string()
}

pub(crate) fn parse_frame(text: &str) -> RealtimeEvent {
    let Ok(frame) = serde_json::from_str::<Value>(text) else {
        return RealtimeEvent::Other;
    };
    let event = frame.get("event").and_then(Value::as_str).unwrap_or("");
    let payload = frame.get("payload").cloned().unwrap_or(Value::Null);

    match event {
        "postgres_changes" => {
            let data = &payload["data"];
            if data["type"].as_str() == Some("INSERT") && data["record"].is_object() {
                RealtimeEvent::Insert(data["record"].clone())
            } else {
                RealtimeEvent::Other
            }
        }
        "phx_reply" if frame.get("ref").and_then(Value::as_str) == Some(JOIN_REF) => {
            if payload["status"].as_str() == Some("ok") {
                RealtimeEvent::JoinOk
            } else {
                let reason = payload["response"]["reason"]
                    .as_str()
                    .unwrap_or("join rejected")
                    .to_string();
                RealtimeEvent::JoinError(reason)
            }
        }
        "system" if payload["status"].as_str() == Some("error") => RealtimeEvent::JoinError(
            payload["message"]
                .as_str()
                .unwrap_or("subscription error")
                .to_string(),
        ),
        "phx_error" => RealtimeEvent::Closed("channel error".to_string()),
        "phx_close" => RealtimeEvent::Closed("channel closed".to_string()),
        _ => RealtimeEvent::Other,
    }
}

/// Requests from the [`Subscription`] handle to its socket task
enum Command {
    AccessToken(String),
    Leave,
}

/// Opens insert subscriptions against the realtime endpoint.
pub struct RealtimeClient {
    url: Url,
}

impl RealtimeClient {
    pub fn new(config: &BackendConfig) -> Result<Self, ClientError> {
        let url = config
            .realtime_url()
            .map_err(|e| ClientError::Realtime(e.to_string()))?;
        Ok(Self { url })
    }

    /// Join `topic` and stream inserted rows of `table` that match `filter`
    /// (PostgREST syntax, e.g. `channel_id=eq.42`).
    ///
    /// Must be called from within the tokio runtime; the socket is driven by a
    /// spawned task until the subscription is dropped or the server hangs up.
    pub async fn subscribe_inserts(
        &self,
        access_token: &str,
        topic: &str,
        table: &str,
        filter: &str,
    ) -> Result<Subscription, ClientError> {
        let topic = format!("realtime:{topic}");
        let (socket, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| ClientError::Realtime(e.to_string()))?;
        let (mut sink, mut stream) = socket.split();

        sink.send(WsMessage::text(join_frame(&topic, table, filter, access_token)))
            .await
            .map_err(|e| ClientError::Realtime(e.to_string()))?;

        // Wait for the join reply before handing the subscription out
        let joined = tokio::time::timeout(JOIN_TIMEOUT, async {
            while let Some(frame) = stream.next().await {
                let frame = frame.map_err(|e| ClientError::Realtime(e.to_string()))?;
                if let WsMessage::Text(text) = frame {
                    match parse_frame(text.as_str()) {
                        RealtimeEvent::JoinOk => return Ok(()),
                        RealtimeEvent::JoinError(reason) | RealtimeEvent::Closed(reason) => {
                            return Err(ClientError::Realtime(reason));
                        }
                        _ => {}
                    }
                }
            }
            Err(ClientError::Realtime(
                "socket closed before join".to_string(),
            ))
        })
        .await
        .map_err(|_| ClientError::Realtime("timed out joining channel".to_string()))?;
        joined?;

        info!(%topic, "Realtime subscription joined");

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, mut command_rx) = mpsc::unbounded_channel::<Command>();
        let task_topic = topic.clone();

        let task = tokio::spawn(async move {
            let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
            heartbeat.tick().await;
            let mut next_ref: u64 = 2;

            loop {
                tokio::select! {
                    _ = heartbeat.tick() => {
                        let frame = heartbeat_frame(next_ref);
                        next_ref += 1;
                        if let Err(e) = sink.send(WsMessage::text(frame)).await {
                            warn!(topic = %task_topic, "Heartbeat failed: {}", e);
                            break;
                        }
                    }
                    command = command_rx.recv() => match command {
                        Some(Command::AccessToken(token)) => {
                            let frame = access_token_frame(&task_topic, &token, next_ref);
                            next_ref += 1;
                            if let Err(e) = sink.send(WsMessage::text(frame)).await {
                                warn!(topic = %task_topic, "Token update failed: {}", e);
                                break;
                            }
                            debug!(topic = %task_topic, "Realtime access token updated");
                        }
                        // A dropped handle leaves as well
                        Some(Command::Leave) | None => {
                            let _ = sink.send(WsMessage::text(leave_frame(&task_topic, next_ref))).await;
                            let _ = sink.close().await;
                            debug!(topic = %task_topic, "Realtime subscription left");
                            break;
                        }
                    },
                    frame = stream.next() => {
                        match frame {
                            Some(Ok(WsMessage::Text(text))) => match parse_frame(text.as_str()) {
                                RealtimeEvent::Insert(record) => {
                                    if event_tx.send(record).is_err() {
                                        break;
                                    }
                                }
                                RealtimeEvent::Closed(reason) | RealtimeEvent::JoinError(reason) => {
                                    warn!(topic = %task_topic, "Realtime channel ended: {}", reason);
                                    break;
                                }
                                RealtimeEvent::JoinOk | RealtimeEvent::Other => {}
                            },
                            Some(Ok(WsMessage::Close(_))) | None => {
                                warn!(topic = %task_topic, "Realtime socket closed by server");
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                warn!(topic = %task_topic, "Realtime socket error: {}", e);
                                break;
                            }
                        }
                    }
                }
            }
        });

        Ok(Subscription {
            topic,
            events: event_rx,
            commands: command_tx,
            task: Some(task),
        })
    }
}

/// Handle to one joined topic. Dropping it leaves the topic and closes the socket.
pub struct Subscription {
    topic: String,
    events: mpsc::UnboundedReceiver<Value>,
    commands: mpsc::UnboundedSender<Command>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Next inserted row, or None once the socket has ended
    pub async fn next_insert(&mut self) -> Option<Value> {
        self.events.recv().await
    }

    /// Keep the joined topic authorized after the session was refreshed
    pub fn set_access_token(&self, access_token: &str) {
        if self
            .commands
            .send(Command::AccessToken(access_token.to_string()))
            .is_err()
        {
            debug!(topic = %self.topic, "Token update for a closed subscription");
        }
    }

    pub fn unsubscribe(mut self) {
        self.leave();
    }

    fn leave(&mut self) {
        let _ = self.commands.send(Command::Leave);
        // The socket task exits on its own after sending phx_leave
        self.task.take();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.leave();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_frame_subscribes_to_filtered_inserts() {
        let frame: Value = serde_json::from_str(&join_frame(
            "realtime:channel-c1",
            "messages",
            "channel_id=eq.c1",
            "jwt",
        ))
        .unwrap();

        assert_eq!(frame["event"], "phx_join");
        assert_eq!(frame["topic"], "realtime:channel-c1");
        let change = &frame["payload"]["config"]["postgres_changes"][0];
        assert_eq!(change["event"], "INSERT");
        assert_eq!(change["schema"], "public");
        assert_eq!(change["table"], "messages");
        assert_eq!(change["filter"], "channel_id=eq.c1");
        assert_eq!(frame["payload"]["access_token"], "jwt");
    }

    #[test]
    fn test_parse_insert_event() {
        let text = r#"{
            "event": "postgres_changes",
            "topic": "realtime:channel-c1",
            "ref": null,
            "payload": {
                "ids": [1],
                "data": {
                    "type": "INSERT",
                    "table": "messages",
                    "schema": "public",
                    "record": { "id": "m1", "content": "hi" }
                }
            }
        }"#;

        match parse_frame(text) {
            RealtimeEvent::Insert(record) => assert_eq!(record["content"], "hi"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_parse_update_is_ignored() {
        let text = r#"{"event":"postgres_changes","payload":{"data":{"type":"UPDATE","record":{"id":"m1"}}}}"#;
        assert_eq!(parse_frame(text), RealtimeEvent::Other);
    }

    #[test]
    fn test_parse_join_replies() {
        let ok = r#"{"event":"phx_reply","ref":"1","payload":{"status":"ok","response":{}}}"#;
        assert_eq!(parse_frame(ok), RealtimeEvent::JoinOk);

        let err = r#"{"event":"phx_reply","ref":"1","payload":{"status":"error","response":{"reason":"unauthorized"}}}"#;
        assert_eq!(
            parse_frame(err),
            RealtimeEvent::JoinError("unauthorized".to_string())
        );

        // Heartbeat replies carry other refs
        let heartbeat = r#"{"event":"phx_reply","ref":"7","topic":"phoenix","payload":{"status":"ok"}}"#;
        assert_eq!(parse_frame(heartbeat), RealtimeEvent::Other);
    }

    #[test]
    fn test_parse_close_and_garbage() {
        assert!(matches!(
            parse_frame(r#"{"event":"phx_close","payload":{}}"#),
            RealtimeEvent::Closed(_)
        ));
        assert_eq!(parse_frame("not json"), RealtimeEvent::Other);
    }

    #[test]
    fn test_heartbeat_and_leave_frames() {
        let hb: Value = serde_json::from_str(&heartbeat_frame(5)).unwrap();
        assert_eq!(hb["topic"], "phoenix");
        assert_eq!(hb["ref"], "5");

        let leave: Value = serde_json::from_str(&leave_frame("realtime:x", 9)).unwrap();
        assert_eq!(leave["event"], "phx_leave");
        assert_eq!(leave["topic"], "realtime:x");
    }

    #[test]
    fn test_access_token_frame_targets_joined_topic() {
        let frame: Value =
            serde_json::from_str(&access_token_frame("realtime:channel-c1", "new-jwt", 4))
                .unwrap();
        assert_eq!(frame["event"], "access_token");
        assert_eq!(frame["topic"], "realtime:channel-c1");
        assert_eq!(frame["payload"]["access_token"], "new-jwt");
        assert_eq!(frame["ref"], "4");
        assert_eq!(frame["join_ref"], JOIN_REF);
    }

    #[tokio::test]
    async fn test_subscription_forwards_token_then_leaves_on_drop() {
        let (command_tx, mut command_rx) = mpsc::unbounded_channel();
        let (_event_tx, event_rx) = mpsc::unbounded_channel();
        let subscription = Subscription {
            topic: "realtime:channel-c1".to_string(),
            events: event_rx,
            commands: command_tx,
            task: None,
        };

        subscription.set_access_token("new-jwt");
        drop(subscription);

        assert!(matches!(
            command_rx.recv().await,
            Some(Command::AccessToken(token)) if token == "new-jwt"
        ));
        assert!(matches!(command_rx.recv().await, Some(Command::Leave)));
        assert!(command_rx.recv().await.is_none());
    }
}

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use async_trait::async_trait;

use crate::config::SlackConfig;
use crate::platform::{ChannelInfo, ChatPlatform, IncomingMessage, UserInfo};

/// Slack Web API base URL
const SLACK_API_BASE: &str = "https://slack.com/api";

/// Reconnect backoff unit (seconds)
const RECONNECT_DELAY_SECS: u64 = 5;

/// Maximum reconnect attempts before giving up
const MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// Socket Mode envelope received from Slack. Must be ACKed immediately.
#[derive(Debug, Clone, Deserialize)]
struct SocketEnvelope {
    envelope_id: String,
    #[serde(rename = "type")]
    envelope_type: String,
    #[serde(default)]
    payload: Value,
}

/// ACK response sent back to Slack
#[derive(Debug, Serialize)]
struct SocketAck {
    envelope_id: String,
}

type WsSink = futures::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    tokio_tungstenite::tungstenite::Message,
>;

/// Slack client: Socket Mode (WebSocket) for inbound events, Web API
/// (REST) for the roster, channel list and outbound messages.
pub struct SlackPlatform {
    config: SlackConfig,
    http: reqwest::Client,
}

impl SlackPlatform {
    pub fn new(config: SlackConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Call a Web API method and unwrap Slack's ok/error envelope.
    async fn api_call(&self, method: &str, token: &str, body: Option<Value>) -> Result<Value> {
        let mut request = self
            .http
            .post(format!("{}/{}", SLACK_API_BASE, method))
            .bearer_auth(token);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response: Value = request
            .send()
            .await
            .with_context(|| format!("{} request failed", method))?
            .json()
            .await
            .with_context(|| format!("{} returned invalid JSON", method))?;

        if response["ok"].as_bool() != Some(true) {
            anyhow::bail!(
                "{} failed: {}",
                method,
                response["error"].as_str().unwrap_or("unknown")
            );
        }

        Ok(response)
    }

    /// Call `apps.connections.open` to get a Socket Mode WebSocket URL.
    async fn get_ws_url(&self) -> Result<String> {
        let body = self
            .api_call("apps.connections.open", &self.config.app_token, None)
            .await?;

        body["url"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("no url in apps.connections.open response"))
    }

    /// Socket Mode loop: connect, ACK envelopes, forward message events
    /// into `tx`. Reconnects with linear backoff on connection loss.
    pub async fn run(&self, tx: mpsc::Sender<IncomingMessage>) -> Result<()> {
        use futures::{SinkExt, StreamExt};
        use tokio_tungstenite::tungstenite::Message as WsMessage;

        let mut attempts: u32 = 0;

        loop {
            if attempts > 0 {
                if attempts >= MAX_RECONNECT_ATTEMPTS {
                    anyhow::bail!("exceeded max reconnect attempts ({})", MAX_RECONNECT_ATTEMPTS);
                }
                let delay = Duration::from_secs(RECONNECT_DELAY_SECS * u64::from(attempts.min(6)));
                info!(
                    attempt = attempts,
                    delay_secs = delay.as_secs(),
                    "reconnecting to Slack Socket Mode..."
                );
                tokio::time::sleep(delay).await;
            }

            let ws_url = match self.get_ws_url().await {
                Ok(url) => url,
                Err(e) => {
                    error!("failed to get Socket Mode URL: {:#}", e);
                    attempts += 1;
                    continue;
                }
            };

            let ws_stream = match tokio_tungstenite::connect_async(ws_url.as_str()).await {
                Ok((stream, _)) => {
                    info!("connected to Slack Socket Mode");
                    attempts = 0;
                    stream
                }
                Err(e) => {
                    error!("WebSocket connect failed: {:#}", e);
                    attempts += 1;
                    continue;
                }
            };

            let (mut write, mut read) = ws_stream.split();

            while let Some(frame) = read.next().await {
                match frame {
                    Ok(WsMessage::Text(text)) => {
                        self.handle_frame(&mut write, &text, &tx).await;
                    }
                    Ok(WsMessage::Ping(data)) => {
                        let _ = write.send(WsMessage::Pong(data)).await;
                    }
                    Ok(WsMessage::Close(_)) => {
                        info!("WebSocket closed by server");
                        break;
                    }
                    Err(e) => {
                        warn!("WebSocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }

            attempts += 1;
        }
    }

    /// Handle a single Socket Mode text frame.
    async fn handle_frame(&self, write: &mut WsSink, text: &str, tx: &mpsc::Sender<IncomingMessage>) {
        use futures::SinkExt;
        use tokio_tungstenite::tungstenite::Message as WsMessage;

        let frame: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                debug!("unparseable frame: {}", e);
                return;
            }
        };

        match frame["type"].as_str() {
            Some("hello") => {
                info!("received Socket Mode hello");
                return;
            }
            Some("disconnect") => {
                info!(
                    reason = %frame["reason"].as_str().unwrap_or("unknown"),
                    "Slack requested disconnect"
                );
                return;
            }
            _ => {}
        }

        let envelope: SocketEnvelope = match serde_json::from_value(frame) {
            Ok(e) => e,
            Err(e) => {
                debug!("not an event envelope: {}", e);
                return;
            }
        };

        // ACK before processing; Slack redelivers unACKed envelopes
        let ack = SocketAck {
            envelope_id: envelope.envelope_id.clone(),
        };
        if let Ok(ack_json) = serde_json::to_string(&ack) {
            if let Err(e) = write.send(WsMessage::Text(ack_json.into())).await {
                warn!("failed to send ACK: {}", e);
            }
        }

        if envelope.envelope_type != "events_api" {
            debug!(envelope_type = %envelope.envelope_type, "ignoring envelope");
            return;
        }

        if let Some(message) = envelope_to_message(&envelope.payload) {
            if tx.send(message).await.is_err() {
                warn!("event receiver dropped, discarding message");
            }
        }
    }
}

/// Convert an events_api payload into the bot's inbound message shape.
/// The event type tag is passed through untouched; the message filter
/// decides what to react to. Events carrying a `subtype` (edits, joins,
/// the bot's own posts, which arrive without a `user` field) are dropped
/// here because they are not plain chat messages.
fn envelope_to_message(payload: &Value) -> Option<IncomingMessage> {
    let event = payload.get("event")?;
    let kind = event["type"].as_str()?;

    if event.get("subtype").is_some() {
        return None;
    }

    Some(IncomingMessage {
        kind: kind.to_string(),
        user: event["user"].as_str().unwrap_or_default().to_string(),
        channel: event["channel"].as_str().unwrap_or_default().to_string(),
        text: event["text"].as_str().unwrap_or_default().to_string(),
    })
}

#[async_trait]
impl ChatPlatform for SlackPlatform {
    async fn list_users(&self) -> Result<Vec<UserInfo>> {
        let body = self
            .api_call("users.list", &self.config.bot_token, None)
            .await?;

        let members = body["members"]
            .as_array()
            .context("no members in users.list response")?;

        Ok(members
            .iter()
            .filter_map(|member| {
                Some(UserInfo {
                    id: member["id"].as_str()?.to_string(),
                    name: member["name"].as_str()?.to_string(),
                })
            })
            .collect())
    }

    async fn list_channels(&self) -> Result<Vec<ChannelInfo>> {
        let body = self
            .api_call("conversations.list", &self.config.bot_token, None)
            .await?;

        let channels = body["channels"]
            .as_array()
            .context("no channels in conversations.list response")?;

        Ok(channels
            .iter()
            .filter_map(|channel| {
                Some(ChannelInfo {
                    id: channel["id"].as_str()?.to_string(),
                    name: channel["name"].as_str()?.to_string(),
                })
            })
            .collect())
    }

    async fn post_message(&self, channel_name: &str, text: &str) -> Result<()> {
        self.api_call(
            "chat.postMessage",
            &self.config.bot_token,
            Some(json!({
                "channel": channel_name,
                "text": text,
                "as_user": true,
            })),
        )
        .await?;

        Ok(())
    }
}

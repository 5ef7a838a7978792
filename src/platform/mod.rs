pub mod slack;

use anyhow::Result;
use async_trait::async_trait;

/// An inbound event delivered by the chat platform
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Event type tag (e.g. "message")
    pub kind: String,
    /// Platform user ID of the sender
    pub user: String,
    /// Channel the event originated from
    pub channel: String,
    /// The message text
    pub text: String,
}

/// A workspace member from the platform roster
#[derive(Debug, Clone)]
pub struct UserInfo {
    pub id: String,
    pub name: String,
}

/// A channel known to the platform
#[derive(Debug, Clone)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
}

/// Everything the bot needs from a chat platform. The concrete Slack
/// client implements this; tests swap in a fake.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    async fn list_users(&self) -> Result<Vec<UserInfo>>;

    async fn list_channels(&self) -> Result<Vec<ChannelInfo>>;

    /// Post a message to a channel by name, attributed as the bot itself.
    async fn post_message(&self, channel_name: &str, text: &str) -> Result<()>;
}

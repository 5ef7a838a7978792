use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::platform::{ChannelInfo, ChatPlatform, IncomingMessage};
use crate::store::JokeStore;

/// The phrase that summons a joke, next to the bot's own name
const TRIGGER_PHRASE: &str = "chuck norris";

/// The bot's own platform identity, resolved once at startup from the
/// workspace roster and immutable afterwards
#[derive(Debug, Clone)]
pub struct BotIdentity {
    pub id: String,
    pub name: String,
}

pub struct Bot {
    platform: Arc<dyn ChatPlatform>,
    store: JokeStore,
    identity: BotIdentity,
    channels: Vec<ChannelInfo>,
}

impl Bot {
    /// Resolve the bot's identity and the channel list from the platform.
    /// A bot name missing from the roster is fatal: without an identity
    /// the self-message check cannot work and the bot could answer its
    /// own jokes forever.
    pub async fn connect(
        platform: Arc<dyn ChatPlatform>,
        store: JokeStore,
        bot_name: &str,
    ) -> Result<Self> {
        let users = platform
            .list_users()
            .await
            .context("Failed to list workspace users")?;

        let identity = users
            .into_iter()
            .find(|user| user.name == bot_name)
            .map(|user| BotIdentity {
                id: user.id,
                name: user.name,
            })
            .ok_or_else(|| {
                anyhow!("bot user \"{}\" not found in the workspace roster", bot_name)
            })?;

        let channels = platform
            .list_channels()
            .await
            .context("Failed to list channels")?;

        info!(
            "connected as {} ({}), {} channels visible",
            identity.name,
            identity.id,
            channels.len()
        );

        Ok(Self {
            platform,
            store,
            identity,
            channels,
        })
    }

    /// Run the first-run check once, then consume inbound events one at a
    /// time until the platform connection goes away.
    pub async fn run(&self, mut events: mpsc::Receiver<IncomingMessage>) {
        self.first_run_check().await;

        while let Some(message) = events.recv().await {
            self.handle_message(&message).await;
        }
    }

    pub async fn handle_message(&self, message: &IncomingMessage) {
        if should_reply(message, &self.identity) {
            self.reply_with_joke(message).await;
        }
    }

    /// Startup bookkeeping: greet the workspace on the very first run,
    /// otherwise just refresh the last-run timestamp. Database errors are
    /// reported and the check abandoned; the bot keeps serving messages.
    async fn first_run_check(&self) {
        let last_run = match self.store.last_run().await {
            Ok(record) => record,
            Err(e) => {
                error!("database error: {:#}", e);
                return;
            }
        };

        let now = Utc::now().to_rfc3339();

        let result = match last_run {
            None => {
                self.welcome_message().await;
                self.store.record_first_run(&now).await
            }
            Some(_) => self.store.touch_last_run(&now).await,
        };

        if let Err(e) = result {
            error!("database error: {:#}", e);
        }
    }

    async fn welcome_message(&self) {
        let Some(channel) = self.channels.first() else {
            warn!("no channels visible, skipping welcome message");
            return;
        };

        let text = format!(
            "Hi guys, roundhouse kicks anyone?\n\
             I can tell jokes, but very honest ones. \
             Just say `Chuck Norris` or `{}` to invoke me",
            self.identity.name
        );

        if let Err(e) = self.platform.post_message(&channel.name, &text).await {
            error!("failed to post welcome message: {:#}", e);
        }
    }

    /// Reply to a triggering message with the least-used joke and record
    /// the delivery. Posting is fire-and-forget: the usage counter is
    /// bumped whether or not the post went through.
    async fn reply_with_joke(&self, message: &IncomingMessage) {
        let joke = match self.store.next_joke().await {
            Ok(Some(joke)) => joke,
            Ok(None) => {
                warn!("joke table is empty, nothing to reply with");
                return;
            }
            Err(e) => {
                error!("database error: {:#}", e);
                return;
            }
        };

        let Some(channel) = self.channels.iter().find(|c| c.id == message.channel) else {
            warn!(channel = %message.channel, "no channel found for inbound id, dropping reply");
            return;
        };

        if let Err(e) = self.platform.post_message(&channel.name, &joke.text).await {
            error!("failed to post joke: {:#}", e);
        }

        if let Err(e) = self.store.mark_used(joke.id).await {
            error!("database error: {:#}", e);
        }
    }
}

/// Decide whether an inbound event warrants a joke. All four predicates
/// must hold: a real chat message, in a public channel, not authored by
/// the bot itself, and mentioning the trigger phrase or the bot's name.
pub fn should_reply(message: &IncomingMessage, identity: &BotIdentity) -> bool {
    debug!(
        kind = %message.kind,
        channel = %message.channel,
        user = %message.user,
        "evaluating inbound event"
    );

    is_chat_message(message)
        && is_channel_conversation(message)
        && !is_from_self(message, identity)
        && mentions_trigger(message, &identity.name)
}

fn is_chat_message(message: &IncomingMessage) -> bool {
    message.kind == "message" && !message.text.is_empty()
}

// Public channel ids start with 'C'; DMs ('D') and groups ('G') stay quiet
fn is_channel_conversation(message: &IncomingMessage) -> bool {
    message.channel.starts_with('C')
}

fn is_from_self(message: &IncomingMessage, identity: &BotIdentity) -> bool {
    message.user == identity.id
}

fn mentions_trigger(message: &IncomingMessage, bot_name: &str) -> bool {
    let text = message.text.to_lowercase();
    text.contains(TRIGGER_PHRASE) || text.contains(&bot_name.to_lowercase())
}

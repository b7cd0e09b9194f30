//! Telegram relay: long-polls for commands and answers with today's figures

pub mod commands;
pub mod telegram;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::core::Counter;
use crate::error::Result;

use commands::Command;
use telegram::{TelegramClient, Update};

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub token: String,
    pub admin_id: Option<String>,
    pub api_url: String,
    pub poll_timeout: u64, // seconds
    pub poll_delay: Duration,
}

impl BotConfig {
    /// `None` when no bot token is configured
    pub fn from_config(config: &Config) -> Option<Self> {
        Some(Self {
            token: config.bot_token.clone()?,
            admin_id: config.admin_id.clone(),
            api_url: config.telegram_api_url.clone(),
            poll_timeout: config.poll_timeout,
            poll_delay: Duration::from_millis(config.poll_delay_ms),
        })
    }
}

pub struct Relay {
    client: TelegramClient,
    counter: Arc<Counter>,
    admin_id: Option<String>,
    poll_timeout: u64,
    poll_delay: Duration,
    last_update_id: i64,
}

impl Relay {
    pub fn new(config: BotConfig, counter: Arc<Counter>) -> Result<Self> {
        let client = TelegramClient::new(
            &config.api_url,
            &config.token,
            Duration::from_secs(config.poll_timeout),
        )?;

        Ok(Self {
            client,
            counter,
            admin_id: config.admin_id,
            poll_timeout: config.poll_timeout,
            poll_delay: config.poll_delay,
            last_update_id: 0,
        })
    }

    pub fn last_update_id(&self) -> i64 {
        self.last_update_id
    }

    /// One getUpdates round trip. Returns how many updates were handled.
    pub async fn poll_once(&mut self) -> Result<usize> {
        let updates = self
            .client
            .get_updates(self.last_update_id + 1, self.poll_timeout)
            .await?;

        for update in &updates {
            self.last_update_id = self.last_update_id.max(update.update_id);
            self.handle(update).await;
        }
        Ok(updates.len())
    }

    async fn handle(&self, update: &Update) {
        let Some(message) = &update.message else {
            return;
        };
        let Some(command) = message.text.as_deref().and_then(Command::parse) else {
            return;
        };

        let chat_id = message.chat.id;
        tracing::debug!("Update {}: {:?} from chat {}", update.update_id, command, chat_id);

        let text = commands::reply(command, chat_id, self.admin_id.as_deref(), &self.counter);
        if let Err(e) = self.client.send_message(chat_id, &text).await {
            tracing::warn!("Failed to reply to chat {}: {}", chat_id, e);
        }
    }

    /// Poll until `shutdown` fires, waiting `poll_delay` after every cycle
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("Bot polling started");

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                result = self.poll_once() => {
                    if let Err(e) = result {
                        tracing::warn!("Polling error: {}", e);
                    }
                }
            }

            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(self.poll_delay) => {}
            }
        }

        tracing::info!("Bot polling stopped");
    }
}

/// Start the relay task, or log and skip it when the token is missing
pub fn spawn(
    config: &Config,
    counter: Arc<Counter>,
    shutdown: watch::Receiver<bool>,
) -> Option<JoinHandle<()>> {
    let Some(bot_config) = BotConfig::from_config(config) else {
        tracing::error!("TELEGRAM_BOT_TOKEN is not set, bot relay disabled");
        return None;
    };

    match Relay::new(bot_config, counter) {
        Ok(relay) => Some(tokio::spawn(relay.run(shutdown))),
        Err(e) => {
            tracing::error!("Failed to start bot relay: {}", e);
            None
        }
    }
}

// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram destination adapter for the vktg relay.
//!
//! Implements [`DestinationAdapter`] and [`Notifier`] over the Telegram Bot
//! API via teloxide, and decodes operator messages into
//! [`ControlEvent`]s delivered through [`TelegramDestination::receive`].

pub mod handler;
pub mod media;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use teloxide::dispatching::ShutdownToken;
use teloxide::prelude::*;
use teloxide::types::{
    ChatId, InputFile, InputMedia, InputMediaPhoto, MessageId, ParseMode, ReactionType,
    ReplyParameters,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use vktg_config::model::TelegramConfig;
use vktg_core::{
    AdapterType, ChannelId, ControlEvent, DestinationAdapter, DestinationMessageId, HealthStatus,
    MediaSource, Notifier, PluginAdapter, RelayError,
};

/// Photos per `sendMediaGroup` call accepted by Telegram.
const MEDIA_GROUP_LIMIT: usize = 10;

/// Telegram adapter: outgoing sends plus the operator-message dispatcher.
pub struct TelegramDestination {
    bot: Bot,
    /// Downloads of source media that must be converted before upload.
    http: reqwest::Client,
    config: TelegramConfig,
    control_rx: tokio::sync::Mutex<mpsc::Receiver<ControlEvent>>,
    control_tx: mpsc::Sender<ControlEvent>,
    polling_handle: Option<tokio::task::JoinHandle<()>>,
    shutdown_token: Option<ShutdownToken>,
}

impl TelegramDestination {
    /// Creates the adapter. Requires a non-empty `telegram.bot_token`.
    pub fn new(config: TelegramConfig) -> Result<Self, RelayError> {
        let token = config.bot_token.as_deref().ok_or_else(|| {
            RelayError::Config("telegram.bot_token is required for the Telegram adapter".into())
        })?;
        if token.is_empty() {
            return Err(RelayError::Config("telegram.bot_token cannot be empty".into()));
        }

        let client = teloxide::net::default_reqwest_settings()
            .timeout(Duration::from_secs(config.send_timeout_secs))
            .build()
            .map_err(|e| RelayError::Config(format!("cannot build Telegram HTTP client: {e}")))?;
        let bot = Bot::with_client(token, client);
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.send_timeout_secs))
            .build()
            .map_err(|e| RelayError::Config(format!("cannot build media HTTP client: {e}")))?;
        let (control_tx, control_rx) = mpsc::channel(100);

        Ok(Self {
            bot,
            http,
            config,
            control_rx: tokio::sync::Mutex::new(control_rx),
            control_tx,
            polling_handle: None,
            shutdown_token: None,
        })
    }

    /// Starts long polling for operator messages.
    pub fn connect(&mut self) {
        if self.polling_handle.is_some() {
            return;
        }

        let control_chat_id = self.config.control_chat_id;
        let allowed_users: Arc<Vec<String>> = Arc::new(self.config.allowed_users.clone());
        let tx = self.control_tx.clone();

        let on_message = {
            let tx = tx.clone();
            let allowed = allowed_users.clone();
            move |bot: Bot, msg: Message| {
                let tx = tx.clone();
                let allowed = allowed.clone();
                async move {
                    forward_operator_message(&bot, &msg, false, control_chat_id, &allowed, &tx)
                        .await;
                    respond(())
                }
            }
        };
        let on_edit = move |bot: Bot, msg: Message| {
            let tx = tx.clone();
            let allowed = allowed_users.clone();
            async move {
                forward_operator_message(&bot, &msg, true, control_chat_id, &allowed, &tx).await;
                respond(())
            }
        };

        let handler = dptree::entry()
            .branch(Update::filter_message().endpoint(on_message))
            .branch(Update::filter_edited_message().endpoint(on_edit));

        let mut dispatcher = Dispatcher::builder(self.bot.clone(), handler)
            .default_handler(|_| async {})
            .build();
        self.shutdown_token = Some(dispatcher.shutdown_token());

        info!("starting Telegram long polling");
        self.polling_handle = Some(tokio::spawn(async move {
            dispatcher.dispatch().await;
        }));
    }

    /// Next operator event. Fails once the dispatcher is gone.
    pub async fn receive(&self) -> Result<ControlEvent, RelayError> {
        let mut rx = self.control_rx.lock().await;
        rx.recv().await.ok_or_else(|| RelayError::Channel {
            message: "Telegram control channel closed".into(),
            source: None,
        })
    }

    fn control_chat(&self) -> Result<ChatId, RelayError> {
        self.config
            .control_chat_id
            .map(ChatId)
            .ok_or_else(|| RelayError::Config("telegram.control_chat_id is not set".into()))
    }
}

async fn forward_operator_message(
    bot: &Bot,
    msg: &Message,
    edited: bool,
    control_chat_id: Option<i64>,
    allowed_users: &[String],
    tx: &mpsc::Sender<ControlEvent>,
) {
    if !handler::is_authorized(msg, control_chat_id, allowed_users) {
        debug!(chat_id = msg.chat.id.0, "ignoring unauthorized user");
        return;
    }

    match handler::to_control_event(bot, msg, edited).await {
        Ok(Some(event)) => {
            if tx.send(event).await.is_err() {
                warn!("control channel closed, dropping message");
            }
        }
        Ok(None) => {}
        Err(e) => error!(error = %e, "failed to decode operator message"),
    }
}

fn chat(channel: ChannelId) -> ChatId {
    ChatId(channel.0)
}

fn reply(reply_to: Option<DestinationMessageId>) -> Option<ReplyParameters> {
    reply_to.map(|id| ReplyParameters::new(MessageId(id.0)))
}

fn sent(message: &Message) -> DestinationMessageId {
    DestinationMessageId(message.id.0)
}

fn send_error(what: &'static str) -> impl FnOnce(teloxide::RequestError) -> RelayError {
    move |e| RelayError::channel(format!("failed to {what}: {e}"), e)
}

#[async_trait]
impl PluginAdapter for TelegramDestination {
    fn name(&self) -> &str {
        "telegram"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Destination
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        match self.bot.get_me().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(format!(
                "Telegram bot unreachable: {e}"
            ))),
        }
    }

    /// Stops the dispatcher, waiting for in-flight handlers.
    async fn shutdown(&self) -> Result<(), RelayError> {
        debug!("Telegram destination shutting down");
        if let Some(token) = &self.shutdown_token {
            match token.shutdown() {
                Ok(stopped) => stopped.await,
                Err(_) => debug!("dispatcher was not running"),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DestinationAdapter for TelegramDestination {
    async fn send_text(
        &self,
        channel: ChannelId,
        html: &str,
        reply_to: Option<DestinationMessageId>,
    ) -> Result<DestinationMessageId, RelayError> {
        let mut request = self
            .bot
            .send_message(chat(channel), html)
            .parse_mode(ParseMode::Html);
        if let Some(parameters) = reply(reply_to) {
            request = request.reply_parameters(parameters);
        }
        let message = request.await.map_err(send_error("send message"))?;
        Ok(sent(&message))
    }

    async fn send_notice(
        &self,
        channel: ChannelId,
        text: &str,
    ) -> Result<DestinationMessageId, RelayError> {
        let message = self
            .bot
            .send_message(chat(channel), text)
            .disable_notification(true)
            .await
            .map_err(send_error("send notice"))?;
        Ok(sent(&message))
    }

    async fn send_photo(
        &self,
        channel: ChannelId,
        photo: MediaSource,
        caption: &str,
        reply_to: Option<DestinationMessageId>,
    ) -> Result<DestinationMessageId, RelayError> {
        let mut request = self.bot.send_photo(chat(channel), media::input_file(photo)?);
        if !caption.is_empty() {
            request = request.caption(caption).parse_mode(ParseMode::Html);
        }
        if let Some(parameters) = reply(reply_to) {
            request = request.reply_parameters(parameters);
        }
        let message = request.await.map_err(send_error("send photo"))?;
        Ok(sent(&message))
    }

    async fn send_media_group(
        &self,
        channel: ChannelId,
        sources: Vec<MediaSource>,
        caption: &str,
        reply_to: Option<DestinationMessageId>,
    ) -> Result<DestinationMessageId, RelayError> {
        if sources.len() > MEDIA_GROUP_LIMIT {
            return Err(RelayError::InvalidInput(format!(
                "media group of {} items exceeds {MEDIA_GROUP_LIMIT}",
                sources.len()
            )));
        }

        let mut items = Vec::with_capacity(sources.len());
        for (index, source) in sources.into_iter().enumerate() {
            let mut photo = InputMediaPhoto::new(media::input_file(source)?);
            if index == 0 && !caption.is_empty() {
                photo = photo.caption(caption).parse_mode(ParseMode::Html);
            }
            items.push(InputMedia::Photo(photo));
        }

        let mut request = self.bot.send_media_group(chat(channel), items);
        if let Some(parameters) = reply(reply_to) {
            request = request.reply_parameters(parameters);
        }
        let messages = request.await.map_err(send_error("send media group"))?;
        messages.first().map(sent).ok_or_else(|| RelayError::Channel {
            message: "media group send returned no messages".into(),
            source: None,
        })
    }

    async fn send_sticker(
        &self,
        channel: ChannelId,
        sticker_url: &str,
        reply_to: Option<DestinationMessageId>,
    ) -> Result<DestinationMessageId, RelayError> {
        // Telegram only takes WEBP stickers by URL; VK serves PNG.
        let png = media::fetch(&self.http, sticker_url).await?;
        let sticker = InputFile::memory(media::sticker_webp(&png)?).file_name("sticker.webp");
        let mut request = self.bot.send_sticker(chat(channel), sticker);
        if let Some(parameters) = reply(reply_to) {
            request = request.reply_parameters(parameters);
        }
        let message = request.await.map_err(send_error("send sticker"))?;
        Ok(sent(&message))
    }

    async fn set_chat_photo(&self, channel: ChannelId, photo_url: &str) -> Result<(), RelayError> {
        let avatar = media::fetch(&self.http, photo_url).await?;
        let photo = InputFile::memory(media::chat_photo_jpeg(&avatar)?).file_name("avatar.jpg");
        self.bot
            .set_chat_photo(chat(channel), photo)
            .await
            .map_err(send_error("set chat photo"))?;
        Ok(())
    }

    async fn react(
        &self,
        channel: ChannelId,
        message: DestinationMessageId,
        emoji: &str,
    ) -> Result<(), RelayError> {
        self.bot
            .set_message_reaction(chat(channel), MessageId(message.0))
            .reaction(vec![ReactionType::Emoji {
                emoji: emoji.to_string(),
            }])
            .await
            .map_err(send_error("set reaction"))?;
        Ok(())
    }

    async fn delete_message(
        &self,
        channel: ChannelId,
        message: DestinationMessageId,
    ) -> Result<(), RelayError> {
        self.bot
            .delete_message(chat(channel), MessageId(message.0))
            .await
            .map_err(send_error("delete message"))?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramDestination {
    async fn notify(&self, text: &str) -> Result<(), RelayError> {
        self.bot
            .send_message(self.control_chat()?, text)
            .await
            .map_err(send_error("notify operator"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(token: Option<&str>) -> TelegramConfig {
        TelegramConfig {
            bot_token: token.map(str::to_string),
            control_chat_id: Some(42),
            ..Default::default()
        }
    }

    #[test]
    fn new_requires_bot_token() {
        assert!(TelegramDestination::new(config(None)).is_err());
    }

    #[test]
    fn new_rejects_empty_token() {
        assert!(TelegramDestination::new(config(Some(""))).is_err());
    }

    #[test]
    fn new_accepts_valid_token() {
        let destination =
            TelegramDestination::new(config(Some("123456:ABC-DEF1234ghIkl-zyx57W2v1u123ew11")));
        assert!(destination.is_ok());
    }

    #[test]
    fn plugin_adapter_metadata() {
        let destination = TelegramDestination::new(config(Some("test:token"))).unwrap();
        assert_eq!(destination.name(), "telegram");
        assert_eq!(destination.version(), semver::Version::new(0, 1, 0));
        assert_eq!(destination.adapter_type(), AdapterType::Destination);
    }

    #[test]
    fn control_chat_comes_from_config() {
        let destination = TelegramDestination::new(config(Some("test:token"))).unwrap();
        assert_eq!(destination.control_chat().unwrap(), ChatId(42));

        let mut unset = config(Some("test:token"));
        unset.control_chat_id = None;
        let destination = TelegramDestination::new(unset).unwrap();
        assert!(matches!(destination.control_chat(), Err(RelayError::Config(_))));
    }

    #[test]
    fn reply_parameters_only_when_threading() {
        assert!(reply(None).is_none());
        assert_eq!(
            reply(Some(DestinationMessageId(5))).map(|p| p.message_id),
            Some(MessageId(5))
        );
    }

    #[tokio::test]
    async fn shutdown_without_connect_is_ok() {
        let destination = TelegramDestination::new(config(Some("test:token"))).unwrap();
        destination.shutdown().await.unwrap();
    }
}

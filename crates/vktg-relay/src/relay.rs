// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The assembled relay: inbound pipeline plus operator control handling.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};
use vktg_config::VktgConfig;
use vktg_core::html::escape_html;
use vktg_core::{
    ChannelId, ControlEvent, DestinationAdapter, FrameRenderer, OutboundRequest, RelayError,
    StorageAdapter,
};
use vktg_vk::{NewMessage, UpdateEvent, VkApi};

use crate::commands::CommandHandler;
use crate::forwarder::Forwarder;
use crate::normalizer::Normalizer;
use crate::outbound::OutboundRelay;
use crate::poller::UpdateSink;
use crate::read_receipts::ReadReceipts;
use crate::resolver::ThreadResolver;

pub struct Relay {
    normalizer: Arc<Normalizer>,
    resolver: ThreadResolver,
    forwarder: Forwarder,
    read_receipts: Arc<ReadReceipts>,
    outbound: OutboundRelay,
    commands: CommandHandler,
    destination: Arc<dyn DestinationAdapter>,
}

impl Relay {
    /// Builds every relay component around the given adapters.
    ///
    /// Fails when `telegram.control_chat_id` is not configured.
    pub fn new(
        config: &VktgConfig,
        api: Arc<dyn VkApi>,
        store: Arc<dyn StorageAdapter>,
        destination: Arc<dyn DestinationAdapter>,
        renderer: Arc<dyn FrameRenderer>,
    ) -> Result<Self, RelayError> {
        let control_channel = config
            .telegram
            .control_chat_id
            .map(ChannelId)
            .ok_or_else(|| RelayError::Config("telegram.control_chat_id is not set".into()))?;

        let normalizer = Arc::new(Normalizer::new(api.clone(), renderer));
        let read_receipts = Arc::new(ReadReceipts::new(
            config.telegram.read_notification_mode,
            destination.clone(),
            store.clone(),
            api.clone(),
            control_channel,
        ));
        Ok(Self {
            resolver: ThreadResolver::new(store.clone(), api.clone(), normalizer.clone()),
            forwarder: Forwarder::new(destination.clone(), store.clone(), control_channel),
            outbound: OutboundRelay::new(
                api.clone(),
                store.clone(),
                destination.clone(),
                control_channel,
                Duration::from_secs(config.relay.sent_notice_ttl_secs),
            ),
            commands: CommandHandler::new(
                api,
                store,
                destination.clone(),
                read_receipts.clone(),
                control_channel,
                config.relay.listing_chunk_chars,
                Duration::from_millis(config.relay.listing_chunk_delay_ms),
            ),
            normalizer,
            read_receipts,
            destination,
        })
    }

    /// Normalize, route, resolve the reply target, forward.
    ///
    /// An unresolvable reply target only costs the threading; the message
    /// itself is still forwarded.
    pub async fn handle_inbound(&self, update: &NewMessage) -> Result<(), RelayError> {
        let message = self.normalizer.normalize_update(update).await?;
        let route = self.forwarder.route_for(update.peer_id).await;

        let thread = match message.reply_to {
            Some(referenced) => match self
                .resolver
                .resolve(referenced, &route, message.reply_context.as_deref())
                .await
            {
                Ok(target) => Some(target),
                Err(e) => {
                    warn!(
                        message_id = %message.source_message_id,
                        error = %e,
                        "reply target unresolved, forwarding without thread"
                    );
                    None
                }
            },
            None => None,
        };

        self.forwarder.forward(&message, &route, thread).await?;
        Ok(())
    }

    /// Handles one operator event. Problems the operator can fix are
    /// answered in the originating chat; any other failure is reported
    /// there too and returned.
    pub async fn handle_control(&self, event: ControlEvent) -> Result<(), RelayError> {
        let (channel, what, result) = match event {
            ControlEvent::Command { channel, text } => (
                channel,
                "Command failed",
                self.commands.execute(channel, &text).await,
            ),
            ControlEvent::Outbound(request) => {
                let channel = request.channel;
                (channel, "Message not delivered", self.relay_outbound(request).await)
            }
        };
        if let Err(e) = &result {
            let text = escape_html(&format!("{what}: {e}"));
            if let Err(report) = self.destination.send_text(channel, &text, None).await {
                warn!(channel_id = %channel, error = %report, "failure report not sent");
            }
        }
        result
    }

    async fn relay_outbound(&self, request: OutboundRequest) -> Result<(), RelayError> {
        let channel = request.channel;
        match self.outbound.relay(request).await {
            Ok(_) => Ok(()),
            Err(
                e @ (RelayError::MissingPeer(_)
                | RelayError::MissingCorrelation(_)
                | RelayError::InvalidInput(_)),
            ) => {
                debug!(channel_id = %channel, error = %e, "outbound message rejected");
                self.destination
                    .send_text(channel, &escape_html(&e.to_string()), None)
                    .await?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl UpdateSink for Relay {
    async fn handle(&self, event: UpdateEvent) -> Result<(), RelayError> {
        match event {
            UpdateEvent::InboundMessage(update) => self.handle_inbound(&update).await,
            UpdateEvent::ReadReceipt(receipt) => self.read_receipts.handle(receipt).await,
            UpdateEvent::Ignored { .. } => Ok(()),
        }
    }
}

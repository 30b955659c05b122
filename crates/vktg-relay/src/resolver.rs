// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reply threading: finds or reconstructs the destination anchor for a
//! referenced source message.
//!
//! Lookup order is the correlation store, then the source network, then
//! the payload embedded in the replying message. Failures at the first
//! two stages degrade to the next one.

use std::sync::Arc;

use tracing::{debug, warn};
use vktg_core::{CanonicalMessage, RelayError, SourceMessageId, StorageAdapter, ThreadTarget};
use vktg_vk::VkApi;

use crate::forwarder::Route;
use crate::normalizer::Normalizer;

pub struct ThreadResolver {
    store: Arc<dyn StorageAdapter>,
    api: Arc<dyn VkApi>,
    normalizer: Arc<Normalizer>,
}

impl ThreadResolver {
    pub fn new(
        store: Arc<dyn StorageAdapter>,
        api: Arc<dyn VkApi>,
        normalizer: Arc<Normalizer>,
    ) -> Self {
        Self {
            store,
            api,
            normalizer,
        }
    }

    /// Resolves `referenced` for a message travelling along `route`.
    ///
    /// A stored correlation only counts when it lives in the route's
    /// channel. A reconstructed target always carries `referenced` as its
    /// source id so that forwarding it records the fast path for the next
    /// reply.
    pub async fn resolve(
        &self,
        referenced: SourceMessageId,
        route: &Route,
        embedded: Option<&CanonicalMessage>,
    ) -> Result<ThreadTarget, RelayError> {
        match self.store.get_correlation_by_source(referenced).await {
            Ok(Some(row)) if row.destination_channel_id == route.channel => {
                debug!(
                    source_message_id = %referenced,
                    destination_message_id = %row.destination_message_id,
                    "reply target found in store"
                );
                return Ok(ThreadTarget::Existing(row.destination_message_id));
            }
            Ok(_) => {}
            Err(e) => {
                warn!(source_message_id = %referenced, error = %e, "correlation lookup failed");
            }
        }

        match self.fetch(referenced).await {
            Ok(Some(mut original)) => {
                original.source_message_id = referenced;
                return Ok(ThreadTarget::Reconstructed(Box::new(original)));
            }
            Ok(None) => {
                debug!(source_message_id = %referenced, "reply target not returned by source");
            }
            Err(e) => {
                warn!(source_message_id = %referenced, error = %e, "reply target fetch failed");
            }
        }

        if let Some(embedded) = embedded {
            let mut original = embedded.clone();
            original.source_message_id = referenced;
            return Ok(ThreadTarget::Reconstructed(Box::new(original)));
        }

        Err(RelayError::ThreadResolution {
            source_message_id: referenced.0,
        })
    }

    async fn fetch(
        &self,
        referenced: SourceMessageId,
    ) -> Result<Option<CanonicalMessage>, RelayError> {
        match self.api.get_message_by_id(referenced).await? {
            Some(message) => Ok(Some(self.normalizer.normalize_message(&message).await?)),
            None => Ok(None),
        }
    }
}

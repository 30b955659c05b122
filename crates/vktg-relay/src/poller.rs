// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The long-poll loop.
//!
//! The loop is an explicit state machine. [`PollLoop::step`] performs one
//! transition and [`PollLoop::run`] drives it until cancelled. No error
//! ends the loop; every failure parks it in [`LoopState::Backoff`] for the
//! interval of its class.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use vktg_config::model::RetryConfig;
use vktg_core::{BackoffClass, Notifier, RelayError};
use vktg_vk::{PollSession, SessionManager, UpdateEvent, VkApi, classify};

use crate::recording;

/// Receives classified updates. Errors are logged by the loop and never
/// abort the batch.
#[async_trait]
pub trait UpdateSink: Send + Sync {
    async fn handle(&self, event: UpdateEvent) -> Result<(), RelayError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopState {
    NoSession,
    Active(PollSession),
    /// Waiting before the next attempt. A retained session resumes from
    /// its cursor.
    Backoff {
        class: BackoffClass,
        session: Option<PollSession>,
    },
}

/// Fixed sleep per backoff class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub connection: Duration,
    pub protocol: Duration,
    pub generic: Duration,
}

impl BackoffPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            connection: Duration::from_secs(config.connection_interval_secs),
            protocol: Duration::from_secs(config.protocol_interval_secs),
            generic: Duration::from_secs(config.generic_interval_secs),
        }
    }

    pub fn interval(&self, class: BackoffClass) -> Duration {
        match class {
            BackoffClass::Connection => self.connection,
            BackoffClass::Protocol => self.protocol,
            BackoffClass::Generic => self.generic,
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

pub struct PollLoop {
    sessions: SessionManager,
    api: Arc<dyn VkApi>,
    sink: Arc<dyn UpdateSink>,
    notifier: Arc<dyn Notifier>,
    policy: BackoffPolicy,
}

impl PollLoop {
    pub fn new(
        api: Arc<dyn VkApi>,
        sink: Arc<dyn UpdateSink>,
        notifier: Arc<dyn Notifier>,
        policy: BackoffPolicy,
    ) -> Self {
        Self {
            sessions: SessionManager::new(api.clone()),
            api,
            sink,
            notifier,
            policy,
        }
    }

    /// Runs until `cancel` fires. An in-flight poll is abandoned; the
    /// cursor is process-local, so nothing is left half-written.
    pub async fn run(&self, cancel: CancellationToken) {
        info!("poll loop running");
        let mut state = LoopState::NoSession;
        loop {
            state = tokio::select! {
                next = self.step(state) => next,
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping poll loop");
                    break;
                }
            };
        }
        info!("poll loop stopped");
    }

    /// Performs one state transition.
    pub async fn step(&self, state: LoopState) -> LoopState {
        match state {
            LoopState::NoSession => match self.sessions.acquire_session().await {
                Ok(session) => LoopState::Active(session),
                Err(e) => self.back_off(e, None).await,
            },
            LoopState::Active(session) if !self.sessions.is_live(&session) => {
                debug!("session no longer live, re-acquiring");
                LoopState::NoSession
            }
            LoopState::Active(mut session) => match self.api.poll(&session).await {
                Ok(response) => {
                    session.advance(response.ts);
                    self.dispatch(&response.updates).await;
                    LoopState::Active(session)
                }
                Err(RelayError::SessionExpired { code }) => {
                    info!(code, "long-poll session expired");
                    LoopState::NoSession
                }
                Err(e) => self.back_off(e, Some(session)).await,
            },
            LoopState::Backoff { class, session } => {
                let interval = self.policy.interval(class);
                debug!(%class, ?interval, "backing off");
                tokio::time::sleep(interval).await;
                match session {
                    Some(session) => LoopState::Active(session),
                    None => LoopState::NoSession,
                }
            }
        }
    }

    async fn back_off(&self, e: RelayError, session: Option<PollSession>) -> LoopState {
        let class = e.backoff_class();
        recording::record_backoff(&class.to_string());
        warn!(%class, error = %e, "poll iteration failed");
        self.report(&e).await;
        LoopState::Backoff { class, session }
    }

    /// Classifies and dispatches one batch. Any single update may fail
    /// without affecting the others.
    async fn dispatch(&self, updates: &[Value]) {
        for raw in updates {
            let event = match classify(raw) {
                Ok(event) => event,
                Err(e) => {
                    warn!(update = %raw, error = %e, "skipping malformed update");
                    continue;
                }
            };
            recording::record_update(event.kind());

            if let UpdateEvent::Ignored { code } = event {
                debug!(code, "ignoring update");
                continue;
            }
            if let Err(e) = self.sink.handle(event).await {
                error!(error = %e, "failed to handle update");
                self.report(&e).await;
            }
        }
    }

    async fn report(&self, e: &RelayError) {
        if !e.is_operator_actionable() {
            return;
        }
        if let Err(notify_err) = self.notifier.notify(&e.to_string()).await {
            warn!(error = %notify_err, "operator notification failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::Mutex;
    use vktg_core::{PeerId, SourceMessageId};
    use vktg_test_utils::{MockDestination, MockVkApi, fixtures};
    use vktg_vk::Cursor;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<UpdateEvent>>,
        fail_on: Option<SourceMessageId>,
    }

    #[async_trait]
    impl UpdateSink for RecordingSink {
        async fn handle(&self, event: UpdateEvent) -> Result<(), RelayError> {
            let failing = matches!(
                &event,
                UpdateEvent::InboundMessage(m) if Some(m.message_id) == self.fail_on
            );
            self.events.lock().await.push(event);
            if failing {
                return Err(RelayError::Protocol {
                    code: 9,
                    message: "flood control".into(),
                });
            }
            Ok(())
        }
    }

    struct Setup {
        vk: Arc<MockVkApi>,
        sink: Arc<RecordingSink>,
        notifier: Arc<MockDestination>,
        poll_loop: PollLoop,
    }

    fn setup_with(sink: RecordingSink) -> Setup {
        let vk = Arc::new(MockVkApi::new());
        let sink = Arc::new(sink);
        let notifier = Arc::new(MockDestination::new());
        let poll_loop = PollLoop::new(
            vk.clone(),
            sink.clone(),
            notifier.clone(),
            BackoffPolicy::default(),
        );
        Setup {
            vk,
            sink,
            notifier,
            poll_loop,
        }
    }

    fn setup() -> Setup {
        setup_with(RecordingSink::default())
    }

    fn session(cursor: &str) -> PollSession {
        PollSession::new("https://lp.test", "key", Cursor::new(cursor))
    }

    fn connectivity() -> RelayError {
        RelayError::Connectivity {
            message: "HTTP 503".into(),
            source: None,
        }
    }

    #[tokio::test]
    async fn no_session_acquires() {
        let s = setup();
        let state = s.poll_loop.step(LoopState::NoSession).await;
        let LoopState::Active(session) = state else {
            panic!("expected active session, got {state:?}");
        };
        assert_eq!(session.endpoint, "https://lp.test");
        assert_eq!(session.cursor, Cursor::new("1"));
    }

    #[tokio::test]
    async fn acquire_failure_backs_off_without_session() {
        let s = setup();
        s.vk.push_server(Err(connectivity())).await;
        assert_eq!(
            s.poll_loop.step(LoopState::NoSession).await,
            LoopState::Backoff {
                class: BackoffClass::Connection,
                session: None
            }
        );
    }

    #[tokio::test]
    async fn batch_is_classified_and_cursor_advances() {
        let s = setup();
        s.vk
            .push_poll(Ok(fixtures::long_poll(
                2,
                vec![
                    fixtures::new_message_update(100, 5, "hi", json!({})),
                    json!([4, 101, 3, 5, 1_700_000_000, "mine", {}]),
                    json!([7, 5, 100]),
                    json!("garbage"),
                    json!([61, 5, 1]),
                ],
            )))
            .await;

        let state = s.poll_loop.step(LoopState::Active(session("1"))).await;
        assert_eq!(state, LoopState::Active(session("2")));

        let events = s.sink.events.lock().await;
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            UpdateEvent::InboundMessage(m) if m.message_id == SourceMessageId(100)
        ));
        assert!(matches!(
            &events[1],
            UpdateEvent::ReadReceipt(r) if r.peer_id == PeerId(5) && r.up_to == SourceMessageId(100)
        ));
    }

    #[tokio::test]
    async fn failing_update_does_not_abort_batch() {
        let s = setup_with(RecordingSink {
            fail_on: Some(SourceMessageId(100)),
            ..Default::default()
        });
        s.vk
            .push_poll(Ok(fixtures::long_poll(
                2,
                vec![
                    fixtures::new_message_update(100, 5, "a", json!({})),
                    fixtures::new_message_update(101, 5, "b", json!({})),
                ],
            )))
            .await;

        s.poll_loop.step(LoopState::Active(session("1"))).await;
        assert_eq!(s.sink.events.lock().await.len(), 2);
        assert_eq!(s.notifier.notifications().await.len(), 1);
    }

    #[tokio::test]
    async fn expired_session_is_discarded() {
        let s = setup();
        s.vk.push_poll(Err(RelayError::SessionExpired { code: 2 })).await;
        assert_eq!(
            s.poll_loop.step(LoopState::Active(session("7"))).await,
            LoopState::NoSession
        );
        assert!(s.notifier.notifications().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn connectivity_error_retains_cursor() {
        let s = setup();
        s.vk.push_poll(Err(connectivity())).await;
        s.vk.push_poll(Ok(fixtures::long_poll(8, vec![]))).await;

        let state = s.poll_loop.step(LoopState::Active(session("7"))).await;
        assert_eq!(
            state,
            LoopState::Backoff {
                class: BackoffClass::Connection,
                session: Some(session("7"))
            }
        );

        let started = tokio::time::Instant::now();
        let state = s.poll_loop.step(state).await;
        assert!(started.elapsed() >= Duration::from_secs(30));
        assert_eq!(state, LoopState::Active(session("7")));

        let state = s.poll_loop.step(state).await;
        assert_eq!(state, LoopState::Active(session("8")));
        assert_eq!(
            s.vk.polled_cursors().await,
            vec![Cursor::new("7"), Cursor::new("7")]
        );
        assert!(s.notifier.notifications().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn protocol_error_notifies_and_uses_longer_interval() {
        let s = setup();
        s.vk
            .push_poll(Err(RelayError::Protocol {
                code: 5,
                message: "User authorization failed".into(),
            }))
            .await;

        let state = s.poll_loop.step(LoopState::Active(session("7"))).await;
        assert!(matches!(
            state,
            LoopState::Backoff {
                class: BackoffClass::Protocol,
                ..
            }
        ));
        let notes = s.notifier.notifications().await;
        assert_eq!(notes.len(), 1);
        assert!(notes[0].contains("User authorization failed"));

        let started = tokio::time::Instant::now();
        s.poll_loop.step(state).await;
        assert!(started.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn generic_error_uses_fallback_interval() {
        let s = setup();
        s.vk.push_poll(Err(RelayError::Decode("bad body".into()))).await;
        let state = s.poll_loop.step(LoopState::Active(session("7"))).await;
        assert!(matches!(
            state,
            LoopState::Backoff {
                class: BackoffClass::Generic,
                session: Some(_)
            }
        ));
    }

    #[tokio::test]
    async fn policy_reads_retry_config() {
        let policy = BackoffPolicy::from_config(&RetryConfig {
            connection_interval_secs: 1,
            protocol_interval_secs: 2,
            generic_interval_secs: 3,
        });
        assert_eq!(policy.interval(BackoffClass::Protocol), Duration::from_secs(2));
        assert_eq!(policy.interval(BackoffClass::Generic), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let s = setup();
        let cancel = CancellationToken::new();
        let poll_loop = Arc::new(s.poll_loop);

        let handle = {
            let poll_loop = poll_loop.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { poll_loop.run(cancel).await })
        };
        // The mock poll blocks with an empty queue, so the loop is parked
        // on the long-poll request once the session is acquired.
        while s.vk.polled_cursors().await.is_empty() {
            tokio::task::yield_now().await;
        }
        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(s.vk.acquisitions(), 1);
    }
}

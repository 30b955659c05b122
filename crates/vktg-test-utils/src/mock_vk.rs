// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted VK API for deterministic testing.
//!
//! Profiles, messages and videos are registered up front. Long-poll
//! results are queued and returned in order; once the queue is drained
//! `poll` waits until more are pushed.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use vktg_core::{FrameRenderer, PeerId, RelayError, SourceMessageId};
use vktg_vk::{
    Cursor, Friend, Group, LongPollResponse, LongPollServer, OutgoingMessage, PollSession, User,
    Video, VkApi, VkMessage,
};

pub struct MockVkApi {
    users: Mutex<HashMap<i64, User>>,
    groups: Mutex<HashMap<u64, Group>>,
    messages: Mutex<HashMap<i64, VkMessage>>,
    videos: Mutex<Vec<Video>>,
    friends: Mutex<Vec<Friend>>,
    servers: Mutex<VecDeque<Result<LongPollServer, RelayError>>>,
    polls: Mutex<VecDeque<Result<LongPollResponse, RelayError>>>,
    poll_ready: Notify,
    polled_cursors: Mutex<Vec<Cursor>>,
    sent: Mutex<Vec<OutgoingMessage>>,
    uploads: Mutex<Vec<Vec<u8>>>,
    marked_read: Mutex<Vec<PeerId>>,
    next_message_id: AtomicI64,
    failing_writes: AtomicBool,
    acquisitions: AtomicUsize,
    fetches: AtomicUsize,
}

impl MockVkApi {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            groups: Mutex::new(HashMap::new()),
            messages: Mutex::new(HashMap::new()),
            videos: Mutex::new(Vec::new()),
            friends: Mutex::new(Vec::new()),
            servers: Mutex::new(VecDeque::new()),
            polls: Mutex::new(VecDeque::new()),
            poll_ready: Notify::new(),
            polled_cursors: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
            marked_read: Mutex::new(Vec::new()),
            next_message_id: AtomicI64::new(10_000),
            failing_writes: AtomicBool::new(false),
            acquisitions: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
        }
    }

    pub async fn add_user(&self, user: User) {
        self.users.lock().await.insert(user.id, user);
    }

    pub async fn add_group(&self, group: Group) {
        self.groups.lock().await.insert(group.id.unsigned_abs(), group);
    }

    pub async fn add_message(&self, message: VkMessage) {
        self.messages.lock().await.insert(message.id, message);
    }

    pub async fn add_video(&self, video: Video) {
        self.videos.lock().await.push(video);
    }

    pub async fn add_friend(&self, friend: Friend) {
        self.friends.lock().await.push(friend);
    }

    /// Queue a result for the next `get_long_poll_server` call.
    ///
    /// With an empty queue a default server (`key`, `lp.test`, ts `1`) is
    /// returned.
    pub async fn push_server(&self, result: Result<LongPollServer, RelayError>) {
        self.servers.lock().await.push_back(result);
    }

    /// Queue a result for the next `poll` call.
    pub async fn push_poll(&self, result: Result<LongPollResponse, RelayError>) {
        self.polls.lock().await.push_back(result);
        self.poll_ready.notify_one();
    }

    /// Make `send_message` and `mark_as_read` fail with a protocol error.
    pub fn set_failing_writes(&self, failing: bool) {
        self.failing_writes.store(failing, Ordering::SeqCst);
    }

    fn check_writes(&self) -> Result<(), RelayError> {
        if self.failing_writes.load(Ordering::SeqCst) {
            return Err(RelayError::Protocol {
                code: 901,
                message: "Can't send messages for users without permission".into(),
            });
        }
        Ok(())
    }

    /// Cursors passed to `poll`, in call order.
    pub async fn polled_cursors(&self) -> Vec<Cursor> {
        self.polled_cursors.lock().await.clone()
    }

    pub async fn sent_messages(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn uploads(&self) -> Vec<Vec<u8>> {
        self.uploads.lock().await.clone()
    }

    pub async fn marked_read(&self) -> Vec<PeerId> {
        self.marked_read.lock().await.clone()
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    /// Number of `get_message_by_id` calls.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl Default for MockVkApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VkApi for MockVkApi {
    async fn get_long_poll_server(&self) -> Result<LongPollServer, RelayError> {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        match self.servers.lock().await.pop_front() {
            Some(result) => result,
            None => Ok(LongPollServer {
                key: "key".into(),
                server: "lp.test".into(),
                ts: Cursor::new("1"),
            }),
        }
    }

    async fn poll(&self, session: &PollSession) -> Result<LongPollResponse, RelayError> {
        self.polled_cursors.lock().await.push(session.cursor.clone());
        loop {
            if let Some(result) = self.polls.lock().await.pop_front() {
                return result;
            }
            self.poll_ready.notified().await;
        }
    }

    async fn get_message_by_id(
        &self,
        id: SourceMessageId,
    ) -> Result<Option<VkMessage>, RelayError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.messages.lock().await.get(&id.0).cloned())
    }

    async fn get_user(&self, user_id: i64) -> Result<User, RelayError> {
        self.users
            .lock()
            .await
            .get(&user_id)
            .cloned()
            .ok_or_else(|| RelayError::EmptyResponse {
                method: "users.get".into(),
            })
    }

    async fn get_group(&self, group_id: u64) -> Result<Group, RelayError> {
        self.groups
            .lock()
            .await
            .get(&group_id)
            .cloned()
            .ok_or_else(|| RelayError::EmptyResponse {
                method: "groups.getById".into(),
            })
    }

    async fn get_videos(&self, keys: &[String]) -> Result<Vec<Video>, RelayError> {
        let videos = self.videos.lock().await;
        Ok(keys
            .iter()
            .filter_map(|key| videos.iter().find(|v| &v.lookup_key() == key).cloned())
            .collect())
    }

    async fn send_message(
        &self,
        message: &OutgoingMessage,
    ) -> Result<SourceMessageId, RelayError> {
        self.check_writes()?;
        self.sent.lock().await.push(message.clone());
        Ok(SourceMessageId(
            self.next_message_id.fetch_add(1, Ordering::SeqCst),
        ))
    }

    async fn upload_photo(&self, bytes: Vec<u8>) -> Result<String, RelayError> {
        let mut uploads = self.uploads.lock().await;
        uploads.push(bytes);
        Ok(format!("photo1_{}", uploads.len()))
    }

    async fn mark_as_read(&self, peer: PeerId) -> Result<(), RelayError> {
        self.check_writes()?;
        self.marked_read.lock().await.push(peer);
        Ok(())
    }

    async fn get_friends(&self) -> Result<Vec<Friend>, RelayError> {
        Ok(self.friends.lock().await.clone())
    }
}

/// Frame renderer returning the URL bytes; URLs containing `broken` fail.
pub struct StubFrameRenderer;

#[async_trait]
impl FrameRenderer for StubFrameRenderer {
    async fn render(&self, frame_url: &str) -> Result<Vec<u8>, RelayError> {
        if frame_url.contains("broken") {
            return Err(RelayError::Connectivity {
                message: format!("cannot fetch {frame_url}"),
                source: None,
            });
        }
        Ok(frame_url.as_bytes().to_vec())
    }
}

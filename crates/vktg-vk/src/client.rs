// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the VK API.
//!
//! Every call is a form-encoded POST. Responses go through
//! [`check_envelope`] so callers see the error taxonomy of
//! [`RelayError`] rather than raw JSON.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use vktg_config::model::VkConfig;
use vktg_core::{PeerId, RelayError, SourceMessageId};

use crate::envelope::check_envelope;
use crate::session::PollSession;
use crate::types::{
    Friend, Group, GroupList, ItemList, LongPollResponse, LongPollServer, SavedPhoto,
    UploadServer, UploadedPhoto, User, Video, VkMessage,
};

/// A message to deliver to a VK peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub peer: PeerId,
    pub text: String,
    pub reply_to: Option<SourceMessageId>,
    /// Pre-uploaded attachment reference such as `photo1_2`.
    pub attachment: Option<String>,
}

/// The VK calls the relay depends on.
#[async_trait]
pub trait VkApi: Send + Sync {
    async fn get_long_poll_server(&self) -> Result<LongPollServer, RelayError>;

    /// One `a_check` request, held server-side for the configured wait.
    async fn poll(&self, session: &PollSession) -> Result<LongPollResponse, RelayError>;

    async fn get_message_by_id(
        &self,
        id: SourceMessageId,
    ) -> Result<Option<VkMessage>, RelayError>;

    async fn get_user(&self, user_id: i64) -> Result<User, RelayError>;

    async fn get_group(&self, group_id: u64) -> Result<Group, RelayError>;

    /// Batched lookup by `{owner}_{id}[_{access_key}]` keys.
    async fn get_videos(&self, keys: &[String]) -> Result<Vec<Video>, RelayError>;

    async fn send_message(
        &self,
        message: &OutgoingMessage,
    ) -> Result<SourceMessageId, RelayError>;

    /// Uploads a photo for use in a message and returns its attachment reference.
    async fn upload_photo(&self, bytes: Vec<u8>) -> Result<String, RelayError>;

    async fn mark_as_read(&self, peer: PeerId) -> Result<(), RelayError>;

    async fn get_friends(&self) -> Result<Vec<Friend>, RelayError>;
}

/// reqwest-backed [`VkApi`] implementation.
#[derive(Debug, Clone)]
pub struct VkClient {
    client: reqwest::Client,
    timeout: Duration,
    access_token: String,
    api_version: String,
    base_url: String,
    lp_version: u32,
    long_poll_mode: u32,
    long_poll_version: u32,
    long_poll_wait_secs: u64,
}

impl VkClient {
    pub fn new(config: &VkConfig) -> Result<Self, RelayError> {
        let access_token = config
            .resolved_access_token()
            .ok_or_else(|| RelayError::Config("vk.access_token is not set".into()))?;

        let timeout = Duration::from_secs(config.request_timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Connectivity {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            timeout,
            access_token,
            api_version: config.api_version.clone(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            lp_version: config.lp_version,
            long_poll_mode: config.long_poll_mode,
            long_poll_version: config.long_poll_version,
            long_poll_wait_secs: config.long_poll_wait_secs,
        })
    }

    /// Calls an API method and decodes the unwrapped `response` payload.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<(&str, String)>,
    ) -> Result<T, RelayError> {
        let mut form = params;
        form.push(("access_token", self.access_token.clone()));
        form.push(("v", self.api_version.clone()));

        let url = format!("{}/{method}", self.base_url);
        let response = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| self.transport_error(method, e))?;
        let payload = read_envelope(method, response).await?;
        decode(method, payload)
    }

    /// Timeouts keep their own variant; everything else is connectivity.
    fn transport_error(&self, method: &str, e: reqwest::Error) -> RelayError {
        if e.is_timeout() {
            return RelayError::Timeout {
                duration: self.timeout,
            };
        }
        RelayError::Connectivity {
            message: format!("{method}: {e}"),
            source: Some(Box::new(e)),
        }
    }
}

async fn read_envelope(method: &str, response: reqwest::Response) -> Result<Value, RelayError> {
    let body = read_json(method, response).await?;
    check_envelope(method, body)
}

/// Maps non-200 statuses to connectivity errors.
async fn read_json(method: &str, response: reqwest::Response) -> Result<Value, RelayError> {
    let status = response.status();
    debug!(method, status = %status, "VK response received");
    if status != reqwest::StatusCode::OK {
        return Err(RelayError::Connectivity {
            message: format!("{method} returned HTTP {status}"),
            source: None,
        });
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| RelayError::Decode(format!("{method}: {e}")))
}

fn decode<T: DeserializeOwned>(method: &str, value: Value) -> Result<T, RelayError> {
    serde_json::from_value(value).map_err(|e| RelayError::Decode(format!("{method}: {e}")))
}

#[async_trait]
impl VkApi for VkClient {
    async fn get_long_poll_server(&self) -> Result<LongPollServer, RelayError> {
        self.call(
            "messages.getLongPollServer",
            vec![
                ("need_pts", "0".into()),
                ("lp_version", self.lp_version.to_string()),
            ],
        )
        .await
    }

    async fn poll(&self, session: &PollSession) -> Result<LongPollResponse, RelayError> {
        let form = [
            ("act", "a_check".to_string()),
            ("key", session.key.clone()),
            ("ts", session.cursor.to_string()),
            ("wait", self.long_poll_wait_secs.to_string()),
            ("mode", self.long_poll_mode.to_string()),
            ("version", self.long_poll_version.to_string()),
        ];
        let response = self
            .client
            .post(&session.endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|e| self.transport_error("a_check", e))?;
        let body = read_envelope("a_check", response).await?;
        decode("a_check", body)
    }

    async fn get_message_by_id(
        &self,
        id: SourceMessageId,
    ) -> Result<Option<VkMessage>, RelayError> {
        let list: ItemList<VkMessage> = self
            .call("messages.getById", vec![("message_ids", id.to_string())])
            .await?;
        Ok(list.items.into_iter().next())
    }

    async fn get_user(&self, user_id: i64) -> Result<User, RelayError> {
        let users: Vec<User> = self
            .call(
                "users.get",
                vec![
                    ("user_ids", user_id.to_string()),
                    ("fields", "photo_200".into()),
                    ("name_case", "nom".into()),
                ],
            )
            .await?;
        users
            .into_iter()
            .next()
            .ok_or_else(|| RelayError::EmptyResponse {
                method: "users.get".into(),
            })
    }

    async fn get_group(&self, group_id: u64) -> Result<Group, RelayError> {
        let groups: GroupList = self
            .call("groups.getById", vec![("group_id", group_id.to_string())])
            .await?;
        groups.into_first().ok_or_else(|| RelayError::EmptyResponse {
            method: "groups.getById".into(),
        })
    }

    async fn get_videos(&self, keys: &[String]) -> Result<Vec<Video>, RelayError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let list: ItemList<Video> = self
            .call("video.get", vec![("videos", keys.join(","))])
            .await?;
        Ok(list.items)
    }

    async fn send_message(
        &self,
        message: &OutgoingMessage,
    ) -> Result<SourceMessageId, RelayError> {
        let mut params = vec![
            ("peer_id", message.peer.to_string()),
            ("message", message.text.clone()),
            ("random_id", "0".into()),
        ];
        if let Some(reply_to) = message.reply_to {
            params.push(("reply_to", reply_to.to_string()));
        }
        if let Some(attachment) = &message.attachment {
            params.push(("attachment", attachment.clone()));
        }
        let id: i64 = self.call("messages.send", params).await?;
        Ok(SourceMessageId(id))
    }

    async fn upload_photo(&self, bytes: Vec<u8>) -> Result<String, RelayError> {
        let server: UploadServer = self
            .call("photos.getMessagesUploadServer", Vec::new())
            .await?;

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name("photo.jpg")
            .mime_str("image/jpeg")
            .map_err(|e| RelayError::Internal(format!("invalid upload MIME type: {e}")))?;
        let form = reqwest::multipart::Form::new().part("photo", part);
        let response = self
            .client
            .post(&server.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.transport_error("photo upload", e))?;
        let body = read_json("photo upload", response).await?;
        let uploaded: UploadedPhoto = decode("photo upload", body)?;
        if uploaded.photo.is_empty() || uploaded.photo == "[]" {
            return Err(RelayError::EmptyResponse {
                method: "photo upload".into(),
            });
        }

        let saved: Vec<SavedPhoto> = self
            .call(
                "photos.saveMessagesPhoto",
                vec![
                    ("server", uploaded.server.to_string()),
                    ("photo", uploaded.photo),
                    ("hash", uploaded.hash),
                ],
            )
            .await?;
        let photo = saved
            .into_iter()
            .next()
            .ok_or_else(|| RelayError::EmptyResponse {
                method: "photos.saveMessagesPhoto".into(),
            })?;
        Ok(format!("photo{}_{}", photo.owner_id, photo.id))
    }

    async fn mark_as_read(&self, peer: PeerId) -> Result<(), RelayError> {
        let _: Value = self
            .call("messages.markAsRead", vec![("peer_id", peer.to_string())])
            .await?;
        Ok(())
    }

    async fn get_friends(&self) -> Result<Vec<Friend>, RelayError> {
        let list: ItemList<Friend> = self
            .call(
                "friends.get",
                vec![
                    ("fields", "nickname".into()),
                    ("order", "hints".into()),
                    ("name_case", "nom".into()),
                ],
            )
            .await?;
        Ok(list.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionManager;
    use crate::types::Cursor;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> VkClient {
        let config = VkConfig {
            access_token: Some("tok".into()),
            api_base_url: format!("{}/method", server.uri()),
            ..VkConfig::default()
        };
        VkClient::new(&config).unwrap()
    }

    async fn mount(server: &MockServer, api_method: &str, body: Value) {
        Mock::given(method("POST"))
            .and(path(format!("/method/{api_method}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[test]
    fn new_requires_access_token() {
        let err = VkClient::new(&VkConfig::default()).unwrap_err();
        assert!(matches!(err, RelayError::Config(_)));
    }

    #[tokio::test]
    async fn calls_are_form_encoded_with_token_and_version() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/method/users.get"))
            .and(body_string_contains("access_token=tok"))
            .and(body_string_contains("v=5.199"))
            .and(body_string_contains("user_ids=1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": [{"id": 1, "first_name": "Pavel", "last_name": "Durov",
                              "photo_200": "https://vk.com/a.jpg"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let user = test_client(&server).get_user(1).await.unwrap();
        assert_eq!(user.full_name(), "Pavel Durov");
        assert_eq!(user.photo_200.as_deref(), Some("https://vk.com/a.jpg"));
    }

    #[tokio::test]
    async fn non_200_is_connectivity_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/method/messages.getById"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = test_client(&server)
            .get_message_by_id(SourceMessageId(1))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Connectivity { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn slow_response_is_timeout_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/method/users.get"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"response": []}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let config = VkConfig {
            access_token: Some("tok".into()),
            api_base_url: format!("{}/method", server.uri()),
            request_timeout_secs: 1,
            ..VkConfig::default()
        };
        let err = VkClient::new(&config).unwrap().get_user(1).await.unwrap_err();
        assert!(
            matches!(err, RelayError::Timeout { duration } if duration == Duration::from_secs(1)),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn api_error_body_is_protocol_error() {
        let server = MockServer::start().await;
        mount(
            &server,
            "groups.getById",
            json!({"error": {"error_code": 100, "error_msg": "One of the parameters specified was missing or invalid"}}),
        )
        .await;

        let err = test_client(&server).get_group(1).await.unwrap_err();
        assert!(matches!(err, RelayError::Protocol { code: 100, .. }));
    }

    #[tokio::test]
    async fn get_group_reads_wrapped_shape() {
        let server = MockServer::start().await;
        mount(
            &server,
            "groups.getById",
            json!({"response": {"groups": [{"id": 22822305, "name": "VK"}], "profiles": []}}),
        )
        .await;

        let group = test_client(&server).get_group(22822305).await.unwrap();
        assert_eq!(group.name, "VK");
    }

    #[tokio::test]
    async fn get_message_by_id_returns_first_item() {
        let server = MockServer::start().await;
        mount(
            &server,
            "messages.getById",
            json!({"response": {"count": 1, "items": [
                {"id": 77, "from_id": 5, "peer_id": 5, "text": "hello", "attachments": []}
            ]}}),
        )
        .await;

        let msg = test_client(&server)
            .get_message_by_id(SourceMessageId(77))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.id, 77);
        assert_eq!(msg.text, "hello");
    }

    #[tokio::test]
    async fn send_message_passes_reply_and_random_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/method/messages.send"))
            .and(body_string_contains("peer_id=5"))
            .and(body_string_contains("reply_to=70"))
            .and(body_string_contains("random_id=0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": 71})))
            .expect(1)
            .mount(&server)
            .await;

        let id = test_client(&server)
            .send_message(&OutgoingMessage {
                peer: PeerId(5),
                text: "hi".into(),
                reply_to: Some(SourceMessageId(70)),
                attachment: None,
            })
            .await
            .unwrap();
        assert_eq!(id, SourceMessageId(71));
    }

    #[tokio::test]
    async fn upload_photo_runs_three_steps() {
        let server = MockServer::start().await;
        mount(
            &server,
            "photos.getMessagesUploadServer",
            json!({"response": {"upload_url": format!("{}/upload", server.uri()), "album_id": -3}}),
        )
        .await;
        Mock::given(method("POST"))
            .and(path("/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "server": 839, "photo": "[{\"photo\":\"abc\"}]", "hash": "h1"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/method/photos.saveMessagesPhoto"))
            .and(body_string_contains("hash=h1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": [{"id": 457, "owner_id": 12, "sizes": []}]
            })))
            .mount(&server)
            .await;

        let attachment = test_client(&server)
            .upload_photo(vec![0xFF, 0xD8, 0xFF])
            .await
            .unwrap();
        assert_eq!(attachment, "photo12_457");
    }

    #[tokio::test]
    async fn session_manager_builds_endpoint_and_poll_reads_updates() {
        let server = MockServer::start().await;
        mount(
            &server,
            "messages.getLongPollServer",
            json!({"response": {"key": "k1", "server": format!("{}/lp", server.uri()), "ts": 1874}}),
        )
        .await;
        Mock::given(method("POST"))
            .and(path("/lp"))
            .and(body_string_contains("act=a_check"))
            .and(body_string_contains("ts=1874"))
            .and(body_string_contains("wait=25"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ts": "1875", "updates": [[7, 5, 70]]
            })))
            .mount(&server)
            .await;

        let api = Arc::new(test_client(&server));
        let manager = SessionManager::new(api.clone());
        let session = manager.acquire_session().await.unwrap();
        assert!(manager.is_live(&session));
        assert_eq!(session.endpoint, format!("{}/lp", server.uri()));

        let response = api.poll(&session).await.unwrap();
        assert_eq!(response.ts, Cursor::new("1875"));
        assert_eq!(response.updates.len(), 1);
    }

    #[tokio::test]
    async fn poll_failed_marker_is_session_expired() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/lp"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"failed": 2})))
            .mount(&server)
            .await;

        let session = PollSession::new(format!("{}/lp", server.uri()), "k", Cursor::new("1"));
        let err = test_client(&server).poll(&session).await.unwrap_err();
        assert!(matches!(err, RelayError::SessionExpired { code: 2 }));
    }
}

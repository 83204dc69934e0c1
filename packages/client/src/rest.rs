//! REST companions to the realtime connection.
//!
//! History and inbox seeds come over plain HTTP; the traits keep use-sites
//! independent of reqwest and mockable in tests. No retry logic here: a
//! failed call surfaces as an error and the caller's state is left unchanged.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ClientError;
use crate::types::{ChatMessage, ChatRoom, Notification, NotificationId, RoomId, RoomType};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Full message history for a room, oldest first.
    async fn history(&self, room_id: RoomId) -> Result<Vec<ChatMessage>, ClientError>;

    /// Rooms visible to the session user.
    async fn rooms(&self) -> Result<Vec<ChatRoom>, ClientError>;

    /// Open a new room with an initial subject line.
    async fn create_room(
        &self,
        room_type: RoomType,
        subject: String,
    ) -> Result<ChatRoom, ClientError>;

    async fn close_room(&self, room_id: RoomId) -> Result<(), ClientError>;

    /// Rooms waiting for a staff assignee.
    async fn unassigned_rooms(&self) -> Result<Vec<ChatRoom>, ClientError>;

    /// Claim a waiting room for the session user (staff).
    async fn assign_room(&self, room_id: RoomId) -> Result<ChatRoom, ClientError>;

    /// Count of unread chat messages across all rooms.
    async fn unread_message_count(&self) -> Result<u64, ClientError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationApi: Send + Sync {
    async fn list(&self, unread_only: bool) -> Result<Vec<Notification>, ClientError>;

    async fn unread_count(&self) -> Result<u64, ClientError>;

    async fn mark_read(&self, id: NotificationId) -> Result<(), ClientError>;

    async fn mark_all_read(&self) -> Result<(), ClientError>;
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: u64,
}

/// reqwest-backed implementation of both API traits.
pub struct RestClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

impl RestClient {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.into(),
            token: token.into(),
        }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .get(format!("{}{path}", self.api_url))
            .bearer_auth(&self.token)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .post(format!("{}{path}", self.api_url))
            .bearer_auth(&self.token)
    }

    fn put(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .put(format!("{}{path}", self.api_url))
            .bearer_auth(&self.token)
    }
}

#[async_trait]
impl ChatApi for RestClient {
    async fn history(&self, room_id: RoomId) -> Result<Vec<ChatMessage>, ClientError> {
        let messages = self
            .get(&format!("/chat/rooms/{room_id}/messages"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(messages)
    }

    async fn rooms(&self) -> Result<Vec<ChatRoom>, ClientError> {
        let rooms = self
            .get("/chat/rooms")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(rooms)
    }

    async fn create_room(
        &self,
        room_type: RoomType,
        subject: String,
    ) -> Result<ChatRoom, ClientError> {
        let room = self
            .post("/chat/rooms")
            .json(&serde_json::json!({"roomType": room_type, "subject": subject}))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(room)
    }

    async fn close_room(&self, room_id: RoomId) -> Result<(), ClientError> {
        self.put(&format!("/chat/rooms/{room_id}/close"))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn unassigned_rooms(&self) -> Result<Vec<ChatRoom>, ClientError> {
        let rooms = self
            .get("/chat/rooms/unassigned")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(rooms)
    }

    async fn assign_room(&self, room_id: RoomId) -> Result<ChatRoom, ClientError> {
        let room = self
            .put(&format!("/chat/rooms/{room_id}/assign"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(room)
    }

    async fn unread_message_count(&self) -> Result<u64, ClientError> {
        let response: CountResponse = self
            .get("/chat/unread-count")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.count)
    }
}

#[async_trait]
impl NotificationApi for RestClient {
    async fn list(&self, unread_only: bool) -> Result<Vec<Notification>, ClientError> {
        let notifications = self
            .get("/notifications")
            .query(&[("unreadOnly", unread_only)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(notifications)
    }

    async fn unread_count(&self) -> Result<u64, ClientError> {
        let response: CountResponse = self
            .get("/notifications/unread-count")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.count)
    }

    async fn mark_read(&self, id: NotificationId) -> Result<(), ClientError> {
        self.put(&format!("/notifications/{id}/read"))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn mark_all_read(&self) -> Result<(), ClientError> {
        self.put("/notifications/read-all")
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

//! Domain types mirrored from the storefront backend.
//!
//! All ids are server-assigned. JSON field names follow the backend's
//! camelCase convention, enum values its SCREAMING_SNAKE_CASE convention.

use serde::{Deserialize, Serialize};

pub type RoomId = i64;
pub type UserId = i64;
pub type MessageId = i64;
pub type NotificationId = i64;

/// Kind of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Chat,
    System,
}

/// A chat message as delivered by the backend (via REST history or push).
///
/// Never mutated locally except for `is_read` flips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: MessageId,
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub sender_name: String,
    pub content: String,
    pub message_type: MessageType,
    /// Unix timestamp in milliseconds
    pub created_at: i64,
    pub is_read: bool,
}

/// A typing signal for one user in one room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingSignal {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub user_name: String,
    pub is_typing: bool,
}

/// Online/offline marker carried by presence broadcasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    Online,
    Offline,
}

/// A presence broadcast event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub user_id: UserId,
    pub status: UserStatus,
}

/// Notification categories emitted by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    OrderCreated,
    OrderStatusUpdated,
    PaymentSuccessful,
    PaymentFailed,
    NewMessage,
    Welcome,
}

/// Where a consumer should navigate after consuming a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationRoute {
    Orders,
    Home,
}

impl NotificationType {
    /// Navigation target for this notification category. Order and payment
    /// notifications lead to the order list; everything else falls back to
    /// the home screen.
    pub fn route(&self) -> NotificationRoute {
        match self {
            NotificationType::OrderCreated
            | NotificationType::OrderStatusUpdated
            | NotificationType::PaymentSuccessful
            | NotificationType::PaymentFailed => NotificationRoute::Orders,
            NotificationType::NewMessage | NotificationType::Welcome => NotificationRoute::Home,
        }
    }
}

/// A user notification, merged from REST reads and pushed events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    /// Unix timestamp in milliseconds
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomType {
    Support,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomStatus {
    Waiting,
    Active,
    Closed,
}

/// A chat room as mirrored from the backend. Lifecycle is owned by the
/// backend; the client only reads status via REST and pushed events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoom {
    pub id: RoomId,
    pub room_type: RoomType,
    pub status: RoomStatus,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub assigned_staff_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_and_payment_notifications_route_to_orders() {
        // given (precondition):
        let kinds = [
            NotificationType::OrderCreated,
            NotificationType::OrderStatusUpdated,
            NotificationType::PaymentSuccessful,
            NotificationType::PaymentFailed,
        ];

        // when (operation):
        // then (expected result):
        for kind in kinds {
            assert_eq!(kind.route(), NotificationRoute::Orders);
        }
    }

    #[test]
    fn test_other_notifications_route_home() {
        // given (precondition):
        let kinds = [NotificationType::NewMessage, NotificationType::Welcome];

        // when (operation):
        // then (expected result):
        for kind in kinds {
            assert_eq!(kind.route(), NotificationRoute::Home);
        }
    }

    #[test]
    fn test_chat_message_uses_backend_field_names() {
        // given (precondition):
        let raw = r#"{
            "id": 12,
            "roomId": 3,
            "senderId": 9,
            "senderName": "Mai",
            "content": "hello",
            "messageType": "CHAT",
            "createdAt": 1700000000000,
            "isRead": false
        }"#;

        // when (operation):
        let message: ChatMessage = serde_json::from_str(raw).unwrap();

        // then (expected result):
        assert_eq!(message.id, 12);
        assert_eq!(message.room_id, 3);
        assert_eq!(message.message_type, MessageType::Chat);
        assert!(!message.is_read);
    }

    #[test]
    fn test_notification_type_field_is_named_type() {
        // given (precondition):
        let raw = r#"{
            "id": 5,
            "type": "ORDER_CREATED",
            "title": "Order placed",
            "message": "Your order #42 was created",
            "isRead": false,
            "createdAt": 1700000000000
        }"#;

        // when (operation):
        let notification: Notification = serde_json::from_str(raw).unwrap();

        // then (expected result):
        assert_eq!(
            notification.notification_type,
            NotificationType::OrderCreated
        );
    }
}

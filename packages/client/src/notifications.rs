//! User notification inbox.
//!
//! The inbox is seeded over REST and kept live by pushed NOTIFICATION
//! events. Pushes are deduplicated by id so a re-delivery after a
//! reconnect-triggered re-subscription cannot inflate the list or the
//! unread count. Read-state mutations go to the backend first; local state
//! changes only after the call succeeds.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, broadcast};

use crate::error::ClientError;
use crate::rest::NotificationApi;
use crate::types::{Notification, NotificationId, NotificationRoute};

/// Side-effect hook invoked for each newly pushed notification (system
/// notification, terminal bell). Failures are the implementation's problem;
/// the inbox does not depend on the outcome.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification);
}

/// Default hook that does nothing.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _notification: &Notification) {}
}

/// Update emitted whenever the list or the unread count changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InboxChanged;

struct InboxState {
    notifications: Vec<Notification>,
    unread_count: u64,
}

pub struct NotificationInbox {
    api: Arc<dyn NotificationApi>,
    notifier: Arc<dyn Notifier>,
    state: Mutex<InboxState>,
    updates: broadcast::Sender<InboxChanged>,
}

impl NotificationInbox {
    pub fn new(api: Arc<dyn NotificationApi>, notifier: Arc<dyn Notifier>) -> Self {
        let (updates, _) = broadcast::channel(64);
        Self {
            api,
            notifier,
            state: Mutex::new(InboxState {
                notifications: Vec::new(),
                unread_count: 0,
            }),
            updates,
        }
    }

    pub fn updates(&self) -> broadcast::Receiver<InboxChanged> {
        self.updates.subscribe()
    }

    /// Seed the list from the backend, newest first. On failure the current
    /// list is kept as-is.
    pub async fn load_all(&self) -> Result<(), ClientError> {
        let notifications = self.api.list(false).await?;
        self.state.lock().await.notifications = notifications;
        let _ = self.updates.send(InboxChanged);
        Ok(())
    }

    /// Seed the unread counter from the backend.
    pub async fn load_unread_count(&self) -> Result<(), ClientError> {
        let count = self.api.unread_count().await?;
        self.state.lock().await.unread_count = count;
        let _ = self.updates.send(InboxChanged);
        Ok(())
    }

    /// Apply a pushed notification: prepend, bump the unread counter, fire
    /// the side-effect hook. A notification whose id is already present is
    /// ignored entirely.
    pub async fn on_pushed_notification(&self, notification: Notification) {
        {
            let mut state = self.state.lock().await;
            if state.notifications.iter().any(|n| n.id == notification.id) {
                tracing::debug!("duplicate notification {}, ignoring", notification.id);
                return;
            }
            state.notifications.insert(0, notification.clone());
            if !notification.is_read {
                state.unread_count += 1;
            }
        }
        self.notifier.notify(&notification).await;
        let _ = self.updates.send(InboxChanged);
    }

    /// Mark one notification read. Idempotent: a second call for the same id
    /// changes nothing, and the unread counter never goes below zero.
    pub async fn mark_as_read(&self, id: NotificationId) -> Result<(), ClientError> {
        {
            let state = self.state.lock().await;
            let already_read = state
                .notifications
                .iter()
                .any(|n| n.id == id && n.is_read);
            if already_read {
                return Ok(());
            }
        }
        self.api.mark_read(id).await?;
        {
            let mut state = self.state.lock().await;
            if let Some(notification) = state.notifications.iter_mut().find(|n| n.id == id) {
                notification.is_read = true;
                state.unread_count = state.unread_count.saturating_sub(1);
            }
        }
        let _ = self.updates.send(InboxChanged);
        Ok(())
    }

    pub async fn mark_all_read(&self) -> Result<(), ClientError> {
        self.api.mark_all_read().await?;
        {
            let mut state = self.state.lock().await;
            for notification in &mut state.notifications {
                notification.is_read = true;
            }
            state.unread_count = 0;
        }
        let _ = self.updates.send(InboxChanged);
        Ok(())
    }

    /// Consume a notification: mark it read, then return where the consumer
    /// should navigate. Unknown ids fall back to the home route.
    pub async fn consume(&self, id: NotificationId) -> Result<NotificationRoute, ClientError> {
        let route = {
            let state = self.state.lock().await;
            state
                .notifications
                .iter()
                .find(|n| n.id == id)
                .map(|n| n.notification_type.route())
        };
        match route {
            Some(route) => {
                self.mark_as_read(id).await?;
                Ok(route)
            }
            None => Ok(NotificationRoute::Home),
        }
    }

    /// Current list, newest first.
    pub async fn notifications(&self) -> Vec<Notification> {
        self.state.lock().await.notifications.clone()
    }

    pub async fn unread_count(&self) -> u64 {
        self.state.lock().await.unread_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::MockNotificationApi;
    use crate::types::NotificationType;

    fn notification(id: i64, kind: NotificationType, is_read: bool) -> Notification {
        Notification {
            id,
            notification_type: kind,
            title: format!("notification {id}"),
            message: "details".to_string(),
            is_read,
            created_at: 1_700_000_000_000 + id,
        }
    }

    fn inbox_with(api: MockNotificationApi) -> NotificationInbox {
        NotificationInbox::new(Arc::new(api), Arc::new(NoopNotifier))
    }

    #[tokio::test]
    async fn test_pushed_notification_is_prepended_and_counted() {
        // given (precondition):
        let inbox = inbox_with(MockNotificationApi::new());
        inbox
            .on_pushed_notification(notification(1, NotificationType::Welcome, false))
            .await;

        // when (operation): a newer notification arrives
        inbox
            .on_pushed_notification(notification(2, NotificationType::OrderCreated, false))
            .await;

        // then (expected result): newest first, both unread
        let list = inbox.notifications().await;
        assert_eq!(list[0].id, 2);
        assert_eq!(list[1].id, 1);
        assert_eq!(inbox.unread_count().await, 2);
    }

    #[tokio::test]
    async fn test_duplicate_push_is_ignored() {
        // given (precondition):
        let inbox = inbox_with(MockNotificationApi::new());
        inbox
            .on_pushed_notification(notification(1, NotificationType::Welcome, false))
            .await;

        // when (operation): the same id is delivered again
        inbox
            .on_pushed_notification(notification(1, NotificationType::Welcome, false))
            .await;

        // then (expected result): one entry, counter unchanged
        assert_eq!(inbox.notifications().await.len(), 1);
        assert_eq!(inbox.unread_count().await, 1);
    }

    #[tokio::test]
    async fn test_mark_as_read_is_idempotent_and_floors_at_zero() {
        // given (precondition):
        let mut api = MockNotificationApi::new();
        api.expect_mark_read().times(1).returning(|_| Ok(()));
        let inbox = inbox_with(api);
        inbox
            .on_pushed_notification(notification(1, NotificationType::Welcome, false))
            .await;

        // when (operation): marked read twice
        inbox.mark_as_read(1).await.unwrap();
        inbox.mark_as_read(1).await.unwrap();

        // then (expected result): one backend call, counter at zero
        assert_eq!(inbox.unread_count().await, 0);
        assert!(inbox.notifications().await[0].is_read);
    }

    #[tokio::test]
    async fn test_rest_failure_leaves_local_state_unchanged() {
        // given (precondition): the backend rejects the mark-read call
        let mut api = MockNotificationApi::new();
        api.expect_mark_read()
            .returning(|_| Err(ClientError::NotConnected));
        let inbox = inbox_with(api);
        inbox
            .on_pushed_notification(notification(1, NotificationType::Welcome, false))
            .await;

        // when (operation):
        let result = inbox.mark_as_read(1).await;

        // then (expected result): error surfaced, nothing flipped locally
        assert!(result.is_err());
        assert!(!inbox.notifications().await[0].is_read);
        assert_eq!(inbox.unread_count().await, 1);
    }

    #[tokio::test]
    async fn test_mark_all_read_clears_the_counter() {
        // given (precondition):
        let mut api = MockNotificationApi::new();
        api.expect_mark_all_read().times(1).returning(|| Ok(()));
        let inbox = inbox_with(api);
        inbox
            .on_pushed_notification(notification(1, NotificationType::Welcome, false))
            .await;
        inbox
            .on_pushed_notification(notification(2, NotificationType::PaymentFailed, false))
            .await;

        // when (operation):
        inbox.mark_all_read().await.unwrap();

        // then (expected result):
        assert_eq!(inbox.unread_count().await, 0);
        assert!(inbox.notifications().await.iter().all(|n| n.is_read));
    }

    #[tokio::test]
    async fn test_consume_marks_read_then_routes() {
        // given (precondition):
        let mut api = MockNotificationApi::new();
        api.expect_mark_read().times(1).returning(|_| Ok(()));
        let inbox = inbox_with(api);
        inbox
            .on_pushed_notification(notification(1, NotificationType::OrderCreated, false))
            .await;

        // when (operation):
        let route = inbox.consume(1).await.unwrap();

        // then (expected result): read first, then the orders route
        assert_eq!(route, NotificationRoute::Orders);
        assert!(inbox.notifications().await[0].is_read);
    }

    #[tokio::test]
    async fn test_consume_unknown_id_falls_back_to_home() {
        // given (precondition): an empty inbox, no backend call expected
        let inbox = inbox_with(MockNotificationApi::new());

        // when (operation):
        let route = inbox.consume(99).await.unwrap();

        // then (expected result):
        assert_eq!(route, NotificationRoute::Home);
    }

    #[tokio::test]
    async fn test_load_all_replaces_the_list() {
        // given (precondition):
        let mut api = MockNotificationApi::new();
        api.expect_list().returning(|_| {
            Ok(vec![
                notification(3, NotificationType::PaymentSuccessful, false),
                notification(2, NotificationType::Welcome, true),
            ])
        });
        let inbox = inbox_with(api);
        inbox
            .on_pushed_notification(notification(1, NotificationType::Welcome, false))
            .await;

        // when (operation):
        inbox.load_all().await.unwrap();

        // then (expected result):
        let list = inbox.notifications().await;
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, 3);
    }

    #[tokio::test]
    async fn test_load_all_failure_keeps_the_list() {
        // given (precondition):
        let mut api = MockNotificationApi::new();
        api.expect_list()
            .returning(|_| Err(ClientError::NotConnected));
        let inbox = inbox_with(api);
        inbox
            .on_pushed_notification(notification(1, NotificationType::Welcome, false))
            .await;

        // when (operation):
        let result = inbox.load_all().await;

        // then (expected result):
        assert!(result.is_err());
        assert_eq!(inbox.notifications().await.len(), 1);
    }

    #[tokio::test]
    async fn test_notifier_fires_once_per_new_notification() {
        // given (precondition):
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(1).return_const(());
        let inbox =
            NotificationInbox::new(Arc::new(MockNotificationApi::new()), Arc::new(notifier));

        // when (operation): a push and its duplicate
        inbox
            .on_pushed_notification(notification(1, NotificationType::Welcome, false))
            .await;
        inbox
            .on_pushed_notification(notification(1, NotificationType::Welcome, false))
            .await;

        // then (expected result): the mock's times(1) expectation holds
    }
}

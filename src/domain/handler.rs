use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::event::{CartCountChanged, OrderCountChanged, OrderFulfilled, OrderPlaced};
use crate::domain::event_bus::{EventHandler, HandlerError};
use crate::domain::port::{Broadcaster, Channel, Logger};

/// お知らせチャンネルのイベント名
pub const RECEIVE_ANNOUNCEMENT: &str = "ReceiveAnnouncement";
/// 受け渡し通知チャンネルのイベント名
pub const RECEIVE_ORDER_NOTIFICATION: &str = "ReceiveOrderNotification";
/// カート件数チャンネルのイベント名
pub const UPDATE_CART_COUNT: &str = "UpdateCartCount";
/// 注文数チャンネルのイベント名
pub const UPDATE_ORDER_COUNT: &str = "UpdateOrderCount";

/// 通知ハンドラー
/// コミット済みのドメインイベントを受信し、リアルタイム通知として配信する
#[derive(Clone)]
pub struct NotificationHandler {
    broadcaster: Arc<dyn Broadcaster>,
    logger: Arc<dyn Logger>,
}

impl NotificationHandler {
    /// 新しい通知ハンドラーを作成
    pub fn new(broadcaster: Arc<dyn Broadcaster>, logger: Arc<dyn Logger>) -> Self {
        Self {
            broadcaster,
            logger,
        }
    }

    /// チャンネルへ配信する
    /// 配信失敗は一時的なエラーとして返し、イベントバスにリトライさせる
    async fn deliver(
        &self,
        channel: Channel,
        event_name: &str,
        payload: serde_json::Value,
        correlation_id: Uuid,
    ) -> Result<(), HandlerError> {
        let mut context = HashMap::new();
        context.insert("channel".to_string(), channel.as_str().to_string());
        context.insert("event_name".to_string(), event_name.to_string());

        match self.broadcaster.broadcast(channel, event_name, payload).await {
            Ok(()) => {
                self.logger.debug(
                    "NotificationHandler",
                    "Notification broadcast",
                    Some(correlation_id),
                    Some(context),
                );
                Ok(())
            }
            Err(e) => {
                context.insert("error".to_string(), e.to_string());
                self.logger.warn(
                    "NotificationHandler",
                    "Notification broadcast failed",
                    Some(correlation_id),
                    Some(context),
                );
                Err(HandlerError::TransientError(e.to_string()))
            }
        }
    }
}

/// 注文作成のお知らせ文
pub fn order_placed_message(event: &OrderPlaced) -> String {
    format!(
        "Order for '{}' by {} has been placed! Order #{}",
        event.book_title, event.customer_name, event.order_number
    )
}

/// 受け渡し完了の通知文
pub fn order_fulfilled_message(event: &OrderFulfilled) -> String {
    format!(
        "Order for '{}' by {} has been successfully fulfilled!",
        event.book_title, event.customer_name
    )
}

#[async_trait]
impl EventHandler<OrderPlaced> for NotificationHandler {
    async fn handle(&self, event: OrderPlaced) -> Result<(), HandlerError> {
        let message = order_placed_message(&event);
        self.deliver(
            Channel::Announcements,
            RECEIVE_ANNOUNCEMENT,
            json!(message),
            event.metadata.correlation_id,
        )
        .await
    }
}

#[async_trait]
impl EventHandler<OrderFulfilled> for NotificationHandler {
    async fn handle(&self, event: OrderFulfilled) -> Result<(), HandlerError> {
        let message = order_fulfilled_message(&event);
        self.deliver(
            Channel::Fulfillment,
            RECEIVE_ORDER_NOTIFICATION,
            json!(message),
            event.metadata.correlation_id,
        )
        .await
    }
}

#[async_trait]
impl EventHandler<CartCountChanged> for NotificationHandler {
    async fn handle(&self, event: CartCountChanged) -> Result<(), HandlerError> {
        self.deliver(
            Channel::CartCount,
            UPDATE_CART_COUNT,
            json!({
                "user_id": event.user_id.to_string(),
                "count": event.distinct_books,
            }),
            event.metadata.correlation_id,
        )
        .await
    }
}

#[async_trait]
impl EventHandler<OrderCountChanged> for NotificationHandler {
    async fn handle(&self, event: OrderCountChanged) -> Result<(), HandlerError> {
        self.deliver(
            Channel::OrderCount,
            UPDATE_ORDER_COUNT,
            json!({
                "user_id": event.user_id.to_string(),
                "count": event.outstanding_orders,
            }),
            event.metadata.correlation_id,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{BookId, Money, OrderKey, UserId};
    use crate::domain::port::NotificationError;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingBroadcaster {
        sent: Mutex<Vec<(Channel, String, serde_json::Value)>>,
        fail: bool,
    }

    #[async_trait]
    impl Broadcaster for RecordingBroadcaster {
        async fn broadcast(
            &self,
            channel: Channel,
            event_name: &str,
            payload: serde_json::Value,
        ) -> Result<(), NotificationError> {
            if self.fail {
                return Err(NotificationError::BroadcastFailed("hub offline".to_string()));
            }
            self.sent
                .lock()
                .await
                .push((channel, event_name.to_string(), payload));
            Ok(())
        }
    }

    struct SilentLogger;

    impl Logger for SilentLogger {
        fn debug(&self, _: &str, _: &str, _: Option<Uuid>, _: Option<HashMap<String, String>>) {}
        fn info(&self, _: &str, _: &str, _: Option<Uuid>, _: Option<HashMap<String, String>>) {}
        fn warn(&self, _: &str, _: &str, _: Option<Uuid>, _: Option<HashMap<String, String>>) {}
        fn error(&self, _: &str, _: &str, _: Option<Uuid>, _: Option<HashMap<String, String>>) {}
    }

    fn placed_event() -> OrderPlaced {
        OrderPlaced::new(
            Uuid::new_v4(),
            OrderKey::new(UserId::new(), BookId::new(), Utc::now()),
            "Dune".to_string(),
            "Ada Lovelace".to_string(),
            1,
            Money::usd(Decimal::TEN),
            7,
        )
    }

    #[tokio::test]
    async fn test_order_placed_is_announced() {
        let broadcaster = Arc::new(RecordingBroadcaster::default());
        let handler = NotificationHandler::new(broadcaster.clone(), Arc::new(SilentLogger));

        handler.handle(placed_event()).await.unwrap();

        let sent = broadcaster.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, Channel::Announcements);
        assert_eq!(sent[0].1, RECEIVE_ANNOUNCEMENT);
        assert_eq!(
            sent[0].2,
            json!("Order for 'Dune' by Ada Lovelace has been placed! Order #7")
        );
    }

    #[tokio::test]
    async fn test_cart_count_payload() {
        let broadcaster = Arc::new(RecordingBroadcaster::default());
        let handler = NotificationHandler::new(broadcaster.clone(), Arc::new(SilentLogger));
        let user_id = UserId::new();

        handler
            .handle(CartCountChanged::new(Uuid::new_v4(), user_id, 3))
            .await
            .unwrap();

        let sent = broadcaster.sent.lock().await;
        assert_eq!(sent[0].1, UPDATE_CART_COUNT);
        assert_eq!(sent[0].2["count"], json!(3));
        assert_eq!(sent[0].2["user_id"], json!(user_id.to_string()));
    }

    #[tokio::test]
    async fn test_broadcast_failure_is_transient() {
        let broadcaster = Arc::new(RecordingBroadcaster {
            fail: true,
            ..Default::default()
        });
        let handler = NotificationHandler::new(broadcaster, Arc::new(SilentLogger));

        let result = handler.handle(placed_event()).await;
        assert!(matches!(result, Err(HandlerError::TransientError(_))));
    }
}

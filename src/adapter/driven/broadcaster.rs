use crate::domain::port::{Broadcaster, Channel, NotificationError};
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::broadcast;

/// 送信バッファの容量
const BROADCAST_CAPACITY: usize = 256;

/// 配信される通知
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub channel: &'static str,
    pub event_name: String,
    pub payload: serde_json::Value,
}

/// tokio の broadcast チャンネルによる通知ハブ
/// 接続中の購読者（WebSocket・SSE など）すべてに同じ通知を流す
#[derive(Debug, Clone)]
pub struct ChannelBroadcaster {
    tx: broadcast::Sender<Notification>,
}

impl ChannelBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { tx }
    }

    /// 以降に配信される通知を受け取る
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

impl Default for ChannelBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broadcaster for ChannelBroadcaster {
    async fn broadcast(
        &self,
        channel: Channel,
        event_name: &str,
        payload: serde_json::Value,
    ) -> Result<(), NotificationError> {
        let notification = Notification {
            channel: channel.as_str(),
            event_name: event_name.to_string(),
            payload,
        };
        // 購読者が居ない場合の送信エラーは配信対象が無いだけなので無視する
        let _ = self.tx.send(notification);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_subscribers_receive_notifications() {
        let broadcaster = ChannelBroadcaster::new();
        let mut rx = broadcaster.subscribe();

        broadcaster
            .broadcast(Channel::CartCount, "UpdateCartCount", json!({ "count": 2 }))
            .await
            .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.channel, "cart-count");
        assert_eq!(received.event_name, "UpdateCartCount");
        assert_eq!(received.payload["count"], 2);
    }

    #[tokio::test]
    async fn test_broadcast_without_subscribers_succeeds() {
        let broadcaster = ChannelBroadcaster::new();
        assert!(broadcaster
            .broadcast(Channel::Announcements, "ReceiveAnnouncement", json!({}))
            .await
            .is_ok());
    }
}

use crate::domain::event::{
    CartCountChanged, DomainEvent, OrderCancelled, OrderCountChanged, OrderDeleted,
    OrderFulfilled, OrderPlaced,
};
use async_trait::async_trait;
use std::marker::PhantomData;

/// イベントハンドラーエラー
#[derive(Debug, Clone, thiserror::Error)]
pub enum HandlerError {
    #[error("Handler processing failed: {0}")]
    ProcessingFailed(String),
    #[error("Transient error (retryable): {0}")]
    TransientError(String),
    #[error("Permanent error (not retryable): {0}")]
    PermanentError(String),
}

/// イベントハンドラートレイト
/// 特定のイベントタイプを処理するハンドラーを定義
#[async_trait]
pub trait EventHandler<E>: Send + Sync {
    async fn handle(&self, event: E) -> Result<(), HandlerError>;
}

/// 型消去されたイベントハンドラー
/// 異なるイベントタイプのハンドラーを統一的に扱うため
#[async_trait]
pub trait DynEventHandler: Send + Sync {
    async fn handle_event(&self, event: &DomainEvent) -> Result<(), HandlerError>;
    fn can_handle(&self, event: &DomainEvent) -> bool;
    fn handler_name(&self) -> &str;
}

/// `DomainEvent` の各バリアントに対応するイベント型
pub trait EventPayload: Clone + Send + Sync + 'static {
    /// イベント種別名
    const EVENT_TYPE: &'static str;

    /// 列挙型から自身の型のイベントを取り出す
    fn extract(event: &DomainEvent) -> Option<&Self>;
}

impl EventPayload for OrderPlaced {
    const EVENT_TYPE: &'static str = "OrderPlaced";

    fn extract(event: &DomainEvent) -> Option<&Self> {
        match event {
            DomainEvent::OrderPlaced(e) => Some(e),
            _ => None,
        }
    }
}

impl EventPayload for OrderCancelled {
    const EVENT_TYPE: &'static str = "OrderCancelled";

    fn extract(event: &DomainEvent) -> Option<&Self> {
        match event {
            DomainEvent::OrderCancelled(e) => Some(e),
            _ => None,
        }
    }
}

impl EventPayload for OrderFulfilled {
    const EVENT_TYPE: &'static str = "OrderFulfilled";

    fn extract(event: &DomainEvent) -> Option<&Self> {
        match event {
            DomainEvent::OrderFulfilled(e) => Some(e),
            _ => None,
        }
    }
}

impl EventPayload for OrderDeleted {
    const EVENT_TYPE: &'static str = "OrderDeleted";

    fn extract(event: &DomainEvent) -> Option<&Self> {
        match event {
            DomainEvent::OrderDeleted(e) => Some(e),
            _ => None,
        }
    }
}

impl EventPayload for CartCountChanged {
    const EVENT_TYPE: &'static str = "CartCountChanged";

    fn extract(event: &DomainEvent) -> Option<&Self> {
        match event {
            DomainEvent::CartCountChanged(e) => Some(e),
            _ => None,
        }
    }
}

impl EventPayload for OrderCountChanged {
    const EVENT_TYPE: &'static str = "OrderCountChanged";

    fn extract(event: &DomainEvent) -> Option<&Self> {
        match event {
            DomainEvent::OrderCountChanged(e) => Some(e),
            _ => None,
        }
    }
}

/// 型付きハンドラーを `DynEventHandler` として扱うためのラッパー
pub struct HandlerWrapper<E, H>
where
    E: EventPayload,
    H: EventHandler<E>,
{
    handler: H,
    name: String,
    _event: PhantomData<fn(E)>,
}

impl<E, H> HandlerWrapper<E, H>
where
    E: EventPayload,
    H: EventHandler<E>,
{
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            name: format!("{}Handler", E::EVENT_TYPE),
            _event: PhantomData,
        }
    }

    pub fn with_name(handler: H, name: String) -> Self {
        Self {
            handler,
            name,
            _event: PhantomData,
        }
    }
}

#[async_trait]
impl<E, H> DynEventHandler for HandlerWrapper<E, H>
where
    E: EventPayload,
    H: EventHandler<E>,
{
    async fn handle_event(&self, event: &DomainEvent) -> Result<(), HandlerError> {
        match E::extract(event) {
            Some(e) => self.handler.handle(e.clone()).await,
            None => Err(HandlerError::PermanentError(format!(
                "Event type mismatch: expected {}, got {}",
                E::EVENT_TYPE,
                event.event_type()
            ))),
        }
    }

    fn can_handle(&self, event: &DomainEvent) -> bool {
        E::extract(event).is_some()
    }

    fn handler_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::UserId;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use uuid::Uuid;

    struct CountingHandler {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler<CartCountChanged> for CountingHandler {
        async fn handle(&self, _event: CartCountChanged) -> Result<(), HandlerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_wrapper_dispatches_matching_event_only() {
        let calls = Arc::new(AtomicUsize::new(0));
        let wrapper = HandlerWrapper::new(CountingHandler {
            calls: calls.clone(),
        });
        let cart_event =
            DomainEvent::CartCountChanged(CartCountChanged::new(Uuid::new_v4(), UserId::new(), 2));
        let order_event =
            DomainEvent::OrderCountChanged(OrderCountChanged::new(Uuid::new_v4(), UserId::new(), 1));

        assert_eq!(wrapper.handler_name(), "CartCountChangedHandler");
        assert!(wrapper.can_handle(&cart_event));
        assert!(!wrapper.can_handle(&order_event));

        wrapper.handle_event(&cart_event).await.unwrap();
        assert!(matches!(
            wrapper.handle_event(&order_event).await,
            Err(HandlerError::PermanentError(_))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

use crate::domain::event::DomainEvent;
use crate::domain::event_bus::{
    DynEventHandler, EventHandler, EventPayload, HandlerError, HandlerWrapper,
};
use crate::domain::port::{EventBus, EventBusError, Logger};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{Mutex, RwLock};

/// 失敗したイベント処理の情報
#[derive(Debug, Clone)]
pub struct FailedEventProcessing {
    pub event: DomainEvent,
    pub handler_name: String,
    pub error: String,
    pub attempt_count: u32,
    pub failed_at: SystemTime,
    pub is_retryable: bool,
}

/// デッドレターキューエントリ
#[derive(Debug, Clone)]
pub struct DeadLetterEntry {
    pub failed_processing: FailedEventProcessing,
    pub added_at: SystemTime,
}

/// イベントバス設定
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// 最大試行回数（初回を含む）
    pub max_retry_attempts: u32,
    /// リトライ間隔
    pub retry_delay: Duration,
    /// デッドレターキューの最大サイズ
    pub dead_letter_queue_max_size: usize,
    /// ハンドラータイムアウト
    pub handler_timeout: Duration,
    /// ハンドラーを別タスクで実行し、発行元を待たせない
    /// `false` の場合は `publish` の中で配信を終える（テスト用）
    pub background_dispatch: bool,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            max_retry_attempts: 3,
            retry_delay: Duration::from_millis(1000),
            dead_letter_queue_max_size: 1000,
            handler_timeout: Duration::from_secs(30),
            background_dispatch: true,
        }
    }
}

/// インメモリイベントバス実装
/// 登録順にハンドラーを呼び出し、失敗したものはリトライのうえデッドレターキューに積む。
/// ハンドラーの失敗は発行元には伝えず、既定では配信自体も発行元のリクエストとは別タスクで行う
pub struct InMemoryEventBus {
    handlers: Arc<RwLock<Vec<Arc<dyn DynEventHandler>>>>,
    dead_letter_queue: Arc<Mutex<VecDeque<DeadLetterEntry>>>,
    config: EventBusConfig,
    logger: Arc<dyn Logger>,
}

impl InMemoryEventBus {
    /// 設定を指定してインメモリイベントバスを作成
    ///
    /// # 例
    /// ```
    /// use bookstore_order_lifecycle::adapter::driven::{EventBusConfig, InMemoryEventBus, TracingLogger};
    /// use std::sync::Arc;
    ///
    /// let config = EventBusConfig {
    ///     max_retry_attempts: 5,
    ///     retry_delay: std::time::Duration::from_millis(100),
    ///     ..EventBusConfig::default()
    /// };
    /// let event_bus = InMemoryEventBus::new(config, Arc::new(TracingLogger::new()));
    /// ```
    pub fn new(config: EventBusConfig, logger: Arc<dyn Logger>) -> Self {
        Self {
            handlers: Arc::new(RwLock::new(Vec::new())),
            dead_letter_queue: Arc::new(Mutex::new(VecDeque::new())),
            config,
            logger,
        }
    }

    /// 型付きハンドラーを登録
    pub async fn subscribe<E, H>(&self, handler: H) -> Result<(), EventBusError>
    where
        E: EventPayload,
        H: EventHandler<E> + 'static,
    {
        let mut handlers = self.handlers.write().await;
        handlers.push(Arc::new(HandlerWrapper::<E, H>::new(handler)));
        Ok(())
    }

    /// デッドレターキューの内容（古い順）
    pub async fn dead_letters(&self) -> Vec<DeadLetterEntry> {
        self.dead_letter_queue.lock().await.iter().cloned().collect()
    }

    /// ハンドラーの実行（エラー処理とリトライ機能付き）
    async fn execute_handler_with_retry(
        &self,
        handler: &dyn DynEventHandler,
        event: &DomainEvent,
    ) -> Result<(), (HandlerError, u32)> {
        let mut attempts = 0;
        let mut last_error = None;

        while attempts < self.config.max_retry_attempts.max(1) {
            attempts += 1;

            let result =
                tokio::time::timeout(self.config.handler_timeout, handler.handle_event(event))
                    .await;

            match result {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(handler_error)) => {
                    let permanent = matches!(handler_error, HandlerError::PermanentError(_));
                    last_error = Some(handler_error);
                    if permanent {
                        break;
                    }
                }
                Err(_elapsed) => {
                    last_error = Some(HandlerError::TransientError("Handler timeout".to_string()));
                }
            }

            if attempts < self.config.max_retry_attempts {
                tokio::time::sleep(self.config.retry_delay).await;
            }
        }

        let error =
            last_error.unwrap_or_else(|| HandlerError::ProcessingFailed("Unknown error".to_string()));
        Err((error, attempts))
    }

    /// 失敗したイベントをデッドレターキューに追加
    async fn add_to_dead_letter_queue(
        &self,
        event: &DomainEvent,
        handler_name: &str,
        error: &HandlerError,
        attempt_count: u32,
    ) {
        let mut dlq = self.dead_letter_queue.lock().await;

        // 上限に達したら古いエントリから捨てる
        if dlq.len() >= self.config.dead_letter_queue_max_size {
            dlq.pop_front();
        }

        let now = SystemTime::now();
        dlq.push_back(DeadLetterEntry {
            failed_processing: FailedEventProcessing {
                event: event.clone(),
                handler_name: handler_name.to_string(),
                error: error.to_string(),
                attempt_count,
                failed_at: now,
                is_retryable: matches!(error, HandlerError::TransientError(_)),
            },
            added_at: now,
        });
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, event: DomainEvent) -> Result<(), EventBusError> {
        let correlation_id = event.metadata().correlation_id;
        let mut context = HashMap::new();
        context.insert("event_type".to_string(), event.event_type().to_string());
        context.insert("event_id".to_string(), event.metadata().event_id.to_string());
        self.logger.debug(
            "EventBus",
            "Publishing event",
            Some(correlation_id),
            Some(context),
        );

        let handlers: Vec<Arc<dyn DynEventHandler>> = self
            .handlers
            .read()
            .await
            .iter()
            .filter(|h| h.can_handle(&event))
            .cloned()
            .collect();

        if self.config.background_dispatch {
            let bus = self.clone();
            tokio::spawn(async move { bus.dispatch(event, handlers).await });
        } else {
            self.dispatch(event, handlers).await;
        }

        Ok(())
    }
}

impl InMemoryEventBus {
    /// 対象のハンドラーへ順に配信する
    async fn dispatch(&self, event: DomainEvent, handlers: Vec<Arc<dyn DynEventHandler>>) {
        let correlation_id = event.metadata().correlation_id;
        for handler in handlers {
            if let Err((error, attempts)) =
                self.execute_handler_with_retry(handler.as_ref(), &event).await
            {
                let mut context = HashMap::new();
                context.insert("handler".to_string(), handler.handler_name().to_string());
                context.insert("event_type".to_string(), event.event_type().to_string());
                context.insert("attempts".to_string(), attempts.to_string());
                context.insert("error".to_string(), error.to_string());
                self.logger.error(
                    "EventBus",
                    "Event handler failed; moved to dead letter queue",
                    Some(correlation_id),
                    Some(context),
                );
                self.add_to_dead_letter_queue(&event, handler.handler_name(), &error, attempts)
                    .await;
            }
        }
    }
}

impl Clone for InMemoryEventBus {
    fn clone(&self) -> Self {
        Self {
            handlers: self.handlers.clone(),
            dead_letter_queue: self.dead_letter_queue.clone(),
            config: self.config.clone(),
            logger: self.logger.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::driven::TracingLogger;
    use crate::domain::event::{CartCountChanged, OrderCountChanged};
    use crate::domain::model::UserId;
    use std::sync::atomic::{AtomicU32, Ordering};
    use uuid::Uuid;

    struct FlakyHandler {
        calls: Arc<AtomicU32>,
        fail_times: u32,
        permanent: bool,
    }

    #[async_trait]
    impl EventHandler<CartCountChanged> for FlakyHandler {
        async fn handle(&self, _event: CartCountChanged) -> Result<(), HandlerError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.fail_times {
                if self.permanent {
                    return Err(HandlerError::PermanentError("bad payload".to_string()));
                }
                return Err(HandlerError::TransientError("hub offline".to_string()));
            }
            Ok(())
        }
    }

    fn fast_bus() -> InMemoryEventBus {
        InMemoryEventBus::new(
            EventBusConfig {
                max_retry_attempts: 3,
                retry_delay: Duration::from_millis(1),
                dead_letter_queue_max_size: 2,
                handler_timeout: Duration::from_secs(1),
                background_dispatch: false,
            },
            Arc::new(TracingLogger::new()),
        )
    }

    fn cart_event() -> DomainEvent {
        DomainEvent::CartCountChanged(CartCountChanged::new(Uuid::new_v4(), UserId::new(), 3))
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let bus = fast_bus();
        let calls = Arc::new(AtomicU32::new(0));
        bus.subscribe::<CartCountChanged, _>(FlakyHandler {
            calls: calls.clone(),
            fail_times: 2,
            permanent: false,
        })
        .await
        .unwrap();

        bus.publish(cart_event()).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(bus.dead_letters().await.is_empty());
    }

    #[tokio::test]
    async fn test_permanent_failure_goes_to_dead_letter_queue_without_retry() {
        let bus = fast_bus();
        let calls = Arc::new(AtomicU32::new(0));
        bus.subscribe::<CartCountChanged, _>(FlakyHandler {
            calls: calls.clone(),
            fail_times: u32::MAX,
            permanent: true,
        })
        .await
        .unwrap();

        assert!(bus.publish(cart_event()).await.is_ok());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let letters = bus.dead_letters().await;
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].failed_processing.handler_name, "CartCountChangedHandler");
        assert!(!letters[0].failed_processing.is_retryable);
    }

    #[tokio::test]
    async fn test_dead_letter_queue_drops_oldest_entries() {
        let bus = fast_bus();
        bus.subscribe::<CartCountChanged, _>(FlakyHandler {
            calls: Arc::new(AtomicU32::new(0)),
            fail_times: u32::MAX,
            permanent: true,
        })
        .await
        .unwrap();

        for _ in 0..3 {
            bus.publish(cart_event()).await.unwrap();
        }

        assert_eq!(bus.dead_letters().await.len(), 2);
    }

    #[tokio::test]
    async fn test_unrelated_events_are_not_dispatched() {
        let bus = fast_bus();
        let calls = Arc::new(AtomicU32::new(0));
        bus.subscribe::<CartCountChanged, _>(FlakyHandler {
            calls: calls.clone(),
            fail_times: 0,
            permanent: false,
        })
        .await
        .unwrap();

        bus.publish(DomainEvent::OrderCountChanged(OrderCountChanged::new(
            Uuid::new_v4(),
            UserId::new(),
            1,
        )))
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    struct SlowHandler {
        finished: Arc<tokio::sync::Notify>,
    }

    #[async_trait]
    impl EventHandler<CartCountChanged> for SlowHandler {
        async fn handle(&self, _event: CartCountChanged) -> Result<(), HandlerError> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.finished.notify_one();
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_background_dispatch_does_not_wait_for_handlers() {
        let bus = InMemoryEventBus::new(EventBusConfig::default(), Arc::new(TracingLogger::new()));
        let finished = Arc::new(tokio::sync::Notify::new());
        bus.subscribe::<CartCountChanged, _>(SlowHandler {
            finished: finished.clone(),
        })
        .await
        .unwrap();

        let started = std::time::Instant::now();
        bus.publish(cart_event()).await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(50));

        tokio::time::timeout(Duration::from_secs(5), finished.notified())
            .await
            .unwrap();
    }
}

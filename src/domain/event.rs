use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::model::{Money, OrderKey, UserId};

/// イベントのメタデータ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// イベントID
    pub event_id: Uuid,
    /// 同じユースケース呼び出しで発生したイベントを関連付けるID
    pub correlation_id: Uuid,
    /// イベント発生日時
    pub occurred_at: DateTime<Utc>,
}

impl EventMetadata {
    pub fn new(correlation_id: Uuid) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            correlation_id,
            occurred_at: Utc::now(),
        }
    }
}

/// ドメインイベント列挙型
/// 状態変更がコミットされた後に発行され、通知コンポーネントが購読する
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    /// 注文が作成された
    OrderPlaced(OrderPlaced),
    /// 注文がキャンセルされた
    OrderCancelled(OrderCancelled),
    /// 注文が店頭で受け渡された
    OrderFulfilled(OrderFulfilled),
    /// 注文が削除された
    OrderDeleted(OrderDeleted),
    /// カートの書籍種類数が変わった
    CartCountChanged(CartCountChanged),
    /// 受け取り待ち注文数が変わった
    OrderCountChanged(OrderCountChanged),
}

impl DomainEvent {
    /// イベント種別名
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::OrderPlaced(_) => "OrderPlaced",
            DomainEvent::OrderCancelled(_) => "OrderCancelled",
            DomainEvent::OrderFulfilled(_) => "OrderFulfilled",
            DomainEvent::OrderDeleted(_) => "OrderDeleted",
            DomainEvent::CartCountChanged(_) => "CartCountChanged",
            DomainEvent::OrderCountChanged(_) => "OrderCountChanged",
        }
    }

    /// メタデータを取得
    pub fn metadata(&self) -> &EventMetadata {
        match self {
            DomainEvent::OrderPlaced(e) => &e.metadata,
            DomainEvent::OrderCancelled(e) => &e.metadata,
            DomainEvent::OrderFulfilled(e) => &e.metadata,
            DomainEvent::OrderDeleted(e) => &e.metadata,
            DomainEvent::CartCountChanged(e) => &e.metadata,
            DomainEvent::OrderCountChanged(e) => &e.metadata,
        }
    }
}

/// 注文作成イベント
#[derive(Debug, Clone, PartialEq)]
pub struct OrderPlaced {
    pub metadata: EventMetadata,
    pub order_key: OrderKey,
    pub book_title: String,
    pub customer_name: String,
    pub quantity: u32,
    pub total_price: Money,
    /// 全注文の通し番号（お知らせに表示する）
    pub order_number: u64,
}

impl OrderPlaced {
    pub fn new(
        correlation_id: Uuid,
        order_key: OrderKey,
        book_title: String,
        customer_name: String,
        quantity: u32,
        total_price: Money,
        order_number: u64,
    ) -> Self {
        Self {
            metadata: EventMetadata::new(correlation_id),
            order_key,
            book_title,
            customer_name,
            quantity,
            total_price,
            order_number,
        }
    }
}

/// 注文キャンセルイベント
#[derive(Debug, Clone, PartialEq)]
pub struct OrderCancelled {
    pub metadata: EventMetadata,
    pub order_key: OrderKey,
    /// 在庫に戻された数量
    pub quantity: u32,
}

impl OrderCancelled {
    pub fn new(correlation_id: Uuid, order_key: OrderKey, quantity: u32) -> Self {
        Self {
            metadata: EventMetadata::new(correlation_id),
            order_key,
            quantity,
        }
    }
}

/// 注文受け渡しイベント
#[derive(Debug, Clone, PartialEq)]
pub struct OrderFulfilled {
    pub metadata: EventMetadata,
    pub order_key: OrderKey,
    pub book_title: String,
    pub customer_name: String,
}

impl OrderFulfilled {
    pub fn new(
        correlation_id: Uuid,
        order_key: OrderKey,
        book_title: String,
        customer_name: String,
    ) -> Self {
        Self {
            metadata: EventMetadata::new(correlation_id),
            order_key,
            book_title,
            customer_name,
        }
    }
}

/// 注文削除イベント
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDeleted {
    pub metadata: EventMetadata,
    pub order_key: OrderKey,
}

impl OrderDeleted {
    pub fn new(correlation_id: Uuid, order_key: OrderKey) -> Self {
        Self {
            metadata: EventMetadata::new(correlation_id),
            order_key,
        }
    }
}

/// カート件数変更イベント
#[derive(Debug, Clone, PartialEq)]
pub struct CartCountChanged {
    pub metadata: EventMetadata,
    pub user_id: UserId,
    pub distinct_books: usize,
}

impl CartCountChanged {
    pub fn new(correlation_id: Uuid, user_id: UserId, distinct_books: usize) -> Self {
        Self {
            metadata: EventMetadata::new(correlation_id),
            user_id,
            distinct_books,
        }
    }
}

/// 受け取り待ち注文数変更イベント
#[derive(Debug, Clone, PartialEq)]
pub struct OrderCountChanged {
    pub metadata: EventMetadata,
    pub user_id: UserId,
    pub outstanding_orders: u64,
}

impl OrderCountChanged {
    pub fn new(correlation_id: Uuid, user_id: UserId, outstanding_orders: u64) -> Self {
        Self {
            metadata: EventMetadata::new(correlation_id),
            user_id,
            outstanding_orders,
        }
    }
}

// アプリケーションサービス
// ユースケースごとのサービスと、それらが共有する依存関係・補助処理

mod announcement_service;
mod cart_service;
mod catalog_service;
mod checkout_service;
mod fulfillment_service;
mod order_service;
mod review_service;
mod wishlist_service;

pub use announcement_service::{AnnouncementApplicationService, AnnouncementDraft};
pub use cart_service::{CartApplicationService, CartMutation, CartView, StockShortage};
pub use catalog_service::{
    Availability, CatalogApplicationService, CatalogEntry, CatalogPage, CatalogQuery, CatalogSort,
    DiscountSettings, NewBook, DEFAULT_PAGE_SIZE,
};
pub use checkout_service::{
    CheckoutApplicationService, CheckoutPreview, CheckoutReceipt, EMAIL_FAILURE_WARNING,
};
pub use fulfillment_service::{FulfillmentApplicationService, FulfillmentPreview};
pub use order_service::{BulkOutcome, CancelOutcome, OrderApplicationService, SkippedEntry};
pub use review_service::{BookReviews, ReviewApplicationService};
pub use wishlist_service::WishlistApplicationService;

use crate::application::ApplicationError;
use crate::domain::event::DomainEvent;
use crate::domain::model::{Book, BookId, Cart, UserId};
use crate::domain::port::{
    AnnouncementRepository, BookCatalog, CartRepository, Clock, DiscountRepository, EmailSender,
    EventBus, Logger, OrderRepository, ReviewRepository, StockLedger, WishlistRepository,
};
use crate::domain::pricing::{self, PricingPolicy, Quote};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// ユースケースが共有する依存関係
/// アダプター層で組み立て、各サービスに渡す
#[derive(Clone)]
pub struct ServiceDependencies {
    pub catalog: Arc<dyn BookCatalog>,
    pub discounts: Arc<dyn DiscountRepository>,
    pub carts: Arc<dyn CartRepository>,
    pub wishlists: Arc<dyn WishlistRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub ledger: Arc<dyn StockLedger>,
    pub announcements: Arc<dyn AnnouncementRepository>,
    pub reviews: Arc<dyn ReviewRepository>,
    pub event_bus: Arc<dyn EventBus>,
    pub email_sender: Arc<dyn EmailSender>,
    pub clock: Arc<dyn Clock>,
    pub logger: Arc<dyn Logger>,
    pub pricing_policy: PricingPolicy,
}

impl ServiceDependencies {
    /// コミット済みのイベントを発行する
    /// 発行の失敗は警告として記録し、呼び出し元の結果には影響させない
    pub(crate) async fn publish(&self, event: DomainEvent) {
        let event_type = event.event_type();
        let correlation_id = event.metadata().correlation_id;
        if let Err(e) = self.event_bus.publish(event).await {
            let mut context = HashMap::new();
            context.insert("event_type".to_string(), event_type.to_string());
            context.insert("error".to_string(), e.to_string());
            self.logger.warn(
                "EventPublisher",
                "Failed to publish domain event",
                Some(correlation_id),
                Some(context),
            );
        }
    }

    /// カートの各行に最新の書籍情報（在庫数）を結び付ける
    /// カタログから削除された書籍の行は除外する
    pub(crate) async fn load_cart_items(
        &self,
        cart: &Cart,
    ) -> Result<Vec<(Book, u32)>, ApplicationError> {
        let book_ids: Vec<BookId> = cart.entries().iter().map(|entry| entry.book_id()).collect();
        let books = self.catalog.find_by_ids(&book_ids).await?;
        let items = cart
            .entries()
            .iter()
            .filter_map(|entry| {
                books
                    .iter()
                    .find(|book| book.id() == entry.book_id())
                    .map(|book| (book.clone(), entry.quantity()))
            })
            .collect();
        Ok(items)
    }

    /// 指定時刻の割引期間と受け取り待ち注文数でカート全体の見積もりを計算する
    pub(crate) async fn quote_items(
        &self,
        user_id: UserId,
        items: &[(Book, u32)],
        now: DateTime<Utc>,
    ) -> Result<Quote, ApplicationError> {
        let book_ids: Vec<BookId> = items.iter().map(|(book, _)| book.id()).collect();
        let discounts = self.discounts.find_for_books(&book_ids).await?;
        let outstanding = self.orders.count_outstanding(user_id).await?;
        Ok(pricing::quote(
            &self.pricing_policy,
            items,
            &discounts,
            outstanding,
            now,
        ))
    }

    /// ユースケース開始のログを出力し、相関IDを払い出す
    pub(crate) fn begin(&self, component: &str, message: &str, user_id: UserId) -> Uuid {
        let correlation_id = Uuid::new_v4();
        let mut context = HashMap::new();
        context.insert("user_id".to_string(), user_id.to_string());
        self.logger
            .info(component, message, Some(correlation_id), Some(context));
        correlation_id
    }
}

/// 全アプリケーションサービスの束
/// ドライバーアダプター（REST API）の共有状態として使う
#[derive(Clone)]
pub struct ApplicationServices {
    pub cart: Arc<CartApplicationService>,
    pub checkout: Arc<CheckoutApplicationService>,
    pub orders: Arc<OrderApplicationService>,
    pub fulfillment: Arc<FulfillmentApplicationService>,
    pub catalog: Arc<CatalogApplicationService>,
    pub wishlist: Arc<WishlistApplicationService>,
    pub announcements: Arc<AnnouncementApplicationService>,
    pub reviews: Arc<ReviewApplicationService>,
}

impl ApplicationServices {
    pub fn new(dependencies: ServiceDependencies) -> Self {
        Self {
            cart: Arc::new(CartApplicationService::new(dependencies.clone())),
            checkout: Arc::new(CheckoutApplicationService::new(dependencies.clone())),
            orders: Arc::new(OrderApplicationService::new(dependencies.clone())),
            fulfillment: Arc::new(FulfillmentApplicationService::new(dependencies.clone())),
            catalog: Arc::new(CatalogApplicationService::new(dependencies.clone())),
            wishlist: Arc::new(WishlistApplicationService::new(dependencies.clone())),
            announcements: Arc::new(AnnouncementApplicationService::new(dependencies.clone())),
            reviews: Arc::new(ReviewApplicationService::new(dependencies)),
        }
    }
}

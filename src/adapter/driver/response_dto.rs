use crate::application::service::{
    BookReviews, BulkOutcome, CancelOutcome, CartMutation, CartView, CatalogEntry, CatalogPage,
    CheckoutPreview, CheckoutReceipt, FulfillmentPreview, StockShortage,
};
use crate::domain::model::{
    Book, DiscountPeriod, Money, Order, Review, ReviewThread, TimedAnnouncement,
};
use crate::domain::pricing::{ItemPrice, Quote, QuoteLine};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// 表示用の金額（セント単位に丸める）
fn amount(money: Money) -> Decimal {
    money.rounded().amount()
}

/// 書籍用のレスポンスDTO
#[derive(Debug, Serialize)]
pub struct BookResponse {
    pub book_id: String,
    pub title: String,
    pub author: String,
    pub price: Decimal,
    pub currency: String,
    pub quantity_on_hand: u32,
    pub available: bool,
}

impl BookResponse {
    pub fn from_book(book: &Book) -> Self {
        Self {
            book_id: book.id().to_string(),
            title: book.title().to_string(),
            author: book.author().to_string(),
            price: amount(book.price()),
            currency: book.price().currency(),
            quantity_on_hand: book.quantity_on_hand(),
            available: book.is_available(),
        }
    }
}

/// 販売価格用のレスポンスDTO
#[derive(Debug, Serialize)]
pub struct PriceResponse {
    pub unit_price: Decimal,
    pub discounted_unit_price: Decimal,
    /// 有効な期間割引の割引率（%）
    pub discount_percent: Option<Decimal>,
    pub on_sale: bool,
}

impl PriceResponse {
    pub fn from_price(price: &ItemPrice) -> Self {
        Self {
            unit_price: amount(price.unit_price),
            discounted_unit_price: amount(price.discounted_unit_price),
            discount_percent: price.active_rate.map(|rate| rate.as_percent()),
            on_sale: price.on_sale,
        }
    }
}

/// カタログの1件
#[derive(Debug, Serialize)]
pub struct CatalogEntryResponse {
    pub book: BookResponse,
    pub price: PriceResponse,
}

impl CatalogEntryResponse {
    pub fn from_entry(entry: &CatalogEntry) -> Self {
        Self {
            book: BookResponse::from_book(&entry.book),
            price: PriceResponse::from_price(&entry.price),
        }
    }
}

/// カタログ検索結果
#[derive(Debug, Serialize)]
pub struct CatalogPageResponse {
    pub entries: Vec<CatalogEntryResponse>,
    pub total: usize,
    pub page: u32,
    pub total_pages: u32,
}

impl CatalogPageResponse {
    pub fn from_page(page: &CatalogPage) -> Self {
        Self {
            entries: page.entries.iter().map(CatalogEntryResponse::from_entry).collect(),
            total: page.total,
            page: page.page,
            total_pages: page.total_pages,
        }
    }
}

/// 在庫数
#[derive(Debug, Serialize)]
pub struct StockResponse {
    pub book_id: String,
    pub quantity_on_hand: u32,
}

/// 期間割引用のレスポンスDTO
#[derive(Debug, Serialize)]
pub struct DiscountResponse {
    pub book_id: String,
    pub percent: Decimal,
    pub starts_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub on_sale: bool,
}

impl DiscountResponse {
    pub fn from_period(period: &DiscountPeriod) -> Self {
        Self {
            book_id: period.book_id().to_string(),
            percent: period.rate().as_percent(),
            starts_at: period.starts_at(),
            expires_at: period.expires_at(),
            on_sale: period.is_on_sale(),
        }
    }
}

/// 見積もりの明細行
#[derive(Debug, Serialize)]
pub struct QuoteLineResponse {
    pub book_id: String,
    pub title: String,
    pub author: String,
    pub quantity: u32,
    pub price: PriceResponse,
    pub line_subtotal: Decimal,
    pub discount_share: Decimal,
    pub line_total: Decimal,
}

impl QuoteLineResponse {
    fn from_line(line: &QuoteLine) -> Self {
        Self {
            book_id: line.book_id.to_string(),
            title: line.title.clone(),
            author: line.author.clone(),
            quantity: line.quantity,
            price: PriceResponse::from_price(&line.price),
            line_subtotal: amount(line.line_subtotal),
            discount_share: amount(line.discount_share),
            line_total: amount(line.line_total),
        }
    }
}

/// 見積もり用のレスポンスDTO
#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    pub lines: Vec<QuoteLineResponse>,
    pub total_items: u32,
    pub outstanding_orders: u64,
    pub subtotal: Decimal,
    pub quantity_discount_percent: Decimal,
    pub loyalty_discount_percent: Decimal,
    pub combined_discount_percent: Decimal,
    pub discount_amount: Decimal,
    pub final_total: Decimal,
    pub currency: String,
}

impl QuoteResponse {
    pub fn from_quote(quote: &Quote) -> Self {
        Self {
            lines: quote.lines.iter().map(QuoteLineResponse::from_line).collect(),
            total_items: quote.total_items,
            outstanding_orders: quote.outstanding_orders,
            subtotal: amount(quote.subtotal),
            quantity_discount_percent: quote.quantity_rate.as_percent(),
            loyalty_discount_percent: quote.loyalty_rate.as_percent(),
            combined_discount_percent: quote.combined_rate.as_percent(),
            discount_amount: amount(quote.discount_amount),
            final_total: amount(quote.final_total),
            currency: quote.final_total.currency(),
        }
    }
}

/// 在庫不足の行
#[derive(Debug, Serialize)]
pub struct ShortageResponse {
    pub book_id: String,
    pub title: String,
    pub available: u32,
    pub requested: u32,
    pub message: String,
}

impl ShortageResponse {
    fn from_shortage(shortage: &StockShortage) -> Self {
        Self {
            book_id: shortage.book_id.to_string(),
            title: shortage.title.clone(),
            available: shortage.available,
            requested: shortage.requested,
            message: shortage.message(),
        }
    }
}

/// カート画面
#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub quote: QuoteResponse,
    pub shortages: Vec<ShortageResponse>,
}

impl CartResponse {
    pub fn from_view(view: &CartView) -> Self {
        Self {
            quote: QuoteResponse::from_quote(&view.quote),
            shortages: view.shortages.iter().map(ShortageResponse::from_shortage).collect(),
        }
    }
}

/// カート変更の結果
#[derive(Debug, Serialize)]
pub struct CartMutationResponse {
    pub quantity: u32,
    pub cart_count: usize,
}

impl From<CartMutation> for CartMutationResponse {
    fn from(mutation: CartMutation) -> Self {
        Self {
            quantity: mutation.quantity,
            cart_count: mutation.distinct_books,
        }
    }
}

/// ほしい物リストの切り替え結果
#[derive(Debug, Serialize)]
pub struct WishlistToggleResponse {
    pub book_id: String,
    pub in_wishlist: bool,
}

/// チェックアウト確認画面
#[derive(Debug, Serialize)]
pub struct CheckoutPreviewResponse {
    pub quote: QuoteResponse,
    pub shortages: Vec<ShortageResponse>,
    pub can_confirm: bool,
}

impl CheckoutPreviewResponse {
    pub fn from_preview(preview: &CheckoutPreview) -> Self {
        Self {
            quote: QuoteResponse::from_quote(&preview.quote),
            shortages: preview.shortages.iter().map(ShortageResponse::from_shortage).collect(),
            can_confirm: preview.can_confirm(),
        }
    }
}

/// 注文用のレスポンスDTO
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    /// 操作で指定する注文キー（`user|book|timestamp`）
    pub order_key: String,
    pub user_id: String,
    pub book_id: String,
    pub customer_name: String,
    pub quantity: u32,
    pub total_price: Decimal,
    pub currency: String,
    pub claim_code: String,
    pub status: String,
    pub ordered_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub fulfilled_at: Option<DateTime<Utc>>,
}

impl OrderResponse {
    /// ドメインオブジェクトからOrderResponseを作成
    pub fn from_order(order: &Order) -> Self {
        Self {
            order_key: order.key().to_string(),
            user_id: order.user_id().to_string(),
            book_id: order.book_id().to_string(),
            customer_name: order.customer_name().to_string(),
            quantity: order.quantity(),
            total_price: amount(order.total_price()),
            currency: order.total_price().currency(),
            claim_code: order.claim_code().to_string(),
            status: order.status().to_string(),
            ordered_at: order.ordered_at(),
            cancelled_at: order.cancelled_at(),
            fulfilled_at: order.fulfilled_at(),
        }
    }
}

/// チェックアウト確定の結果
#[derive(Debug, Serialize)]
pub struct CheckoutReceiptResponse {
    pub orders: Vec<OrderResponse>,
    pub quote: QuoteResponse,
    pub warnings: Vec<String>,
}

impl CheckoutReceiptResponse {
    pub fn from_receipt(receipt: &CheckoutReceipt) -> Self {
        Self {
            orders: receipt.orders.iter().map(OrderResponse::from_order).collect(),
            quote: QuoteResponse::from_quote(&receipt.quote),
            warnings: receipt.warnings.clone(),
        }
    }
}

/// 受け取り待ち注文数
#[derive(Debug, Serialize)]
pub struct OrderCountResponse {
    pub count: u64,
}

/// 単一キャンセルの結果
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    /// `Cancelled` または `Deleted`
    pub outcome: String,
}

impl From<CancelOutcome> for CancelResponse {
    fn from(outcome: CancelOutcome) -> Self {
        let outcome = match outcome {
            CancelOutcome::Cancelled => "Cancelled",
            CancelOutcome::Deleted => "Deleted",
        };
        Self {
            outcome: outcome.to_string(),
        }
    }
}

/// 一括操作でスキップした入力
#[derive(Debug, Serialize)]
pub struct SkippedEntryResponse {
    pub entry: String,
    pub reason: String,
}

/// 一括操作の結果
#[derive(Debug, Serialize)]
pub struct BulkOutcomeResponse {
    pub processed: usize,
    pub deleted: usize,
    pub skipped: Vec<SkippedEntryResponse>,
}

impl From<BulkOutcome> for BulkOutcomeResponse {
    fn from(outcome: BulkOutcome) -> Self {
        Self {
            processed: outcome.processed,
            deleted: outcome.deleted,
            skipped: outcome
                .skipped
                .into_iter()
                .map(|skipped| SkippedEntryResponse {
                    entry: skipped.entry,
                    reason: skipped.reason,
                })
                .collect(),
        }
    }
}

/// 受け渡し確認画面
#[derive(Debug, Serialize)]
pub struct FulfillmentPreviewResponse {
    pub order: OrderResponse,
    pub book_title: String,
}

impl FulfillmentPreviewResponse {
    pub fn from_preview(preview: &FulfillmentPreview) -> Self {
        Self {
            order: OrderResponse::from_order(&preview.order),
            book_title: preview.book_title.clone(),
        }
    }
}

/// お知らせ用のレスポンスDTO
#[derive(Debug, Serialize)]
pub struct AnnouncementResponse {
    pub announcement_id: String,
    pub title: String,
    pub message: String,
    pub starts_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl AnnouncementResponse {
    pub fn from_announcement(announcement: &TimedAnnouncement) -> Self {
        Self {
            announcement_id: announcement.id().to_string(),
            title: announcement.title().to_string(),
            message: announcement.message().to_string(),
            starts_at: announcement.starts_at(),
            expires_at: announcement.expires_at(),
            created_at: announcement.created_at(),
        }
    }
}

/// レビュー・返信用のレスポンスDTO
#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub review_id: String,
    pub book_id: String,
    pub author_name: String,
    pub parent_id: Option<String>,
    pub rating: Option<u8>,
    pub comment: String,
    pub reviewed_at: DateTime<Utc>,
}

impl ReviewResponse {
    pub fn from_review(review: &Review) -> Self {
        Self {
            review_id: review.id().to_string(),
            book_id: review.book_id().to_string(),
            author_name: review.author_name().to_string(),
            parent_id: review.parent().map(|parent| parent.to_string()),
            rating: review.rating(),
            comment: review.comment().to_string(),
            reviewed_at: review.reviewed_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReviewThreadResponse {
    pub review: ReviewResponse,
    pub replies: Vec<ReviewResponse>,
}

impl ReviewThreadResponse {
    fn from_thread(thread: &ReviewThread) -> Self {
        Self {
            review: ReviewResponse::from_review(&thread.review),
            replies: thread.replies.iter().map(ReviewResponse::from_review).collect(),
        }
    }
}

/// 書籍のレビュー一覧
#[derive(Debug, Serialize)]
pub struct BookReviewsResponse {
    pub book_id: String,
    pub average_rating: Option<Decimal>,
    pub review_count: usize,
    pub threads: Vec<ReviewThreadResponse>,
}

impl BookReviewsResponse {
    pub fn from_reviews(reviews: &BookReviews) -> Self {
        Self {
            book_id: reviews.book_id.to_string(),
            average_rating: reviews.average_rating,
            review_count: reviews.threads.len(),
            threads: reviews
                .threads
                .iter()
                .map(ReviewThreadResponse::from_thread)
                .collect(),
        }
    }
}

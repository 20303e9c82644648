use crate::application::service::{
    AnnouncementDraft, Availability, CatalogQuery, CatalogSort, DiscountSettings, NewBook,
    DEFAULT_PAGE_SIZE,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// カタログ検索用のクエリパラメータ
#[derive(Debug, Default, Deserialize)]
pub struct CatalogQueryParams {
    pub search: Option<String>,
    /// `all` / `available` / `unavailable`
    pub availability: Option<String>,
    pub deals: Option<bool>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    /// `title` / `author` / `price_asc` / `price_desc`
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl CatalogQueryParams {
    /// クエリパラメータをカタログ検索条件に変換する
    /// 未知の値は既定値として扱う
    pub fn into_query(self) -> CatalogQuery {
        let availability = match self.availability.as_deref() {
            Some("available") => Availability::Available,
            Some("unavailable") => Availability::Unavailable,
            _ => Availability::All,
        };
        let sort = match self.sort.as_deref() {
            Some("author") => CatalogSort::Author,
            Some("price_asc") => CatalogSort::PriceAsc,
            Some("price_desc") => CatalogSort::PriceDesc,
            _ => CatalogSort::Title,
        };
        CatalogQuery {
            search: self.search.filter(|s| !s.trim().is_empty()),
            availability,
            deals_only: self.deals.unwrap_or(false),
            min_price: self.min_price,
            max_price: self.max_price,
            sort,
            page: self.page.unwrap_or(1),
            page_size: self.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        }
    }
}

/// 書籍登録用のリクエストDTO
#[derive(Debug, Serialize, Deserialize)]
pub struct AddBookRequest {
    pub title: String,
    pub author: String,
    pub price: Decimal,
    pub quantity: u32,
}

impl From<AddBookRequest> for NewBook {
    fn from(request: AddBookRequest) -> Self {
        NewBook {
            title: request.title,
            author: request.author,
            price: request.price,
            quantity: request.quantity,
        }
    }
}

/// 在庫調整用のリクエストDTO
#[derive(Debug, Serialize, Deserialize)]
pub struct AdjustStockRequest {
    pub delta: i64,
}

/// 期間割引設定用のリクエストDTO
#[derive(Debug, Serialize, Deserialize)]
pub struct SetDiscountRequest {
    pub percent: Decimal,
    pub starts_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub on_sale: bool,
}

impl From<SetDiscountRequest> for DiscountSettings {
    fn from(request: SetDiscountRequest) -> Self {
        DiscountSettings {
            percent: request.percent,
            starts_at: request.starts_at,
            expires_at: request.expires_at,
            on_sale: request.on_sale,
        }
    }
}

/// カート追加用のリクエストDTO
#[derive(Debug, Serialize, Deserialize)]
pub struct AddToCartRequest {
    pub book_id: Uuid,
    /// 負の値も受け取り、検証はアプリケーション層で行う
    pub quantity: i64,
}

/// カート数量変更用のリクエストDTO
#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i64,
}

/// 単一注文の操作用のリクエストDTO
/// `order_key` は `user|book|timestamp` 形式
#[derive(Debug, Serialize, Deserialize)]
pub struct OrderKeyRequest {
    pub order_key: String,
}

/// 一括操作用のリクエストDTO
#[derive(Debug, Serialize, Deserialize)]
pub struct BulkOrdersRequest {
    #[serde(default)]
    pub orders: Vec<String>,
}

/// 店頭受け渡し用のリクエストDTO（照会のクエリパラメータと兼用）
#[derive(Debug, Serialize, Deserialize)]
pub struct FulfillmentRequest {
    pub claim_code: String,
    pub user_id: String,
}

/// お知らせの掲示・更新用のリクエストDTO
#[derive(Debug, Serialize, Deserialize)]
pub struct AnnouncementRequest {
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<AnnouncementRequest> for AnnouncementDraft {
    fn from(request: AnnouncementRequest) -> Self {
        AnnouncementDraft {
            title: request.title,
            message: request.message,
            starts_at: request.starts_at,
            expires_at: request.expires_at,
        }
    }
}

/// レビュー投稿用のリクエストDTO
#[derive(Debug, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub rating: i64,
    pub comment: String,
}

/// 返信用のリクエストDTO
#[derive(Debug, Serialize, Deserialize)]
pub struct ReplyRequest {
    pub comment: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_query_defaults() {
        let query = CatalogQueryParams::default().into_query();
        assert_eq!(query, CatalogQuery::default());
    }

    #[test]
    fn test_catalog_query_mapping() {
        let params: CatalogQueryParams = serde_json::from_value(serde_json::json!({
            "search": "  ",
            "availability": "available",
            "deals": true,
            "sort": "price_desc",
            "page": 2,
        }))
        .unwrap();

        let query = params.into_query();

        assert_eq!(query.search, None);
        assert_eq!(query.availability, Availability::Available);
        assert!(query.deals_only);
        assert_eq!(query.sort, CatalogSort::PriceDesc);
        assert_eq!(query.page, 2);
        assert_eq!(query.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_set_discount_request_defaults_on_sale() {
        let request: SetDiscountRequest = serde_json::from_str(
            r#"{"percent":"25","starts_at":"2026-01-01T00:00:00Z","expires_at":"2026-02-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(!request.on_sale);
        let settings = DiscountSettings::from(request);
        assert_eq!(settings.percent, Decimal::from(25));
    }
}

use crate::application::service::ServiceDependencies;
use crate::application::{Actor, ApplicationError, Role};
use crate::domain::model::{Book, BookId, DiscountPeriod, DiscountRate, Money};
use crate::domain::pricing::{price_item, ItemPrice};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// 1ページあたりの既定件数
pub const DEFAULT_PAGE_SIZE: u32 = 12;

/// 在庫による絞り込み
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Availability {
    #[default]
    All,
    Available,
    Unavailable,
}

/// 並び順
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CatalogSort {
    #[default]
    Title,
    Author,
    /// 定価の安い順
    PriceAsc,
    /// 定価の高い順
    PriceDesc,
}

/// カタログ検索条件
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogQuery {
    /// 書名・著者名の部分一致（大文字小文字は区別しない）
    pub search: Option<String>,
    pub availability: Availability,
    /// 割引期間中の書籍のみ
    pub deals_only: bool,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub sort: CatalogSort,
    /// 1始まりのページ番号
    pub page: u32,
    pub page_size: u32,
}

impl Default for CatalogQuery {
    fn default() -> Self {
        Self {
            search: None,
            availability: Availability::All,
            deals_only: false,
            min_price: None,
            max_price: None,
            sort: CatalogSort::Title,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// 現在の販売価格付きの書籍
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub book: Book,
    pub price: ItemPrice,
}

/// カタログの1ページ
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogPage {
    pub entries: Vec<CatalogEntry>,
    pub total: usize,
    pub page: u32,
    pub total_pages: u32,
}

/// 新規書籍の入力
#[derive(Debug, Clone, PartialEq)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub price: Decimal,
    pub quantity: u32,
}

/// 期間割引の設定入力
#[derive(Debug, Clone, PartialEq)]
pub struct DiscountSettings {
    /// 割引率（パーセント）。0 の場合は割引を解除する
    pub percent: Decimal,
    pub starts_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub on_sale: bool,
}

/// カタログアプリケーションサービス
/// 書籍の閲覧と、管理者による書籍・在庫・割引の管理
pub struct CatalogApplicationService {
    deps: ServiceDependencies,
}

impl CatalogApplicationService {
    pub fn new(deps: ServiceDependencies) -> Self {
        Self { deps }
    }

    /// 条件に合う書籍を現在の販売価格付きで取得する（認証不要）
    pub async fn browse(&self, query: &CatalogQuery) -> Result<CatalogPage, ApplicationError> {
        let now = self.deps.clock.now();
        let books = self.deps.catalog.find_all().await?;
        let book_ids: Vec<BookId> = books.iter().map(Book::id).collect();
        let discounts = self.deps.discounts.find_for_books(&book_ids).await?;

        let needle = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let mut entries: Vec<CatalogEntry> = books
            .into_iter()
            .map(|book| {
                let price = price_item(&book, &discounts, now);
                CatalogEntry { book, price }
            })
            .filter(|entry| {
                let book = &entry.book;
                let matches_search = needle.as_ref().map_or(true, |needle| {
                    book.title().to_lowercase().contains(needle)
                        || book.author().to_lowercase().contains(needle)
                });
                let matches_stock = match query.availability {
                    Availability::All => true,
                    Availability::Available => book.is_available(),
                    Availability::Unavailable => !book.is_available(),
                };
                let listed = book.price().amount();
                matches_search
                    && matches_stock
                    && (!query.deals_only || entry.price.has_active_discount())
                    && query.min_price.map_or(true, |min| listed >= min)
                    && query.max_price.map_or(true, |max| listed <= max)
            })
            .collect();

        match query.sort {
            CatalogSort::Title => entries.sort_by(|a, b| a.book.title().cmp(b.book.title())),
            CatalogSort::Author => entries.sort_by(|a, b| a.book.author().cmp(b.book.author())),
            CatalogSort::PriceAsc => {
                entries.sort_by(|a, b| a.book.price().amount().cmp(&b.book.price().amount()))
            }
            CatalogSort::PriceDesc => {
                entries.sort_by(|a, b| b.book.price().amount().cmp(&a.book.price().amount()))
            }
        }

        let page_size = query.page_size.max(1);
        let page = query.page.max(1);
        let total = entries.len();
        let total_pages = (total as u32).div_ceil(page_size);
        let entries = entries
            .into_iter()
            .skip((page - 1).saturating_mul(page_size) as usize)
            .take(page_size as usize)
            .collect();

        Ok(CatalogPage {
            entries,
            total,
            page,
            total_pages,
        })
    }

    /// 書籍1冊の詳細を現在の販売価格付きで取得する
    pub async fn book_details(&self, book_id: BookId) -> Result<CatalogEntry, ApplicationError> {
        let book = self.find_book(book_id).await?;
        let discounts = self.deps.discounts.find_for_books(&[book_id]).await?;
        let price = price_item(&book, &discounts, self.deps.clock.now());
        Ok(CatalogEntry { book, price })
    }

    /// 現在の在庫数
    pub async fn stock(&self, book_id: BookId) -> Result<u32, ApplicationError> {
        Ok(self.find_book(book_id).await?.quantity_on_hand())
    }

    /// 書籍を登録する（管理者のみ）
    pub async fn add_book(&self, actor: &Actor, input: NewBook) -> Result<Book, ApplicationError> {
        actor.require_any(&[Role::Admin])?;
        let correlation_id = self
            .deps
            .begin("CatalogService", "Adding book", actor.user_id);
        let book = Book::new(
            BookId::new(),
            input.title.trim().to_string(),
            input.author.trim().to_string(),
            Money::usd(input.price),
            input.quantity,
        )?;
        self.deps.catalog.save(&book).await?;

        let mut context = HashMap::new();
        context.insert("book_id".to_string(), book.id().to_string());
        self.deps.logger.info(
            "CatalogService",
            "Book added",
            Some(correlation_id),
            Some(context),
        );
        Ok(book)
    }

    /// 在庫数を増減する（管理者のみ）
    ///
    /// # Returns
    /// 変更後の在庫数。結果が負になる場合は Conflict で、在庫は変わらない
    pub async fn adjust_stock(
        &self,
        actor: &Actor,
        book_id: BookId,
        delta: i64,
    ) -> Result<u32, ApplicationError> {
        actor.require_any(&[Role::Admin])?;
        let correlation_id = self
            .deps
            .begin("CatalogService", "Adjusting stock", actor.user_id);
        let quantity = self.deps.ledger.adjust_stock(book_id, delta).await?;

        let mut context = HashMap::new();
        context.insert("book_id".to_string(), book_id.to_string());
        context.insert("delta".to_string(), delta.to_string());
        context.insert("quantity_on_hand".to_string(), quantity.to_string());
        self.deps.logger.info(
            "CatalogService",
            "Stock adjusted",
            Some(correlation_id),
            Some(context),
        );
        Ok(quantity)
    }

    /// 書籍を削除する（管理者のみ）
    /// 注文から参照されている書籍は削除できない。割引・カート・ほしい物リストの行は先に削除する
    pub async fn delete_book(&self, actor: &Actor, book_id: BookId) -> Result<(), ApplicationError> {
        actor.require_any(&[Role::Admin])?;
        let correlation_id = self
            .deps
            .begin("CatalogService", "Deleting book", actor.user_id);
        let book = self.find_book(book_id).await?;

        if self.deps.orders.exists_for_book(book_id).await? {
            return Err(ApplicationError::Conflict(format!(
                "Book '{}' is referenced by orders and cannot be deleted.",
                book.title()
            )));
        }

        self.deps.discounts.delete_by_book(book_id).await?;
        self.deps.carts.remove_book_everywhere(book_id).await?;
        self.deps.wishlists.remove_book_everywhere(book_id).await?;
        self.deps.reviews.remove_book_everywhere(book_id).await?;
        self.deps.catalog.delete(book_id).await?;

        let mut context = HashMap::new();
        context.insert("book_id".to_string(), book_id.to_string());
        self.deps.logger.info(
            "CatalogService",
            "Book deleted",
            Some(correlation_id),
            Some(context),
        );
        Ok(())
    }

    /// 書籍の期間割引を設定する（管理者のみ）
    /// 1冊につき1件で、既存の設定は置き換える。割引率0は解除を意味する
    ///
    /// # Returns
    /// * `Ok(Some(DiscountPeriod))` - 設定した割引
    /// * `Ok(None)` - 割引を解除した
    pub async fn set_discount(
        &self,
        actor: &Actor,
        book_id: BookId,
        settings: DiscountSettings,
    ) -> Result<Option<DiscountPeriod>, ApplicationError> {
        actor.require_any(&[Role::Admin])?;
        let correlation_id = self
            .deps
            .begin("CatalogService", "Setting discount", actor.user_id);
        self.find_book(book_id).await?;

        if settings.percent.is_zero() {
            self.deps.discounts.delete_by_book(book_id).await?;
            self.deps.logger.info(
                "CatalogService",
                "Discount removed",
                Some(correlation_id),
                None,
            );
            return Ok(None);
        }
        if settings.percent.is_sign_negative() || settings.percent > Decimal::ONE_HUNDRED {
            return Err(ApplicationError::Validation(
                "Discount percentage must be between 0 and 100.".to_string(),
            ));
        }

        let rate = DiscountRate::from_percent(settings.percent)?;
        let period = DiscountPeriod::new(
            book_id,
            rate,
            settings.starts_at,
            settings.expires_at,
            settings.on_sale,
        )?;
        self.deps.discounts.upsert(&period).await?;

        let mut context = HashMap::new();
        context.insert("book_id".to_string(), book_id.to_string());
        context.insert("rate".to_string(), rate.to_string());
        self.deps.logger.info(
            "CatalogService",
            "Discount updated",
            Some(correlation_id),
            Some(context),
        );
        Ok(Some(period))
    }

    async fn find_book(&self, book_id: BookId) -> Result<Book, ApplicationError> {
        self.deps
            .catalog
            .find_by_id(book_id)
            .await?
            .ok_or_else(|| ApplicationError::NotFound("Book not found.".to_string()))
    }
}

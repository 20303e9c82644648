use crate::application::service::{CatalogEntry, ServiceDependencies};
use crate::application::{Actor, ApplicationError};
use crate::domain::model::BookId;
use crate::domain::pricing::price_item;
use std::collections::HashMap;

/// ほしい物リストアプリケーションサービス
pub struct WishlistApplicationService {
    deps: ServiceDependencies,
}

impl WishlistApplicationService {
    pub fn new(deps: ServiceDependencies) -> Self {
        Self { deps }
    }

    /// 書籍をほしい物リストに追加、既にあれば削除する
    ///
    /// # Returns
    /// * `Ok(true)` - 追加した
    /// * `Ok(false)` - 削除した
    /// * `Err(ApplicationError::NotFound)` - 書籍が存在しない
    pub async fn toggle(&self, actor: &Actor, book_id: BookId) -> Result<bool, ApplicationError> {
        let correlation_id = self
            .deps
            .begin("WishlistService", "Toggling wishlist entry", actor.user_id);
        if self.deps.catalog.find_by_id(book_id).await?.is_none() {
            return Err(ApplicationError::NotFound("Book not found.".to_string()));
        }

        let added = if self.deps.wishlists.contains(actor.user_id, book_id).await? {
            self.deps.wishlists.remove(actor.user_id, book_id).await?;
            false
        } else {
            self.deps.wishlists.add(actor.user_id, book_id).await?;
            true
        };

        let mut context = HashMap::new();
        context.insert("book_id".to_string(), book_id.to_string());
        context.insert("added".to_string(), added.to_string());
        self.deps.logger.info(
            "WishlistService",
            "Wishlist updated",
            Some(correlation_id),
            Some(context),
        );
        Ok(added)
    }

    pub async fn contains(&self, actor: &Actor, book_id: BookId) -> Result<bool, ApplicationError> {
        Ok(self.deps.wishlists.contains(actor.user_id, book_id).await?)
    }

    /// ほしい物リストの書籍を現在の販売価格付きで、書名順に取得する
    pub async fn view(&self, actor: &Actor) -> Result<Vec<CatalogEntry>, ApplicationError> {
        let book_ids = self.deps.wishlists.find_by_user(actor.user_id).await?;
        let mut books = self.deps.catalog.find_by_ids(&book_ids).await?;
        books.sort_by(|a, b| a.title().cmp(b.title()));

        let discounts = self.deps.discounts.find_for_books(&book_ids).await?;
        let now = self.deps.clock.now();
        Ok(books
            .into_iter()
            .map(|book| {
                let price = price_item(&book, &discounts, now);
                CatalogEntry { book, price }
            })
            .collect())
    }
}

use crate::application::service::ServiceDependencies;
use crate::application::{Actor, ApplicationError};
use crate::domain::event::{CartCountChanged, DomainEvent};
use crate::domain::model::{Book, BookId, Cart};
use crate::domain::pricing::Quote;
use std::collections::HashMap;
use uuid::Uuid;

/// 在庫不足の行
#[derive(Debug, Clone, PartialEq)]
pub struct StockShortage {
    pub book_id: BookId,
    pub title: String,
    pub available: u32,
    pub requested: u32,
}

impl StockShortage {
    pub fn message(&self) -> String {
        format!(
            "Only {} copies of '{}' are available.",
            self.available, self.title
        )
    }
}

/// 在庫数を超えている行を洗い出す
pub(crate) fn find_shortages(items: &[(Book, u32)]) -> Vec<StockShortage> {
    items
        .iter()
        .filter(|(book, quantity)| !book.has_available_stock(*quantity))
        .map(|(book, quantity)| StockShortage {
            book_id: book.id(),
            title: book.title().to_string(),
            available: book.quantity_on_hand(),
            requested: *quantity,
        })
        .collect()
}

/// カート画面の内容
#[derive(Debug, Clone, PartialEq)]
pub struct CartView {
    pub quote: Quote,
    /// 表示時点で在庫が足りない行
    pub shortages: Vec<StockShortage>,
}

/// カート変更の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartMutation {
    /// 変更後のその書籍の数量（削除時は0）
    pub quantity: u32,
    /// カートに入っている書籍の種類数
    pub distinct_books: usize,
}

/// カートアプリケーションサービス
pub struct CartApplicationService {
    deps: ServiceDependencies,
}

impl CartApplicationService {
    pub fn new(deps: ServiceDependencies) -> Self {
        Self { deps }
    }

    /// カートを表示する
    /// 在庫と割引はその時点の値で読み直す
    pub async fn view_cart(&self, actor: &Actor) -> Result<CartView, ApplicationError> {
        let cart = self.deps.carts.find_by_user(actor.user_id).await?;
        let items = self.deps.load_cart_items(&cart).await?;
        let now = self.deps.clock.now();
        let quote = self.deps.quote_items(actor.user_id, &items, now).await?;
        Ok(CartView {
            quote,
            shortages: find_shortages(&items),
        })
    }

    /// 書籍をカートに追加する
    ///
    /// # Arguments
    /// * `actor` - 呼び出し元
    /// * `book_id` - 追加する書籍
    /// * `quantity` - 追加する数量（1未満は1として扱う）
    ///
    /// # Returns
    /// * `Ok(CartMutation)` - 追加後の数量とカート件数
    /// * `Err(ApplicationError::NotFound)` - 書籍が存在しない
    /// * `Err(ApplicationError::Conflict)` - 在庫切れ、または在庫数を超える
    pub async fn add_to_cart(
        &self,
        actor: &Actor,
        book_id: BookId,
        quantity: i64,
    ) -> Result<CartMutation, ApplicationError> {
        let correlation_id = self
            .deps
            .begin("CartService", "Adding book to cart", actor.user_id);
        let book = self.find_book(book_id).await?;

        let mut cart = self.deps.carts.find_by_user(actor.user_id).await?;
        let merged = cart.add_or_merge(&book, quantity)?;
        self.deps.carts.save(&cart).await?;

        self.after_mutation(&cart, correlation_id).await;
        Ok(CartMutation {
            quantity: merged,
            distinct_books: cart.distinct_books(),
        })
    }

    /// カート内の数量を変更する
    pub async fn update_quantity(
        &self,
        actor: &Actor,
        book_id: BookId,
        quantity: i64,
    ) -> Result<CartMutation, ApplicationError> {
        let correlation_id = self
            .deps
            .begin("CartService", "Updating cart quantity", actor.user_id);
        let book = self.find_book(book_id).await?;

        let mut cart = self.deps.carts.find_by_user(actor.user_id).await?;
        if cart.quantity_of(book_id) == 0 {
            return Err(ApplicationError::NotFound(
                "Item not found in cart.".to_string(),
            ));
        }
        cart.update_quantity(&book, quantity)?;
        self.deps.carts.save(&cart).await?;

        self.after_mutation(&cart, correlation_id).await;
        Ok(CartMutation {
            quantity: cart.quantity_of(book_id),
            distinct_books: cart.distinct_books(),
        })
    }

    /// 書籍をカートから削除する
    /// 行が無い場合は NotFound を返す（状態は変わらない）
    pub async fn remove(
        &self,
        actor: &Actor,
        book_id: BookId,
    ) -> Result<CartMutation, ApplicationError> {
        let correlation_id = self
            .deps
            .begin("CartService", "Removing book from cart", actor.user_id);
        let mut cart = self.deps.carts.find_by_user(actor.user_id).await?;
        if !cart.remove(book_id) {
            return Err(ApplicationError::NotFound(
                "Item not found in cart.".to_string(),
            ));
        }
        self.deps.carts.save(&cart).await?;

        self.after_mutation(&cart, correlation_id).await;
        Ok(CartMutation {
            quantity: 0,
            distinct_books: cart.distinct_books(),
        })
    }

    /// カート内の指定書籍の数量（無ければ0）
    pub async fn cart_entry(&self, actor: &Actor, book_id: BookId) -> Result<u32, ApplicationError> {
        let cart = self.deps.carts.find_by_user(actor.user_id).await?;
        Ok(cart.quantity_of(book_id))
    }

    async fn find_book(&self, book_id: BookId) -> Result<Book, ApplicationError> {
        self.deps
            .catalog
            .find_by_id(book_id)
            .await?
            .ok_or_else(|| ApplicationError::NotFound("Book not found.".to_string()))
    }

    async fn after_mutation(&self, cart: &Cart, correlation_id: Uuid) {
        let mut context = HashMap::new();
        context.insert("distinct_books".to_string(), cart.distinct_books().to_string());
        self.deps.logger.info(
            "CartService",
            "Cart updated",
            Some(correlation_id),
            Some(context),
        );
        self.deps
            .publish(DomainEvent::CartCountChanged(CartCountChanged::new(
                correlation_id,
                cart.user_id(),
                cart.distinct_books(),
            )))
            .await;
    }
}

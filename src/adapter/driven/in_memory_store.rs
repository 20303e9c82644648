use crate::domain::model::{
    AnnouncementId, Book, BookId, Cart, ClaimCode, DiscountPeriod, Order, OrderKey, Review,
    ReviewId, TimedAnnouncement, UserId,
};
use crate::domain::port::{
    AnnouncementRepository, BookCatalog, CartRepository, DiscountRepository, LedgerError,
    OrderRepository, RepositoryError, ReviewRepository, StockLedger, WishlistRepository,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct StoreState {
    books: HashMap<BookId, Book>,
    discounts: HashMap<BookId, DiscountPeriod>,
    carts: HashMap<UserId, Cart>,
    wishlists: HashMap<UserId, Vec<BookId>>,
    orders: HashMap<OrderKey, Order>,
    announcements: HashMap<AnnouncementId, TimedAnnouncement>,
    reviews: Vec<Review>,
}

/// インメモリの永続化実装
/// すべてのリポジトリと在庫台帳を1つのミューテックスの下で実装する。
/// ロックを保持したまま検証と更新を行うため、台帳操作は原子的になる
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookCatalog for InMemoryStore {
    async fn find_by_id(&self, book_id: BookId) -> Result<Option<Book>, RepositoryError> {
        Ok(self.state.lock().await.books.get(&book_id).cloned())
    }

    async fn find_by_ids(&self, book_ids: &[BookId]) -> Result<Vec<Book>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(book_ids
            .iter()
            .filter_map(|id| state.books.get(id).cloned())
            .collect())
    }

    async fn find_all(&self) -> Result<Vec<Book>, RepositoryError> {
        let state = self.state.lock().await;
        let mut books: Vec<Book> = state.books.values().cloned().collect();
        books.sort_by(|a, b| a.title().cmp(b.title()));
        Ok(books)
    }

    async fn save(&self, book: &Book) -> Result<(), RepositoryError> {
        self.state
            .lock()
            .await
            .books
            .insert(book.id(), book.clone());
        Ok(())
    }

    async fn delete(&self, book_id: BookId) -> Result<bool, RepositoryError> {
        Ok(self.state.lock().await.books.remove(&book_id).is_some())
    }
}

#[async_trait]
impl DiscountRepository for InMemoryStore {
    async fn find_for_books(
        &self,
        book_ids: &[BookId],
    ) -> Result<Vec<DiscountPeriod>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(book_ids
            .iter()
            .filter_map(|id| state.discounts.get(id).cloned())
            .collect())
    }

    async fn upsert(&self, period: &DiscountPeriod) -> Result<(), RepositoryError> {
        self.state
            .lock()
            .await
            .discounts
            .insert(period.book_id(), period.clone());
        Ok(())
    }

    async fn delete_by_book(&self, book_id: BookId) -> Result<(), RepositoryError> {
        self.state.lock().await.discounts.remove(&book_id);
        Ok(())
    }
}

#[async_trait]
impl CartRepository for InMemoryStore {
    async fn find_by_user(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        Ok(self
            .state
            .lock()
            .await
            .carts
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| Cart::new(user_id)))
    }

    async fn save(&self, cart: &Cart) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        if cart.is_empty() {
            state.carts.remove(&cart.user_id());
        } else {
            state.carts.insert(cart.user_id(), cart.clone());
        }
        Ok(())
    }

    async fn remove_book_everywhere(&self, book_id: BookId) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        for cart in state.carts.values_mut() {
            cart.remove(book_id);
        }
        state.carts.retain(|_, cart| !cart.is_empty());
        Ok(())
    }
}

#[async_trait]
impl WishlistRepository for InMemoryStore {
    async fn contains(&self, user_id: UserId, book_id: BookId) -> Result<bool, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .wishlists
            .get(&user_id)
            .is_some_and(|books| books.contains(&book_id)))
    }

    async fn add(&self, user_id: UserId, book_id: BookId) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        let books = state.wishlists.entry(user_id).or_default();
        if !books.contains(&book_id) {
            books.push(book_id);
        }
        Ok(())
    }

    async fn remove(&self, user_id: UserId, book_id: BookId) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        if let Some(books) = state.wishlists.get_mut(&user_id) {
            books.retain(|id| *id != book_id);
        }
        Ok(())
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<BookId>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.wishlists.get(&user_id).cloned().unwrap_or_default())
    }

    async fn remove_book_everywhere(&self, book_id: BookId) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        for books in state.wishlists.values_mut() {
            books.retain(|id| *id != book_id);
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn find_by_key(&self, key: &OrderKey) -> Result<Option<Order>, RepositoryError> {
        Ok(self.state.lock().await.orders.get(key).cloned())
    }

    async fn find_by_claim_code(
        &self,
        code: &ClaimCode,
    ) -> Result<Option<Order>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .values()
            .find(|order| order.claim_code() == code)
            .cloned())
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|order| order.user_id() == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.ordered_at().cmp(&a.ordered_at()));
        Ok(orders)
    }

    async fn count_outstanding(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .values()
            .filter(|order| order.user_id() == user_id && order.is_outstanding())
            .count() as u64)
    }

    async fn count_all(&self) -> Result<u64, RepositoryError> {
        Ok(self.state.lock().await.orders.len() as u64)
    }

    async fn claim_code_exists(&self, code: &ClaimCode) -> Result<bool, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.orders.values().any(|order| order.claim_code() == code))
    }

    async fn mark_fulfilled(&self, order: &Order) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        match state.orders.get_mut(&order.key()) {
            Some(stored) if stored.is_placed() => {
                *stored = order.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, key: &OrderKey) -> Result<bool, RepositoryError> {
        Ok(self.state.lock().await.orders.remove(key).is_some())
    }

    async fn exists_for_book(&self, book_id: BookId) -> Result<bool, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.orders.values().any(|order| order.book_id() == book_id))
    }

    async fn has_purchased(
        &self,
        user_id: UserId,
        book_id: BookId,
    ) -> Result<bool, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.orders.values().any(|order| {
            order.user_id() == user_id && order.book_id() == book_id && !order.is_cancelled()
        }))
    }
}

#[async_trait]
impl AnnouncementRepository for InMemoryStore {
    async fn find_unexpired(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<TimedAnnouncement>, RepositoryError> {
        let state = self.state.lock().await;
        let mut notices: Vec<TimedAnnouncement> = state
            .announcements
            .values()
            .filter(|notice| !notice.is_expired_at(now))
            .cloned()
            .collect();
        notices.sort_by(|a, b| b.starts_at().cmp(&a.starts_at()));
        Ok(notices)
    }

    async fn find_by_id(
        &self,
        id: AnnouncementId,
    ) -> Result<Option<TimedAnnouncement>, RepositoryError> {
        Ok(self.state.lock().await.announcements.get(&id).cloned())
    }

    async fn save(&self, announcement: &TimedAnnouncement) -> Result<(), RepositoryError> {
        self.state
            .lock()
            .await
            .announcements
            .insert(announcement.id(), announcement.clone());
        Ok(())
    }

    async fn delete(&self, id: AnnouncementId) -> Result<bool, RepositoryError> {
        Ok(self.state.lock().await.announcements.remove(&id).is_some())
    }
}

#[async_trait]
impl ReviewRepository for InMemoryStore {
    async fn find_by_id(&self, id: ReviewId) -> Result<Option<Review>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.reviews.iter().find(|review| review.id() == id).cloned())
    }

    async fn find_top_level(&self, book_id: BookId) -> Result<Vec<Review>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .reviews
            .iter()
            .filter(|review| review.book_id() == book_id && review.is_top_level())
            .cloned()
            .collect())
    }

    async fn find_replies(&self, parents: &[ReviewId]) -> Result<Vec<Review>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .reviews
            .iter()
            .filter(|review| review.parent().is_some_and(|parent| parents.contains(&parent)))
            .cloned()
            .collect())
    }

    async fn has_top_level(
        &self,
        user_id: UserId,
        book_id: BookId,
    ) -> Result<bool, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.reviews.iter().any(|review| {
            review.user_id() == user_id && review.book_id() == book_id && review.is_top_level()
        }))
    }

    async fn insert(&self, review: &Review) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        let duplicate = review.is_top_level()
            && state.reviews.iter().any(|existing| {
                existing.is_top_level()
                    && existing.user_id() == review.user_id()
                    && existing.book_id() == review.book_id()
            });
        if duplicate {
            return Ok(false);
        }
        state.reviews.push(review.clone());
        Ok(true)
    }

    async fn remove_book_everywhere(&self, book_id: BookId) -> Result<(), RepositoryError> {
        self.state
            .lock()
            .await
            .reviews
            .retain(|review| review.book_id() != book_id);
        Ok(())
    }
}

#[async_trait]
impl StockLedger for InMemoryStore {
    async fn commit_checkout(&self, user_id: UserId, orders: &[Order]) -> Result<(), LedgerError> {
        let mut state = self.state.lock().await;

        // 1件でも足りなければ何も変更しない
        for order in orders {
            let book = state
                .books
                .get(&order.book_id())
                .ok_or(LedgerError::BookNotFound(order.book_id()))?;
            book.ensure_can_supply(order.quantity())?;
            if state.orders.contains_key(&order.key())
                || state
                    .orders
                    .values()
                    .any(|existing| existing.claim_code() == order.claim_code())
            {
                return Err(LedgerError::Repository(RepositoryError::OperationFailed(
                    format!("order {} conflicts with an existing order", order.key()),
                )));
            }
        }

        for order in orders {
            if let Some(book) = state.books.get_mut(&order.book_id()) {
                book.commit(order.quantity())?;
            }
            state.orders.insert(order.key(), order.clone());
        }

        let purchased: Vec<BookId> = orders.iter().map(Order::book_id).collect();
        if let Some(cart) = state.carts.get_mut(&user_id) {
            cart.clear(&purchased);
            if cart.is_empty() {
                state.carts.remove(&user_id);
            }
        }
        Ok(())
    }

    async fn release_cancelled(&self, order: &Order) -> Result<(), LedgerError> {
        let mut state = self.state.lock().await;
        if !state.books.contains_key(&order.book_id()) {
            return Err(LedgerError::BookNotFound(order.book_id()));
        }
        let Some(stored) = state.orders.get_mut(&order.key()) else {
            return Err(LedgerError::Repository(RepositoryError::OperationFailed(
                format!("order {} does not exist", order.key()),
            )));
        };
        // 読み取り後に別のリクエストがキャンセル・受け渡しした場合は在庫を戻さない
        if !stored.is_placed() {
            return Err(LedgerError::OrderNotPlaced(order.key()));
        }
        *stored = order.clone();
        if let Some(book) = state.books.get_mut(&order.book_id()) {
            book.release(order.quantity());
        }
        Ok(())
    }

    async fn adjust_stock(&self, book_id: BookId, delta: i64) -> Result<u32, LedgerError> {
        let mut state = self.state.lock().await;
        let book = state
            .books
            .get_mut(&book_id)
            .ok_or(LedgerError::BookNotFound(book_id))?;
        Ok(book.adjust(delta)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{CartEntry, Money};
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    fn book(title: &str, stock: u32) -> Book {
        Book::new(
            BookId::new(),
            title.to_string(),
            "Author".to_string(),
            Money::usd(Decimal::TEN),
            stock,
        )
        .unwrap()
    }

    fn order_for(user_id: UserId, book: &Book, quantity: u32) -> Order {
        Order::place(
            OrderKey::new(user_id, book.id(), Utc::now()),
            "Reader".to_string(),
            quantity,
            Money::usd(Decimal::TEN),
            ClaimCode::generate(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_commit_checkout_is_all_or_nothing() {
        let store = InMemoryStore::new();
        let plenty = book("Plenty", 5);
        let scarce = book("Scarce", 1);
        BookCatalog::save(&store, &plenty).await.unwrap();
        BookCatalog::save(&store, &scarce).await.unwrap();
        let user = UserId::new();

        let orders = vec![order_for(user, &plenty, 2), order_for(user, &scarce, 2)];
        let result = store.commit_checkout(user, &orders).await;

        assert!(matches!(
            result,
            Err(LedgerError::InsufficientStock { available: 1, requested: 2, .. })
        ));
        let reloaded = BookCatalog::find_by_id(&store, plenty.id()).await.unwrap().unwrap();
        assert_eq!(reloaded.quantity_on_hand(), 5);
        assert_eq!(store.count_all().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_commit_checkout_clears_purchased_cart_entries() {
        let store = InMemoryStore::new();
        let bought = book("Bought", 5);
        let kept = book("Kept", 5);
        BookCatalog::save(&store, &bought).await.unwrap();
        BookCatalog::save(&store, &kept).await.unwrap();
        let user = UserId::new();
        let cart = Cart::reconstruct(
            user,
            vec![
                CartEntry::reconstruct(bought.id(), 2),
                CartEntry::reconstruct(kept.id(), 1),
            ],
        );
        CartRepository::save(&store, &cart).await.unwrap();

        store
            .commit_checkout(user, &[order_for(user, &bought, 2)])
            .await
            .unwrap();

        let cart = CartRepository::find_by_user(&store, user).await.unwrap();
        assert_eq!(cart.quantity_of(bought.id()), 0);
        assert_eq!(cart.quantity_of(kept.id()), 1);
        let reloaded = BookCatalog::find_by_id(&store, bought.id()).await.unwrap().unwrap();
        assert_eq!(reloaded.quantity_on_hand(), 3);
    }

    #[tokio::test]
    async fn test_release_cancelled_restores_stock() {
        let store = InMemoryStore::new();
        let title = book("Title", 4);
        BookCatalog::save(&store, &title).await.unwrap();
        let user = UserId::new();
        let mut order = order_for(user, &title, 3);
        store.commit_checkout(user, &[order.clone()]).await.unwrap();

        order.cancel(Utc::now() + Duration::minutes(5)).unwrap();
        store.release_cancelled(&order).await.unwrap();

        let reloaded = BookCatalog::find_by_id(&store, title.id()).await.unwrap().unwrap();
        assert_eq!(reloaded.quantity_on_hand(), 4);
        assert_eq!(store.count_outstanding(user).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_release_only_applies_once() {
        let store = InMemoryStore::new();
        let title = book("Title", 4);
        BookCatalog::save(&store, &title).await.unwrap();
        let user = UserId::new();
        let mut order = order_for(user, &title, 3);
        store.commit_checkout(user, &[order.clone()]).await.unwrap();

        order.cancel(Utc::now() + Duration::minutes(5)).unwrap();
        store.release_cancelled(&order).await.unwrap();
        let again = store.release_cancelled(&order).await;

        assert!(matches!(again, Err(LedgerError::OrderNotPlaced(_))));
        let reloaded = BookCatalog::find_by_id(&store, title.id()).await.unwrap().unwrap();
        assert_eq!(reloaded.quantity_on_hand(), 4);
    }

    #[tokio::test]
    async fn test_mark_fulfilled_requires_placed_order() {
        let store = InMemoryStore::new();
        let title = book("Title", 4);
        BookCatalog::save(&store, &title).await.unwrap();
        let user = UserId::new();
        let placed = order_for(user, &title, 1);
        store.commit_checkout(user, &[placed.clone()]).await.unwrap();

        let mut cancelled = placed.clone();
        cancelled.cancel(Utc::now() + Duration::minutes(5)).unwrap();
        store.release_cancelled(&cancelled).await.unwrap();

        let mut fulfilled = placed;
        fulfilled.fulfill(user, Utc::now() + Duration::minutes(6)).unwrap();
        assert!(!store.mark_fulfilled(&fulfilled).await.unwrap());

        let stored = OrderRepository::find_by_key(&store, &fulfilled.key())
            .await
            .unwrap()
            .unwrap();
        assert!(stored.is_cancelled());
        assert!(!stored.is_fulfilled());
    }

    #[tokio::test]
    async fn test_second_top_level_review_is_not_inserted() {
        let store = InMemoryStore::new();
        let user = UserId::new();
        let book_id = BookId::new();
        let make = |comment: &str| {
            Review::top_level(
                book_id,
                user,
                "Reader".to_string(),
                4,
                comment.to_string(),
                Utc::now(),
            )
            .unwrap()
        };
        let first = make("first");

        assert!(store.insert(&first).await.unwrap());
        assert!(!store.insert(&make("second")).await.unwrap());

        let reply =
            Review::reply_to(&first, user, "Reader".to_string(), "more".to_string(), Utc::now())
                .unwrap();
        assert!(store.insert(&reply).await.unwrap());
        assert_eq!(store.find_top_level(book_id).await.unwrap().len(), 1);
        assert_eq!(store.find_replies(&[first.id()]).await.unwrap(), vec![reply]);
    }

    #[tokio::test]
    async fn test_adjust_stock_rejects_negative_result() {
        let store = InMemoryStore::new();
        let title = book("Title", 2);
        BookCatalog::save(&store, &title).await.unwrap();

        assert_eq!(store.adjust_stock(title.id(), 3).await.unwrap(), 5);
        assert!(matches!(
            store.adjust_stock(title.id(), -6).await,
            Err(LedgerError::InsufficientStock { available: 5, .. })
        ));
        assert!(matches!(
            store.adjust_stock(BookId::new(), 1).await,
            Err(LedgerError::BookNotFound(_))
        ));
    }
}

use crate::adapter::database_error::DatabaseError;
use crate::adapter::driven::mysql_catalog_repository::{book_id_column, fetch_failed};
use crate::domain::model::{BookId, Cart, CartEntry, UserId};
use crate::domain::port::{CartRepository, RepositoryError, WishlistRepository};
use async_trait::async_trait;
use sqlx::{MySql, Pool, Row};

/// MySQLカートリポジトリ
/// カートとほしい物リストを、ユーザーと書籍の組を主キーとする行として永続化する
#[derive(Clone)]
pub struct MySqlCartRepository {
    pool: Pool<MySql>,
}

impl MySqlCartRepository {
    /// 新しいMySQLカートリポジトリを作成
    ///
    /// # Arguments
    /// * `pool` - MySQLコネクションプール
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CartRepository for MySqlCartRepository {
    async fn find_by_user(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        let rows = sqlx::query(
            "SELECT book_id, quantity FROM cart_items WHERE user_id = ? ORDER BY position ASC",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_sqlx("カートの取得に失敗しました", e))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            let quantity: u32 = row
                .try_get("quantity")
                .map_err(|e| fetch_failed("quantity", e))?;
            entries.push(CartEntry::reconstruct(book_id_column(row, "book_id")?, quantity));
        }
        Ok(Cart::reconstruct(user_id, entries))
    }

    async fn save(&self, cart: &Cart) -> Result<(), RepositoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DatabaseError::from_sqlx("トランザクション開始に失敗しました", e))?;

        sqlx::query("DELETE FROM cart_items WHERE user_id = ?")
            .bind(cart.user_id().to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| DatabaseError::from_sqlx("カートの削除に失敗しました", e))?;

        for (position, entry) in cart.entries().iter().enumerate() {
            sqlx::query(
                "INSERT INTO cart_items (user_id, book_id, quantity, position) VALUES (?, ?, ?, ?)",
            )
            .bind(cart.user_id().to_string())
            .bind(entry.book_id().to_string())
            .bind(entry.quantity())
            .bind(position as u32)
            .execute(&mut *tx)
            .await
            .map_err(|e| DatabaseError::from_sqlx("カート行の保存に失敗しました", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::from_sqlx("コミットに失敗しました", e))?;
        Ok(())
    }

    async fn remove_book_everywhere(&self, book_id: BookId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM cart_items WHERE book_id = ?")
            .bind(book_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("カート行の削除に失敗しました", e))?;
        Ok(())
    }
}

#[async_trait]
impl WishlistRepository for MySqlCartRepository {
    async fn contains(&self, user_id: UserId, book_id: BookId) -> Result<bool, RepositoryError> {
        let row = sqlx::query("SELECT 1 FROM wishlist_items WHERE user_id = ? AND book_id = ?")
            .bind(user_id.to_string())
            .bind(book_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("ほしい物リストの取得に失敗しました", e))?;
        Ok(row.is_some())
    }

    async fn add(&self, user_id: UserId, book_id: BookId) -> Result<(), RepositoryError> {
        sqlx::query("INSERT IGNORE INTO wishlist_items (user_id, book_id) VALUES (?, ?)")
            .bind(user_id.to_string())
            .bind(book_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("ほしい物リストへの追加に失敗しました", e))?;
        Ok(())
    }

    async fn remove(&self, user_id: UserId, book_id: BookId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM wishlist_items WHERE user_id = ? AND book_id = ?")
            .bind(user_id.to_string())
            .bind(book_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("ほしい物リストからの削除に失敗しました", e))?;
        Ok(())
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<BookId>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT book_id FROM wishlist_items WHERE user_id = ? ORDER BY added_at ASC",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_sqlx("ほしい物リストの取得に失敗しました", e))?;

        rows.iter().map(|row| book_id_column(row, "book_id")).collect()
    }

    async fn remove_book_everywhere(&self, book_id: BookId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM wishlist_items WHERE book_id = ?")
            .bind(book_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("ほしい物リストの削除に失敗しました", e))?;
        Ok(())
    }
}

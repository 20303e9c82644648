use crate::adapter::database_error::DatabaseError;
use crate::domain::model::{Book, BookId, DiscountPeriod, DiscountRate, Money};
use crate::domain::port::{BookCatalog, DiscountRepository, RepositoryError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::mysql::MySqlRow;
use sqlx::{MySql, Pool, Row};
use uuid::Uuid;

/// `IN (?, ?, ...)` のプレースホルダー
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// 行の列の読み取りに失敗した場合のエラー
pub(crate) fn fetch_failed(column: &str, e: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::FetchFailed(format!("{}の読み取りに失敗しました: {}", column, e))
}

pub(crate) fn book_id_column(row: &MySqlRow, column: &str) -> Result<BookId, RepositoryError> {
    let raw: String = row.try_get(column).map_err(|e| fetch_failed(column, e))?;
    BookId::from_string(&raw).map_err(|e| fetch_failed(column, e))
}

fn book_from_row(row: &MySqlRow) -> Result<Book, RepositoryError> {
    Ok(Book::reconstruct(
        book_id_column(row, "id")?,
        row.try_get("title").map_err(|e| fetch_failed("title", e))?,
        row.try_get("author").map_err(|e| fetch_failed("author", e))?,
        Money::usd(row.try_get::<Decimal, _>("price").map_err(|e| fetch_failed("price", e))?),
        row.try_get("quantity_on_hand")
            .map_err(|e| fetch_failed("quantity_on_hand", e))?,
    ))
}

fn discount_from_row(row: &MySqlRow) -> Result<DiscountPeriod, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| fetch_failed("id", e))?;
    let rate: Decimal = row.try_get("rate").map_err(|e| fetch_failed("rate", e))?;
    Ok(DiscountPeriod::reconstruct(
        Uuid::parse_str(&id).map_err(|e| fetch_failed("id", e))?,
        book_id_column(row, "book_id")?,
        DiscountRate::new(rate).map_err(|e| fetch_failed("rate", e))?,
        row.try_get::<DateTime<Utc>, _>("starts_at")
            .map_err(|e| fetch_failed("starts_at", e))?,
        row.try_get::<DateTime<Utc>, _>("expires_at")
            .map_err(|e| fetch_failed("expires_at", e))?,
        row.try_get("on_sale").map_err(|e| fetch_failed("on_sale", e))?,
    ))
}

const BOOK_COLUMNS: &str = "id, title, author, price, quantity_on_hand";

/// MySQL書籍カタログ
/// 書籍と期間割引を永続化する
#[derive(Clone)]
pub struct MySqlCatalogRepository {
    pool: Pool<MySql>,
}

impl MySqlCatalogRepository {
    /// 新しいMySQL書籍カタログを作成
    ///
    /// # Arguments
    /// * `pool` - MySQLコネクションプール
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookCatalog for MySqlCatalogRepository {
    async fn find_by_id(&self, book_id: BookId) -> Result<Option<Book>, RepositoryError> {
        let sql = format!("SELECT {} FROM books WHERE id = ?", BOOK_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(book_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("書籍の取得に失敗しました", e))?;

        row.as_ref().map(book_from_row).transpose()
    }

    async fn find_by_ids(&self, book_ids: &[BookId]) -> Result<Vec<Book>, RepositoryError> {
        if book_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM books WHERE id IN ({})",
            BOOK_COLUMNS,
            placeholders(book_ids.len())
        );
        let mut query = sqlx::query(&sql);
        for book_id in book_ids {
            query = query.bind(book_id.to_string());
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("書籍の取得に失敗しました", e))?;

        rows.iter().map(book_from_row).collect()
    }

    async fn find_all(&self) -> Result<Vec<Book>, RepositoryError> {
        let sql = format!("SELECT {} FROM books ORDER BY title ASC", BOOK_COLUMNS);
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("書籍一覧の取得に失敗しました", e))?;

        rows.iter().map(book_from_row).collect()
    }

    async fn save(&self, book: &Book) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO books (id, title, author, price, quantity_on_hand)
            VALUES (?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                title = VALUES(title),
                author = VALUES(author),
                price = VALUES(price),
                quantity_on_hand = VALUES(quantity_on_hand)
            "#,
        )
        .bind(book.id().to_string())
        .bind(book.title())
        .bind(book.author())
        .bind(book.price().rounded().amount())
        .bind(book.quantity_on_hand())
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_sqlx("書籍の保存に失敗しました", e))?;

        Ok(())
    }

    async fn delete(&self, book_id: BookId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM books WHERE id = ?")
            .bind(book_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("書籍の削除に失敗しました", e))?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl DiscountRepository for MySqlCatalogRepository {
    async fn find_for_books(
        &self,
        book_ids: &[BookId],
    ) -> Result<Vec<DiscountPeriod>, RepositoryError> {
        if book_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT id, book_id, rate, starts_at, expires_at, on_sale \
             FROM discount_periods WHERE book_id IN ({})",
            placeholders(book_ids.len())
        );
        let mut query = sqlx::query(&sql);
        for book_id in book_ids {
            query = query.bind(book_id.to_string());
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("割引期間の取得に失敗しました", e))?;

        rows.iter().map(discount_from_row).collect()
    }

    async fn upsert(&self, period: &DiscountPeriod) -> Result<(), RepositoryError> {
        // book_id の一意制約により1冊1件に保たれる
        sqlx::query(
            r#"
            INSERT INTO discount_periods (id, book_id, rate, starts_at, expires_at, on_sale)
            VALUES (?, ?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                rate = VALUES(rate),
                starts_at = VALUES(starts_at),
                expires_at = VALUES(expires_at),
                on_sale = VALUES(on_sale)
            "#,
        )
        .bind(period.id().to_string())
        .bind(period.book_id().to_string())
        .bind(period.rate().value())
        .bind(period.starts_at())
        .bind(period.expires_at())
        .bind(period.is_on_sale())
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_sqlx("割引期間の保存に失敗しました", e))?;

        Ok(())
    }

    async fn delete_by_book(&self, book_id: BookId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM discount_periods WHERE book_id = ?")
            .bind(book_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("割引期間の削除に失敗しました", e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?, ?, ?");
    }
}

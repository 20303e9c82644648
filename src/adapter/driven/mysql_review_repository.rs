use crate::adapter::database_error::DatabaseError;
use crate::adapter::driven::mysql_catalog_repository::{book_id_column, fetch_failed, placeholders};
use crate::domain::model::{BookId, Review, ReviewId, UserId};
use crate::domain::port::{RepositoryError, ReviewRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySql, Pool, Row};

const REVIEW_COLUMNS: &str =
    "id, book_id, user_id, author_name, parent_id, rating, comment, reviewed_at";

fn review_id_column(row: &MySqlRow, column: &str) -> Result<Option<ReviewId>, RepositoryError> {
    let raw: Option<String> = row.try_get(column).map_err(|e| fetch_failed(column, e))?;
    raw.map(|raw| ReviewId::from_string(&raw).map_err(|e| fetch_failed(column, e)))
        .transpose()
}

fn review_from_row(row: &MySqlRow) -> Result<Review, RepositoryError> {
    let user_id: String = row.try_get("user_id").map_err(|e| fetch_failed("user_id", e))?;
    let id = review_id_column(row, "id")?
        .ok_or_else(|| fetch_failed("id", "NULL"))?;
    Ok(Review::reconstruct(
        id,
        book_id_column(row, "book_id")?,
        UserId::from_string(&user_id).map_err(|e| fetch_failed("user_id", e))?,
        row.try_get("author_name")
            .map_err(|e| fetch_failed("author_name", e))?,
        review_id_column(row, "parent_id")?,
        row.try_get::<Option<u8>, _>("rating")
            .map_err(|e| fetch_failed("rating", e))?,
        row.try_get("comment").map_err(|e| fetch_failed("comment", e))?,
        row.try_get::<DateTime<Utc>, _>("reviewed_at")
            .map_err(|e| fetch_failed("reviewed_at", e))?,
    ))
}

/// MySQLレビューリポジトリ
/// 1人1冊1件のレビュー本体は生成列 `top_level` の一意制約で保証する
#[derive(Clone)]
pub struct MySqlReviewRepository {
    pool: Pool<MySql>,
}

impl MySqlReviewRepository {
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReviewRepository for MySqlReviewRepository {
    async fn find_by_id(&self, id: ReviewId) -> Result<Option<Review>, RepositoryError> {
        let sql = format!("SELECT {} FROM reviews WHERE id = ?", REVIEW_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("レビューの取得に失敗しました", e))?;

        row.as_ref().map(review_from_row).transpose()
    }

    async fn find_top_level(&self, book_id: BookId) -> Result<Vec<Review>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM reviews WHERE book_id = ? AND parent_id IS NULL \
             ORDER BY reviewed_at DESC",
            REVIEW_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(book_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("レビュー一覧の取得に失敗しました", e))?;

        rows.iter().map(review_from_row).collect()
    }

    async fn find_replies(&self, parents: &[ReviewId]) -> Result<Vec<Review>, RepositoryError> {
        if parents.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM reviews WHERE parent_id IN ({}) ORDER BY reviewed_at ASC",
            REVIEW_COLUMNS,
            placeholders(parents.len())
        );
        let mut query = sqlx::query(&sql);
        for parent in parents {
            query = query.bind(parent.to_string());
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("返信の取得に失敗しました", e))?;

        rows.iter().map(review_from_row).collect()
    }

    async fn has_top_level(
        &self,
        user_id: UserId,
        book_id: BookId,
    ) -> Result<bool, RepositoryError> {
        let row = sqlx::query(
            "SELECT 1 FROM reviews WHERE user_id = ? AND book_id = ? AND parent_id IS NULL LIMIT 1",
        )
        .bind(user_id.to_string())
        .bind(book_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_sqlx("レビューの確認に失敗しました", e))?;
        Ok(row.is_some())
    }

    async fn insert(&self, review: &Review) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO reviews
                (id, book_id, user_id, author_name, parent_id, rating, comment, reviewed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(review.id().to_string())
        .bind(review.book_id().to_string())
        .bind(review.user_id().to_string())
        .bind(review.author_name())
        .bind(review.parent().map(|parent| parent.to_string()))
        .bind(review.rating())
        .bind(review.comment())
        .bind(review.reviewed_at())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(false),
            Err(e) => Err(DatabaseError::from_sqlx("レビューの登録に失敗しました", e).into()),
        }
    }

    async fn remove_book_everywhere(&self, book_id: BookId) -> Result<(), RepositoryError> {
        // 返信は親の削除に連鎖する
        sqlx::query("DELETE FROM reviews WHERE book_id = ? AND parent_id IS NOT NULL")
            .bind(book_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("返信の削除に失敗しました", e))?;
        sqlx::query("DELETE FROM reviews WHERE book_id = ?")
            .bind(book_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("レビューの削除に失敗しました", e))?;

        Ok(())
    }
}

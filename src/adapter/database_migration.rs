use crate::adapter::database_error::DatabaseError;
use sqlx::{MySql, Pool};

/// マイグレーションファイル（適用順）
const MIGRATIONS: [(&str, &str); 7] = [
    (
        "001_create_books_table",
        include_str!("../../migrations/001_create_books_table.sql"),
    ),
    (
        "002_create_discount_periods_table",
        include_str!("../../migrations/002_create_discount_periods_table.sql"),
    ),
    (
        "003_create_cart_items_table",
        include_str!("../../migrations/003_create_cart_items_table.sql"),
    ),
    (
        "004_create_wishlist_items_table",
        include_str!("../../migrations/004_create_wishlist_items_table.sql"),
    ),
    (
        "005_create_orders_table",
        include_str!("../../migrations/005_create_orders_table.sql"),
    ),
    (
        "006_create_announcements_table",
        include_str!("../../migrations/006_create_announcements_table.sql"),
    ),
    (
        "007_create_reviews_table",
        include_str!("../../migrations/007_create_reviews_table.sql"),
    ),
];

/// データベースマイグレーションを管理する構造体
pub struct DatabaseMigration {
    pool: Pool<MySql>,
}

impl DatabaseMigration {
    /// 新しいDatabaseMigrationインスタンスを作成
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }

    /// マイグレーションを実行
    /// べき等性を保証（CREATE TABLE IF NOT EXISTS）
    pub async fn run(&self) -> Result<(), DatabaseError> {
        for (name, migration_sql) in MIGRATIONS {
            tracing::info!(migration = name, "Running migration");
            sqlx::query(migration_sql)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    DatabaseError::MigrationError(format!("Migration {} failed: {}", name, e))
                })?;
        }

        tracing::info!(count = MIGRATIONS.len(), "All migrations completed successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent_and_ordered() {
        let names: Vec<&str> = MIGRATIONS.iter().map(|(name, _)| *name).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);

        for (name, sql) in MIGRATIONS {
            assert!(
                sql.contains("CREATE TABLE IF NOT EXISTS"),
                "{} must be idempotent",
                name
            );
        }
    }

    #[test]
    fn test_orders_table_enforces_unique_claim_codes() {
        let (_, orders) = MIGRATIONS[4];
        assert!(orders.contains("PRIMARY KEY (user_id, book_id, ordered_at)"));
        assert!(orders.contains("UNIQUE KEY uq_orders_claim_code (claim_code)"));
    }

    #[test]
    fn test_reviews_table_allows_one_top_level_review_per_reader() {
        let (_, reviews) = MIGRATIONS[6];
        assert!(reviews.contains("UNIQUE KEY uq_reviews_one_per_reader (book_id, user_id, top_level)"));
        assert!(reviews.contains("IF(parent_id IS NULL, 1, NULL)"));
    }
}

use crate::adapter::database_error::DatabaseError;
use crate::adapter::driven::mysql_catalog_repository::{book_id_column, fetch_failed, placeholders};
use crate::domain::model::{
    BookId, ClaimCode, Money, Order, OrderKey, OrderStatus, UserId,
};
use crate::domain::port::{LedgerError, OrderRepository, RepositoryError, StockLedger};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::mysql::MySqlRow;
use sqlx::{MySql, Pool, Row, Transaction};

const ORDER_COLUMNS: &str = "user_id, book_id, ordered_at, customer_name, quantity, total_price, \
                             claim_code, status, cancelled_at, fulfilled_at";

fn order_from_row(row: &MySqlRow) -> Result<Order, RepositoryError> {
    let user_id: String = row.try_get("user_id").map_err(|e| fetch_failed("user_id", e))?;
    let user_id = UserId::from_string(&user_id).map_err(|e| fetch_failed("user_id", e))?;
    let ordered_at: DateTime<Utc> = row
        .try_get("ordered_at")
        .map_err(|e| fetch_failed("ordered_at", e))?;
    let claim_code: String = row
        .try_get("claim_code")
        .map_err(|e| fetch_failed("claim_code", e))?;
    let status: String = row.try_get("status").map_err(|e| fetch_failed("status", e))?;
    let total_price: Decimal = row
        .try_get("total_price")
        .map_err(|e| fetch_failed("total_price", e))?;

    Ok(Order::reconstruct(
        OrderKey::new(user_id, book_id_column(row, "book_id")?, ordered_at),
        row.try_get("customer_name")
            .map_err(|e| fetch_failed("customer_name", e))?,
        row.try_get("quantity").map_err(|e| fetch_failed("quantity", e))?,
        Money::usd(total_price),
        ClaimCode::parse(&claim_code).map_err(|e| fetch_failed("claim_code", e))?,
        OrderStatus::from_string(&status).map_err(|e| fetch_failed("status", e))?,
        row.try_get("cancelled_at")
            .map_err(|e| fetch_failed("cancelled_at", e))?,
        row.try_get("fulfilled_at")
            .map_err(|e| fetch_failed("fulfilled_at", e))?,
    ))
}

/// MySQL注文リポジトリ
/// 注文の永続化と、在庫・カートを伴う台帳操作をトランザクションで行う
#[derive(Clone)]
pub struct MySqlOrderRepository {
    pool: Pool<MySql>,
}

impl MySqlOrderRepository {
    /// 新しいMySQL注文リポジトリを作成
    ///
    /// # Arguments
    /// * `pool` - MySQLコネクションプール
    ///
    /// # Returns
    /// * MySqlOrderRepositoryのインスタンス
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> Result<Transaction<'static, MySql>, DatabaseError> {
        self.pool
            .begin()
            .await
            .map_err(|e| DatabaseError::from_sqlx("トランザクション開始に失敗しました", e))
    }

    /// 比較付きで在庫を減らす。足りなければ現在の在庫数を添えて失敗する
    async fn take_stock(
        tx: &mut Transaction<'static, MySql>,
        book_id: BookId,
        quantity: u32,
    ) -> Result<(), LedgerError> {
        let result = sqlx::query(
            "UPDATE books SET quantity_on_hand = quantity_on_hand - ? \
             WHERE id = ? AND quantity_on_hand >= ?",
        )
        .bind(quantity)
        .bind(book_id.to_string())
        .bind(quantity)
        .execute(&mut **tx)
        .await
        .map_err(|e| DatabaseError::from_sqlx("在庫の引き当てに失敗しました", e))?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        match Self::current_stock(tx, book_id).await? {
            Some(available) => Err(LedgerError::InsufficientStock {
                book_id,
                available,
                requested: quantity,
            }),
            None => Err(LedgerError::BookNotFound(book_id)),
        }
    }

    async fn current_stock(
        tx: &mut Transaction<'static, MySql>,
        book_id: BookId,
    ) -> Result<Option<u32>, LedgerError> {
        let row = sqlx::query("SELECT quantity_on_hand FROM books WHERE id = ? FOR UPDATE")
            .bind(book_id.to_string())
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| DatabaseError::from_sqlx("在庫の取得に失敗しました", e))?;

        match row {
            Some(row) => Ok(Some(
                row.try_get::<u32, _>("quantity_on_hand")
                    .map_err(|e| fetch_failed("quantity_on_hand", e))?,
            )),
            None => Ok(None),
        }
    }

    /// 受け取り待ちの注文だけを新しい状態に書き換える
    ///
    /// # Returns
    /// 更新した行数（既に終端状態なら0）
    async fn transition_from_placed<'e, E>(executor: E, order: &Order) -> Result<u64, DatabaseError>
    where
        E: sqlx::Executor<'e, Database = MySql>,
    {
        let key = order.key();
        let result = sqlx::query(
            "UPDATE orders SET status = ?, cancelled_at = ?, fulfilled_at = ? \
             WHERE user_id = ? AND book_id = ? AND ordered_at = ? \
             AND status = ? AND cancelled_at IS NULL AND fulfilled_at IS NULL",
        )
        .bind(order.status().to_string())
        .bind(order.cancelled_at())
        .bind(order.fulfilled_at())
        .bind(key.user_id().to_string())
        .bind(key.book_id().to_string())
        .bind(key.ordered_at())
        .bind(OrderStatus::Placed.to_string())
        .execute(executor)
        .await
        .map_err(|e| DatabaseError::from_sqlx("注文の更新に失敗しました", e))?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl OrderRepository for MySqlOrderRepository {
    async fn find_by_key(&self, key: &OrderKey) -> Result<Option<Order>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM orders WHERE user_id = ? AND book_id = ? AND ordered_at = ?",
            ORDER_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(key.user_id().to_string())
            .bind(key.book_id().to_string())
            .bind(key.ordered_at())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("注文の取得に失敗しました", e))?;

        row.as_ref().map(order_from_row).transpose()
    }

    async fn find_by_claim_code(
        &self,
        code: &ClaimCode,
    ) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {} FROM orders WHERE claim_code = ?", ORDER_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("注文の取得に失敗しました", e))?;

        row.as_ref().map(order_from_row).transpose()
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM orders WHERE user_id = ? ORDER BY ordered_at DESC",
            ORDER_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("注文一覧の取得に失敗しました", e))?;

        rows.iter().map(order_from_row).collect()
    }

    async fn count_outstanding(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM orders WHERE user_id = ? AND status = ?",
        )
        .bind(user_id.to_string())
        .bind(OrderStatus::Placed.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_sqlx("注文数の取得に失敗しました", e))?;
        Ok(count.max(0) as u64)
    }

    async fn count_all(&self) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("注文数の取得に失敗しました", e))?;
        Ok(count.max(0) as u64)
    }

    async fn claim_code_exists(&self, code: &ClaimCode) -> Result<bool, RepositoryError> {
        let row = sqlx::query("SELECT 1 FROM orders WHERE claim_code = ?")
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("引換コードの確認に失敗しました", e))?;
        Ok(row.is_some())
    }

    async fn mark_fulfilled(&self, order: &Order) -> Result<bool, RepositoryError> {
        Ok(Self::transition_from_placed(&self.pool, order).await? == 1)
    }

    async fn delete(&self, key: &OrderKey) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM orders WHERE user_id = ? AND book_id = ? AND ordered_at = ?")
                .bind(key.user_id().to_string())
                .bind(key.book_id().to_string())
                .bind(key.ordered_at())
                .execute(&self.pool)
                .await
                .map_err(|e| DatabaseError::from_sqlx("注文の削除に失敗しました", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn exists_for_book(&self, book_id: BookId) -> Result<bool, RepositoryError> {
        let row = sqlx::query("SELECT 1 FROM orders WHERE book_id = ? LIMIT 1")
            .bind(book_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("注文の確認に失敗しました", e))?;
        Ok(row.is_some())
    }

    async fn has_purchased(
        &self,
        user_id: UserId,
        book_id: BookId,
    ) -> Result<bool, RepositoryError> {
        let row = sqlx::query(
            "SELECT 1 FROM orders WHERE user_id = ? AND book_id = ? AND cancelled_at IS NULL LIMIT 1",
        )
        .bind(user_id.to_string())
        .bind(book_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_sqlx("購入履歴の確認に失敗しました", e))?;
        Ok(row.is_some())
    }
}

#[async_trait]
impl StockLedger for MySqlOrderRepository {
    async fn commit_checkout(&self, user_id: UserId, orders: &[Order]) -> Result<(), LedgerError> {
        // エラーで抜けた場合、トランザクションは破棄時にロールバックされる
        let mut tx = self.begin().await?;

        for order in orders {
            Self::take_stock(&mut tx, order.book_id(), order.quantity()).await?;

            let key = order.key();
            sqlx::query(
                r#"
                INSERT INTO orders
                    (user_id, book_id, ordered_at, customer_name, quantity, total_price,
                     claim_code, status, cancelled_at, fulfilled_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, NULL, NULL)
                "#,
            )
            .bind(key.user_id().to_string())
            .bind(key.book_id().to_string())
            .bind(key.ordered_at())
            .bind(order.customer_name())
            .bind(order.quantity())
            .bind(order.total_price().amount())
            .bind(order.claim_code().as_str())
            .bind(order.status().to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| DatabaseError::from_sqlx("注文の登録に失敗しました", e))?;
        }

        if !orders.is_empty() {
            let sql = format!(
                "DELETE FROM cart_items WHERE user_id = ? AND book_id IN ({})",
                placeholders(orders.len())
            );
            let mut query = sqlx::query(&sql).bind(user_id.to_string());
            for order in orders {
                query = query.bind(order.book_id().to_string());
            }
            query
                .execute(&mut *tx)
                .await
                .map_err(|e| DatabaseError::from_sqlx("カート行の削除に失敗しました", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::from_sqlx("コミットに失敗しました", e))?;
        Ok(())
    }

    async fn release_cancelled(&self, order: &Order) -> Result<(), LedgerError> {
        let mut tx = self.begin().await?;

        // 別のリクエストが先にキャンセル・受け渡しした場合は在庫に触れない
        if Self::transition_from_placed(&mut *tx, order).await? == 0 {
            return Err(LedgerError::OrderNotPlaced(order.key()));
        }

        let result =
            sqlx::query("UPDATE books SET quantity_on_hand = quantity_on_hand + ? WHERE id = ?")
                .bind(order.quantity())
                .bind(order.book_id().to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| DatabaseError::from_sqlx("在庫の戻し入れに失敗しました", e))?;
        if result.rows_affected() == 0 {
            return Err(LedgerError::BookNotFound(order.book_id()));
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::from_sqlx("コミットに失敗しました", e))?;
        Ok(())
    }

    async fn adjust_stock(&self, book_id: BookId, delta: i64) -> Result<u32, LedgerError> {
        let mut tx = self.begin().await?;

        let current = Self::current_stock(&mut tx, book_id)
            .await?
            .ok_or(LedgerError::BookNotFound(book_id))?;
        let next = i64::from(current) + delta;
        if next < 0 {
            return Err(LedgerError::InsufficientStock {
                book_id,
                available: current,
                requested: u32::try_from(delta.unsigned_abs()).unwrap_or(u32::MAX),
            });
        }
        let next = u32::try_from(next).map_err(|_| {
            RepositoryError::OperationFailed("stock level exceeds the supported maximum".to_string())
        })?;

        sqlx::query("UPDATE books SET quantity_on_hand = ? WHERE id = ?")
            .bind(next)
            .bind(book_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| DatabaseError::from_sqlx("在庫の更新に失敗しました", e))?;

        tx.commit()
            .await
            .map_err(|e| DatabaseError::from_sqlx("コミットに失敗しました", e))?;
        Ok(next)
    }
}

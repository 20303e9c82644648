use crate::application::service::ServiceDependencies;
use crate::application::{Actor, ApplicationError, Role};
use crate::domain::event::{DomainEvent, OrderCancelled, OrderCountChanged, OrderDeleted};
use crate::domain::model::{Order, OrderKey};
use std::collections::HashMap;
use uuid::Uuid;

/// 単一キャンセルの結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// キャンセルして在庫を戻した
    Cancelled,
    /// 既に終端状態だったため削除した
    Deleted,
}

/// 一括操作で処理しなかった入力
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub entry: String,
    pub reason: String,
}

/// 一括操作の結果
/// 各入力は独立に検証・処理され、1件の失敗が他に影響することはない
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    /// 要求された操作（キャンセルまたは削除）が成功した件数
    pub processed: usize,
    /// 削除した件数（一括キャンセルでは終端状態だったため削除に回した件数）
    pub deleted: usize,
    pub skipped: Vec<SkippedEntry>,
}

impl BulkOutcome {
    fn skip(&mut self, entry: &str, reason: impl Into<String>) {
        self.skipped.push(SkippedEntry {
            entry: entry.to_string(),
            reason: reason.into(),
        });
    }

    fn changed(&self) -> bool {
        self.processed > 0 || self.deleted > 0
    }
}

/// 注文アプリケーションサービス
/// 利用者自身の注文の一覧・キャンセル・削除を扱う
pub struct OrderApplicationService {
    deps: ServiceDependencies,
}

impl OrderApplicationService {
    pub fn new(deps: ServiceDependencies) -> Self {
        Self { deps }
    }

    /// 呼び出し元の注文を注文日時の新しい順に取得する
    pub async fn my_orders(&self, actor: &Actor) -> Result<Vec<Order>, ApplicationError> {
        actor.require_any(&[Role::User, Role::Member])?;
        Ok(self.deps.orders.find_by_user(actor.user_id).await?)
    }

    /// 受け取り待ちの注文数
    pub async fn outstanding_count(&self, actor: &Actor) -> Result<u64, ApplicationError> {
        Ok(self.deps.orders.count_outstanding(actor.user_id).await?)
    }

    /// 注文をキャンセルする
    /// 既にキャンセル済み・受け取り済みの注文は削除に回す
    ///
    /// # Returns
    /// * `Ok(CancelOutcome)` - キャンセルまたは削除した
    /// * `Err(ApplicationError::Unauthorized)` - 他人の注文
    /// * `Err(ApplicationError::NotFound)` - 注文が存在しない
    /// * `Err(ApplicationError::Conflict)` - キャンセル期限を過ぎている
    pub async fn cancel(
        &self,
        actor: &Actor,
        key: OrderKey,
    ) -> Result<CancelOutcome, ApplicationError> {
        actor.require_any(&[Role::User, Role::Member])?;
        let correlation_id = self
            .deps
            .begin("OrderService", "Cancelling order", actor.user_id);
        let outcome = self.cancel_one(actor, &key, correlation_id).await?;
        self.publish_order_count(actor, correlation_id).await;
        Ok(outcome)
    }

    /// 注文を削除する（キャンセル済みまたは受け取り済みのみ）
    pub async fn delete(&self, actor: &Actor, key: OrderKey) -> Result<(), ApplicationError> {
        actor.require_any(&[Role::User, Role::Member])?;
        let correlation_id = self
            .deps
            .begin("OrderService", "Deleting order", actor.user_id);
        let order = self.find_owned(actor, &key).await?;
        self.delete_one(&order, correlation_id).await?;
        self.publish_order_count(actor, correlation_id).await;
        Ok(())
    }

    /// 複数の注文をまとめてキャンセルする
    ///
    /// # Arguments
    /// * `entries` - `user|book|timestamp` 形式の注文キー
    pub async fn cancel_many(
        &self,
        actor: &Actor,
        entries: &[String],
    ) -> Result<BulkOutcome, ApplicationError> {
        actor.require_any(&[Role::User, Role::Member])?;
        let correlation_id = self
            .deps
            .begin("OrderService", "Bulk cancelling orders", actor.user_id);
        if entries.is_empty() {
            return Err(ApplicationError::Validation(
                "No orders selected for cancellation.".to_string(),
            ));
        }

        let mut outcome = BulkOutcome::default();
        for entry in entries {
            let key = match OrderKey::parse(entry) {
                Ok(key) => key,
                Err(_) => {
                    self.skip(&mut outcome, entry, "Invalid order format.", correlation_id);
                    continue;
                }
            };
            match self.cancel_one(actor, &key, correlation_id).await {
                Ok(CancelOutcome::Cancelled) => outcome.processed += 1,
                Ok(CancelOutcome::Deleted) => outcome.deleted += 1,
                Err(e) => self.skip(&mut outcome, entry, e.to_string(), correlation_id),
            }
        }

        self.finish_bulk(actor, &outcome, correlation_id).await;
        Ok(outcome)
    }

    /// 複数の注文をまとめて削除する
    pub async fn delete_many(
        &self,
        actor: &Actor,
        entries: &[String],
    ) -> Result<BulkOutcome, ApplicationError> {
        actor.require_any(&[Role::User, Role::Member])?;
        let correlation_id = self
            .deps
            .begin("OrderService", "Bulk deleting orders", actor.user_id);
        if entries.is_empty() {
            return Err(ApplicationError::Validation(
                "No orders selected for deletion.".to_string(),
            ));
        }

        let mut outcome = BulkOutcome::default();
        for entry in entries {
            let key = match OrderKey::parse(entry) {
                Ok(key) => key,
                Err(_) => {
                    self.skip(&mut outcome, entry, "Invalid order format.", correlation_id);
                    continue;
                }
            };
            let result = match self.find_owned(actor, &key).await {
                Ok(order) => self.delete_one(&order, correlation_id).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => {
                    outcome.processed += 1;
                    outcome.deleted += 1;
                }
                Err(e) => self.skip(&mut outcome, entry, e.to_string(), correlation_id),
            }
        }

        self.finish_bulk(actor, &outcome, correlation_id).await;
        Ok(outcome)
    }

    /// 所有者を確認したうえで注文を取得する
    async fn find_owned(&self, actor: &Actor, key: &OrderKey) -> Result<Order, ApplicationError> {
        if key.user_id() != actor.user_id {
            return Err(ApplicationError::Unauthorized(
                "You are not authorized to modify this order.".to_string(),
            ));
        }
        self.deps
            .orders
            .find_by_key(key)
            .await?
            .ok_or_else(|| ApplicationError::NotFound("Order not found.".to_string()))
    }

    async fn cancel_one(
        &self,
        actor: &Actor,
        key: &OrderKey,
        correlation_id: Uuid,
    ) -> Result<CancelOutcome, ApplicationError> {
        let mut order = self.find_owned(actor, key).await?;
        if order.is_terminal() {
            self.delete_one(&order, correlation_id).await?;
            return Ok(CancelOutcome::Deleted);
        }

        let now = self.deps.clock.now();
        order.cancel(now)?;
        self.deps.ledger.release_cancelled(&order).await?;

        let mut context = HashMap::new();
        context.insert("order_key".to_string(), order.key().to_string());
        context.insert("released".to_string(), order.quantity().to_string());
        self.deps.logger.info(
            "OrderService",
            "Order cancelled",
            Some(correlation_id),
            Some(context),
        );
        self.deps
            .publish(DomainEvent::OrderCancelled(OrderCancelled::new(
                correlation_id,
                order.key(),
                order.quantity(),
            )))
            .await;
        Ok(CancelOutcome::Cancelled)
    }

    async fn delete_one(&self, order: &Order, correlation_id: Uuid) -> Result<(), ApplicationError> {
        order.ensure_deletable()?;
        if !self.deps.orders.delete(&order.key()).await? {
            return Err(ApplicationError::NotFound("Order not found.".to_string()));
        }

        let mut context = HashMap::new();
        context.insert("order_key".to_string(), order.key().to_string());
        self.deps.logger.info(
            "OrderService",
            "Order deleted",
            Some(correlation_id),
            Some(context),
        );
        self.deps
            .publish(DomainEvent::OrderDeleted(OrderDeleted::new(
                correlation_id,
                order.key(),
            )))
            .await;
        Ok(())
    }

    fn skip(
        &self,
        outcome: &mut BulkOutcome,
        entry: &str,
        reason: impl Into<String>,
        correlation_id: Uuid,
    ) {
        let reason = reason.into();
        let mut context = HashMap::new();
        context.insert("entry".to_string(), entry.to_string());
        context.insert("reason".to_string(), reason.clone());
        self.deps.logger.warn(
            "OrderService",
            "Skipped bulk entry",
            Some(correlation_id),
            Some(context),
        );
        outcome.skip(entry, reason);
    }

    async fn finish_bulk(&self, actor: &Actor, outcome: &BulkOutcome, correlation_id: Uuid) {
        let mut context = HashMap::new();
        context.insert("processed".to_string(), outcome.processed.to_string());
        context.insert("deleted".to_string(), outcome.deleted.to_string());
        context.insert("skipped".to_string(), outcome.skipped.len().to_string());
        self.deps.logger.info(
            "OrderService",
            "Bulk operation finished",
            Some(correlation_id),
            Some(context),
        );
        if outcome.changed() {
            self.publish_order_count(actor, correlation_id).await;
        }
    }

    async fn publish_order_count(&self, actor: &Actor, correlation_id: Uuid) {
        match self.deps.orders.count_outstanding(actor.user_id).await {
            Ok(outstanding) => {
                self.deps
                    .publish(DomainEvent::OrderCountChanged(OrderCountChanged::new(
                        correlation_id,
                        actor.user_id,
                        outstanding,
                    )))
                    .await
            }
            Err(e) => {
                let mut context = HashMap::new();
                context.insert("error".to_string(), e.to_string());
                self.deps.logger.warn(
                    "OrderService",
                    "Failed to count outstanding orders",
                    Some(correlation_id),
                    Some(context),
                );
            }
        }
    }
}

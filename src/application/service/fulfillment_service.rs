use crate::application::service::ServiceDependencies;
use crate::application::{Actor, ApplicationError, Role};
use crate::domain::event::{DomainEvent, OrderFulfilled};
use crate::domain::model::{ClaimCode, Order, UserId};
use std::collections::HashMap;
use uuid::Uuid;

/// 受け渡し確認画面の内容（状態は変更していない）
#[derive(Debug, Clone, PartialEq)]
pub struct FulfillmentPreview {
    pub order: Order,
    pub book_title: String,
}

/// 店頭受け渡しアプリケーションサービス
/// 引換コードと注文者のユーザーIDの両方が一致した場合のみ受け渡す
///
/// 手順は2段階で、`lookup` が状態を変えずに注文内容を返し、
/// スタッフが確認したうえで `confirm` が受け渡し済みにする
pub struct FulfillmentApplicationService {
    deps: ServiceDependencies,
}

impl FulfillmentApplicationService {
    pub fn new(deps: ServiceDependencies) -> Self {
        Self { deps }
    }

    /// 引換コードで注文を照会する（状態は変更しない）
    ///
    /// # Arguments
    /// * `actor` - スタッフ
    /// * `claim_code` - 提示された引換コード（前後の空白・小文字は正規化する）
    /// * `user_id` - 提示されたユーザーID
    pub async fn lookup(
        &self,
        actor: &Actor,
        claim_code: &str,
        user_id: &str,
    ) -> Result<FulfillmentPreview, ApplicationError> {
        actor.require_any(&[Role::Staff])?;
        let correlation_id = self
            .deps
            .begin("FulfillmentService", "Looking up claim code", actor.user_id);
        let (order, _) = self.find_verified(claim_code, user_id, correlation_id).await?;
        let book_title = self.book_title(&order).await?;
        Ok(FulfillmentPreview { order, book_title })
    }

    /// 受け渡しを確定する
    /// 照会時から状態が変わっている可能性があるため、前提条件を再検証し、
    /// 保存時にも受け取り待ちのままであることを条件にする
    pub async fn confirm(
        &self,
        actor: &Actor,
        claim_code: &str,
        user_id: &str,
    ) -> Result<Order, ApplicationError> {
        actor.require_any(&[Role::Staff])?;
        let correlation_id = self
            .deps
            .begin("FulfillmentService", "Confirming fulfillment", actor.user_id);
        let (mut order, presented_user) =
            self.find_verified(claim_code, user_id, correlation_id).await?;

        order.fulfill(presented_user, self.deps.clock.now())?;
        if !self.deps.orders.mark_fulfilled(&order).await? {
            let mut context = HashMap::new();
            context.insert("order_key".to_string(), order.key().to_string());
            self.deps.logger.warn(
                "FulfillmentService",
                "Order changed before fulfillment was saved",
                Some(correlation_id),
                Some(context),
            );
            return Err(ApplicationError::Conflict(
                "This order has already been cancelled or fulfilled.".to_string(),
            ));
        }

        let mut context = HashMap::new();
        context.insert("order_key".to_string(), order.key().to_string());
        context.insert("claim_code".to_string(), order.claim_code().to_string());
        self.deps.logger.info(
            "FulfillmentService",
            "Order fulfilled",
            Some(correlation_id),
            Some(context),
        );

        let book_title = self.book_title(&order).await.unwrap_or_default();
        self.deps
            .publish(DomainEvent::OrderFulfilled(OrderFulfilled::new(
                correlation_id,
                order.key(),
                book_title,
                order.customer_name().to_string(),
            )))
            .await;
        Ok(order)
    }

    /// 引換コードで注文を探し、受け渡しの前提条件を検証する
    async fn find_verified(
        &self,
        claim_code: &str,
        user_id: &str,
        correlation_id: Uuid,
    ) -> Result<(Order, UserId), ApplicationError> {
        let code = ClaimCode::parse(claim_code)?;
        let presented_user = UserId::from_string(user_id)
            .map_err(|_| ApplicationError::Validation("Invalid user ID.".to_string()))?;

        let order = self
            .deps
            .orders
            .find_by_claim_code(&code)
            .await?
            .ok_or_else(|| ApplicationError::NotFound("Invalid claim code.".to_string()))?;

        if let Err(e) = order.verify_fulfillment(presented_user) {
            let mut context = HashMap::new();
            context.insert("claim_code".to_string(), code.to_string());
            context.insert("reason".to_string(), e.to_string());
            self.deps.logger.warn(
                "FulfillmentService",
                "Fulfillment rejected",
                Some(correlation_id),
                Some(context),
            );
            return Err(e.into());
        }
        Ok((order, presented_user))
    }

    async fn book_title(&self, order: &Order) -> Result<String, ApplicationError> {
        Ok(self
            .deps
            .catalog
            .find_by_id(order.book_id())
            .await?
            .map(|book| book.title().to_string())
            .unwrap_or_default())
    }
}

use crate::application::service::cart_service::{find_shortages, StockShortage};
use crate::application::service::ServiceDependencies;
use crate::application::{Actor, ApplicationError, Role};
use crate::domain::event::{CartCountChanged, DomainEvent, OrderCountChanged, OrderPlaced};
use crate::domain::model::{Book, ClaimCode, Order, OrderKey};
use crate::domain::port::LedgerError;
use crate::domain::pricing::Quote;
use crate::domain::receipt::{render_receipt, RECEIPT_SUBJECT};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// 引換コードの再生成を試みる上限
const MAX_CLAIM_CODE_ATTEMPTS: usize = 16;

/// メール送信に失敗したときに利用者へ表示する警告
pub const EMAIL_FAILURE_WARNING: &str =
    "Order placed successfully, but failed to send confirmation email. Check your orders for details.";

/// チェックアウト画面の内容
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutPreview {
    pub quote: Quote,
    pub shortages: Vec<StockShortage>,
}

impl CheckoutPreview {
    /// 在庫不足が無く確定可能か
    pub fn can_confirm(&self) -> bool {
        self.shortages.is_empty()
    }
}

/// チェックアウト確定の結果
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutReceipt {
    pub orders: Vec<Order>,
    /// 確定時点で再計算した見積もり
    pub quote: Quote,
    /// 注文自体は成立したが、付随処理が失敗したことの警告
    pub warnings: Vec<String>,
}

/// チェックアウトアプリケーションサービス
pub struct CheckoutApplicationService {
    deps: ServiceDependencies,
}

impl CheckoutApplicationService {
    pub fn new(deps: ServiceDependencies) -> Self {
        Self { deps }
    }

    /// チェックアウト画面を表示する
    /// 価格と在庫は表示時点の値で計算する
    pub async fn preview(&self, actor: &Actor) -> Result<CheckoutPreview, ApplicationError> {
        actor.require_any(&[Role::User, Role::Member])?;
        let items = self.load_items(actor).await?;
        let now = self.deps.clock.now();
        let quote = self.deps.quote_items(actor.user_id, &items, now).await?;
        Ok(CheckoutPreview {
            quote,
            shortages: find_shortages(&items),
        })
    }

    /// チェックアウトを確定する
    ///
    /// 確定時点の時刻・在庫・受け取り待ち注文数で価格を再計算し、
    /// カートの各行を1件の注文として作成する。1行でも在庫が足りなければ何も作成しない
    ///
    /// # Returns
    /// * `Ok(CheckoutReceipt)` - 作成した注文と見積もり、付随処理の警告
    /// * `Err(ApplicationError::Validation)` - カートが空
    /// * `Err(ApplicationError::Conflict)` - 在庫不足（不足している行をすべて列挙する）
    pub async fn confirm(&self, actor: &Actor) -> Result<CheckoutReceipt, ApplicationError> {
        actor.require_any(&[Role::User, Role::Member])?;
        let correlation_id = self
            .deps
            .begin("CheckoutService", "Confirming checkout", actor.user_id);

        let items = self.load_items(actor).await?;
        let shortages = find_shortages(&items);
        if !shortages.is_empty() {
            return Err(self.shortage_error(&shortages, correlation_id));
        }

        let now = self.deps.clock.now();
        let quote = self.deps.quote_items(actor.user_id, &items, now).await?;
        let orders = self.build_orders(actor, &quote, now).await?;

        if let Err(e) = self.deps.ledger.commit_checkout(actor.user_id, &orders).await {
            return Err(self.ledger_error(e, &items, correlation_id));
        }

        let mut context = HashMap::new();
        context.insert("orders".to_string(), orders.len().to_string());
        context.insert("final_total".to_string(), quote.final_total.to_string());
        self.deps.logger.info(
            "CheckoutService",
            "Checkout committed",
            Some(correlation_id),
            Some(context),
        );

        let mut warnings = Vec::new();
        let html = render_receipt(&actor.display_name, actor.user_id, now, &quote, &orders);
        if let Err(e) = self
            .deps
            .email_sender
            .send(&actor.email, RECEIPT_SUBJECT, &html)
            .await
        {
            let mut context = HashMap::new();
            context.insert("email".to_string(), actor.email.clone());
            context.insert("error".to_string(), e.to_string());
            self.deps.logger.error(
                "CheckoutService",
                "Failed to send order confirmation email",
                Some(correlation_id),
                Some(context),
            );
            warnings.push(EMAIL_FAILURE_WARNING.to_string());
        }

        self.announce(actor, &quote, &orders, correlation_id).await;

        Ok(CheckoutReceipt {
            orders,
            quote,
            warnings,
        })
    }

    async fn load_items(&self, actor: &Actor) -> Result<Vec<(Book, u32)>, ApplicationError> {
        let cart = self.deps.carts.find_by_user(actor.user_id).await?;
        let items = self.deps.load_cart_items(&cart).await?;
        if items.is_empty() {
            return Err(ApplicationError::Validation(
                "Your cart is empty.".to_string(),
            ));
        }
        Ok(items)
    }

    /// 見積もりの各行から注文を組み立てる（まだ保存しない）
    async fn build_orders(
        &self,
        actor: &Actor,
        quote: &Quote,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<Order>, ApplicationError> {
        let mut drawn = HashSet::new();
        let mut orders = Vec::with_capacity(quote.lines.len());
        for line in &quote.lines {
            let claim_code = self.draw_claim_code(&mut drawn).await?;
            let order = Order::place(
                OrderKey::new(actor.user_id, line.book_id, now),
                actor.display_name.clone(),
                line.quantity,
                line.line_total,
                claim_code,
            )?;
            orders.push(order);
        }
        Ok(orders)
    }

    /// 既存の注文とも、同じチェックアウトで発行済みのコードとも重ならない引換コードを発行する
    async fn draw_claim_code(
        &self,
        drawn: &mut HashSet<ClaimCode>,
    ) -> Result<ClaimCode, ApplicationError> {
        for _ in 0..MAX_CLAIM_CODE_ATTEMPTS {
            let code = ClaimCode::generate();
            if drawn.contains(&code) || self.deps.orders.claim_code_exists(&code).await? {
                continue;
            }
            drawn.insert(code.clone());
            return Ok(code);
        }
        Err(ApplicationError::Conflict(
            "Could not allocate a unique claim code. Please try again.".to_string(),
        ))
    }

    fn shortage_error(&self, shortages: &[StockShortage], correlation_id: Uuid) -> ApplicationError {
        let message = shortages
            .iter()
            .map(StockShortage::message)
            .collect::<Vec<_>>()
            .join(" ");
        let mut context = HashMap::new();
        context.insert("shortages".to_string(), shortages.len().to_string());
        self.deps.logger.warn(
            "CheckoutService",
            "Checkout aborted: insufficient stock",
            Some(correlation_id),
            Some(context),
        );
        ApplicationError::Conflict(message)
    }

    /// 台帳の比較付き減算で失敗した場合（確認後に他の購入で在庫が減った）
    fn ledger_error(
        &self,
        error: LedgerError,
        items: &[(Book, u32)],
        correlation_id: Uuid,
    ) -> ApplicationError {
        match error {
            LedgerError::InsufficientStock {
                book_id,
                available,
                requested,
            } => {
                let title = items
                    .iter()
                    .find(|(book, _)| book.id() == book_id)
                    .map(|(book, _)| book.title().to_string())
                    .unwrap_or_else(|| book_id.to_string());
                self.shortage_error(
                    &[StockShortage {
                        book_id,
                        title,
                        available,
                        requested,
                    }],
                    correlation_id,
                )
            }
            other => other.into(),
        }
    }

    /// コミット後の通知
    /// 件数の再取得に失敗しても注文は成立しているため、警告ログのみ残す
    async fn announce(&self, actor: &Actor, quote: &Quote, orders: &[Order], correlation_id: Uuid) {
        let total_orders = match self.deps.orders.count_all().await {
            Ok(count) => count,
            Err(e) => {
                self.warn_post_commit("Failed to count orders", &e.to_string(), correlation_id);
                orders.len() as u64
            }
        };
        let first_number = total_orders.saturating_sub(orders.len() as u64);

        for (index, order) in orders.iter().enumerate() {
            let title = quote
                .line(order.book_id())
                .map(|line| line.title.clone())
                .unwrap_or_default();
            self.deps
                .publish(DomainEvent::OrderPlaced(OrderPlaced::new(
                    correlation_id,
                    order.key(),
                    title,
                    actor.display_name.clone(),
                    order.quantity(),
                    order.total_price(),
                    first_number + index as u64 + 1,
                )))
                .await;
        }

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
            Err(e) => self.warn_post_commit(
                "Failed to count outstanding orders",
                &e.to_string(),
                correlation_id,
            ),
        }

        match self.deps.carts.find_by_user(actor.user_id).await {
            Ok(cart) => {
                self.deps
                    .publish(DomainEvent::CartCountChanged(CartCountChanged::new(
                        correlation_id,
                        actor.user_id,
                        cart.distinct_books(),
                    )))
                    .await
            }
            Err(e) => self.warn_post_commit("Failed to reload cart", &e.to_string(), correlation_id),
        }
    }

    fn warn_post_commit(&self, message: &str, error: &str, correlation_id: Uuid) {
        let mut context = HashMap::new();
        context.insert("error".to_string(), error.to_string());
        self.deps.logger.warn(
            "CheckoutService",
            message,
            Some(correlation_id),
            Some(context),
        );
    }
}

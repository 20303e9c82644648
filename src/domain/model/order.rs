use crate::domain::error::DomainError;
use crate::domain::model::{BookId, ClaimCode, Money, OrderStatus, UserId};
use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};

use std::fmt;

/// 注文をキャンセルできる期間（注文日時からの経過時間、境界を含む）
pub const CANCELLATION_WINDOW_HOURS: i64 = 24;

fn cancellation_window() -> Duration {
    Duration::hours(CANCELLATION_WINDOW_HOURS)
}

/// 注文の複合キー（ユーザー, 書籍, 注文日時）
/// 文字列表現は `user|book|RFC3339` 形式で、一括操作の入力として使われる
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OrderKey {
    user_id: UserId,
    book_id: BookId,
    ordered_at: DateTime<Utc>,
}

impl OrderKey {
    /// 新しい注文キーを作成
    /// 注文日時はデータベースで往復しても一致するようにマイクロ秒で切り捨てる
    pub fn new(user_id: UserId, book_id: BookId, ordered_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            book_id,
            ordered_at: ordered_at.trunc_subsecs(6),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn book_id(&self) -> BookId {
        self.book_id
    }

    pub fn ordered_at(&self) -> DateTime<Utc> {
        self.ordered_at
    }

    /// `user|book|timestamp` 形式の文字列から注文キーを作成
    /// タイムスタンプはオフセット付きでも受け付け、UTCに変換する
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        let parts: Vec<&str> = input.trim().split('|').collect();
        let [user, book, timestamp] = parts.as_slice() else {
            return Err(DomainError::InvalidValue(format!(
                "invalid order key format: {}",
                input
            )));
        };

        let user_id = UserId::from_string(user)
            .map_err(|_| DomainError::InvalidValue(format!("invalid user id: {}", user)))?;
        let book_id = BookId::from_string(book)
            .map_err(|_| DomainError::InvalidValue(format!("invalid book id: {}", book)))?;
        let ordered_at = DateTime::parse_from_rfc3339(timestamp.trim())
            .map_err(|_| DomainError::InvalidValue(format!("invalid order date: {}", timestamp)))?
            .with_timezone(&Utc);

        Ok(Self::new(user_id, book_id, ordered_at))
    }
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}",
            self.user_id,
            self.book_id,
            self.ordered_at.to_rfc3339_opts(SecondsFormat::Micros, true)
        )
    }
}

/// Order集約
/// 1冊の書籍に対する1件の注文。受け取り・キャンセル・削除のライフサイクルを管理する
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    key: OrderKey,
    customer_name: String,
    quantity: u32,
    total_price: Money,
    claim_code: ClaimCode,
    status: OrderStatus,
    cancelled_at: Option<DateTime<Utc>>,
    fulfilled_at: Option<DateTime<Utc>>,
}

impl Order {
    /// 新しい注文を作成（ステータスはPlaced）
    ///
    /// # Arguments
    /// * `key` - 注文キー
    /// * `customer_name` - 注文時点の顧客表示名
    /// * `quantity` - 数量（1以上）
    /// * `total_price` - 割引適用後の合計金額。セント単位に丸めて保持する
    /// * `claim_code` - 店頭受け取り用の引換コード
    pub fn place(
        key: OrderKey,
        customer_name: String,
        quantity: u32,
        total_price: Money,
        claim_code: ClaimCode,
    ) -> Result<Self, DomainError> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity(
                "Quantity must be at least 1.".to_string(),
            ));
        }
        if total_price.amount().is_sign_negative() {
            return Err(DomainError::InvalidValue(
                "order total cannot be negative".to_string(),
            ));
        }
        Ok(Self {
            key,
            customer_name,
            quantity,
            total_price: total_price.rounded(),
            claim_code,
            status: OrderStatus::Placed,
            cancelled_at: None,
            fulfilled_at: None,
        })
    }

    /// データベースから取得したデータで注文を再構築
    /// リポジトリでの使用を想定
    #[allow(clippy::too_many_arguments)]
    pub fn reconstruct(
        key: OrderKey,
        customer_name: String,
        quantity: u32,
        total_price: Money,
        claim_code: ClaimCode,
        status: OrderStatus,
        cancelled_at: Option<DateTime<Utc>>,
        fulfilled_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            key,
            customer_name,
            quantity,
            total_price,
            claim_code,
            status,
            cancelled_at,
            fulfilled_at,
        }
    }

    pub fn key(&self) -> OrderKey {
        self.key
    }

    pub fn user_id(&self) -> UserId {
        self.key.user_id
    }

    pub fn book_id(&self) -> BookId {
        self.key.book_id
    }

    pub fn ordered_at(&self) -> DateTime<Utc> {
        self.key.ordered_at
    }

    pub fn customer_name(&self) -> &str {
        &self.customer_name
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn total_price(&self) -> Money {
        self.total_price
    }

    pub fn claim_code(&self) -> &ClaimCode {
        &self.claim_code
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled_at.is_some()
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    pub fn is_fulfilled(&self) -> bool {
        self.fulfilled_at.is_some()
    }

    pub fn fulfilled_at(&self) -> Option<DateTime<Utc>> {
        self.fulfilled_at
    }

    /// 受け取り待ちの注文か（ロイヤルティ割引の件数に数える）
    pub fn is_outstanding(&self) -> bool {
        !self.is_cancelled() && self.status != OrderStatus::Received
    }

    /// 受け取り待ちのままか（キャンセル・受け渡しの遷移元になれる唯一の状態）
    pub fn is_placed(&self) -> bool {
        self.status == OrderStatus::Placed && !self.is_cancelled() && !self.is_fulfilled()
    }

    /// 終端状態か（キャンセル済みまたは受け取り済み）
    pub fn is_terminal(&self) -> bool {
        self.is_cancelled() || self.status.is_terminal()
    }

    /// 指定時刻にキャンセル可能か
    /// 未キャンセル・未受け渡しで、注文から24時間以内（境界を含む）
    pub fn is_cancellable_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_cancelled()
            && !self.is_fulfilled()
            && self.status != OrderStatus::Received
            && now - self.key.ordered_at <= cancellation_window()
    }

    /// 注文をキャンセル
    /// 事前条件:
    /// - キャンセル可能期間内であること
    ///
    /// 在庫の戻しは呼び出し側（StockLedger）が同じトランザクションで行う
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if !self.is_cancellable_at(now) {
            return Err(DomainError::InvalidOrderState(
                "This order cannot be cancelled. It may be past the 24-hour cancellation window."
                    .to_string(),
            ));
        }
        self.cancelled_at = Some(now);
        self.status = OrderStatus::Cancelled;
        Ok(())
    }

    /// 店頭受け渡しの前提条件を検証する（状態は変更しない）
    /// 所有者の確認を最初に行い、他人の注文の状態を漏らさない
    pub fn verify_fulfillment(&self, presented_user: UserId) -> Result<(), DomainError> {
        if self.key.user_id != presented_user {
            return Err(DomainError::OwnerMismatch(
                "The user ID does not match the order.".to_string(),
            ));
        }
        if self.is_cancelled() {
            return Err(DomainError::InvalidOrderState(
                "This order has been cancelled and cannot be fulfilled.".to_string(),
            ));
        }
        if self.is_fulfilled() || self.status == OrderStatus::Received {
            return Err(DomainError::InvalidOrderState(
                "This order has already been fulfilled.".to_string(),
            ));
        }
        Ok(())
    }

    /// 注文を受け渡し済みにする（ステータスはReceived）
    /// 在庫は注文時に引き当て済みのため変更しない
    pub fn fulfill(&mut self, presented_user: UserId, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.verify_fulfillment(presented_user)?;
        self.fulfilled_at = Some(now);
        self.status = OrderStatus::Received;
        Ok(())
    }

    /// 削除可能か検証する（受け取り済みまたはキャンセル済みのみ）
    pub fn ensure_deletable(&self) -> Result<(), DomainError> {
        if !self.is_terminal() {
            return Err(DomainError::InvalidOrderState(
                "Only received or cancelled orders can be deleted.".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    fn placed_at(ordered_at: DateTime<Utc>) -> Order {
        let key = OrderKey::new(UserId::new(), BookId::new(), ordered_at);
        Order::place(
            key,
            "Ada Lovelace".to_string(),
            2,
            Money::usd("19.995".parse::<Decimal>().unwrap()),
            ClaimCode::generate(),
        )
        .unwrap()
    }

    #[test]
    fn test_place_rounds_total_and_starts_placed() {
        let order = placed_at(Utc::now());
        assert_eq!(order.status(), OrderStatus::Placed);
        assert_eq!(order.total_price().amount(), "20.00".parse::<Decimal>().unwrap());
        assert!(order.is_outstanding());
        assert!(!order.is_terminal());
    }

    #[test]
    fn test_place_rejects_zero_quantity() {
        let key = OrderKey::new(UserId::new(), BookId::new(), Utc::now());
        let result = Order::place(key, String::new(), 0, Money::zero(), ClaimCode::generate());
        assert!(result.is_err());
    }

    #[test]
    fn test_cancellation_window_boundary() {
        let ordered_at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let order = placed_at(ordered_at);

        assert!(order.is_cancellable_at(ordered_at + Duration::hours(24)));
        assert!(order.is_cancellable_at(ordered_at + Duration::seconds(24 * 3600 - 1)));
        assert!(!order.is_cancellable_at(ordered_at + Duration::seconds(24 * 3600 + 1)));
    }

    #[test]
    fn test_cancel_sets_status_and_timestamp() {
        let ordered_at = Utc::now();
        let mut order = placed_at(ordered_at);
        let now = ordered_at + Duration::hours(1);

        order.cancel(now).unwrap();
        assert_eq!(order.status(), OrderStatus::Cancelled);
        assert_eq!(order.cancelled_at(), Some(now));
        assert!(order.cancel(now).is_err());
        assert!(order.ensure_deletable().is_ok());
    }

    #[test]
    fn test_cancel_after_window_fails() {
        let ordered_at = Utc::now() - Duration::hours(25);
        let mut order = placed_at(ordered_at);
        assert!(order.cancel(Utc::now()).is_err());
        assert_eq!(order.status(), OrderStatus::Placed);
    }

    #[test]
    fn test_fulfill_with_wrong_user_leaves_state() {
        let mut order = placed_at(Utc::now());
        let err = order.fulfill(UserId::new(), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::OwnerMismatch(_)));
        assert_eq!(order.status(), OrderStatus::Placed);
        assert!(!order.is_fulfilled());
    }

    #[test]
    fn test_fulfill_once_only() {
        let mut order = placed_at(Utc::now());
        let owner = order.user_id();
        order.fulfill(owner, Utc::now()).unwrap();
        assert_eq!(order.status(), OrderStatus::Received);
        assert!(order.fulfilled_at().is_some());

        let err = order.fulfill(owner, Utc::now()).unwrap_err();
        assert_eq!(err.to_string(), "This order has already been fulfilled.");
        assert!(!order.is_cancellable_at(Utc::now()));
    }

    #[test]
    fn test_cancelled_order_cannot_be_fulfilled() {
        let mut order = placed_at(Utc::now());
        order.cancel(Utc::now()).unwrap();
        let err = order.verify_fulfillment(order.user_id()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "This order has been cancelled and cannot be fulfilled."
        );
    }

    #[test]
    fn test_placed_order_is_not_deletable() {
        let order = placed_at(Utc::now());
        assert!(order.ensure_deletable().is_err());
    }

    #[test]
    fn test_order_key_text_form() {
        let ordered_at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let key = OrderKey::new(UserId::new(), BookId::new(), ordered_at);
        let text = key.to_string();
        assert!(text.ends_with("|2024-03-01T12:30:00.000000Z"));
        assert_eq!(OrderKey::parse(&text).unwrap(), key);
    }

    #[test]
    fn test_order_key_parse_converts_offsets_to_utc() {
        let user = UserId::new();
        let book = BookId::new();
        let key = OrderKey::parse(&format!("{}|{}|2024-03-01T14:30:00+02:00", user, book)).unwrap();
        assert_eq!(
            key.ordered_at(),
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_order_key_parse_rejects_malformed_input() {
        assert!(OrderKey::parse("garbage").is_err());
        assert!(OrderKey::parse("a|b|c").is_err());
        let user = UserId::new();
        let book = BookId::new();
        assert!(OrderKey::parse(&format!("{}|{}|yesterday", user, book)).is_err());
        assert!(OrderKey::parse(&format!("{}|{}|2024-03-01T00:00:00Z|x", user, book)).is_err());
    }
}

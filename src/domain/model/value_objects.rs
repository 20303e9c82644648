use crate::domain::error::DomainError;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;

/// ユーザーの一意識別子
/// 認証基盤が発行するIDをそのまま保持する
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    /// 新しい一意のUserIdを生成
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// UUIDから UserId を作成
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// 文字列からUserIdを作成
    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        let uuid = Uuid::parse_str(s.trim())?;
        Ok(Self(uuid))
    }

    /// 内部のUUIDを取得
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

/// 書籍の一意識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BookId(Uuid);

impl BookId {
    /// 新しい一意のBookIdを生成
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// UUIDから BookId を作成
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// 文字列からBookIdを作成
    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        let uuid = Uuid::parse_str(s.trim())?;
        Ok(Self(uuid))
    }

    /// 内部のUUIDを取得
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// お知らせの一意識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnnouncementId(Uuid);

impl AnnouncementId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s.trim())?))
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for AnnouncementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for AnnouncementId {
    fn default() -> Self {
        Self::new()
    }
}

/// レビュー（返信を含む）の一意識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReviewId(Uuid);

impl ReviewId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s.trim())?))
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for ReviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for ReviewId {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for BookId {
    fn default() -> Self {
        Self::new()
    }
}

/// 通貨
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Currency {
    /// 米ドル
    #[allow(clippy::upper_case_acronyms)]
    USD,
}

/// 金額を表す値オブジェクト
/// 計算途中は丸めず、保存・表示の直前にだけセント単位へ丸める
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    /// 金額と通貨から作成
    pub fn new(amount: Decimal, currency: &str) -> Result<Self, DomainError> {
        let currency = match currency {
            "USD" => Currency::USD,
            _ => {
                return Err(DomainError::InvalidValue(format!(
                    "unsupported currency: {}",
                    currency
                )))
            }
        };
        Ok(Self { amount, currency })
    }

    /// 米ドルの金額を作成
    pub fn usd(amount: Decimal) -> Self {
        Self {
            amount,
            currency: Currency::USD,
        }
    }

    /// 0ドル
    pub fn zero() -> Self {
        Self::usd(Decimal::ZERO)
    }

    /// 金額を取得
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// 通貨を文字列として取得
    pub fn currency(&self) -> String {
        match self.currency {
            Currency::USD => "USD".to_string(),
        }
    }

    /// 金額を加算
    pub fn add(&self, other: &Money) -> Result<Money, DomainError> {
        if self.currency != other.currency {
            return Err(DomainError::InvalidValue("currency mismatch".to_string()));
        }
        Ok(Money {
            amount: self.amount + other.amount,
            currency: self.currency,
        })
    }

    /// 金額を減算
    pub fn subtract(&self, other: &Money) -> Result<Money, DomainError> {
        if self.currency != other.currency {
            return Err(DomainError::InvalidValue("currency mismatch".to_string()));
        }
        Ok(Money {
            amount: self.amount - other.amount,
            currency: self.currency,
        })
    }

    /// 金額を数量倍する
    pub fn multiply(&self, factor: u32) -> Money {
        Money {
            amount: self.amount * Decimal::from(factor),
            currency: self.currency,
        }
    }

    /// 割合を掛けた金額（割引額の算出に使う）
    pub fn portion(&self, rate: DiscountRate) -> Money {
        Money {
            amount: self.amount * rate.value(),
            currency: self.currency,
        }
    }

    /// 割引を適用した金額 = 金額 × (1 − 割引率)
    pub fn discounted_by(&self, rate: DiscountRate) -> Money {
        Money {
            amount: self.amount * rate.remaining(),
            currency: self.currency,
        }
    }

    /// セント単位に丸めた金額
    pub fn rounded(&self) -> Money {
        Money {
            amount: self
                .amount
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
            currency: self.currency,
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.rounded().amount)
    }
}

/// 割引率（0以上1以下）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DiscountRate(Decimal);

impl DiscountRate {
    /// 割引なし
    pub const NONE: DiscountRate = DiscountRate(Decimal::ZERO);

    /// 0〜1の割合から作成
    pub fn new(value: Decimal) -> Result<Self, DomainError> {
        if value < Decimal::ZERO || value > Decimal::ONE {
            return Err(DomainError::InvalidValue(format!(
                "discount rate must be between 0 and 1, got {}",
                value
            )));
        }
        Ok(Self(value))
    }

    /// パーセント表記（例: 5 → 5%）から作成
    pub fn from_percent(percent: Decimal) -> Result<Self, DomainError> {
        Self::new(percent / Decimal::ONE_HUNDRED)
    }

    /// 割合を取得
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// パーセント表記を取得
    pub fn as_percent(&self) -> Decimal {
        self.0 * Decimal::ONE_HUNDRED
    }

    /// 割引後に残る割合 (1 − 割引率)
    pub fn remaining(&self) -> Decimal {
        Decimal::ONE - self.0
    }

    /// 2つの割引を重ねた割引率
    /// 割引は加算ではなく、残りの未割引部分に対して乗算的に効く: a + b − a·b
    pub fn stack(&self, other: DiscountRate) -> DiscountRate {
        DiscountRate(self.0 + other.0 - self.0 * other.0)
    }

    /// 割引が0かどうか
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Display for DiscountRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.as_percent().normalize())
    }
}

/// 注文のステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// 注文済み（受け取り待ち）
    Placed,
    /// キャンセル済み
    Cancelled,
    /// 店頭で受け取り済み
    Received,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status_str = match self {
            OrderStatus::Placed => "Placed",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Received => "Received",
        };
        write!(f, "{}", status_str)
    }
}

impl OrderStatus {
    /// 文字列からOrderStatusを作成
    pub fn from_string(s: &str) -> Result<Self, DomainError> {
        match s {
            "Placed" => Ok(OrderStatus::Placed),
            "Cancelled" => Ok(OrderStatus::Cancelled),
            "Received" => Ok(OrderStatus::Received),
            _ => Err(DomainError::InvalidValue(format!(
                "unknown order status: {}",
                s
            ))),
        }
    }

    /// 終端状態（キャンセル済みまたは受け取り済み）かどうか
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Received)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_user_id_parse_roundtrip() {
        let id = UserId::new();
        let parsed = UserId::from_string(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
        assert!(UserId::from_string("not-a-uuid").is_err());
    }

    #[test]
    fn test_money_addition() {
        let result = Money::usd(dec("10.50")).add(&Money::usd(dec("4.25"))).unwrap();
        assert_eq!(result.amount(), dec("14.75"));
    }

    #[test]
    fn test_money_multiplication() {
        let result = Money::usd(dec("19.99")).multiply(3);
        assert_eq!(result.amount(), dec("59.97"));
    }

    #[test]
    fn test_money_discounted_by_half() {
        let rate = DiscountRate::new(dec("0.5")).unwrap();
        let result = Money::usd(dec("20")).discounted_by(rate);
        assert_eq!(result.amount(), dec("10"));
    }

    #[test]
    fn test_money_rounding_uses_half_away_from_zero() {
        assert_eq!(Money::usd(dec("1.005")).rounded().amount(), dec("1.01"));
        assert_eq!(Money::usd(dec("42.75")).to_string(), "$42.75");
    }

    #[test]
    fn test_discount_rate_bounds() {
        assert!(DiscountRate::new(dec("-0.01")).is_err());
        assert!(DiscountRate::new(dec("1.01")).is_err());
        assert!(DiscountRate::new(Decimal::ZERO).is_ok());
        assert!(DiscountRate::new(Decimal::ONE).is_ok());
    }

    #[test]
    fn test_discount_rate_stack() {
        let quantity = DiscountRate::from_percent(dec("5")).unwrap();
        let loyalty = DiscountRate::from_percent(dec("10")).unwrap();
        assert_eq!(quantity.stack(loyalty).value(), dec("0.145"));
        assert_eq!(quantity.stack(DiscountRate::NONE), quantity);
    }

    #[test]
    fn test_order_status_from_string() {
        assert_eq!(OrderStatus::from_string("Placed").unwrap(), OrderStatus::Placed);
        assert_eq!(OrderStatus::from_string("Received").unwrap(), OrderStatus::Received);
        assert!(OrderStatus::from_string("Shipped").is_err());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Placed.is_terminal());
    }
}

use crate::domain::error::DomainError;
use crate::domain::model::{BookId, DiscountRate, Money};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// 期間限定割引
/// 1冊の書籍に対して、開始日時から終了日時までの間だけ有効な割引率
#[derive(Debug, Clone, PartialEq)]
pub struct DiscountPeriod {
    id: Uuid,
    book_id: BookId,
    rate: DiscountRate,
    starts_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    on_sale: bool,
}

impl DiscountPeriod {
    /// 新しい割引期間を作成
    /// 終了日時が開始日時より前の場合はエラー
    pub fn new(
        book_id: BookId,
        rate: DiscountRate,
        starts_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        on_sale: bool,
    ) -> Result<Self, DomainError> {
        if expires_at < starts_at {
            return Err(DomainError::InvalidValue(
                "discount expiry must not be before its start".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            book_id,
            rate,
            starts_at,
            expires_at,
            on_sale,
        })
    }

    /// データベースから取得したデータで割引期間を再構築
    pub fn reconstruct(
        id: Uuid,
        book_id: BookId,
        rate: DiscountRate,
        starts_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        on_sale: bool,
    ) -> Self {
        Self {
            id,
            book_id,
            rate,
            starts_at,
            expires_at,
            on_sale,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn book_id(&self) -> BookId {
        self.book_id
    }

    pub fn rate(&self) -> DiscountRate {
        self.rate
    }

    pub fn starts_at(&self) -> DateTime<Utc> {
        self.starts_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// セール表示フラグ
    pub fn is_on_sale(&self) -> bool {
        self.on_sale
    }

    /// 指定時刻に有効か（開始・終了とも境界を含む）
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.starts_at <= now && now <= self.expires_at
    }

    /// 割引後の単価
    pub fn apply(&self, unit_price: Money) -> Money {
        unit_price.discounted_by(self.rate)
    }

    /// 指定書籍に対して有効な割引を選ぶ
    /// 同時に複数が有効な場合は、最も割引率の高いもの（= 最も安くなるもの）を採用する
    pub fn select_active(
        periods: &[DiscountPeriod],
        book_id: BookId,
        now: DateTime<Utc>,
    ) -> Option<&DiscountPeriod> {
        periods
            .iter()
            .filter(|period| period.book_id == book_id && period.is_active_at(now))
            .max_by_key(|period| period.rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal::Decimal;

    fn rate(percent: i64) -> DiscountRate {
        DiscountRate::from_percent(Decimal::from(percent)).unwrap()
    }

    #[test]
    fn test_expiry_before_start_is_rejected() {
        let now = Utc::now();
        let result = DiscountPeriod::new(BookId::new(), rate(10), now, now - Duration::seconds(1), false);
        assert!(result.is_err());
    }

    #[test]
    fn test_active_window_is_inclusive() {
        let start = Utc::now();
        let end = start + Duration::days(7);
        let period = DiscountPeriod::new(BookId::new(), rate(10), start, end, true).unwrap();

        assert!(period.is_active_at(start));
        assert!(period.is_active_at(end));
        assert!(!period.is_active_at(start - Duration::seconds(1)));
        assert!(!period.is_active_at(end + Duration::seconds(1)));
    }

    #[test]
    fn test_apply_discount() {
        let now = Utc::now();
        let period = DiscountPeriod::new(BookId::new(), rate(50), now, now, false).unwrap();
        let price = period.apply(Money::usd(Decimal::from(20)));
        assert_eq!(price.amount(), Decimal::from(10));
    }

    #[test]
    fn test_select_active_prefers_lowest_price() {
        let now = Utc::now();
        let book_id = BookId::new();
        let window = |percent| {
            DiscountPeriod::new(
                book_id,
                rate(percent),
                now - Duration::hours(1),
                now + Duration::hours(1),
                false,
            )
            .unwrap()
        };
        let expired = DiscountPeriod::new(
            book_id,
            rate(90),
            now - Duration::days(2),
            now - Duration::days(1),
            false,
        )
        .unwrap();
        let other_book = DiscountPeriod::new(
            BookId::new(),
            rate(80),
            now - Duration::hours(1),
            now + Duration::hours(1),
            false,
        )
        .unwrap();
        let periods = vec![window(10), expired, window(25), other_book];

        let selected = DiscountPeriod::select_active(&periods, book_id, now).unwrap();
        assert_eq!(selected.rate(), rate(25));
    }

    #[test]
    fn test_select_active_none() {
        let periods: Vec<DiscountPeriod> = Vec::new();
        assert!(DiscountPeriod::select_active(&periods, BookId::new(), Utc::now()).is_none());
    }
}

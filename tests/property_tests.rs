use bookstore_order_lifecycle::domain::model::{
    Book, BookId, ClaimCode, DiscountRate, Money, Order, OrderKey, UserId,
};
use bookstore_order_lifecycle::domain::pricing::{quote, PricingPolicy};
use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap()
}

/// 0.001 単位の割引率
fn rate(thousandths: u32) -> DiscountRate {
    DiscountRate::new(Decimal::new(thousandths as i64, 3)).unwrap()
}

fn book(cents: i64, stock: u32) -> Book {
    Book::new(
        BookId::new(),
        "Persuasion".to_string(),
        "Jane Austen".to_string(),
        Money::usd(Decimal::new(cents, 2)),
        stock,
    )
    .unwrap()
}

// 割引率の合成
proptest! {
    /// 合成割引率は d1 + d2 - d1 * d2 と等しい
    #[test]
    fn test_combined_rate_formula(
        d1 in 0u32..=50,
        d2 in 0u32..=100,
    ) {
        let quantity_rate = rate(d1);
        let loyalty_rate = rate(d2);

        let combined = quantity_rate.stack(loyalty_rate);

        let expected = quantity_rate.value() + loyalty_rate.value()
            - quantity_rate.value() * loyalty_rate.value();
        prop_assert_eq!(combined.value(), expected);
    }

    /// 合成割引率はどちらの割引率よりも小さくならず、1を超えない
    #[test]
    fn test_combined_rate_bounds(
        d1 in 0u32..=1000,
        d2 in 0u32..=1000,
    ) {
        let combined = rate(d1).stack(rate(d2));

        prop_assert!(combined.value() >= rate(d1).value());
        prop_assert!(combined.value() >= rate(d2).value());
        prop_assert!(combined.value() <= Decimal::ONE);
    }
}

// 見積もり
proptest! {
    /// 最終金額は0以上で小計を超えない
    #[test]
    fn test_final_total_is_never_negative(
        lines in prop::collection::vec((0i64..50_000, 1u32..10), 1..6),
        outstanding in 0u64..30,
    ) {
        let items: Vec<(Book, u32)> = lines
            .iter()
            .map(|(cents, quantity)| (book(*cents, 100), *quantity))
            .collect();

        let result = quote(&PricingPolicy::default(), &items, &[], outstanding, base_time());

        prop_assert!(!result.final_total.amount().is_sign_negative());
        prop_assert!(result.final_total.amount() <= result.subtotal.amount());
        prop_assert_eq!(
            result.final_total.amount() + result.discount_amount.amount(),
            result.subtotal.amount()
        );
    }

    /// 数量割引は合計冊数がしきい値以上のときだけ適用される
    #[test]
    fn test_quantity_discount_threshold(
        quantities in prop::collection::vec(1u32..4, 1..5),
    ) {
        let items: Vec<(Book, u32)> = quantities
            .iter()
            .map(|quantity| (book(1_000, 100), *quantity))
            .collect();
        let total: u32 = quantities.iter().sum();

        let result = quote(&PricingPolicy::default(), &items, &[], 0, base_time());

        prop_assert_eq!(result.total_items, total);
        prop_assert_eq!(result.quantity_rate.is_zero(), total < 5);
        prop_assert!(result.loyalty_rate.is_zero());
    }
}

// 在庫
proptest! {
    /// 引き当てた数量を戻すと在庫は元に戻る
    #[test]
    fn test_commit_then_release_restores_stock(
        stock in 1u32..1_000,
        requested in 1u32..1_000,
    ) {
        let mut book = book(1_999, stock);

        match book.commit(requested) {
            Ok(()) => {
                prop_assert_eq!(book.quantity_on_hand(), stock - requested);
                book.release(requested);
            }
            Err(_) => {
                prop_assert!(requested > stock);
            }
        }

        prop_assert_eq!(book.quantity_on_hand(), stock);
    }
}

// キャンセル期限
proptest! {
    /// 注文から24時間以内（境界を含む）はキャンセルでき、それを過ぎるとできない
    #[test]
    fn test_cancellation_window(
        elapsed_secs in 0i64..(48 * 3600),
    ) {
        let ordered_at = base_time();
        let key = OrderKey::new(UserId::new(), BookId::new(), ordered_at);
        let order = Order::place(
            key,
            "Anne Elliot".to_string(),
            1,
            Money::usd(Decimal::new(1_000, 2)),
            ClaimCode::generate(),
        )
        .unwrap();

        let now = ordered_at + Duration::seconds(elapsed_secs);

        prop_assert_eq!(order.is_cancellable_at(now), elapsed_secs <= 24 * 3600);
    }
}

#[test]
fn test_max_combined_rate_is_fourteen_and_a_half_percent() {
    let policy = PricingPolicy::default();

    let combined = policy
        .quantity_rate_for(5)
        .stack(policy.loyalty_rate_for(10));

    assert_eq!(combined.value(), Decimal::new(145, 3));
}

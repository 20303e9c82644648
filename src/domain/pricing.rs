// 価格計算エンジン
// 書籍ごとの期間割引と、カート全体の数量割引・ロイヤルティ割引を組み合わせて支払額を計算する
// 副作用のない純粋な計算のみを行う

use crate::domain::model::{Book, BookId, DiscountPeriod, DiscountRate, Money};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// カート全体に掛かる割引の設定
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingPolicy {
    quantity_threshold: u32,
    quantity_rate: DiscountRate,
    loyalty_threshold: u64,
    loyalty_rate: DiscountRate,
}

impl PricingPolicy {
    /// 数量割引: 合計5冊以上で5%
    pub const DEFAULT_QUANTITY_THRESHOLD: u32 = 5;
    pub const DEFAULT_QUANTITY_PERCENT: u32 = 5;
    /// ロイヤルティ割引: 受け取り待ちの注文が10件以上で10%
    pub const DEFAULT_LOYALTY_THRESHOLD: u64 = 10;
    pub const DEFAULT_LOYALTY_PERCENT: u32 = 10;

    pub fn new(
        quantity_threshold: u32,
        quantity_rate: DiscountRate,
        loyalty_threshold: u64,
        loyalty_rate: DiscountRate,
    ) -> Self {
        Self {
            quantity_threshold,
            quantity_rate,
            loyalty_threshold,
            loyalty_rate,
        }
    }

    pub fn quantity_threshold(&self) -> u32 {
        self.quantity_threshold
    }

    pub fn loyalty_threshold(&self) -> u64 {
        self.loyalty_threshold
    }

    /// カート内の合計冊数に対する数量割引率
    pub fn quantity_rate_for(&self, total_items: u32) -> DiscountRate {
        if total_items >= self.quantity_threshold {
            self.quantity_rate
        } else {
            DiscountRate::NONE
        }
    }

    /// 受け取り待ち注文数に対するロイヤルティ割引率
    pub fn loyalty_rate_for(&self, outstanding_orders: u64) -> DiscountRate {
        if outstanding_orders >= self.loyalty_threshold {
            self.loyalty_rate
        } else {
            DiscountRate::NONE
        }
    }
}

impl Default for PricingPolicy {
    fn default() -> Self {
        let percent = |value: u32| {
            DiscountRate::from_percent(Decimal::from(value)).unwrap_or(DiscountRate::NONE)
        };
        Self {
            quantity_threshold: Self::DEFAULT_QUANTITY_THRESHOLD,
            quantity_rate: percent(Self::DEFAULT_QUANTITY_PERCENT),
            loyalty_threshold: Self::DEFAULT_LOYALTY_THRESHOLD,
            loyalty_rate: percent(Self::DEFAULT_LOYALTY_PERCENT),
        }
    }
}

/// 評価時点での書籍1冊の価格
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemPrice {
    pub unit_price: Money,
    pub discounted_unit_price: Money,
    /// 評価時点で有効な期間割引の割引率
    pub active_rate: Option<DiscountRate>,
    pub on_sale: bool,
}

impl ItemPrice {
    pub fn has_active_discount(&self) -> bool {
        self.active_rate.is_some()
    }
}

/// 書籍1冊の割引後単価を計算する
/// 有効な期間割引があれば `単価 × (1 − 割引率)`、なければ単価のまま
///
/// # Arguments
/// * `book` - 対象の書籍
/// * `discounts` - 候補となる割引期間（他の書籍のものが混ざっていてもよい）
/// * `now` - 評価時刻
pub fn price_item(book: &Book, discounts: &[DiscountPeriod], now: DateTime<Utc>) -> ItemPrice {
    match DiscountPeriod::select_active(discounts, book.id(), now) {
        Some(period) => ItemPrice {
            unit_price: book.price(),
            discounted_unit_price: period.apply(book.price()),
            active_rate: Some(period.rate()),
            on_sale: period.is_on_sale(),
        },
        None => ItemPrice {
            unit_price: book.price(),
            discounted_unit_price: book.price(),
            active_rate: None,
            on_sale: false,
        },
    }
}

/// 見積もりの1行
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteLine {
    pub book_id: BookId,
    pub title: String,
    pub author: String,
    pub quantity: u32,
    pub price: ItemPrice,
    /// 割引後単価 × 数量
    pub line_subtotal: Money,
    /// カート全体の割引のうち、この行に按分された額
    pub discount_share: Money,
    pub line_total: Money,
}

/// カート全体の見積もり
/// 金額は丸めずに保持し、保存・表示の直前にだけ丸める
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub lines: Vec<QuoteLine>,
    pub total_items: u32,
    pub outstanding_orders: u64,
    pub subtotal: Money,
    pub quantity_rate: DiscountRate,
    pub loyalty_rate: DiscountRate,
    pub combined_rate: DiscountRate,
    pub discount_amount: Money,
    pub final_total: Money,
    pub priced_at: DateTime<Utc>,
}

impl Quote {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line(&self, book_id: BookId) -> Option<&QuoteLine> {
        self.lines.iter().find(|line| line.book_id == book_id)
    }
}

/// カート全体の見積もりを計算する
///
/// # Arguments
/// * `policy` - 数量割引・ロイヤルティ割引の設定
/// * `items` - (書籍, 数量) の組
/// * `discounts` - 対象書籍の割引期間
/// * `outstanding_orders` - 受け取り待ちの注文数（キャンセル済み・受け取り済みを除く）
/// * `now` - 評価時刻
///
/// # Returns
/// 小計・各割引率・割引額・最終金額と、行ごとの按分結果
pub fn quote(
    policy: &PricingPolicy,
    items: &[(Book, u32)],
    discounts: &[DiscountPeriod],
    outstanding_orders: u64,
    now: DateTime<Utc>,
) -> Quote {
    let total_items: u32 = items.iter().map(|(_, quantity)| *quantity).sum();
    let quantity_rate = policy.quantity_rate_for(total_items);
    let loyalty_rate = policy.loyalty_rate_for(outstanding_orders);
    let combined_rate = quantity_rate.stack(loyalty_rate);

    let mut subtotal = Money::zero();
    let lines: Vec<QuoteLine> = items
        .iter()
        .map(|(book, quantity)| {
            let price = price_item(book, discounts, now);
            let line_subtotal = price.discounted_unit_price.multiply(*quantity);
            let discount_share = line_subtotal.portion(combined_rate);
            subtotal = Money::usd(subtotal.amount() + line_subtotal.amount());
            QuoteLine {
                book_id: book.id(),
                title: book.title().to_string(),
                author: book.author().to_string(),
                quantity: *quantity,
                price,
                line_subtotal,
                discount_share,
                line_total: line_subtotal.discounted_by(combined_rate),
            }
        })
        .collect();

    Quote {
        lines,
        total_items,
        outstanding_orders,
        subtotal,
        quantity_rate,
        loyalty_rate,
        combined_rate,
        discount_amount: subtotal.portion(combined_rate),
        final_total: subtotal.discounted_by(combined_rate),
        priced_at: now,
    }
}

use crate::domain::error::DomainError;
use crate::domain::model::{BookId, Money};

/// 書籍集約
/// カタログ上の書籍と、その店頭在庫数を管理する
#[derive(Debug, Clone, PartialEq)]
pub struct Book {
    id: BookId,
    title: String,
    author: String,
    price: Money,
    quantity_on_hand: u32,
}

impl Book {
    /// 新しい書籍を作成
    ///
    /// # Arguments
    /// * `title` - 書名（空不可）
    /// * `author` - 著者名（空不可）
    /// * `price` - 単価（0以上、小数点以下2桁まで）
    /// * `quantity_on_hand` - 在庫数
    pub fn new(
        id: BookId,
        title: String,
        author: String,
        price: Money,
        quantity_on_hand: u32,
    ) -> Result<Self, DomainError> {
        if title.trim().is_empty() {
            return Err(DomainError::InvalidValue("title is required".to_string()));
        }
        if author.trim().is_empty() {
            return Err(DomainError::InvalidValue("author is required".to_string()));
        }
        if price.amount().is_sign_negative() {
            return Err(DomainError::InvalidValue(
                "price cannot be negative".to_string(),
            ));
        }
        // 価格はセント単位で保存する
        if price.amount().normalize().scale() > 2 {
            return Err(DomainError::InvalidValue(
                "price cannot have more than two decimal places".to_string(),
            ));
        }
        Ok(Self {
            id,
            title,
            author,
            price,
            quantity_on_hand,
        })
    }

    /// データベースから取得したデータで書籍を再構築
    pub fn reconstruct(
        id: BookId,
        title: String,
        author: String,
        price: Money,
        quantity_on_hand: u32,
    ) -> Self {
        Self {
            id,
            title,
            author,
            price,
            quantity_on_hand,
        }
    }

    pub fn id(&self) -> BookId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    /// 定価（割引前の単価）
    pub fn price(&self) -> Money {
        self.price
    }

    /// 在庫数を取得
    pub fn quantity_on_hand(&self) -> u32 {
        self.quantity_on_hand
    }

    /// 在庫が1冊以上あるか
    pub fn is_available(&self) -> bool {
        self.quantity_on_hand > 0
    }

    /// 指定された数量の在庫が利用可能かチェック
    pub fn has_available_stock(&self, quantity: u32) -> bool {
        self.quantity_on_hand >= quantity
    }

    /// 在庫の引き当て可否を検証する（状態は変更しない）
    ///
    /// # Returns
    /// * `Ok(())` - 引き当て可能
    /// * `Err(DomainError::InsufficientStock)` - 在庫不足
    pub fn ensure_can_supply(&self, quantity: u32) -> Result<(), DomainError> {
        if !self.has_available_stock(quantity) {
            return Err(self.insufficient(quantity));
        }
        Ok(())
    }

    /// 在庫を引き当てる（注文作成時）
    pub fn commit(&mut self, quantity: u32) -> Result<(), DomainError> {
        self.ensure_can_supply(quantity)?;
        self.quantity_on_hand -= quantity;
        Ok(())
    }

    /// 在庫を戻す（キャンセル時）
    pub fn release(&mut self, quantity: u32) {
        self.quantity_on_hand = self.quantity_on_hand.saturating_add(quantity);
    }

    /// 在庫数を増減する（管理者による在庫調整）
    /// 結果が負になる場合は何も変更せずにエラーを返す
    pub fn adjust(&mut self, delta: i64) -> Result<u32, DomainError> {
        let next = i64::from(self.quantity_on_hand) + delta;
        if next < 0 {
            return Err(self.insufficient(delta.unsigned_abs().min(u64::from(u32::MAX)) as u32));
        }
        self.quantity_on_hand = u32::try_from(next).map_err(|_| {
            DomainError::InvalidQuantity("stock level exceeds the supported maximum".to_string())
        })?;
        Ok(self.quantity_on_hand)
    }

    fn insufficient(&self, requested: u32) -> DomainError {
        DomainError::InsufficientStock {
            book_id: self.id,
            title: self.title.clone(),
            available: self.quantity_on_hand,
            requested,
        }
    }
}

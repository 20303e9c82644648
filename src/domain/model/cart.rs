use crate::domain::error::DomainError;
use crate::domain::model::{Book, BookId, UserId};

/// カートの1行（書籍と数量）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartEntry {
    book_id: BookId,
    quantity: u32,
}

impl CartEntry {
    /// データベースから取得したデータでカート行を再構築
    pub fn reconstruct(book_id: BookId, quantity: u32) -> Self {
        Self { book_id, quantity }
    }

    pub fn book_id(&self) -> BookId {
        self.book_id
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }
}

/// カート集約
/// ユーザーごとに (書籍, 数量) の行を保持する。同じ書籍は1行にまとめる
#[derive(Debug, Clone, PartialEq)]
pub struct Cart {
    user_id: UserId,
    entries: Vec<CartEntry>,
}

impl Cart {
    /// 空のカートを作成
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            entries: Vec::new(),
        }
    }

    /// データベースから取得したデータでカートを再構築
    pub fn reconstruct(user_id: UserId, entries: Vec<CartEntry>) -> Self {
        Self { user_id, entries }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn entries(&self) -> &[CartEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 指定書籍の数量（カートに無ければ0）
    pub fn quantity_of(&self, book_id: BookId) -> u32 {
        self.entries
            .iter()
            .find(|entry| entry.book_id == book_id)
            .map(|entry| entry.quantity)
            .unwrap_or(0)
    }

    /// 書籍をカートに追加する
    /// 既に同じ書籍があれば数量を合算する。1未満の数量は1として扱う
    ///
    /// # Arguments
    /// * `book` - 最新の在庫数を持つ書籍
    /// * `requested` - 追加したい数量
    ///
    /// # Returns
    /// 追加後のその書籍の数量
    pub fn add_or_merge(&mut self, book: &Book, requested: i64) -> Result<u32, DomainError> {
        if !book.is_available() {
            return Err(DomainError::OutOfStock {
                title: book.title().to_string(),
            });
        }

        let requested = clamp_requested(requested);
        let merged = u64::from(self.quantity_of(book.id())) + u64::from(requested);
        if merged > u64::from(book.quantity_on_hand()) {
            return Err(DomainError::InsufficientStock {
                book_id: book.id(),
                title: book.title().to_string(),
                available: book.quantity_on_hand(),
                requested: u32::try_from(merged).unwrap_or(u32::MAX),
            });
        }
        let merged = merged as u32;

        match self.entries.iter_mut().find(|entry| entry.book_id == book.id()) {
            Some(entry) => entry.quantity = merged,
            None => self.entries.push(CartEntry {
                book_id: book.id(),
                quantity: merged,
            }),
        }
        Ok(merged)
    }

    /// カート内の数量を変更する
    /// 行が存在しない場合、1未満の場合、在庫数を超える場合はエラー
    pub fn update_quantity(&mut self, book: &Book, quantity: i64) -> Result<(), DomainError> {
        if quantity < 1 {
            return Err(DomainError::InvalidQuantity(
                "Quantity must be at least 1.".to_string(),
            ));
        }
        if quantity > i64::from(book.quantity_on_hand()) {
            return Err(DomainError::InsufficientStock {
                book_id: book.id(),
                title: book.title().to_string(),
                available: book.quantity_on_hand(),
                requested: u32::try_from(quantity).unwrap_or(u32::MAX),
            });
        }

        let entry = self
            .entries
            .iter_mut()
            .find(|entry| entry.book_id == book.id())
            .ok_or_else(|| {
                DomainError::InvalidValue(format!("'{}' is not in the cart", book.title()))
            })?;
        entry.quantity = quantity as u32;
        Ok(())
    }

    /// 書籍をカートから削除する
    ///
    /// # Returns
    /// 行が存在して削除された場合は true
    pub fn remove(&mut self, book_id: BookId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.book_id != book_id);
        self.entries.len() != before
    }

    /// 指定された書籍の行をまとめて削除する（チェックアウト完了時）
    pub fn clear(&mut self, book_ids: &[BookId]) {
        self.entries.retain(|entry| !book_ids.contains(&entry.book_id));
    }

    /// 全行の数量の合計
    pub fn total_items(&self) -> u32 {
        self.entries.iter().map(|entry| entry.quantity).sum()
    }

    /// カートに入っている書籍の種類数（カートバッジの表示値）
    pub fn distinct_books(&self) -> usize {
        self.entries.len()
    }
}

fn clamp_requested(requested: i64) -> u32 {
    if requested < 1 {
        1
    } else {
        u32::try_from(requested).unwrap_or(u32::MAX)
    }
}

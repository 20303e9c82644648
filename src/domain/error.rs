use crate::domain::model::BookId;

/// ドメイン層のエラー型
/// ビジネスルール違反を表現する
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    /// 無効な数量（例: 1未満、在庫数を超える数量）
    #[error("{0}")]
    InvalidQuantity(String),
    /// 在庫切れの書籍をカートに追加しようとした
    #[error("'{title}' is currently out of stock.")]
    OutOfStock { title: String },
    /// 要求数量に対して在庫が不足している
    #[error("Only {available} copies of '{title}' are available.")]
    InsufficientStock {
        book_id: BookId,
        title: String,
        available: u32,
        requested: u32,
    },
    /// 無効な注文状態（例: キャンセル済みの注文を受け渡そうとした）
    #[error("{0}")]
    InvalidOrderState(String),
    /// 注文の所有者と提示されたユーザーが一致しない
    #[error("{0}")]
    OwnerMismatch(String),
    /// 無効な値
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

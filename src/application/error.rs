use crate::domain::error::DomainError;
use crate::domain::port::{LedgerError, RepositoryError};

/// アプリケーション層のエラー型
/// 想定されたビジネス上の失敗は種類ごとに分類し、永続化層の障害だけを致命的として扱う
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApplicationError {
    /// 入力の検証エラー（数量・必須項目・識別子の形式など）
    #[error("{0}")]
    Validation(String),
    /// 認可エラー（他人の注文、引換コードの所有者不一致、ロール不足）
    #[error("{0}")]
    Unauthorized(String),
    /// 競合（在庫不足、キャンセル期限切れ、受け渡し済みなど現在の状態と矛盾する）
    #[error("{0}")]
    Conflict(String),
    /// エンティティが見つからない
    #[error("{0}")]
    NotFound(String),
    /// リポジトリエラー（永続化の失敗）
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl ApplicationError {
    /// エラー種別のコード（APIレスポンスで使用）
    pub fn code(&self) -> &'static str {
        match self {
            ApplicationError::Validation(_) => "VALIDATION_ERROR",
            ApplicationError::Unauthorized(_) => "UNAUTHORIZED",
            ApplicationError::Conflict(_) => "CONFLICT",
            ApplicationError::NotFound(_) => "NOT_FOUND",
            ApplicationError::Repository(_) => "REPOSITORY_ERROR",
        }
    }
}

// From実装でエラー変換を簡潔に
impl From<DomainError> for ApplicationError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidQuantity(_) | DomainError::InvalidValue(_) => {
                ApplicationError::Validation(err.to_string())
            }
            DomainError::OwnerMismatch(_) => ApplicationError::Unauthorized(err.to_string()),
            DomainError::OutOfStock { .. }
            | DomainError::InsufficientStock { .. }
            | DomainError::InvalidOrderState(_) => ApplicationError::Conflict(err.to_string()),
        }
    }
}

impl From<LedgerError> for ApplicationError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientStock { .. } => ApplicationError::Conflict(err.to_string()),
            LedgerError::BookNotFound(book_id) => {
                ApplicationError::NotFound(format!("Book not found: {}", book_id))
            }
            LedgerError::OrderNotPlaced(_) => ApplicationError::Conflict(
                "This order has already been cancelled or fulfilled.".to_string(),
            ),
            LedgerError::Repository(e) => ApplicationError::Repository(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{BookId, OrderKey, UserId};

    #[test]
    fn test_domain_errors_are_classified() {
        let validation: ApplicationError = DomainError::InvalidQuantity("bad".to_string()).into();
        assert!(matches!(validation, ApplicationError::Validation(_)));

        let owner: ApplicationError = DomainError::OwnerMismatch("no".to_string()).into();
        assert!(matches!(owner, ApplicationError::Unauthorized(_)));

        let stock: ApplicationError = DomainError::InsufficientStock {
            book_id: BookId::new(),
            title: "Emma".to_string(),
            available: 1,
            requested: 2,
        }
        .into();
        assert_eq!(stock.to_string(), "Only 1 copies of 'Emma' are available.");
        assert_eq!(stock.code(), "CONFLICT");
    }

    #[test]
    fn test_ledger_errors_are_classified() {
        let missing: ApplicationError = LedgerError::BookNotFound(BookId::new()).into();
        assert!(matches!(missing, ApplicationError::NotFound(_)));

        let key = OrderKey::new(UserId::new(), BookId::new(), chrono::Utc::now());
        let stale: ApplicationError = LedgerError::OrderNotPlaced(key).into();
        assert_eq!(stale.code(), "CONFLICT");

        let repo: ApplicationError =
            LedgerError::Repository(RepositoryError::ConnectionFailed("down".to_string())).into();
        assert!(matches!(repo, ApplicationError::Repository(_)));
    }
}

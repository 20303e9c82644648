use crate::domain::error::DomainError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;

/// 引換コードの長さ
pub const CLAIM_CODE_LENGTH: usize = 8;

/// 店頭受け取り用の引換コード
/// 英大文字と数字からなる8文字のトークン。注文ごとに発行される
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClaimCode(String);

impl ClaimCode {
    /// ランダムなv4 UUIDの先頭8文字から新しいコードを生成
    pub fn generate() -> Self {
        let raw = Uuid::new_v4().simple().to_string();
        Self(raw[..CLAIM_CODE_LENGTH].to_ascii_uppercase())
    }

    /// 入力文字列からコードを作成
    /// 前後の空白を除き、大文字に正規化してから検証する
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        let normalized = input.trim().to_ascii_uppercase();
        if normalized.is_empty() {
            return Err(DomainError::InvalidValue(
                "claim code is required".to_string(),
            ));
        }
        if normalized.len() != CLAIM_CODE_LENGTH
            || !normalized.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(DomainError::InvalidValue(format!(
                "claim code must be {} letters or digits",
                CLAIM_CODE_LENGTH
            )));
        }
        Ok(Self(normalized))
    }

    /// 文字列として取得
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClaimCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_code_shape() {
        let code = ClaimCode::generate();
        assert_eq!(code.as_str().len(), CLAIM_CODE_LENGTH);
        assert!(code
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn test_generated_codes_differ() {
        let first = ClaimCode::generate();
        let second = ClaimCode::generate();
        assert_ne!(first, second);
    }

    #[test]
    fn test_parse_normalizes_input() {
        let code = ClaimCode::parse("  ab12cd34 ").unwrap();
        assert_eq!(code.as_str(), "AB12CD34");
    }

    #[test]
    fn test_parse_rejects_malformed_codes() {
        assert!(ClaimCode::parse("").is_err());
        assert!(ClaimCode::parse("ABC").is_err());
        assert!(ClaimCode::parse("AB12-D34").is_err());
        assert!(ClaimCode::parse("AB12CD345").is_err());
    }
}

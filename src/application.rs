// アプリケーション層
// 認証済みの呼び出し元（Actor）を明示的に受け取るユースケース

pub mod actor;
pub mod error;
pub mod service;

pub use actor::{Actor, Role};
pub use error::ApplicationError;

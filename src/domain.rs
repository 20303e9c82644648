// ドメイン層
// 集約・値オブジェクト・価格計算・ドメインイベント・出力ポート

pub mod error;
pub mod event;
pub mod event_bus;
pub mod handler;
pub mod model;
pub mod port;
pub mod pricing;
pub mod receipt;

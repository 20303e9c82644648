use crate::domain::port::{LogLevel, Logger};
use std::collections::HashMap;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// グローバルな tracing サブスクライバーを初期化する
/// `RUST_LOG` が設定されていればそちらを優先し、無ければ `default_level` を使う
///
/// 2回目以降の呼び出しは何もしない（テストから何度呼ばれてもよい）
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 追加コンテキストを `key=value` の並びに整形する（キー順）
pub fn render_context(context: &HashMap<String, String>) -> String {
    let mut pairs: Vec<_> = context.iter().collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

/// tracing によるログ実装
/// コンポーネント名・相関ID・追加コンテキストを構造化フィールドとして出力する
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl TracingLogger {
    pub fn new() -> Self {
        Self
    }

    fn emit(
        &self,
        level: LogLevel,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    ) {
        let correlation_id = correlation_id.map(|id| id.to_string()).unwrap_or_default();
        let context = context.as_ref().map(render_context).unwrap_or_default();
        match level {
            LogLevel::Debug => {
                tracing::debug!(component, correlation_id = %correlation_id, context = %context, "{}", message)
            }
            LogLevel::Info => {
                tracing::info!(component, correlation_id = %correlation_id, context = %context, "{}", message)
            }
            LogLevel::Warning => {
                tracing::warn!(component, correlation_id = %correlation_id, context = %context, "{}", message)
            }
            LogLevel::Error => {
                tracing::error!(component, correlation_id = %correlation_id, context = %context, "{}", message)
            }
        }
    }
}

impl Logger for TracingLogger {
    fn debug(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    ) {
        self.emit(LogLevel::Debug, component, message, correlation_id, context);
    }

    fn info(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    ) {
        self.emit(LogLevel::Info, component, message, correlation_id, context);
    }

    fn warn(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    ) {
        self.emit(LogLevel::Warning, component, message, correlation_id, context);
    }

    fn error(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    ) {
        self.emit(LogLevel::Error, component, message, correlation_id, context);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_context_is_sorted() {
        let mut context = HashMap::new();
        context.insert("user_id".to_string(), "u-1".to_string());
        context.insert("book_id".to_string(), "b-1".to_string());

        assert_eq!(render_context(&context), "book_id=b-1, user_id=u-1");
        assert_eq!(render_context(&HashMap::new()), "");
    }

    #[test]
    fn test_tracing_logger_with_context() {
        init_tracing("debug");
        let logger = TracingLogger::new();
        let mut context = HashMap::new();
        context.insert("key1".to_string(), "value1".to_string());

        logger.debug("TestComponent", "Test debug message", Some(Uuid::new_v4()), Some(context));
        logger.error("TestComponent", "Test error message", None, None);
    }
}

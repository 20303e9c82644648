use crate::domain::port::{EmailSender, Logger, NotificationError};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;

/// 送信したメール
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

/// 直近の送信メールを保持する送信箱（上限を超えると古いものから捨てる）
struct Outbox {
    entries: VecDeque<SentEmail>,
    capacity: usize,
}

impl Outbox {
    fn push(&mut self, email: SentEmail) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(email);
    }
}

/// 送信内容をログに出すメール送信実装
/// 外部のメールサーバーを持たない開発環境・テストで使う。
/// 送信箱は `with_outbox` で作った場合だけ保持する
#[derive(Clone)]
pub struct LogEmailSender {
    outbox: Option<Arc<Mutex<Outbox>>>,
    logger: Arc<dyn Logger>,
}

impl LogEmailSender {
    /// ログ出力のみを行う送信実装を作成
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self {
            outbox: None,
            logger,
        }
    }

    /// 直近 `capacity` 件の送信メールを保持する送信実装を作成
    pub fn with_outbox(logger: Arc<dyn Logger>, capacity: usize) -> Self {
        Self {
            outbox: Some(Arc::new(Mutex::new(Outbox {
                entries: VecDeque::with_capacity(capacity),
                capacity,
            }))),
            logger,
        }
    }

    /// 保持している送信メール（送信順）
    pub async fn sent(&self) -> Vec<SentEmail> {
        match &self.outbox {
            Some(outbox) => outbox.lock().await.entries.iter().cloned().collect(),
            None => Vec::new(),
        }
    }
}

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), NotificationError> {
        if to.trim().is_empty() {
            return Err(NotificationError::EmailFailed(
                "recipient address is empty".to_string(),
            ));
        }

        let mut context = HashMap::new();
        context.insert("to".to_string(), to.to_string());
        context.insert("subject".to_string(), subject.to_string());
        context.insert("bytes".to_string(), html_body.len().to_string());
        self.logger.info("EmailSender", "Email sent", None, Some(context));

        if let Some(outbox) = &self.outbox {
            outbox.lock().await.push(SentEmail {
                to: to.to_string(),
                subject: subject.to_string(),
                html_body: html_body.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::driven::TracingLogger;

    #[tokio::test]
    async fn test_sent_mail_is_kept_in_outbox() {
        let sender = LogEmailSender::with_outbox(Arc::new(TracingLogger::new()), 10);
        sender
            .send("reader@example.com", "Your Order Confirmation", "<p>hi</p>")
            .await
            .unwrap();

        let sent = sender.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "reader@example.com");
    }

    #[tokio::test]
    async fn test_empty_recipient_is_rejected() {
        let sender = LogEmailSender::with_outbox(Arc::new(TracingLogger::new()), 10);
        assert!(matches!(
            sender.send("  ", "subject", "body").await,
            Err(NotificationError::EmailFailed(_))
        ));
        assert!(sender.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_outbox_keeps_only_recent_mail() {
        let sender = LogEmailSender::with_outbox(Arc::new(TracingLogger::new()), 2);
        for subject in ["first", "second", "third"] {
            sender.send("reader@example.com", subject, "<p>hi</p>").await.unwrap();
        }

        let subjects: Vec<String> = sender.sent().await.into_iter().map(|m| m.subject).collect();
        assert_eq!(subjects, vec!["second".to_string(), "third".to_string()]);
    }

    #[tokio::test]
    async fn test_log_only_sender_keeps_nothing() {
        let sender = LogEmailSender::new(Arc::new(TracingLogger::new()));
        sender
            .send("reader@example.com", "Your Order Confirmation", "<p>hi</p>")
            .await
            .unwrap();

        assert!(sender.sent().await.is_empty());
    }
}

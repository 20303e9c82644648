// 出力ポート
// ドメイン層が外部に依存する機能をトレイトとして定義
// アダプター層でこれらのトレイトを実装する

use crate::domain::error::DomainError;
use crate::domain::event::DomainEvent;
use crate::domain::model::{
    AnnouncementId, Book, BookId, Cart, ClaimCode, DiscountPeriod, Order, OrderKey, Review,
    ReviewId, TimedAnnouncement, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// ログレベル
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// ロガートレイト
/// ログ出力を抽象化するポート
pub trait Logger: Send + Sync {
    /// デバッグレベルのログを出力
    fn debug(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    );

    /// 情報レベルのログを出力
    fn info(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    );

    /// 警告レベルのログを出力
    fn warn(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    );

    /// エラーレベルのログを出力
    fn error(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    );
}

/// リポジトリエラー型
/// リポジトリ操作で発生するエラーを表現する
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[allow(clippy::enum_variant_names)]
pub enum RepositoryError {
    /// データベース接続に失敗
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    /// 操作に失敗
    #[error("Operation failed: {0}")]
    OperationFailed(String),
    /// データの取得に失敗
    #[error("Fetch failed: {0}")]
    FetchFailed(String),
}

/// 書籍カタログトレイト
#[async_trait]
pub trait BookCatalog: Send + Sync {
    /// 書籍IDで書籍を検索する
    ///
    /// # Returns
    /// * `Ok(Some(Book))` - 書籍が見つかった
    /// * `Ok(None)` - 書籍が見つからなかった
    /// * `Err(RepositoryError)` - 検索失敗
    async fn find_by_id(&self, book_id: BookId) -> Result<Option<Book>, RepositoryError>;

    /// 複数の書籍をまとめて取得する。見つからないIDは結果に含まれない
    async fn find_by_ids(&self, book_ids: &[BookId]) -> Result<Vec<Book>, RepositoryError>;

    /// すべての書籍を書名の昇順で取得する
    async fn find_all(&self) -> Result<Vec<Book>, RepositoryError>;

    /// 書籍を保存する（新規作成または更新）
    async fn save(&self, book: &Book) -> Result<(), RepositoryError>;

    /// 書籍を削除する
    ///
    /// # Returns
    /// * `Ok(true)` - 削除した
    /// * `Ok(false)` - 書籍が存在しなかった
    async fn delete(&self, book_id: BookId) -> Result<bool, RepositoryError>;
}

/// 期間割引リポジトリトレイト
#[async_trait]
pub trait DiscountRepository: Send + Sync {
    /// 指定書籍の割引期間を取得する
    async fn find_for_books(
        &self,
        book_ids: &[BookId],
    ) -> Result<Vec<DiscountPeriod>, RepositoryError>;

    /// 書籍の割引期間を登録または置き換える（1冊につき1件）
    async fn upsert(&self, period: &DiscountPeriod) -> Result<(), RepositoryError>;

    /// 書籍の割引期間を削除する
    async fn delete_by_book(&self, book_id: BookId) -> Result<(), RepositoryError>;
}

/// カートリポジトリトレイト
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// ユーザーのカートを取得する（行が無ければ空のカート）
    async fn find_by_user(&self, user_id: UserId) -> Result<Cart, RepositoryError>;

    /// カートの内容を保存する（既存の行は置き換える）
    async fn save(&self, cart: &Cart) -> Result<(), RepositoryError>;

    /// 全ユーザーのカートから指定書籍の行を削除する
    async fn remove_book_everywhere(&self, book_id: BookId) -> Result<(), RepositoryError>;
}

/// ほしい物リストリポジトリトレイト
#[async_trait]
pub trait WishlistRepository: Send + Sync {
    async fn contains(&self, user_id: UserId, book_id: BookId) -> Result<bool, RepositoryError>;

    async fn add(&self, user_id: UserId, book_id: BookId) -> Result<(), RepositoryError>;

    async fn remove(&self, user_id: UserId, book_id: BookId) -> Result<(), RepositoryError>;

    /// ユーザーのほしい物リストにある書籍IDを取得する
    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<BookId>, RepositoryError>;

    /// 全ユーザーのほしい物リストから指定書籍を削除する
    async fn remove_book_everywhere(&self, book_id: BookId) -> Result<(), RepositoryError>;
}

/// 注文リポジトリトレイト
/// 注文集約の永続化を抽象化する
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// 注文キーで注文を検索する
    async fn find_by_key(&self, key: &OrderKey) -> Result<Option<Order>, RepositoryError>;

    /// 引換コードで注文を検索する
    async fn find_by_claim_code(&self, code: &ClaimCode)
        -> Result<Option<Order>, RepositoryError>;

    /// ユーザーの注文を注文日時の降順で取得する
    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError>;

    /// ユーザーの受け取り待ち注文数（キャンセル済み・受け取り済みを除く）
    async fn count_outstanding(&self, user_id: UserId) -> Result<u64, RepositoryError>;

    /// 全注文の件数
    async fn count_all(&self) -> Result<u64, RepositoryError>;

    /// 引換コードが既に使われているか
    async fn claim_code_exists(&self, code: &ClaimCode) -> Result<bool, RepositoryError>;

    /// 受け渡し済みにした注文を保存する
    /// 保存済みの注文が受け取り待ちのままの場合だけ書き込む
    ///
    /// # Returns
    /// * `Ok(true)` - 受け渡し済みにした
    /// * `Ok(false)` - 既にキャンセル済み・受け渡し済み、または存在しない
    async fn mark_fulfilled(&self, order: &Order) -> Result<bool, RepositoryError>;

    /// 注文を削除する
    async fn delete(&self, key: &OrderKey) -> Result<bool, RepositoryError>;

    /// 指定書籍を参照する注文があるか（書籍削除前の参照整合性チェック）
    async fn exists_for_book(&self, book_id: BookId) -> Result<bool, RepositoryError>;

    /// ユーザーがキャンセルしていない注文で指定書籍を購入したか（レビューの投稿条件）
    async fn has_purchased(&self, user_id: UserId, book_id: BookId)
        -> Result<bool, RepositoryError>;
}

/// お知らせリポジトリトレイト
#[async_trait]
pub trait AnnouncementRepository: Send + Sync {
    /// 指定時刻に失効していないお知らせを掲示開始日時の新しい順に取得する
    async fn find_unexpired(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<TimedAnnouncement>, RepositoryError>;

    async fn find_by_id(
        &self,
        id: AnnouncementId,
    ) -> Result<Option<TimedAnnouncement>, RepositoryError>;

    /// お知らせを保存する（新規作成または更新）
    async fn save(&self, announcement: &TimedAnnouncement) -> Result<(), RepositoryError>;

    /// お知らせを削除する
    ///
    /// # Returns
    /// * `Ok(true)` - 削除した
    /// * `Ok(false)` - 存在しなかった
    async fn delete(&self, id: AnnouncementId) -> Result<bool, RepositoryError>;
}

/// レビューリポジトリトレイト
/// レビュー本体と返信を、親への参照を持つ1つの表として扱う
#[async_trait]
pub trait ReviewRepository: Send + Sync {
    async fn find_by_id(&self, id: ReviewId) -> Result<Option<Review>, RepositoryError>;

    /// 書籍のレビュー本体（返信を含まない）
    async fn find_top_level(&self, book_id: BookId) -> Result<Vec<Review>, RepositoryError>;

    /// 指定したレビュー本体への返信（1階層分のみ）
    async fn find_replies(&self, parents: &[ReviewId]) -> Result<Vec<Review>, RepositoryError>;

    /// ユーザーが既にその書籍のレビュー本体を投稿しているか
    async fn has_top_level(&self, user_id: UserId, book_id: BookId)
        -> Result<bool, RepositoryError>;

    /// レビューを登録する
    /// 同じユーザー・書籍のレビュー本体が既にある場合は登録せず `Ok(false)` を返す
    async fn insert(&self, review: &Review) -> Result<bool, RepositoryError>;

    /// 書籍のレビューと返信をすべて削除する
    async fn remove_book_everywhere(&self, book_id: BookId) -> Result<(), RepositoryError>;
}

/// 在庫台帳のエラー
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    /// 在庫不足（比較と減算を同時に行った結果）
    #[error("Only {available} copies of book {book_id} are available (requested {requested}).")]
    InsufficientStock {
        book_id: BookId,
        available: u32,
        requested: u32,
    },
    /// 書籍が存在しない
    #[error("Book not found: {0}")]
    BookNotFound(BookId),
    /// 保存済みの注文が既に受け取り待ちではない
    #[error("Order {0} is no longer awaiting pickup.")]
    OrderNotPlaced(OrderKey),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<DomainError> for LedgerError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InsufficientStock {
                book_id,
                available,
                requested,
                ..
            } => LedgerError::InsufficientStock {
                book_id,
                available,
                requested,
            },
            other => LedgerError::Repository(RepositoryError::OperationFailed(other.to_string())),
        }
    }
}

/// 在庫台帳トレイト
/// 在庫の増減を、それに対応する注文・カートの変更と同じ単位で原子的に行う
#[async_trait]
pub trait StockLedger: Send + Sync {
    /// チェックアウトを確定する
    /// 1トランザクションで、各注文の在庫を比較付きで減算し、注文を登録し、
    /// 該当するカート行を削除する。1件でも在庫が足りなければ何も変更しない
    async fn commit_checkout(&self, user_id: UserId, orders: &[Order]) -> Result<(), LedgerError>;

    /// キャンセル済みの注文を保存し、その数量を在庫に戻す
    /// 保存済みの注文が受け取り待ちでなければ何も変更せず `OrderNotPlaced` を返す
    async fn release_cancelled(&self, order: &Order) -> Result<(), LedgerError>;

    /// 在庫数を増減する（結果が負になる場合は変更しない）
    ///
    /// # Returns
    /// 変更後の在庫数
    async fn adjust_stock(&self, book_id: BookId, delta: i64) -> Result<u32, LedgerError>;
}

/// イベントバスエラー
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event publishing failed: {0}")]
    PublishingFailed(String),
}

/// イベントバストレイト
/// イベントの発行と配信を管理するポート
#[async_trait]
pub trait EventBus: Send + Sync {
    /// イベントを発行し、登録されたハンドラーに配信
    async fn publish(&self, event: DomainEvent) -> Result<(), EventBusError>;
}

/// 通知の送信先チャンネル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// カート件数の更新
    CartCount,
    /// 受け取り待ち注文数の更新
    OrderCount,
    /// 全体へのお知らせ
    Announcements,
    /// 店頭受け渡しの通知
    Fulfillment,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::CartCount => "cart-count",
            Channel::OrderCount => "order-count",
            Channel::Announcements => "announcements",
            Channel::Fulfillment => "fulfillment",
        }
    }
}

/// 通知・メール送信のエラー
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NotificationError {
    #[error("Broadcast failed: {0}")]
    BroadcastFailed(String),
    #[error("Email delivery failed: {0}")]
    EmailFailed(String),
}

/// リアルタイム通知の配信ポート
/// 配信は保証されず、失敗しても呼び出し元の状態変更は取り消さない
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn broadcast(
        &self,
        channel: Channel,
        event_name: &str,
        payload: serde_json::Value,
    ) -> Result<(), NotificationError>;
}

/// メール送信ポート
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), NotificationError>;
}

/// 現在時刻を提供するポート
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

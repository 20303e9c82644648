// 駆動される側アダプター（リポジトリ実装、イベントバス、通知、時計など）

mod broadcaster;
mod clock;
mod email_sender;
mod event_bus;
mod in_memory_store;
mod mysql_announcement_repository;
mod mysql_cart_repository;
mod mysql_catalog_repository;
mod mysql_order_repository;
mod mysql_review_repository;
mod tracing_logger;

pub use broadcaster::{ChannelBroadcaster, Notification};
pub use clock::{ManualClock, SystemClock};
pub use email_sender::{LogEmailSender, SentEmail};
pub use event_bus::{DeadLetterEntry, EventBusConfig, FailedEventProcessing, InMemoryEventBus};
pub use in_memory_store::InMemoryStore;
pub use mysql_announcement_repository::MySqlAnnouncementRepository;
pub use mysql_cart_repository::MySqlCartRepository;
pub use mysql_catalog_repository::MySqlCatalogRepository;
pub use mysql_order_repository::MySqlOrderRepository;
pub use mysql_review_repository::MySqlReviewRepository;
pub use tracing_logger::{init_tracing, render_context, TracingLogger};

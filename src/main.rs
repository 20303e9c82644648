use bookstore_order_lifecycle::adapter::driven::{
    init_tracing, ChannelBroadcaster, InMemoryEventBus, InMemoryStore, LogEmailSender,
    MySqlAnnouncementRepository, MySqlCartRepository, MySqlCatalogRepository,
    MySqlOrderRepository, MySqlReviewRepository, SystemClock, TracingLogger,
};
use bookstore_order_lifecycle::adapter::driver::create_router;
use bookstore_order_lifecycle::adapter::{
    AppConfig, DatabaseConfig, DatabaseMigration, StorageBackend,
};
use bookstore_order_lifecycle::application::service::{ApplicationServices, ServiceDependencies};
use bookstore_order_lifecycle::domain::event::{
    CartCountChanged, OrderCountChanged, OrderFulfilled, OrderPlaced,
};
use bookstore_order_lifecycle::domain::handler::NotificationHandler;
use bookstore_order_lifecycle::domain::port::{
    AnnouncementRepository, BookCatalog, CartRepository, DiscountRepository, Logger,
    OrderRepository, ReviewRepository, StockLedger, WishlistRepository,
};

use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// 永続化ポートの実装一式
struct Repositories {
    catalog: Arc<dyn BookCatalog>,
    discounts: Arc<dyn DiscountRepository>,
    carts: Arc<dyn CartRepository>,
    wishlists: Arc<dyn WishlistRepository>,
    orders: Arc<dyn OrderRepository>,
    ledger: Arc<dyn StockLedger>,
    announcements: Arc<dyn AnnouncementRepository>,
    reviews: Arc<dyn ReviewRepository>,
}

async fn mysql_repositories() -> Result<Repositories, Box<dyn std::error::Error>> {
    // データベース設定を読み込む
    let config = DatabaseConfig::from_env()?;
    tracing::info!(host = %config.host, port = config.port, "データベース設定を読み込みました");

    let pool = config.connect().await?;

    // マイグレーションを実行
    DatabaseMigration::new(pool.clone()).run().await?;

    let catalog = Arc::new(MySqlCatalogRepository::new(pool.clone()));
    let carts = Arc::new(MySqlCartRepository::new(pool.clone()));
    let orders = Arc::new(MySqlOrderRepository::new(pool.clone()));
    Ok(Repositories {
        catalog: catalog.clone(),
        discounts: catalog,
        carts: carts.clone(),
        wishlists: carts,
        orders: orders.clone(),
        ledger: orders,
        announcements: Arc::new(MySqlAnnouncementRepository::new(pool.clone())),
        reviews: Arc::new(MySqlReviewRepository::new(pool)),
    })
}

fn memory_repositories() -> Repositories {
    tracing::warn!("インメモリストアで起動します（再起動でデータは失われます）");
    let store = Arc::new(InMemoryStore::new());
    Repositories {
        catalog: store.clone(),
        discounts: store.clone(),
        carts: store.clone(),
        wishlists: store.clone(),
        orders: store.clone(),
        ledger: store.clone(),
        announcements: store.clone(),
        reviews: store,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .envファイルから環境変数を読み込む
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    init_tracing(&config.log_level);
    tracing::info!(storage = ?config.storage, "書店注文サービスを起動します");

    let repositories = match config.storage {
        StorageBackend::MySql => mysql_repositories().await?,
        StorageBackend::Memory => memory_repositories(),
    };

    let logger: Arc<dyn Logger> = Arc::new(TracingLogger::new());

    // イベントバスを作成し、通知ハンドラーを各イベントに登録
    let broadcaster = Arc::new(ChannelBroadcaster::new());
    let event_bus = Arc::new(InMemoryEventBus::new(config.event_bus.clone(), logger.clone()));
    let notification_handler = NotificationHandler::new(broadcaster, logger.clone());
    event_bus
        .subscribe::<OrderPlaced, _>(notification_handler.clone())
        .await?;
    event_bus
        .subscribe::<OrderFulfilled, _>(notification_handler.clone())
        .await?;
    event_bus
        .subscribe::<CartCountChanged, _>(notification_handler.clone())
        .await?;
    event_bus
        .subscribe::<OrderCountChanged, _>(notification_handler)
        .await?;

    let dependencies = ServiceDependencies {
        catalog: repositories.catalog,
        discounts: repositories.discounts,
        carts: repositories.carts,
        wishlists: repositories.wishlists,
        orders: repositories.orders,
        ledger: repositories.ledger,
        announcements: repositories.announcements,
        reviews: repositories.reviews,
        event_bus,
        email_sender: Arc::new(LogEmailSender::new(logger.clone())),
        clock: Arc::new(SystemClock),
        logger,
        pricing_policy: config.pricing,
    };
    let services = ApplicationServices::new(dependencies);

    // REST APIルーターを作成
    let app = create_router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(services);

    // サーバーを起動
    let listener = tokio::net::TcpListener::bind(&config.server_address).await?;
    tracing::info!(address = %config.server_address, "REST APIサーバーが起動しました");

    axum::serve(listener, app).await?;

    Ok(())
}

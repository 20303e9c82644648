use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::adapter::driver::identity::CurrentActor;
use crate::adapter::driver::request_dto::{
    AddBookRequest, AddToCartRequest, AdjustStockRequest, AnnouncementRequest, BulkOrdersRequest,
    CatalogQueryParams, FulfillmentRequest, OrderKeyRequest, ReplyRequest, ReviewRequest,
    SetDiscountRequest, UpdateQuantityRequest,
};
use crate::adapter::driver::response_dto::{
    AnnouncementResponse, BookResponse, BookReviewsResponse, BulkOutcomeResponse, CancelResponse, CartMutationResponse, CartResponse,
    CatalogEntryResponse, CatalogPageResponse, CheckoutPreviewResponse, CheckoutReceiptResponse,
    DiscountResponse, FulfillmentPreviewResponse, OrderCountResponse, OrderResponse,
    ReviewResponse, StockResponse, WishlistToggleResponse,
};
use crate::application::service::ApplicationServices;
use crate::application::ApplicationError;
use crate::domain::model::{AnnouncementId, BookId, OrderKey, ReviewId};

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

// アプリケーションサービスを含む状態
pub type AppState = ApplicationServices;

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

// REST APIルーターを作成
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        // カタログ（匿名で閲覧可能）
        .route("/books", get(browse_books))
        .route("/books/:book_id", get(get_book))
        // レビュー（購入者のみ投稿可能）
        .route(
            "/books/:book_id/reviews",
            get(book_reviews).post(submit_review),
        )
        .route(
            "/books/:book_id/reviews/:review_id/replies",
            post(reply_to_review),
        )
        // お知らせ
        .route("/announcements", get(active_announcements))
        .route("/admin/announcements", post(create_announcement))
        .route(
            "/admin/announcements/:announcement_id",
            put(update_announcement).delete(delete_announcement),
        )
        // 管理者用
        .route("/admin/books", post(add_book))
        .route("/admin/books/:book_id", delete(delete_book))
        .route("/admin/books/:book_id/stock", post(adjust_stock))
        .route("/admin/books/:book_id/discount", put(set_discount))
        // カート・ほしい物リスト
        .route("/cart", get(view_cart))
        .route("/cart/items", post(add_to_cart))
        .route(
            "/cart/items/:book_id",
            put(update_cart_quantity).delete(remove_from_cart),
        )
        .route("/wishlist", get(view_wishlist))
        .route("/wishlist/:book_id", post(toggle_wishlist))
        // チェックアウトと注文
        .route("/checkout", get(preview_checkout).post(confirm_checkout))
        .route("/orders", get(my_orders))
        .route("/orders/outstanding-count", get(outstanding_count))
        .route("/orders/cancel", post(cancel_order))
        .route("/orders/delete", post(delete_order))
        .route("/orders/bulk-cancel", post(bulk_cancel_orders))
        .route("/orders/bulk-delete", post(bulk_delete_orders))
        // 店頭受け渡し（スタッフ）
        .route("/fulfillment", get(lookup_fulfillment).post(confirm_fulfillment))
}

// ヘルスチェックエンドポイント
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "bookstore-order-lifecycle",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn browse_books(
    State(state): State<AppState>,
    Query(params): Query<CatalogQueryParams>,
) -> ApiResult<Json<CatalogPageResponse>> {
    let page = state
        .catalog
        .browse(&params.into_query())
        .await
        .map_err(map_application_error)?;
    Ok(Json(CatalogPageResponse::from_page(&page)))
}

async fn get_book(
    State(state): State<AppState>,
    Path(book_id): Path<Uuid>,
) -> ApiResult<Json<CatalogEntryResponse>> {
    let entry = state
        .catalog
        .book_details(BookId::from_uuid(book_id))
        .await
        .map_err(map_application_error)?;
    Ok(Json(CatalogEntryResponse::from_entry(&entry)))
}

async fn add_book(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(request): Json<AddBookRequest>,
) -> ApiResult<(StatusCode, Json<BookResponse>)> {
    let book = state
        .catalog
        .add_book(&actor, request.into())
        .await
        .map_err(map_application_error)?;
    Ok((StatusCode::CREATED, Json(BookResponse::from_book(&book))))
}

async fn delete_book(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(book_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .catalog
        .delete_book(&actor, BookId::from_uuid(book_id))
        .await
        .map_err(map_application_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn adjust_stock(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(book_id): Path<Uuid>,
    Json(request): Json<AdjustStockRequest>,
) -> ApiResult<Json<StockResponse>> {
    let book_id = BookId::from_uuid(book_id);
    let quantity_on_hand = state
        .catalog
        .adjust_stock(&actor, book_id, request.delta)
        .await
        .map_err(map_application_error)?;
    Ok(Json(StockResponse {
        book_id: book_id.to_string(),
        quantity_on_hand,
    }))
}

// 割引率0の場合は解除され、null を返す
async fn set_discount(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(book_id): Path<Uuid>,
    Json(request): Json<SetDiscountRequest>,
) -> ApiResult<Json<Option<DiscountResponse>>> {
    let period = state
        .catalog
        .set_discount(&actor, BookId::from_uuid(book_id), request.into())
        .await
        .map_err(map_application_error)?;
    Ok(Json(period.as_ref().map(DiscountResponse::from_period)))
}

async fn view_cart(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> ApiResult<Json<CartResponse>> {
    let view = state
        .cart
        .view_cart(&actor)
        .await
        .map_err(map_application_error)?;
    Ok(Json(CartResponse::from_view(&view)))
}

async fn add_to_cart(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(request): Json<AddToCartRequest>,
) -> ApiResult<Json<CartMutationResponse>> {
    let mutation = state
        .cart
        .add_to_cart(&actor, BookId::from_uuid(request.book_id), request.quantity)
        .await
        .map_err(map_application_error)?;
    Ok(Json(mutation.into()))
}

async fn update_cart_quantity(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(book_id): Path<Uuid>,
    Json(request): Json<UpdateQuantityRequest>,
) -> ApiResult<Json<CartMutationResponse>> {
    let mutation = state
        .cart
        .update_quantity(&actor, BookId::from_uuid(book_id), request.quantity)
        .await
        .map_err(map_application_error)?;
    Ok(Json(mutation.into()))
}

async fn remove_from_cart(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(book_id): Path<Uuid>,
) -> ApiResult<Json<CartMutationResponse>> {
    let mutation = state
        .cart
        .remove(&actor, BookId::from_uuid(book_id))
        .await
        .map_err(map_application_error)?;
    Ok(Json(mutation.into()))
}

async fn view_wishlist(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> ApiResult<Json<Vec<CatalogEntryResponse>>> {
    let entries = state
        .wishlist
        .view(&actor)
        .await
        .map_err(map_application_error)?;
    Ok(Json(entries.iter().map(CatalogEntryResponse::from_entry).collect()))
}

async fn toggle_wishlist(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(book_id): Path<Uuid>,
) -> ApiResult<Json<WishlistToggleResponse>> {
    let book_id = BookId::from_uuid(book_id);
    let in_wishlist = state
        .wishlist
        .toggle(&actor, book_id)
        .await
        .map_err(map_application_error)?;
    Ok(Json(WishlistToggleResponse {
        book_id: book_id.to_string(),
        in_wishlist,
    }))
}

async fn preview_checkout(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> ApiResult<Json<CheckoutPreviewResponse>> {
    let preview = state
        .checkout
        .preview(&actor)
        .await
        .map_err(map_application_error)?;
    Ok(Json(CheckoutPreviewResponse::from_preview(&preview)))
}

async fn confirm_checkout(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> ApiResult<(StatusCode, Json<CheckoutReceiptResponse>)> {
    let receipt = state
        .checkout
        .confirm(&actor)
        .await
        .map_err(map_application_error)?;
    Ok((
        StatusCode::CREATED,
        Json(CheckoutReceiptResponse::from_receipt(&receipt)),
    ))
}

async fn my_orders(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> ApiResult<Json<Vec<OrderResponse>>> {
    let orders = state
        .orders
        .my_orders(&actor)
        .await
        .map_err(map_application_error)?;
    Ok(Json(orders.iter().map(OrderResponse::from_order).collect()))
}

async fn outstanding_count(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> ApiResult<Json<OrderCountResponse>> {
    let count = state
        .orders
        .outstanding_count(&actor)
        .await
        .map_err(map_application_error)?;
    Ok(Json(OrderCountResponse { count }))
}

fn parse_order_key(raw: &str) -> ApiResult<OrderKey> {
    OrderKey::parse(raw).map_err(|e| map_application_error(e.into()))
}

async fn cancel_order(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(request): Json<OrderKeyRequest>,
) -> ApiResult<Json<CancelResponse>> {
    let key = parse_order_key(&request.order_key)?;
    let outcome = state
        .orders
        .cancel(&actor, key)
        .await
        .map_err(map_application_error)?;
    Ok(Json(outcome.into()))
}

async fn delete_order(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(request): Json<OrderKeyRequest>,
) -> ApiResult<StatusCode> {
    let key = parse_order_key(&request.order_key)?;
    state
        .orders
        .delete(&actor, key)
        .await
        .map_err(map_application_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn bulk_cancel_orders(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(request): Json<BulkOrdersRequest>,
) -> ApiResult<Json<BulkOutcomeResponse>> {
    let outcome = state
        .orders
        .cancel_many(&actor, &request.orders)
        .await
        .map_err(map_application_error)?;
    Ok(Json(outcome.into()))
}

async fn bulk_delete_orders(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(request): Json<BulkOrdersRequest>,
) -> ApiResult<Json<BulkOutcomeResponse>> {
    let outcome = state
        .orders
        .delete_many(&actor, &request.orders)
        .await
        .map_err(map_application_error)?;
    Ok(Json(outcome.into()))
}

async fn lookup_fulfillment(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Query(request): Query<FulfillmentRequest>,
) -> ApiResult<Json<FulfillmentPreviewResponse>> {
    let preview = state
        .fulfillment
        .lookup(&actor, &request.claim_code, &request.user_id)
        .await
        .map_err(map_application_error)?;
    Ok(Json(FulfillmentPreviewResponse::from_preview(&preview)))
}

async fn confirm_fulfillment(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(request): Json<FulfillmentRequest>,
) -> ApiResult<Json<OrderResponse>> {
    let order = state
        .fulfillment
        .confirm(&actor, &request.claim_code, &request.user_id)
        .await
        .map_err(map_application_error)?;
    Ok(Json(OrderResponse::from_order(&order)))
}

async fn book_reviews(
    State(state): State<AppState>,
    Path(book_id): Path<Uuid>,
) -> ApiResult<Json<BookReviewsResponse>> {
    let reviews = state
        .reviews
        .reviews_for_book(BookId::from_uuid(book_id))
        .await
        .map_err(map_application_error)?;
    Ok(Json(BookReviewsResponse::from_reviews(&reviews)))
}

async fn submit_review(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(book_id): Path<Uuid>,
    Json(request): Json<ReviewRequest>,
) -> ApiResult<(StatusCode, Json<ReviewResponse>)> {
    let review = state
        .reviews
        .submit_review(
            &actor,
            BookId::from_uuid(book_id),
            request.rating,
            request.comment,
        )
        .await
        .map_err(map_application_error)?;
    Ok((StatusCode::CREATED, Json(ReviewResponse::from_review(&review))))
}

async fn reply_to_review(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path((book_id, review_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<ReplyRequest>,
) -> ApiResult<(StatusCode, Json<ReviewResponse>)> {
    let reply = state
        .reviews
        .reply(
            &actor,
            BookId::from_uuid(book_id),
            ReviewId::from_uuid(review_id),
            request.comment,
        )
        .await
        .map_err(map_application_error)?;
    Ok((StatusCode::CREATED, Json(ReviewResponse::from_review(&reply))))
}

// 認証済みの利用者に、失効していないお知らせを返す
async fn active_announcements(
    State(state): State<AppState>,
    CurrentActor(_actor): CurrentActor,
) -> ApiResult<Json<Vec<AnnouncementResponse>>> {
    let announcements = state
        .announcements
        .active()
        .await
        .map_err(map_application_error)?;
    Ok(Json(
        announcements
            .iter()
            .map(AnnouncementResponse::from_announcement)
            .collect(),
    ))
}

async fn create_announcement(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(request): Json<AnnouncementRequest>,
) -> ApiResult<(StatusCode, Json<AnnouncementResponse>)> {
    let announcement = state
        .announcements
        .create(&actor, request.into())
        .await
        .map_err(map_application_error)?;
    Ok((
        StatusCode::CREATED,
        Json(AnnouncementResponse::from_announcement(&announcement)),
    ))
}

async fn update_announcement(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(announcement_id): Path<Uuid>,
    Json(request): Json<AnnouncementRequest>,
) -> ApiResult<Json<AnnouncementResponse>> {
    let announcement = state
        .announcements
        .update(&actor, AnnouncementId::from_uuid(announcement_id), request.into())
        .await
        .map_err(map_application_error)?;
    Ok(Json(AnnouncementResponse::from_announcement(&announcement)))
}

async fn delete_announcement(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(announcement_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .announcements
        .delete(&actor, AnnouncementId::from_uuid(announcement_id))
        .await
        .map_err(map_application_error)?;
    Ok(StatusCode::NO_CONTENT)
}

// アプリケーションエラーを適切なHTTPステータスコードとエラーコードにマッピング
pub fn map_application_error(err: ApplicationError) -> (StatusCode, Json<ApiError>) {
    let status = match &err {
        ApplicationError::Validation(_) => StatusCode::BAD_REQUEST,
        ApplicationError::Unauthorized(_) => StatusCode::FORBIDDEN,
        ApplicationError::NotFound(_) => StatusCode::NOT_FOUND,
        ApplicationError::Conflict(_) => StatusCode::CONFLICT,
        ApplicationError::Repository(e) => {
            tracing::error!(error = %e, "request failed with a repository error");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (
        status,
        Json(ApiError {
            error: err.to_string(),
            code: err.code().to_string(),
        }),
    )
}

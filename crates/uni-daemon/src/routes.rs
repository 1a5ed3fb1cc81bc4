//! Axum router and all HTTP handlers for uni-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Handlers are generic over the store so the scenario
//! tests in `tests/` can compose the router over the in-memory one.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::error;
use uni_lifecycle::{LifecycleError, Store};

use crate::{
    api_types::{
        ActorQuery, ActorRequest, CreateProductRequest, ErrorResponse, HealthResponse,
        InitiateDeliveryResponse, MessageListResponse, MessageResponse, OrderListResponse,
        OrderResponse, OrderViewResponse, PostMessageRequest, ProductResponse, ReserveRequest,
        SendCodeRequest, SendCodeResponse, VerifyDeliveryRequest,
    },
    state::AppState,
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router<S: Store + 'static>(state: Arc<AppState<S>>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/products", post(create_product))
        .route("/v1/products/:id", get(get_product))
        .route("/v1/products/:id/reserve", post(reserve))
        .route("/v1/orders/:id", get(get_order_view))
        .route("/v1/orders/:id/confirm", post(confirm))
        .route("/v1/orders/:id/cancel", post(cancel))
        .route("/v1/orders/:id/delivery/initiate", post(initiate_delivery))
        .route("/v1/orders/:id/delivery/send-code", post(send_code))
        .route("/v1/orders/:id/delivery/verify", post(verify_delivery))
        .route("/v1/orders/:id/messages", get(list_messages).post(post_message))
        .route("/v1/members/:id/purchases", get(purchases))
        .route("/v1/members/:id/sales", get(sales))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

fn refuse(err: LifecycleError) -> Response {
    let status = match err {
        LifecycleError::NotFound(_) => StatusCode::NOT_FOUND,
        LifecycleError::Forbidden(_) => StatusCode::FORBIDDEN,
        LifecycleError::InvalidTransition { .. }
        | LifecycleError::InvalidOperation(_)
        | LifecycleError::InvalidCode => StatusCode::BAD_REQUEST,
        LifecycleError::Conflict(_) => StatusCode::CONFLICT,
        LifecycleError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    // Storage detail stays in the logs, not in the response body.
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(error = %err, "storage failure");
        return (
            status,
            Json(ErrorResponse {
                error: "internal storage error".to_string(),
            }),
        )
            .into_response();
    }
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

fn bad_request(msg: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: msg.to_string(),
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

async fn health<S: Store>(State(st): State<Arc<AppState<S>>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

async fn create_product<S: Store>(
    State(st): State<Arc<AppState<S>>>,
    Json(req): Json<CreateProductRequest>,
) -> Response {
    if req.title.trim().is_empty() {
        return bad_request("title must not be empty");
    }
    if req.price_cents <= 0 {
        return bad_request("price_cents must be positive");
    }
    match st
        .engine
        .store()
        .insert_product(uni_schemas::NewProduct {
            seller_id: req.seller_id,
            title: req.title,
            price_cents: req.price_cents,
        })
        .await
    {
        Ok(product) => {
            (StatusCode::CREATED, Json(ProductResponse { product })).into_response()
        }
        Err(e) => refuse(LifecycleError::from(e)),
    }
}

async fn get_product<S: Store>(
    State(st): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
) -> Response {
    match st.engine.product(id).await {
        Ok(product) => (StatusCode::OK, Json(ProductResponse { product })).into_response(),
        Err(e) => refuse(e),
    }
}

async fn reserve<S: Store>(
    State(st): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
    Json(req): Json<ReserveRequest>,
) -> Response {
    match st.engine.reserve(id, &req.buyer_id).await {
        Ok(order) => (StatusCode::CREATED, Json(OrderResponse { order })).into_response(),
        Err(e) => refuse(e),
    }
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

async fn get_order_view<S: Store>(
    State(st): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
    Query(q): Query<ActorQuery>,
) -> Response {
    match st.engine.order_view(id, &q.actor_id).await {
        Ok(view) => (StatusCode::OK, Json(OrderViewResponse { view })).into_response(),
        Err(e) => refuse(e),
    }
}

async fn confirm<S: Store>(
    State(st): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
    Json(req): Json<ActorRequest>,
) -> Response {
    match st.engine.confirm(id, &req.actor_id).await {
        Ok(order) => (StatusCode::OK, Json(OrderResponse { order })).into_response(),
        Err(e) => refuse(e),
    }
}

async fn cancel<S: Store>(
    State(st): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
    Json(req): Json<ActorRequest>,
) -> Response {
    match st.engine.cancel(id, &req.actor_id).await {
        Ok(order) => (StatusCode::OK, Json(OrderResponse { order })).into_response(),
        Err(e) => refuse(e),
    }
}

// ---------------------------------------------------------------------------
// Delivery handshake
// ---------------------------------------------------------------------------

async fn initiate_delivery<S: Store>(
    State(st): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
    Json(req): Json<ActorRequest>,
) -> Response {
    match st.engine.initiate_delivery(id, &req.actor_id).await {
        Ok(code) => (StatusCode::OK, Json(InitiateDeliveryResponse { code })).into_response(),
        Err(e) => refuse(e),
    }
}

async fn send_code<S: Store>(
    State(st): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
    Json(req): Json<SendCodeRequest>,
) -> Response {
    match st.engine.send_code(id, &req.actor_id, &req.email).await {
        Ok(()) => (StatusCode::ACCEPTED, Json(SendCodeResponse { queued: true })).into_response(),
        Err(e) => refuse(e),
    }
}

async fn verify_delivery<S: Store>(
    State(st): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
    Json(req): Json<VerifyDeliveryRequest>,
) -> Response {
    match st.engine.verify_delivery(id, &req.actor_id, &req.code).await {
        Ok(order) => (StatusCode::OK, Json(OrderResponse { order })).into_response(),
        Err(e) => refuse(e),
    }
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

async fn post_message<S: Store>(
    State(st): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
    Json(req): Json<PostMessageRequest>,
) -> Response {
    if req.body.trim().is_empty() {
        return bad_request("message body must not be empty");
    }
    match st.engine.post_message(id, &req.sender_id, &req.body).await {
        Ok(message) => (StatusCode::CREATED, Json(MessageResponse { message })).into_response(),
        Err(e) => refuse(e),
    }
}

async fn list_messages<S: Store>(
    State(st): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
    Query(q): Query<ActorQuery>,
) -> Response {
    match st.engine.list_messages(id, &q.actor_id).await {
        Ok(messages) => {
            (StatusCode::OK, Json(MessageListResponse { messages })).into_response()
        }
        Err(e) => refuse(e),
    }
}

// ---------------------------------------------------------------------------
// Member listings
// ---------------------------------------------------------------------------

async fn purchases<S: Store>(
    State(st): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Response {
    match st.engine.orders_for_buyer(&id).await {
        Ok(orders) => (StatusCode::OK, Json(OrderListResponse { orders })).into_response(),
        Err(e) => refuse(e),
    }
}

async fn sales<S: Store>(
    State(st): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Response {
    match st.engine.orders_for_seller(&id).await {
        Ok(orders) => (StatusCode::OK, Json(OrderListResponse { orders })).into_response(),
        Err(e) => refuse(e),
    }
}

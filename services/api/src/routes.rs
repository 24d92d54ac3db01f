//! API service routes

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, patch, post, put},
};
use dispatch::{
    actor::Session,
    lifecycle::StatusUpdate,
    listing::OrderFilters,
    models::{OrderDraft, UserPatch},
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::ApiResult,
    middleware::auth_middleware,
    models::{AvailabilityRequest, CreateUserRequest, UserResponse},
    state::AppState,
};

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/users/me", patch(update_profile))
        .route("/users/:id", get(get_user))
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/:id/accept", post(accept_order))
        .route("/orders/:id/status", patch(update_order_status))
        .route("/drivers/me/availability", put(set_availability))
        .route("/drivers/:id/stats", get(driver_stats))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/users", post(create_user))
        .merge(protected_routes)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = common::database::health_check(&state.db_pool).await;
    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if database { "ok" } else { "degraded" },
            "service": "api-service",
            "database": database,
        })),
    )
}

/// Register a user record
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = state.marketplace.create_user(payload.into()).await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// Get a user by ID
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let user = state.marketplace.get_user(id).await?;
    Ok(Json(UserResponse::from(user)))
}

/// Patch the caller's own profile
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(patch): Json<UserPatch>,
) -> ApiResult<impl IntoResponse> {
    let user = state.marketplace.update_profile(&session, patch).await?;
    Ok(Json(UserResponse::from(user)))
}

/// Create an order for the calling customer
pub async fn create_order(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(draft): Json<OrderDraft>,
) -> ApiResult<impl IntoResponse> {
    let order = state.marketplace.create_order(&session, draft).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// List the orders visible to the caller
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(filters): Query<OrderFilters>,
) -> ApiResult<impl IntoResponse> {
    let orders = state.marketplace.list_orders(&session, filters).await?;
    Ok(Json(orders))
}

/// Claim a pending order for the calling driver
pub async fn accept_order(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let order = state.marketplace.accept_order(&session, id).await?;
    Ok(Json(order))
}

pub async fn update_order_status(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
    Json(update): Json<StatusUpdate>,
) -> ApiResult<impl IntoResponse> {
    let order = state
        .marketplace
        .update_order_status(&session, id, update)
        .await?;
    Ok(Json(order))
}

pub async fn set_availability(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(payload): Json<AvailabilityRequest>,
) -> ApiResult<impl IntoResponse> {
    let profile = state
        .marketplace
        .set_driver_availability(&session, payload.is_available)
        .await?;
    Ok(Json(profile))
}

/// Stats for the calling driver
pub async fn driver_stats(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let stats = state.marketplace.driver_stats(&session, id).await?;
    Ok(Json(stats))
}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tripwise_booking::SeatSummary;
use tripwise_catalog::TripQuery;
use tripwise_core::PaymentBreakdown;
use tripwise_shared::{NewTrip, Trip, TripPatch};
use crate::actor::Actor;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QuoteParams {
    pub passengers: u32,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/trips", post(create_trip).get(list_trips))
        .route("/v1/trips/{id}", get(get_trip).patch(update_trip).delete(delete_trip))
        .route("/v1/trips/{id}/cancel", post(cancel_trip))
        .route("/v1/trips/{id}/quote", get(quote))
        .route("/v1/trips/{id}/seats", get(seat_summary))
}

/// POST /v1/trips
/// The acting user becomes the owner
async fn create_trip(
    State(state): State<AppState>,
    Actor(user_id): Actor,
    Json(mut input): Json<NewTrip>,
) -> Result<(StatusCode, Json<Trip>), AppError> {
    input.owner_id = user_id;
    let trip = state.catalog.create_trip(input).await?;
    Ok((StatusCode::CREATED, Json(trip)))
}

/// GET /v1/trips
async fn list_trips(
    State(state): State<AppState>,
    Query(query): Query<TripQuery>,
) -> Result<Json<Vec<Trip>>, AppError> {
    Ok(Json(state.catalog.list_trips(&query).await?))
}

async fn get_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
) -> Result<Json<Trip>, AppError> {
    Ok(Json(state.catalog.get_trip(&trip_id).await?))
}

/// PATCH /v1/trips/{id}
/// Owner only
async fn update_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
    Actor(user_id): Actor,
    Json(patch): Json<TripPatch>,
) -> Result<Json<Trip>, AppError> {
    Ok(Json(state.catalog.update_trip(&trip_id, &user_id, patch).await?))
}

/// DELETE /v1/trips/{id}
async fn delete_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
    Actor(user_id): Actor,
) -> Result<StatusCode, AppError> {
    state.catalog.delete_trip(&trip_id, &user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/trips/{id}/cancel
async fn cancel_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
    Actor(user_id): Actor,
) -> Result<Json<Trip>, AppError> {
    Ok(Json(state.catalog.cancel_trip(&trip_id, &user_id).await?))
}

/// GET /v1/trips/{id}/quote?passengers=n
async fn quote(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
    Query(params): Query<QuoteParams>,
) -> Result<Json<PaymentBreakdown>, AppError> {
    Ok(Json(state.coordinator.quote(&trip_id, params.passengers).await?))
}

async fn seat_summary(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
) -> Result<Json<SeatSummary>, AppError> {
    Ok(Json(state.coordinator.seat_summary(&trip_id).await?))
}

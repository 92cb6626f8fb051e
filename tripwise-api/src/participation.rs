use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde::Deserialize;
use tripwise_booking::{CancelReceipt, JoinReceipt, JoinRequest, PaymentConfirmation};
use tripwise_core::CoreError;
use tripwise_shared::Participant;
use crate::actor::Actor;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct JoinTripRequest {
    pub passengers: u32,
    pub payment: PaymentConfirmation,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/trips/{id}/participants", get(list_participants).post(join_trip))
        .route("/v1/trips/{id}/participants/{user_id}", delete(leave_trip))
        .route("/v1/users/{id}/bookings", get(user_bookings))
}

async fn list_participants(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
) -> Result<Json<Vec<Participant>>, AppError> {
    Ok(Json(state.coordinator.participants(&trip_id).await?))
}

/// POST /v1/trips/{id}/participants
/// Joins the acting user after the advance payment was confirmed
async fn join_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
    Actor(user_id): Actor,
    Json(req): Json<JoinTripRequest>,
) -> Result<(StatusCode, Json<JoinReceipt>), AppError> {
    let receipt = state
        .coordinator
        .join(JoinRequest {
            trip_id,
            user_id,
            passengers: req.passengers,
            payment: req.payment,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// DELETE /v1/trips/{id}/participants/{user_id}
/// Users may only cancel their own reservation
async fn leave_trip(
    State(state): State<AppState>,
    Path((trip_id, user_id)): Path<(String, String)>,
    Actor(actor): Actor,
) -> Result<Json<CancelReceipt>, AppError> {
    if actor != user_id {
        return Err(CoreError::Forbidden(format!(
            "user {} cannot cancel the reservation of {}",
            actor, user_id
        ))
        .into());
    }
    Ok(Json(state.coordinator.cancel(&trip_id, &user_id).await?))
}

/// GET /v1/users/{id}/bookings
/// Booking history, newest first, cancelled reservations included
async fn user_bookings(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Participant>>, AppError> {
    Ok(Json(state.coordinator.bookings_for(&user_id).await?))
}

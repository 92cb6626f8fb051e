use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tripwise_catalog::NewUser;
use tripwise_shared::User;
use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/users", post(register_user))
        .route("/v1/users/{id}", get(get_user))
}

async fn register_user(
    State(state): State<AppState>,
    Json(input): Json<NewUser>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let user = state.users.register_user(input).await?;
    tracing::info!("Registered user {} ({})", user.id, user.email);
    Ok((StatusCode::CREATED, Json(user)))
}

async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<User>, AppError> {
    Ok(Json(state.users.get_user(&user_id).await?))
}

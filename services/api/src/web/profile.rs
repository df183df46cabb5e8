//! services/api/src/web/profile.rs

use crate::error::ApiError;
use crate::web::protocol::{ProfilePayload, ProfileView};
use crate::web::rest::parse_body;
use crate::web::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Extension, State},
    response::Json,
};
use std::sync::Arc;
use uuid::Uuid;
use writing_coach_core::domain::{Personality, ProfileUpdate};

/// The user's coaching preferences. A default profile is created on first access.
#[utoipa::path(
    get,
    path = "/profile/",
    responses((status = 200, description = "The user's profile", body = ProfileView)),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn get_profile_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<Json<ProfileView>, ApiError> {
    let profile = app_state.db.get_or_create_profile(user_id).await?;
    Ok(Json(ProfileView::from(&profile)))
}

/// Update background, goals or coaching style. Omitted fields are left as they are.
#[utoipa::path(
    post,
    path = "/profile/",
    request_body = ProfilePayload,
    responses(
        (status = 200, description = "The updated profile", body = ProfileView),
        (status = 400, description = "Malformed body or unknown personality")
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn update_profile_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    payload: Result<Json<ProfilePayload>, JsonRejection>,
) -> Result<Json<ProfileView>, ApiError> {
    let request = parse_body(payload)?;
    let personality_preference = request
        .personality_preference
        .as_deref()
        .map(|raw| raw.trim().parse::<Personality>())
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    app_state.db.get_or_create_profile(user_id).await?;
    let profile = app_state
        .db
        .update_profile(
            user_id,
            ProfileUpdate {
                bio_context: request.bio_context.map(|s| s.trim().to_string()),
                writing_goals: request.writing_goals.map(|s| s.trim().to_string()),
                personality_preference,
            },
        )
        .await?;
    Ok(Json(ProfileView::from(&profile)))
}

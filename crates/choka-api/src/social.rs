use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use choka_db::{Database, WriteOutcome};
use choka_types::api::{Claims, FollowResponse};
use choka_types::models::UserSummary;

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};
use crate::run_blocking;
use crate::validation::FieldErrors;

/// Adds the edge `follower -> followed`. Following twice is a conflict.
pub fn follow(db: &Database, follower: Uuid, followed: Uuid) -> ApiResult<FollowResponse> {
    if follower == followed {
        return Err(FieldErrors::single("user_id", "cannot follow yourself").into());
    }
    if !db.user_exists(followed)? {
        return Err(ApiError::NotFound("user"));
    }

    match db.insert_follow(follower, followed)? {
        WriteOutcome::Applied => info!("{} now follows {}", follower, followed),
        WriteOutcome::Duplicate => return Err(ApiError::Conflict("already following".into())),
    }

    Ok(FollowResponse {
        following: true,
        is_mutual_follow: db.is_mutual_follow(follower, followed)?,
    })
}

pub fn unfollow(db: &Database, follower: Uuid, followed: Uuid) -> ApiResult<FollowResponse> {
    if !db.delete_follow(follower, followed)? {
        return Err(ApiError::NotFound("follow"));
    }
    info!("{} unfollowed {}", follower, followed);
    Ok(FollowResponse {
        following: false,
        is_mutual_follow: false,
    })
}

pub fn is_mutual_follow(db: &Database, a: Uuid, b: Uuid) -> ApiResult<bool> {
    Ok(db.is_mutual_follow(a, b)?)
}

pub fn list_following(db: &Database, user: Uuid) -> ApiResult<Vec<UserSummary>> {
    if !db.user_exists(user)? {
        return Err(ApiError::NotFound("user"));
    }
    Ok(db.list_following(user)?)
}

pub fn list_followers(db: &Database, user: Uuid) -> ApiResult<Vec<UserSummary>> {
    if !db.user_exists(user)? {
        return Err(ApiError::NotFound("user"));
    }
    Ok(db.list_followers(user)?)
}

// -- Handlers --

pub async fn follow_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let response = run_blocking(&state, move |s| follow(&s.db, claims.sub, user_id)).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn unfollow_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<FollowResponse>> {
    let response = run_blocking(&state, move |s| unfollow(&s.db, claims.sub, user_id)).await?;
    Ok(Json(response))
}

pub async fn following(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<UserSummary>>> {
    let users = run_blocking(&state, move |s| list_following(&s.db, user_id)).await?;
    Ok(Json(users))
}

pub async fn followers(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<UserSummary>>> {
    let users = run_blocking(&state, move |s| list_followers(&s.db, user_id)).await?;
    Ok(Json(users))
}

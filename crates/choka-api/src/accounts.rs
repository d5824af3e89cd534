use axum::{
    Extension, Json,
    extract::{Path, State},
};
use tracing::info;
use uuid::Uuid;

use choka_db::{Database, WriteOutcome};
use choka_types::api::{Claims, ProfileResponse, UpdateProfileRequest};

use crate::access;
use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::middleware::Viewer;
use crate::run_blocking;
use crate::validation::{FieldErrors, INTRODUCE_MAX};

/// Public profile with counters and the viewer's relation to it.
pub fn profile(db: &Database, user_id: Uuid, viewer: Option<Uuid>) -> ApiResult<ProfileResponse> {
    let row = db.get_user_by_id(user_id)?.ok_or(ApiError::NotFound("user"))?;
    let (following_count, followers_count) = db.follow_counts(user_id)?;

    let mut response = ProfileResponse::base(&row.user);
    response.trip_count = db.count_trips(Some(user_id))?;
    response.following_count = following_count;
    response.followers_count = followers_count;

    if let Some(viewer) = viewer.filter(|v| *v != user_id) {
        response.viewer_follows = db.follow_exists(viewer, user_id)?;
        response.follows_viewer = db.follow_exists(user_id, viewer)?;
        response.is_mutual_follow = response.viewer_follows && response.follows_viewer;
    }
    response.can_edit = viewer.is_some_and(|v| access::can_edit_profile(v, user_id));
    Ok(response)
}

pub fn update_profile(
    db: &Database,
    actor: Uuid,
    user_id: Uuid,
    req: &UpdateProfileRequest,
) -> ApiResult<ProfileResponse> {
    if !db.user_exists(user_id)? {
        return Err(ApiError::NotFound("user"));
    }
    access::require(access::can_edit_profile(actor, user_id))?;

    let mut errors = FieldErrors::new();
    errors.username("username", &req.username);
    errors.max_len("introduce", &req.introduce, INTRODUCE_MAX);
    errors.finish()?;

    if db.update_profile(user_id, &req.username, &req.introduce)? == WriteOutcome::Duplicate {
        return Err(ApiError::Conflict("username already taken".into()));
    }
    info!("Profile {} updated", user_id);
    profile(db, user_id, Some(actor))
}

// -- Handlers --

pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Viewer(viewer): Viewer,
) -> ApiResult<Json<ProfileResponse>> {
    let viewer = viewer.map(|c| c.sub);
    let response = run_blocking(&state, move |s| profile(&s.db, user_id, viewer)).await?;
    Ok(Json(response))
}

pub async fn edit_profile(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> ApiResult<Json<ProfileResponse>> {
    let response = run_blocking(&state, move |s| update_profile(&s.db, claims.sub, user_id, &req)).await?;
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::social;
    use crate::test_support::{state, user};

    fn edit(username: &str, introduce: &str) -> UpdateProfileRequest {
        UpdateProfileRequest {
            username: username.into(),
            introduce: introduce.into(),
        }
    }

    #[test]
    fn counts_and_viewer_flags() {
        let s = state();
        let a = user(&s, "a");
        let b = user(&s, "b");
        social::follow(&s.db, a, b).unwrap();

        let seen_by_a = profile(&s.db, b, Some(a)).unwrap();
        assert_eq!(seen_by_a.followers_count, 1);
        assert_eq!(seen_by_a.following_count, 0);
        assert!(seen_by_a.viewer_follows);
        assert!(!seen_by_a.follows_viewer);
        assert!(!seen_by_a.is_mutual_follow);
        assert!(!seen_by_a.can_edit);

        social::follow(&s.db, b, a).unwrap();
        assert!(profile(&s.db, b, Some(a)).unwrap().is_mutual_follow);

        let own = profile(&s.db, b, Some(b)).unwrap();
        assert!(own.can_edit);
        assert!(!own.viewer_follows);

        let anonymous = profile(&s.db, b, None).unwrap();
        assert!(!anonymous.can_edit && !anonymous.viewer_follows && !anonymous.is_mutual_follow);
        assert!(matches!(profile(&s.db, Uuid::new_v4(), None), Err(ApiError::NotFound("user"))));
    }

    #[test]
    fn only_owner_edits() {
        let s = state();
        let a = user(&s, "a");
        let b = user(&s, "b");
        assert!(matches!(update_profile(&s.db, b, a, &edit("hijack", "")), Err(ApiError::Forbidden)));
        assert_eq!(profile(&s.db, a, None).unwrap().user.username, "a");

        let updated = update_profile(&s.db, a, a, &edit("angler", "釣り好きです")).unwrap();
        assert_eq!(updated.user.username, "angler");
        assert_eq!(updated.introduce, "釣り好きです");
    }

    #[test]
    fn edit_validation_and_conflicts() {
        let s = state();
        let a = user(&s, "a");
        user(&s, "taken");

        let long = "x".repeat(INTRODUCE_MAX + 1);
        let Err(ApiError::Validation(errors)) = update_profile(&s.db, a, a, &edit("", &long)) else {
            panic!("expected validation error");
        };
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["username", "introduce"]);

        assert!(matches!(update_profile(&s.db, a, a, &edit("taken", "")), Err(ApiError::Conflict(_))));
    }
}

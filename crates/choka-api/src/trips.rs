use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, warn};
use uuid::Uuid;

use choka_db::{Database, TripFields};
use choka_types::Prefecture;
use choka_types::api::{
    Claims, CommentRequest, CommentView, CreateTripRequest, NewCatchResult, PageQuery, TripDetail, TripSummary,
    UpdateTripRequest,
};
use choka_types::models::{CatchResult, Comment, Page, Trip, UserSummary};

use crate::access;
use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::middleware::Viewer;
use crate::run_blocking;
use crate::validation::{COMMENT_MAX, FieldErrors, IMAGE_REF_MAX, TITLE_MAX, TRIP_CONTENT_MAX};

pub const PAGE_SIZE: u32 = 6;

/// Checks the trip form and its nested results; returns the parsed prefecture.
fn validate_trip(title: &str, prefecture: &str, content: &str, results: &[NewCatchResult]) -> ApiResult<Prefecture> {
    let mut errors = FieldErrors::new();
    errors.required("title", title, TITLE_MAX);
    let prefecture = errors.prefecture("prefecture", prefecture);
    errors.required("content", content, TRIP_CONTENT_MAX);
    for (i, result) in results.iter().enumerate() {
        errors.fish_name(&format!("results[{i}].fish_name"), &result.fish_name);
        if let Some(image) = &result.image {
            errors.max_len(&format!("results[{i}].image"), image, IMAGE_REF_MAX);
        }
    }
    errors.finish()?;
    prefecture.ok_or_else(|| ApiError::Validation(FieldErrors::single("prefecture", "this field is required")))
}

fn load_trip(db: &Database, trip_id: Uuid) -> ApiResult<Trip> {
    db.get_trip(trip_id)?.ok_or(ApiError::NotFound("trip"))
}

fn author_of(db: &Database, user_id: Uuid) -> ApiResult<UserSummary> {
    let row = db.get_user_by_id(user_id)?.ok_or(ApiError::NotFound("user"))?;
    Ok(UserSummary::from(&row.user))
}

fn summary(db: &Database, trip: Trip) -> ApiResult<TripSummary> {
    Ok(TripSummary {
        author: author_of(db, trip.owner_id)?,
        results: db.results_for_trip(trip.id)?,
        trip,
    })
}

pub fn create_trip(db: &Database, owner: Uuid, req: &CreateTripRequest) -> ApiResult<TripSummary> {
    let prefecture = validate_trip(&req.title, &req.prefecture, &req.content, &req.results)?;
    let fields = TripFields {
        title: &req.title,
        prefecture,
        content: &req.content,
    };
    let trip = db.create_trip(owner, &fields, &req.results)?;
    info!("Trip {} created by {} with {} result(s)", trip.id, owner, req.results.len());
    summary(db, trip)
}

pub fn update_trip(db: &Database, actor: Uuid, trip_id: Uuid, req: &UpdateTripRequest) -> ApiResult<TripSummary> {
    let trip = load_trip(db, trip_id)?;
    if !access::can_edit_trip(actor, &trip) {
        warn!("{} tried to edit trip {} owned by {}", actor, trip.id, trip.owner_id);
        return Err(ApiError::Forbidden);
    }

    let prefecture = validate_trip(&req.title, &req.prefecture, &req.content, &req.results)?;
    let fields = TripFields {
        title: &req.title,
        prefecture,
        content: &req.content,
    };
    let removed = db.update_trip(trip.id, &fields, &req.results, &req.deleted_result_ids)?;
    info!(
        "Trip {} updated: {} result(s) added, {} removed",
        trip.id,
        req.results.len(),
        removed
    );
    summary(db, load_trip(db, trip.id)?)
}

/// Removes the trip with its results and comments.
pub fn delete_trip(db: &Database, actor: Uuid, trip_id: Uuid) -> ApiResult<()> {
    let trip = load_trip(db, trip_id)?;
    access::require(access::can_delete_trip(actor, &trip))?;
    db.delete_trip(trip.id)?;
    info!("Trip {} deleted by {}", trip.id, actor);
    Ok(())
}

pub fn add_comment(db: &Database, trip_id: Uuid, author: Uuid, content: &str) -> ApiResult<Comment> {
    let trip = load_trip(db, trip_id)?;
    let mut errors = FieldErrors::new();
    errors.required("content", content, COMMENT_MAX);
    errors.finish()?;
    Ok(db.insert_comment(trip.id, author, content)?)
}

/// Deletes a comment; returns the trip it belonged to.
pub fn delete_comment(db: &Database, actor: Uuid, comment_id: Uuid) -> ApiResult<Uuid> {
    let comment = db.get_comment(comment_id)?.ok_or(ApiError::NotFound("comment"))?;
    access::require(access::can_delete_comment(actor, &comment))?;
    db.delete_comment(comment.id)?;
    Ok(comment.trip_id)
}

pub fn trip_detail(db: &Database, trip_id: Uuid, viewer: Option<Uuid>) -> ApiResult<TripDetail> {
    let trip = load_trip(db, trip_id)?;
    let comments = db
        .comments_for_trip(trip.id)?
        .into_iter()
        .map(|comment| CommentView {
            can_delete: viewer.is_some_and(|v| access::can_delete_comment(v, &comment)),
            comment,
        })
        .collect();

    Ok(TripDetail {
        author: author_of(db, trip.owner_id)?,
        results: db.results_for_trip(trip.id)?,
        can_edit: viewer.is_some_and(|v| access::can_edit_trip(v, &trip)),
        comments,
        trip,
    })
}

/// Trips newest first, `PAGE_SIZE` per page, optionally for one owner.
pub fn list_trips(db: &Database, owner: Option<Uuid>, page: u32) -> ApiResult<Page<TripSummary>> {
    if let Some(owner) = owner {
        if !db.user_exists(owner)? {
            return Err(ApiError::NotFound("user"));
        }
    }

    let total = db.count_trips(owner)?;
    let num_pages = (total.div_ceil(PAGE_SIZE as u64) as u32).max(1);
    if page == 0 || page > num_pages {
        return Err(ApiError::NotFound("page"));
    }

    let offset = (page as u64 - 1) * PAGE_SIZE as u64;
    let trips = db.list_trips(owner, PAGE_SIZE, offset)?;

    let trip_ids: Vec<Uuid> = trips.iter().map(|t| t.id).collect();
    let mut results_by_trip: HashMap<Uuid, Vec<CatchResult>> = HashMap::new();
    for result in db.results_for_trips(&trip_ids)? {
        results_by_trip.entry(result.trip_id).or_default().push(result);
    }

    let mut authors: HashMap<Uuid, UserSummary> = HashMap::new();
    let mut items = Vec::with_capacity(trips.len());
    for trip in trips {
        let author = match authors.get(&trip.owner_id) {
            Some(author) => author.clone(),
            None => {
                let author = author_of(db, trip.owner_id)?;
                authors.insert(trip.owner_id, author.clone());
                author
            }
        };
        items.push(TripSummary {
            results: results_by_trip.remove(&trip.id).unwrap_or_default(),
            author,
            trip,
        });
    }

    Ok(Page::new(items, page, PAGE_SIZE, total))
}

// -- Handlers --

pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Page<TripSummary>>> {
    let page = query.page.unwrap_or(1);
    let trips = run_blocking(&state, move |s| list_trips(&s.db, None, page)).await?;
    Ok(Json(trips))
}

pub async fn user_trips(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Page<TripSummary>>> {
    let page = query.page.unwrap_or(1);
    let trips = run_blocking(&state, move |s| list_trips(&s.db, Some(user_id), page)).await?;
    Ok(Json(trips))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<CreateTripRequest>,
) -> ApiResult<impl IntoResponse> {
    let trip = run_blocking(&state, move |s| create_trip(&s.db, claims.sub, &req)).await?;
    Ok((StatusCode::CREATED, Json(trip)))
}

pub async fn detail(
    State(state): State<AppState>,
    Path(trip_id): Path<Uuid>,
    Viewer(viewer): Viewer,
) -> ApiResult<Json<TripDetail>> {
    let viewer = viewer.map(|c| c.sub);
    let detail = run_blocking(&state, move |s| trip_detail(&s.db, trip_id, viewer)).await?;
    Ok(Json(detail))
}

pub async fn update(
    State(state): State<AppState>,
    Path(trip_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<UpdateTripRequest>,
) -> ApiResult<Json<TripSummary>> {
    let trip = run_blocking(&state, move |s| update_trip(&s.db, claims.sub, trip_id, &req)).await?;
    Ok(Json(trip))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(trip_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<StatusCode> {
    run_blocking(&state, move |s| delete_trip(&s.db, claims.sub, trip_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn comment(
    State(state): State<AppState>,
    Path(trip_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<CommentRequest>,
) -> ApiResult<impl IntoResponse> {
    let comment = run_blocking(&state, move |s| add_comment(&s.db, trip_id, claims.sub, &req.content)).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn remove_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<StatusCode> {
    run_blocking(&state, move |s| delete_comment(&s.db, claims.sub, comment_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
};
use tracing::{info, warn};
use uuid::Uuid;

use choka_db::Database;
use choka_types::api::{Claims, RoomListItem, RoomView, SendMessageRequest};
use choka_types::models::{Message, Room, UserSummary};

use crate::access;
use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::run_blocking;
use crate::validation::{FieldErrors, MESSAGE_MAX};

/// The one room shared by `a` and `b`, created on first use.
pub fn get_or_create_room(db: &Database, a: Uuid, b: Uuid) -> ApiResult<Room> {
    if a == b {
        return Err(FieldErrors::single("user_id", "a room needs two different users").into());
    }
    for id in [a, b] {
        if !db.user_exists(id)? {
            return Err(ApiError::NotFound("user"));
        }
    }

    let (room, created) = db.get_or_create_room(a, b)?;
    if created {
        info!("Opened room {} between {} and {}", room.id, a, b);
    }
    Ok(room)
}

fn load_room(db: &Database, room_id: Uuid) -> ApiResult<Room> {
    db.get_room(room_id)?.ok_or(ApiError::NotFound("room"))
}

pub fn post_message(db: &Database, room_id: Uuid, sender: Uuid, content: &str) -> ApiResult<Message> {
    let room = load_room(db, room_id)?;
    if !access::can_send_message(sender, &room) {
        warn!("{} tried to post in room {} without membership", sender, room_id);
        return Err(ApiError::Forbidden);
    }

    let mut errors = FieldErrors::new();
    errors.required("content", content, MESSAGE_MAX);
    errors.finish()?;

    Ok(db.insert_message(room.id, sender, content)?)
}

/// Newest first. Every call reads a fresh snapshot.
pub fn list_messages(db: &Database, actor: Uuid, room_id: Uuid) -> ApiResult<Vec<Message>> {
    let room = load_room(db, room_id)?;
    access::require(access::can_view_room(actor, &room))?;
    Ok(db.list_messages(room.id)?)
}

pub fn room_view(db: &Database, actor: Uuid, room_id: Uuid) -> ApiResult<RoomView> {
    let room = load_room(db, room_id)?;
    access::require(access::can_view_room(actor, &room))?;

    let mut members = Vec::with_capacity(2);
    for id in room.members {
        let row = db.get_user_by_id(id)?.ok_or(ApiError::NotFound("user"))?;
        members.push(UserSummary::from(&row.user));
    }
    let [a, b] = room.members;

    Ok(RoomView {
        messages: db.list_messages(room.id)?,
        is_mutual_follow: db.is_mutual_follow(a, b)?,
        members,
        room,
    })
}

pub fn list_rooms(db: &Database, actor: Uuid) -> ApiResult<Vec<RoomListItem>> {
    let mut items = Vec::new();
    for room in db.list_rooms_for_user(actor)? {
        let Some(partner_id) = room.partner_of(actor) else {
            continue;
        };
        let Some(partner) = db.get_user_by_id(partner_id)? else {
            continue;
        };
        items.push(RoomListItem {
            is_mutual_follow: db.is_mutual_follow(actor, partner_id)?,
            partner: UserSummary::from(&partner.user),
            room,
        });
    }
    Ok(items)
}

// -- Handlers --

/// POST /rooms/with/{user_id}: redirects to the shared room.
pub async fn open_room(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Redirect> {
    let room = run_blocking(&state, move |s| get_or_create_room(&s.db, claims.sub, user_id)).await?;
    Ok(Redirect::to(&format!("/rooms/{}", room.id)))
}

pub async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<RoomView>> {
    let view = run_blocking(&state, move |s| room_view(&s.db, claims.sub, room_id)).await?;
    Ok(Json(view))
}

pub async fn my_rooms(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<RoomListItem>>> {
    let rooms = run_blocking(&state, move |s| list_rooms(&s.db, claims.sub)).await?;
    Ok(Json(rooms))
}

pub async fn get_messages(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<Message>>> {
    let messages = run_blocking(&state, move |s| list_messages(&s.db, claims.sub, room_id)).await?;
    Ok(Json(messages))
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let message = run_blocking(&state, move |s| post_message(&s.db, room_id, claims.sub, &req.content)).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::social;
    use crate::test_support::{state, user};

    #[test]
    fn repeated_calls_return_same_room() {
        let s = state();
        let a = user(&s, "a");
        let b = user(&s, "b");

        let first = get_or_create_room(&s.db, a, b).unwrap();
        let again = get_or_create_room(&s.db, a, b).unwrap();
        let swapped = get_or_create_room(&s.db, b, a).unwrap();
        assert_eq!(first.id, again.id);
        assert_eq!(first.id, swapped.id);
        assert_eq!(list_rooms(&s.db, a).unwrap().len(), 1);
    }

    #[test]
    fn room_needs_two_known_users() {
        let s = state();
        let a = user(&s, "a");
        assert!(matches!(get_or_create_room(&s.db, a, a), Err(ApiError::Validation(_))));
        assert!(matches!(
            get_or_create_room(&s.db, a, Uuid::new_v4()),
            Err(ApiError::NotFound("user"))
        ));
    }

    #[test]
    fn outsiders_cannot_post_even_when_mutual() {
        let s = state();
        let a = user(&s, "a");
        let b = user(&s, "b");
        let c = user(&s, "c");
        social::follow(&s.db, a, c).unwrap();
        social::follow(&s.db, c, a).unwrap();

        let room = get_or_create_room(&s.db, a, b).unwrap();
        assert!(matches!(post_message(&s.db, room.id, c, "hi"), Err(ApiError::Forbidden)));
        assert!(matches!(list_messages(&s.db, c, room.id), Err(ApiError::Forbidden)));
        assert!(matches!(room_view(&s.db, c, room.id), Err(ApiError::Forbidden)));
    }

    #[test]
    fn content_must_be_present_and_bounded() {
        let s = state();
        let a = user(&s, "a");
        let b = user(&s, "b");
        let room = get_or_create_room(&s.db, a, b).unwrap();

        assert!(matches!(post_message(&s.db, room.id, a, ""), Err(ApiError::Validation(_))));
        assert!(matches!(post_message(&s.db, room.id, a, "  \n"), Err(ApiError::Validation(_))));
        let too_long = "あ".repeat(MESSAGE_MAX + 1);
        assert!(matches!(post_message(&s.db, room.id, a, &too_long), Err(ApiError::Validation(_))));
        assert!(post_message(&s.db, room.id, a, &"あ".repeat(MESSAGE_MAX)).is_ok());
    }

    #[test]
    fn mutual_flag_is_advisory() {
        let s = state();
        let a = user(&s, "user1");
        let b = user(&s, "user2");
        social::follow(&s.db, a, b).unwrap();

        let room = get_or_create_room(&s.db, a, b).unwrap();
        let view = room_view(&s.db, b, room.id).unwrap();
        assert!(!view.is_mutual_follow);
        assert!(post_message(&s.db, room.id, a, "釣れた?").is_ok());
        assert!(post_message(&s.db, room.id, b, "まだ").is_ok());

        social::follow(&s.db, b, a).unwrap();
        let view = room_view(&s.db, a, room.id).unwrap();
        assert!(view.is_mutual_follow);
        assert_eq!(view.messages.len(), 2);
        assert_eq!(view.messages[0].content, "まだ");
        assert!(post_message(&s.db, room.id, b, "今度行こう").is_ok());
    }

    #[test]
    fn unknown_room_is_not_found() {
        let s = state();
        let a = user(&s, "a");
        assert!(matches!(post_message(&s.db, Uuid::new_v4(), a, "hi"), Err(ApiError::NotFound("room"))));
    }
}

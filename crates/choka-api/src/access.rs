//! Authorization policy. Pure functions over ids and loaded entities; callers
//! turn a `false` into [`ApiError::Forbidden`] via [`require`].
//!
//! Mutual follow is absent here: it is shown next to a room but
//! never decides whether a member may read or send.

use uuid::Uuid;

use choka_types::models::{Comment, Room, Trip};

use crate::error::ApiError;

pub fn can_edit_profile(actor: Uuid, target: Uuid) -> bool {
    actor == target
}

pub fn can_view_room(actor: Uuid, room: &Room) -> bool {
    room.has_member(actor)
}

pub fn can_send_message(actor: Uuid, room: &Room) -> bool {
    can_view_room(actor, room)
}

pub fn can_edit_trip(actor: Uuid, trip: &Trip) -> bool {
    actor == trip.owner_id
}

pub fn can_delete_trip(actor: Uuid, trip: &Trip) -> bool {
    can_edit_trip(actor, trip)
}

pub fn can_delete_comment(actor: Uuid, comment: &Comment) -> bool {
    actor == comment.author_id
}

pub fn require(allowed: bool) -> Result<(), ApiError> {
    if allowed { Ok(()) } else { Err(ApiError::Forbidden) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use choka_types::Prefecture;

    fn trip(owner_id: Uuid) -> Trip {
        Trip {
            id: Uuid::new_v4(),
            owner_id,
            title: "t".into(),
            prefecture: Prefecture::Hokkaido,
            content: "c".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn profile_is_self_only() {
        let a = Uuid::new_v4();
        assert!(can_edit_profile(a, a));
        assert!(!can_edit_profile(a, Uuid::new_v4()));
    }

    #[test]
    fn room_membership_gates_view_and_send() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let room = Room {
            id: Uuid::new_v4(),
            members: [a, b],
            created_at: Utc::now(),
        };
        assert!(can_view_room(a, &room));
        assert!(can_send_message(b, &room));
        let outsider = Uuid::new_v4();
        assert!(!can_view_room(outsider, &room));
        assert!(!can_send_message(outsider, &room));
    }

    #[test]
    fn trip_and_comment_ownership() {
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let t = trip(owner);
        assert!(can_edit_trip(owner, &t));
        assert!(can_delete_trip(owner, &t));
        assert!(!can_edit_trip(other, &t));
        assert!(!can_delete_trip(other, &t));

        let comment = Comment {
            id: Uuid::new_v4(),
            trip_id: t.id,
            author_id: other,
            author_username: "other".into(),
            content: "hi".into(),
            created_at: Utc::now(),
        };
        // The trip owner cannot remove someone else's comment.
        assert!(!can_delete_comment(owner, &comment));
        assert!(can_delete_comment(other, &comment));
    }

    #[test]
    fn require_maps_to_forbidden() {
        assert!(require(true).is_ok());
        assert!(matches!(require(false), Err(ApiError::Forbidden)));
    }
}

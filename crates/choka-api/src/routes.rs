use axum::{
    Json, Router, middleware,
    routing::{delete, get, post, put},
};
use serde_json::{Value, json};

use crate::auth::{self, AppState};
use crate::middleware::{attach_viewer, require_auth};
use crate::{accounts, rooms, search, social, trips};

/// The full HTTP surface. Layers such as CORS and tracing are added by the
/// binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/accounts/login", get(auth::login_page).post(auth::login))
        .route("/accounts/signup", post(auth::signup))
        .route("/users/{user_id}/trips", get(trips::user_trips))
        .route("/users/{user_id}/following", get(social::following))
        .route("/users/{user_id}/followers", get(social::followers))
        .route("/trips", get(trips::index))
        .route("/trips/search", get(search::search_form).post(search::search_trips))
        .with_state(state.clone());

    // Public, but the response depends on who is looking.
    let viewer_routes = Router::new()
        .route("/users/{user_id}", get(accounts::get_profile))
        .route("/trips/{trip_id}", get(trips::detail))
        .layer(middleware::from_fn_with_state(state.clone(), attach_viewer))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/users/{user_id}", put(accounts::edit_profile))
        .route("/users/{user_id}/follow", post(social::follow_user).delete(social::unfollow_user))
        .route("/rooms", get(rooms::my_rooms))
        .route("/rooms/with/{user_id}", post(rooms::open_room))
        .route("/rooms/{room_id}", get(rooms::get_room))
        .route("/rooms/{room_id}/messages", get(rooms::get_messages).post(rooms::send_message))
        .route("/trips", post(trips::create))
        .route("/trips/{trip_id}", put(trips::update).delete(trips::delete))
        .route("/trips/{trip_id}/comments", post(trips::comment))
        .route("/comments/{comment_id}", delete(trips::remove_comment))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(viewer_routes)
        .merge(protected_routes)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

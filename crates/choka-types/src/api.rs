use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Prefecture;
use crate::models::{CatchResult, Comment, Message, Room, Trip, User, UserSummary};

// -- JWT Claims --

/// Bearer token claims. `sub` is the user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Accounts --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password1: String,
    pub password2: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignupResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub username: String,
    #[serde(default)]
    pub introduce: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub user: UserSummary,
    pub introduce: String,
    pub trip_count: u64,
    pub following_count: u64,
    pub followers_count: u64,
    /// Viewer-relative flags; all false for anonymous viewers.
    pub viewer_follows: bool,
    pub follows_viewer: bool,
    pub is_mutual_follow: bool,
    pub can_edit: bool,
}

impl ProfileResponse {
    pub fn base(user: &User) -> Self {
        Self {
            user: user.into(),
            introduce: user.introduce.clone(),
            trip_count: 0,
            following_count: 0,
            followers_count: 0,
            viewer_follows: false,
            follows_viewer: false,
            is_mutual_follow: false,
            can_edit: false,
        }
    }
}

// -- Social graph --

#[derive(Debug, Serialize, Deserialize)]
pub struct FollowResponse {
    pub following: bool,
    pub is_mutual_follow: bool,
}

// -- Rooms --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RoomView {
    pub room: Room,
    pub members: Vec<UserSummary>,
    pub messages: Vec<Message>,
    /// Advisory only: clients show a banner when false, sending is still allowed.
    pub is_mutual_follow: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RoomListItem {
    pub room: Room,
    pub partner: UserSummary,
    pub is_mutual_follow: bool,
}

// -- Trips --

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewCatchResult {
    pub fish_name: String,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTripRequest {
    pub title: String,
    pub prefecture: String,
    pub content: String,
    #[serde(default)]
    pub results: Vec<NewCatchResult>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateTripRequest {
    pub title: String,
    pub prefecture: String,
    pub content: String,
    #[serde(default)]
    pub results: Vec<NewCatchResult>,
    #[serde(default)]
    pub deleted_result_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TripSummary {
    pub trip: Trip,
    pub author: UserSummary,
    pub results: Vec<CatchResult>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommentView {
    pub comment: Comment,
    pub can_delete: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TripDetail {
    pub trip: Trip,
    pub author: UserSummary,
    pub results: Vec<CatchResult>,
    pub comments: Vec<CommentView>,
    pub can_edit: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommentRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
}

// -- Search --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchRequest {
    pub fish_name: String,
    /// Empty means every prefecture.
    #[serde(default)]
    pub prefecture: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub result_id: Uuid,
    pub fish_name: String,
    pub image_url: Option<String>,
    pub trip_id: Uuid,
    pub trip_title: String,
    pub prefecture: Prefecture,
    pub user_id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// Choices for the search form. An empty prefecture means all of them.
#[derive(Debug, Serialize, Deserialize)]
pub struct SearchForm {
    pub prefectures: Vec<Prefecture>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChartImage {
    pub content_type: String,
    /// Base64 of the rendered image bytes.
    pub data: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
    /// Index 0 is January.
    pub histogram: [u32; 12],
    pub chart: ChartImage,
}

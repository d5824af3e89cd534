use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::FixedOffset;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use choka_db::{Database, NewUser, WriteOutcome};
use choka_types::api::{Claims, LoginRequest, LoginResponse, NextQuery, SignupRequest, SignupResponse};

use crate::chart::ChartRenderer;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::run_blocking;
use crate::validation::{FieldErrors, PASSWORD_MIN, normalize_email};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub chart: Box<dyn ChartRenderer>,
    /// Offset used to find a catch's calendar month.
    pub utc_offset: FixedOffset,
}

const TOKEN_DAYS: i64 = 30;

/// GET /accounts/login, the target of unauthenticated redirects.
pub async fn login_page(Query(query): Query<NextQuery>) -> impl IntoResponse {
    Json(json!({
        "login": "POST /accounts/login",
        "fields": ["email", "password"],
        "next": query.next.unwrap_or_else(|| "/trips".to_string()),
    }))
}

pub async fn signup(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SignupRequest>,
) -> ApiResult<impl IntoResponse> {
    let response = run_blocking(&state, move |state| register_user(state, &req)).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let response = run_blocking(&state, move |state| authenticate(state, &req)).await?;
    Ok(Json(response))
}

pub fn register_user(state: &AppStateInner, req: &SignupRequest) -> ApiResult<SignupResponse> {
    let email = normalize_email(&req.email);

    let mut errors = FieldErrors::new();
    errors.username("username", &req.username);
    errors.email("email", &email);
    if req.password1.chars().count() < PASSWORD_MIN {
        errors.add("password1", format!("at least {PASSWORD_MIN} characters"));
    }
    if req.password1 != req.password2 {
        errors.add("password2", "the two password fields didn't match");
    }
    errors.finish()?;

    if state.db.get_user_by_username(&req.username)?.is_some() {
        return Err(ApiError::Conflict("username already taken".into()));
    }
    if state.db.get_user_by_email(&email)?.is_some() {
        return Err(ApiError::Conflict("email already registered".into()));
    }

    let password_hash = hash_password(&req.password1)?;
    let user_id = Uuid::new_v4();
    let outcome = state.db.create_user(
        user_id,
        &NewUser {
            username: &req.username,
            email: &email,
            password_hash: &password_hash,
            is_staff: false,
            is_superuser: false,
        },
    )?;
    if outcome == WriteOutcome::Duplicate {
        return Err(ApiError::Conflict("username or email already registered".into()));
    }

    info!("New user {} ({})", req.username, user_id);
    let token = create_token(&state.jwt_secret, user_id, &req.username)?;
    Ok(SignupResponse { user_id, token })
}

pub fn authenticate(state: &AppStateInner, req: &LoginRequest) -> ApiResult<LoginResponse> {
    let row = state
        .db
        .get_user_by_email(&normalize_email(&req.email))?
        .ok_or(ApiError::Unauthorized)?;

    let parsed_hash =
        PasswordHash::new(&row.password).map_err(|e| anyhow::anyhow!("stored hash unreadable: {}", e))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    let token = create_token(&state.jwt_secret, row.user.id, &row.user.username)?;
    Ok(LoginResponse {
        user_id: row.user.id,
        username: row.user.username,
        token,
    })
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

pub fn create_token(secret: &str, user_id: Uuid, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

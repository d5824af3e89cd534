pub mod access;
pub mod accounts;
pub mod auth;
pub mod chart;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod rooms;
pub mod routes;
pub mod search;
pub mod social;
pub mod trips;
pub mod validation;

use tracing::error;

use crate::auth::{AppState, AppStateInner};
use crate::error::{ApiError, ApiResult};

/// Run blocking DB work off the async runtime.
pub(crate) async fn run_blocking<F, T>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&AppStateInner) -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("worker task failed"))
        })?
}

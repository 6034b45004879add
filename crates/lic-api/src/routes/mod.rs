//! # API Route Modules
//!
//! | Prefix                 | Module        |
//! |------------------------|---------------|
//! | `/v1/licenses/*`       | [`licenses`]  |
//! | `/v1/templates/*`      | [`templates`] |

pub mod licenses;
pub mod templates;

use axum::Router;

use crate::error::AppError;
use crate::state::AppState;

/// All authenticated API routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(licenses::router())
        .merge(templates::router())
}

/// Run synchronous issuance or store work off the async executor.
///
/// Signing is CPU-bound and the file store does blocking I/O.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(format!("blocking task failed: {e}")))?
}

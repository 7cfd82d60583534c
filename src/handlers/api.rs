use crate::{db, models::Advertisement, AppState};
use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

/// GET /api/ads/random
/// Any active ad, or `null` when there is none.
pub async fn random_ad(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Option<Advertisement>>, StatusCode> {
    db::random_ad(&state.db).await.map(Json).map_err(|e| {
        tracing::error!("Failed to pick a random ad: {:?}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

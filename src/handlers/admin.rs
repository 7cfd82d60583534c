use crate::{
    auth::AuthUser,
    consistency, db,
    handlers::{set_flash_and_redirect, take_flash},
    models::{CounterDiscrepancy, PlatformTotals, Role},
    AppState,
};
use askama::Template;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use std::sync::Arc;

#[derive(Template)]
#[template(path = "admin.html")]
struct AdminTemplate {
    totals: PlatformTotals,
    checked: bool,
    discrepancies: Vec<CounterDiscrepancy>,
    flash_error: Option<String>,
}

/// GET /admin
pub async fn admin(auth: AuthUser, State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if let Err(response) = require_admin(&state, &auth.user_id, &jar).await {
        return response;
    }
    let (jar, flash) = take_flash(jar);
    (jar, render(&state, false, Vec::new(), flash.error).await).into_response()
}

/// POST /admin/counters
/// Recount every denormalized counter and list the ones that drifted.
pub async fn check_counters(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Response {
    if let Err(response) = require_admin(&state, &auth.user_id, &jar).await {
        return response;
    }

    match consistency::check_counters(&state.db).await {
        Ok(discrepancies) => render(&state, true, discrepancies, None).await,
        Err(e) => {
            tracing::error!("Counter check failed: {:?}", e);
            render(
                &state,
                false,
                Vec::new(),
                Some("The counter check could not be completed.".into()),
            )
            .await
        }
    }
}

async fn render(
    state: &AppState,
    checked: bool,
    discrepancies: Vec<CounterDiscrepancy>,
    flash_error: Option<String>,
) -> Response {
    let totals = match db::platform_totals(&state.db).await {
        Ok(t) => t,
        Err(e) => {
            tracing::error!("Failed to load platform totals: {:?}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load platform totals.",
            )
                .into_response();
        }
    };

    AdminTemplate {
        totals,
        checked,
        discrepancies,
        flash_error,
    }
    .into_response()
}

async fn require_admin(state: &AppState, user_id: &str, jar: &CookieJar) -> Result<(), Response> {
    match db::has_role(&state.db, user_id, Role::Admin).await {
        Ok(true) => Ok(()),
        Ok(false) => {
            tracing::warn!(user_id, "Non-admin denied access to /admin");
            Err(set_flash_and_redirect(
                jar.clone(),
                None,
                Some("Access denied - admin only"),
                "/dashboard",
            ))
        }
        Err(e) => {
            tracing::error!("Failed to check roles for {}: {:?}", user_id, e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Failed to check roles.").into_response())
        }
    }
}

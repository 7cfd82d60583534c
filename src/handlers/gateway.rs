//! HTTP surface of the gateway interstitial. The state machine itself lives
//! in [`crate::gateway`]; these handlers only load it, park ad-showing visits
//! in the visit store, and drive them from the page's requests.

use crate::{
    gateway::{GatewayController, GatewayError, GatewayState},
    handlers::user_agent,
    models::AdType,
    AppState,
};
use askama::Template;
use axum::{
    extract::{Form, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

struct AdView {
    title: String,
    image_url: Option<String>,
    html_content: Option<String>,
}

#[derive(Template)]
#[template(path = "gateway.html")]
struct GatewayTemplate {
    code: String,
    /// Only ad-showing visits are stored; a no-ad page links straight on.
    visit: Option<String>,
    original_url: String,
    title: String,
    description: Option<String>,
    ad: Option<AdView>,
    remaining: u32,
    can_continue: bool,
    auto_navigate: bool,
}

#[derive(Deserialize)]
pub struct VisitParams {
    visit: String,
}

/// GET /g/:code
pub async fn gateway(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    headers: HeaderMap,
) -> Response {
    let ua = user_agent(&headers);
    let mut controller = GatewayController::new(state.config.gateway);
    controller.load(&*state, &code, ua.as_deref()).await;

    let page = match controller.state() {
        GatewayState::Ready(page) => page,
        GatewayState::NotFound | GatewayState::Error(_) | GatewayState::Loading => {
            return Redirect::to("/").into_response();
        }
    };

    let ad = page.ad.as_ref().map(|ad| AdView {
        title: ad.title.clone(),
        image_url: ad.image_url.clone().filter(|_| ad.ad_type == AdType::Image),
        html_content: ad.html_content.clone().filter(|_| ad.ad_type == AdType::Html),
    });
    let title = page.link.title.clone();
    let description = page.link.description.clone();
    let original_url = page.link.original_url.clone();
    let remaining = controller.remaining();
    let can_continue = controller.can_continue();
    let auto_navigate = controller.should_auto_navigate();

    let visit = if ad.is_some() {
        let visit = state.visits.insert(controller);
        tracing::debug!(open_visits = state.visits.len(), "Gateway visit opened for '{}'", code);
        Some(visit)
    } else {
        None
    };

    GatewayTemplate {
        code,
        visit,
        original_url,
        title,
        description,
        ad,
        remaining,
        can_continue,
        auto_navigate,
    }
    .into_response()
}

/// GET /g/:code/status?visit=
pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Query(params): Query<VisitParams>,
) -> Response {
    if state.visits.short_code(&params.visit).as_deref() != Some(code.as_str()) {
        return StatusCode::NOT_FOUND.into_response();
    }
    match state.visits.status(&params.visit) {
        Some(status) => Json(status).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// POST /g/:code/continue
pub async fn continue_visit(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    headers: HeaderMap,
    Form(params): Form<VisitParams>,
) -> Response {
    let ua = user_agent(&headers);
    let Some(outcome) = state.visits.continue_visit(&params.visit, &code, ua.as_deref()) else {
        // Expired, never existed or opened for another link: start over.
        return Redirect::to(&format!("/g/{code}")).into_response();
    };

    match outcome {
        Ok(continuation) => {
            continuation.record(&*state).await;
            Redirect::to(&continuation.original_url).into_response()
        }
        Err(GatewayError::CountdownRunning { remaining }) => (
            StatusCode::CONFLICT,
            format!("Please wait {remaining} more second(s) before continuing."),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!("Gateway: continue on '{}' refused: {}", code, e);
            Redirect::to("/").into_response()
        }
    }
}

/// GET /g/:code/ad?visit=
pub async fn open_ad(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Query(params): Query<VisitParams>,
) -> Response {
    if state.visits.short_code(&params.visit).as_deref() != Some(code.as_str()) {
        return Redirect::to(&format!("/g/{code}")).into_response();
    }
    match state.visits.ad_url(&params.visit) {
        Some(click_url) => Redirect::to(&click_url).into_response(),
        None => Redirect::to(&format!("/g/{code}")).into_response(),
    }
}

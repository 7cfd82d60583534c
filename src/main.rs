use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    routing::{get, post},
    Router,
};
use tokio::sync::broadcast::error::RecvError;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod auth;
mod cache;
mod categories;
mod config;
mod consistency;
mod db;
mod forms;
mod gateway;
mod handlers;
mod models;
mod shortcode;
mod useragent;
mod visits;

use auth::{SessionEvent, SessionStore};
use cache::LinkCache;
use visits::VisitStore;

// ── Shared application state ───────────────────────────────────────────────

pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: config::AppConfig,
    pub cache: LinkCache,
    pub sessions: SessionStore,
    /// Ad-showing gateway visits, each owning its countdown.
    pub visits: VisitStore,
}

impl AppState {
    pub fn new(db: sqlx::SqlitePool, config: config::AppConfig) -> Self {
        let sessions = SessionStore::new(config.session_duration_hours);
        let visits = VisitStore::new(config.visit_ttl_secs, config.max_visits);
        Self {
            db,
            config,
            cache: LinkCache::new(),
            sessions,
            visits,
        }
    }
}

// ── Router ─────────────────────────────────────────────────────────────────

pub fn build_router(state: Arc<AppState>) -> Router {
    let auth_router = Router::new()
        .route("/", get(handlers::account::auth_page))
        .route("/sign-in", post(handlers::account::sign_in))
        .route("/sign-up", post(handlers::account::sign_up))
        .route("/sign-out", get(handlers::account::sign_out));

    let dashboard_router = Router::new()
        .route("/", get(handlers::dashboard::dashboard))
        .route("/links", post(handlers::dashboard::create_link))
        .route("/links/:id/toggle", post(handlers::dashboard::toggle_link))
        .route("/links/:id/tags", post(handlers::dashboard::save_link_tags))
        .route("/links/:id/blocked", post(handlers::dashboard::save_link_blocked))
        .route("/links/:id/analytics", get(handlers::dashboard::link_analytics))
        .route("/ads", post(handlers::dashboard::create_ad))
        .route("/ads/:id/toggle", post(handlers::dashboard::toggle_ad))
        .route("/ads/:id/categories", post(handlers::dashboard::save_ad_categories));

    let admin_router = Router::new()
        .route("/", get(handlers::admin::admin))
        .route("/counters", post(handlers::admin::check_counters));

    let gateway_router = Router::new()
        .route("/:code", get(handlers::gateway::gateway))
        .route("/:code/status", get(handlers::gateway::status))
        .route("/:code/continue", post(handlers::gateway::continue_visit))
        .route("/:code/ad", get(handlers::gateway::open_ad));

    Router::new()
        .route("/", get(handlers::account::index))
        // Health check, no auth required
        .route("/health", get(|| async { axum::http::StatusCode::OK }))
        .route("/api/ads/random", get(handlers::api::random_ad))
        .nest("/auth", auth_router)
        .nest("/dashboard", dashboard_router)
        .nest("/admin", admin_router)
        .nest("/g", gateway_router)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

// ── Entry point ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (ignore error if file is absent; env vars may already be set)
    dotenvy::dotenv().ok();

    // Initialise structured logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "adlink=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::AppConfig::from_env()?;
    tracing::info!("Starting AdLink on {}:{}", config.host, config.port);
    tracing::info!("Base URL: {}", config.base_url);
    tracing::info!(
        "Gateway countdown: {}s (auto-navigate: {})",
        config.gateway.countdown_secs,
        config.gateway.auto_navigate
    );

    let db = db::connect(&config.database_url).await?;

    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        let hash = auth::hash_password(password)?;
        let admin = db::ensure_admin(&db, email, &hash).await?;
        tracing::info!("Admin account ready: {}", admin.email);
    }

    let bind_addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState::new(db, config));
    db::warm_cache(&state.db, &state.cache).await?;

    // Session audit trail; the receiver is dropped when the task ends.
    let mut session_events = state.sessions.subscribe();
    let audit = tokio::spawn(async move {
        loop {
            match session_events.recv().await {
                Ok(SessionEvent::SignedIn { user_id }) => tracing::info!(%user_id, "Signed in"),
                Ok(SessionEvent::SignedOut { user_id }) => tracing::info!(%user_id, "Signed out"),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!("Session audit skipped {} event(s)", missed)
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Expired gateway visits are swept here rather than on the request path.
    let visits = state.visits.clone();
    let pruner = tokio::spawn(async move {
        let mut every = tokio::time::interval(Duration::from_secs(60));
        loop {
            every.tick().await;
            let pruned = visits.prune();
            if pruned > 0 {
                tracing::debug!(pruned, open_visits = visits.len(), "Expired gateway visits pruned");
            }
        }
    });

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    audit.abort();
    pruner.abort();
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {:?}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
    };
    use std::time::Duration;
    use tower::ServiceExt;

    const CHROME_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                             (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

    async fn test_state(countdown_secs: &str) -> Arc<AppState> {
        let countdown = countdown_secs.to_owned();
        let config = config::AppConfig::from_lookup(|key| match key {
            "BASE_URL" => Some("https://adl.example.com".into()),
            "GATEWAY_COUNTDOWN_SECS" => Some(countdown.clone()),
            _ => None,
        })
        .unwrap();
        Arc::new(AppState::new(db::testing::pool().await, config))
    }

    async fn send(app: &Router, request: Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::USER_AGENT, CHROME_UA)
            .body(Body::empty())
            .unwrap()
    }

    fn get_with_session(uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::COOKIE, format!("session_id={token}"))
            .body(Body::empty())
            .unwrap()
    }

    fn post_form(uri: &str, body: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::USER_AGENT, CHROME_UA)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(token) = token {
            builder = builder.header(header::COOKIE, format!("session_id={token}"));
        }
        builder.body(Body::from(body.to_owned())).unwrap()
    }

    fn location(response: &Response) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    /// Pull the visit id out of the rendered gateway page.
    fn visit_id(html: &str) -> String {
        let marker = "name=\"visit\" value=\"";
        let start = html.find(marker).unwrap() + marker.len();
        let end = start + html[start..].find('"').unwrap();
        html[start..end].to_owned()
    }

    async fn session_for(state: &AppState, email: &str) -> String {
        let user = db::find_user_by_email(&state.db, email).await.unwrap().unwrap();
        state.sessions.create(&user.id).await
    }

    async fn count(state: &AppState, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&state.db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn health_check_is_open() {
        let app = build_router(test_state("7").await);
        let response = send(&app, get("/health")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_short_code_redirects_home() {
        let app = build_router(test_state("7").await);

        let response = send(&app, get("/g/Zz9yX8wV")).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");

        let response = send(&app, get("/g/not-a-code")).await;
        assert_eq!(location(&response), "/");
    }

    #[tokio::test]
    async fn inactive_link_redirects_home() {
        let state = test_state("7").await;
        let provider = db::testing::provider(&state.db, "writer@example.com").await;
        let link = db::testing::link(&state.db, &provider.id, "Ab3xY9zK").await;
        db::toggle_link_active(&state.db, &provider.id, &link.id)
            .await
            .unwrap();
        let app = build_router(state);

        let response = send(&app, get("/g/Ab3xY9zK")).await;
        assert_eq!(location(&response), "/");
    }

    #[tokio::test]
    async fn gateway_without_ads_links_straight_on() {
        let state = test_state("7").await;
        let provider = db::testing::provider(&state.db, "writer@example.com").await;
        db::testing::link(&state.db, &provider.id, "Ab3xY9zK").await;
        let app = build_router(state.clone());

        let response = send(&app, get("/g/Ab3xY9zK")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("id=\"continue-link\""));
        assert!(!html.contains("name=\"visit\""));

        assert_eq!(state.visits.len(), 0);
        assert_eq!(count(&state, "ad_impressions").await, 0);
        assert_eq!(count(&state, "content_clicks").await, 0);
    }

    #[tokio::test]
    async fn no_ad_traffic_stores_no_visits() {
        let state = test_state("7").await;
        let provider = db::testing::provider(&state.db, "writer@example.com").await;
        db::testing::link(&state.db, &provider.id, "Ab3xY9zK").await;
        let app = build_router(state.clone());

        for _ in 0..200 {
            let response = send(&app, get("/g/Ab3xY9zK")).await;
            assert_eq!(response.status(), StatusCode::OK);
        }
        assert_eq!(state.visits.len(), 0);
    }

    #[tokio::test]
    async fn gateway_with_ad_gates_continue_and_records_one_click() {
        let state = test_state("2").await;
        let provider = db::testing::provider(&state.db, "writer@example.com").await;
        let link = db::testing::link(&state.db, &provider.id, "Ab3xY9zK").await;
        let advertiser = db::testing::advertiser(&state.db, "ads@example.com").await;
        let ad = db::testing::image_ad(&state.db, &advertiser.id, "Banner").await;
        let app = build_router(state.clone());

        let response = send(&app, get("/g/Ab3xY9zK")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("ads.example.com"));
        assert!(html.contains("An article"));
        let visit = visit_id(&html);
        assert_eq!(count(&state, "ad_impressions").await, 1);

        let status = body_text(
            send(&app, get(&format!("/g/Ab3xY9zK/status?visit={visit}"))).await,
        )
        .await;
        let status: serde_json::Value = serde_json::from_str(&status).unwrap();
        assert_eq!(status["can_continue"], false);
        assert_eq!(status["auto_navigate"], false);

        // Opening the ad goes to the advertiser and records nothing.
        let response = send(&app, get(&format!("/g/Ab3xY9zK/ad?visit={visit}"))).await;
        assert_eq!(location(&response), "https://advertiser.example.com");

        let form = format!("visit={visit}");
        let early = send(&app, post_form("/g/Ab3xY9zK/continue", &form, None)).await;
        assert_eq!(early.status(), StatusCode::CONFLICT);

        tokio::time::sleep(Duration::from_millis(2_200)).await;

        let status = body_text(
            send(&app, get(&format!("/g/Ab3xY9zK/status?visit={visit}"))).await,
        )
        .await;
        let status: serde_json::Value = serde_json::from_str(&status).unwrap();
        assert_eq!(status["remaining"], 0);
        assert_eq!(status["can_continue"], true);

        let response = send(&app, post_form("/g/Ab3xY9zK/continue", &form, None)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "https://example.com/article");

        // A repeated submit still leaves for the article and adds nothing.
        let replay = send(&app, post_form("/g/Ab3xY9zK/continue", &form, None)).await;
        assert_eq!(replay.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&replay), "https://example.com/article");
        assert_eq!(count(&state, "ad_impressions").await, 1);

        let (link_id, ad_id, browser): (String, Option<String>, Option<String>) =
            sqlx::query_as("SELECT content_link_id, advertisement_id, browser FROM content_clicks")
                .fetch_one(&state.db)
                .await
                .unwrap();
        assert_eq!(link_id, link.id);
        assert_eq!(ad_id.as_deref(), Some(ad.id.as_str()));
        assert_eq!(browser.as_deref(), Some("Chrome"));
        assert_eq!(count(&state, "content_clicks").await, 1);
    }

    #[tokio::test]
    async fn status_of_an_unknown_visit_is_not_found() {
        let app = build_router(test_state("7").await);
        let response = send(&app, get("/g/Ab3xY9zK/status?visit=nope")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn dashboard_requires_sign_in() {
        let app = build_router(test_state("7").await);
        let response = send(&app, get("/dashboard")).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/auth");
    }

    #[tokio::test]
    async fn sign_up_creates_a_provider_and_signs_in() {
        let state = test_state("7").await;
        let app = build_router(state.clone());

        let response = send(
            &app,
            post_form(
                "/auth/sign-up",
                "email=Writer%40Example.com&password=long+enough\
                 &account_type=content_provider&organization=Acme+Press&website=",
                None,
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/dashboard");

        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_owned();
        let token = cookie
            .trim_start_matches("session_id=")
            .split(';')
            .next()
            .unwrap()
            .to_owned();

        let response = send(&app, get_with_session("/dashboard", &token)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Acme Press"));

        let user = db::find_user_by_email(&state.db, "writer@example.com")
            .await
            .unwrap()
            .unwrap();
        assert!(db::get_provider_for_user(&state.db, &user.id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn sign_up_rejects_a_short_password() {
        let state = test_state("7").await;
        let app = build_router(state.clone());

        let response = send(
            &app,
            post_form(
                "/auth/sign-up",
                "email=a%40example.com&password=short&account_type=advertiser&organization=Widgets",
                None,
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response)
            .await
            .contains("Password must be at least 8 characters."));
        assert!(db::find_user_by_email(&state.db, "a@example.com")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn provider_creates_a_tagged_link() {
        let state = test_state("7").await;
        let provider = db::testing::provider(&state.db, "writer@example.com").await;
        let token = session_for(&state, "writer@example.com").await;
        let app = build_router(state.clone());

        let response = send(
            &app,
            post_form(
                "/dashboard/links",
                "url=https%3A%2F%2Fexample.com%2Fpost&title=A+post\
                 &tags=cat-news&tags=cat-sports&blocked=cat-gaming",
                Some(token.as_str()),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/dashboard");

        let links = db::list_links_for_provider(&state.db, &provider.id)
            .await
            .unwrap();
        assert_eq!(links.len(), 1);
        let link = &links[0];
        assert!(shortcode::is_well_formed(&link.short_code));
        assert!(state.cache.get(&link.short_code).is_some());

        let tags = categories::category_ids(&state.db, categories::Association::LinkTags, &link.id)
            .await
            .unwrap();
        assert_eq!(tags, vec!["cat-news".to_owned(), "cat-sports".to_owned()]);
        let blocked =
            categories::category_ids(&state.db, categories::Association::LinkBlocked, &link.id)
                .await
                .unwrap();
        assert_eq!(blocked, vec!["cat-gaming".to_owned()]);
    }

    #[tokio::test]
    async fn provider_link_form_errors_are_flashed() {
        let state = test_state("7").await;
        let provider = db::testing::provider(&state.db, "writer@example.com").await;
        let token = session_for(&state, "writer@example.com").await;
        let app = build_router(state.clone());

        let response = send(
            &app,
            post_form("/dashboard/links", "url=ftp%3A%2F%2Fx&title=T", Some(token.as_str())),
        )
        .await;
        assert_eq!(location(&response), "/dashboard");
        let flash = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.starts_with("flash_error="));
        assert!(flash);
        assert!(db::list_links_for_provider(&state.db, &provider.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn link_with_an_unknown_category_is_not_created() {
        let state = test_state("7").await;
        let provider = db::testing::provider(&state.db, "writer@example.com").await;
        let token = session_for(&state, "writer@example.com").await;
        let app = build_router(state.clone());

        let response = send(
            &app,
            post_form(
                "/dashboard/links",
                "url=https%3A%2F%2Fexample.com%2Fpost&title=A+post\
                 &tags=no-such-category&blocked=cat-gaming",
                Some(token.as_str()),
            ),
        )
        .await;
        assert_eq!(location(&response), "/dashboard");

        assert!(db::list_links_for_provider(&state.db, &provider.id)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(state.cache.len(), 0);
        assert_eq!(count(&state, "content_link_blocked_categories").await, 0);
    }

    #[tokio::test]
    async fn deactivating_a_link_evicts_it_from_the_cache() {
        let state = test_state("7").await;
        let provider = db::testing::provider(&state.db, "writer@example.com").await;
        let link = db::testing::link(&state.db, &provider.id, "Ab3xY9zK").await;
        state.cache.set(models::LinkTarget::from(&link));
        let token = session_for(&state, "writer@example.com").await;
        let app = build_router(state.clone());

        let uri = format!("/dashboard/links/{}/toggle", link.id);
        send(&app, post_form(&uri, "", Some(token.as_str()))).await;
        assert!(state.cache.get("Ab3xY9zK").is_none());
        assert_eq!(location(&send(&app, get("/g/Ab3xY9zK")).await), "/");

        send(&app, post_form(&uri, "", Some(token.as_str()))).await;
        assert!(state.cache.get("Ab3xY9zK").is_some());
    }

    #[tokio::test]
    async fn advertisers_cannot_manage_links() {
        let state = test_state("7").await;
        db::testing::advertiser(&state.db, "ads@example.com").await;
        let token = session_for(&state, "ads@example.com").await;
        let app = build_router(state.clone());

        let response = send(
            &app,
            post_form(
                "/dashboard/links",
                "url=https%3A%2F%2Fexample.com&title=T",
                Some(token.as_str()),
            ),
        )
        .await;
        assert_eq!(location(&response), "/dashboard");
        assert_eq!(count(&state, "content_links").await, 0);
    }

    #[tokio::test]
    async fn advertiser_creates_an_html_ad() {
        let state = test_state("7").await;
        let advertiser = db::testing::advertiser(&state.db, "ads@example.com").await;
        let token = session_for(&state, "ads@example.com").await;
        let app = build_router(state.clone());

        let response = send(
            &app,
            post_form(
                "/dashboard/ads",
                "title=Promo&ad_type=html&image_url=https%3A%2F%2Fads.example.com%2Fx.png\
                 &html_content=%3Cb%3EBuy%3C%2Fb%3E&click_url=https%3A%2F%2Fshop.example.com\
                 &categories=cat-travel",
                Some(token.as_str()),
            ),
        )
        .await;
        assert_eq!(location(&response), "/dashboard");

        let ads = db::list_ads_for_advertiser(&state.db, &advertiser.id)
            .await
            .unwrap();
        assert_eq!(ads.len(), 1);
        assert_eq!(ads[0].ad_type, models::AdType::Html);
        assert!(ads[0].image_url.is_none());
        assert_eq!(ads[0].html_content.as_deref(), Some("<b>Buy</b>"));

        let response = send(&app, get_with_session("/dashboard", &token)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Promo"));
    }

    #[tokio::test]
    async fn admin_page_is_role_gated() {
        let state = test_state("7").await;
        db::testing::provider(&state.db, "writer@example.com").await;
        let user_token = session_for(&state, "writer@example.com").await;
        let admin = db::ensure_admin(&state.db, "admin@example.com", "hash")
            .await
            .unwrap();
        let admin_token = state.sessions.create(&admin.id).await;
        let app = build_router(state.clone());

        let response = send(&app, get_with_session("/admin", &user_token)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/dashboard");

        let response = send(&app, get_with_session("/admin", &admin_token)).await;
        assert_eq!(response.status(), StatusCode::OK);

        // An admin without a tenant profile lands on the admin page.
        let response = send(&app, get_with_session("/dashboard", &admin_token)).await;
        assert_eq!(location(&response), "/admin");
    }

    #[tokio::test]
    async fn admin_counter_check_lists_drift() {
        let state = test_state("7").await;
        let provider = db::testing::provider(&state.db, "writer@example.com").await;
        let link = db::testing::link(&state.db, &provider.id, "Ab3xY9zK").await;
        let admin = db::ensure_admin(&state.db, "admin@example.com", "hash")
            .await
            .unwrap();
        let token = state.sessions.create(&admin.id).await;
        let app = build_router(state.clone());

        let html = body_text(send(&app, post_form("/admin/counters", "", Some(token.as_str()))).await).await;
        assert!(html.contains("No discrepancies found."));

        sqlx::query("UPDATE content_links SET view_count = 4 WHERE id = ?1")
            .bind(&link.id)
            .execute(&state.db)
            .await
            .unwrap();

        let html = body_text(send(&app, post_form("/admin/counters", "", Some(token.as_str()))).await).await;
        assert!(html.contains("1 discrepancy(ies) found."));
        assert!(html.contains(&link.id));
    }

    #[tokio::test]
    async fn random_ad_api_returns_null_without_ads() {
        let state = test_state("7").await;
        let app = build_router(state.clone());

        let body = body_text(send(&app, get("/api/ads/random")).await).await;
        assert_eq!(body, "null");

        let advertiser = db::testing::advertiser(&state.db, "ads@example.com").await;
        db::testing::image_ad(&state.db, &advertiser.id, "Banner").await;
        let body = body_text(send(&app, get("/api/ads/random")).await).await;
        let ad: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(ad["title"], "Banner");
        assert_eq!(ad["ad_type"], "image");
    }
}

use crate::{
    auth::AuthUser,
    categories::{self, Association},
    db,
    forms::{CategoriesForm, CreateAdForm, CreateLinkForm},
    handlers::{is_unique_violation, set_flash_and_redirect, take_flash},
    models::{AdType, Advertiser, Category, ContentProvider, LinkTarget, Role},
    shortcode, AppState,
};
use askama::Template;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{CookieJar, Form};
use std::{collections::HashMap, sync::Arc};

const DASHBOARD: &str = "/dashboard";

// ── View structs ───────────────────────────────────────────────────────────

/// One checkbox in a category picker.
struct CategoryChoice {
    id: String,
    name: String,
    selected: bool,
}

struct LinkRow {
    id: String,
    short_url: String,
    title: String,
    original_url: String,
    view_count: i64,
    click_count: i64,
    is_active: bool,
    tag_names: String,
    tag_choices: Vec<CategoryChoice>,
    blocked_choices: Vec<CategoryChoice>,
}

struct AdRow {
    id: String,
    title: String,
    kind: &'static str,
    image_url: Option<String>,
    click_url: String,
    view_count: i64,
    click_count: i64,
    is_active: bool,
    category_names: String,
    category_choices: Vec<CategoryChoice>,
}

struct Breakdown {
    name: String,
    count: i64,
    pct: i64,
}

/// Tenant name and contact details shown above a dashboard.
struct ProfileHeader {
    name: String,
    website: Option<String>,
    contact_email: Option<String>,
}

struct ClickRow {
    at: String,
    browser: String,
    os: String,
    device: String,
}

// ── Template structs ───────────────────────────────────────────────────────

#[derive(Template)]
#[template(path = "provider_dashboard.html")]
struct ProviderDashboardTemplate {
    profile: ProfileHeader,
    links: Vec<LinkRow>,
    categories: Vec<CategoryChoice>,
    flash_success: Option<String>,
    flash_error: Option<String>,
}

#[derive(Template)]
#[template(path = "advertiser_dashboard.html")]
struct AdvertiserDashboardTemplate {
    profile: ProfileHeader,
    ads: Vec<AdRow>,
    categories: Vec<CategoryChoice>,
    flash_success: Option<String>,
    flash_error: Option<String>,
}

#[derive(Template)]
#[template(path = "link_analytics.html")]
struct LinkAnalyticsTemplate {
    title: String,
    original_url: String,
    short_url: String,
    view_count: i64,
    click_count: i64,
    total_impressions: i64,
    total_clicks: i64,
    sample_size: usize,
    top_browsers: Vec<Breakdown>,
    top_os: Vec<Breakdown>,
    top_devices: Vec<Breakdown>,
    recent: Vec<ClickRow>,
}

// ── Dashboard ──────────────────────────────────────────────────────────────

/// GET /dashboard
/// Renders the provider or advertiser dashboard depending on which tenant
/// profile the signed-in account owns.
pub async fn dashboard(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Response {
    let (jar, flash) = take_flash(jar);

    let provider = match db::get_provider_for_user(&state.db, &auth.user_id).await {
        Ok(p) => p,
        Err(e) => return storage_failure("load the provider profile", e),
    };
    if let Some(provider) = provider {
        return match provider_view(&state, provider).await {
            Ok((profile, links, categories)) => (
                jar,
                ProviderDashboardTemplate {
                    profile,
                    links,
                    categories,
                    flash_success: flash.success,
                    flash_error: flash.error,
                },
            )
                .into_response(),
            Err(e) => storage_failure("load links", e),
        };
    }

    let advertiser = match db::get_advertiser_for_user(&state.db, &auth.user_id).await {
        Ok(a) => a,
        Err(e) => return storage_failure("load the advertiser profile", e),
    };
    if let Some(advertiser) = advertiser {
        return match advertiser_view(&state, advertiser).await {
            Ok((profile, ads, categories)) => (
                jar,
                AdvertiserDashboardTemplate {
                    profile,
                    ads,
                    categories,
                    flash_success: flash.success,
                    flash_error: flash.error,
                },
            )
                .into_response(),
            Err(e) => storage_failure("load ads", e),
        };
    }

    match db::has_role(&state.db, &auth.user_id, Role::Admin).await {
        Ok(true) => (jar, Redirect::to("/admin")).into_response(),
        Ok(false) => (
            StatusCode::FORBIDDEN,
            "This account has no content provider or advertiser profile.",
        )
            .into_response(),
        Err(e) => storage_failure("check roles", e),
    }
}

async fn provider_view(
    state: &AppState,
    provider: ContentProvider,
) -> Result<(ProfileHeader, Vec<LinkRow>, Vec<CategoryChoice>), sqlx::Error> {
    let all = categories::list_categories(&state.db).await?;
    let names = category_names(&all);
    let links = db::list_links_for_provider(&state.db, &provider.id).await?;

    let mut rows = Vec::with_capacity(links.len());
    for link in links {
        let tags = categories::category_ids(&state.db, Association::LinkTags, &link.id).await?;
        let blocked =
            categories::category_ids(&state.db, Association::LinkBlocked, &link.id).await?;
        rows.push(LinkRow {
            short_url: state.config.short_url(&link.short_code),
            tag_names: join_names(&names, &tags),
            tag_choices: choices(&all, &tags),
            blocked_choices: choices(&all, &blocked),
            id: link.id,
            title: link.title,
            original_url: link.original_url,
            view_count: link.view_count,
            click_count: link.click_count,
            is_active: link.is_active,
        });
    }

    let profile = ProfileHeader {
        name: provider.organization_name,
        website: provider.website_domain,
        contact_email: provider.contact_email,
    };
    Ok((profile, rows, choices(&all, &[])))
}

async fn advertiser_view(
    state: &AppState,
    advertiser: Advertiser,
) -> Result<(ProfileHeader, Vec<AdRow>, Vec<CategoryChoice>), sqlx::Error> {
    let all = categories::list_categories(&state.db).await?;
    let names = category_names(&all);
    let ads = db::list_ads_for_advertiser(&state.db, &advertiser.id).await?;

    let mut rows = Vec::with_capacity(ads.len());
    for ad in ads {
        let selected =
            categories::category_ids(&state.db, Association::AdCategories, &ad.id).await?;
        rows.push(AdRow {
            kind: match ad.ad_type {
                AdType::Image => "image",
                AdType::Html => "html",
            },
            category_names: join_names(&names, &selected),
            category_choices: choices(&all, &selected),
            id: ad.id,
            title: ad.title,
            image_url: ad.image_url,
            click_url: ad.click_url,
            view_count: ad.view_count,
            click_count: ad.click_count,
            is_active: ad.is_active,
        });
    }

    let profile = ProfileHeader {
        name: advertiser.company_name,
        website: advertiser.website_url,
        contact_email: advertiser.contact_email,
    };
    Ok((profile, rows, choices(&all, &[])))
}

// ── Content links ──────────────────────────────────────────────────────────

/// POST /dashboard/links
pub async fn create_link(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<CreateLinkForm>,
) -> Response {
    let provider = match require_provider(&state, &auth.user_id, &jar).await {
        Ok(p) => p,
        Err(response) => return response,
    };

    let new_link = match form.validate(shortcode::generate()) {
        Ok(l) => l,
        Err(e) => return set_flash_and_redirect(jar, None, Some(&e.to_string()), DASHBOARD),
    };

    let link = match db::create_link(
        &state.db,
        &provider.id,
        &new_link,
        &form.tags,
        &form.blocked,
    )
    .await
    {
        Ok(link) => link,
        Err(e) if is_unique_violation(&e) => {
            tracing::warn!("Short code collision on '{}'", new_link.short_code);
            return set_flash_and_redirect(
                jar,
                None,
                Some("That short code is already taken. Please submit again."),
                DASHBOARD,
            );
        }
        Err(e) => {
            tracing::error!("Failed to create link: {:?}", e);
            return set_flash_and_redirect(
                jar,
                None,
                Some("Failed to create link. Nothing was saved."),
                DASHBOARD,
            );
        }
    };

    // Committed with its categories; only now may the gateway serve it.
    state.cache.set(LinkTarget::from(&link));
    let short_url = state.config.short_url(&link.short_code);

    tracing::info!(link_id = %link.id, short_code = %link.short_code, "Content link created");
    set_flash_and_redirect(
        jar,
        Some(&format!("Link created: {short_url}")),
        None,
        DASHBOARD,
    )
}

/// POST /dashboard/links/:id/toggle
pub async fn toggle_link(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
) -> Response {
    let provider = match require_provider(&state, &auth.user_id, &jar).await {
        Ok(p) => p,
        Err(response) => return response,
    };

    match db::toggle_link_active(&state.db, &provider.id, &id).await {
        Ok(Some(link)) => {
            let msg = if link.is_active {
                state.cache.set(LinkTarget::from(&link));
                format!("Link '{}' activated.", link.short_code)
            } else {
                state.cache.remove(&link.short_code);
                format!("Link '{}' deactivated.", link.short_code)
            };
            set_flash_and_redirect(jar, Some(&msg), None, DASHBOARD)
        }
        Ok(None) => set_flash_and_redirect(jar, None, Some("Link not found."), DASHBOARD),
        Err(e) => {
            tracing::error!("Failed to toggle link {}: {:?}", id, e);
            set_flash_and_redirect(jar, None, Some("Failed to update link."), DASHBOARD)
        }
    }
}

/// POST /dashboard/links/:id/tags
pub async fn save_link_tags(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
    Form(form): Form<CategoriesForm>,
) -> Response {
    save_link_categories(&state, &auth.user_id, jar, &id, Association::LinkTags, &form).await
}

/// POST /dashboard/links/:id/blocked
pub async fn save_link_blocked(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
    Form(form): Form<CategoriesForm>,
) -> Response {
    save_link_categories(&state, &auth.user_id, jar, &id, Association::LinkBlocked, &form).await
}

async fn save_link_categories(
    state: &AppState,
    user_id: &str,
    jar: CookieJar,
    link_id: &str,
    association: Association,
    form: &CategoriesForm,
) -> Response {
    let provider = match require_provider(state, user_id, &jar).await {
        Ok(p) => p,
        Err(response) => return response,
    };

    match db::get_link_for_provider(&state.db, &provider.id, link_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return set_flash_and_redirect(jar, None, Some("Link not found."), DASHBOARD),
        Err(e) => {
            tracing::error!("Failed to fetch link {}: {:?}", link_id, e);
            return set_flash_and_redirect(jar, None, Some("Failed to update link."), DASHBOARD);
        }
    }

    let what = match association {
        Association::LinkBlocked => "Blocked categories",
        _ => "Tags",
    };
    match categories::replace(&state.db, association, link_id, &form.categories).await {
        Ok(()) => set_flash_and_redirect(jar, Some(&format!("{what} saved.")), None, DASHBOARD),
        Err(e) => {
            tracing::error!("Failed to save {:?} for link {}: {:?}", association, link_id, e);
            set_flash_and_redirect(
                jar,
                None,
                Some(&format!("{what} could not be saved.")),
                DASHBOARD,
            )
        }
    }
}

/// GET /dashboard/links/:id/analytics
pub async fn link_analytics(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
) -> Response {
    let provider = match require_provider(&state, &auth.user_id, &jar).await {
        Ok(p) => p,
        Err(response) => return response,
    };

    let summary = match db::get_link_analytics(&state.db, &provider.id, &id).await {
        Ok(Some(s)) => s,
        Ok(None) => {
            return (StatusCode::NOT_FOUND, "Link not found.").into_response();
        }
        Err(e) => return storage_failure("load analytics", e),
    };

    // Breakdowns cover the sampled recent clicks, not the lifetime total.
    let sample = summary.clicks.len() as i64;
    let top_browsers = with_pct(
        count_field(summary.clicks.iter().map(|c| c.browser.as_deref())),
        sample,
    );
    let top_os = with_pct(
        count_field(summary.clicks.iter().map(|c| c.os.as_deref())),
        sample,
    );
    let top_devices = with_pct(
        count_field(summary.clicks.iter().map(|c| c.device_type.as_deref())),
        sample,
    );

    let recent = summary
        .clicks
        .iter()
        .take(20)
        .map(|c| ClickRow {
            at: c.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            browser: c.browser.clone().unwrap_or_else(|| "-".into()),
            os: c.os.clone().unwrap_or_else(|| "-".into()),
            device: c.device_type.clone().unwrap_or_else(|| "-".into()),
        })
        .collect();

    LinkAnalyticsTemplate {
        short_url: state.config.short_url(&summary.link.short_code),
        title: summary.link.title,
        original_url: summary.link.original_url,
        view_count: summary.link.view_count,
        click_count: summary.link.click_count,
        total_impressions: summary.total_impressions,
        total_clicks: summary.total_clicks,
        sample_size: summary.clicks.len(),
        top_browsers,
        top_os,
        top_devices,
        recent,
    }
    .into_response()
}

// ── Advertisements ─────────────────────────────────────────────────────────

/// POST /dashboard/ads
pub async fn create_ad(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<CreateAdForm>,
) -> Response {
    let advertiser = match require_advertiser(&state, &auth.user_id, &jar).await {
        Ok(a) => a,
        Err(response) => return response,
    };

    let new_ad = match form.validate() {
        Ok(ad) => ad,
        Err(e) => return set_flash_and_redirect(jar, None, Some(&e.to_string()), DASHBOARD),
    };

    let ad = match db::create_ad(&state.db, &advertiser.id, &new_ad).await {
        Ok(ad) => ad,
        Err(e) => {
            tracing::error!("Failed to create ad: {:?}", e);
            return set_flash_and_redirect(jar, None, Some("Failed to create ad."), DASHBOARD);
        }
    };

    if let Err(e) = categories::set_ad_categories(&state.db, &ad.id, &form.categories).await {
        tracing::error!("Failed to save categories for ad {}: {:?}", ad.id, e);
        return set_flash_and_redirect(
            jar,
            None,
            Some("Ad created, but its categories could not be saved."),
            DASHBOARD,
        );
    }

    tracing::info!(ad_id = %ad.id, "Advertisement created");
    set_flash_and_redirect(
        jar,
        Some(&format!("Ad '{}' created.", ad.title)),
        None,
        DASHBOARD,
    )
}

/// POST /dashboard/ads/:id/toggle
pub async fn toggle_ad(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
) -> Response {
    let advertiser = match require_advertiser(&state, &auth.user_id, &jar).await {
        Ok(a) => a,
        Err(response) => return response,
    };

    match db::toggle_ad_active(&state.db, &advertiser.id, &id).await {
        Ok(Some(ad)) => {
            let state_word = if ad.is_active { "activated" } else { "paused" };
            set_flash_and_redirect(
                jar,
                Some(&format!("Ad '{}' {}.", ad.title, state_word)),
                None,
                DASHBOARD,
            )
        }
        Ok(None) => set_flash_and_redirect(jar, None, Some("Ad not found."), DASHBOARD),
        Err(e) => {
            tracing::error!("Failed to toggle ad {}: {:?}", id, e);
            set_flash_and_redirect(jar, None, Some("Failed to update ad."), DASHBOARD)
        }
    }
}

/// POST /dashboard/ads/:id/categories
pub async fn save_ad_categories(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
    Form(form): Form<CategoriesForm>,
) -> Response {
    let advertiser = match require_advertiser(&state, &auth.user_id, &jar).await {
        Ok(a) => a,
        Err(response) => return response,
    };

    match db::get_ad_for_advertiser(&state.db, &advertiser.id, &id).await {
        Ok(Some(_)) => {}
        Ok(None) => return set_flash_and_redirect(jar, None, Some("Ad not found."), DASHBOARD),
        Err(e) => {
            tracing::error!("Failed to fetch ad {}: {:?}", id, e);
            return set_flash_and_redirect(jar, None, Some("Failed to update ad."), DASHBOARD);
        }
    }

    match categories::set_ad_categories(&state.db, &id, &form.categories).await {
        Ok(()) => set_flash_and_redirect(jar, Some("Ad categories saved."), None, DASHBOARD),
        Err(e) => {
            tracing::error!("Failed to save categories for ad {}: {:?}", id, e);
            set_flash_and_redirect(
                jar,
                None,
                Some("Ad categories could not be saved."),
                DASHBOARD,
            )
        }
    }
}

// ── Private helpers ────────────────────────────────────────────────────────

async fn require_provider(
    state: &AppState,
    user_id: &str,
    jar: &CookieJar,
) -> Result<ContentProvider, Response> {
    match db::get_provider_for_user(&state.db, user_id).await {
        Ok(Some(p)) => Ok(p),
        Ok(None) => Err(set_flash_and_redirect(
            jar.clone(),
            None,
            Some("Only content providers can manage links."),
            DASHBOARD,
        )),
        Err(e) => Err(storage_failure("load the provider profile", e)),
    }
}

async fn require_advertiser(
    state: &AppState,
    user_id: &str,
    jar: &CookieJar,
) -> Result<Advertiser, Response> {
    match db::get_advertiser_for_user(&state.db, user_id).await {
        Ok(Some(a)) => Ok(a),
        Ok(None) => Err(set_flash_and_redirect(
            jar.clone(),
            None,
            Some("Only advertisers can manage ads."),
            DASHBOARD,
        )),
        Err(e) => Err(storage_failure("load the advertiser profile", e)),
    }
}

fn storage_failure(what: &str, e: sqlx::Error) -> Response {
    tracing::error!("Failed to {}: {:?}", what, e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Failed to {what}."),
    )
        .into_response()
}

fn category_names(all: &[Category]) -> HashMap<&str, &str> {
    all.iter()
        .map(|c| (c.id.as_str(), c.name.as_str()))
        .collect()
}

fn join_names(names: &HashMap<&str, &str>, ids: &[String]) -> String {
    let mut picked: Vec<&str> = ids
        .iter()
        .filter_map(|id| names.get(id.as_str()).copied())
        .collect();
    picked.sort_unstable();
    picked.join(", ")
}

fn choices(all: &[Category], selected: &[String]) -> Vec<CategoryChoice> {
    all.iter()
        .map(|c| CategoryChoice {
            id: c.id.clone(),
            name: c.name.clone(),
            selected: selected.iter().any(|s| *s == c.id),
        })
        .collect()
}

/// Tally occurrences of each non-None value, sort descending by count, and
/// return the top 10.
fn count_field<'a>(iter: impl Iterator<Item = Option<&'a str>>) -> Vec<(String, i64)> {
    let mut counts: HashMap<String, i64> = HashMap::new();
    for val in iter.flatten() {
        if !val.is_empty() {
            *counts.entry(val.to_owned()).or_insert(0) += 1;
        }
    }
    let mut sorted: Vec<(String, i64)> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted.truncate(10);
    sorted
}

/// Attach a percentage-of-total column to each breakdown row.
fn with_pct(items: Vec<(String, i64)>, total: i64) -> Vec<Breakdown> {
    items
        .into_iter()
        .map(|(name, count)| {
            let pct = if total > 0 { count * 100 / total } else { 0 };
            Breakdown { name, count, pct }
        })
        .collect()
}

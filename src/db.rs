use crate::{
    cache::LinkCache,
    categories::{self, Association},
    models::{
        AccountKind, Advertisement, Advertiser, Click, ContentLink, ContentProvider,
        LinkAnalytics, LinkTarget, NewAdvertisement, NewClick, NewContentLink, NewImpression,
        PlatformTotals, Role, User,
    },
    useragent,
};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};
use uuid::Uuid;

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// ── Pool ───────────────────────────────────────────────────────────────────

/// Open the SQLite pool (creating the file if needed) and run the embedded
/// migrations.
pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(
            database_url
                .parse::<SqliteConnectOptions>()?
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .foreign_keys(true),
        )
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");
    Ok(pool)
}

// ── Warm-up ────────────────────────────────────────────────────────────────

/// Load every active link into the in-memory cache at startup.
pub async fn warm_cache(pool: &SqlitePool, cache: &LinkCache) -> anyhow::Result<()> {
    let links: Vec<ContentLink> = sqlx::query_as(
        "SELECT id, provider_id, original_url, short_code, title, description,
                view_count, click_count, is_active, created_at, updated_at
         FROM content_links WHERE is_active = 1",
    )
    .fetch_all(pool)
    .await?;

    for link in &links {
        cache.set(LinkTarget::from(link));
    }

    tracing::info!("Cache warmed with {} active link(s)", cache.len());
    Ok(())
}

// ── Accounts ───────────────────────────────────────────────────────────────

/// Create a user, its `user` role and the matching tenant profile in one
/// transaction.
pub async fn create_account(
    pool: &SqlitePool,
    email: &str,
    password_hash: &str,
    kind: AccountKind,
    organization: &str,
    website: Option<&str>,
) -> Result<User, sqlx::Error> {
    let user_id = new_id();
    let mut tx = pool.begin().await?;

    sqlx::query("INSERT INTO users (id, email, password_hash) VALUES (?1, ?2, ?3)")
        .bind(&user_id)
        .bind(email)
        .bind(password_hash)
        .execute(&mut *tx)
        .await?;

    sqlx::query("INSERT INTO user_roles (id, user_id, role) VALUES (?1, ?2, ?3)")
        .bind(new_id())
        .bind(&user_id)
        .bind(Role::User)
        .execute(&mut *tx)
        .await?;

    let profile_sql = match kind {
        AccountKind::ContentProvider => {
            "INSERT INTO content_providers (id, user_id, organization_name, website_domain, contact_email)
             VALUES (?1, ?2, ?3, ?4, ?5)"
        }
        AccountKind::Advertiser => {
            "INSERT INTO advertisers (id, user_id, company_name, website_url, contact_email)
             VALUES (?1, ?2, ?3, ?4, ?5)"
        }
    };
    sqlx::query(profile_sql)
        .bind(new_id())
        .bind(&user_id)
        .bind(organization)
        .bind(website)
        .bind(email)
        .execute(&mut *tx)
        .await?;

    let user: User = sqlx::query_as(
        "SELECT id, email, password_hash FROM users WHERE id = ?1",
    )
    .bind(&user_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(user)
}

pub async fn find_user_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as("SELECT id, email, password_hash FROM users WHERE email = ?1")
        .bind(email)
        .fetch_optional(pool)
        .await
}

/// Make sure an account with `email` exists and holds the admin role.
/// An existing account keeps its password.
pub async fn ensure_admin(
    pool: &SqlitePool,
    email: &str,
    password_hash: &str,
) -> Result<User, sqlx::Error> {
    let user = match find_user_by_email(pool, email).await? {
        Some(user) => user,
        None => {
            let id = new_id();
            sqlx::query("INSERT INTO users (id, email, password_hash) VALUES (?1, ?2, ?3)")
                .bind(&id)
                .bind(email)
                .bind(password_hash)
                .execute(pool)
                .await?;
            sqlx::query_as("SELECT id, email, password_hash FROM users WHERE id = ?1")
                .bind(&id)
                .fetch_one(pool)
                .await?
        }
    };

    grant_role(pool, &user.id, Role::Admin).await?;
    Ok(user)
}

pub async fn grant_role(pool: &SqlitePool, user_id: &str, role: Role) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT OR IGNORE INTO user_roles (id, user_id, role) VALUES (?1, ?2, ?3)")
        .bind(new_id())
        .bind(user_id)
        .bind(role)
        .execute(pool)
        .await?;
    Ok(())
}

/// Whether `user_id` holds `role`.
pub async fn has_role(pool: &SqlitePool, user_id: &str, role: Role) -> Result<bool, sqlx::Error> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM user_roles WHERE user_id = ?1 AND role = ?2")
            .bind(user_id)
            .bind(role)
            .fetch_one(pool)
            .await?;
    Ok(count > 0)
}

pub async fn get_provider_for_user(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Option<ContentProvider>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, organization_name, website_domain, contact_email
         FROM content_providers WHERE user_id = ?1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn get_advertiser_for_user(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Option<Advertiser>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, company_name, website_url, contact_email
         FROM advertisers WHERE user_id = ?1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

// ── Content links ──────────────────────────────────────────────────────────

const LINK_COLUMNS: &str = "id, provider_id, original_url, short_code, title, description,
     view_count, click_count, is_active, created_at, updated_at";

/// Insert a new link with its tag and blocked category sets and return the
/// created row. All three writes share one transaction, so a link never
/// exists without its brand-safety exclusions. A short code collision
/// surfaces as the UNIQUE constraint error.
pub async fn create_link(
    pool: &SqlitePool,
    provider_id: &str,
    link: &NewContentLink,
    tags: &[String],
    blocked: &[String],
) -> Result<ContentLink, sqlx::Error> {
    let id = new_id();
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO content_links (id, provider_id, original_url, short_code, title, description)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )
    .bind(&id)
    .bind(provider_id)
    .bind(&link.original_url)
    .bind(&link.short_code)
    .bind(&link.title)
    .bind(&link.description)
    .execute(&mut *tx)
    .await?;

    categories::write_set(&mut *tx, Association::LinkTags, &id, tags).await?;
    categories::write_set(&mut *tx, Association::LinkBlocked, &id, blocked).await?;

    let created = sqlx::query_as(&format!("SELECT {LINK_COLUMNS} FROM content_links WHERE id = ?1"))
        .bind(&id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(created)
}

/// Fetch a single active link by its short code. The match is exact and
/// case-sensitive.
pub async fn get_active_link_by_code(
    pool: &SqlitePool,
    short_code: &str,
) -> Result<Option<ContentLink>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {LINK_COLUMNS} FROM content_links WHERE short_code = ?1 AND is_active = 1"
    ))
    .bind(short_code)
    .fetch_optional(pool)
    .await
}

/// Fetch one link, but only if it belongs to `provider_id`.
pub async fn get_link_for_provider(
    pool: &SqlitePool,
    provider_id: &str,
    link_id: &str,
) -> Result<Option<ContentLink>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {LINK_COLUMNS} FROM content_links WHERE id = ?1 AND provider_id = ?2"
    ))
    .bind(link_id)
    .bind(provider_id)
    .fetch_optional(pool)
    .await
}

/// All of a provider's links, newest first.
pub async fn list_links_for_provider(
    pool: &SqlitePool,
    provider_id: &str,
) -> Result<Vec<ContentLink>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {LINK_COLUMNS} FROM content_links
         WHERE provider_id = ?1
         ORDER BY created_at DESC, rowid DESC"
    ))
    .bind(provider_id)
    .fetch_all(pool)
    .await
}

/// Flip a provider's link between active and inactive. Returns the updated
/// row, or `None` if the link does not belong to the provider.
pub async fn toggle_link_active(
    pool: &SqlitePool,
    provider_id: &str,
    link_id: &str,
) -> Result<Option<ContentLink>, sqlx::Error> {
    let affected = sqlx::query(
        "UPDATE content_links
         SET is_active = NOT is_active, updated_at = CURRENT_TIMESTAMP
         WHERE id = ?1 AND provider_id = ?2",
    )
    .bind(link_id)
    .bind(provider_id)
    .execute(pool)
    .await?
    .rows_affected();

    if affected == 0 {
        return Ok(None);
    }
    get_link_for_provider(pool, provider_id, link_id).await
}

// ── Advertisements ─────────────────────────────────────────────────────────

const AD_COLUMNS: &str = "a.id, a.advertiser_id, a.title, a.ad_type, a.image_url, a.html_content,
     a.click_url, a.is_active, a.budget, a.spent, a.view_count, a.click_count,
     a.created_at, a.updated_at";

pub async fn create_ad(
    pool: &SqlitePool,
    advertiser_id: &str,
    ad: &NewAdvertisement,
) -> Result<Advertisement, sqlx::Error> {
    let id = new_id();
    sqlx::query(
        "INSERT INTO advertisements
             (id, advertiser_id, title, ad_type, image_url, html_content, click_url)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )
    .bind(&id)
    .bind(advertiser_id)
    .bind(&ad.title)
    .bind(ad.ad_type)
    .bind(&ad.image_url)
    .bind(&ad.html_content)
    .bind(&ad.click_url)
    .execute(pool)
    .await?;

    sqlx::query_as(&format!("SELECT {AD_COLUMNS} FROM advertisements a WHERE a.id = ?1"))
        .bind(&id)
        .fetch_one(pool)
        .await
}

/// All of an advertiser's ads, newest first.
pub async fn list_ads_for_advertiser(
    pool: &SqlitePool,
    advertiser_id: &str,
) -> Result<Vec<Advertisement>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {AD_COLUMNS} FROM advertisements a
         WHERE a.advertiser_id = ?1
         ORDER BY a.created_at DESC, a.rowid DESC"
    ))
    .bind(advertiser_id)
    .fetch_all(pool)
    .await
}

pub async fn get_ad_for_advertiser(
    pool: &SqlitePool,
    advertiser_id: &str,
    ad_id: &str,
) -> Result<Option<Advertisement>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {AD_COLUMNS} FROM advertisements a WHERE a.id = ?1 AND a.advertiser_id = ?2"
    ))
    .bind(ad_id)
    .bind(advertiser_id)
    .fetch_optional(pool)
    .await
}

/// Flip an advertiser's ad between active and inactive.
pub async fn toggle_ad_active(
    pool: &SqlitePool,
    advertiser_id: &str,
    ad_id: &str,
) -> Result<Option<Advertisement>, sqlx::Error> {
    let affected = sqlx::query(
        "UPDATE advertisements
         SET is_active = NOT is_active, updated_at = CURRENT_TIMESTAMP
         WHERE id = ?1 AND advertiser_id = ?2",
    )
    .bind(ad_id)
    .bind(advertiser_id)
    .execute(pool)
    .await?
    .rows_affected();

    if affected == 0 {
        return Ok(None);
    }
    get_ad_for_advertiser(pool, advertiser_id, ad_id).await
}

/// Pick zero or one eligible ad for a content link.
///
/// Only active ads qualify. An ad sharing any category with the link's
/// blocked set is never returned. Ads sharing more categories with the
/// link's tags rank first; ties are broken at random.
pub async fn random_ad_for_link(
    pool: &SqlitePool,
    content_link_id: &str,
) -> Result<Option<Advertisement>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {AD_COLUMNS} FROM advertisements a
         WHERE a.is_active = 1
           AND NOT EXISTS (
               SELECT 1 FROM advertisement_categories ac
               JOIN content_link_blocked_categories b ON b.category_id = ac.category_id
               WHERE ac.advertisement_id = a.id AND b.content_link_id = ?1)
         ORDER BY (
               SELECT COUNT(*) FROM advertisement_categories ac
               JOIN content_link_categories t ON t.category_id = ac.category_id
               WHERE ac.advertisement_id = a.id AND t.content_link_id = ?1) DESC,
               RANDOM()
         LIMIT 1"
    ))
    .bind(content_link_id)
    .fetch_optional(pool)
    .await
}

/// Pick any active ad, uniformly at random.
pub async fn random_ad(pool: &SqlitePool) -> Result<Option<Advertisement>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {AD_COLUMNS} FROM advertisements a
         WHERE a.is_active = 1
         ORDER BY RANDOM()
         LIMIT 1"
    ))
    .fetch_optional(pool)
    .await
}

// ── Events ─────────────────────────────────────────────────────────────────

/// Record an ad impression. The counters on the link and the ad are bumped
/// by the `trg_ad_impressions_count` trigger.
pub async fn log_impression(pool: &SqlitePool, event: &NewImpression) -> Result<(), sqlx::Error> {
    let ua = useragent::parse(event.user_agent.as_deref());
    sqlx::query(
        "INSERT INTO ad_impressions
             (id, advertisement_id, content_link_id, visitor_ip, user_agent, browser, os, device_type)
         VALUES (?1, ?2, ?3, NULL, ?4, ?5, ?6, ?7)",
    )
    .bind(new_id())
    .bind(&event.advertisement_id)
    .bind(&event.content_link_id)
    .bind(&event.user_agent)
    .bind(&ua.browser)
    .bind(&ua.os)
    .bind(&ua.device_type)
    .execute(pool)
    .await?;
    Ok(())
}

/// Record a click through to the original content.
pub async fn log_click(pool: &SqlitePool, event: &NewClick) -> Result<(), sqlx::Error> {
    let ua = useragent::parse(event.user_agent.as_deref());
    sqlx::query(
        "INSERT INTO content_clicks
             (id, content_link_id, advertisement_id, visitor_ip, user_agent, browser, os, device_type)
         VALUES (?1, ?2, ?3, NULL, ?4, ?5, ?6, ?7)",
    )
    .bind(new_id())
    .bind(&event.content_link_id)
    .bind(&event.advertisement_id)
    .bind(&event.user_agent)
    .bind(&ua.browser)
    .bind(&ua.os)
    .bind(&ua.device_type)
    .execute(pool)
    .await?;
    Ok(())
}

/// Full analytics for one of a provider's links: the link row, event
/// totals, and the 500 most recent clicks.
pub async fn get_link_analytics(
    pool: &SqlitePool,
    provider_id: &str,
    link_id: &str,
) -> Result<Option<LinkAnalytics>, sqlx::Error> {
    let link = match get_link_for_provider(pool, provider_id, link_id).await? {
        Some(l) => l,
        None => return Ok(None),
    };

    let total_impressions: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM ad_impressions WHERE content_link_id = ?1")
            .bind(link_id)
            .fetch_one(pool)
            .await?;

    let total_clicks: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM content_clicks WHERE content_link_id = ?1")
            .bind(link_id)
            .fetch_one(pool)
            .await?;

    let clicks: Vec<Click> = sqlx::query_as(
        "SELECT id, content_link_id, advertisement_id, user_agent, browser, os, device_type, created_at
         FROM content_clicks
         WHERE content_link_id = ?1
         ORDER BY created_at DESC, rowid DESC
         LIMIT 500",
    )
    .bind(link_id)
    .fetch_all(pool)
    .await?;

    Ok(Some(LinkAnalytics {
        link,
        total_impressions,
        total_clicks,
        clicks,
    }))
}

// ── Admin ──────────────────────────────────────────────────────────────────

/// Row counts across every tenant.
pub async fn platform_totals(pool: &SqlitePool) -> Result<PlatformTotals, sqlx::Error> {
    let (providers, advertisers, links, ads, impressions, clicks): (i64, i64, i64, i64, i64, i64) =
        sqlx::query_as(
            "SELECT (SELECT COUNT(*) FROM content_providers),
                    (SELECT COUNT(*) FROM advertisers),
                    (SELECT COUNT(*) FROM content_links),
                    (SELECT COUNT(*) FROM advertisements),
                    (SELECT COUNT(*) FROM ad_impressions),
                    (SELECT COUNT(*) FROM content_clicks)",
        )
        .fetch_one(pool)
        .await?;

    Ok(PlatformTotals {
        providers,
        advertisers,
        links,
        ads,
        impressions,
        clicks,
    })
}

// ── Test support ───────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::models::AdType;

    /// A single-connection in-memory database with the migrations applied.
    pub async fn pool() -> SqlitePool {
        let options = "sqlite::memory:"
            .parse::<SqliteConnectOptions>()
            .unwrap()
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    /// Create a provider account and return its profile.
    pub async fn provider(pool: &SqlitePool, email: &str) -> ContentProvider {
        let user = create_account(pool, email, "hash", AccountKind::ContentProvider, "Acme Press", None)
            .await
            .unwrap();
        get_provider_for_user(pool, &user.id).await.unwrap().unwrap()
    }

    /// Create an advertiser account and return its profile.
    pub async fn advertiser(pool: &SqlitePool, email: &str) -> Advertiser {
        let user = create_account(pool, email, "hash", AccountKind::Advertiser, "Widgets Inc", None)
            .await
            .unwrap();
        get_advertiser_for_user(pool, &user.id).await.unwrap().unwrap()
    }

    pub async fn link(pool: &SqlitePool, provider_id: &str, short_code: &str) -> ContentLink {
        create_link(
            pool,
            provider_id,
            &NewContentLink {
                original_url: "https://example.com/article".into(),
                short_code: short_code.into(),
                title: "An article".into(),
                description: None,
            },
            &[],
            &[],
        )
        .await
        .unwrap()
    }

    pub async fn image_ad(pool: &SqlitePool, advertiser_id: &str, title: &str) -> Advertisement {
        create_ad(
            pool,
            advertiser_id,
            &NewAdvertisement {
                title: title.into(),
                ad_type: AdType::Image,
                image_url: Some("https://ads.example.com/a.png".into()),
                html_content: None,
                click_url: "https://advertiser.example.com".into(),
            },
        )
        .await
        .unwrap()
    }
}

use chrono::NaiveDateTime;
use serde::Serialize;

/// Account role from the `user_roles` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Moderator,
    User,
}

/// Which tenant profile a new account is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountKind {
    ContentProvider,
    Advertiser,
}

/// How an advertisement is rendered on the gateway page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum AdType {
    Image,
    Html,
}

/// A signed-up account from the `users` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: String,
}

/// Tenant who owns original content and creates short links.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ContentProvider {
    pub id: String,
    pub organization_name: String,
    pub website_domain: Option<String>,
    pub contact_email: Option<String>,
}

/// Tenant who uploads ads.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Advertiser {
    pub id: String,
    pub company_name: String,
    pub website_url: Option<String>,
    pub contact_email: Option<String>,
}

/// A wrapped content URL from the `content_links` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ContentLink {
    pub id: String,
    pub provider_id: String,
    pub original_url: String,
    pub short_code: String,
    pub title: String,
    pub description: Option<String>,
    pub view_count: i64,
    pub click_count: i64,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// The subset of a content link the gateway needs; this is what the link
/// cache holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTarget {
    pub id: String,
    pub short_code: String,
    pub original_url: String,
    pub title: String,
    pub description: Option<String>,
}

impl From<&ContentLink> for LinkTarget {
    fn from(link: &ContentLink) -> Self {
        Self {
            id: link.id.clone(),
            short_code: link.short_code.clone(),
            original_url: link.original_url.clone(),
            title: link.title.clone(),
            description: link.description.clone(),
        }
    }
}

/// Fields supplied by a provider when creating a link.
#[derive(Debug, Clone)]
pub struct NewContentLink {
    pub original_url: String,
    pub short_code: String,
    pub title: String,
    pub description: Option<String>,
}

/// An ad from the `advertisements` table. Exactly one of `image_url` /
/// `html_content` is populated, matching `ad_type`.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Advertisement {
    pub id: String,
    pub advertiser_id: String,
    pub title: String,
    pub ad_type: AdType,
    pub image_url: Option<String>,
    pub html_content: Option<String>,
    pub click_url: String,
    pub is_active: bool,
    pub budget: f64,
    pub spent: f64,
    pub view_count: i64,
    pub click_count: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Validated fields for a new advertisement.
#[derive(Debug, Clone)]
pub struct NewAdvertisement {
    pub title: String,
    pub ad_type: AdType,
    pub image_url: Option<String>,
    pub html_content: Option<String>,
    pub click_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub slug: String,
}

/// An impression about to be written. `visitor_ip` is never collected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewImpression {
    pub advertisement_id: String,
    pub content_link_id: String,
    pub user_agent: Option<String>,
}

/// A click about to be written; `advertisement_id` is the ad that was shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewClick {
    pub content_link_id: String,
    pub advertisement_id: Option<String>,
    pub user_agent: Option<String>,
}

/// A single click event from the `content_clicks` table.
#[derive(Debug, Clone, sqlx::FromRow)]
#[allow(dead_code)]
pub struct Click {
    pub id: String,
    pub content_link_id: String,
    pub advertisement_id: Option<String>,
    pub user_agent: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub device_type: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Summary statistics for the analytics page of a single link.
#[derive(Debug, Clone)]
pub struct LinkAnalytics {
    pub link: ContentLink,
    pub total_impressions: i64,
    pub total_clicks: i64,
    pub clicks: Vec<Click>,
}

/// Row counts across all tenants, shown on the admin page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformTotals {
    pub providers: i64,
    pub advertisers: i64,
    pub links: i64,
    pub ads: i64,
    pub impressions: i64,
    pub clicks: i64,
}

/// A denormalized counter that does not match its event rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CounterDiscrepancy {
    pub table_name: String,
    pub counter: String,
    pub record_id: String,
    pub stored_count: i64,
    pub actual_count: i64,
    /// `stored_count - actual_count`
    pub discrepancy: i64,
}

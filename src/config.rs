use anyhow::{Context, Result};

use crate::gateway::GatewayConfig;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite connection string, e.g. "sqlite:./adlink.db"
    pub database_url: String,

    /// Host to bind the HTTP server to, e.g. "0.0.0.0"
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Public origin used when building short links, e.g. "https://adl.example.com".
    /// Never has a trailing slash.
    pub base_url: String,

    /// How many hours a session cookie remains valid
    pub session_duration_hours: u64,

    /// Countdown length and navigation behaviour of the gateway page
    pub gateway: GatewayConfig,

    /// How long an ad-showing gateway visit is remembered
    pub visit_ttl_secs: u64,

    /// Most gateway visits held at once
    pub max_visits: usize,

    /// When both are set, an admin account with these credentials is
    /// ensured at startup.
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl AppConfig {
    /// Load configuration from environment variables (populated by dotenvy before this is called).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = lookup("PORT")
            .unwrap_or_else(|| "3000".into())
            .parse::<u16>()
            .context("PORT must be a valid port number (1–65535)")?;

        let session_duration_hours = lookup("SESSION_DURATION_HOURS")
            .unwrap_or_else(|| "24".into())
            .parse::<u64>()
            .context("SESSION_DURATION_HOURS must be a whole number of hours")?;

        let base_url = lookup("BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_owned();

        let countdown_secs = lookup("GATEWAY_COUNTDOWN_SECS")
            .unwrap_or_else(|| "7".into())
            .parse::<u32>()
            .context("GATEWAY_COUNTDOWN_SECS must be a non-negative number of seconds")?;

        let auto_navigate = match lookup("GATEWAY_AUTO_NAVIGATE").as_deref().map(str::trim) {
            None | Some("") => false,
            Some(v) => parse_flag(v)
                .with_context(|| format!("GATEWAY_AUTO_NAVIGATE must be true or false, got '{v}'"))?,
        };

        let visit_ttl_secs = lookup("GATEWAY_VISIT_TTL_SECS")
            .unwrap_or_else(|| "1800".into())
            .parse::<u64>()
            .context("GATEWAY_VISIT_TTL_SECS must be a non-negative number of seconds")?;

        let max_visits = lookup("GATEWAY_MAX_VISITS")
            .unwrap_or_else(|| "10000".into())
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .context("GATEWAY_MAX_VISITS must be a positive number")?;

        let admin_email = lookup("ADMIN_EMAIL")
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());
        let admin_password = lookup("ADMIN_PASSWORD").filter(|s| !s.trim().is_empty());

        if admin_email.is_some() != admin_password.is_some() {
            anyhow::bail!("ADMIN_EMAIL and ADMIN_PASSWORD must be set together");
        }

        Ok(Self {
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| "sqlite:./adlink.db".into()),
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            base_url,
            session_duration_hours,
            gateway: GatewayConfig {
                countdown_secs,
                auto_navigate,
            },
            visit_ttl_secs,
            max_visits,
            admin_email,
            admin_password,
        })
    }

    /// Public URL of the gateway page for a short code.
    pub fn short_url(&self, short_code: &str) -> String {
        format!("{}/g/{}", self.base_url, short_code)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

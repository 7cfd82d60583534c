//! The gateway interstitial shown at `/g/:code`.
//!
//! A [`GatewayController`] walks one visit through
//! `Loading → NotFound | Error | Ready`. Once ready, a visit either has no
//! ad (continuable straight away) or shows one while a [`Countdown`] runs;
//! continuing is only allowed once the countdown reaches zero.

use std::time::Duration;

use async_trait::async_trait;
use tokio::{sync::watch, task::JoinHandle, time::Instant};

use crate::{
    db,
    models::{Advertisement, LinkTarget, NewClick, NewImpression},
    shortcode, AppState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Seconds an ad stays on screen before the visitor may continue.
    pub countdown_secs: u32,
    /// Whether the page navigates by itself once continuing is allowed, or
    /// waits for the visitor to press continue.
    pub auto_navigate: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            countdown_secs: 7,
            auto_navigate: false,
        }
    }
}

// ── Backend seam ───────────────────────────────────────────────────────────

/// Everything the gateway needs from storage.
#[async_trait]
pub trait GatewayBackend: Send + Sync {
    /// Resolve an active link by exact short code.
    async fn find_link(&self, short_code: &str) -> anyhow::Result<Option<LinkTarget>>;

    /// Pick zero or one eligible ad for the link.
    async fn select_ad(&self, content_link_id: &str) -> anyhow::Result<Option<Advertisement>>;

    async fn record_impression(&self, impression: &NewImpression) -> anyhow::Result<()>;

    async fn record_click(&self, click: &NewClick) -> anyhow::Result<()>;
}

#[async_trait]
impl GatewayBackend for AppState {
    async fn find_link(&self, short_code: &str) -> anyhow::Result<Option<LinkTarget>> {
        if !shortcode::is_well_formed(short_code) {
            return Ok(None);
        }
        if let Some(target) = self.cache.get(short_code) {
            return Ok(Some(target));
        }

        // Cache miss: fall back to the database and backfill.
        let target = db::get_active_link_by_code(&self.db, short_code)
            .await?
            .map(|link| LinkTarget::from(&link));
        if let Some(target) = &target {
            self.cache.set(target.clone());
        }
        Ok(target)
    }

    async fn select_ad(&self, content_link_id: &str) -> anyhow::Result<Option<Advertisement>> {
        Ok(db::random_ad_for_link(&self.db, content_link_id).await?)
    }

    async fn record_impression(&self, impression: &NewImpression) -> anyhow::Result<()> {
        Ok(db::log_impression(&self.db, impression).await?)
    }

    async fn record_click(&self, click: &NewClick) -> anyhow::Result<()> {
        Ok(db::log_click(&self.db, click).await?)
    }
}

// ── Errors ─────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("no active content link for this short code")]
    NotFound,

    #[error("content link lookup failed: {0}")]
    Unavailable(String),

    #[error("the countdown is still running ({remaining}s left)")]
    CountdownRunning { remaining: u32 },

    #[error("the gateway has not finished loading")]
    NotReady,
}

// ── Countdown ──────────────────────────────────────────────────────────────

/// A once-per-second countdown running on its own task.
///
/// Ticks land on fixed deadlines measured from the start, so a slow tick
/// never stretches the total. The task is aborted when the countdown is
/// cancelled or dropped, so no tick fires after the visit is gone.
#[derive(Debug)]
pub struct Countdown {
    remaining: watch::Receiver<u32>,
    task: Option<JoinHandle<()>>,
}

impl Countdown {
    /// Start counting down from `seconds`. Must be called inside a tokio runtime.
    pub fn start(seconds: u32) -> Self {
        let (tx, rx) = watch::channel(seconds);
        if seconds == 0 {
            return Self {
                remaining: rx,
                task: None,
            };
        }

        let started = Instant::now();
        let task = tokio::spawn(async move {
            for elapsed in 1..=seconds {
                tokio::time::sleep_until(started + Duration::from_secs(u64::from(elapsed))).await;
                if tx.send(seconds - elapsed).is_err() {
                    break;
                }
            }
        });

        Self {
            remaining: rx,
            task: Some(task),
        }
    }

    /// Seconds left; zero once finished.
    pub fn remaining(&self) -> u32 {
        *self.remaining.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.remaining() == 0
    }

    /// Stop ticking. The remaining value stays where it was.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ── Controller ─────────────────────────────────────────────────────────────

/// What the visitor is looking at once the link resolved.
#[derive(Debug, Clone)]
pub struct GatewayPage {
    pub link: LinkTarget,
    pub ad: Option<Advertisement>,
}

#[derive(Debug, Clone)]
pub enum GatewayState {
    Loading,
    NotFound,
    Error(String),
    Ready(GatewayPage),
}

/// Ad sub-state of a ready gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdPhase {
    NoAd,
    AdShowing { remaining: u32 },
    CanContinue,
}

/// An allowed continue: where to send the visitor and the click, if any,
/// still to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Continuation {
    pub original_url: String,
    pub click: Option<NewClick>,
}

impl Continuation {
    /// Write the click. A failed write is logged and otherwise ignored.
    pub async fn record(&self, backend: &dyn GatewayBackend) {
        let Some(click) = &self.click else { return };
        if let Err(e) = backend.record_click(click).await {
            tracing::warn!(
                "Gateway: dropping click for link {}: {:?}",
                click.content_link_id,
                e
            );
        }
    }
}

#[derive(Debug)]
pub struct GatewayController {
    config: GatewayConfig,
    state: GatewayState,
    countdown: Option<Countdown>,
    continued: bool,
}

impl GatewayController {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            state: GatewayState::Loading,
            countdown: None,
            continued: false,
        }
    }

    /// Resolve the link, pick an ad, record the impression and start the
    /// countdown. Only acts while still `Loading`.
    ///
    /// A failed or empty ad selection is the no-ad path, not an error. A
    /// failed impression write is logged and otherwise ignored.
    pub async fn load(
        &mut self,
        backend: &dyn GatewayBackend,
        short_code: &str,
        user_agent: Option<&str>,
    ) -> &GatewayState {
        if !matches!(self.state, GatewayState::Loading) {
            return &self.state;
        }

        let link = match backend.find_link(short_code).await {
            Ok(Some(link)) => link,
            Ok(None) => {
                tracing::debug!("Gateway: no active link for '{}'", short_code);
                self.state = GatewayState::NotFound;
                return &self.state;
            }
            Err(e) => {
                tracing::error!("Gateway: link lookup for '{}' failed: {:?}", short_code, e);
                self.state = GatewayState::Error(e.to_string());
                return &self.state;
            }
        };

        let ad = match backend.select_ad(&link.id).await {
            Ok(ad) => ad,
            Err(e) => {
                tracing::warn!("Gateway: ad selection for link {} failed: {:?}", link.id, e);
                None
            }
        };

        if let Some(ad) = &ad {
            let impression = NewImpression {
                advertisement_id: ad.id.clone(),
                content_link_id: link.id.clone(),
                user_agent: user_agent.map(str::to_owned),
            };
            if let Err(e) = backend.record_impression(&impression).await {
                tracing::warn!("Gateway: dropping impression for link {}: {:?}", link.id, e);
            }
            self.countdown = Some(Countdown::start(self.config.countdown_secs));
        }

        self.state = GatewayState::Ready(GatewayPage { link, ad });
        &self.state
    }

    pub fn state(&self) -> &GatewayState {
        &self.state
    }

    pub fn page(&self) -> Option<&GatewayPage> {
        match &self.state {
            GatewayState::Ready(page) => Some(page),
            _ => None,
        }
    }

    /// `None` until the gateway is ready.
    pub fn ad_phase(&self) -> Option<AdPhase> {
        let page = self.page()?;
        if page.ad.is_none() {
            return Some(AdPhase::NoAd);
        }
        match &self.countdown {
            Some(countdown) if !countdown.is_finished() => Some(AdPhase::AdShowing {
                remaining: countdown.remaining(),
            }),
            _ => Some(AdPhase::CanContinue),
        }
    }

    /// Seconds left on the countdown; zero when there is none.
    pub fn remaining(&self) -> u32 {
        self.countdown.as_ref().map_or(0, Countdown::remaining)
    }

    pub fn can_continue(&self) -> bool {
        matches!(
            self.ad_phase(),
            Some(AdPhase::NoAd) | Some(AdPhase::CanContinue)
        )
    }

    /// Whether the page should leave on its own right now.
    pub fn should_auto_navigate(&self) -> bool {
        self.config.auto_navigate && self.can_continue()
    }

    /// Continue to the original content.
    ///
    /// When an ad was shown, the first allowed continue carries the one click
    /// to record for this visit; later calls return the same URL and no
    /// click. Without an ad no click is ever produced.
    pub fn continue_to(&mut self, user_agent: Option<&str>) -> Result<Continuation, GatewayError> {
        let page = match &self.state {
            GatewayState::Ready(page) => page,
            GatewayState::Loading => return Err(GatewayError::NotReady),
            GatewayState::NotFound => return Err(GatewayError::NotFound),
            GatewayState::Error(msg) => return Err(GatewayError::Unavailable(msg.clone())),
        };

        if !self.can_continue() {
            return Err(GatewayError::CountdownRunning {
                remaining: self.remaining(),
            });
        }

        let click = match (&page.ad, self.continued) {
            (Some(ad), false) => Some(NewClick {
                content_link_id: page.link.id.clone(),
                advertisement_id: Some(ad.id.clone()),
                user_agent: user_agent.map(str::to_owned),
            }),
            _ => None,
        };
        let original_url = page.link.original_url.clone();

        self.continued = true;
        Ok(Continuation {
            original_url,
            click,
        })
    }

    /// Where clicking the ad body leads. This records nothing and leaves the
    /// countdown alone.
    pub fn open_ad(&self) -> Option<String> {
        let ad = self.page()?.ad.as_ref()?;
        tracing::debug!("Gateway: ad {} opened (no engagement event recorded)", ad.id);
        Some(ad.click_url.clone())
    }

    /// Stop the countdown, e.g. when the visit is abandoned.
    pub fn cancel(&mut self) {
        if let Some(countdown) = self.countdown.as_mut() {
            countdown.cancel();
        }
    }
}

use dashmap::DashMap;
use serde::Serialize;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use uuid::Uuid;

use crate::gateway::{Continuation, GatewayController, GatewayError};

/// Live gateway state reported to the polling page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VisitStatus {
    pub remaining: u32,
    pub can_continue: bool,
    pub auto_navigate: bool,
}

struct Visit {
    controller: GatewayController,
    started_at: Instant,
}

/// Gateway visits that show an ad, keyed by a random visit id handed to the
/// page.
///
/// Each visit owns its controller and therefore its countdown task.
/// Removing a visit drops the controller, which cancels the countdown. A
/// finished visit stays until its TTL so a repeated continue gets the same
/// answer. The store holds at most `max_visits` entries.
#[derive(Clone)]
pub struct VisitStore {
    inner: Arc<DashMap<String, Visit>>,
    ttl: Duration,
    max_visits: usize,
}

impl VisitStore {
    pub fn new(ttl_secs: u64, max_visits: usize) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            ttl: Duration::from_secs(ttl_secs),
            max_visits,
        }
    }

    /// Store a loaded controller and return its visit id. At capacity the
    /// expired visits go first, then the oldest live one.
    pub fn insert(&self, controller: GatewayController) -> String {
        if self.inner.len() >= self.max_visits {
            self.prune();
        }
        while self.inner.len() >= self.max_visits {
            let oldest = self
                .inner
                .iter()
                .min_by_key(|entry| entry.started_at)
                .map(|entry| entry.key().clone());
            match oldest {
                Some(id) => {
                    tracing::debug!("Visit store full; evicting visit {}", id);
                    self.inner.remove(&id);
                }
                None => break,
            }
        }

        let id = Uuid::new_v4().to_string();
        self.inner.insert(
            id.clone(),
            Visit {
                controller,
                started_at: Instant::now(),
            },
        );
        id
    }

    /// Drop every visit older than the TTL, cancelling its countdown.
    /// Returns how many were removed.
    pub fn prune(&self) -> usize {
        let before = self.inner.len();
        let ttl = self.ttl;
        self.inner.retain(|_, visit| {
            let live = visit.started_at.elapsed() < ttl;
            if !live {
                visit.controller.cancel();
            }
            live
        });
        before.saturating_sub(self.inner.len())
    }

    pub fn status(&self, id: &str) -> Option<VisitStatus> {
        self.inner
            .get(id)
            .filter(|visit| self.is_live(visit))
            .map(|visit| VisitStatus {
                remaining: visit.controller.remaining(),
                can_continue: visit.controller.can_continue(),
                auto_navigate: visit.controller.should_auto_navigate(),
            })
    }

    /// Short code the visit was opened for.
    pub fn short_code(&self, id: &str) -> Option<String> {
        self.inner
            .get(id)
            .filter(|visit| self.is_live(visit))
            .and_then(|visit| visit.controller.page().map(|p| p.link.short_code.clone()))
    }

    /// Where the visit's ad leads, if it has one.
    pub fn ad_url(&self, id: &str) -> Option<String> {
        self.inner
            .get(id)
            .filter(|visit| self.is_live(visit))
            .and_then(|visit| visit.controller.open_ad())
    }

    /// Continue the visit `id` if it is live and was opened for
    /// `short_code`. `None` means there is no such visit.
    ///
    /// The decision happens under the entry lock, so two continues racing
    /// on one visit cannot both carry a click.
    pub fn continue_visit(
        &self,
        id: &str,
        short_code: &str,
        user_agent: Option<&str>,
    ) -> Option<Result<Continuation, GatewayError>> {
        let mut visit = self.inner.get_mut(id)?;
        if !self.is_live(&visit) {
            return None;
        }
        let same_link = visit
            .controller
            .page()
            .is_some_and(|page| page.link.short_code == short_code);
        if !same_link {
            return None;
        }
        Some(visit.controller.continue_to(user_agent))
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    fn is_live(&self, visit: &Visit) -> bool {
        visit.started_at.elapsed() < self.ttl
    }
}

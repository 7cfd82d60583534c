use dashmap::DashMap;
use std::sync::Arc;

use crate::models::LinkTarget;

/// Thread-safe in-memory cache mapping short_code -> active link target.
///
/// Backed by a DashMap so gateway reads are concurrent and lock-free for
/// most cases. Warmed on startup with every active link, then kept in sync
/// by the dashboard handlers whenever a link is created, activated or
/// deactivated. Inactive links are never cached.
#[derive(Clone, Debug)]
pub struct LinkCache {
    inner: Arc<DashMap<String, LinkTarget>>,
}

impl LinkCache {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
        }
    }

    /// Insert or update a mapping.
    pub fn set(&self, target: LinkTarget) {
        self.inner.insert(target.short_code.clone(), target);
    }

    /// Look up a short code. Returns a clone of the cached target if present.
    pub fn get(&self, short_code: &str) -> Option<LinkTarget> {
        self.inner.get(short_code).map(|v| v.clone())
    }

    /// Remove a mapping (e.g. when a link is deactivated).
    pub fn remove(&self, short_code: &str) {
        self.inner.remove(short_code);
    }

    /// Number of entries currently cached.
    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

impl Default for LinkCache {
    fn default() -> Self {
        Self::new()
    }
}

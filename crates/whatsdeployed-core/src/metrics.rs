//! Global atomic counters for outbound call volume.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of a request).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters, no locking.
pub struct Metrics {
    forge_calls: AtomicU64,
    marker_fetches: AtomicU64,
    tag_pages: AtomicU64,
    revisions_attributed: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            forge_calls: AtomicU64::new(0),
            marker_fetches: AtomicU64::new(0),
            tag_pages: AtomicU64::new(0),
            revisions_attributed: AtomicU64::new(0),
        }
    }

    /// One outbound call to the forge REST API.
    pub fn inc_forge_calls(&self) {
        self.forge_calls.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "forge_calls", "counter incremented");
    }

    /// One version-marker fetch.
    pub fn inc_marker_fetches(&self) {
        self.marker_fetches.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "marker_fetches", "counter incremented");
    }

    pub fn inc_tag_pages(&self) {
        self.tag_pages.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "tag_pages", "counter incremented");
    }

    pub fn inc_revisions_attributed(&self) {
        self.revisions_attributed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "revisions_attributed", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    ///
    /// Call this at natural boundaries (end of a request, shutdown)
    /// rather than on every increment.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            forge_calls = self.forge_calls(),
            marker_fetches = self.marker_fetches(),
            tag_pages = self.tag_pages(),
            revisions_attributed = self.revisions_attributed(),
        );
    }

    pub fn forge_calls(&self) -> u64 {
        self.forge_calls.load(Ordering::Relaxed)
    }

    pub fn marker_fetches(&self) -> u64 {
        self.marker_fetches.load(Ordering::Relaxed)
    }

    pub fn tag_pages(&self) -> u64 {
        self.tag_pages.load(Ordering::Relaxed)
    }

    pub fn revisions_attributed(&self) -> u64 {
        self.revisions_attributed.load(Ordering::Relaxed)
    }
}

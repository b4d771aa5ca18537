use blink_core::{Shortener, VisitTracker};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    links: Arc<dyn Shortener>,
    visits: Arc<dyn VisitTracker>,
    base_url: String,
}

impl AppState {
    /// `public_base_url` is the prefix short codes are appended to when
    /// building the public short URL.
    pub fn new(
        links: Arc<dyn Shortener>,
        visits: Arc<dyn VisitTracker>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            links,
            visits,
            base_url: public_base_url.into(),
        }
    }

    pub fn links(&self) -> &dyn Shortener {
        self.links.as_ref()
    }

    pub fn visits(&self) -> &dyn VisitTracker {
        self.visits.as_ref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

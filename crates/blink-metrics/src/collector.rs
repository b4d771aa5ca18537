use blink_core::{ShortCode, VisitCounts};
use std::collections::HashSet;

/// Visits to one short code during the current flush interval.
///
/// `visits >= visitors.len()` holds at all times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitCollector {
    code: ShortCode,
    visits: u64,
    visitors: HashSet<String>,
}

impl VisitCollector {
    pub fn new(code: ShortCode) -> Self {
        Self {
            code,
            visits: 0,
            visitors: HashSet::new(),
        }
    }

    pub fn code(&self) -> &ShortCode {
        &self.code
    }

    /// Counts one visit; repeated visitors only count once towards uniques.
    pub fn record(&mut self, visitor: String) {
        self.visits += 1;
        self.visitors.insert(visitor);
    }

    pub fn counts(&self) -> VisitCounts {
        VisitCounts {
            visits: self.visits,
            unique_visits: self.visitors.len() as u64,
        }
    }
}

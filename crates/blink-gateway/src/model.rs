use blink_core::MetricsSnapshot;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CreateShortUrlRequest {
    pub long_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateShortUrlResponse {
    pub id: String,
    pub short_url: String,
}

/// Time range of a metrics read, both ends inclusive, in RFC 3339.
#[derive(Debug, Deserialize)]
pub struct MetricsQuery {
    pub from: Timestamp,
    pub to: Timestamp,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub id: String,
    pub visits: u64,
    pub unique_visits: u64,
    pub from: Timestamp,
    pub to: Timestamp,
}

impl From<MetricsSnapshot> for MetricsResponse {
    fn from(snapshot: MetricsSnapshot) -> Self {
        Self {
            id: snapshot.code.to_string(),
            visits: snapshot.visits,
            unique_visits: snapshot.unique_visits,
            from: snapshot.from,
            to: snapshot.to,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

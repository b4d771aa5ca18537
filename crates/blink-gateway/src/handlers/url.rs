use crate::error::{AppError, Result};
use crate::model::{
    CreateShortUrlRequest, CreateShortUrlResponse, MetricsQuery, MetricsResponse,
};
use crate::state::AppState;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{ConnectInfo, Path, Query, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use blink_core::ShortCode;
use std::net::SocketAddr;
use tracing::{debug, trace};

const X_REAL_IP: &str = "x-real-ip";
const X_FORWARDED_FOR: &str = "x-forwarded-for";
const UNKNOWN_VISITOR: &str = "unknown";

pub async fn create_short_url_handler(
    State(state): State<AppState>,
    request: std::result::Result<Json<CreateShortUrlRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateShortUrlResponse>)> {
    let Json(request) = request.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let code = state.links().shorten(&request.long_url).await?;
    debug!(code = %code, "short url created");

    Ok((
        StatusCode::CREATED,
        Json(CreateShortUrlResponse {
            short_url: code.to_url(state.base_url()),
            id: code.to_string(),
        }),
    ))
}

pub async fn delete_short_url_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let code = ShortCode::new(id)?;

    state.links().delete(&code).await?;
    debug!(code = %code, "short url deleted");

    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_metrics_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    query: std::result::Result<Query<MetricsQuery>, QueryRejection>,
) -> Result<Json<MetricsResponse>> {
    let code = ShortCode::new(id)?;
    let Query(range) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;

    if range.from > range.to {
        return Err(AppError::BadRequest(format!(
            "`from` ({}) must not be after `to` ({})",
            range.from, range.to
        )));
    }

    let snapshot = state.visits().snapshot(&code, range.from, range.to).await?;
    Ok(Json(snapshot.into()))
}

/// Redirects to the long URL and records the visit in the background.
pub async fn redirect_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request: Request,
) -> Result<Response> {
    let code = ShortCode::new(id)?;
    let long_url = state.links().resolve(&code).await?;

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let visitor = visitor_key(request.headers(), peer);
    trace!(code = %code, visitor = %visitor, "redirecting");

    state.visits().record_async(code, visitor);

    Ok((StatusCode::FOUND, [(header::LOCATION, long_url)]).into_response())
}

/// Identifies a visitor for unique counting: `X-Real-IP`, then the first
/// `X-Forwarded-For` hop, then the peer address.
pub fn visitor_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    header_value(X_REAL_IP)
        .or_else(|| {
            header_value(X_FORWARDED_FOR)
                .and_then(|hops| hops.split(',').next())
                .map(str::trim)
                .filter(|hop| !hop.is_empty())
        })
        .map(str::to_owned)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| UNKNOWN_VISITOR.to_string())
}

// HTTP front middleware stages
// Contains the method filter, readiness gate, developer UI and error responder

use async_graphql::http::GraphiQLSource;
use axum::{
    extract::State,
    http::{
        header::{ACCEPT, ALLOW},
        HeaderMap, HeaderValue, Method, Request,
    },
    middleware::Next,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::cmp::Reverse;
use tracing::debug;

use super::graphql::FrontState;
use crate::config::Environment;
use crate::GatewayError;

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let mut response = self.status().into_response();
        if matches!(self, GatewayError::MethodNotAllowed) {
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static("GET, POST"));
        }
        response.extensions_mut().insert(self);
        response
    }
}

/// GraphQL over HTTP only supports GET and POST
pub async fn method_filter<B>(request: Request<B>, next: Next<B>) -> Result<Response, GatewayError> {
    if request.method() != Method::GET && request.method() != Method::POST {
        debug!("Rejecting {} {}", request.method(), request.uri());
        return Err(GatewayError::MethodNotAllowed);
    }

    Ok(next.run(request).await)
}

/// Let the caller know the API isn't ready yet
pub async fn readiness_gate<B>(
    State(state): State<FrontState>,
    request: Request<B>,
    next: Next<B>,
) -> Result<Response, GatewayError> {
    if !state.readiness.is_ready() {
        return Err(GatewayError::NotReady);
    }

    Ok(next.run(request).await)
}

/// Serve GraphiQL when the request prefers HTML over JSON
pub async fn developer_ui<B>(request: Request<B>, next: Next<B>) -> Response {
    if prefers_html(request.headers()) {
        return Html(explorer_page(request.uri().path())).into_response();
    }

    next.run(request).await
}

/// Explorer page posting its queries back to `endpoint`
pub fn explorer_page(endpoint: &str) -> String {
    GraphiQLSource::build().endpoint(endpoint).finish()
}

/// Render any stashed [`GatewayError`] as the JSON error body
pub async fn error_responder<B>(
    State(state): State<FrontState>,
    request: Request<B>,
    next: Next<B>,
) -> Response {
    let mut response = next.run(request).await;

    match response.extensions_mut().remove::<GatewayError>() {
        Some(error) => {
            let body = ErrorBody::new(&error, state.environment);
            let (parts, _) = response.into_parts();
            (parts, Json(body)).into_response()
        }
        None => response,
    }
}

/// JSON body of every failed request
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

/// Error internals, only included in development
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    pub status: u16,
    pub kind: &'static str,
    pub detail: String,
}

impl ErrorBody {
    pub fn new(error: &GatewayError, environment: Environment) -> Self {
        let detail = environment.is_development().then(|| ErrorDetail {
            status: error.status().as_u16(),
            kind: error.kind(),
            detail: error.describe(),
        });

        Self {
            message: error.to_string(),
            error: detail,
        }
    }
}

const JSON_TYPE: (&str, &str) = ("application", "json");
const HTML_TYPE: (&str, &str) = ("text", "html");

/// Does the `Accept` header rank `text/html` above `application/json`?
///
/// Equal q-value and specificity falls back to the order of the header, so
/// `text/html, application/json` is HTML. A missing header or a lone `*/*`
/// goes to JSON.
pub fn prefers_html(headers: &HeaderMap) -> bool {
    let accept = headers
        .get_all(ACCEPT)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect::<Vec<_>>()
        .join(",");

    if accept.trim().is_empty() {
        return false;
    }

    let ranges: Vec<MediaRange<'_>> = accept
        .split(',')
        .enumerate()
        .filter_map(|(index, raw)| MediaRange::parse(index, raw))
        .collect();

    match (preference(&ranges, JSON_TYPE), preference(&ranges, HTML_TYPE)) {
        (_, None) => false,
        (None, Some(_)) => true,
        (Some((json_rank, json_index)), Some((html_rank, html_index))) => {
            html_rank > json_rank || (html_rank == json_rank && html_index < json_index)
        }
    }
}

/// One entry of an `Accept` header
struct MediaRange<'a> {
    index: usize,
    kind: &'a str,
    subtype: &'a str,
    quality: f32,
}

impl<'a> MediaRange<'a> {
    fn parse(index: usize, raw: &'a str) -> Option<Self> {
        let mut params = raw.split(';');
        let (kind, subtype) = params.next()?.trim().split_once('/')?;

        let mut quality = 1.0;
        for param in params {
            if let Some((name, value)) = param.trim().split_once('=') {
                if name.trim().eq_ignore_ascii_case("q") {
                    quality = value.trim().parse().unwrap_or(0.0);
                }
            }
        }

        Some(Self {
            index,
            kind: kind.trim(),
            subtype: subtype.trim(),
            quality,
        })
    }

    /// 2 for an exact match, 1 for `type/*`, 0 for `*/*`
    fn specificity(&self, (kind, subtype): (&str, &str)) -> Option<u8> {
        let kind_matches = self.kind == "*" || self.kind.eq_ignore_ascii_case(kind);
        let subtype_matches = self.subtype == "*" || self.subtype.eq_ignore_ascii_case(subtype);
        if !kind_matches || !subtype_matches {
            return None;
        }

        Some(match (self.kind == "*", self.subtype == "*") {
            (false, false) => 2,
            (false, true) => 1,
            _ => 0,
        })
    }
}

/// `(quality, specificity)` and header position of the most specific range
/// matching `media_type`, the earliest one on equal specificity
///
/// `None` when nothing matches or the best match has quality 0.
fn preference(ranges: &[MediaRange<'_>], media_type: (&str, &str)) -> Option<((u32, u8), usize)> {
    let (range, specificity) = ranges
        .iter()
        .filter_map(|range| range.specificity(media_type).map(|s| (range, s)))
        .max_by_key(|(range, specificity)| (*specificity, Reverse(range.index)))?;

    if range.quality <= 0.0 {
        return None;
    }

    // Quality has at most three decimals
    let quality = (range.quality * 1000.0).round() as u32;
    Some(((quality, specificity), range.index))
}

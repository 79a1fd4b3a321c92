//! HTTP response building module
//!
//! JSON response builders plus the headers every response carries.

use http_body_util::Full;
use hyper::body::{Body as _, Bytes};
use hyper::header::{self, HeaderValue};
use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::config::HttpConfig;
use crate::logger;

pub type HttpResponse = Response<Full<Bytes>>;

const ALLOW: &str = "GET, HEAD, OPTIONS";

/// Build JSON response
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> HttpResponse {
    match serde_json::to_vec(body) {
        Ok(json) => build(status, "application/json", Bytes::from(json)),
        Err(e) => {
            logger::log_error(&format!("Failed to serialize response: {e}"));
            internal_server_error()
        }
    }
}

/// `{"detail": <message>}` error body
pub fn error_response(status: StatusCode, detail: &str) -> HttpResponse {
    let body = serde_json::json!({ "detail": detail });
    build(status, "application/json", Bytes::from(body.to_string()))
}

/// 404 Not Found response
pub fn not_found() -> HttpResponse {
    error_response(StatusCode::NOT_FOUND, "Not Found")
}

/// 405 Method Not Allowed response
pub fn method_not_allowed() -> HttpResponse {
    let mut response = error_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
    response
        .headers_mut()
        .insert(header::ALLOW, HeaderValue::from_static(ALLOW));
    response
}

/// 500 Internal Server Error response
pub fn internal_server_error() -> HttpResponse {
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
}

/// 422 response listing every rejected parameter
pub fn unprocessable(detail: Vec<serde_json::Value>) -> HttpResponse {
    json_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        &serde_json::json!({ "detail": detail }),
    )
}

/// 307 redirect preserving method and query
pub fn redirect_response(location: &str) -> HttpResponse {
    let mut response = build(StatusCode::TEMPORARY_REDIRECT, "text/plain", Bytes::new());
    match HeaderValue::from_str(location) {
        Ok(value) => {
            response.headers_mut().insert(header::LOCATION, value);
            response
        }
        Err(e) => {
            logger::log_warning(&format!("Invalid redirect location '{location}': {e}"));
            not_found()
        }
    }
}

/// Build OPTIONS response (preflight request)
pub fn options_response(enable_cors: bool) -> HttpResponse {
    let mut response = build(StatusCode::NO_CONTENT, "text/plain", Bytes::new());
    let headers = response.headers_mut();
    headers.remove(header::CONTENT_TYPE);
    headers.insert(header::ALLOW, HeaderValue::from_static(ALLOW));

    if enable_cors {
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        );
        headers.insert(
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from_static("86400"),
        );
    }
    response
}

/// Add `Server` and, when enabled, CORS origin headers
pub fn apply_common_headers(response: &mut HttpResponse, http: &HttpConfig) {
    let headers = response.headers_mut();
    match HeaderValue::from_str(&http.server_name) {
        Ok(value) => {
            headers.insert(header::SERVER, value);
        }
        Err(e) => logger::log_warning(&format!("Invalid server_name '{}': {e}", http.server_name)),
    }
    if http.enable_cors {
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        );
    }
}

/// Drop the body for HEAD while keeping the GET Content-Length
pub fn strip_body(response: HttpResponse) -> HttpResponse {
    let (mut parts, body) = response.into_parts();
    let length = body.size_hint().exact().unwrap_or(0);
    parts
        .headers
        .insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    Response::from_parts(parts, Full::new(Bytes::new()))
}

/// Exact body length of a buffered response
pub fn body_len(response: &HttpResponse) -> usize {
    usize::try_from(response.body().size_hint().exact().unwrap_or(0)).unwrap_or(usize::MAX)
}

fn build(status: StatusCode, content_type: &'static str, body: Bytes) -> HttpResponse {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

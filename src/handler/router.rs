//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: path resolution, method
//! validation, parameter extraction and delegation to the predictor.

use hyper::header::USER_AGENT;
use hyper::{Method, Request, StatusCode, Uri};
use serde::Serialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use super::endpoints::{self, PredictionRequest, SowingRequest};
use crate::config::AppState;
use crate::http::{self, HttpResponse, QueryError, QueryParams};
use crate::logger::{self, AccessLogEntry};
use crate::predictor::PredictError;

/// Routable endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Home,
    Commodities,
    Predict,
    BestSowing,
}

const ROUTES: [(&str, Endpoint); 4] = [
    ("/", Endpoint::Home),
    ("/commodities/", Endpoint::Commodities),
    ("/predict/", Endpoint::Predict),
    ("/best_sowing/", Endpoint::BestSowing),
];

/// Outcome of path resolution
#[derive(Debug, PartialEq, Eq)]
enum Resolved {
    Endpoint(Endpoint),
    /// Path matches a route once a trailing slash is added
    AddSlash,
    NotFound,
}

fn resolve(path: &str) -> Resolved {
    for (route, endpoint) in ROUTES {
        if path == route {
            return Resolved::Endpoint(endpoint);
        }
        if route.len() > 1 && route.strip_suffix('/') == Some(path) {
            return Resolved::AddSlash;
        }
    }
    Resolved::NotFound
}

/// Main entry point for HTTP request handling
pub async fn handle_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<HttpResponse, Infallible> {
    let started = Instant::now();
    let response = dispatch(req.method(), req.uri(), &state);

    if state.config.logging.access_log {
        let mut entry = AccessLogEntry::new(
            peer_addr.ip().to_string(),
            req.method().to_string(),
            req.uri().path().to_string(),
        );
        entry.query = req.uri().query().map(ToString::to_string);
        entry.http_version = format!("{:?}", req.version())
            .trim_start_matches("HTTP/")
            .to_string();
        entry.status = response.status().as_u16();
        entry.body_bytes = http::body_len(&response);
        entry.user_agent = req
            .headers()
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// Route a request and finish the response with common headers
pub fn dispatch(method: &Method, uri: &Uri, state: &AppState) -> HttpResponse {
    let mut response = route(method, uri, state);
    if *method == Method::HEAD {
        response = http::strip_body(response);
    }
    http::apply_common_headers(&mut response, &state.config.http);
    response
}

fn route(method: &Method, uri: &Uri, state: &AppState) -> HttpResponse {
    let path = uri.path();
    let endpoint = match resolve(path) {
        Resolved::Endpoint(endpoint) => endpoint,
        Resolved::AddSlash => {
            let location = match uri.query() {
                Some(q) => format!("{path}/?{q}"),
                None => format!("{path}/"),
            };
            return http::redirect_response(&location);
        }
        Resolved::NotFound => return http::not_found(),
    };

    match *method {
        Method::GET | Method::HEAD => {}
        Method::OPTIONS => return http::options_response(state.config.http.enable_cors),
        _ => {
            logger::log_warning(&format!("Method not allowed: {method} {path}"));
            return http::method_not_allowed();
        }
    }

    let query = QueryParams::parse(uri.query());
    let predictor = state.predictor.as_ref();

    match endpoint {
        Endpoint::Home => http::json_response(StatusCode::OK, &endpoints::home()),
        Endpoint::Commodities => {
            http::json_response(StatusCode::OK, &endpoints::list_commodities(predictor))
        }
        Endpoint::Predict => match PredictionRequest::from_query(&query) {
            Ok(request) => respond(path, endpoints::predict(predictor, &request)),
            Err(errors) => reject(path, &errors),
        },
        Endpoint::BestSowing => match SowingRequest::from_query(&query) {
            Ok(request) => respond(path, endpoints::best_sowing(predictor, &request)),
            Err(errors) => reject(path, &errors),
        },
    }
}

/// Serialize a predictor result; any failure is a plain 500
fn respond<T: Serialize>(path: &str, result: Result<T, PredictError>) -> HttpResponse {
    match result {
        Ok(body) => http::json_response(StatusCode::OK, &body),
        Err(e) => {
            logger::log_error(&format!("{path} failed: {e}"));
            http::internal_server_error()
        }
    }
}

fn reject(path: &str, errors: &[QueryError]) -> HttpResponse {
    logger::log_debug(&format!(
        "{path} rejected: {}",
        errors
            .iter()
            .map(|e| format!("{} ({e})", e.name()))
            .collect::<Vec<_>>()
            .join(", ")
    ));
    http::unprocessable(errors.iter().map(QueryError::to_detail).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::predictor::{Predictor, SowingCandidate, SowingWindow};
    use http_body_util::BodyExt;
    use hyper::header;
    use serde_json::{json, Value};

    /// Predictor with fixed answers so delegation can be checked exactly
    struct StubPredictor {
        commodities: Vec<String>,
    }

    impl Predictor for StubPredictor {
        fn commodities(&self) -> Vec<String> {
            self.commodities.clone()
        }

        fn predict_price(&self, date: &str, commodity: &str) -> Result<f64, PredictError> {
            match (date, commodity) {
                ("2024-01-15", "wheat") => Ok(2275.5),
                (_, "wheat") => Ok(2000.0),
                _ => Err(PredictError::UnknownCommodity(commodity.to_string())),
            }
        }

        fn best_sowing_window(
            &self,
            commodity: &str,
            crop_duration: i64,
        ) -> Result<SowingWindow, PredictError> {
            if !self.commodities.iter().any(|c| c == commodity) {
                return Err(PredictError::UnknownCommodity(commodity.to_string()));
            }
            Ok(SowingWindow {
                commodity: commodity.to_string(),
                crop_duration,
                best_sowing_month: 11,
                best_sowing_month_name: "November".to_string(),
                expected_harvest_month: 3,
                expected_harvest_month_name: "March".to_string(),
                expected_harvest_price: 2400.0,
                candidates: vec![SowingCandidate {
                    sowing_month: 11,
                    harvest_month: 3,
                    expected_price: 2400.0,
                }],
            })
        }
    }

    fn state() -> AppState {
        let config = Config::load_from("/nonexistent/mandi-config").unwrap();
        let predictor = StubPredictor {
            commodities: vec!["wheat".to_string(), "rice".to_string()],
        };
        AppState::new(config, Arc::new(predictor))
    }

    fn get(state: &AppState, uri: &str) -> HttpResponse {
        dispatch(&Method::GET, &uri.parse().unwrap(), state)
    }

    async fn body_json(response: HttpResponse) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_resolve() {
        assert_eq!(resolve("/"), Resolved::Endpoint(Endpoint::Home));
        assert_eq!(
            resolve("/best_sowing/"),
            Resolved::Endpoint(Endpoint::BestSowing)
        );
        assert_eq!(resolve("/predict"), Resolved::AddSlash);
        assert_eq!(resolve(""), Resolved::NotFound);
        assert_eq!(resolve("/predict/extra"), Resolved::NotFound);
    }

    #[tokio::test]
    async fn test_home() {
        let response = get(&state(), "/");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(
            body_json(response).await,
            json!({"message": "Mandi ML API running"})
        );
    }

    #[tokio::test]
    async fn test_commodities_forwarded_verbatim() {
        let response = get(&state(), "/commodities/");
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], br#"{"commodities":["wheat","rice"]}"#);
    }

    #[tokio::test]
    async fn test_predict_wraps_price() {
        let response = get(&state(), "/predict/?date=2024-01-15&commodity=wheat");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"predicted_modal_price": 2275.5})
        );
    }

    #[tokio::test]
    async fn test_predict_does_not_validate_date() {
        let response = get(&state(), "/predict/?date=whenever&commodity=wheat");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"predicted_modal_price": 2000.0})
        );
    }

    #[tokio::test]
    async fn test_predict_missing_params() {
        let response = get(&state(), "/predict/?commodity=wheat");
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["detail"][0]["loc"], json!(["query", "date"]));
        assert_eq!(body["detail"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_predictor_failure_is_500() {
        let response = get(&state(), "/predict/?date=2024-01-15&commodity=saffron");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({"detail": "Internal Server Error"})
        );
    }

    #[tokio::test]
    async fn test_best_sowing_default_duration() {
        let state = state();
        let implicit = body_json(get(&state, "/best_sowing/?commodity=wheat")).await;
        let explicit = body_json(get(&state, "/best_sowing/?commodity=wheat&crop_duration=90")).await;
        assert_eq!(implicit, explicit);
        assert_eq!(implicit["crop_duration"], 90);
    }

    #[tokio::test]
    async fn test_best_sowing_returns_predictor_object() {
        let state = state();
        let expected = state.predictor.best_sowing_window("rice", 120).unwrap();
        let body = body_json(get(&state, "/best_sowing/?commodity=rice&crop_duration=120")).await;
        assert_eq!(body, serde_json::to_value(expected).unwrap());
    }

    #[tokio::test]
    async fn test_best_sowing_bad_duration() {
        let response = get(&state(), "/best_sowing/?commodity=rice&crop_duration=ninety");
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["detail"][0]["type"], "int_parsing");
        assert_eq!(body["detail"][0]["input"], "ninety");
    }

    #[test]
    fn test_missing_slash_redirects_with_query() {
        let response = get(&state(), "/predict?date=2024-01-15&commodity=wheat");
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/predict/?date=2024-01-15&commodity=wheat"
        );
    }

    #[tokio::test]
    async fn test_unknown_path() {
        let response = get(&state(), "/forecast/");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await, json!({"detail": "Not Found"}));
    }

    #[test]
    fn test_method_handling() {
        let state = state();
        let uri: Uri = "/commodities/".parse().unwrap();

        let response = dispatch(&Method::POST, &uri, &state);
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let response = dispatch(&Method::OPTIONS, &uri, &state);
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = dispatch(&Method::HEAD, &uri, &state);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(http::body_len(&response), 0);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "32");
    }

    #[test]
    fn test_server_header() {
        let response = get(&state(), "/");
        assert_eq!(response.headers()[header::SERVER], "mandi-api");
    }
}

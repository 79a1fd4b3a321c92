//! HTTP protocol layer module
//!
//! Query extraction and response building, decoupled from the prediction endpoints.

pub mod query;
pub mod response;

// Re-export commonly used types
pub use query::{QueryError, QueryParams};
pub use response::{
    apply_common_headers, body_len, internal_server_error, json_response, method_not_allowed,
    not_found, options_response, redirect_response, strip_body, unprocessable, HttpResponse,
};

//! Request handler module
//!
//! Routes requests to the prediction endpoints.

pub mod endpoints;
pub mod router;

// Re-export main entry point
pub use router::handle_request;

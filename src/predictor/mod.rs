//! Prediction module
//!
//! Defines the contract the request router relies on and ships the default
//! seasonal implementation backed by historical modal prices.

pub mod history;
mod mandi;

use serde::Serialize;

pub use mandi::MandiPredictor;

/// Crop duration (days) used when a caller does not supply one
pub const DEFAULT_CROP_DURATION: i64 = 90;

/// Commodity price and sowing predictor
///
/// A single instance is shared by every connection for the lifetime of the
/// process, so implementations must be safe for concurrent reads.
pub trait Predictor: Send + Sync {
    /// Commodity names the predictor knows about
    fn commodities(&self) -> Vec<String>;

    /// Estimate the modal price of `commodity` on `date`
    fn predict_price(&self, date: &str, commodity: &str) -> Result<f64, PredictError>;

    /// Recommend the sowing month that maximizes the expected harvest price
    fn best_sowing_window(
        &self,
        commodity: &str,
        crop_duration: i64,
    ) -> Result<SowingWindow, PredictError>;
}

/// Sowing recommendation returned by [`Predictor::best_sowing_window`]
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SowingWindow {
    pub commodity: String,
    pub crop_duration: i64,
    pub best_sowing_month: u32,
    pub best_sowing_month_name: String,
    pub expected_harvest_month: u32,
    pub expected_harvest_month_name: String,
    pub expected_harvest_price: f64,
    /// Every sowing month that was evaluated, in calendar order
    pub candidates: Vec<SowingCandidate>,
}

/// One evaluated sowing month
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SowingCandidate {
    pub sowing_month: u32,
    pub harvest_month: u32,
    pub expected_price: f64,
}

/// Prediction failures
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PredictError {
    #[error("unknown commodity '{0}'")]
    UnknownCommodity(String),

    #[error("invalid date '{0}' (expected YYYY-MM-DD or DD-MM-YYYY)")]
    InvalidDate(String),

    #[error("no price history available for '{0}'")]
    NoHistory(String),

    #[error("crop duration must be between 1 and 365 days, got {0}")]
    InvalidDuration(i64),
}

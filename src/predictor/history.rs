//! Historical modal price table
//!
//! Loads `{commodity, date, modal_price}` records from a TOML or JSON file:
//!
//! ```toml
//! [[records]]
//! commodity = "wheat"
//! date = "2023-04-15"
//! modal_price = 2125.0
//! ```
//!
//! The JSON form is `{"records": [{"commodity": ..., "date": ..., "modal_price": ...}]}`.

use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// A single observed modal price
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PriceRecord {
    pub commodity: String,
    pub date: String,
    pub modal_price: f64,
}

/// On-disk layout of a history file
#[derive(Debug, Deserialize)]
struct HistoryFile {
    #[serde(default)]
    records: Vec<PriceRecord>,
}

/// Parsed observation for one commodity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub date: NaiveDate,
    pub modal_price: f64,
}

/// Errors raised while loading a price history
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("failed to read price history '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML price history: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid JSON price history: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported price history format '{0}' (expected .toml or .json)")]
    UnsupportedFormat(String),

    #[error("record {index} has invalid date '{value}'")]
    InvalidDate { index: usize, value: String },

    #[error("record {index} has invalid modal price {value}")]
    InvalidPrice { index: usize, value: f64 },

    #[error("price history contains no records")]
    Empty,
}

/// Modal price observations grouped by commodity
#[derive(Debug, Clone, Default)]
pub struct PriceHistory {
    /// Commodity names in first-seen order
    commodities: Vec<String>,
    observations: HashMap<String, Vec<Observation>>,
}

impl PriceHistory {
    /// Build a history from raw records, validating dates and prices
    pub fn from_records(records: Vec<PriceRecord>) -> Result<Self, HistoryError> {
        if records.is_empty() {
            return Err(HistoryError::Empty);
        }

        let mut history = Self::default();
        for (index, record) in records.into_iter().enumerate() {
            let Some(date) = parse_date(&record.date) else {
                return Err(HistoryError::InvalidDate {
                    index,
                    value: record.date,
                });
            };
            if !record.modal_price.is_finite() || record.modal_price < 0.0 {
                return Err(HistoryError::InvalidPrice {
                    index,
                    value: record.modal_price,
                });
            }
            history.push(record.commodity, date, record.modal_price);
        }
        Ok(history)
    }

    /// Load a history file, choosing the parser from the file extension
    pub fn load(path: &Path) -> Result<Self, HistoryError> {
        let content = fs::read_to_string(path).map_err(|source| HistoryError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let file: HistoryFile = match extension.as_str() {
            "toml" => toml::from_str(&content)?,
            "json" => serde_json::from_str(&content)?,
            other => return Err(HistoryError::UnsupportedFormat(other.to_string())),
        };

        Self::from_records(file.records)
    }

    /// Built-in table covering two years of monthly prices for common mandi crops
    pub fn sample() -> Self {
        // (name, base price, seasonal amplitude, peak month, yearly growth)
        const CROPS: [(&str, f64, f64, u32, f64); 5] = [
            ("wheat", 2150.0, 180.0, 2, 0.06),
            ("rice", 2600.0, 220.0, 8, 0.05),
            ("onion", 1800.0, 650.0, 11, 0.08),
            ("tomato", 1500.0, 700.0, 7, 0.04),
            ("potato", 1200.0, 260.0, 12, 0.03),
        ];

        let mut history = Self::default();
        for (name, base, amplitude, peak, growth) in CROPS {
            for (year_index, year) in [2022, 2023].into_iter().enumerate() {
                for month in 1..=12_u32 {
                    let Some(date) = NaiveDate::from_ymd_opt(year, month, 15) else {
                        continue;
                    };
                    let phase = f64::from(month) - f64::from(peak);
                    let seasonal = amplitude * (phase * std::f64::consts::PI / 6.0).cos();
                    #[allow(clippy::cast_precision_loss)]
                    let trend = base * growth * year_index as f64;
                    let price = ((base + trend + seasonal) * 100.0).round() / 100.0;
                    history.push(name.to_string(), date, price);
                }
            }
        }
        history
    }

    fn push(&mut self, commodity: String, date: NaiveDate, modal_price: f64) {
        let entry = self.observations.entry(commodity.clone()).or_default();
        if entry.is_empty() {
            self.commodities.push(commodity);
        }
        entry.push(Observation { date, modal_price });
    }

    pub fn commodities(&self) -> &[String] {
        &self.commodities
    }

    pub fn observations(&self, commodity: &str) -> Option<&[Observation]> {
        self.observations.get(commodity).map(Vec::as_slice)
    }
}

/// Parse a date in `YYYY-MM-DD` or `DD-MM-YYYY` form
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%d-%m-%Y"))
        .ok()
}

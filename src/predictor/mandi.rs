//! Seasonal modal price predictor
//!
//! Estimates combine a per-month seasonal mean with the least-squares trend of
//! annual means, so a commodity that is cheap every March and rising 5% a year
//! is predicted accordingly.

use chrono::{Datelike, Days, NaiveDate};
use std::collections::BTreeMap;
use std::path::Path;

use super::history::{parse_date, HistoryError, Observation, PriceHistory};
use super::{PredictError, Predictor, SowingCandidate, SowingWindow};

/// Non-leap year used to lay out sowing dates
const REFERENCE_YEAR: i32 = 2023;

const MAX_CROP_DURATION: u64 = 365;

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Default predictor over a [`PriceHistory`]
#[derive(Debug, Clone)]
pub struct MandiPredictor {
    history: PriceHistory,
}

impl MandiPredictor {
    pub const fn new(history: PriceHistory) -> Self {
        Self { history }
    }

    /// Load from a history file, or fall back to the built-in sample table
    pub fn load(history_file: Option<&Path>) -> Result<Self, HistoryError> {
        let history = match history_file {
            Some(path) => PriceHistory::load(path)?,
            None => PriceHistory::sample(),
        };
        Ok(Self::new(history))
    }

    fn series(&self, commodity: &str) -> Result<&[Observation], PredictError> {
        self.history
            .observations(commodity)
            .ok_or_else(|| PredictError::UnknownCommodity(commodity.to_string()))
    }
}

impl Predictor for MandiPredictor {
    fn commodities(&self) -> Vec<String> {
        self.history.commodities().to_vec()
    }

    fn predict_price(&self, date: &str, commodity: &str) -> Result<f64, PredictError> {
        let target = parse_date(date).ok_or_else(|| PredictError::InvalidDate(date.to_string()))?;
        let series = self.series(commodity)?;

        let seasonal = seasonal_mean(series, target.month())
            .ok_or_else(|| PredictError::NoHistory(commodity.to_string()))?;
        let trend = YearTrend::fit(series);

        Ok(round_price(seasonal + trend.adjustment(target.year())))
    }

    fn best_sowing_window(
        &self,
        commodity: &str,
        crop_duration: i64,
    ) -> Result<SowingWindow, PredictError> {
        let days = u64::try_from(crop_duration)
            .ok()
            .filter(|d| (1..=MAX_CROP_DURATION).contains(d))
            .ok_or(PredictError::InvalidDuration(crop_duration))?;
        let series = self.series(commodity)?;

        let mut candidates = Vec::with_capacity(12);
        for sowing_month in 1..=12 {
            let Some(harvest) = NaiveDate::from_ymd_opt(REFERENCE_YEAR, sowing_month, 1)
                .and_then(|sown| sown.checked_add_days(Days::new(days)))
            else {
                continue;
            };
            let harvest_month = harvest.month();
            let expected_price = seasonal_mean(series, harvest_month)
                .ok_or_else(|| PredictError::NoHistory(commodity.to_string()))?;
            candidates.push(SowingCandidate {
                sowing_month,
                harvest_month,
                expected_price: round_price(expected_price),
            });
        }

        // Earlier month wins ties
        let best = candidates
            .iter()
            .fold(None::<&SowingCandidate>, |best, c| match best {
                Some(b) if b.expected_price >= c.expected_price => Some(b),
                _ => Some(c),
            })
            .cloned()
            .ok_or_else(|| PredictError::NoHistory(commodity.to_string()))?;

        Ok(SowingWindow {
            commodity: commodity.to_string(),
            crop_duration,
            best_sowing_month: best.sowing_month,
            best_sowing_month_name: month_name(best.sowing_month),
            expected_harvest_month: best.harvest_month,
            expected_harvest_month_name: month_name(best.harvest_month),
            expected_harvest_price: best.expected_price,
            candidates,
        })
    }
}

/// Mean price for a calendar month, or the overall mean when the month is empty
fn seasonal_mean(series: &[Observation], month: u32) -> Option<f64> {
    mean(
        series
            .iter()
            .filter(|o| o.date.month() == month)
            .map(|o| o.modal_price),
    )
    .or_else(|| mean(series.iter().map(|o| o.modal_price)))
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0_u32), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / f64::from(count))
}

/// Linear trend of annual mean prices
#[derive(Debug, Clone, Copy, PartialEq)]
struct YearTrend {
    slope: f64,
    mean_year: f64,
}

impl YearTrend {
    fn fit(series: &[Observation]) -> Self {
        let mut by_year: BTreeMap<i32, (f64, u32)> = BTreeMap::new();
        for obs in series {
            let entry = by_year.entry(obs.date.year()).or_insert((0.0, 0));
            entry.0 += obs.modal_price;
            entry.1 += 1;
        }

        let points: Vec<(f64, f64)> = by_year
            .into_iter()
            .map(|(year, (sum, count))| (f64::from(year), sum / f64::from(count)))
            .collect();

        let mean_year = mean(points.iter().map(|p| p.0)).unwrap_or(0.0);
        if points.len() < 2 {
            return Self {
                slope: 0.0,
                mean_year,
            };
        }

        let mean_price = mean(points.iter().map(|p| p.1)).unwrap_or(0.0);
        let (num, den) = points.iter().fold((0.0, 0.0), |(n, d), (x, y)| {
            let dx = x - mean_year;
            (dx.mul_add(y - mean_price, n), dx.mul_add(dx, d))
        });

        Self {
            slope: if den > 0.0 { num / den } else { 0.0 },
            mean_year,
        }
    }

    fn adjustment(&self, year: i32) -> f64 {
        self.slope * (f64::from(year) - self.mean_year)
    }
}

fn round_price(value: f64) -> f64 {
    (value.max(0.0) * 100.0).round() / 100.0
}

fn month_name(month: u32) -> String {
    usize::try_from(month)
        .ok()
        .and_then(|m| m.checked_sub(1))
        .and_then(|i| MONTH_NAMES.get(i))
        .map_or_else(|| month.to_string(), |name| (*name).to_string())
}

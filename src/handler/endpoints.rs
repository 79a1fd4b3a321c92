//! Endpoint operations
//!
//! Each operation is a stateless mapping from request parameters to a
//! serializable result; the predictor is only read.

use serde::Serialize;

use crate::http::{QueryError, QueryParams};
use crate::predictor::{PredictError, Predictor, SowingWindow, DEFAULT_CROP_DURATION};

pub const HOME_MESSAGE: &str = "Mandi ML API running";

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct HomeResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct CommoditiesResponse {
    pub commodities: Vec<String>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct PriceResponse {
    pub predicted_modal_price: f64,
}

/// Parameters of `GET /predict/`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionRequest {
    pub date: String,
    pub commodity: String,
}

impl PredictionRequest {
    /// Extract both parameters, reporting every missing one
    pub fn from_query(query: &QueryParams) -> Result<Self, Vec<QueryError>> {
        match (query.required("date"), query.required("commodity")) {
            (Ok(date), Ok(commodity)) => Ok(Self { date, commodity }),
            (date, commodity) => Err([date.err(), commodity.err()]
                .into_iter()
                .flatten()
                .collect()),
        }
    }
}

/// Parameters of `GET /best_sowing/`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SowingRequest {
    pub commodity: String,
    pub crop_duration: i64,
}

impl SowingRequest {
    pub fn from_query(query: &QueryParams) -> Result<Self, Vec<QueryError>> {
        match (
            query.required("commodity"),
            query.int_or("crop_duration", DEFAULT_CROP_DURATION),
        ) {
            (Ok(commodity), Ok(crop_duration)) => Ok(Self {
                commodity,
                crop_duration,
            }),
            (commodity, crop_duration) => Err([commodity.err(), crop_duration.err()]
                .into_iter()
                .flatten()
                .collect()),
        }
    }
}

pub const fn home() -> HomeResponse {
    HomeResponse {
        message: HOME_MESSAGE,
    }
}

pub fn list_commodities(predictor: &dyn Predictor) -> CommoditiesResponse {
    CommoditiesResponse {
        commodities: predictor.commodities(),
    }
}

pub fn predict(
    predictor: &dyn Predictor,
    request: &PredictionRequest,
) -> Result<PriceResponse, PredictError> {
    let price = predictor.predict_price(&request.date, &request.commodity)?;
    Ok(PriceResponse {
        predicted_modal_price: price,
    })
}

pub fn best_sowing(
    predictor: &dyn Predictor,
    request: &SowingRequest,
) -> Result<SowingWindow, PredictError> {
    predictor.best_sowing_window(&request.commodity, request.crop_duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_request_reports_all_missing() {
        let errors = PredictionRequest::from_query(&QueryParams::parse(None)).unwrap_err();
        assert_eq!(
            errors,
            vec![QueryError::Missing("date"), QueryError::Missing("commodity")]
        );

        let request =
            PredictionRequest::from_query(&QueryParams::parse(Some("commodity=rice&date=2024-05-01")))
                .unwrap();
        assert_eq!(request.date, "2024-05-01");
        assert_eq!(request.commodity, "rice");
    }

    #[test]
    fn test_sowing_request_defaults_duration() {
        let request = SowingRequest::from_query(&QueryParams::parse(Some("commodity=onion"))).unwrap();
        assert_eq!(request.crop_duration, 90);

        let errors =
            SowingRequest::from_query(&QueryParams::parse(Some("crop_duration=long"))).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0], QueryError::Missing("commodity"));
        assert_eq!(errors[1].name(), "crop_duration");
    }

    #[test]
    fn test_home_is_constant() {
        assert_eq!(home().message, "Mandi ML API running");
    }
}

use std::collections::BTreeMap;

use serde::Serialize;

use super::error::{Error, Result};
use super::features::DatasetMedians;
use super::predictor::HorizonModel;
use super::types::{Fund, Horizon, RiskTolerance};

pub const PROJECTION_MONTHS: u32 = 12;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyProjection {
    pub month: u32,
    pub projected_value: f64,
    pub return_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HorizonForecast {
    Predicted {
        #[serde(rename = "predictedReturn")]
        predicted_return: f64,
        #[serde(rename = "historicalReturn")]
        historical_return: Option<f64>,
        confidence: &'static str,
    },
    Failed {
        error: String,
    },
}

impl HorizonForecast {
    pub fn predicted_return(&self) -> Option<f64> {
        match self {
            HorizonForecast::Predicted {
                predicted_return, ..
            } => Some(*predicted_return),
            HorizonForecast::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentMetrics {
    pub risk_level: u8,
    pub rating: u8,
    pub expense_ratio: f64,
    pub fund_size: f64,
    pub fund_age: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FundForecast {
    pub fund_name: String,
    pub amc_name: String,
    pub current_metrics: CurrentMetrics,
    /// Keyed `1_year`, `3_year`, `5_year`.
    pub predictions: BTreeMap<String, HorizonForecast>,
    pub monthly_projections: Vec<MonthlyProjection>,
    pub forecast_horizon: u32,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn confidence(horizon: Horizon) -> &'static str {
    match horizon {
        Horizon::ThreeYear => "high",
        Horizon::OneYear | Horizon::FiveYear => "medium",
    }
}

/// Growth of 100 units compounded monthly at `annual_return` percent.
pub fn monthly_projections(annual_return: f64) -> Vec<MonthlyProjection> {
    let monthly_rate = annual_return / 12.0 / 100.0;
    (1..=PROJECTION_MONTHS)
        .map(|month| {
            let value = 100.0 * (1.0 + monthly_rate).powi(month as i32);
            MonthlyProjection {
                month,
                projected_value: round2(value),
                return_percentage: round2(value - 100.0),
            }
        })
        .collect()
}

pub fn horizon_forecast(
    fund: &Fund,
    horizon: Horizon,
    model: Option<&HorizonModel>,
    medians: &DatasetMedians,
) -> HorizonForecast {
    let predicted = model
        .ok_or(Error::ModelUnavailable {
            horizon: horizon.years(),
        })
        .and_then(|model| model.predict_fund(fund, medians));

    match predicted {
        Ok(predicted_return) => HorizonForecast::Predicted {
            predicted_return,
            historical_return: fund.historical_return(horizon),
            confidence: confidence(horizon),
        },
        Err(err) => {
            tracing::warn!(
                scheme = %fund.scheme_name,
                horizon = horizon.years(),
                error = %err,
                "Forecast prediction failed."
            );
            HorizonForecast::Failed {
                error: format!("Prediction failed: {err}"),
            }
        }
    }
}

/// Forecasts every horizon for one fund. A failed requested horizon leaves
/// the projections empty instead of failing the whole forecast.
pub fn forecast_fund(
    fund: &Fund,
    requested: Horizon,
    models: &BTreeMap<Horizon, HorizonModel>,
    medians: &DatasetMedians,
) -> FundForecast {
    let mut predictions = BTreeMap::new();
    let mut requested_return = None;
    for horizon in Horizon::ALL {
        let entry = horizon_forecast(fund, horizon, models.get(&horizon), medians);
        if horizon == requested {
            requested_return = entry.predicted_return();
        }
        predictions.insert(format!("{}_year", horizon.years()), entry);
    }

    FundForecast {
        fund_name: fund.scheme_name.clone(),
        amc_name: fund.amc_name.clone(),
        current_metrics: CurrentMetrics {
            risk_level: fund.risk_level,
            rating: fund.rating,
            expense_ratio: fund.expense_ratio,
            fund_size: fund.fund_size,
            fund_age: fund.fund_age,
        },
        predictions,
        monthly_projections: requested_return
            .map(monthly_projections)
            .unwrap_or_default(),
        forecast_horizon: requested.years(),
    }
}

pub fn find_fund<'a>(universe: &'a [Fund], scheme_name: &str) -> Result<&'a Fund> {
    universe
        .iter()
        .find(|fund| fund.scheme_name == scheme_name)
        .ok_or_else(|| Error::NotFound {
            message: format!("no fund named {scheme_name:?}"),
        })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictedPerformer {
    pub scheme_name: String,
    pub amc_name: String,
    pub predicted_return: f64,
    pub actual_return: f64,
    pub prediction_error: f64,
    pub risk_level: u8,
    pub expense_ratio: f64,
    pub rating: u8,
}

/// Ranks funds in the tolerance band by predicted return, highest first.
pub fn top_predicted_performers(
    universe: &[Fund],
    model: &HorizonModel,
    medians: &DatasetMedians,
    risk_tolerance: RiskTolerance,
    limit: usize,
) -> Vec<PredictedPerformer> {
    let band = risk_tolerance.risk_range();
    let mut performers: Vec<PredictedPerformer> = universe
        .iter()
        .filter(|fund| band.contains(&fund.risk_level))
        .filter_map(|fund| {
            let actual_return = fund.historical_return(model.horizon)?;
            let predicted_return = match model.predict_fund(fund, medians) {
                Ok(value) => value,
                Err(err) => {
                    tracing::warn!(
                        scheme = %fund.scheme_name,
                        horizon = model.horizon.years(),
                        error = %err,
                        "Leaving fund out of top predicted performers."
                    );
                    return None;
                }
            };
            Some(PredictedPerformer {
                scheme_name: fund.scheme_name.clone(),
                amc_name: fund.amc_name.clone(),
                predicted_return,
                actual_return,
                prediction_error: (predicted_return - actual_return).abs(),
                risk_level: fund.risk_level,
                expense_ratio: fund.expense_ratio,
                rating: fund.rating,
            })
        })
        .collect();

    performers.sort_by(|a, b| b.predicted_return.total_cmp(&a.predicted_return));
    performers.truncate(limit);
    performers
}

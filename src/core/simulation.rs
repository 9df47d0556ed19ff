use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::error::{Error, Result};
use super::features::DatasetMedians;
use super::predictor::HorizonModel;
use super::types::{Fund, Horizon};

/// Delays, in months, compared against investing today.
pub const WAIT_PERIODS_MONTHS: [u32; 3] = [1, 3, 6];
/// Annual rate earned by cash parked while waiting.
pub const IDLE_ANNUAL_RATE: f64 = 0.04;
/// Shortest investment period left after a wait, in years.
pub const MIN_INVESTED_YEARS: f64 = 0.5;
/// Annual return assumed when neither the model nor history has one.
pub const FALLBACK_ANNUAL_RETURN: f64 = 10.0;
/// Share of the amount a profit gap must exceed to be called strong.
const STRONG_GAP_SHARE: f64 = 0.05;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketRegime {
    Bull,
    #[default]
    Sideways,
    Volatile,
}

impl MarketRegime {
    pub fn label(self) -> &'static str {
        match self {
            MarketRegime::Bull => "bull",
            MarketRegime::Sideways => "sideways",
            MarketRegime::Volatile => "volatile",
        }
    }

    /// Annual return shift, as a fraction, applied when investing after `wait_months`.
    pub fn wait_adjustment(self, wait_months: u32) -> f64 {
        match (self, wait_months) {
            (MarketRegime::Bull, 1) => 0.02,
            (MarketRegime::Bull, 3) => 0.05,
            (MarketRegime::Bull, 6) => 0.10,
            (MarketRegime::Sideways, 3) => -0.01,
            (MarketRegime::Sideways, 6) => -0.02,
            (MarketRegime::Volatile, 1) => -0.03,
            (MarketRegime::Volatile, 3) => -0.05,
            (MarketRegime::Volatile, 6) => -0.08,
            _ => 0.0,
        }
    }
}

impl FromStr for MarketRegime {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bull" => Ok(MarketRegime::Bull),
            "sideways" => Ok(MarketRegime::Sideways),
            "volatile" => Ok(MarketRegime::Volatile),
            _ => Err(Error::Configuration {
                message: format!(
                    "unknown market regime {value:?}; expected bull, sideways or volatile"
                ),
            }),
        }
    }
}

impl fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhatIfRequest {
    pub fund_names: Vec<String>,
    pub amount: f64,
    pub horizon: Horizon,
    pub market_regime: MarketRegime,
}

impl WhatIfRequest {
    /// Validates raw input. A missing regime means `sideways`.
    pub fn new(
        fund_names: Vec<String>,
        amount: f64,
        duration_years: u32,
        market_regime: Option<&str>,
    ) -> Result<Self> {
        let horizon = Horizon::try_from(duration_years)?;
        if !amount.is_finite() || amount <= 0.0 {
            return Err(Error::Configuration {
                message: format!("investment amount must be > 0, got {amount}"),
            });
        }
        let market_regime = match market_regime.map(str::trim) {
            Some(label) if !label.is_empty() => label.parse()?,
            _ => MarketRegime::default(),
        };

        Ok(Self {
            fund_names,
            amount,
            horizon,
            market_regime,
        })
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Timing {
    InvestNow,
    Wait,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    Strong,
    Moderate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestNowOutcome {
    pub final_value: f64,
    pub profit: f64,
    pub return_percentage: f64,
    pub duration_years: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitOutcome {
    pub final_value: f64,
    pub profit: f64,
    pub return_percentage: f64,
    pub duration_years: f64,
    pub idle_earnings: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitTotal {
    pub final_value: f64,
    pub profit: f64,
    /// Invest-now profit minus total waiting profit.
    pub net_difference: f64,
    pub recommendation: Timing,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FundScenario {
    pub fund_name: String,
    pub amc_name: String,
    pub base_return: f64,
    pub invest_now: InvestNowOutcome,
    pub wait_and_invest: WaitOutcome,
    pub total_wait_scenario: WaitTotal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioAggregate {
    pub avg_invest_now_profit: f64,
    pub avg_wait_profit: f64,
    pub net_difference: f64,
    pub recommendation: Timing,
    pub recommendation_strength: Strength,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitScenario {
    pub wait_months: u32,
    pub market_regime: MarketRegime,
    pub fund_results: Vec<FundScenario>,
    pub aggregate: ScenarioAggregate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSummary {
    /// Wait period where investing now beats waiting by the widest margin.
    pub best_scenario_months: u32,
    /// Wait period with the lowest average waiting profit.
    pub worst_wait_months: u32,
    pub general_recommendation: Timing,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatIfSimulation {
    pub investment_amount: f64,
    pub duration_years: u32,
    pub market_regime: MarketRegime,
    pub scenarios: Vec<WaitScenario>,
    pub summary: SimulationSummary,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn timing(now_profit: f64, wait_profit: f64) -> Timing {
    if now_profit > wait_profit {
        Timing::InvestNow
    } else {
        Timing::Wait
    }
}

/// Model prediction for the horizon, else the fund's history, else the fallback rate.
fn base_return(
    fund: &Fund,
    horizon: Horizon,
    model: Option<&HorizonModel>,
    medians: &DatasetMedians,
) -> f64 {
    let predicted = model
        .ok_or(Error::ModelUnavailable {
            horizon: horizon.years(),
        })
        .and_then(|model| model.predict_fund(fund, medians));
    match predicted {
        Ok(value) => value,
        Err(err) => {
            let fallback = fund
                .historical_return(horizon)
                .unwrap_or(FALLBACK_ANNUAL_RETURN);
            tracing::warn!(
                scheme = %fund.scheme_name,
                horizon = horizon.years(),
                error = %err,
                fallback,
                "Simulation prediction failed; using historical return."
            );
            fallback
        }
    }
}

fn fund_scenario(
    fund: &Fund,
    base_return: f64,
    request: &WhatIfRequest,
    wait_months: u32,
) -> FundScenario {
    let amount = request.amount;
    let years = request.horizon.years();

    let now_rate = base_return / 100.0;
    let now_value = amount * (1.0 + now_rate).powi(years as i32);
    let now_profit = now_value - amount;

    let waited_years = f64::from(wait_months) / 12.0;
    let invested_years = (f64::from(years) - waited_years).max(MIN_INVESTED_YEARS);
    let wait_rate = now_rate + request.market_regime.wait_adjustment(wait_months);
    let wait_value = amount * (1.0 + wait_rate).powf(invested_years);
    let wait_profit = wait_value - amount;

    let idle_earnings = amount * IDLE_ANNUAL_RATE * waited_years;
    let total_value = wait_value + idle_earnings;
    let total_profit = total_value - amount;

    FundScenario {
        fund_name: fund.scheme_name.clone(),
        amc_name: fund.amc_name.clone(),
        base_return,
        invest_now: InvestNowOutcome {
            final_value: round2(now_value),
            profit: round2(now_profit),
            return_percentage: round2(now_rate * 100.0),
            duration_years: years,
        },
        wait_and_invest: WaitOutcome {
            final_value: round2(wait_value),
            profit: round2(wait_profit),
            return_percentage: round2(wait_rate * 100.0),
            duration_years: round2(invested_years),
            idle_earnings: round2(idle_earnings),
        },
        total_wait_scenario: WaitTotal {
            final_value: round2(total_value),
            profit: round2(total_profit),
            net_difference: round2(now_profit - total_profit),
            recommendation: timing(now_profit, total_profit),
        },
    }
}

fn aggregate(results: &[FundScenario], amount: f64) -> ScenarioAggregate {
    let count = results.len().max(1) as f64;
    let now: f64 = results.iter().map(|r| r.invest_now.profit).sum::<f64>() / count;
    let wait: f64 = results
        .iter()
        .map(|r| r.total_wait_scenario.profit)
        .sum::<f64>()
        / count;
    let strength = if (now - wait).abs() > amount * STRONG_GAP_SHARE {
        Strength::Strong
    } else {
        Strength::Moderate
    };

    ScenarioAggregate {
        avg_invest_now_profit: round2(now),
        avg_wait_profit: round2(wait),
        net_difference: round2(now - wait),
        recommendation: timing(now, wait),
        recommendation_strength: strength,
    }
}

fn summarize(scenarios: &[WaitScenario]) -> SimulationSummary {
    let best = scenarios
        .iter()
        .min_by(|a, b| b.aggregate.net_difference.total_cmp(&a.aggregate.net_difference))
        .map_or(WAIT_PERIODS_MONTHS[0], |s| s.wait_months);
    let worst = scenarios
        .iter()
        .min_by(|a, b| a.aggregate.avg_wait_profit.total_cmp(&b.aggregate.avg_wait_profit))
        .map_or(WAIT_PERIODS_MONTHS[0], |s| s.wait_months);
    let general = if scenarios
        .iter()
        .all(|s| s.aggregate.recommendation == Timing::InvestNow)
    {
        Timing::InvestNow
    } else {
        Timing::Wait
    };

    SimulationSummary {
        best_scenario_months: best,
        worst_wait_months: worst,
        general_recommendation: general,
    }
}

/// Compares investing today with waiting 1, 3 or 6 months under the given regime.
/// Unknown names are skipped; when none match the result is `NotFound`.
pub fn simulate_waiting(
    universe: &[Fund],
    model: Option<&HorizonModel>,
    medians: &DatasetMedians,
    request: &WhatIfRequest,
) -> Result<WhatIfSimulation> {
    let bases: Vec<(&Fund, f64)> = request
        .fund_names
        .iter()
        .filter_map(|name| universe.iter().find(|fund| &fund.scheme_name == name))
        .map(|fund| (fund, base_return(fund, request.horizon, model, medians)))
        .collect();
    if bases.is_empty() {
        return Err(Error::NotFound {
            message: "no matching funds found".to_string(),
        });
    }

    let scenarios: Vec<WaitScenario> = WAIT_PERIODS_MONTHS
        .into_iter()
        .map(|wait_months| {
            let fund_results: Vec<FundScenario> = bases
                .iter()
                .map(|&(fund, base)| fund_scenario(fund, base, request, wait_months))
                .collect();
            WaitScenario {
                wait_months,
                market_regime: request.market_regime,
                aggregate: aggregate(&fund_results, request.amount),
                fund_results,
            }
        })
        .collect();
    let summary = summarize(&scenarios);

    Ok(WhatIfSimulation {
        investment_amount: request.amount,
        duration_years: request.horizon.years(),
        market_regime: request.market_regime,
        scenarios,
        summary,
    })
}

use std::collections::BTreeMap;

use serde::Serialize;

use super::features::DatasetMedians;
use super::forecast::find_fund;
use super::predictor::HorizonModel;
use super::types::{Fund, Horizon};

/// Columns compared when the caller names none.
pub const DEFAULT_COMPARISON_METRICS: [&str; 5] = [
    "return_1yr",
    "return_3yr",
    "return_5yr",
    "risk_level",
    "expense_ratio",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparedFund {
    pub fund_name: String,
    pub amc_name: String,
    /// Requested columns this fund holds a value for.
    pub metrics: BTreeMap<String, f64>,
    /// Keyed `predicted_1yr`, `predicted_3yr`, `predicted_5yr`.
    pub predictions: BTreeMap<String, f64>,
    /// 1 marks the highest value among compared funds. Equal values share a rank.
    pub ranks: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ComparisonEntry {
    Found(ComparedFund),
    Missing {
        #[serde(rename = "fundName")]
        fund_name: String,
        error: String,
    },
}

impl ComparisonEntry {
    pub fn found(&self) -> Option<&ComparedFund> {
        match self {
            ComparisonEntry::Found(fund) => Some(fund),
            ComparisonEntry::Missing { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FundComparison {
    pub comparison: Vec<ComparisonEntry>,
    pub metrics_compared: Vec<String>,
    pub total_funds: usize,
}

fn compared_fund(
    fund: &Fund,
    models: &BTreeMap<Horizon, HorizonModel>,
    medians: &DatasetMedians,
    metrics: &[String],
) -> ComparedFund {
    let values = metrics
        .iter()
        .filter_map(|metric| Some((metric.clone(), fund.feature_value(metric)?)))
        .collect();

    let mut predictions = BTreeMap::new();
    for (horizon, model) in models {
        match model.predict_fund(fund, medians) {
            Ok(value) => {
                predictions.insert(format!("predicted_{}yr", horizon.years()), value);
            }
            Err(err) => tracing::warn!(
                scheme = %fund.scheme_name,
                horizon = horizon.years(),
                error = %err,
                "Comparison prediction failed."
            ),
        }
    }

    ComparedFund {
        fund_name: fund.scheme_name.clone(),
        amc_name: fund.amc_name.clone(),
        metrics: values,
        predictions,
        ranks: BTreeMap::new(),
    }
}

fn assign_ranks(entries: &mut [ComparisonEntry], metrics: &[String]) {
    for metric in metrics {
        let values: Vec<f64> = entries
            .iter()
            .filter_map(|entry| entry.found()?.metrics.get(metric).copied())
            .collect();
        for entry in entries.iter_mut() {
            let ComparisonEntry::Found(fund) = entry else {
                continue;
            };
            if let Some(&value) = fund.metrics.get(metric) {
                let rank = 1 + values.iter().filter(|&&other| other > value).count();
                fund.ranks.insert(metric.clone(), rank);
            }
        }
    }
}

/// Side-by-side view of the named funds. Unknown names stay in place as
/// `{fundName, error}` entries; ranks need at least two funds found.
pub fn compare_funds(
    universe: &[Fund],
    models: &BTreeMap<Horizon, HorizonModel>,
    medians: &DatasetMedians,
    fund_names: &[String],
    metrics: &[String],
) -> FundComparison {
    let mut comparison: Vec<ComparisonEntry> = fund_names
        .iter()
        .map(|name| match find_fund(universe, name) {
            Ok(fund) => ComparisonEntry::Found(compared_fund(fund, models, medians, metrics)),
            Err(err) => ComparisonEntry::Missing {
                fund_name: name.clone(),
                error: err.to_string(),
            },
        })
        .collect();

    let found = comparison.iter().filter(|entry| entry.found().is_some()).count();
    if found > 1 {
        assign_ranks(&mut comparison, metrics);
    }

    FundComparison {
        comparison,
        metrics_compared: metrics.to_vec(),
        total_funds: fund_names.len(),
    }
}

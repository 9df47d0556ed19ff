use std::collections::HashMap;

use super::error::{Error, Result};
use super::types::Fund;

/// Per-column medians over the whole universe, computed once at load time.
#[derive(Debug, Clone, Default)]
pub struct DatasetMedians {
    values: HashMap<String, f64>,
}

impl DatasetMedians {
    pub fn compute<'a>(funds: &[Fund], columns: impl IntoIterator<Item = &'a str>) -> Self {
        let mut values = HashMap::new();
        for column in columns {
            if values.contains_key(column) {
                continue;
            }
            let mut present: Vec<f64> = funds
                .iter()
                .filter_map(|fund| fund.feature_value(column))
                .filter(|value| value.is_finite())
                .collect();
            if let Some(median) = median(&mut present) {
                values.insert(column.to_string(), median);
            }
        }
        Self { values }
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        self.values.get(column).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Median of the given values; even-length inputs average the two middle values.
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    values.sort_by(|a, b| a.total_cmp(b));

    let n = values.len();
    let mid = n / 2;
    if n % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) * 0.5)
    }
}

/// Builds the ordered feature vector a horizon model expects.
///
/// Missing fund values fall back to the dataset median, then to the model's
/// own medians snapshot. A column with neither is a `Feature` error.
pub fn assemble_features(
    fund: &Fund,
    columns: &[String],
    medians: &DatasetMedians,
    snapshot: &HashMap<String, f64>,
) -> Result<Vec<f64>> {
    columns
        .iter()
        .map(|column| {
            fund.feature_value(column)
                .filter(|value| value.is_finite())
                .or_else(|| medians.get(column))
                .or_else(|| snapshot.get(column.as_str()).copied())
                .ok_or_else(|| Error::Feature {
                    column: column.clone(),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Category;
    use std::collections::{BTreeMap, BTreeSet};

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn fund(name: &str, return_1yr: Option<f64>, fund_size: f64) -> Fund {
        Fund {
            scheme_name: name.to_string(),
            amc_name: "AMC".to_string(),
            category: Some(Category::Equity),
            sub_categories: BTreeSet::from(["Large Cap".to_string()]),
            min_sip: 500.0,
            min_lumpsum: 1_000.0,
            risk_level: 4,
            return_1yr,
            return_3yr: Some(12.0),
            return_5yr: None,
            expense_ratio: 1.0,
            fund_size,
            fund_age: 5.0,
            rating: 4,
            risk_adjusted_score: 0.5,
            stability_score: 0.5,
            cost_efficiency: 0.5,
            extra_features: BTreeMap::new(),
        }
    }

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn median_handles_odd_and_even_lengths() {
        assert_eq!(median(&mut []), None);
        assert_approx(median(&mut [3.0, 1.0, 2.0]).expect("median"), 2.0);
        assert_approx(median(&mut [4.0, 1.0, 3.0, 2.0]).expect("median"), 2.5);
    }

    #[test]
    fn medians_skip_missing_values() {
        let funds = vec![
            fund("a", Some(10.0), 100.0),
            fund("b", None, 200.0),
            fund("c", Some(20.0), 600.0),
        ];
        let medians = DatasetMedians::compute(&funds, ["return_1yr", "fund_size", "return_5yr"]);

        assert_approx(medians.get("return_1yr").expect("median"), 15.0);
        assert_approx(medians.get("fund_size").expect("median"), 200.0);
        assert_eq!(medians.get("return_5yr"), None);
        assert_eq!(medians.len(), 2);
    }

    #[test]
    fn assemble_uses_fund_values_in_column_order() {
        let target = fund("a", Some(10.0), 100.0);
        let medians = DatasetMedians::default();
        let features = assemble_features(
            &target,
            &columns(&["fund_size", "category_Equity", "sub_category_Mid Cap", "risk_level"]),
            &medians,
            &HashMap::new(),
        )
        .expect("features");

        assert_eq!(features, vec![100.0, 1.0, 0.0, 4.0]);
    }

    #[test]
    fn assemble_falls_back_to_dataset_median_then_snapshot() {
        let funds = vec![fund("a", Some(10.0), 100.0), fund("b", Some(30.0), 300.0)];
        let medians = DatasetMedians::compute(&funds, ["return_1yr"]);
        let target = fund("c", None, 50.0);
        let snapshot = HashMap::from([("return_5yr".to_string(), 14.0)]);

        let features = assemble_features(
            &target,
            &columns(&["return_1yr", "return_5yr"]),
            &medians,
            &snapshot,
        )
        .expect("features");

        assert_eq!(features, vec![20.0, 14.0]);
    }

    #[test]
    fn assemble_fails_for_column_without_any_median() {
        let target = fund("a", Some(10.0), 100.0);
        let err = assemble_features(
            &target,
            &columns(&["return_5yr"]),
            &DatasetMedians::default(),
            &HashMap::new(),
        )
        .expect_err("no fallback");

        match err {
            Error::Feature { column } => assert_eq!(column, "return_5yr"),
            other => panic!("unexpected error {other:?}"),
        }
    }
}

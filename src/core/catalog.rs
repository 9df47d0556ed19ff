use std::collections::BTreeSet;

use serde::Serialize;

use super::error::{Error, Result};
use super::filter::resolve_category;
use super::types::{Category, Fund};

/// Distinct AMC names in ascending order.
pub fn amc_names(universe: &[Fund]) -> Vec<&str> {
    universe
        .iter()
        .map(|fund| fund.amc_name.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub name: &'static str,
    pub count: usize,
}

/// Funds per main category, largest first. Empty categories are left out.
pub fn category_counts(universe: &[Fund]) -> Vec<CategoryCount> {
    let mut counts: Vec<CategoryCount> = Category::ALL
        .into_iter()
        .map(|category| CategoryCount {
            name: category.label(),
            count: universe
                .iter()
                .filter(|fund| fund.category == Some(category))
                .count(),
        })
        .filter(|entry| entry.count > 0)
        .collect();
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts
}

#[derive(Debug, Clone)]
pub struct PerformerQuery {
    pub metric: String,
    pub category: Option<String>,
    pub limit: usize,
}

impl Default for PerformerQuery {
    fn default() -> Self {
        Self {
            metric: "return_3yr".to_string(),
            category: None,
            limit: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalPerformer {
    pub rank: usize,
    pub scheme_name: String,
    pub amc_name: String,
    pub metric_value: f64,
    pub return_1yr: Option<f64>,
    pub return_3yr: Option<f64>,
    pub return_5yr: Option<f64>,
    pub risk_level: u8,
    pub rating: u8,
    pub expense_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopPerformers {
    pub metric: String,
    /// Category filter applied, or `All`.
    pub category: &'static str,
    pub top_performers: Vec<HistoricalPerformer>,
    /// Funds left after the category filter.
    pub total_evaluated: usize,
}

/// Ranks funds by a recorded dataset column, highest first. A column no
/// fund carries is a configuration error; funds missing the value drop out.
pub fn top_historical_performers(
    universe: &[Fund],
    query: &PerformerQuery,
) -> Result<TopPerformers> {
    let metric = query.metric.as_str();
    if !universe.iter().any(|fund| fund.feature_value(metric).is_some()) {
        return Err(Error::Configuration {
            message: format!("invalid metric {metric:?}"),
        });
    }

    let category = resolve_category(query.category.as_deref());
    let evaluated: Vec<&Fund> = universe
        .iter()
        .filter(|fund| category.is_none_or(|category| fund.category == Some(category)))
        .collect();
    let mut ranked: Vec<(&Fund, f64)> = evaluated
        .iter()
        .filter_map(|&fund| {
            let value = fund.feature_value(metric).filter(|value| value.is_finite())?;
            Some((fund, value))
        })
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    let top_performers = ranked
        .into_iter()
        .take(query.limit)
        .enumerate()
        .map(|(index, (fund, metric_value))| HistoricalPerformer {
            rank: index + 1,
            scheme_name: fund.scheme_name.clone(),
            amc_name: fund.amc_name.clone(),
            metric_value,
            return_1yr: fund.return_1yr,
            return_3yr: fund.return_3yr,
            return_5yr: fund.return_5yr,
            risk_level: fund.risk_level,
            rating: fund.rating,
            expense_ratio: fund.expense_ratio,
        })
        .collect();

    Ok(TopPerformers {
        metric: query.metric.clone(),
        category: category.map_or("All", Category::label),
        top_performers,
        total_evaluated: evaluated.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn fund(name: &str, amc: &str, category: Option<Category>, return_3yr: Option<f64>) -> Fund {
        Fund {
            scheme_name: name.to_string(),
            amc_name: amc.to_string(),
            category,
            sub_categories: BTreeSet::new(),
            min_sip: 500.0,
            min_lumpsum: 5_000.0,
            risk_level: 4,
            return_1yr: Some(8.0),
            return_3yr,
            return_5yr: None,
            expense_ratio: 0.7,
            fund_size: 1_000.0,
            fund_age: 5.0,
            rating: 3,
            risk_adjusted_score: 0.5,
            stability_score: 0.5,
            cost_efficiency: 0.5,
            extra_features: BTreeMap::new(),
        }
    }

    fn universe() -> Vec<Fund> {
        let mut sharpe = fund("debt", "Kotak", Some(Category::Debt), Some(7.0));
        sharpe.extra_features.insert("sharpe".to_string(), 1.8);
        vec![
            fund("eq-low", "SBI", Some(Category::Equity), Some(11.0)),
            fund("eq-high", "Axis", Some(Category::Equity), Some(24.0)),
            sharpe,
            fund("hybrid", "SBI", Some(Category::Hybrid), None),
            fund("eq-tie", "HDFC", Some(Category::Equity), Some(11.0)),
            fund("loose", "Axis", None, Some(30.0)),
        ]
    }

    fn names(performers: &TopPerformers) -> Vec<&str> {
        performers
            .top_performers
            .iter()
            .map(|p| p.scheme_name.as_str())
            .collect()
    }

    #[test]
    fn amc_names_are_sorted_and_distinct() {
        assert_eq!(amc_names(&universe()), vec!["Axis", "HDFC", "Kotak", "SBI"]);
    }

    #[test]
    fn category_counts_sort_largest_first_and_skip_empty() {
        let counts = category_counts(&universe());
        assert_eq!(
            counts,
            vec![
                CategoryCount { name: "Equity", count: 3 },
                CategoryCount { name: "Hybrid", count: 1 },
                CategoryCount { name: "Debt", count: 1 },
            ]
        );
    }

    #[test]
    fn top_performers_rank_by_metric_within_category() {
        let query = PerformerQuery {
            category: Some("equity".to_string()),
            limit: 2,
            ..PerformerQuery::default()
        };
        let top = top_historical_performers(&universe(), &query).expect("valid metric");

        assert_eq!(top.category, "Equity");
        assert_eq!(top.total_evaluated, 3);
        assert_eq!(names(&top), vec!["eq-high", "eq-low"]);
        assert_eq!(top.top_performers[0].rank, 1);
        assert_eq!(top.top_performers[1].rank, 2);
        assert_eq!(top.top_performers[0].metric_value, 24.0);
    }

    #[test]
    fn top_performers_drop_missing_values_and_accept_extra_columns() {
        let all = top_historical_performers(&universe(), &PerformerQuery::default())
            .expect("valid metric");
        assert_eq!(all.category, "All");
        assert_eq!(all.total_evaluated, 6);
        assert_eq!(names(&all), vec!["loose", "eq-high", "eq-low", "eq-tie", "debt"]);

        let sharpe = PerformerQuery {
            metric: "sharpe".to_string(),
            ..PerformerQuery::default()
        };
        let top = top_historical_performers(&universe(), &sharpe).expect("extra column");
        assert_eq!(names(&top), vec!["debt"]);
        assert_eq!(top.top_performers[0].metric_value, 1.8);
    }

    #[test]
    fn unknown_metric_is_a_configuration_error() {
        let query = PerformerQuery {
            metric: "alpha".to_string(),
            ..PerformerQuery::default()
        };
        assert!(matches!(
            top_historical_performers(&universe(), &query),
            Err(Error::Configuration { .. })
        ));
    }
}

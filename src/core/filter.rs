use std::ops::RangeInclusive;

use super::error::{Error, Result};
use super::types::{Category, Fund, Horizon, RecommendRequest};

/// Candidate funds need at least this many survivors to form a pair.
pub const MIN_CANDIDATES: usize = 2;

/// Narrowing criteria shared by recommendation filtering and the monotonicity tests.
#[derive(Debug, Clone)]
pub struct CandidateCriteria {
    pub amount: f64,
    pub horizon: Horizon,
    pub risk_band: RangeInclusive<u8>,
    pub category: Option<Category>,
}

impl CandidateCriteria {
    pub fn from_request(request: &RecommendRequest) -> Self {
        Self {
            amount: request.amount,
            horizon: request.horizon,
            risk_band: request.risk_tolerance.risk_range(),
            category: resolve_category(request.category_preference.as_deref()),
        }
    }
}

/// Maps a free-form category preference onto a known category.
/// Names that match nothing leave the candidate set unconstrained.
pub fn resolve_category(preference: Option<&str>) -> Option<Category> {
    let preference = preference?;
    let category = Category::from_label(preference);
    if category.is_none() {
        tracing::debug!(
            preference,
            "Category preference matches no category; ignoring it."
        );
    }
    category
}

/// Each fund is split across two picks, so either minimum must fit half the amount.
pub fn is_affordable(fund: &Fund, amount: f64) -> bool {
    let half = amount / 2.0;
    fund.min_sip <= half || fund.min_lumpsum <= half
}

pub fn narrow_candidates<'a>(universe: &'a [Fund], criteria: &CandidateCriteria) -> Vec<&'a Fund> {
    let affordable: Vec<&Fund> = universe
        .iter()
        .filter(|fund| is_affordable(fund, criteria.amount))
        .collect();
    let in_band: Vec<&Fund> = affordable
        .iter()
        .copied()
        .filter(|fund| criteria.risk_band.contains(&fund.risk_level))
        .collect();
    let in_category: Vec<&Fund> = match criteria.category {
        Some(category) => in_band
            .iter()
            .copied()
            .filter(|fund| fund.category == Some(category))
            .collect(),
        None => in_band.clone(),
    };
    let complete: Vec<&Fund> = in_category
        .iter()
        .copied()
        .filter(|fund| fund.historical_return(criteria.horizon).is_some())
        .collect();

    tracing::debug!(
        universe = universe.len(),
        affordable = affordable.len(),
        in_band = in_band.len(),
        in_category = in_category.len(),
        complete = complete.len(),
        "Narrowed candidate funds."
    );

    complete
}

pub fn filter_candidates<'a>(
    universe: &'a [Fund],
    request: &RecommendRequest,
) -> Result<Vec<&'a Fund>> {
    let criteria = CandidateCriteria::from_request(request);
    let candidates = narrow_candidates(universe, &criteria);
    if candidates.len() < MIN_CANDIDATES {
        return Err(Error::InsufficientCandidates {
            message: format!(
                "Insufficient funds match your criteria ({} eligible, {MIN_CANDIDATES} needed). \
                 Please adjust preferences.",
                candidates.len()
            ),
        });
    }
    Ok(candidates)
}

#[derive(Debug, Clone)]
pub struct FundQuery {
    pub amc_name: Option<String>,
    pub category: Option<String>,
    pub risk_level: Option<u8>,
    pub min_rating: Option<u8>,
    pub limit: usize,
}

impl Default for FundQuery {
    fn default() -> Self {
        Self {
            amc_name: None,
            category: None,
            risk_level: None,
            min_rating: None,
            limit: 50,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FundListing<'a> {
    pub funds: Vec<&'a Fund>,
    /// Number of funds returned, counted after `limit` is applied.
    pub total_found: usize,
}

pub fn query_funds<'a>(universe: &'a [Fund], query: &FundQuery) -> FundListing<'a> {
    let category = resolve_category(query.category.as_deref());
    let matched: Vec<&Fund> = universe
        .iter()
        .filter(|fund| {
            query
                .amc_name
                .as_deref()
                .is_none_or(|amc| fund.amc_name == amc)
        })
        .filter(|fund| category.is_none_or(|category| fund.category == Some(category)))
        .filter(|fund| query.risk_level.is_none_or(|level| fund.risk_level == level))
        .filter(|fund| query.min_rating.is_none_or(|rating| fund.rating >= rating))
        .take(query.limit)
        .collect();

    FundListing {
        total_found: matched.len(),
        funds: matched,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::RiskTolerance;
    use proptest::prelude::{prop, prop_assert, proptest};
    use proptest::strategy::Strategy;
    use std::collections::{BTreeMap, BTreeSet};

    fn fund(name: &str, risk_level: u8, category: Category, min_sip: f64) -> Fund {
        Fund {
            scheme_name: name.to_string(),
            amc_name: "AMC".to_string(),
            category: Some(category),
            sub_categories: BTreeSet::new(),
            min_sip,
            min_lumpsum: min_sip * 10.0,
            risk_level,
            return_1yr: Some(8.0),
            return_3yr: Some(10.0),
            return_5yr: Some(12.0),
            expense_ratio: 1.0,
            fund_size: 1_000.0,
            fund_age: 6.0,
            rating: 3,
            risk_adjusted_score: 0.4,
            stability_score: 0.6,
            cost_efficiency: 0.5,
            extra_features: BTreeMap::new(),
        }
    }

    fn request(amount: f64, risk: &str, category: Option<&str>) -> RecommendRequest {
        RecommendRequest::new(amount, 3, risk, category).expect("valid request")
    }

    fn names(funds: &[&Fund]) -> Vec<String> {
        funds.iter().map(|fund| fund.scheme_name.clone()).collect()
    }

    #[test]
    fn affordability_accepts_either_minimum() {
        let mut f = fund("a", 3, Category::Equity, 3_000.0);
        f.min_lumpsum = 2_000.0;
        assert!(is_affordable(&f, 4_000.0));
        f.min_lumpsum = 2_001.0;
        assert!(!is_affordable(&f, 4_000.0));
        f.min_sip = 2_000.0;
        assert!(is_affordable(&f, 4_000.0));
    }

    #[test]
    fn risk_bands_overlap_at_boundaries() {
        let universe = vec![
            fund("r3", 3, Category::Equity, 100.0),
            fund("r5", 5, Category::Equity, 100.0),
            fund("r1", 1, Category::Debt, 100.0),
            fund("r6", 6, Category::Equity, 100.0),
        ];

        let conservative = filter_candidates(&universe, &request(10_000.0, "conservative", None))
            .expect("two conservative funds");
        let moderate = filter_candidates(&universe, &request(10_000.0, "moderate", None))
            .expect("two moderate funds");
        let aggressive = filter_candidates(&universe, &request(10_000.0, "aggressive", None))
            .expect("two aggressive funds");

        assert_eq!(names(&conservative), vec!["r3", "r1"]);
        assert_eq!(names(&moderate), vec!["r3", "r5"]);
        assert_eq!(names(&aggressive), vec!["r5", "r6"]);
    }

    #[test]
    fn unknown_category_preference_is_a_no_op() {
        let universe = vec![
            fund("a", 3, Category::Equity, 100.0),
            fund("b", 4, Category::Debt, 100.0),
        ];
        let unfiltered = filter_candidates(&universe, &request(10_000.0, "moderate", None))
            .expect("candidates");
        let unknown = filter_candidates(&universe, &request(10_000.0, "moderate", Some("Gold")))
            .expect("candidates");
        assert_eq!(names(&unfiltered), names(&unknown));

        let err = filter_candidates(&universe, &request(10_000.0, "moderate", Some("debt")))
            .expect_err("only one debt fund");
        assert!(matches!(err, Error::InsufficientCandidates { .. }));
    }

    #[test]
    fn funds_missing_horizon_return_are_dropped() {
        let mut incomplete = fund("incomplete", 4, Category::Equity, 100.0);
        incomplete.return_3yr = None;
        let universe = vec![
            fund("a", 3, Category::Equity, 100.0),
            incomplete,
            fund("b", 4, Category::Equity, 100.0),
        ];
        let candidates = filter_candidates(&universe, &request(10_000.0, "moderate", None))
            .expect("candidates");
        assert_eq!(names(&candidates), vec!["a", "b"]);
    }

    #[test]
    fn small_amount_filters_everything_out() {
        let universe = vec![
            fund("a", 3, Category::Equity, 3_000.0),
            fund("b", 4, Category::Equity, 2_600.0),
            fund("c", 5, Category::Hybrid, 5_000.0),
        ];
        let err = filter_candidates(&universe, &request(5_000.0, "moderate", None))
            .expect_err("nothing affordable");
        match err {
            Error::InsufficientCandidates { message } => {
                assert!(message.contains("0 eligible"), "{message}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn query_funds_applies_optional_filters_and_limit() {
        let mut rated = fund("rated", 4, Category::Equity, 100.0);
        rated.rating = 5;
        rated.amc_name = "Y".to_string();
        let universe = vec![
            fund("a", 4, Category::Equity, 100.0),
            rated,
            fund("b", 4, Category::Debt, 100.0),
            fund("c", 2, Category::Equity, 100.0),
        ];

        let listing = query_funds(
            &universe,
            &FundQuery {
                category: Some("Equity".to_string()),
                risk_level: Some(4),
                limit: 1,
                ..FundQuery::default()
            },
        );
        assert_eq!(listing.total_found, 1);
        assert_eq!(names(&listing.funds), vec!["a"]);

        let listing = query_funds(
            &universe,
            &FundQuery {
                amc_name: Some("Y".to_string()),
                min_rating: Some(4),
                ..FundQuery::default()
            },
        );
        assert_eq!(names(&listing.funds), vec!["rated"]);
    }

    fn category_from_index(index: usize) -> Category {
        Category::ALL[index % Category::ALL.len()]
    }

    fn universe_strategy() -> impl Strategy<Value = Vec<Fund>> {
        prop::collection::vec(
            (
                1u8..=6,
                0usize..4,
                100.0f64..10_000.0,
                100.0f64..50_000.0,
                prop::bool::weighted(0.85),
            ),
            0..40,
        )
        .prop_map(|rows| {
            rows.into_iter()
                .enumerate()
                .map(|(i, (risk, category, sip, lumpsum, has_return))| {
                    let mut f = fund(&format!("f{i}"), risk, category_from_index(category), sip);
                    f.min_lumpsum = lumpsum;
                    if !has_return {
                        f.return_3yr = None;
                    }
                    f
                })
                .collect()
        })
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_tightening_any_filter_never_adds_candidates(
            universe in universe_strategy(),
            amount in 200.0f64..40_000.0,
            lo in 1u8..=6,
            width in 0u8..=5,
            shrink_lo in 0u8..=2,
            shrink_hi in 0u8..=2,
            category in 0usize..4,
            tolerance in 0usize..3,
        ) {
            let hi = (lo + width).min(6);
            let base = CandidateCriteria {
                amount,
                horizon: Horizon::ThreeYear,
                risk_band: lo..=hi,
                category: None,
            };
            let base_count = narrow_candidates(&universe, &base).len();

            let narrow_lo = (lo + shrink_lo).min(hi);
            let narrow_hi = hi.saturating_sub(shrink_hi).max(narrow_lo);
            let narrower_band = CandidateCriteria {
                risk_band: narrow_lo..=narrow_hi,
                ..base.clone()
            };
            prop_assert!(narrow_candidates(&universe, &narrower_band).len() <= base_count);

            let with_category = CandidateCriteria {
                category: Some(category_from_index(category)),
                ..base.clone()
            };
            prop_assert!(narrow_candidates(&universe, &with_category).len() <= base_count);

            let smaller_amount = CandidateCriteria { amount: amount / 2.0, ..base.clone() };
            prop_assert!(narrow_candidates(&universe, &smaller_amount).len() <= base_count);

            let tolerance = [
                RiskTolerance::Conservative,
                RiskTolerance::Moderate,
                RiskTolerance::Aggressive,
            ][tolerance];
            let full_band = CandidateCriteria { risk_band: 1..=6, ..base.clone() };
            let in_tolerance = CandidateCriteria { risk_band: tolerance.risk_range(), ..base };
            prop_assert!(
                narrow_candidates(&universe, &in_tolerance).len()
                    <= narrow_candidates(&universe, &full_band).len()
            );
        }
    }
}

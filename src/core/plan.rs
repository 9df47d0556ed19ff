use serde::Serialize;

use super::error::{Error, Result};
use super::scoring::ScoringOutcome;
use super::selector::{DiversificationBreakdown, DiversifiedPair};
use super::types::{RecommendRequest, ScoredFund, SkippedFund};

pub const ALLOCATION_PERCENTAGE: f64 = 50.0;
const DIVERSIFICATION_STRATEGY: &str = "Top 2 performers with complementary characteristics";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FundAllocation {
    pub rank: u32,
    pub scheme_name: String,
    pub amc_name: String,
    pub predicted_return: f64,
    pub historical_return: Option<f64>,
    pub risk_level: u8,
    pub expense_ratio: f64,
    pub rating: u8,
    pub allocated_amount: f64,
    pub allocation_percentage: f64,
    pub composite_score: f64,
    pub min_sip: f64,
    pub min_lumpsum: f64,
    pub fund_size: f64,
    pub fund_age: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentSummary {
    pub total_amount: f64,
    pub investment_horizon: String,
    pub horizon_years: u32,
    pub risk_tolerance: String,
    pub category_preference: String,
    pub diversification_strategy: String,
    pub eligible_funds: usize,
    pub scored_funds: usize,
    pub skipped_funds: Vec<SkippedFund>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiversificationAnalysis {
    pub risk_diversification: String,
    pub amc_diversification: String,
    pub size_diversification: String,
    pub category_diversification: String,
    pub return_correlation: String,
    pub breakdown: DiversificationBreakdown,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentPlan {
    pub message: String,
    pub investment_summary: InvestmentSummary,
    pub recommendations: Vec<FundAllocation>,
    pub diversification_analysis: DiversificationAnalysis,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanFailure {
    pub kind: String,
    pub message: String,
}

/// Outcome of a recommendation request. Check the status before reading funds.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PlanResult {
    Success(InvestmentPlan),
    Error(PlanFailure),
}

impl PlanResult {
    pub fn from_error(err: &Error) -> Self {
        PlanResult::Error(PlanFailure {
            kind: err.kind().to_string(),
            message: err.to_string(),
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PlanResult::Success(_))
    }

    pub fn recommendations(&self) -> &[FundAllocation] {
        match self {
            PlanResult::Success(plan) => &plan.recommendations,
            PlanResult::Error(_) => &[],
        }
    }

    pub fn message(&self) -> &str {
        match self {
            PlanResult::Success(plan) => &plan.message,
            PlanResult::Error(failure) => &failure.message,
        }
    }
}

impl From<Result<InvestmentPlan>> for PlanResult {
    fn from(result: Result<InvestmentPlan>) -> Self {
        match result {
            Ok(plan) => PlanResult::Success(plan),
            Err(err) => PlanResult::from_error(&err),
        }
    }
}

fn allocation(
    rank: u32,
    scored: &ScoredFund<'_>,
    request: &RecommendRequest,
    allocated_amount: f64,
) -> FundAllocation {
    let fund = scored.fund;
    FundAllocation {
        rank,
        scheme_name: fund.scheme_name.clone(),
        amc_name: fund.amc_name.clone(),
        predicted_return: scored.predicted_return,
        historical_return: fund.historical_return(request.horizon),
        risk_level: fund.risk_level,
        expense_ratio: fund.expense_ratio,
        rating: fund.rating,
        allocated_amount,
        allocation_percentage: ALLOCATION_PERCENTAGE,
        composite_score: scored.comprehensive_score,
        min_sip: fund.min_sip,
        min_lumpsum: fund.min_lumpsum,
        fund_size: fund.fund_size,
        fund_age: fund.fund_age,
    }
}

fn category_label(scored: &ScoredFund<'_>) -> &'static str {
    scored
        .fund
        .category
        .map(|category| category.label())
        .unwrap_or("Uncategorised")
}

pub fn build_plan(
    request: &RecommendRequest,
    eligible_funds: usize,
    scoring: &ScoringOutcome<'_>,
    pair: &DiversifiedPair<'_>,
) -> Result<InvestmentPlan> {
    let Some(complement) = pair.complement.as_ref() else {
        return Err(Error::InsufficientCandidates {
            message: "Only one fund survived scoring; a diversified pair needs two.".to_string(),
        });
    };
    let (first, second) = (&pair.best, &complement.pick);
    if first.fund.scheme_name == second.fund.scheme_name {
        return Err(Error::InsufficientCandidates {
            message: format!(
                "Shortlist repeats scheme {}; a diversified pair needs two distinct funds.",
                first.fund.scheme_name
            ),
        });
    }

    let recommendations = vec![
        allocation(1, first, request, pair.allocation_per_fund),
        allocation(2, second, request, pair.allocation_per_fund),
    ];

    let diversification_analysis = DiversificationAnalysis {
        risk_diversification: format!(
            "Risk levels: {} vs {}",
            first.fund.risk_level, second.fund.risk_level
        ),
        amc_diversification: format!(
            "AMCs: {} vs {}",
            first.fund.amc_name, second.fund.amc_name
        ),
        size_diversification: format!(
            "Fund sizes: {:.2} vs {:.2}",
            first.fund.fund_size, second.fund.fund_size
        ),
        category_diversification: format!(
            "Categories: {} vs {}",
            category_label(first),
            category_label(second)
        ),
        return_correlation: "Optimized for low correlation between funds".to_string(),
        breakdown: complement.breakdown,
    };

    Ok(InvestmentPlan {
        message: format!(
            "Selected top 2 diversified funds from {eligible_funds} eligible options."
        ),
        investment_summary: InvestmentSummary {
            total_amount: request.amount,
            investment_horizon: request.horizon.to_string(),
            horizon_years: request.horizon.years(),
            risk_tolerance: request.risk_tolerance.label().to_string(),
            category_preference: request
                .category_preference
                .clone()
                .unwrap_or_else(|| "Any".to_string()),
            diversification_strategy: DIVERSIFICATION_STRATEGY.to_string(),
            eligible_funds,
            scored_funds: scoring.scored_count,
            skipped_funds: scoring.skipped.clone(),
        },
        recommendations,
        diversification_analysis,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scoring::{rank_shortlist, score_fund};
    use crate::core::selector::select_diversified_pair;
    use crate::core::types::{Category, Fund};
    use std::collections::{BTreeMap, BTreeSet};

    fn fund(name: &str, amc: &str, risk_level: u8, size: f64) -> Fund {
        Fund {
            scheme_name: name.to_string(),
            amc_name: amc.to_string(),
            category: Some(Category::Equity),
            sub_categories: BTreeSet::from(["Large Cap".to_string()]),
            min_sip: 500.0,
            min_lumpsum: 1_000.0,
            risk_level,
            return_1yr: Some(9.0),
            return_3yr: Some(14.5),
            return_5yr: Some(13.0),
            expense_ratio: 0.7,
            fund_size: size,
            fund_age: 10.0,
            rating: 5,
            risk_adjusted_score: 0.8,
            stability_score: 0.7,
            cost_efficiency: 0.6,
            extra_features: BTreeMap::new(),
        }
    }

    fn request() -> RecommendRequest {
        RecommendRequest::new(20_000.0, 3, "moderate", None).expect("valid request")
    }

    #[test]
    fn success_plan_splits_amount_evenly_between_distinct_funds() {
        let funds = [fund("a", "X", 3, 1_000.0), fund("b", "Y", 5, 4_000.0)];
        let scored = rank_shortlist(
            vec![score_fund(&funds[0], 15.0), score_fund(&funds[1], 11.0)],
            10,
        );
        let outcome = ScoringOutcome {
            shortlist: scored.clone(),
            scored_count: 2,
            skipped: vec![],
        };
        let pair = select_diversified_pair(&outcome.shortlist, 20_000.0).expect("pair");
        let plan = build_plan(&request(), 2, &outcome, &pair).expect("plan");

        assert_eq!(plan.recommendations.len(), 2);
        assert_ne!(
            plan.recommendations[0].scheme_name,
            plan.recommendations[1].scheme_name
        );
        let total_pct: f64 = plan
            .recommendations
            .iter()
            .map(|r| r.allocation_percentage)
            .sum();
        assert!((total_pct - 100.0).abs() < 1e-9);
        assert!(plan
            .recommendations
            .iter()
            .all(|r| (r.allocated_amount - 10_000.0).abs() < 1e-9));
        assert_eq!(plan.recommendations[0].historical_return, Some(14.5));
        assert_eq!(plan.investment_summary.category_preference, "Any");
        assert_eq!(plan.diversification_analysis.risk_diversification, "Risk levels: 3 vs 5");
        assert_eq!(plan.diversification_analysis.amc_diversification, "AMCs: X vs Y");
    }

    #[test]
    fn single_pick_becomes_structured_error() {
        let only = fund("a", "X", 3, 1_000.0);
        let outcome = ScoringOutcome {
            shortlist: vec![score_fund(&only, 10.0)],
            scored_count: 1,
            skipped: vec![],
        };
        let pair = select_diversified_pair(&outcome.shortlist, 20_000.0).expect("single");
        let result = PlanResult::from(build_plan(&request(), 1, &outcome, &pair));

        assert!(!result.is_success());
        assert!(result.recommendations().is_empty());
    }

    #[test]
    fn error_result_serializes_status_and_message() {
        let result = PlanResult::from_error(&Error::InsufficientCandidates {
            message: "Insufficient funds match your criteria.".to_string(),
        });
        let json = serde_json::to_value(&result).expect("serialize");

        assert_eq!(json["status"], "error");
        assert_eq!(json["kind"], "insufficient_candidates");
        assert_eq!(json["message"], "Insufficient funds match your criteria.");
    }

    #[test]
    fn success_result_serializes_expected_fields() {
        let funds = [fund("a", "X", 3, 1_000.0), fund("b", "Y", 4, 3_000.0)];
        let outcome = ScoringOutcome {
            shortlist: vec![score_fund(&funds[0], 12.0), score_fund(&funds[1], 10.0)],
            scored_count: 2,
            skipped: vec![SkippedFund {
                scheme_name: "c".to_string(),
                reason: "Prediction error: boom".to_string(),
            }],
        };
        let pair = select_diversified_pair(&outcome.shortlist, 20_000.0).expect("pair");
        let result = PlanResult::from(build_plan(&request(), 3, &outcome, &pair));
        let json = serde_json::to_string(&result).expect("serialize");

        assert!(json.contains("\"status\":\"success\""));
        assert!(json.contains("\"recommendations\""));
        assert!(json.contains("\"diversificationAnalysis\""));
        assert!(json.contains("\"allocationPercentage\":50.0"));
        assert!(json.contains("\"compositeScore\""));
        assert!(json.contains("\"skippedFunds\""));
        assert!(json.contains("\"sizeDiffNorm\""));
    }
}

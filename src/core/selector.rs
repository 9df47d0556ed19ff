use serde::Serialize;

use super::types::{Fund, ScoredFund};

/// Keeps the size normalisation finite when every shortlisted fund has the same size.
pub const SIZE_STD_EPSILON: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiversificationBreakdown {
    pub risk_diff: f64,
    pub category_diff: f64,
    pub amc_diff: f64,
    pub size_diff_norm: f64,
    pub score: f64,
}

/// 1.0 across main categories, 0.5 for disjoint sub-categories, else 0.0.
///
/// Two funds without a main category count as the same category and fall
/// through to the sub-category comparison.
pub fn category_difference(a: &Fund, b: &Fund) -> f64 {
    if a.category != b.category {
        return 1.0;
    }
    if a.sub_categories.is_disjoint(&b.sub_categories) {
        return 0.5;
    }
    0.0
}

pub fn diversification_breakdown(
    best: &Fund,
    other: &Fund,
    size_std: f64,
) -> DiversificationBreakdown {
    let risk_diff = f64::from(best.risk_level.abs_diff(other.risk_level));
    let category_diff = category_difference(best, other);
    let amc_diff = if best.amc_name != other.amc_name { 1.0 } else { 0.0 };
    let size_diff_norm =
        ((best.fund_size - other.fund_size).abs() / (size_std + SIZE_STD_EPSILON)).min(1.0);

    DiversificationBreakdown {
        risk_diff,
        category_diff,
        amc_diff,
        size_diff_norm,
        score: 0.3 * risk_diff + 0.3 * category_diff + 0.2 * amc_diff + 0.2 * size_diff_norm,
    }
}

/// Sample standard deviation (n - 1 denominator); zero below two values.
pub fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0);
    var.sqrt()
}

#[derive(Debug, Clone, Copy)]
pub struct Complement<'a> {
    pub pick: ScoredFund<'a>,
    pub breakdown: DiversificationBreakdown,
}

#[derive(Debug, Clone, Copy)]
pub struct DiversifiedPair<'a> {
    pub best: ScoredFund<'a>,
    /// `None` only when the shortlist held a single fund.
    pub complement: Option<Complement<'a>>,
    pub allocation_per_fund: f64,
}

/// Greedy 1-vs-rest pick: the top-scored fund is fixed and the most dissimilar
/// remaining fund is paired with it. Ties go to the earlier shortlist entry.
pub fn select_diversified_pair<'a>(
    shortlist: &[ScoredFund<'a>],
    amount: f64,
) -> Option<DiversifiedPair<'a>> {
    let (&best, rest) = shortlist.split_first()?;
    let allocation_per_fund = amount / 2.0;

    let sizes: Vec<f64> = shortlist.iter().map(|s| s.fund.fund_size).collect();
    let size_std = sample_std(&sizes);

    let mut complement: Option<Complement<'a>> = None;
    for &candidate in rest {
        let breakdown = diversification_breakdown(best.fund, candidate.fund, size_std);
        let better = complement
            .as_ref()
            .is_none_or(|current| breakdown.score > current.breakdown.score);
        if better {
            complement = Some(Complement {
                pick: candidate,
                breakdown,
            });
        }
    }

    if complement.is_none() {
        tracing::warn!(
            scheme = %best.fund.scheme_name,
            "Shortlist holds a single fund; returning it without a complement."
        );
    }

    Some(DiversifiedPair {
        best,
        complement,
        allocation_per_fund,
    })
}

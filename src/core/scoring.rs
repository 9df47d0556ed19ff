use super::error::{Error, Result};
use super::features::DatasetMedians;
use super::predictor::HorizonModel;
use super::types::{Fund, ScoredFund, SkippedFund};

pub const DEFAULT_SHORTLIST_SIZE: usize = 10;

/// Fixed blend used to rank candidates. The weights sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub predicted_return: f64,
    pub risk_adjusted_score: f64,
    pub stability_score: f64,
    pub cost_efficiency: f64,
    pub rating: f64,
}

impl ScoreWeights {
    pub fn total(self) -> f64 {
        self.predicted_return
            + self.risk_adjusted_score
            + self.stability_score
            + self.cost_efficiency
            + self.rating
    }
}

// TODO: expose these through EngineConfig once callers need per-request scoring policies.
pub const SCORE_WEIGHTS: ScoreWeights = ScoreWeights {
    predicted_return: 0.40,
    risk_adjusted_score: 0.20,
    stability_score: 0.15,
    cost_efficiency: 0.15,
    rating: 0.10,
};

pub fn composite_score(
    predicted_return: f64,
    risk_adjusted_score: f64,
    stability_score: f64,
    cost_efficiency: f64,
    rating: f64,
) -> f64 {
    let w = SCORE_WEIGHTS;
    w.predicted_return * predicted_return
        + w.risk_adjusted_score * risk_adjusted_score
        + w.stability_score * stability_score
        + w.cost_efficiency * cost_efficiency
        + w.rating * rating
}

pub fn score_fund(fund: &Fund, predicted_return: f64) -> ScoredFund<'_> {
    ScoredFund {
        fund,
        predicted_return,
        comprehensive_score: composite_score(
            predicted_return,
            fund.risk_adjusted_score,
            fund.stability_score,
            fund.cost_efficiency,
            f64::from(fund.rating),
        ),
    }
}

#[derive(Debug, Clone)]
pub struct PredictionBatch<'a> {
    pub predicted: Vec<(&'a Fund, f64)>,
    pub skipped: Vec<SkippedFund>,
}

/// Predicts every candidate, keeping failures on a side list instead of failing the batch.
pub fn predict_candidates<'a>(
    candidates: &[&'a Fund],
    model: &HorizonModel,
    medians: &DatasetMedians,
) -> PredictionBatch<'a> {
    let mut predicted = Vec::with_capacity(candidates.len());
    let mut skipped = Vec::new();

    for &fund in candidates {
        match model.predict_fund(fund, medians) {
            Ok(value) => predicted.push((fund, value)),
            Err(err) => {
                tracing::warn!(
                    scheme = %fund.scheme_name,
                    horizon = model.horizon.years(),
                    error = %err,
                    "Skipping fund whose return prediction failed."
                );
                skipped.push(SkippedFund {
                    scheme_name: fund.scheme_name.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }

    PredictionBatch { predicted, skipped }
}

#[derive(Debug, Clone)]
pub struct ScoringOutcome<'a> {
    /// Highest composite score first, truncated to the shortlist size.
    pub shortlist: Vec<ScoredFund<'a>>,
    pub scored_count: usize,
    pub skipped: Vec<SkippedFund>,
}

pub fn score_candidates<'a>(
    candidates: &[&'a Fund],
    model: &HorizonModel,
    medians: &DatasetMedians,
    shortlist_size: usize,
) -> Result<ScoringOutcome<'a>> {
    let batch = predict_candidates(candidates, model, medians);
    if batch.predicted.len() < 2 {
        return Err(Error::PredictionFailure {
            message: format!(
                "Unable to generate predictions for enough funds ({} of {} succeeded). \
                 Please try different criteria.",
                batch.predicted.len(),
                candidates.len()
            ),
        });
    }

    let scored: Vec<ScoredFund<'a>> = batch
        .predicted
        .into_iter()
        .map(|(fund, predicted_return)| score_fund(fund, predicted_return))
        .collect();
    let scored_count = scored.len();

    Ok(ScoringOutcome {
        shortlist: rank_shortlist(scored, shortlist_size),
        scored_count,
        skipped: batch.skipped,
    })
}

/// Stable descending sort: equal scores keep their candidate order.
pub fn rank_shortlist<'a>(
    mut scored: Vec<ScoredFund<'a>>,
    shortlist_size: usize,
) -> Vec<ScoredFund<'a>> {
    scored.sort_by(|a, b| b.comprehensive_score.total_cmp(&a.comprehensive_score));
    scored.truncate(shortlist_size);
    scored
}

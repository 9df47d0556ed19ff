use std::collections::BTreeMap;
use std::path::Path;

use super::catalog::{
    CategoryCount, PerformerQuery, TopPerformers, amc_names, category_counts,
    top_historical_performers,
};
use super::compare::{FundComparison, compare_funds};
use super::error::{Error, Result};
use super::features::DatasetMedians;
use super::filter::{FundListing, FundQuery, filter_candidates, query_funds};
use super::forecast::{
    FundForecast, PredictedPerformer, find_fund, forecast_fund, top_predicted_performers,
};
use super::loader::{load_models, load_universe};
use super::plan::{InvestmentPlan, PlanResult, build_plan};
use super::predictor::HorizonModel;
use super::scoring::{DEFAULT_SHORTLIST_SIZE, score_candidates};
use super::selector::select_diversified_pair;
use super::simulation::{WhatIfRequest, WhatIfSimulation, simulate_waiting};
use super::types::{Fund, Horizon, RecommendRequest, RiskTolerance};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Number of top-scored funds the selector may pair from.
    pub shortlist_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            shortlist_size: DEFAULT_SHORTLIST_SIZE,
        }
    }
}

impl EngineConfig {
    pub fn validate(self) -> Result<Self> {
        if self.shortlist_size < 2 {
            return Err(Error::Configuration {
                message: format!(
                    "shortlist size must be >= 2, got {}",
                    self.shortlist_size
                ),
            });
        }
        Ok(self)
    }
}

/// Universe, medians and per-horizon models, loaded once and shared read-only.
#[derive(Debug)]
pub struct RecommendationEngine {
    universe: Vec<Fund>,
    medians: DatasetMedians,
    models: BTreeMap<Horizon, HorizonModel>,
    config: EngineConfig,
}

impl RecommendationEngine {
    pub fn new(
        universe: Vec<Fund>,
        models: BTreeMap<Horizon, HorizonModel>,
        config: EngineConfig,
    ) -> Result<Self> {
        let config = config.validate()?;
        let medians = DatasetMedians::compute(
            &universe,
            models
                .values()
                .flat_map(|model| model.feature_columns.iter().map(String::as_str)),
        );
        tracing::info!(
            funds = universe.len(),
            models = models.len(),
            medians = medians.len(),
            shortlist_size = config.shortlist_size,
            "Recommendation engine ready."
        );

        Ok(Self {
            universe,
            medians,
            models,
            config,
        })
    }

    pub fn load(data: &Path, models_dir: &Path, config: EngineConfig) -> Result<Self> {
        let universe = load_universe(data)?;
        let models = load_models(models_dir)?;
        Self::new(universe, models, config)
    }

    pub fn universe(&self) -> &[Fund] {
        &self.universe
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    pub fn horizons(&self) -> impl Iterator<Item = Horizon> + '_ {
        self.models.keys().copied()
    }

    pub fn model(&self, horizon: Horizon) -> Result<&HorizonModel> {
        self.models.get(&horizon).ok_or(Error::ModelUnavailable {
            horizon: horizon.years(),
        })
    }

    /// Runs the full pipeline. Every failure comes back as an error plan.
    pub fn recommend(&self, request: &RecommendRequest) -> PlanResult {
        let result = self.try_recommend(request);
        match &result {
            Ok(plan) => tracing::info!(
                amount = request.amount,
                horizon = request.horizon.years(),
                risk = %request.risk_tolerance,
                first = %plan.recommendations[0].scheme_name,
                second = %plan.recommendations[1].scheme_name,
                "Recommendation built."
            ),
            Err(err) => tracing::info!(
                amount = request.amount,
                horizon = request.horizon.years(),
                risk = %request.risk_tolerance,
                kind = err.kind(),
                error = %err,
                "Recommendation declined."
            ),
        }
        PlanResult::from(result)
    }

    fn try_recommend(&self, request: &RecommendRequest) -> Result<InvestmentPlan> {
        let model = self.model(request.horizon)?;
        let candidates = filter_candidates(&self.universe, request)?;
        let scoring =
            score_candidates(&candidates, model, &self.medians, self.config.shortlist_size)?;
        let pair = select_diversified_pair(&scoring.shortlist, request.amount).ok_or_else(|| {
            Error::InsufficientCandidates {
                message: "No scored funds remain to select from.".to_string(),
            }
        })?;
        build_plan(request, candidates.len(), &scoring, &pair)
    }

    pub fn forecast(&self, scheme_name: &str, horizon: Horizon) -> Result<FundForecast> {
        let fund = find_fund(&self.universe, scheme_name)?;
        Ok(forecast_fund(fund, horizon, &self.models, &self.medians))
    }

    pub fn top_predicted(
        &self,
        horizon: Horizon,
        risk_tolerance: RiskTolerance,
        limit: usize,
    ) -> Result<Vec<PredictedPerformer>> {
        let model = self.model(horizon)?;
        Ok(top_predicted_performers(
            &self.universe,
            model,
            &self.medians,
            risk_tolerance,
            limit,
        ))
    }

    pub fn list_funds(&self, query: &FundQuery) -> FundListing<'_> {
        query_funds(&self.universe, query)
    }

    pub fn compare(&self, fund_names: &[String], metrics: &[String]) -> FundComparison {
        compare_funds(&self.universe, &self.models, &self.medians, fund_names, metrics)
    }

    pub fn amcs(&self) -> Vec<&str> {
        amc_names(&self.universe)
    }

    pub fn categories(&self) -> Vec<CategoryCount> {
        category_counts(&self.universe)
    }

    pub fn top_performers(&self, query: &PerformerQuery) -> Result<TopPerformers> {
        top_historical_performers(&self.universe, query)
    }

    /// Invest-now versus wait scenarios. A missing horizon model falls back to
    /// historical returns rather than failing.
    pub fn what_if(&self, request: &WhatIfRequest) -> Result<WhatIfSimulation> {
        simulate_waiting(
            &self.universe,
            self.models.get(&request.horizon),
            &self.medians,
            request,
        )
    }
}

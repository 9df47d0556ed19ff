mod catalog;
mod compare;
mod engine;
mod error;
mod features;
mod filter;
mod forecast;
mod loader;
mod plan;
mod predictor;
mod scoring;
mod selector;
mod simulation;
mod types;

pub use catalog::{
    CategoryCount, HistoricalPerformer, PerformerQuery, TopPerformers, amc_names, category_counts,
};
pub use compare::{ComparedFund, ComparisonEntry, DEFAULT_COMPARISON_METRICS, FundComparison};
pub use engine::{EngineConfig, RecommendationEngine};
pub use error::{Error, Result};
pub use features::{DatasetMedians, assemble_features, median};
pub use filter::{FundListing, FundQuery, MIN_CANDIDATES};
pub use forecast::{
    CurrentMetrics, FundForecast, HorizonForecast, MonthlyProjection, PredictedPerformer,
    monthly_projections,
};
pub use loader::{load_models, load_universe, model_file_name, parse_model, parse_universe};
pub use plan::{
    DiversificationAnalysis, FundAllocation, InvestmentPlan, InvestmentSummary, PlanFailure,
    PlanResult,
};
pub use predictor::{
    Aggregation, HorizonModel, LinearModel, ModelArtifact, ModelSpec, RegressionTree,
    ReturnPredictor, TreeEnsemble, TreeNode,
};
pub use scoring::{DEFAULT_SHORTLIST_SIZE, SCORE_WEIGHTS, ScoreWeights, composite_score};
pub use selector::DiversificationBreakdown;
pub use simulation::{
    FundScenario, MarketRegime, ScenarioAggregate, SimulationSummary, Strength, Timing,
    WAIT_PERIODS_MONTHS, WaitScenario, WhatIfRequest, WhatIfSimulation,
};
pub use types::{Category, Fund, Horizon, RecommendRequest, RiskTolerance, SkippedFund};

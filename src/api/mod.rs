use axum::{
    Router,
    extract::{Json, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::core::{
    CategoryCount, DEFAULT_COMPARISON_METRICS, DEFAULT_SHORTLIST_SIZE, EngineConfig, Error, Fund,
    FundForecast, FundQuery, Horizon, PerformerQuery, PredictedPerformer, RecommendRequest,
    RecommendationEngine, RiskTolerance, WhatIfRequest,
};

type AppState = Arc<RecommendationEngine>;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliRiskTolerance {
    Conservative,
    Moderate,
    Aggressive,
}

impl From<CliRiskTolerance> for RiskTolerance {
    fn from(value: CliRiskTolerance) -> Self {
        match value {
            CliRiskTolerance::Conservative => RiskTolerance::Conservative,
            CliRiskTolerance::Moderate => RiskTolerance::Moderate,
            CliRiskTolerance::Aggressive => RiskTolerance::Aggressive,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "fundmix",
    about = "Two-fund mutual fund recommender (ML return forecasts + diversification)"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API.
    Serve(ServeArgs),
    /// Print one recommendation as JSON.
    Recommend(RecommendArgs),
}

#[derive(Debug, Clone, Args)]
struct EngineArgs {
    #[arg(long, help = "Fund universe JSON (array of dataset rows)")]
    data: PathBuf,
    #[arg(long, help = "Directory holding model_return_{1,3,5}yr.json")]
    models: PathBuf,
    #[arg(long, default_value_t = DEFAULT_SHORTLIST_SIZE)]
    shortlist_size: usize,
}

#[derive(Debug, Clone, Args)]
struct ServeArgs {
    #[command(flatten)]
    engine: EngineArgs,
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[derive(Debug, Clone, Args)]
struct RecommendArgs {
    #[command(flatten)]
    engine: EngineArgs,
    #[arg(long)]
    amount: f64,
    #[arg(long, default_value_t = 3, help = "Investment horizon in years (1, 3 or 5)")]
    horizon: u32,
    #[arg(long, value_enum, default_value_t = CliRiskTolerance::Moderate)]
    risk: CliRiskTolerance,
    #[arg(long)]
    category: Option<String>,
}

fn build_engine_config(args: &EngineArgs) -> Result<EngineConfig, String> {
    if args.shortlist_size < 2 {
        return Err("--shortlist-size must be >= 2".to_string());
    }
    if !args.data.is_file() {
        return Err(format!("--data {} is not a readable file", args.data.display()));
    }
    if !args.models.is_dir() {
        return Err(format!("--models {} is not a directory", args.models.display()));
    }

    Ok(EngineConfig {
        shortlist_size: args.shortlist_size,
    })
}

fn build_request(args: &RecommendArgs) -> Result<RecommendRequest, String> {
    if !args.amount.is_finite() || args.amount <= 0.0 {
        return Err("--amount must be > 0".to_string());
    }
    if !matches!(args.horizon, 1 | 3 | 5) {
        return Err("--horizon must be 1, 3 or 5".to_string());
    }

    let risk = RiskTolerance::from(args.risk);
    RecommendRequest::new(
        args.amount,
        args.horizon,
        risk.label(),
        args.category.as_deref(),
    )
    .map_err(|e| e.to_string())
}

fn load_engine(args: &EngineArgs) -> Result<RecommendationEngine, String> {
    let config = build_engine_config(args)?;
    RecommendationEngine::load(&args.data, &args.models, config)
        .map_err(|e| format!("Failed to load recommendation engine: {e}"))
}

pub async fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Command::Serve(args) => {
            let engine = load_engine(&args.engine)?;
            run_http_server(engine, args.port)
                .await
                .map_err(|e| format!("Server error: {e}"))
        }
        Command::Recommend(args) => {
            let request = build_request(&args)?;
            let engine = load_engine(&args.engine)?;
            let plan = engine.recommend(&request);
            let json = serde_json::to_string_pretty(&plan)
                .map_err(|e| format!("Failed to serialize plan: {e}"))?;
            println!("{json}");
            if plan.is_success() {
                Ok(())
            } else {
                Err(plan.message().to_string())
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecommendPayload {
    #[serde(alias = "investmentAmount")]
    amount: f64,
    #[serde(alias = "investmentHorizon")]
    horizon: u32,
    risk_tolerance: String,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForecastPayload {
    fund_name: String,
    #[serde(default = "default_forecast_horizon")]
    horizon: u32,
}

fn default_forecast_horizon() -> u32 {
    3
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TopPredictedParams {
    #[serde(default = "default_forecast_horizon")]
    horizon: u32,
    #[serde(default = "default_risk_tolerance")]
    risk_tolerance: String,
    #[serde(default = "default_top_limit")]
    limit: usize,
}

fn default_risk_tolerance() -> String {
    RiskTolerance::Moderate.label().to_string()
}

fn default_top_limit() -> usize {
    10
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FundFilterPayload {
    amc_name: Option<String>,
    category: Option<String>,
    risk_level: Option<u8>,
    min_rating: Option<u8>,
    limit: Option<usize>,
}

impl From<FundFilterPayload> for FundQuery {
    fn from(payload: FundFilterPayload) -> Self {
        let defaults = FundQuery::default();
        FundQuery {
            amc_name: payload.amc_name,
            category: payload.category,
            risk_level: payload.risk_level,
            min_rating: payload.min_rating,
            limit: payload.limit.unwrap_or(defaults.limit),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComparePayload {
    fund_names: Vec<String>,
    #[serde(default = "default_comparison_metrics")]
    metrics: Vec<String>,
}

fn default_comparison_metrics() -> Vec<String> {
    DEFAULT_COMPARISON_METRICS
        .iter()
        .map(|metric| metric.to_string())
        .collect()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TopPerformersParams {
    metric: Option<String>,
    category: Option<String>,
    limit: Option<usize>,
}

impl From<TopPerformersParams> for PerformerQuery {
    fn from(params: TopPerformersParams) -> Self {
        let defaults = PerformerQuery::default();
        PerformerQuery {
            metric: params.metric.unwrap_or(defaults.metric),
            category: params.category,
            limit: params.limit.unwrap_or(defaults.limit),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WhatIfPayload {
    fund_names: Vec<String>,
    investment_amount: f64,
    #[serde(default = "default_forecast_horizon")]
    duration_years: u32,
    #[serde(default)]
    market_regime: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    funds_loaded: usize,
    horizons_available: Vec<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TopPredictedResponse {
    horizon: u32,
    risk_tolerance: &'static str,
    funds: Vec<PredictedPerformer>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FundsResponse<'a> {
    funds: Vec<&'a Fund>,
    total_found: usize,
}

#[derive(Debug, Serialize)]
struct AmcsResponse<'a> {
    amcs: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
struct CategoriesResponse {
    categories: Vec<CategoryCount>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn recommend_request_from_payload(payload: RecommendPayload) -> Result<RecommendRequest, Error> {
    RecommendRequest::new(
        payload.amount,
        payload.horizon,
        &payload.risk_tolerance,
        payload.category.as_deref(),
    )
}

pub fn router(engine: RecommendationEngine) -> Router {
    let state: AppState = Arc::new(engine);
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/recommend", post(recommend_handler))
        .route("/api/forecast", post(forecast_handler))
        .route("/api/top-predicted", get(top_predicted_handler))
        .route("/api/funds", post(funds_handler))
        .route("/api/compare-funds", post(compare_handler))
        .route("/api/amcs", get(amcs_handler))
        .route("/api/categories", get(categories_handler))
        .route("/api/top-performers", get(top_performers_handler))
        .route("/api/what-if-simulation", post(what_if_handler))
        .fallback(not_found_handler)
        .with_state(state)
}

pub async fn run_http_server(engine: RecommendationEngine, port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router(engine);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "fundmix HTTP API listening.");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn health_handler(State(engine): State<AppState>) -> Response {
    json_response(
        StatusCode::OK,
        HealthResponse {
            status: "healthy",
            funds_loaded: engine.universe().len(),
            horizons_available: engine.horizons().map(Horizon::years).collect(),
        },
    )
}

async fn recommend_handler(
    State(engine): State<AppState>,
    Json(payload): Json<RecommendPayload>,
) -> Response {
    let request = match recommend_request_from_payload(payload) {
        Ok(request) => request,
        Err(err) => return error_status_response(&err),
    };

    let plan = engine.recommend(&request);
    let status = if plan.is_success() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    json_response(status, plan)
}

async fn forecast_handler(
    State(engine): State<AppState>,
    Json(payload): Json<ForecastPayload>,
) -> Response {
    let forecast: Result<FundForecast, Error> = Horizon::try_from(payload.horizon)
        .and_then(|horizon| engine.forecast(&payload.fund_name, horizon));
    match forecast {
        Ok(forecast) => json_response(StatusCode::OK, forecast),
        Err(err) => error_status_response(&err),
    }
}

async fn top_predicted_handler(
    State(engine): State<AppState>,
    Query(params): Query<TopPredictedParams>,
) -> Response {
    let result = Horizon::try_from(params.horizon).and_then(|horizon| {
        let risk = params.risk_tolerance.parse::<RiskTolerance>()?;
        let funds = engine.top_predicted(horizon, risk, params.limit)?;
        Ok(TopPredictedResponse {
            horizon: horizon.years(),
            risk_tolerance: risk.label(),
            funds,
        })
    });
    match result {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(err) => error_status_response(&err),
    }
}

async fn funds_handler(
    State(engine): State<AppState>,
    Json(payload): Json<FundFilterPayload>,
) -> Response {
    let query = FundQuery::from(payload);
    let listing = engine.list_funds(&query);
    json_response(
        StatusCode::OK,
        FundsResponse {
            funds: listing.funds,
            total_found: listing.total_found,
        },
    )
}

async fn compare_handler(
    State(engine): State<AppState>,
    Json(payload): Json<ComparePayload>,
) -> Response {
    json_response(
        StatusCode::OK,
        engine.compare(&payload.fund_names, &payload.metrics),
    )
}

async fn amcs_handler(State(engine): State<AppState>) -> Response {
    json_response(
        StatusCode::OK,
        AmcsResponse {
            amcs: engine.amcs(),
        },
    )
}

async fn categories_handler(State(engine): State<AppState>) -> Response {
    json_response(
        StatusCode::OK,
        CategoriesResponse {
            categories: engine.categories(),
        },
    )
}

async fn top_performers_handler(
    State(engine): State<AppState>,
    Query(params): Query<TopPerformersParams>,
) -> Response {
    match engine.top_performers(&PerformerQuery::from(params)) {
        Ok(top) => json_response(StatusCode::OK, top),
        Err(err) => error_status_response(&err),
    }
}

async fn what_if_handler(
    State(engine): State<AppState>,
    Json(payload): Json<WhatIfPayload>,
) -> Response {
    let result = WhatIfRequest::new(
        payload.fund_names,
        payload.investment_amount,
        payload.duration_years,
        payload.market_regime.as_deref(),
    )
    .and_then(|request| engine.what_if(&request));
    match result {
        Ok(simulation) => json_response(StatusCode::OK, simulation),
        Err(err) => error_status_response(&err),
    }
}

fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::NotFound { .. } => StatusCode::NOT_FOUND,
        Error::Configuration { .. }
        | Error::InsufficientCandidates { .. }
        | Error::PredictionFailure { .. } => StatusCode::BAD_REQUEST,
        Error::ModelUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_status_response(err: &Error) -> Response {
    error_response(status_for(err), &err.to_string())
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

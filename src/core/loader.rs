use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::ops::RangeInclusive;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use super::error::{Error, Result};
use super::predictor::{HorizonModel, ModelArtifact};
use super::types::{Category, Fund, Horizon};

/// One row of the cleaned fund dataset. Category membership arrives as
/// one-hot `category_*` / `sub_category_*` columns collected in `extra`,
/// next to any other numeric columns the models may read.
#[derive(Debug, Deserialize)]
struct FundRow {
    scheme_name: String,
    amc_name: String,
    min_sip: f64,
    min_lumpsum: f64,
    risk_level: f64,
    #[serde(default)]
    return_1yr: Option<f64>,
    #[serde(default)]
    return_3yr: Option<f64>,
    #[serde(default)]
    return_5yr: Option<f64>,
    expense_ratio: f64,
    fund_size: f64,
    fund_age: f64,
    rating: f64,
    risk_adjusted_score: f64,
    stability_score: f64,
    cost_efficiency: f64,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

fn invalid(scheme: &str, message: impl std::fmt::Display) -> Error {
    Error::InvalidUniverse {
        message: format!("{scheme}: {message}"),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1"),
        _ => false,
    }
}

fn bounded_integer(
    scheme: &str,
    column: &str,
    value: f64,
    range: RangeInclusive<u8>,
) -> Result<u8> {
    let (lo, hi) = (*range.start(), *range.end());
    if value.fract() != 0.0 || value < f64::from(lo) || value > f64::from(hi) {
        return Err(invalid(
            scheme,
            format!("{column} must be an integer in {lo}..={hi}, got {value}"),
        ));
    }
    Ok(value as u8)
}

impl FundRow {
    fn into_fund(self) -> Result<Fund> {
        let scheme = self.scheme_name.as_str();
        let finite = [
            ("min_sip", self.min_sip),
            ("min_lumpsum", self.min_lumpsum),
            ("expense_ratio", self.expense_ratio),
            ("fund_size", self.fund_size),
            ("fund_age", self.fund_age),
            ("risk_adjusted_score", self.risk_adjusted_score),
            ("stability_score", self.stability_score),
            ("cost_efficiency", self.cost_efficiency),
        ];
        if let Some((column, _)) = finite.iter().find(|(_, value)| !value.is_finite()) {
            return Err(invalid(scheme, format!("{column} must be finite")));
        }
        if self.min_sip < 0.0 || self.min_lumpsum < 0.0 {
            return Err(invalid(scheme, "minimum investments must be >= 0"));
        }
        if self.expense_ratio < 0.0 {
            return Err(invalid(scheme, "expense_ratio must be >= 0"));
        }
        if self.fund_size <= 0.0 {
            return Err(invalid(scheme, "fund_size must be > 0"));
        }
        if self.fund_age < 0.0 {
            return Err(invalid(scheme, "fund_age must be >= 0"));
        }
        let risk_level = bounded_integer(scheme, "risk_level", self.risk_level, 1..=6)?;
        let rating = bounded_integer(scheme, "rating", self.rating, 1..=5)?;

        let mut category = None;
        let mut sub_categories = BTreeSet::new();
        let mut extra_features = BTreeMap::new();
        for (column, value) in &self.extra {
            if let Some(name) = column.strip_prefix("sub_category_") {
                if is_truthy(value) {
                    sub_categories.insert(name.to_string());
                }
            } else if let Some(name) = column.strip_prefix("category_") {
                if !is_truthy(value) {
                    continue;
                }
                let parsed = Category::from_label(name)
                    .ok_or_else(|| invalid(scheme, format!("unknown category column {column}")))?;
                if let Some(existing) = category.replace(parsed) {
                    return Err(invalid(
                        scheme,
                        format!("more than one category flag set ({existing} and {parsed})"),
                    ));
                }
            } else if let Some(number) = value.as_f64().filter(|v| v.is_finite()) {
                // Text columns and nulls carry nothing a model can read.
                extra_features.insert(column.clone(), number);
            }
        }

        Ok(Fund {
            scheme_name: self.scheme_name,
            amc_name: self.amc_name,
            category,
            sub_categories,
            min_sip: self.min_sip,
            min_lumpsum: self.min_lumpsum,
            risk_level,
            return_1yr: self.return_1yr.filter(|v| v.is_finite()),
            return_3yr: self.return_3yr.filter(|v| v.is_finite()),
            return_5yr: self.return_5yr.filter(|v| v.is_finite()),
            expense_ratio: self.expense_ratio,
            fund_size: self.fund_size,
            fund_age: self.fund_age,
            rating,
            risk_adjusted_score: self.risk_adjusted_score,
            stability_score: self.stability_score,
            cost_efficiency: self.cost_efficiency,
            extra_features,
        })
    }
}

/// Parses a JSON array of fund rows, validating each and rejecting duplicate names.
pub fn parse_universe(json: &str) -> Result<Vec<Fund>> {
    let rows: Vec<FundRow> = serde_json::from_str(json)?;
    if rows.is_empty() {
        return Err(Error::InvalidUniverse {
            message: "universe holds no funds".to_string(),
        });
    }

    let mut seen = HashSet::with_capacity(rows.len());
    let mut funds = Vec::with_capacity(rows.len());
    for row in rows {
        let fund = row.into_fund()?;
        if !seen.insert(fund.scheme_name.clone()) {
            return Err(invalid(&fund.scheme_name, "duplicate scheme name"));
        }
        funds.push(fund);
    }
    Ok(funds)
}

pub fn load_universe(path: &Path) -> Result<Vec<Fund>> {
    let json = fs::read_to_string(path)?;
    let funds = parse_universe(&json)?;
    tracing::info!(path = %path.display(), funds = funds.len(), "Loaded fund universe.");
    Ok(funds)
}

pub fn model_file_name(horizon: Horizon) -> String {
    format!("model_{}.json", horizon.return_column())
}

pub fn parse_model(json: &str, expected: Horizon) -> Result<HorizonModel> {
    let artifact: ModelArtifact = serde_json::from_str(json)?;
    let model = HorizonModel::from_artifact(artifact)?;
    if model.horizon != expected {
        return Err(Error::InvalidArtifact {
            message: format!(
                "{} holds a model for {}",
                model_file_name(expected),
                model.horizon.return_column()
            ),
        });
    }
    Ok(model)
}

/// Loads `model_return_{1,3,5}yr.json` from `dir`. Missing horizons are
/// skipped; a directory with none of them is an error.
pub fn load_models(dir: &Path) -> Result<BTreeMap<Horizon, HorizonModel>> {
    let mut models = BTreeMap::new();
    for horizon in Horizon::ALL {
        let path = dir.join(model_file_name(horizon));
        if !path.is_file() {
            tracing::warn!(path = %path.display(), "Model artifact missing; horizon unavailable.");
            continue;
        }
        let model = parse_model(&fs::read_to_string(&path)?, horizon)?;
        tracing::info!(
            horizon = horizon.years(),
            model_type = %model.model_type,
            features = model.feature_columns.len(),
            "Loaded return model."
        );
        models.insert(horizon, model);
    }

    if models.is_empty() {
        return Err(Error::InvalidArtifact {
            message: format!("no model artifacts found in {}", dir.display()),
        });
    }
    Ok(models)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::features::DatasetMedians;
    use std::path::PathBuf;

    fn row(name: &str) -> Value {
        serde_json::json!({
            "scheme_name": name,
            "amc_name": "AMC",
            "min_sip": 500,
            "min_lumpsum": 5000,
            "risk_level": 4,
            "return_1yr": 9.5,
            "return_3yr": null,
            "expense_ratio": 0.9,
            "fund_size": 1200.5,
            "fund_age": 7,
            "rating": 4,
            "risk_adjusted_score": 0.42,
            "stability_score": 0.61,
            "cost_efficiency": 0.55,
            "category_Equity": true,
            "category_Debt": false,
            "sub_category_Large Cap": 1,
            "sub_category_Mid Cap": 0
        })
    }

    fn parse(rows: Vec<Value>) -> Result<Vec<Fund>> {
        parse_universe(&Value::Array(rows).to_string())
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("fundmix-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("create scratch dir");
        dir
    }

    const LINEAR_3YR: &str = r#"{
        "target": "return_3yr",
        "feature_columns": ["return_1yr", "expense_ratio"],
        "model": { "kind": "linear", "intercept": 2.0, "coefficients": [1.0, -1.0] }
    }"#;

    #[test]
    fn parses_row_with_flags_and_missing_returns() {
        let funds = parse(vec![row("a")]).expect("valid universe");
        let fund = &funds[0];

        assert_eq!(fund.category, Some(Category::Equity));
        assert_eq!(
            fund.sub_categories.iter().collect::<Vec<_>>(),
            vec!["Large Cap"]
        );
        assert_eq!(fund.risk_level, 4);
        assert_eq!(fund.return_1yr, Some(9.5));
        assert_eq!(fund.return_3yr, None);
        assert_eq!(fund.return_5yr, None);
        assert_eq!(fund.feature_value("sub_category_Large Cap"), Some(1.0));
    }

    #[test]
    fn keeps_other_numeric_columns_as_model_features() {
        let mut low = row("low");
        low["sharpe"] = serde_json::json!(1.0);
        low["fund_manager"] = serde_json::json!("A. Rao");
        let mut high = row("high");
        high["sharpe"] = serde_json::json!(3.0);
        high["alpha"] = Value::Null;
        let funds = parse(vec![low, high]).expect("valid universe");

        assert_eq!(funds[0].feature_value("sharpe"), Some(1.0));
        assert_eq!(funds[0].feature_value("fund_manager"), None);
        assert_eq!(funds[1].feature_value("alpha"), None);
        assert_eq!(funds[1].extra_features.len(), 1);

        let model = parse_model(
            r#"{
                "target": "return_1yr",
                "feature_columns": ["sharpe"],
                "model": { "kind": "linear", "intercept": 0.0, "coefficients": [1.0] }
            }"#,
            Horizon::OneYear,
        )
        .expect("model");
        let medians = DatasetMedians::compute(&funds, ["sharpe"]);
        assert_eq!(medians.get("sharpe"), Some(2.0));
        assert_eq!(model.predict_fund(&funds[0], &medians).expect("low"), 1.0);
        assert_eq!(model.predict_fund(&funds[1], &medians).expect("high"), 3.0);
    }

    #[test]
    fn row_without_category_flag_loads_uncategorised() {
        let mut r = row("a");
        r["category_Equity"] = Value::Bool(false);
        let funds = parse(vec![r]).expect("valid universe");
        assert_eq!(funds[0].category, None);
    }

    #[test]
    fn rejects_invalid_rows() {
        let mut two_categories = row("a");
        two_categories["category_Debt"] = Value::Bool(true);

        let mut risky = row("a");
        risky["risk_level"] = serde_json::json!(7);

        let mut fractional_rating = row("a");
        fractional_rating["rating"] = serde_json::json!(3.5);

        let mut negative_expense = row("a");
        negative_expense["expense_ratio"] = serde_json::json!(-0.1);

        let mut empty_fund = row("a");
        empty_fund["fund_size"] = serde_json::json!(0);

        let mut negative_age = row("a");
        negative_age["fund_age"] = serde_json::json!(-1);

        for bad in [
            two_categories,
            risky,
            fractional_rating,
            negative_expense,
            empty_fund,
            negative_age,
        ] {
            let err = parse(vec![bad]).expect_err("invalid row");
            assert!(matches!(err, Error::InvalidUniverse { .. }), "{err}");
        }
    }

    #[test]
    fn rejects_duplicate_scheme_names_and_empty_universe() {
        let err = parse(vec![row("a"), row("b"), row("a")]).expect_err("duplicate");
        assert!(err.to_string().contains("duplicate scheme name"), "{err}");
        assert!(matches!(parse(vec![]), Err(Error::InvalidUniverse { .. })));
    }

    #[test]
    fn malformed_json_is_a_json_error() {
        assert!(matches!(parse_universe("[{"), Err(Error::Json(_))));
    }

    #[test]
    fn parse_model_checks_target_horizon() {
        let model = parse_model(LINEAR_3YR, Horizon::ThreeYear).expect("model");
        assert_eq!(model.model_type, "Linear regression");

        let err = parse_model(LINEAR_3YR, Horizon::OneYear).expect_err("wrong horizon");
        assert!(matches!(err, Error::InvalidArtifact { .. }));
    }

    #[test]
    fn load_models_skips_missing_horizons() {
        let dir = scratch_dir("models-partial");
        fs::write(dir.join(model_file_name(Horizon::ThreeYear)), LINEAR_3YR).expect("write");

        let models = load_models(&dir).expect("one model");
        assert_eq!(models.keys().copied().collect::<Vec<_>>(), vec![Horizon::ThreeYear]);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_models_requires_at_least_one_artifact() {
        let dir = scratch_dir("models-empty");
        assert!(matches!(load_models(&dir), Err(Error::InvalidArtifact { .. })));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn model_file_names_follow_target_columns() {
        assert_eq!(model_file_name(Horizon::OneYear), "model_return_1yr.json");
        assert_eq!(model_file_name(Horizon::FiveYear), "model_return_5yr.json");
    }
}

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::Serialize;

use super::error::{Error, Result};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize)]
pub enum Category {
    Equity,
    Hybrid,
    Debt,
    Other,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Equity,
        Category::Hybrid,
        Category::Debt,
        Category::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::Equity => "Equity",
            Category::Hybrid => "Hybrid",
            Category::Debt => "Debt",
            Category::Other => "Other",
        }
    }

    /// Case-insensitive lookup; names that match no category return `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|category| category.label().eq_ignore_ascii_case(label))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Horizon {
    OneYear,
    ThreeYear,
    FiveYear,
}

impl Horizon {
    pub const ALL: [Horizon; 3] = [Horizon::OneYear, Horizon::ThreeYear, Horizon::FiveYear];

    pub fn years(self) -> u32 {
        match self {
            Horizon::OneYear => 1,
            Horizon::ThreeYear => 3,
            Horizon::FiveYear => 5,
        }
    }

    /// Dataset column holding the historical return for this horizon.
    pub fn return_column(self) -> &'static str {
        match self {
            Horizon::OneYear => "return_1yr",
            Horizon::ThreeYear => "return_3yr",
            Horizon::FiveYear => "return_5yr",
        }
    }

    pub fn from_return_column(column: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|horizon| horizon.return_column() == column)
    }
}

impl TryFrom<u32> for Horizon {
    type Error = Error;

    fn try_from(years: u32) -> Result<Self> {
        match years {
            1 => Ok(Horizon::OneYear),
            3 => Ok(Horizon::ThreeYear),
            5 => Ok(Horizon::FiveYear),
            other => Err(Error::Configuration {
                message: format!("horizon must be 1, 3 or 5 years, got {other}"),
            }),
        }
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} year(s)", self.years())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RiskTolerance {
    Conservative,
    Moderate,
    Aggressive,
}

impl RiskTolerance {
    /// Inclusive risk-level band. Neighbouring bands share their boundary level.
    pub fn risk_range(self) -> RangeInclusive<u8> {
        match self {
            RiskTolerance::Conservative => 1..=3,
            RiskTolerance::Moderate => 3..=5,
            RiskTolerance::Aggressive => 5..=6,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RiskTolerance::Conservative => "conservative",
            RiskTolerance::Moderate => "moderate",
            RiskTolerance::Aggressive => "aggressive",
        }
    }
}

impl FromStr for RiskTolerance {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "conservative" => Ok(RiskTolerance::Conservative),
            "moderate" => Ok(RiskTolerance::Moderate),
            "aggressive" => Ok(RiskTolerance::Aggressive),
            _ => Err(Error::Configuration {
                message: format!(
                    "unknown risk tolerance {value:?}; \
                     expected conservative, moderate or aggressive"
                ),
            }),
        }
    }
}

impl fmt::Display for RiskTolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Fund {
    pub scheme_name: String,
    pub amc_name: String,
    pub category: Option<Category>,
    pub sub_categories: BTreeSet<String>,
    pub min_sip: f64,
    pub min_lumpsum: f64,
    pub risk_level: u8,
    pub return_1yr: Option<f64>,
    pub return_3yr: Option<f64>,
    pub return_5yr: Option<f64>,
    pub expense_ratio: f64,
    pub fund_size: f64,
    pub fund_age: f64,
    pub rating: u8,
    pub risk_adjusted_score: f64,
    pub stability_score: f64,
    pub cost_efficiency: f64,
    /// Other numeric dataset columns (`sharpe`, `alpha`, ...) kept for models.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_features: BTreeMap<String, f64>,
}

impl Fund {
    pub fn historical_return(&self, horizon: Horizon) -> Option<f64> {
        match horizon {
            Horizon::OneYear => self.return_1yr,
            Horizon::ThreeYear => self.return_3yr,
            Horizon::FiveYear => self.return_5yr,
        }
    }

    /// Value of a dataset column for this fund. Flags map to 1.0 / 0.0.
    pub fn feature_value(&self, column: &str) -> Option<f64> {
        if let Some(name) = column.strip_prefix("sub_category_") {
            return Some(flag(self.sub_categories.contains(name)));
        }
        if let Some(name) = column.strip_prefix("category_") {
            let category = Category::ALL
                .into_iter()
                .find(|category| category.label() == name)?;
            return Some(flag(self.category == Some(category)));
        }

        match column {
            "min_sip" => Some(self.min_sip),
            "min_lumpsum" => Some(self.min_lumpsum),
            "risk_level" => Some(f64::from(self.risk_level)),
            "return_1yr" => self.return_1yr,
            "return_3yr" => self.return_3yr,
            "return_5yr" => self.return_5yr,
            "expense_ratio" => Some(self.expense_ratio),
            "fund_size" => Some(self.fund_size),
            "fund_age" => Some(self.fund_age),
            "rating" => Some(f64::from(self.rating)),
            "risk_adjusted_score" => Some(self.risk_adjusted_score),
            "stability_score" => Some(self.stability_score),
            "cost_efficiency" => Some(self.cost_efficiency),
            _ => self.extra_features.get(column).copied(),
        }
    }
}

fn flag(value: bool) -> f64 {
    if value { 1.0 } else { 0.0 }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecommendRequest {
    pub amount: f64,
    pub horizon: Horizon,
    pub risk_tolerance: RiskTolerance,
    pub category_preference: Option<String>,
}

impl RecommendRequest {
    /// Validates raw caller input. Unknown risk labels fail here, before any filtering.
    pub fn new(
        amount: f64,
        horizon_years: u32,
        risk_tolerance: &str,
        category_preference: Option<&str>,
    ) -> Result<Self> {
        let risk_tolerance = risk_tolerance.parse::<RiskTolerance>()?;
        let horizon = Horizon::try_from(horizon_years)?;
        if !amount.is_finite() || amount <= 0.0 {
            return Err(Error::Configuration {
                message: format!("investment amount must be > 0, got {amount}"),
            });
        }

        Ok(Self {
            amount,
            horizon,
            risk_tolerance,
            category_preference: category_preference
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string),
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScoredFund<'a> {
    pub fund: &'a Fund,
    pub predicted_return: f64,
    pub comprehensive_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedFund {
    pub scheme_name: String,
    pub reason: String,
}

use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;

use super::error::{Error, Result};
use super::features::{DatasetMedians, assemble_features};
use super::types::{Fund, Horizon};

/// Opaque regression model: ordered feature vector in, predicted return (%) out.
pub trait ReturnPredictor: Send + Sync {
    fn predict(&self, features: &[f64]) -> Result<f64>;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    Linear(LinearModel),
    TreeEnsemble(TreeEnsemble),
}

impl ModelSpec {
    fn validate(&self, feature_count: usize) -> Result<()> {
        match self {
            ModelSpec::Linear(model) => model.validate(feature_count),
            ModelSpec::TreeEnsemble(model) => model.validate(feature_count),
        }
    }
}

impl ReturnPredictor for ModelSpec {
    fn predict(&self, features: &[f64]) -> Result<f64> {
        match self {
            ModelSpec::Linear(model) => model.predict(features),
            ModelSpec::TreeEnsemble(model) => model.predict(features),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearModel {
    fn validate(&self, feature_count: usize) -> Result<()> {
        if self.coefficients.len() != feature_count {
            return Err(Error::InvalidArtifact {
                message: format!(
                    "linear model has {} coefficients for {feature_count} feature columns",
                    self.coefficients.len()
                ),
            });
        }
        if !self.intercept.is_finite() || self.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(Error::InvalidArtifact {
                message: "linear model weights must be finite".to_string(),
            });
        }
        Ok(())
    }
}

impl ReturnPredictor for LinearModel {
    fn predict(&self, features: &[f64]) -> Result<f64> {
        check_width(self.coefficients.len(), features)?;
        let value = self
            .coefficients
            .iter()
            .zip(features)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.intercept;
        finite_prediction(value)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Aggregation {
    /// Boosted trees: `base_score + learning_rate * sum(tree outputs)`.
    Sum { base_score: f64, learning_rate: f64 },
    /// Bagged trees: mean of tree outputs.
    Mean,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TreeEnsemble {
    pub feature_count: usize,
    pub aggregation: Aggregation,
    pub trees: Vec<RegressionTree>,
}

impl TreeEnsemble {
    fn validate(&self, feature_count: usize) -> Result<()> {
        if self.feature_count != feature_count {
            return Err(Error::InvalidArtifact {
                message: format!(
                    "tree ensemble expects {} features, artifact lists {feature_count} columns",
                    self.feature_count
                ),
            });
        }
        if self.trees.is_empty() {
            return Err(Error::InvalidArtifact {
                message: "tree ensemble has no trees".to_string(),
            });
        }
        if let Aggregation::Sum {
            base_score,
            learning_rate,
        } = self.aggregation
        {
            if !base_score.is_finite() || !learning_rate.is_finite() || learning_rate <= 0.0 {
                return Err(Error::InvalidArtifact {
                    message: "boosted ensemble needs a finite base score and learning rate > 0"
                        .to_string(),
                });
            }
        }
        for (index, tree) in self.trees.iter().enumerate() {
            tree.validate(feature_count).map_err(|message| Error::InvalidArtifact {
                message: format!("tree {index}: {message}"),
            })?;
        }
        Ok(())
    }
}

impl ReturnPredictor for TreeEnsemble {
    fn predict(&self, features: &[f64]) -> Result<f64> {
        check_width(self.feature_count, features)?;
        let mut total = 0.0;
        for tree in &self.trees {
            total += tree.evaluate(features)?;
        }
        let value = match self.aggregation {
            Aggregation::Sum {
                base_score,
                learning_rate,
            } => base_score + learning_rate * total,
            Aggregation::Mean => total / self.trees.len() as f64,
        };
        finite_prediction(value)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// Flat node array; node 0 is the root. Samples with `x <= threshold` go left.
#[derive(Debug, Clone, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

impl RegressionTree {
    fn validate(&self, feature_count: usize) -> std::result::Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (index, node) in self.nodes.iter().enumerate() {
            match *node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if feature >= feature_count {
                        return Err(format!("node {index} splits on missing feature {feature}"));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {index} has a non-finite threshold"));
                    }
                    // Children must point forward, which also rules out cycles.
                    if left <= index || right <= index {
                        return Err(format!("node {index} has a child that does not point forward"));
                    }
                    if left >= self.nodes.len() || right >= self.nodes.len() {
                        return Err(format!("node {index} has a child out of range"));
                    }
                }
                TreeNode::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(format!("leaf {index} has a non-finite value"));
                    }
                }
            }
        }
        Ok(())
    }

    fn evaluate(&self, features: &[f64]) -> Result<f64> {
        let mut index = 0;
        for _ in 0..self.nodes.len() {
            let Some(node) = self.nodes.get(index) else {
                break;
            };
            match *node {
                TreeNode::Leaf { value } => return Ok(value),
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let x = features.get(feature).copied().ok_or_else(|| Error::Prediction {
                        message: format!("tree split references missing feature {feature}"),
                    })?;
                    index = if x <= threshold { left } else { right };
                }
            }
        }

        Err(Error::Prediction {
            message: format!("tree walk did not reach a leaf (stopped at node {index})"),
        })
    }
}

fn check_width(expected: usize, features: &[f64]) -> Result<()> {
    if features.len() != expected {
        return Err(Error::Prediction {
            message: format!(
                "model expects {expected} features, received {}",
                features.len()
            ),
        });
    }
    if let Some(position) = features.iter().position(|x| !x.is_finite()) {
        return Err(Error::Prediction {
            message: format!("feature {position} is not finite"),
        });
    }
    Ok(())
}

fn finite_prediction(value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(Error::Prediction {
            message: "model produced a non-finite prediction".to_string(),
        })
    }
}

/// On-disk model artifact: the trained model plus the metadata it was trained with.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelArtifact {
    pub target: String,
    #[serde(default)]
    pub model_type: Option<String>,
    pub feature_columns: Vec<String>,
    #[serde(default)]
    pub medians: HashMap<String, f64>,
    pub model: ModelSpec,
}

/// Predictor bound to one horizon together with its expected feature order.
pub struct HorizonModel {
    pub horizon: Horizon,
    pub model_type: String,
    pub feature_columns: Vec<String>,
    pub medians_snapshot: HashMap<String, f64>,
    predictor: Box<dyn ReturnPredictor>,
}

impl fmt::Debug for HorizonModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HorizonModel")
            .field("horizon", &self.horizon)
            .field("model_type", &self.model_type)
            .field("feature_columns", &self.feature_columns)
            .finish_non_exhaustive()
    }
}

impl HorizonModel {
    pub fn new(
        horizon: Horizon,
        model_type: impl Into<String>,
        feature_columns: Vec<String>,
        predictor: Box<dyn ReturnPredictor>,
    ) -> Self {
        Self {
            horizon,
            model_type: model_type.into(),
            feature_columns,
            medians_snapshot: HashMap::new(),
            predictor,
        }
    }

    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self> {
        let horizon = Horizon::from_return_column(&artifact.target).ok_or_else(|| {
            Error::InvalidArtifact {
                message: format!("unknown target column {:?}", artifact.target),
            }
        })?;
        if artifact.feature_columns.is_empty() {
            return Err(Error::InvalidArtifact {
                message: format!("{} artifact lists no feature columns", artifact.target),
            });
        }
        artifact.model.validate(artifact.feature_columns.len())?;

        let model_type = artifact.model_type.unwrap_or_else(|| match &artifact.model {
            ModelSpec::Linear(_) => "Linear regression".to_string(),
            ModelSpec::TreeEnsemble(_) => "Tree ensemble".to_string(),
        });

        Ok(Self {
            horizon,
            model_type,
            feature_columns: artifact.feature_columns,
            medians_snapshot: artifact.medians,
            predictor: Box::new(artifact.model),
        })
    }

    pub fn predict_fund(&self, fund: &Fund, medians: &DatasetMedians) -> Result<f64> {
        let features =
            assemble_features(fund, &self.feature_columns, medians, &self.medians_snapshot)?;
        self.predictor.predict(&features)
    }
}

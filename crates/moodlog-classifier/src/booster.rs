//! Evaluation of gradient-boosted tree models saved in XGBoost's JSON
//! model format.
//!
//! Only the `gbtree` booster with numeric splits and a multi-class softmax
//! objective is supported. Inputs are sparse: a feature absent from the
//! vector is treated as missing and follows the node's default branch.
//! Early-stopped models are cut back to their best iteration, as XGBoost
//! itself does when predicting.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::vectorizer::SparseVector;
use crate::{read_artifact, ClassifierError};

#[derive(Deserialize)]
struct ModelFile {
    learner: Learner,
}

#[derive(Deserialize)]
struct Learner {
    /// Training attributes such as `best_iteration`, all string-valued.
    #[serde(default)]
    attributes: HashMap<String, String>,
    gradient_booster: GradientBooster,
    learner_model_param: LearnerModelParam,
    objective: Objective,
}

#[derive(Deserialize)]
struct GradientBooster {
    name: String,
    #[serde(default)]
    model: Option<GbTreeModel>,
}

#[derive(Deserialize)]
struct GbTreeModel {
    trees: Vec<TreeFile>,
    tree_info: Vec<usize>,
    /// Tree offsets per boosting round; absent in older models.
    #[serde(default)]
    iteration_indptr: Option<Vec<usize>>,
    #[serde(default)]
    gbtree_model_param: Option<GbTreeModelParam>,
}

#[derive(Deserialize)]
struct GbTreeModelParam {
    #[serde(default)]
    num_parallel_tree: Option<String>,
}

/// XGBoost writes these parameters as strings.
#[derive(Deserialize)]
struct LearnerModelParam {
    #[serde(default)]
    base_score: Option<String>,
    num_class: String,
    #[serde(default)]
    num_feature: Option<String>,
}

#[derive(Deserialize)]
struct Objective {
    name: String,
}

#[derive(Deserialize)]
struct TreeFile {
    left_children: Vec<i32>,
    right_children: Vec<i32>,
    split_indices: Vec<usize>,
    split_conditions: Vec<f32>,
    default_left: Flags,
    #[serde(default)]
    split_type: Vec<u8>,
}

/// Older models store flags as 0/1, newer ones as booleans.
#[derive(Deserialize)]
#[serde(untagged)]
enum Flags {
    Bools(Vec<bool>),
    Ints(Vec<u8>),
}

impl Flags {
    fn into_bools(self) -> Vec<bool> {
        match self {
            Flags::Bools(b) => b,
            Flags::Ints(i) => i.into_iter().map(|v| v != 0).collect(),
        }
    }
}

/// One regression tree stored as parallel node arrays. Node 0 is the root;
/// a node whose left child is negative is a leaf whose value sits in
/// `split_conditions`.
struct Tree {
    left_children: Vec<i32>,
    right_children: Vec<i32>,
    split_indices: Vec<usize>,
    split_conditions: Vec<f32>,
    default_left: Vec<bool>,
}

impl Tree {
    fn from_file(index: usize, file: TreeFile) -> Result<Self, ClassifierError> {
        let invalid = |msg: String| ClassifierError::InvalidModel(format!("tree {}: {}", index, msg));

        let n = file.left_children.len();
        let default_left = file.default_left.into_bools();
        if n == 0 {
            return Err(invalid("no nodes".into()));
        }
        if file.right_children.len() != n
            || file.split_indices.len() != n
            || file.split_conditions.len() != n
            || default_left.len() != n
        {
            return Err(invalid("node arrays differ in length".into()));
        }
        if file.split_type.iter().any(|&t| t != 0) {
            return Err(invalid("categorical splits are not supported".into()));
        }

        for node in 0..n {
            let left = file.left_children[node];
            let right = file.right_children[node];
            if left < 0 {
                continue;
            }
            // Children always follow their parent, which also rules out cycles.
            for child in [left, right] {
                if child < 0 || child as usize >= n || child as usize <= node {
                    return Err(invalid(format!("node {} has bad child {}", node, child)));
                }
            }
        }

        Ok(Self {
            left_children: file.left_children,
            right_children: file.right_children,
            split_indices: file.split_indices,
            split_conditions: file.split_conditions,
            default_left,
        })
    }

    fn leaf_value(&self, features: &SparseVector) -> f32 {
        let mut node = 0usize;
        loop {
            let left = self.left_children[node];
            if left < 0 {
                return self.split_conditions[node];
            }
            let go_left = match features.get(self.split_indices[node]) {
                Some(value) => (value as f32) < self.split_conditions[node],
                None => self.default_left[node],
            };
            node = if go_left {
                left as usize
            } else {
                self.right_children[node] as usize
            };
        }
    }
}

/// A multi-class tree ensemble.
pub struct Booster {
    trees: Vec<Tree>,
    tree_class: Vec<usize>,
    num_class: usize,
    num_feature: usize,
    base_score: Vec<f32>,
}

impl Booster {
    /// Load an XGBoost JSON model from disk.
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let contents = read_artifact(path)?;
        let file: ModelFile =
            serde_json::from_str(&contents).map_err(|source| ClassifierError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_file(file)
    }

    /// Build a booster from an XGBoost JSON model document.
    pub fn from_json(json: &str) -> Result<Self, ClassifierError> {
        let file: ModelFile = serde_json::from_str(json)
            .map_err(|e| ClassifierError::InvalidModel(e.to_string()))?;
        Self::from_file(file)
    }

    fn from_file(file: ModelFile) -> Result<Self, ClassifierError> {
        let learner = file.learner;

        let objective = learner.objective.name.as_str();
        if objective != "multi:softprob" && objective != "multi:softmax" {
            return Err(ClassifierError::InvalidModel(format!(
                "unsupported objective '{}'",
                objective
            )));
        }

        if learner.gradient_booster.name != "gbtree" {
            return Err(ClassifierError::InvalidModel(format!(
                "unsupported booster '{}'",
                learner.gradient_booster.name
            )));
        }
        let mut model = learner
            .gradient_booster
            .model
            .ok_or_else(|| ClassifierError::InvalidModel("gbtree model is missing".into()))?;

        let params = learner.learner_model_param;
        let num_class: usize = parse_param("num_class", &params.num_class)?;
        if num_class < 2 {
            return Err(ClassifierError::InvalidModel(format!(
                "expected a multi-class model, got num_class {}",
                num_class
            )));
        }
        let num_feature: usize = match params.num_feature {
            Some(ref s) => parse_param("num_feature", s)?,
            None => 0,
        };
        let base_score = parse_base_score(params.base_score.as_deref(), num_class)?;

        if model.tree_info.len() != model.trees.len() {
            return Err(ClassifierError::InvalidModel(format!(
                "{} trees but {} tree_info entries",
                model.trees.len(),
                model.tree_info.len()
            )));
        }
        if let Some(&class) = model.tree_info.iter().find(|&&c| c >= num_class) {
            return Err(ClassifierError::InvalidModel(format!(
                "tree assigned to class {} of {}",
                class, num_class
            )));
        }

        let indptr = round_offsets(&model, num_class)?;
        let rounds = indptr.len() - 1;
        if let Some(best) = learner.attributes.get("best_iteration") {
            let best: usize = parse_param("best_iteration", best)?;
            let end = best.checked_add(1).and_then(|i| indptr.get(i));
            let keep = *end.ok_or_else(|| {
                ClassifierError::InvalidModel(format!(
                    "best_iteration {} but only {} rounds",
                    best, rounds
                ))
            })?;
            tracing::debug!(
                best_iteration = best,
                rounds,
                trees = keep,
                "truncating to best iteration"
            );
            model.trees.truncate(keep);
            model.tree_info.truncate(keep);
        }

        let trees = model
            .trees
            .into_iter()
            .enumerate()
            .map(|(i, t)| Tree::from_file(i, t))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            trees = trees.len(),
            num_class,
            num_feature,
            "loaded tree ensemble"
        );

        Ok(Self {
            trees,
            tree_class: model.tree_info,
            num_class,
            num_feature,
            base_score,
        })
    }

    pub fn num_class(&self) -> usize {
        self.num_class
    }

    /// Feature count recorded in the model, or 0 when absent.
    pub fn num_feature(&self) -> usize {
        self.num_feature
    }

    /// Raw per-class scores: base score plus the sum of each class's leaves.
    pub fn margins(&self, features: &SparseVector) -> Vec<f32> {
        let mut margins = self.base_score.clone();
        for (tree, &class) in self.trees.iter().zip(&self.tree_class) {
            margins[class] += tree.leaf_value(features);
        }
        margins
    }

    /// Softmax class probabilities.
    pub fn predict_proba(&self, features: &SparseVector) -> Vec<f64> {
        softmax(&self.margins(features))
    }

    /// Index of the most likely class; ties go to the lowest index.
    pub fn predict_class(&self, features: &SparseVector) -> usize {
        argmax(&self.margins(features))
    }
}

/// Start offset of each boosting round's trees, plus the total.
fn round_offsets(
    model: &GbTreeModel,
    num_class: usize,
) -> Result<Vec<usize>, ClassifierError> {
    let total = model.trees.len();

    if let Some(ref indptr) = model.iteration_indptr {
        let ordered = indptr.windows(2).all(|w| w[0] <= w[1]);
        if indptr.first() != Some(&0) || indptr.last() != Some(&total) || !ordered {
            return Err(ClassifierError::InvalidModel(format!(
                "iteration_indptr {:?} does not cover {} trees",
                indptr, total
            )));
        }
        return Ok(indptr.clone());
    }

    let parallel: usize = match model
        .gbtree_model_param
        .as_ref()
        .and_then(|p| p.num_parallel_tree.as_deref())
    {
        Some(s) => parse_param("num_parallel_tree", s)?,
        None => 1,
    };
    let per_round = num_class * parallel.max(1);
    if total % per_round != 0 {
        return Err(ClassifierError::InvalidModel(format!(
            "{} trees is not a whole number of rounds of {}",
            total, per_round
        )));
    }
    Ok((0..=total / per_round).map(|r| r * per_round).collect())
}

fn parse_param<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ClassifierError> {
    value
        .trim()
        .parse()
        .map_err(|_| ClassifierError::InvalidModel(format!("bad {}: '{}'", name, value)))
}

/// Base score is a scalar (`"5E-1"`) or, in newer models, a bracketed
/// per-class list (`"[5E-1,5E-1]"`).
fn parse_base_score(value: Option<&str>, num_class: usize) -> Result<Vec<f32>, ClassifierError> {
    let value = match value {
        Some(v) => v.trim().trim_start_matches('[').trim_end_matches(']'),
        None => return Ok(vec![0.5; num_class]),
    };

    let scores = value
        .split(',')
        .map(|s| parse_param::<f32>("base_score", s))
        .collect::<Result<Vec<_>, _>>()?;

    match scores.len() {
        1 => Ok(vec![scores[0]; num_class]),
        n if n == num_class => Ok(scores),
        n => Err(ClassifierError::InvalidModel(format!(
            "base_score has {} values for {} classes",
            n, num_class
        ))),
    }
}

fn softmax(margins: &[f32]) -> Vec<f64> {
    let max = margins.iter().copied().fold(f32::NEG_INFINITY, f32::max) as f64;
    let exps: Vec<f64> = margins.iter().map(|&m| (m as f64 - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

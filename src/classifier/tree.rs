use std::path::Path;

use serde::Deserialize;

use super::Classifier;
use crate::models::{ClassProbabilities, FeatureName};

/// One node of a boosted-tree dump.
///
/// Split nodes send a row to `yes` when `x < split_condition`, to `no`
/// otherwise, and to `missing` when the input is NaN.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Node {
    Split {
        nodeid: u32,
        split: String,
        split_condition: f64,
        yes: u32,
        no: u32,
        missing: Option<u32>,
        children: Vec<Node>,
    },
    Leaf {
        nodeid: u32,
        leaf: f64,
    },
}

#[derive(Debug, Deserialize)]
struct ModelFile {
    feature_names: Vec<String>,
    #[serde(default = "default_base_score")]
    base_score: f64,
    trees: Vec<Node>,
}

fn default_base_score() -> f64 {
    0.5
}

/// Flattened tree: nodes indexed by position, children by index
#[derive(Debug, Clone)]
enum Flat {
    Split {
        feature: usize,
        threshold: f64,
        yes: usize,
        no: usize,
        missing: usize,
    },
    Leaf(f64),
}

/// Gradient-boosted tree ensemble with a logistic output
#[derive(Debug, Clone)]
pub struct TreeEnsemble {
    feature_names: Vec<FeatureName>,
    base_margin: f64,
    trees: Vec<Vec<Flat>>,
}

impl TreeEnsemble {
    pub fn load_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read model {}: {}", path.display(), e))?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let file: ModelFile = serde_json::from_str(json)?;

        let feature_names = file
            .feature_names
            .iter()
            .map(|name| {
                FeatureName::parse(name).ok_or_else(|| anyhow::anyhow!("Unknown feature '{}'", name))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        if !(file.base_score > 0.0 && file.base_score < 1.0) {
            anyhow::bail!("base_score {} must lie strictly between 0 and 1", file.base_score);
        }
        if file.trees.is_empty() {
            anyhow::bail!("Model has no trees");
        }

        let trees = file
            .trees
            .iter()
            .map(|root| flatten(root, &file.feature_names))
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self {
            feature_names,
            base_margin: logit(file.base_score),
            trees,
        })
    }

    fn margin(&self, features: &[f64]) -> f64 {
        self.trees
            .iter()
            .map(|tree| {
                let mut idx = 0;
                loop {
                    match &tree[idx] {
                        Flat::Leaf(value) => break *value,
                        Flat::Split {
                            feature,
                            threshold,
                            yes,
                            no,
                            missing,
                        } => {
                            let x = features[*feature];
                            idx = if x.is_nan() {
                                *missing
                            } else if x < *threshold {
                                *yes
                            } else {
                                *no
                            };
                        }
                    }
                }
            })
            .sum::<f64>()
            + self.base_margin
    }
}

impl Classifier for TreeEnsemble {
    fn predict_proba(&self, features: &[f64]) -> Result<ClassProbabilities, String> {
        if features.len() != self.feature_names.len() {
            return Err(format!(
                "expected {} features, got {}",
                self.feature_names.len(),
                features.len()
            ));
        }
        let positive = sigmoid(self.margin(features));
        ClassProbabilities::from_positive(positive)
    }

    fn n_features_in(&self) -> Option<usize> {
        Some(self.feature_names.len())
    }

    fn feature_names(&self) -> Option<&[FeatureName]> {
        Some(&self.feature_names)
    }
}

fn flatten(root: &Node, names: &[String]) -> anyhow::Result<Vec<Flat>> {
    let mut by_id = std::collections::HashMap::new();
    collect(root, &mut by_id)?;

    // Root first, everything else in id order.
    let root_id = node_id(root);
    let mut order: Vec<u32> = by_id.keys().copied().filter(|id| *id != root_id).collect();
    order.sort_unstable();
    order.insert(0, root_id);
    let position: std::collections::HashMap<u32, usize> =
        order.iter().enumerate().map(|(i, id)| (*id, i)).collect();

    let lookup = |id: u32| {
        position
            .get(&id)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("Split references missing node {}", id))
    };

    let mut flat = Vec::with_capacity(order.len());
    for id in &order {
        let node = by_id[id];
        flat.push(match node {
            Node::Leaf { leaf, .. } => Flat::Leaf(*leaf),
            Node::Split {
                nodeid,
                split,
                split_condition,
                yes,
                no,
                missing,
                ..
            } => {
                let (yes, no) = (lookup(*yes)?, lookup(*no)?);
                let missing = match missing {
                    Some(m) => lookup(*m)?,
                    None => yes,
                };
                // A node can only point further down the tree.
                let here = position[nodeid];
                if yes <= here || no <= here || missing <= here {
                    anyhow::bail!("Node {} points back up the tree", nodeid);
                }
                Flat::Split {
                    feature: feature_index(split, names)?,
                    threshold: *split_condition,
                    yes,
                    no,
                    missing,
                }
            }
        });
    }
    Ok(flat)
}

fn collect<'a>(
    node: &'a Node,
    by_id: &mut std::collections::HashMap<u32, &'a Node>,
) -> anyhow::Result<()> {
    if by_id.insert(node_id(node), node).is_some() {
        anyhow::bail!("Duplicate node id {}", node_id(node));
    }
    if let Node::Split { children, .. } = node {
        for child in children {
            collect(child, by_id)?;
        }
    }
    Ok(())
}

fn node_id(node: &Node) -> u32 {
    match node {
        Node::Split { nodeid, .. } | Node::Leaf { nodeid, .. } => *nodeid,
    }
}

/// Splits name a feature directly or by position (`f0`, `f1`, ...)
fn feature_index(split: &str, names: &[String]) -> anyhow::Result<usize> {
    if let Some(i) = names.iter().position(|n| n == split) {
        return Ok(i);
    }
    split
        .strip_prefix('f')
        .and_then(|i| i.parse::<usize>().ok())
        .filter(|i| *i < names.len())
        .ok_or_else(|| anyhow::anyhow!("Split on unknown feature '{}'", split))
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn logit(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}

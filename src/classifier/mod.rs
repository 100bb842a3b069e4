//! Classifier capability and the per-mode adapter that feeds it.
//!
//! A [`Classifier`] is any trained binary model that maps an ordered
//! feature slice to a two-class distribution. The [`ClassifierAdapter`]
//! binds one to a [`DiseaseMode`] and owns the feature order that mode's
//! model was trained on.

pub mod registry;
pub mod tree;

use std::sync::Arc;

use crate::error::{EngineError, Result};
use crate::models::{ClassProbabilities, DiseaseMode, FeatureName, FeatureVector};

pub use registry::{ClassifierRegistry, ModelStatus};
pub use tree::TreeEnsemble;

pub const FRACTURE_FEATURES: [FeatureName; 3] = [
    FeatureName::MeanIntensity,
    FeatureName::Variance,
    FeatureName::EdgeDensity,
];

pub const TB_BASIC_FEATURES: [FeatureName; 2] = [FeatureName::MeanIntensity, FeatureName::Variance];

pub const TB_EXTENDED_FEATURES: [FeatureName; 3] = [
    FeatureName::MeanIntensity,
    FeatureName::Variance,
    FeatureName::LungDensityRatio,
];

/// A trained binary classifier. Must be read-only after construction so a
/// single instance can serve concurrent requests.
pub trait Classifier: Send + Sync {
    /// `[P(negative), P(positive)]` for one feature row
    fn predict_proba(&self, features: &[f64]) -> std::result::Result<ClassProbabilities, String>;

    /// Number of inputs the model was trained on, if it records it
    fn n_features_in(&self) -> Option<usize> {
        None
    }

    /// Feature names the model was trained on, if it records them
    fn feature_names(&self) -> Option<&[FeatureName]> {
        None
    }
}

/// Mode-bound classifier with a fixed expected feature order
#[derive(Clone)]
pub struct ClassifierAdapter {
    mode: DiseaseMode,
    expected: Vec<FeatureName>,
    classifier: Arc<dyn Classifier>,
}

impl std::fmt::Debug for ClassifierAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierAdapter")
            .field("mode", &self.mode)
            .field("expected", &self.expected)
            .finish_non_exhaustive()
    }
}

impl ClassifierAdapter {
    /// Bind a classifier to a mode, choosing the feature layout it expects.
    ///
    /// Tuberculosis models that report three inputs get the lung density
    /// ratio as their third feature; all other tuberculosis models get the
    /// two-feature layout. Fracture models always take three features.
    pub fn new(mode: DiseaseMode, classifier: Arc<dyn Classifier>) -> Result<Self> {
        let expected: Vec<FeatureName> = match mode {
            DiseaseMode::Fracture => FRACTURE_FEATURES.to_vec(),
            DiseaseMode::Tuberculosis if classifier.n_features_in() == Some(3) => {
                TB_EXTENDED_FEATURES.to_vec()
            }
            DiseaseMode::Tuberculosis => TB_BASIC_FEATURES.to_vec(),
        };

        if let Some(n) = classifier.n_features_in() {
            if n != expected.len() {
                return Err(EngineError::ModelUnavailable {
                    mode,
                    reason: format!("model takes {n} features, {mode} needs {}", expected.len()),
                });
            }
        }
        if let Some(names) = classifier.feature_names() {
            if names != expected.as_slice() {
                return Err(EngineError::ModelUnavailable {
                    mode,
                    reason: format!("model was trained on {names:?}, {mode} provides {expected:?}"),
                });
            }
        }

        Ok(Self {
            mode,
            expected,
            classifier,
        })
    }

    /// Feature names in the order the classifier consumes them
    pub fn expected_features(&self) -> &[FeatureName] {
        &self.expected
    }

    pub fn predict(&self, features: &FeatureVector) -> Result<ClassProbabilities> {
        let row = features
            .select(&self.expected)
            .map_err(|missing| EngineError::FeatureExtraction {
                mode: self.mode,
                feature: missing.as_str(),
                reason: "required by classifier but not extracted".to_string(),
            })?;

        let probabilities =
            self.classifier
                .predict_proba(&row)
                .map_err(|reason| EngineError::Classifier {
                    mode: self.mode,
                    reason,
                })?;

        // Re-check whatever the model handed back.
        ClassProbabilities::new(probabilities.negative, probabilities.positive).map_err(|reason| {
            EngineError::Classifier {
                mode: self.mode,
                reason,
            }
        })
    }
}

use std::path::Path;

use serde::Serialize;

use crate::classifier::ClassifierRegistry;
use crate::error::Result;
use crate::explain;
use crate::features::{self, Extraction};
use crate::loader::{self, RawImage};
use crate::models::{DiseaseMode, FeatureExplanation, FeatureVector, Verdict};
use crate::rules::{Cascade, Decision};

/// Stages one request passes through, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Loaded,
    FeaturesExtracted,
    RuleDecided,
    ClassifierConsulted,
    Finalized,
}

/// Verdict plus the evidence it was built from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnosis {
    pub verdict: Verdict,
    pub features: FeatureVector,
    /// Texture histogram, when the mode computes one
    pub texture: Option<Vec<f64>>,
    pub stages: Vec<Stage>,
}

/// Runs images through extraction, the rule cascade and the classifier.
///
/// Holds nothing but the read-only classifier registry, so one engine can
/// be shared across threads.
#[derive(Debug, Clone)]
pub struct DiagnosticEngine {
    registry: ClassifierRegistry,
}

impl DiagnosticEngine {
    pub fn new(registry: ClassifierRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ClassifierRegistry {
        &self.registry
    }

    /// Diagnose an image file for a selector string (`"fracture"` or `"tb"`)
    pub fn diagnose(&self, path: impl AsRef<Path>, selector: &str) -> Result<Diagnosis> {
        let mode: DiseaseMode = selector.parse()?;
        self.diagnose_path(path, mode)
    }

    pub fn diagnose_path(&self, path: impl AsRef<Path>, mode: DiseaseMode) -> Result<Diagnosis> {
        self.registry.adapter(mode)?;
        let image = loader::load_path(path)?;
        self.diagnose_image(&image, mode)
    }

    pub fn diagnose_bytes(&self, bytes: &[u8], mode: DiseaseMode) -> Result<Diagnosis> {
        self.registry.adapter(mode)?;
        let image = loader::load_bytes(bytes)?;
        self.diagnose_image(&image, mode)
    }

    pub fn diagnose_image(&self, image: &RawImage, mode: DiseaseMode) -> Result<Diagnosis> {
        let span = tracing::info_span!("diagnose", %mode, width = image.width(), height = image.height());
        let _guard = span.enter();

        let mut stages = vec![Stage::Loaded];
        let Extraction {
            features,
            explanations,
            texture,
        } = features::extract(image, mode)?;
        stages.push(Stage::FeaturesExtracted);

        let verdict = self.decide_with_stages(mode, &features, explanations, &mut stages)?;
        Ok(Diagnosis {
            verdict,
            features,
            texture,
            stages,
        })
    }

    /// Decide from an already-extracted feature vector
    pub fn decide(
        &self,
        mode: DiseaseMode,
        features: &FeatureVector,
        explanations: Vec<FeatureExplanation>,
    ) -> Result<Verdict> {
        let mut stages = vec![Stage::FeaturesExtracted];
        self.decide_with_stages(mode, features, explanations, &mut stages)
    }

    fn decide_with_stages(
        &self,
        mode: DiseaseMode,
        features: &FeatureVector,
        feature_explanations: Vec<FeatureExplanation>,
        stages: &mut Vec<Stage>,
    ) -> Result<Verdict> {
        let adapter = self.registry.adapter(mode)?;
        let cascade = Cascade::for_mode(mode);
        features.require(mode, &cascade.required_features())?;

        let decision = cascade.decide(features, || adapter.predict(features))?;
        match &decision {
            Decision::Rule(rule) => {
                stages.push(Stage::RuleDecided);
                tracing::info!(rule = rule.name, "decided by rule");
            }
            Decision::Classifier { probabilities, .. } => {
                stages.push(Stage::ClassifierConsulted);
                tracing::info!(p_positive = probabilities.positive, "decided by classifier");
            }
            Decision::Overridden {
                rule,
                probabilities,
                classifier_class,
                ..
            } => {
                stages.push(Stage::ClassifierConsulted);
                tracing::warn!(
                    rule = rule.name,
                    p_positive = probabilities.positive,
                    classifier_label = %mode.label(*classifier_class),
                    "classifier call overridden"
                );
            }
        }

        let class = decision.class();
        let verdict = Verdict {
            mode,
            label: mode.label(class),
            confidence: explain::confidence(&decision),
            predicted_class: class,
            decision: decision.path(),
            explanation: explain::explain(mode, &decision),
            feature_explanations,
        };
        stages.push(Stage::Finalized);
        tracing::info!(label = %verdict.label, confidence = verdict.confidence, "verdict");
        Ok(verdict)
    }
}

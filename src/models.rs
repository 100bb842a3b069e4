use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::EngineError;

/// Which diagnostic question is being asked of an image.
///
/// Selects the feature set, the rule cascade and the classifier binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DiseaseMode {
    #[serde(rename = "fracture")]
    Fracture,
    #[serde(rename = "tb")]
    Tuberculosis,
}

impl DiseaseMode {
    pub const ALL: [DiseaseMode; 2] = [DiseaseMode::Fracture, DiseaseMode::Tuberculosis];

    /// Selector string accepted from callers
    pub fn as_str(&self) -> &'static str {
        match self {
            DiseaseMode::Fracture => "fracture",
            DiseaseMode::Tuberculosis => "tb",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            DiseaseMode::Fracture => "Fracture",
            DiseaseMode::Tuberculosis => "Tuberculosis",
        }
    }

    /// Map a predicted class onto the label vocabulary of this mode
    pub fn label(&self, class: PredictedClass) -> Label {
        match (self, class) {
            (DiseaseMode::Fracture, PredictedClass::Positive) => Label::Positive,
            (DiseaseMode::Fracture, PredictedClass::Negative) => Label::Negative,
            (DiseaseMode::Tuberculosis, PredictedClass::Positive) => Label::Tuberculosis,
            (DiseaseMode::Tuberculosis, PredictedClass::Negative) => Label::Normal,
        }
    }
}

impl fmt::Display for DiseaseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiseaseMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fracture" => Ok(DiseaseMode::Fracture),
            "tb" => Ok(DiseaseMode::Tuberculosis),
            other => Err(EngineError::InvalidDiseaseMode(other.to_string())),
        }
    }
}

/// Named scalar descriptors the extractor can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureName {
    MeanIntensity,
    Variance,
    EdgeDensity,
    LungDensityRatio,
}

impl FeatureName {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureName::MeanIntensity => "mean_intensity",
            FeatureName::Variance => "variance",
            FeatureName::EdgeDensity => "edge_density",
            FeatureName::LungDensityRatio => "lung_density_ratio",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "mean_intensity" => Some(FeatureName::MeanIntensity),
            "variance" => Some(FeatureName::Variance),
            "edge_density" => Some(FeatureName::EdgeDensity),
            "lung_density_ratio" => Some(FeatureName::LungDensityRatio),
            _ => None,
        }
    }
}

impl fmt::Display for FeatureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered feature name → value mapping. Values are always finite.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureVector {
    entries: Vec<(FeatureName, f64)>,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value. Non-finite values are rejected and the
    /// vector is left untouched.
    pub fn insert(&mut self, name: FeatureName, value: f64) -> Result<(), f64> {
        if !value.is_finite() {
            return Err(value);
        }
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
        Ok(())
    }

    /// Builder-style insert, used mostly to assemble synthetic vectors
    pub fn with(mut self, name: FeatureName, value: f64) -> Result<Self, f64> {
        self.insert(name, value)?;
        Ok(self)
    }

    pub fn get(&self, name: FeatureName) -> Option<f64> {
        self.entries.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
    }

    pub fn names(&self) -> impl Iterator<Item = FeatureName> + '_ {
        self.entries.iter().map(|(n, _)| *n)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check that every listed feature is present
    pub fn require(&self, mode: DiseaseMode, names: &[FeatureName]) -> crate::error::Result<()> {
        for name in names {
            if self.get(*name).is_none() {
                return Err(EngineError::FeatureExtraction {
                    mode,
                    feature: name.as_str(),
                    reason: "feature missing from vector".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Values in the given order, or the first missing name
    pub fn select(&self, names: &[FeatureName]) -> Result<Vec<f64>, FeatureName> {
        names
            .iter()
            .map(|name| self.get(*name).ok_or(*name))
            .collect()
    }
}

impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name.as_str(), value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Importance {
    Low,
    Medium,
    High,
}

impl fmt::Display for Importance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Importance::Low => "Low",
            Importance::Medium => "Medium",
            Importance::High => "High",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureExplanation {
    pub feature: FeatureName,
    pub value: f64,
    pub interpretation: String,
    pub importance: Importance,
}

/// Two-class distribution `[P(negative), P(positive)]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassProbabilities {
    pub negative: f64,
    pub positive: f64,
}

impl ClassProbabilities {
    const SUM_TOLERANCE: f64 = 1e-6;

    pub fn new(negative: f64, positive: f64) -> Result<Self, String> {
        for (name, p) in [("negative", negative), ("positive", positive)] {
            if !p.is_finite() || !(0.0..=1.0).contains(&p) {
                return Err(format!("P({name}) = {p} is not a probability"));
            }
        }
        if (negative + positive - 1.0).abs() > Self::SUM_TOLERANCE {
            return Err(format!(
                "probabilities sum to {} instead of 1",
                negative + positive
            ));
        }
        Ok(Self { negative, positive })
    }

    pub fn from_positive(positive: f64) -> Result<Self, String> {
        Self::new(1.0 - positive, positive)
    }

    pub fn of(&self, class: PredictedClass) -> f64 {
        match class {
            PredictedClass::Positive => self.positive,
            PredictedClass::Negative => self.negative,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "u8")]
pub enum PredictedClass {
    Negative,
    Positive,
}

impl From<PredictedClass> for u8 {
    fn from(class: PredictedClass) -> u8 {
        match class {
            PredictedClass::Negative => 0,
            PredictedClass::Positive => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Label {
    Positive,
    Negative,
    Tuberculosis,
    Normal,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Label::Positive => "Positive",
            Label::Negative => "Negative",
            Label::Tuberculosis => "Tuberculosis",
            Label::Normal => "Normal",
        };
        f.write_str(s)
    }
}

/// How the final call was reached
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecisionPath {
    /// A cascade rule matched before the classifier was needed
    RuleDecided { rule: &'static str },
    /// The classifier was consulted; a post-classifier rule may have
    /// replaced its call
    ClassifierConsulted {
        probabilities: ClassProbabilities,
        threshold: f64,
        overridden_by: Option<&'static str>,
    },
}

impl DecisionPath {
    pub fn consulted_classifier(&self) -> bool {
        matches!(self, DecisionPath::ClassifierConsulted { .. })
    }

    pub fn override_rule(&self) -> Option<&'static str> {
        match self {
            DecisionPath::ClassifierConsulted { overridden_by, .. } => *overridden_by,
            DecisionPath::RuleDecided { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    /// e.g. "Positive for Fracture"
    pub summary: String,
    pub recommendation: String,
    /// Which rule or classifier output drove the call
    pub rationale: String,
    /// Set when a post-classifier rule replaced the classifier's call
    pub override_note: Option<String>,
}

/// Terminal output of one decision
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub mode: DiseaseMode,
    pub label: Label,
    /// Percentage in `[0, 100]`
    pub confidence: f64,
    pub predicted_class: PredictedClass,
    pub decision: DecisionPath,
    pub explanation: Explanation,
    pub feature_explanations: Vec<FeatureExplanation>,
}

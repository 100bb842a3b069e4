//! Threshold rule cascades that run ahead of, and after, the classifier.
//!
//! Each mode has an ordered list of rules checked first-match-wins. When
//! none match, the classifier is consulted and its positive probability is
//! compared against the mode's cutoff; the fallback's override rules then
//! get a final say. Thresholds are compared against raw feature values.

use std::fmt;

use crate::error::Result;
use crate::models::{
    ClassProbabilities, DecisionPath, DiseaseMode, FeatureName, FeatureVector, PredictedClass,
};
use FeatureName::{EdgeDensity, MeanIntensity, Variance};
use PredictedClass::{Negative, Positive};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Above,
    Below,
}

/// Strict comparison of one feature against a constant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Condition {
    pub feature: FeatureName,
    pub comparison: Comparison,
    pub threshold: f64,
}

impl Condition {
    pub const fn above(feature: FeatureName, threshold: f64) -> Self {
        Self {
            feature,
            comparison: Comparison::Above,
            threshold,
        }
    }

    pub const fn below(feature: FeatureName, threshold: f64) -> Self {
        Self {
            feature,
            comparison: Comparison::Below,
            threshold,
        }
    }

    /// A missing feature never satisfies a condition
    pub fn holds(&self, features: &FeatureVector) -> bool {
        match features.get(self.feature) {
            Some(value) => match self.comparison {
                Comparison::Above => value > self.threshold,
                Comparison::Below => value < self.threshold,
            },
            None => false,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.comparison {
            Comparison::Above => ">",
            Comparison::Below => "<",
        };
        write!(f, "{} {} {}", self.feature, op, self.threshold)
    }
}

/// Conjunction of conditions with a fixed outcome
#[derive(Debug, PartialEq)]
pub struct Rule {
    pub name: &'static str,
    pub conditions: &'static [Condition],
    pub class: PredictedClass,
    /// Percentage reported when this rule decides
    pub confidence: f64,
}

impl Rule {
    pub fn matches(&self, features: &FeatureVector) -> bool {
        self.conditions.iter().all(|c| c.holds(features))
    }

    /// e.g. "edge_density > 0.011 and variance > 1500"
    pub fn describe(&self) -> String {
        self.conditions
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(" and ")
    }
}

/// The classifier step plus the rules allowed to overrule it
#[derive(Debug, PartialEq)]
pub struct Fallback {
    /// Positive iff `P(positive)` is strictly above this
    pub positive_threshold: f64,
    pub overrides: &'static [Rule],
}

impl Fallback {
    /// Turn classifier output into a decision, then let the override rules
    /// have the last word
    pub fn resolve(&self, features: &FeatureVector, probabilities: ClassProbabilities) -> Decision {
        let class = if probabilities.positive > self.positive_threshold {
            PredictedClass::Positive
        } else {
            PredictedClass::Negative
        };

        match self.overrides.iter().find(|rule| rule.matches(features)) {
            Some(rule) => Decision::Overridden {
                rule,
                classifier_class: class,
                probabilities,
                threshold: self.positive_threshold,
            },
            None => Decision::Classifier {
                class,
                probabilities,
                threshold: self.positive_threshold,
            },
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct Cascade {
    pub mode: DiseaseMode,
    pub rules: &'static [Rule],
    pub fallback: Fallback,
}

/// Result of running a cascade on one feature vector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    /// A rule matched before the classifier was needed
    Rule(&'static Rule),
    Classifier {
        class: PredictedClass,
        probabilities: ClassProbabilities,
        threshold: f64,
    },
    /// The classifier ran but a post-classifier rule replaced its call
    Overridden {
        rule: &'static Rule,
        classifier_class: PredictedClass,
        probabilities: ClassProbabilities,
        threshold: f64,
    },
}

impl Decision {
    pub fn class(&self) -> PredictedClass {
        match self {
            Decision::Rule(rule) | Decision::Overridden { rule, .. } => rule.class,
            Decision::Classifier { class, .. } => *class,
        }
    }

    pub fn path(&self) -> DecisionPath {
        match self {
            Decision::Rule(rule) => DecisionPath::RuleDecided { rule: rule.name },
            Decision::Classifier {
                probabilities,
                threshold,
                ..
            } => DecisionPath::ClassifierConsulted {
                probabilities: *probabilities,
                threshold: *threshold,
                overridden_by: None,
            },
            Decision::Overridden {
                rule,
                probabilities,
                threshold,
                ..
            } => DecisionPath::ClassifierConsulted {
                probabilities: *probabilities,
                threshold: *threshold,
                overridden_by: Some(rule.name),
            },
        }
    }
}

impl Cascade {
    pub fn for_mode(mode: DiseaseMode) -> &'static Cascade {
        match mode {
            DiseaseMode::Fracture => &FRACTURE_CASCADE,
            DiseaseMode::Tuberculosis => &TB_CASCADE,
        }
    }

    /// Every feature any rule of this cascade reads
    pub fn required_features(&self) -> Vec<FeatureName> {
        let mut names: Vec<FeatureName> = self
            .rules
            .iter()
            .chain(self.fallback.overrides)
            .flat_map(|rule| rule.conditions.iter().map(|c| c.feature))
            .collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn first_match(&self, features: &FeatureVector) -> Option<&'static Rule> {
        self.rules.iter().find(|rule| rule.matches(features))
    }

    /// Run the cascade. `consult` is only called when no rule matches.
    pub fn decide<F>(&self, features: &FeatureVector, consult: F) -> Result<Decision>
    where
        F: FnOnce() -> Result<ClassProbabilities>,
    {
        if let Some(rule) = self.first_match(features) {
            return Ok(Decision::Rule(rule));
        }
        let probabilities = consult()?;
        Ok(self.fallback.resolve(features, probabilities))
    }
}

pub static FRACTURE_CASCADE: Cascade = Cascade {
    mode: DiseaseMode::Fracture,
    rules: &[
        Rule {
            name: "high_edge_density",
            conditions: &[Condition::above(EdgeDensity, 0.02)],
            class: Positive,
            confidence: 95.0,
        },
        Rule {
            name: "elevated_edges_high_variance",
            conditions: &[
                Condition::above(EdgeDensity, 0.011),
                Condition::above(Variance, 1500.0),
            ],
            class: Positive,
            confidence: 88.0,
        },
        Rule {
            name: "moderate_edges_moderate_variance",
            conditions: &[
                Condition::above(EdgeDensity, 0.008),
                Condition::above(Variance, 1000.0),
            ],
            class: Positive,
            confidence: 80.0,
        },
        Rule {
            name: "minimal_edges",
            conditions: &[Condition::below(EdgeDensity, 0.003)],
            class: Negative,
            confidence: 92.0,
        },
        Rule {
            name: "low_edges_bright_bone",
            conditions: &[
                Condition::below(EdgeDensity, 0.005),
                Condition::above(MeanIntensity, 70.0),
            ],
            class: Negative,
            confidence: 85.0,
        },
    ],
    fallback: Fallback {
        // Strict cutoff to keep ambiguous images from reading as fractures.
        positive_threshold: 0.80,
        overrides: &[Rule {
            name: "smooth_bone_high_variance",
            conditions: &[
                Condition::below(EdgeDensity, 0.0015),
                Condition::above(Variance, 3000.0),
            ],
            class: Negative,
            confidence: 90.0,
        }],
    },
};

pub static TB_CASCADE: Cascade = Cascade {
    mode: DiseaseMode::Tuberculosis,
    rules: &[Rule {
        name: "high_variance",
        conditions: &[Condition::above(Variance, 2500.0)],
        class: Positive,
        confidence: 87.5,
    }],
    fallback: Fallback {
        // Below the natural 0.5 to favour sensitivity.
        positive_threshold: 0.4,
        overrides: &[Rule {
            name: "elevated_variance_dark_fields",
            conditions: &[
                Condition::above(Variance, 2000.0),
                Condition::below(MeanIntensity, 150.0),
            ],
            class: Positive,
            confidence: 75.0,
        }],
    },
};

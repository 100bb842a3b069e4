pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod explain;
pub mod features;
pub mod loader;
pub mod models;
pub mod rules;

pub use classifier::{Classifier, ClassifierAdapter, ClassifierRegistry, ModelStatus, TreeEnsemble};
pub use config::EngineConfig;
pub use engine::{Diagnosis, DiagnosticEngine, Stage};
pub use error::{EngineError, Result};
pub use loader::RawImage;
pub use models::{
    ClassProbabilities, DecisionPath, DiseaseMode, Explanation, FeatureExplanation, FeatureName,
    FeatureVector, Importance, Label, PredictedClass, Verdict,
};
pub use rules::{Cascade, Decision};

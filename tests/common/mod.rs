mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from radiodx for tests
pub use radiodx::{
    ClassProbabilities, Classifier, ClassifierRegistry, DecisionPath, DiagnosticEngine,
    DiseaseMode, EngineError, FeatureName, FeatureVector, Label, PredictedClass,
};

use std::path::PathBuf;

use thiserror::Error;

use crate::models::DiseaseMode;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Image not found: {}", path.display())]
    ImageNotFound { path: PathBuf },

    #[error("Failed to decode {source_name} as a grayscale image: {source}")]
    ImageDecode {
        source_name: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to extract {feature} for {mode}: {reason}")]
    FeatureExtraction {
        mode: DiseaseMode,
        feature: &'static str,
        reason: String,
    },

    #[error("No classifier available for {mode}: {reason}")]
    ModelUnavailable { mode: DiseaseMode, reason: String },

    #[error("Invalid disease mode '{0}', expected 'fracture' or 'tb'")]
    InvalidDiseaseMode(String),

    #[error("Classifier for {mode} failed: {reason}")]
    Classifier { mode: DiseaseMode, reason: String },
}

impl EngineError {
    /// True when the failure comes from deployment (a missing or broken
    /// model) rather than from the request's input.
    pub fn is_deployment_issue(&self) -> bool {
        matches!(self, EngineError::ModelUnavailable { .. })
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

pub mod interpret;
pub mod preprocessing;
pub mod steps;

use std::sync::Arc;

use crate::error::{EngineError, Result};
use crate::loader::RawImage;
use crate::models::{DiseaseMode, FeatureExplanation, FeatureVector};
use steps::{
    ContrastParams, EdgeDensityStep, ExtractionContext, FeatureStep, LungDensityStep,
    MeanIntensityStep, VarianceStep,
};

const TEXTURE_POINTS: usize = 24;
const TEXTURE_RADIUS: f64 = 3.0;
const TEXTURE_BINS: usize = 10;

/// Everything the extractor learned about one image
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub features: FeatureVector,
    pub explanations: Vec<FeatureExplanation>,
    /// Normalised uniform-LBP histogram, tuberculosis mode only
    pub texture: Option<Vec<f64>>,
}

/// Ordered list of feature steps for one disease mode
pub struct FeaturePipeline {
    mode: DiseaseMode,
    steps: Vec<Arc<dyn FeatureStep>>,
    contrast: ContrastParams,
    texture: bool,
}

impl FeaturePipeline {
    /// Empty pipeline for a mode
    pub fn new(mode: DiseaseMode) -> Self {
        Self {
            mode,
            steps: Vec::new(),
            contrast: ContrastParams::default(),
            texture: false,
        }
    }

    /// Standard feature set for a mode
    pub fn for_mode(mode: DiseaseMode) -> Self {
        let pipeline = Self::new(mode)
            .add_step(Arc::new(MeanIntensityStep))
            .add_step(Arc::new(VarianceStep));
        match mode {
            DiseaseMode::Fracture => pipeline.add_step(Arc::new(EdgeDensityStep::default())),
            DiseaseMode::Tuberculosis => pipeline
                .add_step(Arc::new(LungDensityStep))
                .with_texture(true),
        }
    }

    pub fn add_step(mut self, step: Arc<dyn FeatureStep>) -> Self {
        self.steps.push(step);
        self
    }

    /// Also compute the texture histogram
    pub fn with_texture(mut self, texture: bool) -> Self {
        self.texture = texture;
        self
    }

    pub fn extract(&self, image: &RawImage) -> Result<Extraction> {
        if image.pixel_count() == 0 {
            return Err(EngineError::FeatureExtraction {
                mode: self.mode,
                feature: "image",
                reason: format!("degenerate {}x{} image", image.width(), image.height()),
            });
        }

        let context = ExtractionContext::new(image, self.contrast);
        let mut features = FeatureVector::new();
        let mut explanations = Vec::with_capacity(self.steps.len());

        for step in &self.steps {
            let feature = step.feature();
            let fail = |reason: String| EngineError::FeatureExtraction {
                mode: self.mode,
                feature: feature.as_str(),
                reason,
            };

            let value = step.compute(&context).map_err(fail)?;
            features
                .insert(feature, value)
                .map_err(|v| fail(format!("non-finite value {v}")))?;
            tracing::debug!(mode = %self.mode, step = step.name(), %feature, value, "feature extracted");

            explanations.push(interpret::explain(feature, value, self.mode));
        }

        let texture = if self.texture {
            let hist = preprocessing::uniform_lbp_histogram(
                context.enhanced(),
                TEXTURE_POINTS,
                TEXTURE_RADIUS,
                TEXTURE_BINS,
            );
            if hist.is_none() {
                tracing::debug!(mode = %self.mode, "no texture codes in range, histogram skipped");
            }
            hist
        } else {
            None
        };

        Ok(Extraction {
            features,
            explanations,
            texture,
        })
    }
}

/// Extract the standard feature set for `mode`
pub fn extract(image: &RawImage, mode: DiseaseMode) -> Result<Extraction> {
    FeaturePipeline::for_mode(mode).extract(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeatureName;
    use image::{GrayImage, Luma};

    fn gradient() -> RawImage {
        RawImage::from_gray(GrayImage::from_fn(48, 48, |x, y| Luma([((x * 5 + y) % 256) as u8])))
    }

    #[test]
    fn fracture_features_in_order() {
        let out = extract(&gradient(), DiseaseMode::Fracture).unwrap();
        let names: Vec<_> = out.features.names().collect();
        assert_eq!(
            names,
            vec![FeatureName::MeanIntensity, FeatureName::Variance, FeatureName::EdgeDensity]
        );
        assert_eq!(out.explanations.len(), 3);
        assert!(out.texture.is_none());
    }

    fn spots() -> RawImage {
        RawImage::from_gray(GrayImage::from_fn(49, 49, |x, y| {
            if x % 7 == 3 && y % 7 == 3 { Luma([255]) } else { Luma([30]) }
        }))
    }

    #[test]
    fn tb_features_include_lung_density_and_texture() {
        let out = extract(&spots(), DiseaseMode::Tuberculosis).unwrap();
        let ratio = out.features.get(FeatureName::LungDensityRatio).unwrap();
        assert!((0.0..=1.0).contains(&ratio));
        assert!(out.features.get(FeatureName::EdgeDensity).is_none());
        assert_eq!(out.texture.map(|t| t.len()), Some(TEXTURE_BINS));
    }

    #[test]
    fn zero_size_image_is_rejected() {
        let raw = RawImage::from_raw(0, 0, vec![]).unwrap();
        let err = extract(&raw, DiseaseMode::Tuberculosis).unwrap_err();
        assert!(matches!(err, EngineError::FeatureExtraction { feature: "image", .. }));
    }

    struct BrokenStep;

    impl FeatureStep for BrokenStep {
        fn compute(&self, _context: &ExtractionContext) -> std::result::Result<f64, String> {
            Ok(f64::NAN)
        }

        fn feature(&self) -> FeatureName {
            FeatureName::Variance
        }

        fn name(&self) -> &str {
            "Broken"
        }
    }

    #[test]
    fn non_finite_values_fail_extraction() {
        let pipeline = FeaturePipeline::new(DiseaseMode::Fracture).add_step(Arc::new(BrokenStep));
        let err = pipeline.extract(&gradient()).unwrap_err();
        assert!(matches!(err, EngineError::FeatureExtraction { feature: "variance", .. }));
    }
}

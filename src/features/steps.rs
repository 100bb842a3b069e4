use std::cell::OnceCell;

use image::GrayImage;

use crate::features::preprocessing;
use crate::loader::RawImage;
use crate::models::FeatureName;

/// Local contrast enhancement parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContrastParams {
    pub clip_limit: f32,
    pub tiles: u32,
}

impl Default for ContrastParams {
    fn default() -> Self {
        Self {
            clip_limit: 2.0,
            tiles: 8,
        }
    }
}

/// Per-image scratch space shared by the steps of one extraction.
///
/// Intermediate products are computed on first use and reused by later
/// steps.
pub struct ExtractionContext<'a> {
    pub image: &'a RawImage,
    pub contrast: ContrastParams,
    stats: OnceCell<Option<(f64, f64)>>,
    enhanced: OnceCell<GrayImage>,
}

impl<'a> ExtractionContext<'a> {
    pub fn new(image: &'a RawImage, contrast: ContrastParams) -> Self {
        Self {
            image,
            contrast,
            stats: OnceCell::new(),
            enhanced: OnceCell::new(),
        }
    }

    /// `(mean, population variance)` of the raw samples
    pub fn stats(&self) -> Option<(f64, f64)> {
        *self
            .stats
            .get_or_init(|| preprocessing::mean_and_variance(self.image.samples()))
    }

    /// CLAHE-enhanced copy of the image
    pub fn enhanced(&self) -> &GrayImage {
        self.enhanced.get_or_init(|| {
            preprocessing::clahe(self.image.as_gray(), self.contrast.clip_limit, self.contrast.tiles)
        })
    }
}

/// One scalar feature computed from an image
pub trait FeatureStep: Send + Sync {
    /// Compute the value, or describe why it cannot be computed
    fn compute(&self, context: &ExtractionContext) -> Result<f64, String>;

    fn feature(&self) -> FeatureName;

    /// Human-readable name for this step (used in logs)
    fn name(&self) -> &str;
}

pub struct MeanIntensityStep;

impl FeatureStep for MeanIntensityStep {
    fn compute(&self, context: &ExtractionContext) -> Result<f64, String> {
        context
            .stats()
            .map(|(mean, _)| mean)
            .ok_or_else(|| "image has no pixels".to_string())
    }

    fn feature(&self) -> FeatureName {
        FeatureName::MeanIntensity
    }

    fn name(&self) -> &str {
        "Mean Intensity"
    }
}

pub struct VarianceStep;

impl FeatureStep for VarianceStep {
    fn compute(&self, context: &ExtractionContext) -> Result<f64, String> {
        context
            .stats()
            .map(|(_, variance)| variance)
            .ok_or_else(|| "image has no pixels".to_string())
    }

    fn feature(&self) -> FeatureName {
        FeatureName::Variance
    }

    fn name(&self) -> &str {
        "Intensity Variance"
    }
}

/// Share of pixels marked as edges by Canny with fixed hysteresis thresholds
pub struct EdgeDensityStep {
    pub low_threshold: f32,
    pub high_threshold: f32,
}

impl Default for EdgeDensityStep {
    fn default() -> Self {
        Self {
            low_threshold: 100.0,
            high_threshold: 200.0,
        }
    }
}

impl FeatureStep for EdgeDensityStep {
    fn compute(&self, context: &ExtractionContext) -> Result<f64, String> {
        let edges = preprocessing::detect_edges(
            context.image.as_gray(),
            self.low_threshold,
            self.high_threshold,
        );
        preprocessing::foreground_ratio(&edges).ok_or_else(|| "edge map is empty".to_string())
    }

    fn feature(&self) -> FeatureName {
        FeatureName::EdgeDensity
    }

    fn name(&self) -> &str {
        "Edge Density"
    }
}

/// Share of pixels above the Otsu level of the contrast-enhanced image
pub struct LungDensityStep;

impl FeatureStep for LungDensityStep {
    fn compute(&self, context: &ExtractionContext) -> Result<f64, String> {
        preprocessing::otsu_foreground_ratio(context.enhanced())
            .ok_or_else(|| "enhanced image is empty".to_string())
    }

    fn feature(&self) -> FeatureName {
        FeatureName::LungDensityRatio
    }

    fn name(&self) -> &str {
        "Lung Density Ratio"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn stats_are_shared_between_steps() {
        let raw = RawImage::from_raw(2, 2, vec![0, 0, 100, 100]).unwrap();
        let ctx = ExtractionContext::new(&raw, ContrastParams::default());
        assert_eq!(MeanIntensityStep.compute(&ctx), Ok(50.0));
        assert_eq!(VarianceStep.compute(&ctx), Ok(2500.0));
    }

    #[test]
    fn edge_density_counts_strong_edges() {
        let img = GrayImage::from_fn(64, 64, |x, _| if x < 32 { Luma([0]) } else { Luma([255]) });
        let raw = RawImage::from_gray(img);
        let ctx = ExtractionContext::new(&raw, ContrastParams::default());
        let density = EdgeDensityStep::default().compute(&ctx).unwrap();
        assert!(density > 0.0 && density < 0.2, "density = {density}");
    }

    #[test]
    fn empty_image_fails() {
        let raw = RawImage::from_raw(0, 0, vec![]).unwrap();
        let ctx = ExtractionContext::new(&raw, ContrastParams::default());
        assert!(MeanIntensityStep.compute(&ctx).is_err());
    }
}

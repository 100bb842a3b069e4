use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{GrayImage, Luma};
use radiodx::{
    ClassProbabilities, Classifier, ClassifierRegistry, DiagnosticEngine, DiseaseMode,
    FeatureName, FeatureVector,
};
use tempfile::NamedTempFile;

/// Classifier that fails the test if it is ever consulted
pub struct PanickingClassifier;

impl Classifier for PanickingClassifier {
    fn predict_proba(&self, _features: &[f64]) -> Result<ClassProbabilities, String> {
        panic!("classifier must not be consulted when a rule decides");
    }
}

/// Classifier that always answers the same P(positive) and counts calls
pub struct FixedClassifier {
    positive: f64,
    calls: AtomicUsize,
}

impl FixedClassifier {
    pub fn new(positive: f64) -> Arc<Self> {
        Arc::new(Self {
            positive,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Classifier for FixedClassifier {
    fn predict_proba(&self, _features: &[f64]) -> Result<ClassProbabilities, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ClassProbabilities::from_positive(self.positive)
    }
}

/// Engine with the same classifier bound to both modes
pub fn engine_with(classifier: Arc<dyn Classifier>) -> DiagnosticEngine {
    let registry = ClassifierRegistry::empty()
        .with_classifier(DiseaseMode::Fracture, classifier.clone())
        .with_classifier(DiseaseMode::Tuberculosis, classifier);
    DiagnosticEngine::new(registry)
}

pub fn fracture_vector(mean: f64, variance: f64, edge_density: f64) -> FeatureVector {
    FeatureVector::new()
        .with(FeatureName::MeanIntensity, mean)
        .and_then(|v| v.with(FeatureName::Variance, variance))
        .and_then(|v| v.with(FeatureName::EdgeDensity, edge_density))
        .expect("finite test features")
}

pub fn tb_vector(mean: f64, variance: f64) -> FeatureVector {
    FeatureVector::new()
        .with(FeatureName::MeanIntensity, mean)
        .and_then(|v| v.with(FeatureName::Variance, variance))
        .expect("finite test features")
}

pub fn flat_image(width: u32, height: u32, value: u8) -> GrayImage {
    GrayImage::from_pixel(width, height, Luma([value]))
}

/// Black and white squares of `cell` pixels
pub fn checkerboard(size: u32, cell: u32) -> GrayImage {
    GrayImage::from_fn(size, size, |x, y| {
        if (x / cell + y / cell) % 2 == 0 {
            Luma([0u8])
        } else {
            Luma([255u8])
        }
    })
}

/// Isolated bright pixels every `spacing` pixels on a black background
pub fn dotted_image(size: u32, spacing: u32) -> GrayImage {
    let offset = spacing / 2;
    GrayImage::from_fn(size, size, |x, y| {
        if x % spacing == offset && y % spacing == offset {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// Reproducible pseudo-random texture
pub fn noise_image(width: u32, height: u32, seed: u32) -> GrayImage {
    let mut state = seed.wrapping_mul(2_654_435_761).max(1);
    GrayImage::from_fn(width, height, |_, _| {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        Luma([(state >> 24) as u8])
    })
}

pub fn png_bytes(img: &GrayImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png)
        .expect("Failed to encode test image");
    buf.into_inner()
}

/// Writes the image as a PNG temp file that is removed when dropped
pub fn write_png(img: &GrayImage) -> NamedTempFile {
    let file = tempfile::Builder::new()
        .suffix(".png")
        .tempfile()
        .expect("Failed to create temp image file");
    img.save_with_format(file.path(), image::ImageFormat::Png)
        .expect("Failed to save test image");
    file
}

use crate::models::{DiseaseMode, FeatureExplanation, FeatureName, Importance};

/// Importance is a property of the feature, not of its value
pub fn importance(feature: FeatureName) -> Importance {
    match feature {
        FeatureName::MeanIntensity => Importance::High,
        FeatureName::Variance => Importance::Medium,
        FeatureName::EdgeDensity => Importance::High,
        FeatureName::LungDensityRatio => Importance::High,
    }
}

pub fn interpret(feature: FeatureName, value: f64, mode: DiseaseMode) -> String {
    match feature {
        FeatureName::MeanIntensity => intensity(value, mode),
        FeatureName::Variance => variance(value, mode),
        FeatureName::EdgeDensity => edge_density(value),
        FeatureName::LungDensityRatio => lung_density(value),
    }
}

pub fn explain(feature: FeatureName, value: f64, mode: DiseaseMode) -> FeatureExplanation {
    FeatureExplanation {
        feature,
        value,
        interpretation: interpret(feature, value, mode),
        importance: importance(feature),
    }
}

fn intensity(mean: f64, mode: DiseaseMode) -> String {
    match mode {
        DiseaseMode::Fracture if mean > 70.0 => {
            "Bright overall exposure consistent with dense, intact bone".to_string()
        }
        DiseaseMode::Fracture => "Low overall brightness; bone contrast may be reduced".to_string(),
        DiseaseMode::Tuberculosis if mean < 150.0 => {
            "Darker lung fields with possible areas of opacity".to_string()
        }
        DiseaseMode::Tuberculosis => "Bright exposure with generally clear lung fields".to_string(),
    }
}

fn variance(variance: f64, mode: DiseaseMode) -> String {
    let high = match mode {
        DiseaseMode::Fracture => 1500.0,
        DiseaseMode::Tuberculosis => 2000.0,
    };
    if variance > high {
        "Elevated variance suggestive of structural irregularity".to_string()
    } else if variance > high / 2.0 {
        "Moderate intensity variation within expected range".to_string()
    } else {
        "Low intensity variation; tissue appears homogeneous".to_string()
    }
}

fn edge_density(density: f64) -> String {
    if density > 0.02 {
        "High edge density indicating sharp discontinuities in bone".to_string()
    } else if density > 0.008 {
        "Moderate edge density; possible cortical disruption".to_string()
    } else if density < 0.003 {
        "Very low edge density consistent with smooth, continuous bone".to_string()
    } else {
        "Low edge density within normal range".to_string()
    }
}

fn lung_density(ratio: f64) -> String {
    let level = if ratio > 0.55 { "High" } else { "Normal" };
    format!("{level} lung density pattern")
}

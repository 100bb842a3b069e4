mod common;

use common::*;
use radiodx::explain;
use radiodx::rules::FRACTURE_CASCADE;
use std::sync::Arc;

#[test]
fn high_edge_density_decides_without_classifier() {
    let engine = engine_with(Arc::new(PanickingClassifier));
    let verdict = engine
        .decide(DiseaseMode::Fracture, &fracture_vector(90.0, 500.0, 0.03), Vec::new())
        .unwrap();

    assert_eq!(verdict.label, Label::Positive);
    assert_eq!(verdict.confidence, 95.0);
    assert_eq!(verdict.decision, DecisionPath::RuleDecided { rule: "high_edge_density" });
}

#[test]
fn fracture_falls_back_to_classifier() {
    let classifier = FixedClassifier::new(0.85);
    let engine = engine_with(classifier.clone());
    let verdict = engine
        .decide(DiseaseMode::Fracture, &fracture_vector(50.0, 1200.0, 0.006), Vec::new())
        .unwrap();

    assert_eq!(classifier.calls(), 1);
    assert_eq!(verdict.label, Label::Positive);
    assert_eq!(verdict.predicted_class, PredictedClass::Positive);
    assert_eq!(verdict.confidence, 85.0);
    assert!(verdict.decision.consulted_classifier());
    assert_eq!(verdict.decision.override_rule(), None);
}

#[test]
fn fracture_cutoff_is_strict() {
    let engine = engine_with(FixedClassifier::new(0.80));
    let verdict = engine
        .decide(DiseaseMode::Fracture, &fracture_vector(50.0, 1200.0, 0.006), Vec::new())
        .unwrap();

    assert_eq!(verdict.label, Label::Negative);
    assert_eq!(verdict.confidence, 20.0);
}

#[test]
fn minimal_edges_wins_before_override_is_reachable() {
    let engine = engine_with(Arc::new(PanickingClassifier));
    let verdict = engine
        .decide(DiseaseMode::Fracture, &fracture_vector(50.0, 3500.0, 0.001), Vec::new())
        .unwrap();

    assert_eq!(verdict.label, Label::Negative);
    assert_eq!(verdict.confidence, 92.0);
    assert_eq!(verdict.decision, DecisionPath::RuleDecided { rule: "minimal_edges" });
}

#[test]
fn smooth_bone_override_replaces_positive_call() {
    let features = fracture_vector(50.0, 3500.0, 0.001);
    let probabilities = ClassProbabilities::from_positive(0.9).unwrap();
    let decision = FRACTURE_CASCADE.fallback.resolve(&features, probabilities);

    assert_eq!(decision.class(), PredictedClass::Negative);
    assert_eq!(explain::confidence(&decision), 90.0);
    assert_eq!(decision.path().override_rule(), Some("smooth_bone_high_variance"));

    let explanation = explain::explain(DiseaseMode::Fracture, &decision);
    assert!(explanation.override_note.is_some());
}

#[test]
fn tb_classifier_above_cutoff_is_tuberculosis() {
    let engine = engine_with(FixedClassifier::new(0.45));
    let verdict = engine
        .decide(DiseaseMode::Tuberculosis, &tb_vector(140.0, 1000.0), Vec::new())
        .unwrap();

    assert_eq!(verdict.label, Label::Tuberculosis);
    assert_eq!(verdict.confidence, 45.0);
    assert_eq!(verdict.explanation.summary, "Tuberculosis for Tuberculosis");
}

#[test]
fn tb_high_variance_decides_without_classifier() {
    let engine = engine_with(Arc::new(PanickingClassifier));
    let verdict = engine
        .decide(DiseaseMode::Tuberculosis, &tb_vector(140.0, 2600.0), Vec::new())
        .unwrap();

    assert_eq!(verdict.label, Label::Tuberculosis);
    assert_eq!(verdict.confidence, 87.5);
}

#[test]
fn tb_dark_high_variance_overrides_normal_call() {
    let classifier = FixedClassifier::new(0.1);
    let engine = engine_with(classifier.clone());
    let verdict = engine
        .decide(DiseaseMode::Tuberculosis, &tb_vector(120.0, 2200.0), Vec::new())
        .unwrap();

    assert_eq!(classifier.calls(), 1);
    assert_eq!(verdict.label, Label::Tuberculosis);
    assert_eq!(verdict.confidence, 75.0);
    assert_eq!(
        verdict.decision.override_rule(),
        Some("elevated_variance_dark_fields")
    );
    let note = verdict.explanation.override_note.unwrap();
    assert!(note.contains("'Normal'"));
}

#[test]
fn bright_fields_keep_classifier_call() {
    let engine = engine_with(FixedClassifier::new(0.1));
    let verdict = engine
        .decide(DiseaseMode::Tuberculosis, &tb_vector(180.0, 2200.0), Vec::new())
        .unwrap();

    assert_eq!(verdict.label, Label::Normal);
    assert_eq!(verdict.confidence, 90.0);
}

#[test]
fn unloaded_mode_is_reported_as_deployment_issue() {
    let engine = DiagnosticEngine::new(ClassifierRegistry::empty());
    let err = engine
        .decide(DiseaseMode::Tuberculosis, &tb_vector(140.0, 1000.0), Vec::new())
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::ModelUnavailable { mode: DiseaseMode::Tuberculosis, .. }
    ));
    assert!(err.is_deployment_issue());
}

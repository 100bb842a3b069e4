use crate::models::{DiseaseMode, Explanation, Label};
use crate::rules::Decision;

/// Presentation confidence in percent.
///
/// Rule decisions report the rule's constant. Classifier decisions report
/// the winning class's own probability, rounded to two decimals.
pub fn confidence(decision: &Decision) -> f64 {
    match decision {
        Decision::Rule(rule) | Decision::Overridden { rule, .. } => rule.confidence,
        Decision::Classifier {
            class,
            probabilities,
            ..
        } => round2(100.0 * probabilities.of(*class)),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn recommendation(mode: DiseaseMode, label: Label) -> &'static str {
    match (mode, label) {
        (DiseaseMode::Fracture, Label::Positive) => {
            "Signs of a possible fracture were found. Immobilise the affected area and consult an \
             orthopaedic specialist; a follow-up radiograph or CT may be needed to confirm."
        }
        (DiseaseMode::Fracture, _) => {
            "No fracture pattern detected. If pain or swelling persists, seek a clinical \
             examination and consider a repeat image from another angle."
        }
        (DiseaseMode::Tuberculosis, Label::Tuberculosis) => {
            "Findings are consistent with tuberculosis. Consult a pulmonologist promptly for \
             sputum testing and confirmatory workup, and limit close contact until assessed."
        }
        (DiseaseMode::Tuberculosis, _) => {
            "No tuberculosis pattern detected. Seek medical advice if cough, fever, night sweats \
             or weight loss continue."
        }
    }
}

/// Build the caller-facing explanation for a decision
pub fn explain(mode: DiseaseMode, decision: &Decision) -> Explanation {
    let label = mode.label(decision.class());
    let rationale = match decision {
        Decision::Rule(rule) => format!("Rule '{}' matched ({})", rule.name, rule.describe()),
        Decision::Classifier {
            probabilities,
            threshold,
            ..
        }
        | Decision::Overridden {
            probabilities,
            threshold,
            ..
        } => format!(
            "Classifier P(positive) = {:.4} against cutoff {}",
            probabilities.positive, threshold
        ),
    };

    let override_note = match decision {
        Decision::Overridden {
            rule,
            classifier_class,
            ..
        } => Some(format!(
            "Classifier call '{}' overridden by rule '{}' ({})",
            mode.label(*classifier_class),
            rule.name,
            rule.describe()
        )),
        _ => None,
    };

    Explanation {
        summary: format!("{} for {}", label, mode.display_name()),
        recommendation: recommendation(mode, label).to_string(),
        rationale,
        override_note,
    }
}

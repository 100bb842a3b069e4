use std::sync::Arc;

use super::{Classifier, ClassifierAdapter, TreeEnsemble};
use crate::config::ModelsConfig;
use crate::error::{EngineError, Result};
use crate::models::DiseaseMode;

/// Outcome of loading the classifier for one mode at startup
#[derive(Debug, Clone)]
pub enum ModelStatus {
    Loaded(ClassifierAdapter),
    Unavailable { reason: String },
}

impl ModelStatus {
    pub fn is_loaded(&self) -> bool {
        matches!(self, ModelStatus::Loaded(_))
    }
}

/// Read-only table of classifiers indexed by mode.
///
/// Built once before serving; requests only ever read from it.
#[derive(Debug, Clone)]
pub struct ClassifierRegistry {
    fracture: ModelStatus,
    tuberculosis: ModelStatus,
}

impl ClassifierRegistry {
    /// Registry with no classifiers
    pub fn empty() -> Self {
        let unconfigured = || ModelStatus::Unavailable {
            reason: "no model configured".to_string(),
        };
        Self {
            fracture: unconfigured(),
            tuberculosis: unconfigured(),
        }
    }

    fn slot_mut(&mut self, mode: DiseaseMode) -> &mut ModelStatus {
        match mode {
            DiseaseMode::Fracture => &mut self.fracture,
            DiseaseMode::Tuberculosis => &mut self.tuberculosis,
        }
    }

    /// Load every configured model file. Failures are recorded per mode
    /// and never abort the other modes.
    pub fn load(models: &ModelsConfig) -> Self {
        let mut registry = Self::empty();
        for mode in DiseaseMode::ALL {
            let Some(path) = models.path(mode) else {
                tracing::warn!(%mode, "no model configured, mode unavailable");
                continue;
            };
            match TreeEnsemble::load_file(path) {
                Ok(model) => {
                    tracing::info!(%mode, path = %path.display(), "classifier loaded");
                    registry = registry.with_classifier(mode, Arc::new(model));
                }
                Err(e) => {
                    tracing::warn!(%mode, path = %path.display(), error = %e, "classifier failed to load");
                    *registry.slot_mut(mode) = ModelStatus::Unavailable {
                        reason: format!("{}: {}", path.display(), e),
                    };
                }
            }
        }
        registry
    }

    /// Bind a classifier to a mode, replacing whatever was there
    pub fn with_classifier(mut self, mode: DiseaseMode, classifier: Arc<dyn Classifier>) -> Self {
        let status = match ClassifierAdapter::new(mode, classifier) {
            Ok(adapter) => ModelStatus::Loaded(adapter),
            Err(e) => {
                tracing::warn!(%mode, error = %e, "classifier rejected");
                ModelStatus::Unavailable {
                    reason: e.to_string(),
                }
            }
        };
        *self.slot_mut(mode) = status;
        self
    }

    pub fn status(&self, mode: DiseaseMode) -> &ModelStatus {
        match mode {
            DiseaseMode::Fracture => &self.fracture,
            DiseaseMode::Tuberculosis => &self.tuberculosis,
        }
    }

    pub fn adapter(&self, mode: DiseaseMode) -> Result<&ClassifierAdapter> {
        match self.status(mode) {
            ModelStatus::Loaded(adapter) => Ok(adapter),
            ModelStatus::Unavailable { reason } => Err(EngineError::ModelUnavailable {
                mode,
                reason: reason.clone(),
            }),
        }
    }

    pub fn available_modes(&self) -> Vec<DiseaseMode> {
        DiseaseMode::ALL
            .into_iter()
            .filter(|mode| self.status(*mode).is_loaded())
            .collect()
    }
}

impl Default for ClassifierRegistry {
    fn default() -> Self {
        Self::empty()
    }
}

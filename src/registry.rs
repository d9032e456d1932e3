use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::classifier::{Classifier, LinearTextModel};
use crate::config::ModelsConfig;
use crate::error::{ModelLoadError, UnknownModelError};

/// Similarity above which an unknown label gets a "did you mean" hint.
const SUGGESTION_SIMILARITY: f64 = 0.8;

/// The six fixed model choices, in menu order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelLabel {
    Japanese,
    Korean,
    English,
    Filipino,
    Spanish,
    Emoji,
}

impl ModelLabel {
    pub const ALL: [ModelLabel; 6] = [
        ModelLabel::Japanese,
        ModelLabel::Korean,
        ModelLabel::English,
        ModelLabel::Filipino,
        ModelLabel::Spanish,
        ModelLabel::Emoji,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelLabel::Japanese => "Japanese",
            ModelLabel::Korean => "Korean",
            ModelLabel::English => "English",
            ModelLabel::Filipino => "Filipino",
            ModelLabel::Spanish => "Spanish",
            ModelLabel::Emoji => "Emoji",
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    fn closest(input: &str) -> Option<ModelLabel> {
        let input = input.to_lowercase();
        ModelLabel::ALL
            .into_iter()
            .map(|label| {
                let score = strsim::jaro_winkler(&input, &label.as_str().to_lowercase());
                (label, score)
            })
            .filter(|(_, score)| *score >= SUGGESTION_SIMILARITY)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(label, _)| label)
    }
}

impl fmt::Display for ModelLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelLabel {
    type Err = UnknownModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelLabel::ALL
            .into_iter()
            .find(|label| label.as_str() == s)
            .ok_or_else(|| UnknownModelError {
                label: s.to_string(),
                suggestion: ModelLabel::closest(s),
            })
    }
}

/// Holds one classifier per [`ModelLabel`]. Built once at startup and shared
/// read-only afterwards.
pub struct ModelRegistry {
    // Indexed by `ModelLabel::index`; always holds all six.
    models: Vec<Box<dyn Classifier>>,
}

impl ModelRegistry {
    /// Deserialize every artifact named by `config`. The first failure aborts
    /// the load.
    pub fn load(config: &ModelsConfig) -> Result<Self, ModelLoadError> {
        let mut models: Vec<(ModelLabel, Box<dyn Classifier>)> = Vec::new();

        for label in ModelLabel::ALL {
            let path = config.artifact_path(label);
            let json = std::fs::read_to_string(&path).map_err(|source| ModelLoadError::Read {
                label,
                path: path.clone(),
                source,
            })?;
            let model = LinearTextModel::from_json(&json).map_err(|source| {
                ModelLoadError::Parse {
                    label,
                    path: path.clone(),
                    source,
                }
            })?;
            model
                .validate()
                .map_err(|reason| ModelLoadError::Invalid {
                    label,
                    path: path.clone(),
                    reason,
                })?;

            tracing::info!(
                model = %label,
                path = %path.display(),
                classes = ?model.classes,
                "loaded model artifact"
            );
            models.push((label, Box::new(model)));
        }

        Self::from_models(models)
    }

    /// Build from already-constructed classifiers. Every label must be
    /// supplied.
    pub fn from_models(
        models: impl IntoIterator<Item = (ModelLabel, Box<dyn Classifier>)>,
    ) -> Result<Self, ModelLoadError> {
        let mut slots: Vec<Option<Box<dyn Classifier>>> =
            ModelLabel::ALL.iter().map(|_| None).collect();
        for (label, model) in models {
            slots[label.index()] = Some(model);
        }

        let mut loaded = Vec::with_capacity(slots.len());
        for (label, slot) in ModelLabel::ALL.into_iter().zip(slots) {
            match slot {
                Some(model) => loaded.push(model),
                None => return Err(ModelLoadError::Missing { label }),
            }
        }

        Ok(Self { models: loaded })
    }

    /// Look up a classifier by its menu label.
    pub fn get(&self, label: &str) -> Result<(ModelLabel, &dyn Classifier), UnknownModelError> {
        let label: ModelLabel = label.parse()?;
        Ok((label, self.model(label)))
    }

    pub fn model(&self, label: ModelLabel) -> &dyn Classifier {
        self.models[label.index()].as_ref()
    }

    pub fn labels(&self) -> [ModelLabel; 6] {
        ModelLabel::ALL
    }
}

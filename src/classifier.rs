//! The classifier contract and the linear TF-IDF models loaded from disk.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::InferenceError;

/// An opaque trained text classifier.
///
/// Both calls take a batch and return one entry per input, aligned with
/// [`Classifier::classes`] for probabilities.
pub trait Classifier: Send + Sync {
    fn classes(&self) -> &[String];

    fn predict(&self, batch: &[&str]) -> Result<Vec<String>, InferenceError>;

    fn predict_proba(&self, batch: &[&str]) -> Result<Vec<Vec<f64>>, InferenceError>;
}

/// Index of the largest value; the first one wins on ties.
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (idx, &value) in values.iter().enumerate() {
        match best {
            Some(current) if value <= values[current] => {}
            _ => best = Some(idx),
        }
    }
    best
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Analyzer {
    #[default]
    Word,
    /// Character n-grams, used for scripts without word spacing.
    Char,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbabilityMode {
    #[default]
    Softmax,
    /// One-vs-rest sigmoids renormalized to sum to one.
    Ovr,
}

fn default_ngram_range() -> (usize, usize) {
    (1, 1)
}

fn default_lowercase() -> bool {
    true
}

fn word_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Emoji name tokens first so ":red_heart:" stays one feature
    PATTERN.get_or_init(|| Regex::new(r":\w+:|\w+").expect("word token pattern is valid"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    #[serde(default)]
    pub analyzer: Analyzer,
    #[serde(default = "default_ngram_range")]
    pub ngram_range: (usize, usize),
    #[serde(default = "default_lowercase")]
    pub lowercase: bool,
    pub vocabulary: HashMap<String, usize>,
    pub idf: Vec<f64>,
}

impl TfidfVectorizer {
    pub fn n_features(&self) -> usize {
        self.idf.len()
    }

    fn terms(&self, document: &str) -> Vec<String> {
        let document = if self.lowercase {
            document.to_lowercase()
        } else {
            document.to_string()
        };
        let (min_n, max_n) = self.ngram_range;

        match self.analyzer {
            Analyzer::Word => {
                let tokens: Vec<&str> = word_pattern()
                    .find_iter(&document)
                    .map(|m| m.as_str())
                    .collect();
                let mut terms = Vec::new();
                for n in min_n..=max_n {
                    if n == 0 {
                        continue;
                    }
                    terms.extend(tokens.windows(n).map(|w| w.join(" ")));
                }
                terms
            }
            Analyzer::Char => {
                let chars: Vec<char> = document
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ")
                    .chars()
                    .collect();
                let mut terms = Vec::new();
                for n in min_n..=max_n {
                    if n == 0 {
                        continue;
                    }
                    terms.extend(chars.windows(n).map(|w| w.iter().collect::<String>()));
                }
                terms
            }
        }
    }

    /// Sparse, L2-normalized TF-IDF vector sorted by feature index.
    pub fn transform(&self, document: &str) -> Vec<(usize, f64)> {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for term in self.terms(document) {
            if let Some(&idx) = self.vocabulary.get(&term) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }

        let mut features: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(idx, tf)| (idx, tf * self.idf[idx]))
            .collect();
        features.sort_by_key(|(idx, _)| *idx);

        let norm = features.iter().map(|(_, x)| x * x).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, value) in &mut features {
                *value /= norm;
            }
        }

        features
    }
}

/// A linear classifier over TF-IDF features, deserialized from a JSON
/// artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearTextModel {
    pub classes: Vec<String>,
    pub vectorizer: TfidfVectorizer,
    /// One row of feature weights per class.
    pub coef: Vec<Vec<f64>>,
    pub intercept: Vec<f64>,
    #[serde(default)]
    pub probability: ProbabilityMode,
}

impl LinearTextModel {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Shape checks; the returned message names the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        let n_classes = self.classes.len();
        let n_features = self.vectorizer.n_features();

        if n_classes == 0 {
            return Err("model has no classes".to_string());
        }
        if self.coef.len() != n_classes {
            return Err(format!(
                "coef has {} rows for {} classes",
                self.coef.len(),
                n_classes
            ));
        }
        if self.intercept.len() != n_classes {
            return Err(format!(
                "intercept has {} entries for {} classes",
                self.intercept.len(),
                n_classes
            ));
        }
        if let Some((row, weights)) = self
            .coef
            .iter()
            .enumerate()
            .find(|(_, weights)| weights.len() != n_features)
        {
            return Err(format!(
                "coef row {} has {} weights, expected {}",
                row,
                weights.len(),
                n_features
            ));
        }
        if let Some((term, idx)) = self
            .vectorizer
            .vocabulary
            .iter()
            .find(|(_, idx)| **idx >= n_features)
        {
            return Err(format!("vocabulary term '{term}' maps to index {idx} out of range"));
        }
        let (min_n, max_n) = self.vectorizer.ngram_range;
        if min_n == 0 || min_n > max_n {
            return Err(format!("invalid ngram_range ({min_n}, {max_n})"));
        }

        Ok(())
    }

    fn decision_function(&self, document: &str) -> Vec<f64> {
        let features = self.vectorizer.transform(document);
        self.coef
            .iter()
            .zip(&self.intercept)
            .map(|(weights, bias)| {
                bias + features
                    .iter()
                    .map(|(idx, value)| weights[*idx] * value)
                    .sum::<f64>()
            })
            .collect()
    }

    fn probabilities(&self, scores: &[f64]) -> Vec<f64> {
        match self.probability {
            ProbabilityMode::Softmax => {
                let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
                let total: f64 = exps.iter().sum();
                exps.into_iter().map(|e| e / total).collect()
            }
            ProbabilityMode::Ovr => {
                let sigmoids: Vec<f64> = scores.iter().map(|s| 1.0 / (1.0 + (-s).exp())).collect();
                let total: f64 = sigmoids.iter().sum();
                if total > 0.0 {
                    sigmoids.into_iter().map(|p| p / total).collect()
                } else {
                    vec![1.0 / scores.len() as f64; scores.len()]
                }
            }
        }
    }
}

impl Classifier for LinearTextModel {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn predict(&self, batch: &[&str]) -> Result<Vec<String>, InferenceError> {
        batch
            .iter()
            .map(|document| {
                let scores = self.decision_function(document);
                argmax(&scores)
                    .map(|idx| self.classes[idx].clone())
                    .ok_or(InferenceError::NonFinite)
            })
            .collect()
    }

    fn predict_proba(&self, batch: &[&str]) -> Result<Vec<Vec<f64>>, InferenceError> {
        Ok(batch
            .iter()
            .map(|document| {
                let scores = self.decision_function(document);
                self.probabilities(&scores)
            })
            .collect())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Three-class word model: "happy" -> joy, "sad" -> sadness, "angry" -> anger.
    pub(crate) fn sample_model() -> LinearTextModel {
        let json = r#"{
            "classes": ["anger", "joy", "sadness"],
            "vectorizer": {
                "analyzer": "word",
                "ngram_range": [1, 1],
                "vocabulary": {"angry": 0, "happy": 1, "sad": 2, ":grinning_face:": 3},
                "idf": [1.0, 1.0, 1.0, 1.0]
            },
            "coef": [
                [4.0, -1.0, 0.0, -1.0],
                [-1.0, 4.0, -1.0, 4.0],
                [0.0, -1.0, 4.0, -1.0]
            ],
            "intercept": [0.0, 0.0, 0.0]
        }"#;
        LinearTextModel::from_json(json).unwrap()
    }

    #[test]
    fn test_argmax_first_occurrence_wins() {
        assert_eq!(argmax(&[0.2, 0.4, 0.4]), Some(1));
        assert_eq!(argmax(&[0.5, 0.5]), Some(0));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_sample_model_is_valid() {
        assert!(sample_model().validate().is_ok());
    }

    #[test]
    fn test_predict_picks_weighted_class() {
        let model = sample_model();
        let labels = model.predict(&["I am so happy", "this is sad"]).unwrap();
        assert_eq!(labels, vec!["joy".to_string(), "sadness".to_string()]);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let model = sample_model();
        let probs = model.predict_proba(&["angry and sad"]).unwrap();
        assert_eq!(probs.len(), 1);
        assert_eq!(probs[0].len(), 3);
        let total: f64 = probs[0].iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_words_give_uniform_softmax() {
        let model = sample_model();
        let probs = &model.predict_proba(&["nothing matches here"]).unwrap()[0];
        for p in probs {
            assert!((p - 1.0 / 3.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_emoji_token_is_one_feature() {
        let model = sample_model();
        let features = model.vectorizer.transform(":grinning_face::grinning_face:");
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].0, 3);
        assert!((features[0].1 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_char_ngrams() {
        let vectorizer = TfidfVectorizer {
            analyzer: Analyzer::Char,
            ngram_range: (1, 2),
            lowercase: true,
            vocabulary: HashMap::from([("嬉".to_string(), 0), ("嬉し".to_string(), 1)]),
            idf: vec![1.0, 2.0],
        };
        let features = vectorizer.transform("嬉しい");
        assert_eq!(features.len(), 2);
        assert!(features[1].1 > features[0].1);
    }

    #[test]
    fn test_ovr_probabilities() {
        let mut model = sample_model();
        model.probability = ProbabilityMode::Ovr;
        let probs = &model.predict_proba(&["happy"]).unwrap()[0];
        let total: f64 = probs.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert_eq!(argmax(probs), Some(1));
    }

    #[test]
    fn test_validate_rejects_bad_shapes() {
        let mut model = sample_model();
        model.coef.pop();
        assert!(model.validate().unwrap_err().contains("coef has 2 rows"));

        let mut model = sample_model();
        model.coef[1].push(0.0);
        assert!(model.validate().unwrap_err().contains("coef row 1"));

        let mut model = sample_model();
        model.vectorizer.vocabulary.insert("extra".to_string(), 9);
        assert!(model.validate().unwrap_err().contains("out of range"));

        let mut model = sample_model();
        model.intercept.clear();
        assert!(model.validate().unwrap_err().contains("intercept"));
    }
}

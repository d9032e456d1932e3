use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::projections::MonitorReport;
use crate::registry::ModelLabel;

/// Menu pages. Every navigation to one of these is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Page {
    Home,
    Monitor,
    About,
}

impl Page {
    pub const ALL: [Page; 3] = [Page::Home, Page::Monitor, Page::About];

    pub fn as_str(&self) -> &'static str {
        match self {
            Page::Home => "Home",
            Page::Monitor => "Monitor",
            Page::About => "About",
        }
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Page {
    type Err = String;

    /// Case-insensitive, so `/pages/home` and `/pages/Home` both work.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Page::ALL
            .into_iter()
            .find(|page| page.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| s.to_string())
    }
}

/// A page navigation, as stored in the event log.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct VisitEvent {
    pub page_name: String,
    pub time_of_visit: DateTime<Utc>,
}

/// A prediction, as stored in the event log.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PredictionEvent {
    /// Normalized input text.
    pub raw_text: String,
    pub prediction: String,
    /// Percentage, 0-100.
    pub probability: f64,
    pub time_of_visit: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PredictionRequest {
    pub text: String,
    pub model: String,
    /// Fraction in [0, 1].
    pub threshold: f64,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ClassProbability {
    pub label: String,
    /// Percentage, 0-100.
    pub probability: f64,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct PredictionResult {
    pub model: ModelLabel,
    pub normalized_text: String,
    pub label: String,
    /// Largest class probability, as a percentage.
    pub confidence: f64,
    /// Every class with its percentage, in model class order. Absent for
    /// "Others".
    pub distribution: Option<Vec<ClassProbability>>,
}

/// Prediction input from API
#[derive(Debug, Deserialize)]
pub struct PredictInput {
    pub text: String,
    pub model: String,
    pub threshold: Option<f64>,
}

/// API Response
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    pub request_id: uuid::Uuid,
    #[serde(flatten)]
    pub result: PredictionResult,
    /// Confidence formatted for display, e.g. `"87.50%"`.
    pub confidence_display: String,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub label: ModelLabel,
    pub classes: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct HomePage {
    pub title: &'static str,
    pub models: Vec<ModelLabel>,
    pub default_threshold: f64,
}

#[derive(Debug, Serialize)]
pub struct AboutSection {
    pub heading: &'static str,
    pub body: &'static str,
}

/// Body returned by `GET /pages/{page}`.
#[derive(Debug, Serialize)]
#[serde(tag = "page", content = "content")]
pub enum PageContent {
    Home(HomePage),
    Monitor(MonitorReport),
    About(Vec<AboutSection>),
}

use std::collections::HashMap;
use std::hash::Hash;

use serde::Serialize;

use crate::error::StorageError;
use crate::models::{PredictionEvent, VisitEvent};
use crate::store::EventStore;


/// Count records per key. Output order is unspecified; use [`ranked`] for
/// display order.
pub fn count_by<T, K, F>(records: &[T], key_fn: F) -> HashMap<K, usize>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut counts = HashMap::new();
    for record in records {
        *counts.entry(key_fn(record)).or_insert(0) += 1;
    }
    counts
}

/// One bar of a count chart.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct KeyCount {
    pub key: String,
    pub count: usize,
    pub percentage: f64,
}

/// Sort counts by count descending, key ascending on ties.
pub fn ranked(counts: HashMap<String, usize>) -> Vec<KeyCount> {
    let total: usize = counts.values().sum();

    let mut rows: Vec<KeyCount> = counts
        .into_iter()
        .map(|(key, count)| KeyCount {
            key,
            count,
            percentage: if total > 0 {
                (count as f64 / total as f64) * 100.0
            } else {
                0.0
            },
        })
        .collect();

    rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    rows
}

/// Everything the monitor page shows: both logs plus their counts.
#[derive(Debug, Serialize)]
pub struct MonitorReport {
    pub visits: Vec<VisitEvent>,
    pub page_counts: Vec<KeyCount>,
    pub predictions: Vec<PredictionEvent>,
    pub prediction_counts: Vec<KeyCount>,
}

impl MonitorReport {
    pub fn build(store: &EventStore) -> Result<Self, StorageError> {
        let visits = store.list_visits()?;
        let predictions = store.list_predictions()?;

        let page_counts = ranked(count_by(&visits, |v| v.page_name.clone()));
        let prediction_counts = ranked(count_by(&predictions, |p| p.prediction.clone()));

        Ok(Self {
            visits,
            page_counts,
            predictions,
            prediction_counts,
        })
    }
}

// src/analyze/merge.rs
//! Left outer join of classification tags onto the unified collection.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::analyze::classify::ClassificationResult;
use crate::ingest::types::NormalizedPrediction;

/// A prediction plus its topics. `topics == None` means "never classified"
/// (not submitted, dropped by the model, or its batch failed), which is not
/// the same as `Some(vec![])` ("classified, no topics").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MergedPrediction {
    #[serde(flatten)]
    pub prediction: NormalizedPrediction,
    pub topics: Option<Vec<String>>,
}

impl MergedPrediction {
    pub fn is_classified(&self) -> bool {
        self.topics.is_some()
    }
}

/// Every record of `unified` appears exactly once, in input order.
///
/// An id matched by exactly one classification takes its topics. Ids with no
/// match, or matched more than once (ambiguous answer), stay unclassified.
/// Classifications for ids not in `unified` are ignored.
pub fn merge(
    unified: &[NormalizedPrediction],
    classifications: &[ClassificationResult],
) -> Vec<MergedPrediction> {
    let mut by_id: HashMap<&str, (usize, &ClassificationResult)> =
        HashMap::with_capacity(classifications.len());
    for c in classifications {
        by_id
            .entry(c.id.as_str())
            .and_modify(|(n, _)| *n += 1)
            .or_insert((1, c));
    }

    let ambiguous = by_id.values().filter(|(n, _)| *n > 1).count();
    if ambiguous > 0 {
        tracing::warn!(ambiguous, "ids classified more than once left unclassified");
    }

    let merged: Vec<MergedPrediction> = unified
        .iter()
        .map(|p| {
            let topics = match by_id.get(p.id.as_str()) {
                Some((1, c)) => Some(c.topics.clone()),
                _ => None,
            };
            MergedPrediction {
                prediction: p.clone(),
                topics,
            }
        })
        .collect();

    let known: HashSet<&str> = unified.iter().map(|p| p.id.as_str()).collect();
    let unknown_ids = by_id.keys().filter(|id| !known.contains(*id)).count();
    let classified = merged.iter().filter(|m| m.is_classified()).count();
    tracing::info!(
        total = merged.len(),
        classified,
        unknown_ids,
        "merged classifications"
    );
    merged
}

/// Records that went through classification; these are the synthesis input.
pub fn classified_only(merged: Vec<MergedPrediction>) -> Vec<MergedPrediction> {
    merged.into_iter().filter(MergedPrediction::is_classified).collect()
}

//! Append-only evidence: findings, sources, and the tagged log that holds them.
//!
//! Every finding and source lives exactly once in a session-wide
//! [`EvidenceLog`]. A per-sub-question index of positions gives the local
//! view without duplicating storage.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::sub_question::SubQuestionId;
use crate::core::ConfidenceBand;

/// A unit of gathered evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// The evidence itself.
    pub content: String,
    /// Confidence in `0.0..=1.0`.
    pub confidence: f64,
    /// Sub-question this finding answers. Absent in flat mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_question_id: Option<SubQuestionId>,
    /// Global iteration in which the finding was gathered.
    #[serde(default)]
    pub iteration: usize,
}

impl Finding {
    /// Creates an untagged finding.
    #[must_use]
    pub fn new(content: impl Into<String>, confidence: f64) -> Self {
        Self {
            content: content.into(),
            confidence,
            sub_question_id: None,
            iteration: 0,
        }
    }

    /// Confidence band of this finding.
    #[must_use]
    pub fn band(&self) -> ConfidenceBand {
        ConfidenceBand::from_score(self.confidence)
    }
}

/// A reference consulted while producing findings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Human-readable title.
    pub title: String,
    /// Location of the source.
    pub url: String,
    /// Relevance to the task in `0.0..=1.0`.
    #[serde(default)]
    pub relevance: f64,
    /// Sub-question this source supports. Absent in flat mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_question_id: Option<SubQuestionId>,
}

impl Source {
    /// Creates an untagged source.
    #[must_use]
    pub fn new(title: impl Into<String>, url: impl Into<String>, relevance: f64) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            relevance,
            sub_question_id: None,
        }
    }
}

/// Evidence that can be tagged with a sub-question.
pub trait Tagged {
    /// The sub-question this item belongs to, if any.
    fn tag(&self) -> Option<SubQuestionId>;
}

impl Tagged for Finding {
    fn tag(&self) -> Option<SubQuestionId> {
        self.sub_question_id
    }
}

impl Tagged for Source {
    fn tag(&self) -> Option<SubQuestionId> {
        self.sub_question_id
    }
}

/// Append-only arena of evidence with a per-sub-question index.
///
/// Items are never edited or removed once pushed. Serializes as a plain
/// array; the index is rebuilt on deserialization.
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceLog<T> {
    items: Vec<T>,
    index: HashMap<SubQuestionId, Vec<usize>>,
}

impl<T> Default for EvidenceLog<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Tagged> EvidenceLog<T> {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an item and returns its position.
    pub fn push(&mut self, item: T) -> usize {
        let position = self.items.len();
        if let Some(id) = item.tag() {
            self.index.entry(id).or_default().push(position);
        }
        self.items.push(item);
        position
    }

    /// Total number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// All items in insertion order.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Iterates over all items in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Iterates over the items tagged with `id`, in insertion order.
    pub fn tagged(&self, id: SubQuestionId) -> impl Iterator<Item = &T> + '_ {
        self.index
            .get(&id)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .filter_map(|&i| self.items.get(i))
    }

    /// Number of items tagged with `id`.
    #[must_use]
    pub fn count_for(&self, id: SubQuestionId) -> usize {
        self.index.get(&id).map_or(0, Vec::len)
    }

    /// Items in scope: those tagged with `id`, or everything when `None`.
    #[must_use]
    pub fn scope(&self, id: Option<SubQuestionId>) -> Vec<&T> {
        match id {
            Some(id) => self.tagged(id).collect(),
            None => self.items.iter().collect(),
        }
    }
}

impl<T: Tagged> From<Vec<T>> for EvidenceLog<T> {
    fn from(items: Vec<T>) -> Self {
        let mut log = Self::new();
        for item in items {
            log.push(item);
        }
        log
    }
}

impl<T: Serialize> Serialize for EvidenceLog<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de> + Tagged> Deserialize<'de> for EvidenceLog<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<T>::deserialize(deserializer).map(Self::from)
    }
}

/// Mean confidence of `findings`, or 0 when empty.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn average_confidence<'a>(findings: impl IntoIterator<Item = &'a Finding>) -> f64 {
    let (sum, count) = findings
        .into_iter()
        .fold((0.0, 0usize), |(sum, n), f| (sum + f.confidence, n + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

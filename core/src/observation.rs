// Observation store: deduplicated, newest-first tag logs
use crate::payload::Verdict;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashSet, VecDeque};

/// A tag sighting, recorded once per tag id per list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagObservation {
    pub tag_id: String,
    pub first_seen_at: DateTime<Utc>,
    /// Message name the sighting arrived on
    pub source: String,
    pub raw_payload: Value,
}

/// Ordered log keyed by tag id. Front is newest.
#[derive(Debug, Clone, Default)]
pub struct ObservationList {
    entries: VecDeque<TagObservation>,
    seen: HashSet<String>,
}

impl ObservationList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless the tag id is already present. First sighting wins.
    pub fn insert(&mut self, observation: TagObservation) -> bool {
        if self.seen.contains(&observation.tag_id) {
            return false;
        }
        self.seen.insert(observation.tag_id.clone());
        self.entries.push_front(observation);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, tag_id: &str) -> bool {
        self.seen.contains(tag_id)
    }

    pub fn get(&self, tag_id: &str) -> Option<&TagObservation> {
        if !self.contains(tag_id) {
            return None;
        }
        self.entries.iter().find(|o| o.tag_id == tag_id)
    }

    /// Newest first
    pub fn iter(&self) -> impl Iterator<Item = &TagObservation> {
        self.entries.iter()
    }

    /// Up to `limit` newest entries
    pub fn recent(&self, limit: usize) -> Vec<TagObservation> {
        self.entries.iter().take(limit).cloned().collect()
    }

    pub fn tag_ids(&self) -> Vec<&str> {
        self.entries.iter().map(|o| o.tag_id.as_str()).collect()
    }
}

/// The valid and invalid logs. No cross-list exclusion: a tag reported both
/// ways appears in both.
#[derive(Debug, Clone, Default)]
pub struct ObservationStore {
    valid: ObservationList,
    invalid: ObservationList,
}

impl ObservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when a new entry was created
    pub fn insert(
        &mut self,
        list: Verdict,
        tag_id: &str,
        at: DateTime<Utc>,
        source: &str,
        raw_payload: Value,
    ) -> bool {
        self.list_mut(list).insert(TagObservation {
            tag_id: tag_id.to_string(),
            first_seen_at: at,
            source: source.to_string(),
            raw_payload,
        })
    }

    pub fn size(&self, list: Verdict) -> usize {
        self.list(list).len()
    }

    pub fn list(&self, list: Verdict) -> &ObservationList {
        match list {
            Verdict::Valid => &self.valid,
            Verdict::Invalid => &self.invalid,
        }
    }

    fn list_mut(&mut self, list: Verdict) -> &mut ObservationList {
        match list {
            Verdict::Valid => &mut self.valid,
            Verdict::Invalid => &mut self.invalid,
        }
    }
}

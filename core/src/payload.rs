// Tag payload normalizer
//
// Turns a tag-event payload of unknown shape into zero or more
// (tag id, verdict) decisions. Best-effort: nothing here returns an error,
// a payload that yields no tag id is discarded with a diagnostic.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tracing::{debug, warn};

/// `type` marker used by the MQTT-style reader producer
pub const EPC_READ_TYPE: &str = "epc_read";

/// Which observation list a tag belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Valid,
    Invalid,
}

impl Verdict {
    pub fn is_valid(self) -> bool {
        matches!(self, Verdict::Valid)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Valid => "valid",
            Verdict::Invalid => "invalid",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named tag-id extractor. Tried in priority order by the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagField {
    Epc,
    Rfid,
    Tag,
    Id,
}

impl TagField {
    /// Default probing order
    pub const PRIORITY: [TagField; 4] = [TagField::Epc, TagField::Rfid, TagField::Tag, TagField::Id];

    pub fn key(self) -> &'static str {
        match self {
            TagField::Epc => "epc",
            TagField::Rfid => "rfid",
            TagField::Tag => "tag",
            TagField::Id => "id",
        }
    }

    /// Present and non-empty value of this field, rendered as a tag id.
    /// Strings are taken as-is, numbers by their decimal form; anything else
    /// does not match.
    pub fn extract(self, obj: &Map<String, Value>) -> Option<String> {
        match obj.get(self.key())? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Why a payload produced no decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discard {
    /// Object without any usable tag id field
    NoTagId,
    /// Scalar or null payload
    NotAnObject,
    /// Sequence inside a sequence; only one level is fanned out
    NestedSequence,
}

impl fmt::Display for Discard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discard::NoTagId => f.write_str("no tag id field (epc, rfid, tag, id)"),
            Discard::NotAnObject => f.write_str("payload is not an object"),
            Discard::NestedSequence => f.write_str("nested sequence not expanded"),
        }
    }
}

/// One classified tag sighting
#[derive(Debug, Clone, PartialEq)]
pub struct TagDecision {
    pub tag_id: String,
    pub verdict: Verdict,
    /// Field the id was taken from
    pub field: TagField,
    pub raw_payload: Value,
}

impl TagDecision {
    /// Same sighting, verdict fixed by the caller (legacy event names)
    pub fn with_verdict(mut self, verdict: Verdict) -> Self {
        self.verdict = verdict;
        self
    }
}

/// Priority-chain normalizer over generic JSON payloads
#[derive(Debug, Clone)]
pub struct Normalizer {
    extractors: Vec<TagField>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    pub fn new() -> Self {
        Self {
            extractors: TagField::PRIORITY.to_vec(),
        }
    }

    /// Use a custom extractor order
    pub fn with_extractors(extractors: Vec<TagField>) -> Self {
        Self { extractors }
    }

    pub fn extractors(&self) -> &[TagField] {
        &self.extractors
    }

    /// Normalize a payload; sequences fan out one level, each element on its own.
    pub fn normalize(&self, payload: &Value) -> Vec<Result<TagDecision, Discard>> {
        match payload {
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::Array(_) => {
                        warn!(target: "normalizer", "Nested sequence in tag payload; element skipped");
                        Err(Discard::NestedSequence)
                    }
                    other => self.classify(other),
                })
                .collect(),
            other => vec![self.classify(other)],
        }
    }

    /// Classify a single (non-sequence) payload
    pub fn classify(&self, payload: &Value) -> Result<TagDecision, Discard> {
        let Some(obj) = payload.as_object() else {
            warn!(target: "normalizer", payload = %payload, "Tag payload is not an object");
            return Err(Discard::NotAnObject);
        };

        // Strict producer: explicit epc_read records default to invalid
        if let Some(epc) = strict_epc(obj) {
            let verdict = if obj.get("valid") == Some(&Value::Bool(true)) {
                Verdict::Valid
            } else {
                Verdict::Invalid
            };
            debug!(target: "normalizer", tag_id = %epc, %verdict, "epc_read record");
            return Ok(TagDecision {
                tag_id: epc,
                verdict,
                field: TagField::Epc,
                raw_payload: payload.clone(),
            });
        }

        let Some((field, tag_id)) = self.extract_tag_id(obj) else {
            warn!(target: "normalizer", payload = %payload, "Could not extract tag id");
            return Err(Discard::NoTagId);
        };

        let verdict = generic_verdict(obj);
        debug!(target: "normalizer", tag_id = %tag_id, field = field.key(), %verdict, "Tag classified");
        Ok(TagDecision {
            tag_id,
            verdict,
            field,
            raw_payload: payload.clone(),
        })
    }

    /// First extractor that yields a value, in configured order
    pub fn extract_tag_id(&self, obj: &Map<String, Value>) -> Option<(TagField, String)> {
        self.extractors
            .iter()
            .find_map(|field| field.extract(obj).map(|id| (*field, id)))
    }
}

fn strict_epc(obj: &Map<String, Value>) -> Option<String> {
    match obj.get("type") {
        Some(Value::String(t)) if t == EPC_READ_TYPE => TagField::Epc.extract(obj),
        _ => None,
    }
}

// Generic producers: valid unless explicitly marked otherwise
fn generic_verdict(obj: &Map<String, Value>) -> Verdict {
    let flagged_invalid = obj.get("valid") == Some(&Value::Bool(false));
    let status_invalid = matches!(obj.get("status"), Some(Value::String(s)) if s == "invalid");
    if flagged_invalid || status_invalid {
        Verdict::Invalid
    } else {
        Verdict::Valid
    }
}

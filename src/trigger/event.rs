// src/trigger/event.rs
//
// "Document created" events and the typed Terminal record they carry.

use std::collections::HashMap;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value as Json;
use thiserror::Error;

/// A created document: its collection-relative path plus its string fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentCreated {
    /// e.g. `Terminals/North Pier`
    pub document_path: String,
    pub fields: HashMap<String, String>,
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("invalid event payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("document name has no /documents/ segment: {0}")]
    DocumentName(String),
}

/// Firestore document as delivered in trigger payloads.
#[derive(Debug, Deserialize)]
struct FirestoreDocument {
    name: String,
    #[serde(default)]
    fields: HashMap<String, Json>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawEvent {
    Firestore {
        value: FirestoreDocument,
    },
    Flat {
        document: String,
        #[serde(default)]
        data: serde_json::Map<String, Json>,
    },
}

impl DocumentCreated {
    pub fn new(document_path: impl Into<String>, fields: HashMap<String, String>) -> Self {
        Self {
            document_path: document_path.into(),
            fields,
        }
    }

    /// Accepts either the Firestore shape
    /// (`{"value": {"name": ".../documents/Terminals/X", "fields": {"link": {"stringValue": ..}}}}`)
    /// or a flat one (`{"document": "Terminals/X", "data": {"link": ..}}`).
    /// Non-string fields are dropped.
    pub fn from_json(payload: &Json) -> Result<Self, EventError> {
        match RawEvent::deserialize(payload)? {
            RawEvent::Firestore { value } => {
                let path = value
                    .name
                    .split_once("/documents/")
                    .map(|(_, rest)| rest.to_string())
                    .ok_or_else(|| EventError::DocumentName(value.name.clone()))?;
                let fields = value
                    .fields
                    .into_iter()
                    .filter_map(|(k, v)| {
                        v.get("stringValue")
                            .and_then(Json::as_str)
                            .map(|s| (k, s.to_string()))
                    })
                    .collect();
                Ok(Self::new(path, fields))
            }
            RawEvent::Flat { document, data } => {
                let fields = data
                    .into_iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
                    .collect();
                Ok(Self::new(document.trim_matches('/'), fields))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("missing field `{0}`")]
pub struct MissingField(pub &'static str);

/// The two Terminal fields the pipeline reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalRecord {
    pub name: String,
    pub link: String,
}

impl TerminalRecord {
    /// `link` is checked first: without it nothing can happen.
    pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self, MissingField> {
        let get = |key: &'static str| {
            fields
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or(MissingField(key))
        };
        let link = get("link")?;
        let name = get("name")?;
        Ok(Self { name, link })
    }
}

/// Trigger path pattern such as `Terminals/{TerminalName}`; `{..}` matches
/// exactly one path segment.
#[derive(Debug, Clone)]
pub struct DocumentPattern {
    raw: String,
    re: Regex,
}

impl DocumentPattern {
    pub fn parse(pattern: &str) -> Result<Self, regex::Error> {
        let body = pattern
            .trim_matches('/')
            .split('/')
            .map(|seg| {
                if seg.starts_with('{') && seg.ends_with('}') {
                    "[^/]+".to_string()
                } else {
                    regex::escape(seg)
                }
            })
            .collect::<Vec<_>>()
            .join("/");
        let re = Regex::new(&format!("^{body}$"))?;
        Ok(Self {
            raw: pattern.to_string(),
            re,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, document_path: &str) -> bool {
        self.re.is_match(document_path)
    }
}

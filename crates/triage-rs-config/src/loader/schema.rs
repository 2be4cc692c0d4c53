//! Shape checks for a single `triage.json5` layer.
//!
//! Layers are checked before merging so that a typo is reported against the
//! file that introduced it instead of the merged result. Every key is
//! optional at this stage; defaults are filled in by serde afterwards.

use crate::ConfigError;
use serde_json::{Map, Value};

#[derive(Clone, Copy)]
enum Kind {
    Bool,
    /// Non-negative integer.
    Count,
    Number,
    Text,
    TextOrNull,
    OneOf(&'static [&'static str]),
    Section(&'static [Field]),
    /// Array of `{ name, responsibilities }` objects; `name` is required.
    Teams,
}

type Field = (&'static str, Kind);

const ROOT: &[Field] = &[
    ("$schema", Kind::Text),
    ("retrieval", Kind::Section(RETRIEVAL)),
    ("decision", Kind::Section(DECISION)),
    ("fallback", Kind::Section(FALLBACK)),
    ("conversation", Kind::Section(&[("max_turns", Kind::Count)])),
    ("embedding", Kind::Section(EMBEDDING)),
    ("generation", Kind::Section(GENERATION)),
    (
        "ledger",
        Kind::Section(&[("enabled", Kind::Bool), ("path", Kind::TextOrNull)]),
    ),
];

const RETRIEVAL: &[Field] = &[
    ("top_k", Kind::Count),
    ("max_top_k", Kind::Count),
    ("augment_with_history", Kind::Bool),
    ("summarize_query", Kind::Bool),
];

const DECISION: &[Field] = &[
    ("confidence_threshold", Kind::Number),
    ("weighting", Kind::OneOf(&["inverse_distance", "exponential"])),
];

const FALLBACK: &[Field] = &[
    ("timeout_ms", Kind::Count),
    ("advisory_confidence", Kind::Number),
    ("unassigned_team", Kind::Text),
    ("history_window", Kind::Count),
    ("max_context_matches", Kind::Count),
    ("teams", Kind::Teams),
];

const TEAM: &[Field] = &[("name", Kind::Text), ("responsibilities", Kind::Text)];

const EMBEDDING: &[Field] = &[
    ("provider", Kind::OneOf(&["hashed", "http"])),
    ("dimension", Kind::Count),
    ("model", Kind::TextOrNull),
    ("base_url", Kind::TextOrNull),
    ("api_key_env", Kind::TextOrNull),
];

const GENERATION: &[Field] = &[
    ("provider", Kind::OneOf(&["http", "none"])),
    ("model", Kind::TextOrNull),
    ("base_url", Kind::TextOrNull),
    ("api_key_env", Kind::TextOrNull),
];

/// Check one layer; `layer` prefixes the path in any [`ConfigError::InvalidField`].
pub(super) fn validate_layer_schema(value: &Value, layer: &str) -> Result<(), ConfigError> {
    Checker { layer }.check(value, Kind::Section(ROOT), "")
}

struct Checker<'a> {
    layer: &'a str,
}

impl Checker<'_> {
    fn check(&self, value: &Value, kind: Kind, path: &str) -> Result<(), ConfigError> {
        let accepted = match kind {
            Kind::Bool => value.is_boolean(),
            Kind::Count => value.is_u64(),
            Kind::Number => value.is_number(),
            Kind::Text => value.is_string(),
            Kind::TextOrNull => value.is_string() || value.is_null(),
            Kind::OneOf(options) => value.as_str().is_some_and(|text| options.contains(&text)),
            Kind::Section(fields) => return self.section(value, fields, path),
            Kind::Teams => return self.teams(value, path),
        };
        if accepted {
            Ok(())
        } else {
            Err(self.fail(path, &expectation(kind)))
        }
    }

    fn object<'v>(
        &self,
        value: &'v Value,
        path: &str,
    ) -> Result<&'v Map<String, Value>, ConfigError> {
        value
            .as_object()
            .ok_or_else(|| self.fail(path, "expected object"))
    }

    fn section(&self, value: &Value, fields: &[Field], path: &str) -> Result<(), ConfigError> {
        for (key, entry) in self.object(value, path)? {
            let child = child_path(path, key);
            match fields.iter().find(|(name, _)| *name == key.as_str()) {
                Some(&(_, kind)) => self.check(entry, kind, &child)?,
                None => return Err(self.fail(&child, "unknown key")),
            }
        }
        Ok(())
    }

    fn teams(&self, value: &Value, path: &str) -> Result<(), ConfigError> {
        let entries = value
            .as_array()
            .ok_or_else(|| self.fail(path, "expected array"))?;
        for (idx, entry) in entries.iter().enumerate() {
            let entry_path = format!("{path}[{idx}]");
            if !self.object(entry, &entry_path)?.contains_key("name") {
                let name_path = child_path(&entry_path, "name");
                return Err(self.fail(&name_path, "missing required field"));
            }
            self.section(entry, TEAM, &entry_path)?;
        }
        Ok(())
    }

    fn fail(&self, path: &str, message: &str) -> ConfigError {
        let path = if path.is_empty() { "root" } else { path };
        ConfigError::InvalidField {
            path: format!("{}:{path}", self.layer),
            message: message.to_string(),
        }
    }
}

fn expectation(kind: Kind) -> String {
    match kind {
        Kind::Bool => "expected bool".to_string(),
        Kind::Count => "expected non-negative integer".to_string(),
        Kind::Number => "expected number".to_string(),
        Kind::Text => "expected string".to_string(),
        Kind::TextOrNull => "expected string or null".to_string(),
        Kind::OneOf(options) => format!("expected one of: {}", options.join(", ")),
        Kind::Section(_) => "expected object".to_string(),
        Kind::Teams => "expected array".to_string(),
    }
}

fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

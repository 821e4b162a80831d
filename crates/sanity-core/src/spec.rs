//! Check specification parsing and identity.
//!
//! The textual format is a JSON object:
//!
//! ```json
//! { "checker": "symbolic",
//!   "checks": [ { "type": "template-locations" },
//!               { "type": "receivesyncs", "channel": "go" } ] }
//! ```
//!
//! Top-level keys other than `checks` are global parameters merged into every
//! check; keys on a check override globals of the same name.

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::error::{Result, SanityError, SpecParseError};

/// Parameters of one check request, globals already merged in.
pub type CheckParams = BTreeMap<String, Value>;

const CHECKS_KEY: &str = "checks";
const TYPE_KEY: &str = "type";
const DOCUMENT_FRAGMENT: &str = "<document>";

/// Specification text used when a document has none stored.
pub const EMPTY_SPECIFICATION: &str = r#"{"checks": []}"#;

/// One well-formed check request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckRequest {
    /// Short name of the check to run.
    pub check_type: String,

    pub parameters: CheckParams,
}

impl CheckRequest {
    pub fn new(check_type: impl Into<String>) -> Self {
        Self {
            check_type: check_type.into(),
            parameters: CheckParams::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// String parameter, if present and a string.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }

    /// String parameter that must be present and non-empty.
    pub fn require_str(&self, key: &str) -> Result<&str> {
        self.param_str(key)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| SanityError::MissingParameter {
                check: self.check_type.clone(),
                parameter: key.to_string(),
            })
    }
}

/// One positional entry of the specification.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckEntry {
    Check(CheckRequest),

    /// An entry that could not be interpreted; kept in position so the run
    /// reports it where it was declared.
    Malformed { raw: Value, error: SpecParseError },
}

/// Immutable, parsed set of checks to run.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckSpecSet {
    globals: CheckParams,
    entries: Vec<CheckEntry>,
}

impl CheckSpecSet {
    /// Parse specification text.
    ///
    /// Blank text is an empty set. Whole-text problems (invalid JSON, no
    /// `checks` array) are an error; problems local to one entry are kept
    /// as [`CheckEntry::Malformed`].
    pub fn parse(text: &str) -> std::result::Result<Self, SpecParseError> {
        if text.trim().is_empty() {
            return Ok(Self {
                globals: CheckParams::new(),
                entries: Vec::new(),
            });
        }

        let value: Value = serde_json::from_str(text)
            .map_err(|e| SpecParseError::new(DOCUMENT_FRAGMENT, e.to_string()))?;

        let Value::Object(root) = value else {
            return Err(SpecParseError::new(
                DOCUMENT_FRAGMENT,
                "expected a JSON object",
            ));
        };

        let checks = match root.get(CHECKS_KEY) {
            Some(Value::Array(items)) => items.clone(),
            Some(_) => {
                return Err(SpecParseError::new(CHECKS_KEY, "'checks' must be an array"));
            }
            None => {
                return Err(SpecParseError::new(CHECKS_KEY, "missing 'checks' array"));
            }
        };

        let globals: CheckParams = root
            .into_iter()
            .filter(|(key, _)| key != CHECKS_KEY)
            .collect();

        let entries = checks
            .into_iter()
            .enumerate()
            .map(|(index, raw)| parse_entry(index, raw, &globals))
            .collect();

        Ok(Self { globals, entries })
    }

    pub fn entries(&self) -> &[CheckEntry] {
        &self.entries
    }

    pub fn globals(&self) -> &CheckParams {
        &self.globals
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Well-formed requests in declaration order.
    pub fn requests(&self) -> impl Iterator<Item = &CheckRequest> {
        self.entries.iter().filter_map(|entry| match entry {
            CheckEntry::Check(request) => Some(request),
            CheckEntry::Malformed { .. } => None,
        })
    }

    pub fn malformed_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, CheckEntry::Malformed { .. }))
            .count()
    }

    /// Serialize back into the textual format.
    ///
    /// Globals stay at the top level; each check only lists the keys it
    /// overrides. Malformed entries are written back verbatim.
    pub fn to_json(&self) -> Value {
        let mut root: Map<String, Value> = self
            .globals
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let checks = self
            .entries
            .iter()
            .map(|entry| match entry {
                CheckEntry::Check(request) => {
                    let mut obj = Map::new();
                    obj.insert(TYPE_KEY.to_string(), Value::String(request.check_type.clone()));
                    for (key, value) in &request.parameters {
                        if self.globals.get(key) != Some(value) {
                            obj.insert(key.clone(), value.clone());
                        }
                    }
                    Value::Object(obj)
                }
                CheckEntry::Malformed { raw, .. } => raw.clone(),
            })
            .collect();

        root.insert(CHECKS_KEY.to_string(), Value::Array(checks));
        Value::Object(root)
    }

    /// SHA-256 digest of the canonical form.
    ///
    /// Texts that parse to the same check set share a digest regardless of
    /// whitespace or key order.
    pub fn digest(&self) -> String {
        let canonical = self.to_json().to_string();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        hex::encode(hasher.finalize())
    }
}

fn parse_entry(index: usize, raw: Value, globals: &CheckParams) -> CheckEntry {
    let Value::Object(fields) = &raw else {
        return CheckEntry::Malformed {
            error: SpecParseError::new(format!("checks[{index}]"), "expected an object"),
            raw,
        };
    };

    let check_type = fields
        .get(TYPE_KEY)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    let Some(check_type) = check_type else {
        return CheckEntry::Malformed {
            error: SpecParseError::new(
                format!("checks[{index}].{TYPE_KEY}"),
                "missing string field 'type'",
            ),
            raw,
        };
    };

    let mut parameters = globals.clone();
    for (key, value) in fields {
        if key != TYPE_KEY {
            parameters.insert(key.clone(), value.clone());
        }
    }

    CheckEntry::Check(CheckRequest {
        check_type,
        parameters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_checks_in_order() {
        let spec = CheckSpecSet::parse(
            r#"{"checks": [{"type": "template-locations"}, {"type": "receivesyncs", "channel": "go"}]}"#,
        )
        .expect("parse failed");

        assert_eq!(spec.len(), 2);
        let types: Vec<&str> = spec.requests().map(|r| r.check_type.as_str()).collect();
        assert_eq!(types, vec!["template-locations", "receivesyncs"]);
        assert_eq!(spec.requests().nth(1).unwrap().param_str("channel"), Some("go"));
    }

    #[test]
    fn test_globals_merged_and_overridden() {
        let spec = CheckSpecSet::parse(
            r#"{"checker": "symbolic", "checks": [{"type": "a"}, {"type": "b", "checker": "concrete"}]}"#,
        )
        .expect("parse failed");

        let requests: Vec<&CheckRequest> = spec.requests().collect();
        assert_eq!(requests[0].param_str("checker"), Some("symbolic"));
        assert_eq!(requests[1].param_str("checker"), Some("concrete"));
        assert_eq!(spec.globals().get("checker"), Some(&json!("symbolic")));
    }

    #[test]
    fn test_malformed_entry_kept_in_position() {
        let spec = CheckSpecSet::parse(
            r#"{"checks": [{"type": "a"}, {"channel": "go"}, {"type": "c"}]}"#,
        )
        .expect("parse failed");

        assert_eq!(spec.len(), 3);
        assert_eq!(spec.malformed_count(), 1);
        match &spec.entries()[1] {
            CheckEntry::Malformed { error, .. } => {
                assert_eq!(error.fragment, "checks[1].type");
            }
            other => panic!("expected malformed entry, got {:?}", other),
        }
    }

    #[test]
    fn test_non_object_entry_is_malformed() {
        let spec = CheckSpecSet::parse(r#"{"checks": ["template-locations"]}"#).expect("parse failed");
        match &spec.entries()[0] {
            CheckEntry::Malformed { error, .. } => assert_eq!(error.fragment, "checks[0]"),
            other => panic!("expected malformed entry, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_json_is_error() {
        let err = CheckSpecSet::parse("{not json").unwrap_err();
        assert_eq!(err.fragment, "<document>");
    }

    #[test]
    fn test_missing_checks_is_error() {
        let err = CheckSpecSet::parse(r#"{"checker": "symbolic"}"#).unwrap_err();
        assert_eq!(err.fragment, "checks");

        let err = CheckSpecSet::parse(r#"{"checks": {}}"#).unwrap_err();
        assert!(err.reason.contains("must be an array"));

        let err = CheckSpecSet::parse("[1, 2]").unwrap_err();
        assert!(err.reason.contains("JSON object"));
    }

    #[test]
    fn test_blank_text_is_empty_set() {
        let spec = CheckSpecSet::parse("  \n").expect("parse failed");
        assert!(spec.is_empty());
        assert!(CheckSpecSet::parse(EMPTY_SPECIFICATION).unwrap().is_empty());
    }

    #[test]
    fn test_identical_text_is_equivalent() {
        let text = r#"{"checks": [{"type": "receivesyncs", "channel": "go"}]}"#;
        let a = CheckSpecSet::parse(text).unwrap();
        let b = CheckSpecSet::parse(text).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn test_digest_ignores_formatting() {
        let a = CheckSpecSet::parse(r#"{"checks":[{"type":"x","p":1,"q":2}]}"#).unwrap();
        let b = CheckSpecSet::parse("{ \"checks\": [ { \"q\": 2, \"p\": 1, \"type\": \"x\" } ] }").unwrap();
        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn test_digest_order_sensitive() {
        let a = CheckSpecSet::parse(r#"{"checks":[{"type":"x"},{"type":"y"}]}"#).unwrap();
        let b = CheckSpecSet::parse(r#"{"checks":[{"type":"y"},{"type":"x"}]}"#).unwrap();
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn test_to_json_reparses_to_same_set() {
        let text = r#"{"checker": "concrete", "checks": [{"type": "a", "checker": "symbolic"}, 7, {"type": "b"}]}"#;
        let spec = CheckSpecSet::parse(text).unwrap();
        let json = spec.to_json();

        assert_eq!(json["checks"][0]["checker"], json!("symbolic"));
        assert!(json["checks"][2].get("checker").is_none());
        assert_eq!(json["checks"][1], json!(7));

        let reparsed = CheckSpecSet::parse(&json.to_string()).unwrap();
        assert_eq!(spec, reparsed);
    }

    #[test]
    fn test_require_str() {
        let request = CheckRequest::new("receivesyncs").with_param("channel", "");
        let err = request.require_str("channel").unwrap_err();
        assert!(matches!(err, SanityError::MissingParameter { .. }));

        let request = CheckRequest::new("receivesyncs").with_param("channel", "go");
        assert_eq!(request.require_str("channel").unwrap(), "go");
    }
}

//! Schema validation for untyped option maps
//!
//! Steps, targets, and connections all carry free-form `key: value` maps.
//! Each driver and action decodes its map through a [`Schema`]: values are
//! weakly coerced (YAML numbers and bools read fine as strings, string
//! "true"/"false" reads as a bool), defaults fill absent non-required
//! fields, and *every* missing required field is collected so one failure
//! reports the full list.

use std::collections::HashMap;

use serde_yaml::Value;

use crate::error::{Error, Result};

/// A free-form option/input map as it comes out of the manifest.
pub type InputMap = HashMap<String, Value>;

/// Coerce a YAML scalar to a string. Mappings and sequences don't coerce.
pub fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Validating view over one action's (or driver's) input map.
pub struct Schema<'a> {
    action: &'static str,
    map: &'a InputMap,
    missing: Vec<String>,
}

impl<'a> Schema<'a> {
    pub fn new(action: &'static str, map: &'a InputMap) -> Self {
        Self {
            action,
            map,
            missing: Vec::new(),
        }
    }

    /// A required string field. Absent or empty records a violation and
    /// yields an empty string so decoding can continue.
    pub fn required(&mut self, key: &str) -> String {
        match self.opt_string(key) {
            Some(v) if !v.is_empty() => v,
            _ => {
                self.missing.push(key.to_string());
                String::new()
            }
        }
    }

    /// An optional string field with a default for absent or empty values.
    pub fn string(&self, key: &str, default: &str) -> String {
        match self.opt_string(key) {
            Some(v) if !v.is_empty() => v,
            _ => default.to_string(),
        }
    }

    pub fn opt_string(&self, key: &str) -> Option<String> {
        self.map.get(key).and_then(coerce_string)
    }

    pub fn bool(&self, key: &str, default: bool) -> bool {
        match self.map.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => match s.as_str() {
                "true" => true,
                "false" => false,
                _ => default,
            },
            _ => default,
        }
    }

    pub fn u64(&self, key: &str, default: u64) -> u64 {
        match self.map.get(key) {
            Some(Value::Number(n)) => n.as_u64().unwrap_or(default),
            Some(Value::String(s)) => s.parse().unwrap_or(default),
            _ => default,
        }
    }

    pub fn opt_u32(&self, key: &str) -> Option<u32> {
        match self.map.get(key) {
            Some(Value::Number(n)) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        }
    }

    /// A list of strings; a lone scalar reads as a single-element list.
    pub fn string_list(&self, key: &str) -> Vec<String> {
        match self.map.get(key) {
            Some(Value::Sequence(seq)) => seq.iter().filter_map(coerce_string).collect(),
            Some(v) => coerce_string(v).map(|s| vec![s]).unwrap_or_default(),
            None => Vec::new(),
        }
    }

    /// Report every violation collected so far, all at once.
    pub fn finish(self) -> Result<()> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(Error::MissingInput {
                action: self.action,
                fields: self.missing,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, Value)]) -> InputMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn required_present() {
        let m = map(&[("name", Value::String("memcached".into()))]);
        let mut schema = Schema::new("apt.pkg", &m);
        assert_eq!(schema.required("name"), "memcached");
        assert!(schema.finish().is_ok());
    }

    #[test]
    fn missing_required_fields_reported_together() {
        let m = map(&[]);
        let mut schema = Schema::new("apt.source", &m);
        schema.required("name");
        schema.required("uri");
        schema.required("distribution");
        let err = schema.finish().unwrap_err();
        match err {
            Error::MissingInput { action, fields } => {
                assert_eq!(action, "apt.source");
                assert_eq!(fields, vec!["name", "uri", "distribution"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_required_field_is_missing() {
        let m = map(&[("name", Value::String(String::new()))]);
        let mut schema = Schema::new("apt.key", &m);
        schema.required("name");
        assert!(schema.finish().is_err());
    }

    #[test]
    fn weak_coercions() {
        let m = map(&[
            ("minute", Value::Number(0.into())),
            ("sudo", Value::String("true".into())),
            ("timeout", Value::String("30".into())),
        ]);
        let schema = Schema::new("cron.entry", &m);
        assert_eq!(schema.string("minute", "*"), "0");
        assert!(schema.bool("sudo", false));
        assert_eq!(schema.u64("timeout", 0), 30);
    }

    #[test]
    fn defaults_fill_absent_fields() {
        let m = map(&[]);
        let schema = Schema::new("cron.entry", &m);
        assert_eq!(schema.string("state", "present"), "present");
        assert_eq!(schema.string("hour", "*"), "*");
        assert!(schema.bool("refresh", true));
    }
}

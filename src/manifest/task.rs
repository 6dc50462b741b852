//! Tasks, task defaults, and steps

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_yaml::Value;

use crate::options::InputMap;

/// Every step targets this sentinel unless told otherwise; it expands to
/// every declared target at host-resolution time.
pub const ALL_TARGETS: &str = "_all";

/// Fallback concurrency ceiling for a step.
pub const DEFAULT_LIMIT: usize = 5;

/// Inline `key=value` tokens; double-quoted values keep embedded spaces.
static INLINE_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(\S+)=("[^"]*"|\S+)"#).unwrap());

/// An ordered list of steps plus the defaults folded into them.
#[derive(Debug, Clone, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub defaults: TaskDefaults,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Task {
    /// Apply parse-time normalization: inline shorthand expansion on every
    /// step, then defaults folding.
    pub(crate) fn finalize(&mut self) {
        for step in &mut self.steps {
            step.finalize();

            if step.targets == [ALL_TARGETS] && !self.defaults.targets.is_empty() {
                step.targets = self.defaults.targets.clone();
            }

            if step.limit == 0 {
                step.limit = self.defaults.limit;
            }

            if !step.input.contains_key("sudo") {
                if let Some(sudo) = self.defaults.sudo {
                    step.input.insert("sudo".to_string(), Value::Bool(sudo));
                }
            }
        }
    }
}

/// Defaults a task applies to all of its steps.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskDefaults {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub sudo: Option<bool>,
    #[serde(default)]
    pub targets: Vec<String>,
}

impl Default for TaskDefaults {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            sudo: None,
            targets: Vec::new(),
        }
    }
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

/// One declared action/state unit.
#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    pub action: String,
    #[serde(default)]
    pub input: InputMap,
    #[serde(default)]
    pub limit: usize,
    pub name: String,
    #[serde(default)]
    pub notify: Option<String>,
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default)]
    pub timeout: u64,
}

impl Step {
    /// Expand the inline shorthand `"<action> k=v k=v"` into the input
    /// map, and default the target list to the `_all` sentinel.
    pub(crate) fn finalize(&mut self) {
        if let Some((action, params)) = self.action.split_once(char::is_whitespace) {
            self.input = parse_inline(params);
            self.action = action.to_string();
        }

        if self.targets.is_empty() {
            self.targets = vec![ALL_TARGETS.to_string()];
        }
    }

    /// Concurrency ceiling for this step; always at least one worker.
    pub fn effective_limit(&self) -> usize {
        self.limit.max(1)
    }
}

/// Parse inline `key=value` tokens into an input map. Unquoted scalars
/// coerce the same way YAML would, so the shorthand and the structured
/// `input:` form produce identical maps.
pub(crate) fn parse_inline(params: &str) -> InputMap {
    let mut input = InputMap::new();

    for caps in INLINE_PARAM.captures_iter(params) {
        let key = caps[1].to_string();
        let raw = &caps[2];

        let value = if raw.starts_with('"') {
            Value::String(raw.trim_matches('"').to_string())
        } else if raw == "true" {
            Value::Bool(true)
        } else if raw == "false" {
            Value::Bool(false)
        } else if let Ok(n) = raw.parse::<i64>() {
            Value::Number(n.into())
        } else {
            Value::String(raw.to_string())
        };

        input.insert(key, value);
    }

    input
}

//! Declared remote-execution connections

use serde::Deserialize;
use serde_yaml::Value;

use crate::options::InputMap;

/// A named transport declared in a manifest, claiming one or more targets.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionSpec {
    #[serde(skip)]
    pub name: String,
    #[serde(default)]
    pub auth: String,
    #[serde(rename = "type")]
    pub driver: String,
    #[serde(default)]
    pub options: InputMap,
    pub targets: Vec<String>,
}

impl ConnectionSpec {
    /// Synthesized spec backing the implicit `local` connection.
    pub(crate) fn local() -> Self {
        Self {
            name: "local".to_string(),
            auth: String::new(),
            driver: "local".to_string(),
            options: InputMap::new(),
            targets: vec!["local".to_string()],
        }
    }

    /// Stamp the declared name, manifest directory, and auth entry into
    /// the option map so drivers see them alongside the user's options.
    pub(crate) fn finalize(&mut self, name: &str, dir: &str) {
        self.name = name.to_string();
        self.options
            .insert("name".to_string(), Value::String(name.to_string()));
        self.options
            .insert("_dir".to_string(), Value::String(dir.to_string()));
        if !self.auth.is_empty() {
            self.options
                .insert("auth".to_string(), Value::String(self.auth.clone()));
        }
    }

    /// Whether this connection claims the given target.
    pub fn claims(&self, target: &str) -> bool {
        self.targets.iter().any(|t| t == target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_are_required() {
        let err = serde_yaml::from_str::<ConnectionSpec>("type: ssh\n");
        assert!(err.is_err());
    }

    #[test]
    fn claims_matches_declared_targets() {
        let spec: ConnectionSpec =
            serde_yaml::from_str("type: ssh\ntargets: [web, db]\n").unwrap();
        assert!(spec.claims("web"));
        assert!(spec.claims("db"));
        assert!(!spec.claims("cache"));
    }
}

//! Declared host-discovery targets

use std::sync::Mutex;

use serde::Deserialize;
use serde_yaml::Value;

use crate::error::Result;
use crate::options::InputMap;
use crate::targets::{self, DiscoveredHost};

/// A named discovery source declared in a manifest.
///
/// Discovery runs at most once per spec; the result is cached so a task
/// whose steps address the same target repeatedly only pays for one
/// driver round-trip.
#[derive(Debug, Deserialize)]
pub struct TargetSpec {
    #[serde(skip)]
    pub name: String,
    #[serde(default)]
    pub auth: String,
    #[serde(rename = "type")]
    pub driver: String,
    #[serde(default)]
    pub options: InputMap,
    #[serde(skip)]
    discovered: Mutex<Option<Vec<DiscoveredHost>>>,
}

impl TargetSpec {
    /// Synthesized spec backing the implicit `local` target.
    pub(crate) fn local() -> Self {
        Self {
            name: "local".to_string(),
            auth: String::new(),
            driver: "local".to_string(),
            options: InputMap::new(),
            discovered: Mutex::new(None),
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

    /// Run discovery, or return the cached result of an earlier run.
    pub fn discover_hosts(&self) -> Result<Vec<DiscoveredHost>> {
        let mut cache = self.discovered.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(hosts) = cache.as_ref() {
            return Ok(hosts.clone());
        }

        let driver = targets::new(&self.driver, &self.options)?;
        let hosts = driver.discover()?;
        log::debug!(
            "target {} discovered {} host(s)",
            self.name,
            hosts.len()
        );
        *cache = Some(hosts.clone());
        Ok(hosts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_is_memoized() {
        let mut spec: TargetSpec = serde_yaml::from_str("type: local\n").unwrap();
        spec.finalize("workstation", "/tmp");

        let first = spec.discover_hosts().unwrap();
        let second = spec.discover_hosts().unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].name, "local");
    }

    #[test]
    fn finalize_stamps_driver_options() {
        let mut spec: TargetSpec =
            serde_yaml::from_str("type: local\nauth: lab\n").unwrap();
        spec.finalize("lab-hosts", "/srv/yak");

        assert_eq!(spec.options.get("name").and_then(|v| v.as_str()), Some("lab-hosts"));
        assert_eq!(spec.options.get("_dir").and_then(|v| v.as_str()), Some("/srv/yak"));
        assert_eq!(spec.options.get("auth").and_then(|v| v.as_str()), Some("lab"));
    }
}

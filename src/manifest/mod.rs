//! Manifest model: YAML documents, herds, and host resolution
//!
//! A manifest declares variables, notifiers, targets, connections, and
//! tasks keyed as `task::<name>`. A [`Herd`] is the merged view over
//! every manifest in a directory; all cross-references (notify names,
//! step targets, connection claims) resolve herd-wide.

pub mod connection;
pub mod host;
pub mod target;
pub mod task;

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::{Error, Result, ValidationError};

pub use connection::ConnectionSpec;
pub use host::Host;
pub use target::TargetSpec;
pub use task::{Step, Task, ALL_TARGETS};

static TASK_KEY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^task::\w+$").unwrap());

/// One parsed manifest document.
///
/// Any top-level key that is not one of the reserved sections is a task
/// and must be named `task::<name>`.
#[derive(Debug, Deserialize)]
pub struct Manifest {
    #[serde(skip)]
    pub dir: String,

    /// Parsed for forward compatibility; not yet interpolated.
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
    #[serde(default)]
    pub varfiles: Vec<String>,

    #[serde(default)]
    pub notifiers: Vec<Step>,
    #[serde(default)]
    pub targets: BTreeMap<String, TargetSpec>,
    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionSpec>,
    #[serde(flatten)]
    pub tasks: BTreeMap<String, Task>,
}

impl Manifest {
    /// Read and parse a single manifest file. The file's directory is
    /// stamped so path-valued options can resolve relative to it.
    pub fn read_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut manifest: Manifest =
            serde_yaml::from_str(&text).map_err(|source| Error::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        manifest.dir = path
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| ".".to_string());

        Ok(manifest)
    }

    #[cfg(test)]
    pub(crate) fn parse_str(text: &str, dir: &str) -> Result<Self> {
        let mut manifest: Manifest =
            serde_yaml::from_str(text).map_err(|source| Error::Parse {
                path: std::path::PathBuf::from("<inline>"),
                source,
            })?;
        manifest.dir = dir.to_string();
        Ok(manifest)
    }
}

/// The merged, validated view over a set of manifests.
#[derive(Debug)]
pub struct Herd {
    manifests: Vec<Manifest>,
    local_target: TargetSpec,
    local_connection: ConnectionSpec,
}

impl Herd {
    /// Load a herd from manifest files, then normalize and validate it.
    pub fn load(files: &[std::path::PathBuf]) -> Result<Self> {
        let manifests = files
            .iter()
            .map(|f| Manifest::read_file(f))
            .collect::<Result<Vec<_>>>()?;

        Self::from_manifests(manifests)
    }

    pub fn from_manifests(manifests: Vec<Manifest>) -> Result<Self> {
        let mut herd = Self {
            manifests,
            local_target: TargetSpec::local(),
            local_connection: ConnectionSpec::local(),
        };
        herd.validate()?;
        Ok(herd)
    }

    /// Normalize every manifest and enforce herd-wide consistency.
    ///
    /// Pass one finalizes tasks and stamps target/connection specs while
    /// checking that every name is unique across the whole herd. Pass
    /// two checks that every `notify` reference resolves.
    fn validate(&mut self) -> Result<()> {
        let mut notifier_names = HashSet::new();
        let mut step_keys = HashSet::new();
        let mut target_names = HashSet::new();
        let mut connection_names = HashSet::new();

        for manifest in &mut self.manifests {
            let dir = manifest.dir.clone();

            for notifier in &mut manifest.notifiers {
                notifier.finalize();
                if !notifier_names.insert(notifier.name.clone()) {
                    return Err(ValidationError::DuplicateNotifier(notifier.name.clone()).into());
                }
            }

            for (key, task) in &mut manifest.tasks {
                if !TASK_KEY.is_match(key) {
                    return Err(ValidationError::InvalidTaskName(key.clone()).into());
                }

                task.finalize();
                for step in &task.steps {
                    let qualified = format!("{key} {}", step.name);
                    if !step_keys.insert(qualified.clone()) {
                        return Err(ValidationError::DuplicateStep(qualified).into());
                    }
                }
            }

            for (name, spec) in &mut manifest.targets {
                if !target_names.insert(name.clone()) {
                    return Err(ValidationError::DuplicateTarget(name.clone()).into());
                }
                spec.finalize(name, &dir);
            }

            for (name, spec) in &mut manifest.connections {
                if !connection_names.insert(name.clone()) {
                    return Err(ValidationError::DuplicateConnection(name.clone()).into());
                }
                spec.finalize(name, &dir);
            }
        }

        for manifest in &self.manifests {
            for task in manifest.tasks.values() {
                for step in &task.steps {
                    if let Some(notify) = &step.notify {
                        if !notifier_names.contains(notify) {
                            return Err(ValidationError::MissingNotifier(notify.clone()).into());
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// The steps of `task::<name>`, in declaration order.
    pub fn steps_for_task(&self, task: &str) -> Result<&[Step]> {
        let key = format!("task::{task}");
        for manifest in &self.manifests {
            if let Some(t) = manifest.tasks.get(&key) {
                return Ok(&t.steps);
            }
        }
        Err(ValidationError::TaskNotFound(task.to_string()).into())
    }

    /// Look up a notifier step by name.
    pub fn notifier(&self, name: &str) -> Result<&Step> {
        for manifest in &self.manifests {
            if let Some(n) = manifest.notifiers.iter().find(|n| n.name == name) {
                return Ok(n);
            }
        }
        Err(ValidationError::NotifierNotFound(name.to_string()).into())
    }

    /// Look up a target by name. `local` always resolves, declared or not.
    pub fn target(&self, name: &str) -> Result<&TargetSpec> {
        if name == "local" {
            return Ok(&self.local_target);
        }

        for manifest in &self.manifests {
            if let Some(t) = manifest.targets.get(name) {
                return Ok(t);
            }
        }
        Err(ValidationError::TargetNotFound(name.to_string()).into())
    }

    /// The connection that claims a target. `local` always resolves to
    /// the implicit local connection.
    pub fn connection_for_target(&self, target_name: &str) -> Result<&ConnectionSpec> {
        if target_name == "local" {
            return Ok(&self.local_connection);
        }

        for manifest in &self.manifests {
            if let Some(c) = manifest.connections.values().find(|c| c.claims(target_name)) {
                return Ok(c);
            }
        }
        Err(ValidationError::ConnectionNotFound(target_name.to_string()).into())
    }

    /// Every declared target across the herd.
    pub fn list_targets(&self) -> impl Iterator<Item = &TargetSpec> {
        self.manifests.iter().flat_map(|m| m.targets.values())
    }

    /// Every declared connection across the herd.
    pub fn list_connections(&self) -> impl Iterator<Item = &ConnectionSpec> {
        self.manifests.iter().flat_map(|m| m.connections.values())
    }

    /// Resolve a step's target list into hosts, each already bound to a
    /// constructed connection driver. Discovery is memoized per target,
    /// so repeated steps against the same target reuse the first result.
    pub fn hosts_for_step(&self, step: &Step) -> Result<Vec<Host>> {
        let mut selected: BTreeMap<&str, &TargetSpec> = BTreeMap::new();

        for target_name in &step.targets {
            if target_name == ALL_TARGETS {
                for spec in self.list_targets() {
                    selected.insert(spec.name.as_str(), spec);
                }
            } else {
                let spec = self.target(target_name)?;
                selected.insert(spec.name.as_str(), spec);
            }
        }

        let mut hosts = Vec::new();
        for (target_name, spec) in selected {
            let discovered = spec.discover_hosts()?;
            let conn_spec = self.connection_for_target(target_name)?;

            for dh in &discovered {
                hosts.push(Host::bind(dh, target_name, conn_spec)?);
            }
        }

        Ok(hosts)
    }
}

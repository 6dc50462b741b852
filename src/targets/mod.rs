//! Host-discovery drivers
//!
//! A Target turns a named inventory source into a list of hosts. Drivers
//! implement [`Target`] and are built through the closed registry in
//! [`new`], keyed by the `type` string from the manifest.

use std::collections::HashMap;

use crate::error::{Error, Result};

pub mod local;
pub mod textfile;

pub use local::Local;
pub use textfile::TextFile;

/// A host as discovered, before a connection is bound to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredHost {
    pub name: String,
    pub address: String,
}

/// Host discovery for one inventory source.
pub trait Target: Send + Sync {
    fn discover(&self) -> Result<Vec<DiscoveredHost>>;
}

/// Build a target from a driver key and its option map.
pub fn new(
    target_type: &str,
    options: &HashMap<String, serde_yaml::Value>,
) -> Result<Box<dyn Target>> {
    match target_type {
        "" => Err(Error::UnsupportedDriver {
            kind: "target",
            name: "(none)".to_string(),
        }),
        "local" => Ok(Box::new(Local)),
        "textfile" => Ok(Box::new(TextFile::new(options)?)),
        other => Err(Error::UnsupportedDriver {
            kind: "target",
            name: other.to_string(),
        }),
    }
}

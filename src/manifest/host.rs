//! Hosts bound to a live connection driver

use std::fmt;
use std::sync::Arc;

use serde_yaml::Value;

use crate::connections::{self, Connection};
use crate::error::Result;
use crate::manifest::connection::ConnectionSpec;
use crate::targets::DiscoveredHost;

/// A discovered host paired with the connection that reaches it.
///
/// Binding happens once, before any step work fans out, so the
/// concurrent execution path never constructs drivers.
#[derive(Clone)]
pub struct Host {
    pub name: String,
    pub address: String,
    pub target_name: String,
    pub connection_name: String,
    pub connection_type: String,
    pub connection: Arc<dyn Connection>,
}

impl Host {
    /// Bind a discovered host to its connection spec, constructing the
    /// driver with the host address folded into the spec's options.
    pub(crate) fn bind(
        discovered: &DiscoveredHost,
        target_name: &str,
        spec: &ConnectionSpec,
    ) -> Result<Self> {
        let mut options = spec.options.clone();
        options.insert(
            "host".to_string(),
            Value::String(discovered.address.clone()),
        );

        let connection = connections::new(&spec.driver, &options)?;

        Ok(Self {
            name: discovered.name.clone(),
            address: discovered.address.clone(),
            target_name: target_name.to_string(),
            connection_name: spec.name.clone(),
            connection_type: spec.driver.to_string(),
            connection: Arc::from(connection),
        })
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("target_name", &self.target_name)
            .field("connection_name", &self.connection_name)
            .field("connection_type", &self.connection_type)
            .finish()
    }
}

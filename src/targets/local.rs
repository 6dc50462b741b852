//! Local target driver

use crate::error::Result;
use crate::targets::{DiscoveredHost, Target};

/// Yields the single host `local`, for pairing with the `local`
/// connection driver. All options are ignored.
#[derive(Debug, Clone, Copy)]
pub struct Local;

impl Target for Local {
    fn discover(&self) -> Result<Vec<DiscoveredHost>> {
        Ok(vec![DiscoveredHost {
            name: "local".to_string(),
            address: "local".to_string(),
        }])
    }
}

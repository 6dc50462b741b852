//! Declared end-states for reconciled resources

use serde::{Deserialize, Serialize};
use std::fmt;

/// The state a step declares for a resource.
///
/// `Latest` and `Pinned` only make sense for versioned resources
/// (packages); everything else uses `Present`/`Absent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeclaredState {
    /// Resource must exist
    Present,
    /// Resource must not exist
    Absent,
    /// Resource must exist at the newest available version
    Latest,
    /// Resource must exist at a specific version
    Pinned(String),
}

impl DeclaredState {
    /// Parse the `state` input field. Empty strings mean `present`;
    /// anything that isn't a keyword is a pinned version.
    pub fn parse(s: &str) -> Self {
        match s {
            "" | "present" => Self::Present,
            "absent" => Self::Absent,
            "latest" => Self::Latest,
            v => Self::Pinned(v.to_string()),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl Default for DeclaredState {
    fn default() -> Self {
        Self::Present
    }
}

impl fmt::Display for DeclaredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present => write!(f, "present"),
            Self::Absent => write!(f, "absent"),
            Self::Latest => write!(f, "latest"),
            Self::Pinned(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_keywords() {
        assert_eq!(DeclaredState::parse(""), DeclaredState::Present);
        assert_eq!(DeclaredState::parse("present"), DeclaredState::Present);
        assert_eq!(DeclaredState::parse("absent"), DeclaredState::Absent);
        assert_eq!(DeclaredState::parse("latest"), DeclaredState::Latest);
    }

    #[test]
    fn parse_version_pin() {
        assert_eq!(
            DeclaredState::parse("2.1-1"),
            DeclaredState::Pinned("2.1-1".to_string())
        );
    }
}

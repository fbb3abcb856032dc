use serde::{Deserialize, Serialize};

use crate::{direction::Direction, error::Result};

/// Container configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusConfig {
    /// Direction used by [`Container::focus_default`](crate::Container::focus_default).
    pub default_direction: Direction,
    /// Warn when a participant mounts without a focus source.
    pub warn_on_absent_source: bool,
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            default_direction: Direction::Forward,
            warn_on_absent_source: true,
        }
    }
}

impl FocusConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

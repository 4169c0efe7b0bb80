use serde::Deserialize;

use crate::Config;
use crate::shared::{MarkerConfig, MySqlConnectionConfig, ValidationError};

/// Which logs of the candidate replica are searched for its newest marker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSelection {
    /// Primary logs first, relay logs when no primary log holds a marker.
    #[default]
    Auto,
    /// Primary logs only.
    Primary,
    /// Relay logs only.
    Relay,
}

/// Complete configuration of the matcher binary.
///
/// Not [`serde::Serialize`] to avoid leaking the connection passwords.
#[derive(Debug, Clone, Deserialize)]
pub struct MatcherServiceConfig {
    /// The candidate replica whose position is translated.
    pub instance: MySqlConnectionConfig,
    /// The intended source server the position is translated onto.
    pub source: MySqlConnectionConfig,
    /// Marker recognition and scanning settings.
    pub marker: MarkerConfig,
    /// Which logs of the candidate replica are searched.
    #[serde(default)]
    pub log_selection: LogSelection,
}

impl MatcherServiceConfig {
    /// Validates every component of the configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.instance.validate()?;
        self.source.validate()?;
        self.marker.validate()
    }
}

impl Config for MatcherServiceConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &["marker.skip_event_kinds"];
}

use clap::ValueEnum;
use pgtid_config::load_config;
use pgtid_config::shared::{LogSelection, MatcherServiceConfig};

use crate::error::{MatcherError, MatcherResult};

/// Command line spelling of [`LogSelection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogSelectionArg {
    Auto,
    Primary,
    Relay,
}

impl From<LogSelectionArg> for LogSelection {
    fn from(value: LogSelectionArg) -> Self {
        match value {
            LogSelectionArg::Auto => LogSelection::Auto,
            LogSelectionArg::Primary => LogSelection::Primary,
            LogSelectionArg::Relay => LogSelection::Relay,
        }
    }
}

/// Loads and validates the matcher configuration.
///
/// A log selection given on the command line replaces the configured one.
pub fn load_matcher_config(
    log_selection: Option<LogSelectionArg>,
) -> MatcherResult<MatcherServiceConfig> {
    let mut config = load_config::<MatcherServiceConfig>().map_err(MatcherError::config)?;
    config.validate().map_err(MatcherError::config)?;

    if let Some(log_selection) = log_selection {
        config.log_selection = log_selection.into();
    }

    Ok(config)
}

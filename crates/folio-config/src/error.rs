//! Errors raised while loading Folio configuration.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// A layer could not be read, or its values do not fit `FolioConfig`.
    #[error("failed to load Folio configuration: {0}")]
    Figment(#[from] figment::Error),

    /// A setting the caller needs has no value in any layer.
    #[error("'{key}' is not set; add it to .folio/config.toml or export {}", env_var(.key))]
    NotConfigured { key: String },

    /// A setting is present but out of range.
    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}

/// The `FOLIO_*` variable that sets a dotted config key.
fn env_var(key: &str) -> String {
    format!("FOLIO_{}", key.replace('.', "__").to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_setting_names_its_env_var() {
        let error = ConfigError::NotConfigured {
            key: "sandbox.interpreter".into(),
        };
        assert_eq!(
            error.to_string(),
            "'sandbox.interpreter' is not set; add it to .folio/config.toml or export FOLIO_SANDBOX__INTERPRETER"
        );
    }

    #[test]
    fn invalid_value_names_the_key() {
        let error = ConfigError::InvalidValue {
            key: "jobs.poll_interval_ms".into(),
            reason: "must be greater than zero".into(),
        };
        assert_eq!(
            error.to_string(),
            "invalid value for 'jobs.poll_interval_ms': must be greater than zero"
        );
    }
}

//! Script sandbox configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ConfigError;

const fn default_timeout_ms() -> u64 {
    2_000
}

const fn default_max_output_bytes() -> usize {
    1024 * 1024
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SandboxConfig {
    /// Execution budget for a single function call.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Interpreter argv for the out-of-process runtime (e.g. `["node", "runner.js"]`).
    /// Empty means no out-of-process runtime is configured.
    #[serde(default)]
    pub interpreter: Vec<String>,

    /// Upper bound on bytes read from an interpreter's stdout.
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

impl SandboxConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Returns `true` if an out-of-process interpreter is configured.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.interpreter.first().is_some_and(|program| !program.is_empty())
    }

    /// Split the interpreter argv into program and arguments.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotConfigured` if no interpreter is set.
    pub fn interpreter_command(&self) -> Result<(&str, &[String]), ConfigError> {
        match self.interpreter.split_first() {
            Some((program, args)) if !program.is_empty() => Ok((program.as_str(), args)),
            _ => Err(ConfigError::NotConfigured {
                key: "sandbox.interpreter".into(),
            }),
        }
    }

    /// Check value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for a zero budget or output limit.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "sandbox.timeout_ms".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if self.max_output_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "sandbox.max_output_bytes".into(),
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            interpreter: Vec::new(),
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_correct() {
        let config = SandboxConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(2));
        assert!(!config.is_configured());
        assert_eq!(config.max_output_bytes, 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn interpreter_command_splits_argv() {
        let config = SandboxConfig {
            interpreter: vec!["node".into(), "runner.js".into()],
            ..SandboxConfig::default()
        };
        let (program, args) = config.interpreter_command().unwrap();
        assert_eq!(program, "node");
        assert_eq!(args, ["runner.js".to_string()]);
    }

    #[test]
    fn missing_interpreter_is_not_configured() {
        let config = SandboxConfig::default();
        assert!(matches!(
            config.interpreter_command(),
            Err(ConfigError::NotConfigured { .. })
        ));
    }

    #[test]
    fn zero_budget_is_invalid() {
        let config = SandboxConfig {
            timeout_ms: 0,
            ..SandboxConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "sandbox.timeout_ms"
        ));
    }
}

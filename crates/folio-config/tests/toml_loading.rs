//! Integration tests for TOML configuration loading.
//!
//! Uses figment::Jail for safe, sandboxed env var manipulation.

use figment::{
    Figment, Jail,
    providers::{Env, Format, Serialized, Toml},
};
use folio_config::{ConfigError, FolioConfig, StuckJobPolicy};
use pretty_assertions::assert_eq;

#[test]
fn loads_all_sections_from_toml() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
[database]
path = "/var/lib/folio/folio.db"
busy_timeout_ms = 250

[sandbox]
timeout_ms = 750
interpreter = ["node", "/opt/folio/runner.js"]
max_output_bytes = 4096

[jobs]
poll_interval_ms = 100
stuck_job_policy = "requeue"
stuck_after_secs = 600
"#,
        )?;

        let config: FolioConfig = Figment::from(Serialized::defaults(FolioConfig::default()))
            .merge(Toml::file("config.toml"))
            .extract()?;

        assert_eq!(config.database.path, "/var/lib/folio/folio.db");
        assert_eq!(config.database.busy_timeout_ms, 250);
        assert_eq!(config.sandbox.timeout_ms, 750);
        assert_eq!(
            config.sandbox.interpreter,
            vec!["node".to_string(), "/opt/folio/runner.js".to_string()]
        );
        assert!(config.sandbox.is_configured());
        assert_eq!(config.sandbox.max_output_bytes, 4096);
        assert_eq!(config.jobs.poll_interval_ms, 100);
        assert_eq!(config.jobs.stuck_job_policy, StuckJobPolicy::Requeue);
        assert_eq!(config.jobs.stuck_after_secs, 600);
        Ok(())
    });
}

#[test]
fn partial_toml_keeps_defaults() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
[jobs]
stuck_job_policy = "fail"
"#,
        )?;

        let config: FolioConfig = Figment::from(Serialized::defaults(FolioConfig::default()))
            .merge(Toml::file("config.toml"))
            .extract()?;

        assert_eq!(config.jobs.stuck_job_policy, StuckJobPolicy::Fail);
        assert_eq!(config.jobs.stuck_after_secs, 3_600);
        assert_eq!(config.database.path, ".folio/folio.db");
        assert_eq!(config.sandbox.timeout_ms, 2_000);
        Ok(())
    });
}

#[test]
fn env_overrides_toml() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
[database]
path = "from-toml.db"
"#,
        )?;
        jail.set_env("FOLIO_DATABASE__PATH", "from-env.db");

        let config: FolioConfig = Figment::from(Serialized::defaults(FolioConfig::default()))
            .merge(Toml::file("config.toml"))
            .merge(Env::prefixed("FOLIO_").split("__"))
            .extract()?;

        assert_eq!(config.database.path, "from-env.db");
        Ok(())
    });
}

#[test]
fn project_local_config_is_picked_up() {
    Jail::expect_with(|jail| {
        jail.create_dir(".folio")?;
        jail.create_file(
            ".folio/config.toml",
            r#"
[sandbox]
timeout_ms = 42
"#,
        )?;

        let config = FolioConfig::load().expect("config loads");
        assert_eq!(config.sandbox.timeout_ms, 42);
        Ok(())
    });
}

#[test]
fn zero_timeout_is_rejected() {
    Jail::expect_with(|jail| {
        jail.set_env("FOLIO_SANDBOX__TIMEOUT_MS", "0");

        let result = FolioConfig::load();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "sandbox.timeout_ms"
        ));
        Ok(())
    });
}

#[test]
fn unknown_policy_is_a_figment_error() {
    Jail::expect_with(|jail| {
        jail.set_env("FOLIO_JOBS__STUCK_JOB_POLICY", "retry_forever");

        let result = FolioConfig::load();
        assert!(matches!(result, Err(ConfigError::Figment(_))));
        Ok(())
    });
}

pub mod error;
pub mod settings;

pub use error::ConfigError;
pub use settings::{
    resolve_config_path, ChildCommand, Settings, CONFIG_ENV_VAR, DEFAULT_CONFIG_FILE,
};
use std::path::Path;

pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    let settings = Settings::from_path(path)?;
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().expect("tempdir");
        let settings =
            load_settings(&dir.path().join("vigil.yaml")).expect("defaults for missing file");
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.port, 1234);
        assert_eq!(settings.min_executed, 1);
    }

    #[test]
    fn yaml_overrides_defaults() {
        let settings: Settings = serde_yaml::from_str(
            r#"
port: 9321
run_base: /tmp/vigil-runs
executor:
  program: /usr/bin/exec-stub
  args: ["--debug-safe"]
annotation_timeout_secs: 2
step_delay_ms: 0
"#,
        )
        .expect("parse settings");
        assert_eq!(settings.port, 9321);
        assert_eq!(settings.run_base, PathBuf::from("/tmp/vigil-runs"));
        assert_eq!(settings.executor.program, "/usr/bin/exec-stub");
        assert_eq!(settings.executor.args, vec!["--debug-safe".to_string()]);
        assert_eq!(settings.annotation_timeout_secs, 2);
        assert_eq!(settings.step_delay_ms, 0);
        // untouched fields keep their defaults
        assert_eq!(settings.vlm.program, "python");
        assert_eq!(settings.initial_story, "hi");
        settings.validate().expect("valid");
    }

    #[test]
    fn allowed_tools_must_be_in_catalog() {
        let mut settings = Settings::default();
        settings.allowed_tools = Some(vec!["click".to_string(), "teleport".to_string()]);
        let err = settings.validate().expect_err("unknown tool rejected");
        assert!(err.to_string().contains("teleport"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut settings = Settings::default();
        settings.annotation_timeout_secs = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn initial_allowed_defaults_to_catalog() {
        let settings = Settings::default();
        assert_eq!(settings.initial_allowed_tools(), settings.tool_catalog);
    }

    #[test]
    fn invalid_yaml_is_fatal() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("vigil.yaml");
        std::fs::write(&path, "port: [not-a-port").expect("write");
        let err = load_settings(&path).expect_err("parse failure");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}

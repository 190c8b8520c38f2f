use super::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChildCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub run_base: PathBuf,
    pub executor: ChildCommand,
    pub vlm: ChildCommand,
    pub child_config_path: Option<String>,
    pub model: Option<String>,
    pub tool_catalog: Vec<String>,
    pub allowed_tools: Option<Vec<String>>,
    pub initial_story: String,
    pub min_executed: usize,
    pub default_actions: Vec<String>,
    pub execute_timeout_secs: u64,
    pub annotation_timeout_secs: u64,
    pub vlm_timeout_secs: u64,
    pub step_delay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1234,
            run_base: PathBuf::from("panel_log"),
            executor: ChildCommand {
                program: "python".to_string(),
                args: vec!["executor.py".to_string()],
            },
            vlm: ChildCommand {
                program: "python".to_string(),
                args: vec!["vlm_client.py".to_string()],
            },
            child_config_path: None,
            model: None,
            tool_catalog: vec![
                "click".to_string(),
                "right_click".to_string(),
                "double_click".to_string(),
                "drag".to_string(),
                "write".to_string(),
                "remember".to_string(),
                "recall".to_string(),
            ],
            allowed_tools: None,
            initial_story: "hi".to_string(),
            min_executed: 1,
            default_actions: vec![
                "click(500, 500)".to_string(),
                "click(500, 500)".to_string(),
            ],
            execute_timeout_secs: 20,
            annotation_timeout_secs: 30,
            vlm_timeout_secs: 90,
            step_delay_ms: 1500,
        }
    }
}

impl Settings {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(source) if source.kind() == ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        let settings: Settings =
            serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.executor.program.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "executor.program must be non-empty".to_string(),
            ));
        }
        if self.vlm.program.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "vlm.program must be non-empty".to_string(),
            ));
        }
        if self.tool_catalog.is_empty() {
            return Err(ConfigError::Invalid(
                "tool_catalog must list at least one tool".to_string(),
            ));
        }
        if self.execute_timeout_secs == 0
            || self.annotation_timeout_secs == 0
            || self.vlm_timeout_secs == 0
        {
            return Err(ConfigError::Invalid(
                "timeouts must be non-zero".to_string(),
            ));
        }
        if let Some(allowed) = &self.allowed_tools {
            for name in allowed {
                if !self.tool_catalog.contains(name) {
                    return Err(ConfigError::Invalid(format!(
                        "allowed tool `{name}` is not in the tool catalog"
                    )));
                }
            }
        }
        if self.default_actions.is_empty() {
            return Err(ConfigError::Invalid(
                "default_actions must list at least one action".to_string(),
            ));
        }
        Ok(())
    }

    pub fn initial_allowed_tools(&self) -> Vec<String> {
        self.allowed_tools
            .clone()
            .unwrap_or_else(|| self.tool_catalog.clone())
    }

    pub fn execute_timeout(&self) -> Duration {
        Duration::from_secs(self.execute_timeout_secs)
    }

    pub fn annotation_timeout(&self) -> Duration {
        Duration::from_secs(self.annotation_timeout_secs)
    }

    pub fn vlm_timeout(&self) -> Duration {
        Duration::from_secs(self.vlm_timeout_secs)
    }

    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }
}

pub const CONFIG_ENV_VAR: &str = "VIGIL_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "vigil.yaml";

pub fn resolve_config_path(argv_override: Option<&str>) -> PathBuf {
    if let Some(path) = argv_override {
        return PathBuf::from(path);
    }
    if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
        return PathBuf::from(path);
    }
    PathBuf::from(DEFAULT_CONFIG_FILE)
}

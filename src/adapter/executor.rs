use super::child::{parse_child_json, run_child};
use super::AdapterError;
use crate::config::{ChildCommand, Settings};
use crate::engine::calls::derive_coords;
use crate::engine::turn::{RenderAction, ToolCall};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::AtomicBool;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutedCall {
    pub name: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coords: Option<[i64; 2]>,
}

impl ExecutedCall {
    pub fn textual_args(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|value| match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            })
            .collect()
    }

    pub fn to_tool_call(&self) -> ToolCall {
        ToolCall {
            name: self.name.clone(),
            args: self.textual_args(),
            source_span: [0, 0],
        }
    }

    pub fn to_render_action(&self) -> RenderAction {
        let args = self.textual_args();
        let coords = self.coords.or_else(|| derive_coords(&args));
        RenderAction {
            name: self.name.clone(),
            args,
            coords,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MalformedEntry {
    pub text: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutorResponse {
    #[serde(default)]
    pub executed: Vec<ExecutedCall>,
    #[serde(default)]
    pub malformed: Vec<MalformedEntry>,
    #[serde(default)]
    pub raw_image_b64: String,
}

#[derive(Debug)]
pub struct ExecutorAdapter {
    command: ChildCommand,
    config_path: Option<String>,
    timeout: Duration,
    invoke_lock: Mutex<()>,
}

impl ExecutorAdapter {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            command: settings.executor.clone(),
            config_path: settings.child_config_path.clone(),
            timeout: settings.execute_timeout(),
            invoke_lock: Mutex::new(()),
        }
    }

    pub fn invoke(
        &self,
        story_text: &str,
        allowed_tools: &[String],
        debug: bool,
        stop: &AtomicBool,
    ) -> Result<ExecutorResponse, AdapterError> {
        let _guard = self.invoke_lock.lock().expect("executor invocation lock");
        let input = serde_json::json!({
            "story_text": story_text,
            "allowed_tools": allowed_tools,
            "debug": debug,
            "config_path": self.config_path,
        })
        .to_string();

        let output = run_child(&self.command, input, self.timeout, stop)?;
        let value = parse_child_json(&self.command.program, &output)?;
        serde_json::from_value(value).map_err(|err| AdapterError::Parse {
            program: self.command.program.clone(),
            reason: err.to_string(),
            stderr_tail: output.stderr_tail,
        })
    }
}

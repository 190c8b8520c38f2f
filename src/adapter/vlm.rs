use super::child::{parse_child_json, run_child};
use super::AdapterError;
use crate::config::{ChildCommand, Settings};
use crate::engine::turn::Usage;
use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicBool;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
pub struct VlmRequest {
    pub story_text: String,
    pub image_b64: String,
    pub model: Option<String>,
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VlmResponse {
    #[serde(default)]
    pub vlm_text: String,
    #[serde(default)]
    pub usage: Usage,
    #[serde(default)]
    pub latency_ms: u64,
}

#[derive(Debug)]
pub struct VlmAdapter {
    command: ChildCommand,
    timeout: Duration,
    invoke_lock: Mutex<()>,
}

impl VlmAdapter {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            command: settings.vlm.clone(),
            timeout: settings.vlm_timeout(),
            invoke_lock: Mutex::new(()),
        }
    }

    pub fn invoke(
        &self,
        request: &VlmRequest,
        stop: &AtomicBool,
    ) -> Result<VlmResponse, AdapterError> {
        match self.invoke_once(request, stop) {
            Ok(response) if !response.vlm_text.trim().is_empty() => return Ok(response),
            Err(AdapterError::Cancelled { program }) => {
                return Err(AdapterError::Cancelled { program })
            }
            _first_attempt => {}
        }
        self.invoke_once(request, stop)
    }

    pub fn invoke_once(
        &self,
        request: &VlmRequest,
        stop: &AtomicBool,
    ) -> Result<VlmResponse, AdapterError> {
        let _guard = self.invoke_lock.lock().expect("vlm invocation lock");
        let input = serde_json::json!({
            "story_text": request.story_text,
            "image_b64": request.image_b64,
            "model": request.model,
            "system_prompt": request.system_prompt,
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

use serde::{Deserialize, Serialize};

pub const ERR_EXECUTOR_TIMEOUT: &str = "executor_timeout";
pub const ERR_EXECUTOR_CRASH: &str = "executor_crash";
pub const ERR_EXECUTOR_MALFORMED: &str = "executor_malformed_output";
pub const ERR_ANNOTATION_TIMEOUT: &str = "annotation_timeout";
pub const ERR_VLM_TIMEOUT: &str = "vlm_timeout";
pub const ERR_VLM_CRASH: &str = "vlm_crash";
pub const ERR_VLM_EMPTY: &str = "vlm_empty";
pub const ERR_PERSIST_FAILURE: &str = "persist_failure";
pub const WARN_TOOL_UNDERFLOW: &str = "tool_underflow";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub args: Vec<String>,
    pub source_span: [usize; 2],
}

impl ToolCall {
    pub fn render(&self) -> String {
        let args: Vec<String> = self
            .args
            .iter()
            .map(|arg| {
                if arg.parse::<i64>().is_ok() {
                    arg.clone()
                } else {
                    serde_json::to_string(arg).unwrap_or_else(|_| format!("\"{arg}\""))
                }
            })
            .collect();
        format!("{}({})", self.name, args.join(", "))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub model: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyMs {
    pub exec: u64,
    pub annotate: u64,
    pub vlm: u64,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub seq: u64,
    pub ts_start: String,
    pub ts_end: String,
    pub story_in: String,
    pub executed: Vec<ToolCall>,
    pub tool_calls_out: Vec<ToolCall>,
    pub vlm_text: String,
    #[serde(default)]
    pub usage: Usage,
    #[serde(default)]
    pub latency_ms: LatencyMs,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub annotated_image_ref: String,
}

impl Turn {
    pub fn is_error(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderAction {
    pub name: String,
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coords: Option<[i64; 2]>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderJob {
    pub seq: u64,
    pub image_b64: String,
    pub actions: Vec<RenderAction>,
}

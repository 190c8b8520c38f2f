use super::calls;
use super::gate::WaitOutcome;
use super::turn::{
    LatencyMs, RenderJob, ToolCall, Turn, Usage, ERR_ANNOTATION_TIMEOUT, ERR_EXECUTOR_CRASH,
    ERR_EXECUTOR_MALFORMED, ERR_EXECUTOR_TIMEOUT, ERR_PERSIST_FAILURE, ERR_VLM_CRASH,
    ERR_VLM_EMPTY, ERR_VLM_TIMEOUT, WARN_TOOL_UNDERFLOW,
};
use super::Runtime;
use crate::adapter::{AdapterError, VlmRequest};
use crate::shared::now_iso;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const PAUSE_POLL: Duration = Duration::from_millis(50);

pub fn run(runtime: Arc<Runtime>) {
    let mut story = runtime.settings.initial_story.clone();
    runtime.log("info", "engine.loop.started", "waiting for resume");

    while !runtime.stop_requested() {
        if runtime.state.is_paused() {
            thread::sleep(PAUSE_POLL);
            continue;
        }
        match step(&runtime, &story) {
            StepOutcome::Advanced { next_story } => {
                story = next_story;
                if !sleep_with_stop(&runtime, runtime.settings.step_delay()) {
                    break;
                }
            }
            StepOutcome::ErrorPaused => {}
            StepOutcome::Shutdown => break,
        }
    }

    runtime.log("info", "engine.stopped", "loop exited");
}

enum StepOutcome {
    Advanced { next_story: String },
    ErrorPaused,
    Shutdown,
}

struct ErrorTurn<'a> {
    seq: u64,
    ts_start: String,
    story_in: &'a str,
    executed: Vec<ToolCall>,
    annotated_image_ref: String,
    kind: &'static str,
    detail: String,
    latency: LatencyMs,
}

fn step(rt: &Runtime, story: &str) -> StepOutcome {
    let seq = rt.state.last_seq() + 1;
    let ts_start = now_iso();
    let t0 = Instant::now();
    rt.log("info", "engine.turn.started", &format!("seq={seq}"));
    let allowed = rt.policy.snapshot();

    let exec_result = rt.executor.invoke(story, &allowed, false, &rt.stop);
    let exec_ms = t0.elapsed().as_millis() as u64;
    let response = match exec_result {
        Ok(response) => response,
        Err(AdapterError::Cancelled { .. }) => return StepOutcome::Shutdown,
        Err(err) => {
            return error_turn(
                rt,
                ErrorTurn {
                    seq,
                    ts_start,
                    story_in: story,
                    executed: Vec::new(),
                    annotated_image_ref: String::new(),
                    kind: executor_error_kind(&err),
                    detail: err.to_string(),
                    latency: LatencyMs {
                        exec: exec_ms,
                        total: t0.elapsed().as_millis() as u64,
                        ..Default::default()
                    },
                },
            )
        }
    };

    let executed: Vec<ToolCall> = response
        .executed
        .iter()
        .map(|call| call.to_tool_call())
        .collect();
    if !response.malformed.is_empty() {
        rt.log(
            "warn",
            "engine.executor.malformed",
            &format!("seq={seq} count={}", response.malformed.len()),
        );
    }
    if executed.len() < rt.settings.min_executed {
        return error_turn(
            rt,
            ErrorTurn {
                seq,
                ts_start,
                story_in: story,
                executed,
                annotated_image_ref: String::new(),
                kind: ERR_EXECUTOR_MALFORMED,
                detail: format!(
                    "executor returned {} well-formed calls (minimum {})",
                    response.executed.len(),
                    rt.settings.min_executed
                ),
                latency: LatencyMs {
                    exec: exec_ms,
                    total: t0.elapsed().as_millis() as u64,
                    ..Default::default()
                },
            },
        );
    }

    let actions = response
        .executed
        .iter()
        .map(|call| call.to_render_action())
        .collect();
    rt.gate.publish(RenderJob {
        seq,
        image_b64: response.raw_image_b64,
        actions,
    });

    let annotate_started = Instant::now();
    let annotated_b64 = match rt.gate.wait(seq, rt.settings.annotation_timeout()) {
        WaitOutcome::Image(image) => image,
        WaitOutcome::Cancelled => return StepOutcome::Shutdown,
        WaitOutcome::TimedOut => {
            // No raw fallback: without the annotated image the VLM call does
            // not happen.
            return error_turn(
                rt,
                ErrorTurn {
                    seq,
                    ts_start,
                    story_in: story,
                    executed,
                    annotated_image_ref: String::new(),
                    kind: ERR_ANNOTATION_TIMEOUT,
                    detail: format!(
                        "no annotated image for seq {seq} within {}s",
                        rt.settings.annotation_timeout_secs
                    ),
                    latency: LatencyMs {
                        exec: exec_ms,
                        annotate: annotate_started.elapsed().as_millis() as u64,
                        total: t0.elapsed().as_millis() as u64,
                        ..Default::default()
                    },
                },
            );
        }
    };
    let annotate_ms = annotate_started.elapsed().as_millis() as u64;

    let annotated_ref = match rt.store.write_annotated_png(seq, &annotated_b64) {
        Ok(name) => name,
        Err(err) => {
            rt.pause_with_error(&format!("{ERR_PERSIST_FAILURE}: {err}"));
            return StepOutcome::ErrorPaused;
        }
    };

    let vlm_started = Instant::now();
    let request = VlmRequest {
        story_text: story.to_string(),
        image_b64: annotated_b64,
        model: rt.settings.model.clone(),
        system_prompt: Some(calls::system_prompt_for(&allowed)),
    };
    let vlm_result = rt.vlm.invoke(&request, &rt.stop);
    let vlm_ms = vlm_started.elapsed().as_millis() as u64;
    let latency = LatencyMs {
        exec: exec_ms,
        annotate: annotate_ms,
        vlm: vlm_ms,
        total: t0.elapsed().as_millis() as u64,
    };
    let vlm_response = match vlm_result {
        Err(AdapterError::Cancelled { .. }) => return StepOutcome::Shutdown,
        Err(err) => {
            return error_turn(
                rt,
                ErrorTurn {
                    seq,
                    ts_start,
                    story_in: story,
                    executed,
                    annotated_image_ref: annotated_ref,
                    kind: vlm_error_kind(&err),
                    detail: err.to_string(),
                    latency,
                },
            )
        }
        Ok(response) if response.vlm_text.trim().is_empty() => {
            return error_turn(
                rt,
                ErrorTurn {
                    seq,
                    ts_start,
                    story_in: story,
                    executed,
                    annotated_image_ref: annotated_ref,
                    kind: ERR_VLM_EMPTY,
                    detail: "vlm returned empty text after retry".to_string(),
                    latency,
                },
            )
        }
        Ok(response) => response,
    };

    let (mut calls_out, rejected) = calls::extract_tool_calls(&vlm_response.vlm_text, &allowed);
    if !rejected.is_empty() {
        rt.log(
            "warn",
            "engine.vlm.rejected_calls",
            &format!("seq={seq} count={}", rejected.len()),
        );
    }
    let mut warnings = Vec::new();
    if calls_out.len() < 2 {
        calls_out = calls::parse_action_lines(&rt.settings.default_actions, &rt.settings.tool_catalog);
        warnings.push(WARN_TOOL_UNDERFLOW.to_string());
        rt.log(
            "warn",
            "engine.vlm.tool_underflow",
            &format!("seq={seq} substituted {} default actions", calls_out.len()),
        );
    }
    let next_story = calls::compose_story(&calls_out);

    let turn = Turn {
        seq,
        ts_start,
        ts_end: now_iso(),
        story_in: story.to_string(),
        executed,
        tool_calls_out: calls_out,
        vlm_text: vlm_response.vlm_text,
        usage: vlm_response.usage,
        latency_ms: LatencyMs {
            total: t0.elapsed().as_millis() as u64,
            ..latency
        },
        errors: Vec::new(),
        warnings,
        annotated_image_ref: annotated_ref,
    };

    if persist_and_broadcast(rt, turn) {
        StepOutcome::Advanced { next_story }
    } else {
        StepOutcome::ErrorPaused
    }
}

fn error_turn(rt: &Runtime, report: ErrorTurn<'_>) -> StepOutcome {
    rt.state.record_error(format!("{}: {}", report.kind, report.detail));
    rt.state.set_paused(true);
    rt.log(
        "error",
        "engine.turn.error",
        &format!("seq={} kind={} {}", report.seq, report.kind, report.detail),
    );

    let turn = Turn {
        seq: report.seq,
        ts_start: report.ts_start,
        ts_end: now_iso(),
        story_in: report.story_in.to_string(),
        executed: report.executed,
        tool_calls_out: Vec::new(),
        vlm_text: String::new(),
        usage: Usage::default(),
        latency_ms: report.latency,
        errors: vec![report.kind.to_string()],
        warnings: Vec::new(),
        annotated_image_ref: report.annotated_image_ref,
    };
    persist_and_broadcast(rt, turn);
    StepOutcome::ErrorPaused
}

fn persist_and_broadcast(rt: &Runtime, turn: Turn) -> bool {
    let seq = turn.seq;
    let is_error = turn.is_error();
    let turn = Arc::new(turn);
    if let Err(err) = rt.store.append(Arc::clone(&turn)) {
        rt.pause_with_error(&format!("{ERR_PERSIST_FAILURE}: {err}"));
        return false;
    }
    rt.state.set_last_seq(seq);
    let _ = rt.store.write_state(&rt.state.snapshot());
    rt.broker.publish(turn);
    let (level, event) = if is_error {
        ("error", "engine.turn.error_persisted")
    } else {
        ("info", "engine.turn.persisted")
    };
    rt.log(level, event, &format!("seq={seq}"));
    true
}

fn executor_error_kind(err: &AdapterError) -> &'static str {
    match err {
        AdapterError::Timeout { .. } => ERR_EXECUTOR_TIMEOUT,
        AdapterError::Parse { .. } | AdapterError::ChildError { .. } => ERR_EXECUTOR_MALFORMED,
        _ => ERR_EXECUTOR_CRASH,
    }
}

fn vlm_error_kind(err: &AdapterError) -> &'static str {
    match err {
        AdapterError::Timeout { .. } => ERR_VLM_TIMEOUT,
        _ => ERR_VLM_CRASH,
    }
}

fn sleep_with_stop(rt: &Runtime, total: Duration) -> bool {
    let mut remaining = total;
    while remaining > Duration::from_millis(0) {
        if rt.stop_requested() {
            return false;
        }
        let chunk = remaining.min(Duration::from_millis(200));
        thread::sleep(chunk);
        remaining = remaining.saturating_sub(chunk);
    }
    !rt.stop_requested()
}

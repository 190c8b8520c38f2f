use super::run_paths::RunPaths;
use super::state::StateSnapshot;
use super::turn::Turn;
use super::EngineError;
use crate::shared::{append_jsonl_line, atomic_write_file};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::collections::VecDeque;
use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

pub const RING_CAPACITY: usize = 256;

#[derive(Debug)]
pub struct TurnStore {
    paths: RunPaths,
    appended: AtomicU64,
    ring: Mutex<VecDeque<Arc<Turn>>>,
}

impl TurnStore {
    pub fn new(paths: RunPaths) -> Self {
        Self {
            paths,
            appended: AtomicU64::new(0),
            ring: Mutex::new(VecDeque::with_capacity(RING_CAPACITY)),
        }
    }

    pub fn append(&self, turn: Arc<Turn>) -> Result<(), EngineError> {
        let last = self.appended.load(Ordering::SeqCst);
        if turn.seq <= last {
            return Err(EngineError::NonMonotonicSeq {
                seq: turn.seq,
                last,
            });
        }

        let path = self.paths.turns_path();
        let line = serde_json::to_string(turn.as_ref()).map_err(|source| EngineError::Encode {
            path: path.display().to_string(),
            source,
        })?;
        append_jsonl_line(&path, &line).map_err(|source| EngineError::WriteState {
            path: path.display().to_string(),
            source,
        })?;

        self.appended.store(turn.seq, Ordering::SeqCst);
        let mut ring = self.ring.lock().expect("store ring lock");
        if ring.len() == RING_CAPACITY {
            ring.pop_front();
        }
        ring.push_back(turn);
        Ok(())
    }

    pub fn write_annotated_png(&self, seq: u64, image_b64: &str) -> Result<String, EngineError> {
        let bytes = BASE64
            .decode(image_b64)
            .map_err(|source| EngineError::ImageDecode { seq, source })?;
        let path = self.paths.image_path(seq);
        fs::write(&path, bytes).map_err(|source| EngineError::WriteState {
            path: path.display().to_string(),
            source,
        })?;
        Ok(RunPaths::image_name(seq))
    }

    pub fn write_state(&self, snapshot: &StateSnapshot) -> Result<(), EngineError> {
        let path = self.paths.state_path();
        let encoded =
            serde_json::to_vec_pretty(snapshot).map_err(|source| EngineError::Encode {
                path: path.display().to_string(),
                source,
            })?;
        atomic_write_file(&path, &encoded).map_err(|source| EngineError::WriteState {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn recent(&self, n: usize) -> Vec<Arc<Turn>> {
        let ring = self.ring.lock().expect("store ring lock");
        let skip = ring.len().saturating_sub(n);
        ring.iter().skip(skip).cloned().collect()
    }

    pub fn read_all(&self) -> Result<Vec<Turn>, EngineError> {
        let path = self.paths.turns_path();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Vec::new())
            }
            Err(source) => {
                return Err(EngineError::ReadState {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        let mut turns = Vec::new();
        for line in raw.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let turn: Turn =
                serde_json::from_str(line).map_err(|source| EngineError::ParseState {
                    path: path.display().to_string(),
                    source,
                })?;
            turns.push(turn);
        }
        Ok(turns)
    }
}

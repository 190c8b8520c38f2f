use super::EngineError;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    pub root: PathBuf,
}

impl RunPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn turns_path(&self) -> PathBuf {
        self.root.join("turns.jsonl")
    }

    pub fn state_path(&self) -> PathBuf {
        self.root.join("state.json")
    }

    pub fn allowed_tools_path(&self) -> PathBuf {
        self.root.join("allowed_tools.json")
    }

    pub fn image_name(seq: u64) -> String {
        format!("turn_{seq:04}.png")
    }

    pub fn image_path(&self, seq: u64) -> PathBuf {
        self.root.join(Self::image_name(seq))
    }

    pub fn engine_log_path(&self) -> PathBuf {
        self.root.join("logs/engine.log")
    }
}

pub fn create_run_dir(base: &Path) -> Result<RunPaths, EngineError> {
    fs::create_dir_all(base).map_err(|source| EngineError::CreateDir {
        path: base.display().to_string(),
        source,
    })?;

    let stamp = chrono::Local::now().format("run_%Y%m%d_%H%M%S").to_string();
    let mut candidate = base.join(&stamp);
    let mut suffix = 1;
    while candidate.exists() {
        candidate = base.join(format!("{stamp}_{suffix}"));
        suffix += 1;
    }
    fs::create_dir_all(&candidate).map_err(|source| EngineError::CreateDir {
        path: candidate.display().to_string(),
        source,
    })?;

    let paths = RunPaths::new(candidate);
    let logs_dir = paths.root.join("logs");
    fs::create_dir_all(&logs_dir).map_err(|source| EngineError::CreateDir {
        path: logs_dir.display().to_string(),
        source,
    })?;
    Ok(paths)
}

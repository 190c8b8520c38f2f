use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Debug)]
pub struct RunState {
    pub run_dir: PathBuf,
    paused: AtomicBool,
    last_seq: AtomicU64,
    last_error: Mutex<Option<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub last_seq: u64,
    pub paused: bool,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl RunState {
    pub fn new(run_dir: PathBuf) -> Self {
        Self {
            run_dir,
            paused: AtomicBool::new(true),
            last_seq: AtomicU64::new(0),
            last_error: Mutex::new(None),
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn set_paused(&self, value: bool) -> bool {
        self.paused.swap(value, Ordering::SeqCst) != value
    }

    pub fn last_seq(&self) -> u64 {
        self.last_seq.load(Ordering::SeqCst)
    }

    pub fn set_last_seq(&self, seq: u64) {
        self.last_seq.store(seq, Ordering::SeqCst);
    }

    pub fn record_error(&self, message: impl Into<String>) {
        let mut guard = self.last_error.lock().expect("run state lock");
        *guard = Some(message.into());
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().expect("run state lock").clone()
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            last_seq: self.last_seq(),
            paused: self.is_paused(),
            last_error: self.last_error(),
        }
    }
}

pub mod fs_atomic;
pub mod logging;

pub use fs_atomic::{append_jsonl_line, atomic_write_file};
pub use logging::append_engine_log;

pub fn now_secs() -> i64 {
    chrono::Local::now().timestamp()
}

pub fn now_iso() -> String {
    chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

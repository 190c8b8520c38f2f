pub mod calls;
pub mod driver;
pub mod error;
pub mod gate;
pub mod policy;
pub mod run_paths;
pub mod state;
pub mod store;
pub mod turn;

pub use error::EngineError;
pub use gate::RenderJobGate;
pub use policy::ToolPolicy;
pub use run_paths::RunPaths;
pub use state::RunState;
pub use store::TurnStore;

use crate::adapter::{ExecutorAdapter, VlmAdapter};
use crate::config::Settings;
use crate::events::SseBroker;
use crate::shared;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct Runtime {
    pub settings: Settings,
    pub paths: RunPaths,
    pub state: RunState,
    pub gate: RenderJobGate,
    pub store: TurnStore,
    pub policy: ToolPolicy,
    pub broker: SseBroker,
    pub executor: ExecutorAdapter,
    pub vlm: VlmAdapter,
    pub stop: AtomicBool,
}

impl Runtime {
    pub fn bootstrap(settings: Settings) -> Result<Arc<Self>, EngineError> {
        let paths = run_paths::create_run_dir(&settings.run_base)?;
        let policy = ToolPolicy::load_or_seed(
            paths.allowed_tools_path(),
            settings.tool_catalog.clone(),
            settings.initial_allowed_tools(),
        )?;
        let state = RunState::new(paths.root.clone());
        let store = TurnStore::new(paths.clone());
        store.write_state(&state.snapshot())?;

        let executor = ExecutorAdapter::from_settings(&settings);
        let vlm = VlmAdapter::from_settings(&settings);

        let runtime = Arc::new(Self {
            settings,
            state,
            gate: RenderJobGate::new(),
            store,
            policy,
            broker: SseBroker::new(),
            executor,
            vlm,
            stop: AtomicBool::new(false),
            paths,
        });
        runtime.log(
            "info",
            "engine.started",
            &format!("run_dir={}", runtime.paths.root.display()),
        );
        Ok(runtime)
    }

    pub fn log(&self, level: &str, event: &str, message: &str) {
        shared::append_engine_log(&self.paths.engine_log_path(), level, event, message);
    }

    pub fn set_paused(&self, value: bool) {
        if self.state.set_paused(value) {
            let _ = self.store.write_state(&self.state.snapshot());
            let event = if value { "engine.paused" } else { "engine.resumed" };
            self.log("info", event, "requested via http");
        }
    }

    pub fn pause_with_error(&self, message: &str) {
        self.state.record_error(message);
        self.state.set_paused(true);
        let _ = self.store.write_state(&self.state.snapshot());
        self.log("error", "engine.paused", message);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    pub fn begin_shutdown(&self) {
        if !self.stop.swap(true, Ordering::SeqCst) {
            self.gate.shutdown();
            self.log("info", "engine.stopping", "shutdown requested");
        }
    }
}

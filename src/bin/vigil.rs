use std::sync::Arc;
use vigil::config;
use vigil::engine::{driver, Runtime};
use vigil::http;

fn run() -> Result<(), String> {
    let config_arg = std::env::args().nth(1);
    let config_path = config::resolve_config_path(config_arg.as_deref());
    let settings = config::load_settings(&config_path)
        .map_err(|err| format!("failed to load {}: {err}", config_path.display()))?;
    let addr = format!("{}:{}", settings.host, settings.port);

    let runtime = Runtime::bootstrap(settings)
        .map_err(|err| format!("failed to bootstrap run directory: {err}"))?;

    let tokio_rt = tokio::runtime::Runtime::new()
        .map_err(|err| format!("failed to start async runtime: {err}"))?;
    let listener = tokio_rt
        .block_on(tokio::net::TcpListener::bind(addr.as_str()))
        .map_err(|err| format!("failed to bind {addr}: {err}"))?;

    println!("vigil engine started");
    println!("run_dir={}", runtime.paths.root.display());
    println!("panel=http://{addr}");

    let engine_runtime = Arc::clone(&runtime);
    let engine_thread = std::thread::spawn(move || driver::run(engine_runtime));

    let serve_result = tokio_rt.block_on(http::serve(Arc::clone(&runtime), listener));
    runtime.begin_shutdown();
    let _ = engine_thread.join();
    serve_result.map_err(|err| format!("http server failed: {err}"))
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

use crate::app::command_support::{ensure_state_root, load_context, map_config_err, parse_args};
use crate::runtime::{append_service_event, log_fields, recover_interrupted_tasks, StatePaths};
use crate::server::{serve, AppState};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

pub fn cmd_serve(args: &[String]) -> Result<String, String> {
    let args = parse_args(args, &[])?;
    let mut ctx = load_context(&args)?;
    if let Some(bind) = args.option("bind") {
        ctx.settings.server.bind = bind.to_string();
    }
    if let Some(port) = args.option("port") {
        ctx.settings.server.port = port
            .parse()
            .map_err(|_| format!("invalid port `{port}`"))?;
    }
    ctx.settings.validate().map_err(map_config_err)?;
    init_tracing();

    let paths = ensure_state_root()?;
    let state = Arc::new(AppState::new(ctx.settings, &paths).map_err(|e| e.render())?);
    let recovered = recover_interrupted_tasks(state.tracker()).map_err(|e| e.render())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to start async runtime: {e}"))?;
    let addr = state.settings.server.socket_addr();
    runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| format!("failed to bind {addr}: {e}"))?;
        let local = listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| addr.clone());
        log_started(&paths, &local, recovered.len());
        serve(Arc::clone(&state), listener, shutdown_signal())
            .await
            .map_err(|e| format!("server error: {e}"))
    })?;

    let drained = state.runner.wait_idle(DRAIN_TIMEOUT);
    append_service_event(
        &paths,
        if drained { "info" } else { "warn" },
        "service.stopped",
        "service stopped",
        log_fields([("drained", json!(drained))]),
    );
    Ok(format!(
        "stopped\nstate_root={}\njobs_drained={drained}",
        paths.root.display()
    ))
}

fn log_started(paths: &StatePaths, addr: &str, recovered: usize) {
    append_service_event(
        paths,
        "info",
        "service.started",
        &format!("listening on http://{addr}"),
        log_fields([
            ("addr", json!(addr)),
            ("recovered", json!(recovered)),
            ("version", json!(env!("CARGO_PKG_VERSION"))),
        ]),
    );
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

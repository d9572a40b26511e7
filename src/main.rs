use purgehook::{App, ShutdownDeadline, StartupError, drain, shutdown_signal, teardown};
use std::future::IntoFuture;
use purgehook_config::{AppConfig, EnvLoader};
use purgehook_log::{LogConfig, LogGuard};
use std::process::ExitCode;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    // .env first so it can carry the log settings too
    let loader = EnvLoader::default();
    let dotenv = loader.load_dotenv(None);

    let log_guard = match LogConfig::from_env().init() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("purgehook: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let config = match dotenv.and_then(|()| AppConfig::from_vars(&loader.load())) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            log_guard.flush();
            return ExitCode::FAILURE;
        }
    };

    match run(config, log_guard).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // The guard is gone by now; stderr is all that is left
            eprintln!("purgehook: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AppConfig, log_guard: LogGuard) -> Result<(), StartupError> {
    let app = match App::from_config(&config) {
        Ok(app) => app,
        Err(e) => {
            error!(error = %e, "Failed to build components");
            log_guard.flush();
            return Err(e);
        }
    };

    let addr = config.listen_addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(source) => {
            error!(addr = %addr, error = %source, "Failed to bind");
            log_guard.flush();
            return Err(StartupError::Bind { addr, source });
        }
    };

    // Bindings are in place before the first request is accepted. A failed
    // pass is logged by `initialize` and the service still starts.
    if app.initialize().await.is_err() {
        warn!("Serving with the bindings made before the failure");
    }

    info!(
        addr = %addr,
        target = %config.ghost.webhook_target,
        events = app.desired.len(),
        "Server listening"
    );
    let deadline = ShutdownDeadline::new(config.server.shutdown_timeout);
    let server = axum::serve(listener, app.router())
        .with_graceful_shutdown(deadline.clone().on_signal(shutdown_signal()))
        .into_future();
    let served = drain(server, &deadline).await.unwrap_or(Ok(()));
    if let Err(e) = &served {
        error!(error = %e, "Server error");
    }

    let outcome = teardown(&app.engine, deadline.remaining()).await;
    if outcome.is_timed_out() {
        error!("Forcing exit after teardown deadline");
        log_guard.flush();
        std::process::exit(1);
    }

    info!("Shutdown complete");
    log_guard.flush();
    served.map_err(StartupError::Serve)
}

use std::{future::IntoFuture, process, sync::Arc};

use docstash::{
    application::{
        error::AppError,
        render::{CommandRenderEngine, RenderService},
        templates::TemplateService,
    },
    cache::FileCache,
    config,
    infra::{
        error::InfraError,
        http::{self, AppState},
        telemetry,
        uploads::UploadStaging,
    },
    util::bytes::format_bytes,
};
use serde_json::json;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Stats(_) => run_stats(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let cache = Arc::new(FileCache::open(&settings.cache.directory).await?);
    let templates = Arc::new(TemplateService::new(Arc::clone(&cache)));
    let engine = CommandRenderEngine::new(
        settings.render.engine_path.clone(),
        settings.render.work_dir.clone(),
        settings.render.timeout,
    )?;
    info!(
        target = "docstash::bootstrap",
        engine = %engine.program().display(),
        timeout_ms = settings.render.timeout.as_millis() as u64,
        "Render engine configured"
    );
    let renders = Arc::new(RenderService::new(Arc::clone(&templates), Arc::new(engine)));
    let uploads = Arc::new(UploadStaging::new(
        cache.staging_dir().to_path_buf(),
        settings.uploads.max_file_bytes.get(),
    ));

    let state = AppState {
        templates,
        renders,
        uploads,
        upload_field: Arc::from(settings.uploads.field_name.as_str()),
    };

    serve_http(&settings, state).await
}

async fn run_stats(settings: config::Settings) -> Result<(), AppError> {
    let cache = FileCache::open(&settings.cache.directory).await?;
    let stats = cache.stats();
    let report = json!({
        "directory": cache.root().display().to_string(),
        "entries": stats.entries,
        "total_bytes": stats.total_bytes,
        "total_size": format_bytes(stats.total_bytes),
    });
    println!("{report:#}");
    Ok(())
}

async fn serve_http(settings: &config::Settings, state: AppState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "docstash::bootstrap",
        addr = %settings.server.addr,
        "HTTP listener bound"
    );

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let mut server = tokio::spawn(
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .into_future(),
    );

    tokio::select! {
        result = &mut server => return server_outcome(result),
        () = shutdown_signal() => {}
    }

    let grace = settings.server.graceful_shutdown;
    info!(
        target = "docstash::bootstrap",
        grace_ms = grace.as_millis() as u64,
        "Shutdown requested; draining connections"
    );
    let _ = stop_tx.send(());

    match tokio::time::timeout(grace, &mut server).await {
        Ok(result) => server_outcome(result),
        Err(_) => {
            warn!(
                target = "docstash::bootstrap",
                grace_ms = grace.as_millis() as u64,
                "Connections still open after the grace period; exiting"
            );
            server.abort();
            Ok(())
        }
    }
}

fn server_outcome(
    result: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(AppError::unexpected(format!("server error: {err}"))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

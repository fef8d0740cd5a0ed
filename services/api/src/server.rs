use crate::cli::ServeArgs;
use crate::infra::{initial_sync, AppState, Backend};
use crate::routes::with_leave_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use leave_desk::config::{AppConfig, ConfigError};
use leave_desk::error::AppError;
use leave_desk::leave::LifecyclePolicy;
use leave_desk::sync::{spawn_periodic, CsvExportSource, HrSync};
use leave_desk::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let backend = Backend::in_memory(LifecyclePolicy::from(&config.leave));

    if config.sync.enabled {
        let export_dir = config
            .sync
            .export_dir
            .clone()
            .ok_or(ConfigError::MissingExportDir)?;
        let sync = Arc::new(HrSync::new(backend.store.clone()));
        initial_sync(sync.clone(), &config.sync).await;
        spawn_periodic(
            sync,
            Arc::new(CsvExportSource::from_dir(export_dir)),
            config.sync.interval,
        );
    }

    let prevent_overlap = backend.service.policy().prevent_overlap;
    let app = with_leave_routes(backend.service, backend.notifier)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        sync = config.sync.enabled,
        prevent_overlap,
        "leave desk ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

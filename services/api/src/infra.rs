use chrono::NaiveDate;
use leave_desk::config::SyncConfig;
use leave_desk::leave::{
    InMemoryLeaveStore, InMemoryNotifier, LeaveRequestService, LifecyclePolicy,
};
use leave_desk::sync::{CsvExportSource, HrSync, SyncReport};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{error, info};

pub(crate) type LeaveService = LeaveRequestService<InMemoryLeaveStore, InMemoryNotifier>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Store, notifier, and lifecycle service sharing one in-memory backend.
pub(crate) struct Backend {
    pub(crate) store: Arc<InMemoryLeaveStore>,
    pub(crate) notifier: Arc<InMemoryNotifier>,
    pub(crate) service: Arc<LeaveService>,
}

impl Backend {
    pub(crate) fn in_memory(policy: LifecyclePolicy) -> Self {
        let store = Arc::new(InMemoryLeaveStore::default());
        let notifier = Arc::new(InMemoryNotifier::default());
        let service = Arc::new(LeaveRequestService::new(
            store.clone(),
            notifier.clone(),
            policy,
        ));
        Self {
            store,
            notifier,
            service,
        }
    }
}

/// Import the configured export once before serving. A failed import is
/// logged; the service still starts with whatever the store holds.
pub(crate) async fn initial_sync(
    sync: Arc<HrSync<InMemoryLeaveStore>>,
    config: &SyncConfig,
) -> Option<SyncReport> {
    let source = CsvExportSource::from_dir(config.export_dir.as_ref()?);
    let outcome = tokio::task::spawn_blocking(move || sync.run(&source)).await;
    match outcome {
        Ok(Ok(report)) => {
            info!(
                employees = report.employees,
                ledgers = report.ledgers,
                "initial hr sync completed"
            );
            Some(report)
        }
        Ok(Err(err)) => {
            error!(error = %err, "initial hr sync failed");
            None
        }
        Err(err) => {
            error!(error = %err, "initial hr sync task aborted");
            None
        }
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

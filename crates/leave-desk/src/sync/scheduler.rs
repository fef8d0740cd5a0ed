use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{error, info};

use super::{HrSource, HrSync, HrSyncTarget};

/// Re-run the import every `every`, starting one period from now. A failing
/// cycle is logged and the next one still runs.
pub fn spawn_periodic<T, S>(sync: Arc<HrSync<T>>, source: Arc<S>, every: Duration) -> JoinHandle<()>
where
    T: HrSyncTarget + 'static,
    S: HrSource + 'static,
{
    tokio::spawn(async move {
        info!(interval_secs = every.as_secs(), "hr sync scheduler started");
        let mut interval = time::interval_at(Instant::now() + every, every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            let sync = sync.clone();
            let source = source.clone();
            match tokio::task::spawn_blocking(move || sync.run(source.as_ref())).await {
                Ok(Ok(report)) => info!(
                    employees = report.employees,
                    ledgers = report.ledgers,
                    "scheduled hr sync completed"
                ),
                Ok(Err(err)) => error!(error = %err, "scheduled hr sync failed"),
                Err(err) => error!(error = %err, "scheduled hr sync task aborted"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::leave::memory::InMemoryLeaveStore;
    use crate::sync::{HrSnapshot, SyncError};

    #[derive(Default)]
    struct FlakySource {
        calls: AtomicUsize,
    }

    impl HrSource for FlakySource {
        fn snapshot(&self) -> Result<HrSnapshot, SyncError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                return Err(SyncError::Io {
                    path: "employees.csv".into(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "export locked"),
                });
            }
            Ok(HrSnapshot::default())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn scheduler_keeps_running_after_a_failed_cycle() {
        let store = Arc::new(InMemoryLeaveStore::default());
        let sync = Arc::new(HrSync::new(store));
        let source = Arc::new(FlakySource::default());

        let handle = spawn_periodic(sync, source.clone(), Duration::from_millis(10));

        let waited = time::timeout(Duration::from_secs(5), async {
            while source.calls.load(Ordering::SeqCst) < 3 {
                time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        handle.abort();

        assert!(waited.is_ok(), "scheduler stopped after the first failure");
    }
}

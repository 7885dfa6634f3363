use codedrop_core::Clock;
use codedrop_storage::{ExpiringStore, StorageResult};
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaperState {
    Idle,
    Scanning,
}

/// Outcome of one eviction pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReapReport {
    /// Expired codes seen by the scan.
    pub scanned: usize,
    pub evicted: usize,
    pub failed: usize,
}

/// Periodically removes expired entries so their payloads are reclaimed.
///
/// Lookups already hide expired entries; the reaper only frees the space.
pub struct Reaper {
    store: Arc<dyn ExpiringStore>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    scanning: AtomicBool,
}

/// Puts the reaper back to idle when a pass ends, however it ends.
struct ScanGuard<'a>(&'a AtomicBool);

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Reaper {
    pub fn new(store: Arc<dyn ExpiringStore>, clock: Arc<dyn Clock>, interval: Duration) -> Self {
        Self {
            store,
            clock,
            interval,
            scanning: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> ReaperState {
        if self.scanning.load(Ordering::Acquire) {
            ReaperState::Scanning
        } else {
            ReaperState::Idle
        }
    }

    /// Start the background task. It runs a pass immediately, then once per interval,
    /// until `shutdown` is cancelled.
    pub fn start(self: Arc<Self>, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::info!(interval_secs = self.interval.as_secs(), "Reaper started");

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                match self.run_once().await {
                    Ok(report) if report.scanned > 0 => {
                        tracing::info!(
                            scanned = report.scanned,
                            evicted = report.evicted,
                            failed = report.failed,
                            "Evicted expired files"
                        );
                    }
                    Ok(_) => tracing::debug!("No expired files"),
                    Err(e) => tracing::error!(error = %e, "Reaper pass failed"),
                }
            }

            tracing::info!("Reaper stopped");
        })
    }

    /// Run a single eviction pass.
    ///
    /// A code that vanished or was reissued between the scan and its eviction is
    /// skipped. A failing eviction is logged and the pass continues.
    #[tracing::instrument(skip(self), fields(reaper.operation = "evict_expired"))]
    pub async fn run_once(&self) -> StorageResult<ReapReport> {
        self.scanning.store(true, Ordering::Release);
        let _guard = ScanGuard(&self.scanning);

        let now = self.clock.now();
        let mut expired = self.store.list_expired(now).await?;
        let mut report = ReapReport::default();

        while let Some(code) = expired.next().await {
            report.scanned += 1;
            match self.store.delete_expired(&code, now).await {
                Ok(true) => {
                    report.evicted += 1;
                    tracing::debug!(code = %code, "Evicted expired file");
                }
                Ok(false) => {
                    tracing::debug!(code = %code, "Expired file already gone");
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(error = %e, code = %code, "Failed to evict expired file");
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::{DateTime, Duration as ChronoDuration, Utc};
    use codedrop_core::{FileEntry, ManualClock};
    use codedrop_storage::{
        ByteStream, CodeStream, LocalStore, MemoryStore, StagedPayload, StorageBackend,
        StorageError, UploadStream,
    };
    use futures::stream;

    /// Memory store whose eviction of one code always fails.
    struct FailingEviction {
        inner: MemoryStore,
        broken: &'static str,
    }

    #[async_trait::async_trait]
    impl ExpiringStore for FailingEviction {
        async fn stage(&self, body: UploadStream<'_>, max_size: u64) -> StorageResult<StagedPayload> {
            self.inner.stage(body, max_size).await
        }

        async fn put(&self, entry: FileEntry, payload: StagedPayload) -> StorageResult<()> {
            self.inner.put(entry, payload).await
        }

        async fn get(&self, code: &str) -> StorageResult<Option<FileEntry>> {
            self.inner.get(code).await
        }

        async fn open_read(&self, code: &str) -> StorageResult<Option<(FileEntry, ByteStream)>> {
            self.inner.open_read(code).await
        }

        async fn delete(&self, code: &str) -> StorageResult<bool> {
            self.inner.delete(code).await
        }

        async fn delete_live(&self, code: &str, now: DateTime<Utc>) -> StorageResult<bool> {
            self.inner.delete_live(code, now).await
        }

        async fn delete_expired(&self, code: &str, now: DateTime<Utc>) -> StorageResult<bool> {
            if code == self.broken {
                return Err(StorageError::DeleteFailed(format!("disk refused {}", code)));
            }
            self.inner.delete_expired(code, now).await
        }

        async fn list_expired(&self, now: DateTime<Utc>) -> StorageResult<CodeStream> {
            self.inner.list_expired(now).await
        }

        async fn live_count(&self) -> StorageResult<usize> {
            self.inner.live_count().await
        }

        fn backend_type(&self) -> StorageBackend {
            self.inner.backend_type()
        }
    }

    fn body(data: &'static [u8]) -> UploadStream<'static> {
        Box::pin(stream::iter(vec![Ok(Bytes::from_static(data))]))
    }

    async fn publish(store: &dyn ExpiringStore, code: &str, now: DateTime<Utc>, ttl: ChronoDuration) {
        let staged = store.stage(body(b"payload"), 1024).await.unwrap();
        let entry = FileEntry {
            code: code.to_string(),
            file_name: "p.txt".to_string(),
            file_size: 7,
            content_type: "text/plain".to_string(),
            upload_time: now,
            expires_at: now + ttl,
        };
        store.put(entry, staged).await.unwrap();
    }

    #[tokio::test]
    async fn test_run_once_evicts_only_expired() {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(MemoryStore::new(clock.clone()));
        let reaper = Reaper::new(store.clone(), clock.clone(), Duration::from_secs(60));

        let now = clock.now();
        publish(store.as_ref(), "SHORT000", now, ChronoDuration::hours(1)).await;
        publish(store.as_ref(), "LONG0000", now, ChronoDuration::hours(24)).await;

        assert_eq!(reaper.run_once().await.unwrap(), ReapReport::default());

        clock.advance(ChronoDuration::hours(2));
        let report = reaper.run_once().await.unwrap();
        assert_eq!(
            report,
            ReapReport {
                scanned: 1,
                evicted: 1,
                failed: 0
            }
        );
        assert_eq!(store.stored_len(), 1);
        assert!(store.get("LONG0000").await.unwrap().is_some());
        assert_eq!(reaper.state(), ReaperState::Idle);
    }

    #[tokio::test]
    async fn test_repeated_cycles_do_not_leak_disk_space() {
        let temp_dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(LocalStore::open(temp_dir.path(), clock.clone()).await.unwrap());
        let reaper = Reaper::new(store.clone(), clock.clone(), Duration::from_secs(60));

        for cycle in 0..20 {
            for i in 0..5 {
                let code = format!("C{:02}{:05}", cycle, i);
                publish(store.as_ref(), &code, clock.now(), ChronoDuration::minutes(10)).await;
            }
            clock.advance(ChronoDuration::minutes(11));
            let report = reaper.run_once().await.unwrap();
            assert_eq!(report.evicted, 5);
        }

        assert_eq!(store.stored_len(), 0);

        // Unlinking happens on the blocking pool.
        let entries_dir = temp_dir.path().join("entries");
        let mut leftovers = usize::MAX;
        for _ in 0..500 {
            leftovers = std::fs::read_dir(&entries_dir).unwrap().count();
            if leftovers == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_failed_eviction_does_not_stop_the_pass() {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(FailingEviction {
            inner: MemoryStore::new(clock.clone()),
            broken: "STUCK000",
        });
        let reaper = Reaper::new(store.clone(), clock.clone(), Duration::from_secs(60));

        let now = clock.now();
        for code in ["FIRST000", "STUCK000", "THIRD000"] {
            publish(store.as_ref(), code, now, ChronoDuration::hours(1)).await;
        }
        clock.advance(ChronoDuration::hours(2));

        let report = reaper.run_once().await.unwrap();
        assert_eq!(
            report,
            ReapReport {
                scanned: 3,
                evicted: 2,
                failed: 1
            }
        );
        assert_eq!(store.inner.stored_len(), 1);
        assert_eq!(reaper.state(), ReaperState::Idle);

        let expired: Vec<String> = store.list_expired(clock.now()).await.unwrap().collect().await;
        assert_eq!(expired, vec!["STUCK000".to_string()]);
    }

    #[tokio::test]
    async fn test_background_task_evicts_and_stops_on_cancel() {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(MemoryStore::new(clock.clone()));
        publish(store.as_ref(), "BGTASK00", clock.now(), ChronoDuration::hours(1)).await;
        clock.advance(ChronoDuration::hours(1));

        let reaper = Arc::new(Reaper::new(
            store.clone(),
            clock.clone(),
            Duration::from_millis(10),
        ));
        let shutdown = CancellationToken::new();
        let handle = reaper.clone().start(shutdown.clone());

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while store.stored_len() > 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(store.stored_len(), 0);

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}

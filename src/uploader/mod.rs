//! Client-side orchestration of file transfers. Each tracked item moves
//! through `Pending -> Uploading -> {Complete | Error | Paused}` with
//! `Paused -> Uploading` on resume; there is no direct edge from `Paused`
//! to `Complete`.
//!
//! True byte-level progress of the transfer is not observed, so an estimated
//! progress value is advanced on a timer while the request is in flight,
//! approaching but never reaching 100% on its own. Because the transfer is a
//! single atomic request, pause cannot abort it; pausing only stops the
//! estimate, and a result arriving while paused is discarded. Resume
//! restarts the whole transfer from zero.

use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use crate::models::FileRecord;

pub mod transport;

pub use transport::{HttpTransport, TransportError, UploadTransport};

const PROGRESS_CEILING: u8 = 95;
const DEFAULT_TICK: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Pending,
    Uploading,
    Paused,
    Complete,
    Error,
}

/// Ephemeral, in-process record of one transfer. Has no server-side
/// counterpart; dismissing it or dropping the manager loses it.
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub id: Uuid,
    pub file_name: String,
    pub content_type: Option<String>,
    pub size: usize,
    pub progress: u8,
    pub status: UploadStatus,
    pub error: Option<String>,
    pub result: Option<FileRecord>,
    payload: Arc<Vec<u8>>,
    attempt: u64,
}

#[derive(Clone)]
pub struct UploadManager {
    items: Arc<Mutex<HashMap<Uuid, UploadItem>>>,
    transport: Arc<dyn UploadTransport>,
    tick: Duration,
}

impl UploadManager {
    pub fn new(transport: Arc<dyn UploadTransport>) -> Self {
        Self::with_tick(transport, DEFAULT_TICK)
    }

    pub fn with_tick(transport: Arc<dyn UploadTransport>, tick: Duration) -> Self {
        Self {
            items: Arc::new(Mutex::new(HashMap::new())),
            transport,
            tick,
        }
    }

    /// Tracks a newly selected file and immediately starts its transfer.
    pub fn enqueue(&self, file_name: String, content_type: Option<String>, data: Vec<u8>) -> Uuid {
        let id = Uuid::new_v4();
        let item = UploadItem {
            id,
            size: data.len(),
            file_name,
            content_type,
            progress: 0,
            status: UploadStatus::Pending,
            error: None,
            result: None,
            payload: Arc::new(data),
            attempt: 0,
        };

        self.items.lock().unwrap().insert(id, item);
        self.start(id);
        id
    }

    /// Begins (or restarts) the transfer for a tracked item. Progress resets
    /// to zero: there is no partial transfer to continue from.
    fn start(&self, id: Uuid) {
        let started = {
            let mut items = self.items.lock().unwrap();
            items.get_mut(&id).map(|item| {
                item.status = UploadStatus::Uploading;
                item.error = None;
                item.result = None;
                item.progress = 0;
                item.attempt += 1;
                (
                    item.file_name.clone(),
                    item.content_type.clone(),
                    Arc::clone(&item.payload),
                    item.attempt,
                )
            })
        };

        let Some((file_name, content_type, payload, attempt)) = started else {
            return;
        };

        tokio::spawn(run_ticker(self.clone(), id, attempt));
        tokio::spawn(run_transfer(
            self.clone(),
            id,
            attempt,
            file_name,
            content_type,
            payload,
        ));
    }

    /// Halts the progress estimate and freezes the item. The in-flight
    /// request keeps running; its eventual result is discarded.
    pub fn pause(&self, id: Uuid) -> bool {
        let mut items = self.items.lock().unwrap();
        match items.get_mut(&id) {
            Some(item) if item.status == UploadStatus::Uploading => {
                item.status = UploadStatus::Paused;
                tracing::debug!(upload_id = %id, "Upload paused");
                true
            }
            _ => false,
        }
    }

    /// Restarts a paused item's transfer from the beginning.
    pub fn resume(&self, id: Uuid) -> bool {
        {
            let mut items = self.items.lock().unwrap();
            match items.get_mut(&id) {
                Some(item) if item.status == UploadStatus::Paused => {
                    item.status = UploadStatus::Pending;
                    item.progress = 0;
                }
                _ => return false,
            }
        }
        tracing::debug!(upload_id = %id, "Upload restarting");
        self.start(id);
        true
    }

    /// Removes the item from tracking. Valid in any state; an exit from
    /// tracking, not a state transition.
    pub fn dismiss(&self, id: Uuid) -> bool {
        self.items.lock().unwrap().remove(&id).is_some()
    }

    pub fn snapshot(&self, id: Uuid) -> Option<UploadItem> {
        self.items.lock().unwrap().get(&id).cloned()
    }

    pub fn items(&self) -> Vec<UploadItem> {
        self.items.lock().unwrap().values().cloned().collect()
    }
}

/// Advances the estimated progress while the item stays uploading at the
/// same attempt. Stops short of 100; only a confirmed transfer completes it.
async fn run_ticker(manager: UploadManager, id: Uuid, attempt: u64) {
    let mut interval = tokio::time::interval(manager.tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        let mut items = manager.items.lock().unwrap();
        match items.get_mut(&id) {
            Some(item) if item.attempt == attempt && item.status == UploadStatus::Uploading => {
                if item.progress < PROGRESS_CEILING {
                    let step = rand::thread_rng().gen_range(2..7);
                    item.progress = (item.progress + step).min(PROGRESS_CEILING);
                }
            }
            _ => break,
        }
    }
}

async fn run_transfer(
    manager: UploadManager,
    id: Uuid,
    attempt: u64,
    file_name: String,
    content_type: Option<String>,
    payload: Arc<Vec<u8>>,
) {
    let result = manager
        .transport
        .send(&file_name, content_type.as_deref(), payload.as_ref().clone())
        .await;

    let mut items = manager.items.lock().unwrap();
    let Some(item) = items.get_mut(&id) else {
        return; // dismissed while in flight
    };
    // The request could not be aborted; once the item has left this
    // attempt's Uploading state (paused, or restarting between a resume and
    // its new attempt) the outcome must not overwrite anything.
    if item.attempt != attempt || item.status != UploadStatus::Uploading {
        tracing::debug!(upload_id = %id, "Discarding stale transfer result");
        return;
    }

    match result {
        Ok(file) => {
            item.status = UploadStatus::Complete;
            item.progress = 100;
            item.result = Some(file);
        }
        Err(e) => {
            item.status = UploadStatus::Error;
            item.error = Some(e.to_string());
            tracing::warn!(upload_id = %id, error = %e, "Upload failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;

    struct MockTransport {
        delay: Duration,
        fail_with: Option<String>,
    }

    impl MockTransport {
        fn succeeding(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                delay,
                fail_with: None,
            })
        }

        fn failing(delay: Duration, message: &str) -> Arc<Self> {
            Arc::new(Self {
                delay,
                fail_with: Some(message.to_string()),
            })
        }
    }

    #[async_trait]
    impl UploadTransport for MockTransport {
        async fn send(
            &self,
            file_name: &str,
            content_type: Option<&str>,
            data: Vec<u8>,
        ) -> Result<FileRecord, TransportError> {
            tokio::time::sleep(self.delay).await;
            if let Some(message) = &self.fail_with {
                return Err(TransportError::Request(message.clone()));
            }
            Ok(FileRecord {
                id: Uuid::new_v4(),
                name: file_name.to_string(),
                owner_id: Uuid::new_v4(),
                size: data.len() as i64,
                mime_type: content_type.map(str::to_string),
                s3_key: format!("tester_example_com/0-{}", file_name),
                version: 1,
                created_at: Utc::now(),
            })
        }
    }

    async fn wait_until(
        manager: &UploadManager,
        id: Uuid,
        pred: impl Fn(&UploadItem) -> bool,
    ) -> UploadItem {
        for _ in 0..100_000 {
            if let Some(item) = manager.snapshot(id) {
                if pred(&item) {
                    return item;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("upload item never reached the expected state");
    }

    #[tokio::test(start_paused = true)]
    async fn successful_transfer_completes_with_full_progress() {
        let manager = UploadManager::new(MockTransport::succeeding(Duration::from_secs(2)));
        let id = manager.enqueue("notes.txt".into(), Some("text/plain".into()), b"0123456789".to_vec());

        let item = wait_until(&manager, id, |i| i.status == UploadStatus::Complete).await;
        assert_eq!(item.progress, 100);
        assert!(item.error.is_none());
        assert_eq!(item.result.as_ref().unwrap().size, 10);
        assert_eq!(item.result.as_ref().unwrap().name, "notes.txt");
    }

    #[tokio::test(start_paused = true)]
    async fn estimated_progress_stays_below_completion() {
        let manager = UploadManager::new(MockTransport::succeeding(Duration::from_secs(600)));
        let id = manager.enqueue("big.bin".into(), None, vec![0u8; 64]);

        // Long past the point where the simulation has saturated.
        tokio::time::sleep(Duration::from_secs(120)).await;
        let item = manager.snapshot(id).unwrap();
        assert_eq!(item.status, UploadStatus::Uploading);
        assert_eq!(item.progress, 95);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_transfer_keeps_the_message_and_partial_progress() {
        let manager = UploadManager::new(MockTransport::failing(
            Duration::from_secs(2),
            "connection reset",
        ));
        let id = manager.enqueue("notes.txt".into(), None, b"0123456789".to_vec());

        let item = wait_until(&manager, id, |i| i.status == UploadStatus::Error).await;
        assert!(item.progress < 100);
        assert_eq!(item.error.as_deref(), Some("connection reset"));
        assert!(item.result.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn pause_discards_the_in_flight_result() {
        let manager = UploadManager::new(MockTransport::succeeding(Duration::from_secs(5)));
        let id = manager.enqueue("notes.txt".into(), None, b"0123456789".to_vec());

        wait_until(&manager, id, |i| {
            i.status == UploadStatus::Uploading && i.progress > 0
        })
        .await;
        assert!(manager.pause(id));

        // The request finishes while paused; its result must not surface.
        tokio::time::sleep(Duration::from_secs(30)).await;
        let item = manager.snapshot(id).unwrap();
        assert_eq!(item.status, UploadStatus::Paused);
        assert!(item.progress < 100);
        assert!(item.result.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn resume_restarts_from_zero_and_completes() {
        let manager = UploadManager::new(MockTransport::succeeding(Duration::from_secs(5)));
        let id = manager.enqueue("notes.txt".into(), None, b"0123456789".to_vec());

        let paused_at = wait_until(&manager, id, |i| {
            i.status == UploadStatus::Uploading && i.progress >= 10
        })
        .await
        .progress;
        assert!(manager.pause(id));

        assert!(manager.resume(id));
        // Not resumed from the paused value: the whole transfer restarts.
        let restarted = manager.snapshot(id).unwrap();
        assert_eq!(restarted.status, UploadStatus::Uploading);
        assert!(restarted.progress < paused_at);

        let item = wait_until(&manager, id, |i| i.status == UploadStatus::Complete).await;
        assert_eq!(item.progress, 100);
    }

    /// Transport whose nth call sleeps for the nth delay and stamps the call
    /// index into the returned storage key.
    struct SequencedTransport {
        delays: Vec<Duration>,
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl UploadTransport for SequencedTransport {
        async fn send(
            &self,
            file_name: &str,
            content_type: Option<&str>,
            data: Vec<u8>,
        ) -> Result<FileRecord, TransportError> {
            let call = self
                .calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let delay = *self.delays.get(call).unwrap_or(&Duration::from_secs(1));
            tokio::time::sleep(delay).await;
            Ok(FileRecord {
                id: Uuid::new_v4(),
                name: file_name.to_string(),
                owner_id: Uuid::new_v4(),
                size: data.len() as i64,
                mime_type: content_type.map(str::to_string),
                s3_key: format!("tester_example_com/call-{}", call),
                version: 1,
                created_at: Utc::now(),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_attempts_cannot_overwrite_a_restarted_upload() {
        // First request hangs long past the pause/resume cycle; the retry
        // is quick.
        let manager = UploadManager::new(Arc::new(SequencedTransport {
            delays: vec![Duration::from_secs(100), Duration::from_secs(1)],
            calls: std::sync::atomic::AtomicUsize::new(0),
        }));
        let id = manager.enqueue("notes.txt".into(), None, b"0123456789".to_vec());

        wait_until(&manager, id, |i| {
            i.status == UploadStatus::Uploading && i.progress > 0
        })
        .await;
        assert!(manager.pause(id));
        assert!(manager.resume(id));

        let item = wait_until(&manager, id, |i| i.status == UploadStatus::Complete).await;
        assert_eq!(item.result.as_ref().unwrap().s3_key, "tester_example_com/call-1");

        // The original request finishes much later; its result must be
        // dropped, not applied over the completed restart.
        tokio::time::sleep(Duration::from_secs(200)).await;
        let item = manager.snapshot(id).unwrap();
        assert_eq!(item.status, UploadStatus::Complete);
        assert_eq!(item.progress, 100);
        assert_eq!(item.result.as_ref().unwrap().s3_key, "tester_example_com/call-1");
    }

    #[tokio::test(start_paused = true)]
    async fn pause_only_applies_to_uploading_items() {
        let manager = UploadManager::new(MockTransport::succeeding(Duration::from_millis(100)));
        let id = manager.enqueue("notes.txt".into(), None, b"x".to_vec());

        wait_until(&manager, id, |i| i.status == UploadStatus::Complete).await;
        assert!(!manager.pause(id));
        assert!(!manager.resume(id));
    }

    #[tokio::test(start_paused = true)]
    async fn items_progress_independently() {
        let manager = UploadManager::with_tick(
            MockTransport::succeeding(Duration::from_secs(2)),
            DEFAULT_TICK,
        );
        let failing = UploadManager {
            transport: MockTransport::failing(Duration::from_secs(2), "boom"),
            ..manager.clone()
        };

        let ok_id = manager.enqueue("ok.txt".into(), None, b"0123456789".to_vec());
        let bad_id = failing.enqueue("bad.txt".into(), None, b"0123456789".to_vec());

        let ok = wait_until(&manager, ok_id, |i| i.status == UploadStatus::Complete).await;
        let bad = wait_until(&manager, bad_id, |i| i.status == UploadStatus::Error).await;

        assert_eq!(ok.progress, 100);
        assert_eq!(bad.error.as_deref(), Some("boom"));
    }

    #[tokio::test(start_paused = true)]
    async fn dismiss_removes_the_item_in_any_state() {
        let manager = UploadManager::new(MockTransport::succeeding(Duration::from_secs(60)));
        let id = manager.enqueue("notes.txt".into(), None, b"x".to_vec());

        assert!(manager.dismiss(id));
        assert!(manager.snapshot(id).is_none());
        assert!(!manager.dismiss(id));

        // The orphaned transfer result has nowhere to land and is dropped.
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(manager.items().is_empty());
    }
}

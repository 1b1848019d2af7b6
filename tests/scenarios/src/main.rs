fn main() {
    println!("Run `cargo test -p transfer-scenarios` to execute the engine scenario tests.");
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use convoy_engine::{
        TokenFuture, TokenSupplier, TransferError, TransferEvent, Transport, TransportFuture,
        TransportReply, UploadRequest, Uploader, UploaderConfig,
    };
    use convoy_store::{FilePayload, ItemStatus};

    /// Scripted behavior for one file name.
    #[derive(Clone)]
    enum Script {
        Reply { status: u16, body: String },
        NetworkFail(String),
        /// Resolves only when the item's cancel token fires.
        Hang,
    }

    /// Scripted transport recording calls, aborts, and the high-water
    /// mark of concurrent sends. Unscripted files succeed with an id
    /// derived from the file name.
    struct MockTransport {
        delay: Duration,
        scripts: Mutex<HashMap<String, Script>>,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        aborted: Mutex<Vec<String>>,
    }

    impl MockTransport {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                delay,
                scripts: Mutex::new(HashMap::new()),
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                aborted: Mutex::new(Vec::new()),
            })
        }

        fn script(&self, file_name: &str, script: Script) {
            self.scripts.lock().unwrap().insert(file_name.into(), script);
        }

        fn unscript(&self, file_name: &str) {
            self.scripts.lock().unwrap().remove(file_name);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn max_in_flight(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }

        fn aborted(&self) -> Vec<String> {
            self.aborted.lock().unwrap().clone()
        }
    }

    impl Transport for MockTransport {
        fn send(
            &self,
            req: UploadRequest,
            progress: mpsc::Sender<u8>,
            cancel: CancellationToken,
        ) -> TransportFuture<'_> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                let n = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_in_flight.fetch_max(n, Ordering::SeqCst);
                let _ = progress.try_send(25);

                let script = self.scripts.lock().unwrap().get(&req.file_name).cloned();
                let run = async {
                    tokio::time::sleep(self.delay).await;
                    let _ = progress.try_send(75);
                    match script {
                        Some(Script::Reply { status, body }) => {
                            Ok(TransportReply { status, body })
                        }
                        Some(Script::NetworkFail(msg)) => Err(TransferError::Network(msg)),
                        Some(Script::Hang) => {
                            tokio::time::sleep(Duration::from_secs(600)).await;
                            Err(TransferError::Network("hang elapsed".into()))
                        }
                        None => Ok(TransportReply {
                            status: 200,
                            body: format!(r#"{{"id":"srv-{}"}}"#, req.file_name),
                        }),
                    }
                };

                let result = tokio::select! {
                    _ = cancel.cancelled() => {
                        self.aborted.lock().unwrap().push(req.file_name.clone());
                        Err(TransferError::Cancelled)
                    }
                    r = run => r,
                };
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                result
            })
        }
    }

    /// Token supplier that is never authenticated.
    struct AbsentToken;

    impl TokenSupplier for AbsentToken {
        fn bearer_token(&self) -> TokenFuture<'_> {
            Box::pin(async { None })
        }
    }

    fn uploader(transport: Arc<MockTransport>, concurrency: usize) -> Uploader {
        let config = UploaderConfig {
            destination: "https://api.example/upload".into(),
            concurrency,
            admission_delay_ms: None,
        };
        Uploader::new(config, transport)
    }

    fn select_files(uploader: &Uploader, count: usize) -> Vec<String> {
        (0..count)
            .map(|i| {
                uploader
                    .select(FilePayload::new(
                        format!("f{i}.bin"),
                        "application/octet-stream",
                        vec![0u8; 32],
                    ))
                    .local_id
            })
            .collect()
    }

    fn drain(rx: &mut mpsc::Receiver<TransferEvent>) -> Vec<TransferEvent> {
        let mut events = Vec::new();
        while let Ok(e) = rx.try_recv() {
            events.push(e);
        }
        events
    }

    // Scenario A: 5 items, limit 2 — the window is never exceeded and
    // every item reaches a terminal state.
    #[tokio::test]
    async fn five_items_limit_two_all_terminal() {
        let transport = MockTransport::new(Duration::from_millis(20));
        let uploader = uploader(Arc::clone(&transport), 2);
        let ids = select_files(&uploader, 5);

        let summary = uploader.start_all().await.unwrap();

        assert_eq!(summary.succeeded.len(), 5);
        assert!(transport.max_in_flight() <= 2, "saw {}", transport.max_in_flight());
        for id in &ids {
            let snap = uploader.get(id).unwrap();
            assert_eq!(snap.status, ItemStatus::Done);
            assert_eq!(snap.progress, 100);
            assert!(snap.server_id.is_some());
        }
    }

    // Scenario B: HTTP 500 → error whose cause carries the status; an
    // explicit retry re-queues the item and the next run re-attempts it.
    #[tokio::test]
    async fn server_rejection_then_explicit_retry() {
        let transport = MockTransport::new(Duration::ZERO);
        transport.script(
            "f0.bin",
            Script::Reply {
                status: 500,
                body: "internal error".into(),
            },
        );
        let uploader = uploader(Arc::clone(&transport), 2);
        let ids = select_files(&uploader, 1);

        let summary = uploader.start_all().await.unwrap();
        assert_eq!(summary.failed.len(), 1);
        assert!(summary.failed[0].error.contains("500"));

        let snap = uploader.get(&ids[0]).unwrap();
        assert_eq!(snap.status, ItemStatus::Error);
        assert!(snap.error.as_deref().unwrap().contains("500"));
        assert!(snap.server_id.is_none());

        let snaps = uploader.retry(&ids[0]);
        assert_eq!(snaps[0].status, ItemStatus::Queued);
        assert!(snaps[0].error.is_none());

        transport.unscript("f0.bin");
        let summary = uploader.start_all().await.unwrap();
        assert_eq!(summary.succeeded.len(), 1);
        assert_eq!(uploader.get(&ids[0]).unwrap().status, ItemStatus::Done);
        assert_eq!(transport.calls(), 2);
    }

    // Scenario C: cancel mid-upload — the item flips to cancelled
    // immediately, the transport sees the abort, and no done/error
    // event ever follows for that id.
    #[tokio::test]
    async fn cancel_mid_upload() {
        let transport = MockTransport::new(Duration::ZERO);
        transport.script("f0.bin", Script::Hang);
        let mut uploader = uploader(Arc::clone(&transport), 1);
        let mut events_rx = uploader.take_events().unwrap();
        let ids = select_files(&uploader, 1);

        let uploader = Arc::new(uploader);
        let runner = {
            let uploader = Arc::clone(&uploader);
            tokio::spawn(async move { uploader.start_all().await })
        };

        // Wait until the item is actually in flight.
        for _ in 0..100 {
            if uploader.get(&ids[0]).map(|s| s.status) == Some(ItemStatus::Uploading) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(uploader.get(&ids[0]).unwrap().status, ItemStatus::Uploading);

        let snaps = uploader.cancel(&ids[0]);
        // Visible state flips immediately, before the transport unwinds.
        assert_eq!(snaps[0].status, ItemStatus::Cancelled);
        assert_eq!(snaps[0].progress, 0);
        assert!(snaps[0].server_id.is_none());

        let summary = runner.await.unwrap().unwrap();
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].error, "cancelled");
        assert_eq!(transport.aborted(), vec!["f0.bin".to_string()]);

        // No done/error event after the cancellation.
        let events = drain(&mut events_rx);
        let cancelled_at = events
            .iter()
            .position(|e| {
                matches!(e, TransferEvent::StatusChanged { local_id, status: ItemStatus::Cancelled } if *local_id == ids[0])
            })
            .expect("cancelled event present");
        for event in &events[cancelled_at + 1..] {
            if let TransferEvent::StatusChanged { local_id, status } = event
                && *local_id == ids[0]
            {
                panic!("event after cancellation: {status:?}");
            }
        }
    }

    // Scenario D: absent credential — the task fails with AuthMissing
    // and the transport never sees a request.
    #[tokio::test]
    async fn absent_credential_fails_before_any_request() {
        let transport = MockTransport::new(Duration::ZERO);
        let uploader = uploader(Arc::clone(&transport), 2).with_token_supplier(Arc::new(AbsentToken));
        let ids = select_files(&uploader, 1);

        let summary = uploader.start_all().await.unwrap();

        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].error, "no credential available");
        assert_eq!(transport.calls(), 0);
        assert_eq!(uploader.get(&ids[0]).unwrap().status, ItemStatus::Error);
    }

    #[tokio::test]
    async fn network_failure_is_isolated_to_its_item() {
        let transport = MockTransport::new(Duration::from_millis(5));
        transport.script("f1.bin", Script::NetworkFail("connection reset".into()));
        let uploader = uploader(Arc::clone(&transport), 3);
        let ids = select_files(&uploader, 3);

        let summary = uploader.start_all().await.unwrap();

        assert_eq!(summary.succeeded.len(), 2);
        assert_eq!(summary.failed.len(), 1);
        let failed = uploader.get(&ids[1]).unwrap();
        assert_eq!(failed.status, ItemStatus::Error);
        assert!(failed.error.as_deref().unwrap().contains("connection reset"));
    }

    #[tokio::test]
    async fn remove_mid_upload_aborts_before_deletion() {
        let transport = MockTransport::new(Duration::ZERO);
        transport.script("f0.bin", Script::Hang);
        let uploader = Arc::new(self::uploader(Arc::clone(&transport), 1));
        let ids = select_files(&uploader, 1);

        let runner = {
            let uploader = Arc::clone(&uploader);
            tokio::spawn(async move { uploader.start_all().await })
        };
        for _ in 0..100 {
            if uploader.get(&ids[0]).map(|s| s.status) == Some(ItemStatus::Uploading) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let snaps = uploader.remove(&ids[0]);
        assert!(snaps.is_empty());
        assert!(uploader.get(&ids[0]).is_none());

        runner.await.unwrap().unwrap();
        // The transport observed the abort before the entry vanished.
        assert_eq!(transport.aborted(), vec!["f0.bin".to_string()]);
    }

    #[tokio::test]
    async fn double_cancel_is_idempotent() {
        let transport = MockTransport::new(Duration::ZERO);
        transport.script("f0.bin", Script::Hang);
        let uploader = Arc::new(self::uploader(Arc::clone(&transport), 1));
        let ids = select_files(&uploader, 1);

        let runner = {
            let uploader = Arc::clone(&uploader);
            tokio::spawn(async move { uploader.start_all().await })
        };
        for _ in 0..100 {
            if uploader.get(&ids[0]).map(|s| s.status) == Some(ItemStatus::Uploading) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let once = uploader.cancel(&ids[0]);
        let twice = uploader.cancel(&ids[0]);
        assert_eq!(once, twice);
        assert_eq!(once[0].status, ItemStatus::Cancelled);
        runner.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn retry_on_non_error_changes_nothing() {
        let transport = MockTransport::new(Duration::ZERO);
        let uploader = uploader(Arc::clone(&transport), 1);
        let ids = select_files(&uploader, 1);

        let before = uploader.snapshot();
        assert_eq!(uploader.retry(&ids[0]), before);

        uploader.start_all().await.unwrap();
        let before = uploader.snapshot();
        assert_eq!(uploader.retry(&ids[0]), before);
        assert_eq!(uploader.get(&ids[0]).unwrap().status, ItemStatus::Done);
    }

    #[tokio::test]
    async fn per_item_progress_is_ordered_and_terminal_last() {
        let transport = MockTransport::new(Duration::from_millis(10));
        let mut uploader = uploader(Arc::clone(&transport), 2);
        let mut events_rx = uploader.take_events().unwrap();
        let ids = select_files(&uploader, 3);

        uploader.start_all().await.unwrap();
        let events = drain(&mut events_rx);

        for id in &ids {
            let mut last_progress = 0u8;
            let mut terminal_seen = false;
            for event in &events {
                match event {
                    TransferEvent::Progress { local_id, percent } if local_id == id => {
                        assert!(!terminal_seen, "progress after terminal for {id}");
                        assert!(*percent >= last_progress);
                        last_progress = *percent;
                    }
                    TransferEvent::StatusChanged { local_id, status } if local_id == id => {
                        if status.is_terminal() {
                            terminal_seen = true;
                        }
                    }
                    _ => {}
                }
            }
            assert!(terminal_seen, "no terminal event for {id}");
        }
    }

    #[tokio::test]
    async fn malformed_success_body_synthesizes_server_id() {
        let transport = MockTransport::new(Duration::ZERO);
        transport.script(
            "f0.bin",
            Script::Reply {
                status: 200,
                body: "<html>ok</html>".into(),
            },
        );
        let uploader = uploader(Arc::clone(&transport), 1);
        let ids = select_files(&uploader, 1);

        let summary = uploader.start_all().await.unwrap();

        // A 2xx with an unusable body is still a success.
        assert_eq!(summary.succeeded.len(), 1);
        assert!(summary.succeeded[0].server.id.starts_with("local-"));
        let snap = uploader.get(&ids[0]).unwrap();
        assert_eq!(snap.status, ItemStatus::Done);
        assert!(snap.server_id.as_deref().unwrap().starts_with("local-"));
    }

    #[tokio::test]
    async fn zero_concurrency_is_rejected() {
        let transport = MockTransport::new(Duration::ZERO);
        let uploader = uploader(transport, 0);
        let result = uploader.start_all().await;
        assert!(matches!(result, Err(TransferError::InvalidLimit(0))));
    }
}

#[cfg(test)]
mod tests {
    use crate::broker::protocol::{DocumentTask, PartialIndexResult, WorkerHeartbeat};
    use crate::broker::{Broker, BrokerClient, MemoryBroker};
    use crate::coordinator::dispatcher::{DispatchError, Dispatcher};
    use crate::coordinator::index::GlobalIndex;
    use crate::coordinator::merger::Merger;
    use crate::coordinator::{query, status};
    use crate::normalizer::Language;
    use crate::worker::WorkerRuntime;
    use dashmap::DashSet;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::watch;
    use tokio::time::timeout;

    const TTL: Duration = Duration::from_secs(6);
    const RECV_TIMEOUT: Duration = Duration::from_secs(2);

    fn client() -> (Arc<MemoryBroker>, BrokerClient) {
        let substrate = Arc::new(MemoryBroker::new());
        let client = BrokerClient::new(substrate.clone());
        (substrate, client)
    }

    async fn beat(client: &BrokerClient, worker_id: &str, cpu: f32, ram: f32) {
        client
            .write_heartbeat(
                worker_id,
                &WorkerHeartbeat {
                    cpu_percent: cpu,
                    ram_percent: ram,
                },
                TTL,
            )
            .await
            .unwrap();
    }

    fn partial_for(
        doc_id: &str,
        entries: &[(&str, u64)],
    ) -> HashMap<String, HashMap<String, u64>> {
        entries
            .iter()
            .map(|(term, freq)| {
                (
                    term.to_string(),
                    HashMap::from([(doc_id.to_string(), *freq)]),
                )
            })
            .collect()
    }

    // ============================================================
    // DISPATCHER - worker selection
    // ============================================================

    #[tokio::test]
    async fn test_select_worker_prefers_empty_queue() {
        let (_substrate, broker) = client();
        let dispatcher = Dispatcher::new(broker.clone(), Arc::new(DashSet::new()));

        // w1: queue=2, cpu=10, ram=10 -> 2*10 + 5 + 3 = 28
        // w2: queue=0, cpu=10, ram=10 -> 0 + 5 + 3 = 8
        beat(&broker, "w1", 10.0, 10.0).await;
        beat(&broker, "w2", 10.0, 10.0).await;
        for n in 0..2 {
            broker
                .enqueue_task(
                    "w1",
                    &DocumentTask {
                        doc_id: format!("queued-{}.txt", n),
                        content: "text".to_string(),
                    },
                )
                .await
                .unwrap();
        }

        let selected = dispatcher.select_worker().await.unwrap();
        assert_eq!(selected, "w2");
    }

    #[tokio::test]
    async fn test_select_worker_composite_score_balances_queue_and_load() {
        let (_substrate, broker) = client();
        let dispatcher = Dispatcher::new(broker.clone(), Arc::new(DashSet::new()));

        // w1: queue=5, cpu=10, ram=10 -> 58; w2: queue=0, cpu=90, ram=90 -> 72.
        // The queue term dominates but does not blindly win.
        beat(&broker, "w1", 10.0, 10.0).await;
        beat(&broker, "w2", 90.0, 90.0).await;
        for n in 0..5 {
            broker
                .enqueue_task(
                    "w1",
                    &DocumentTask {
                        doc_id: format!("queued-{}.txt", n),
                        content: "text".to_string(),
                    },
                )
                .await
                .unwrap();
        }

        let selected = dispatcher.select_worker().await.unwrap();
        assert_eq!(selected, "w1");
    }

    #[tokio::test]
    async fn test_select_worker_tie_breaks_lexicographically() {
        let (_substrate, broker) = client();
        let dispatcher = Dispatcher::new(broker.clone(), Arc::new(DashSet::new()));

        beat(&broker, "w2", 20.0, 20.0).await;
        beat(&broker, "w1", 20.0, 20.0).await;

        let selected = dispatcher.select_worker().await.unwrap();
        assert_eq!(selected, "w1");
    }

    #[tokio::test]
    async fn test_select_worker_fails_without_live_workers() {
        let (_substrate, broker) = client();
        let dispatcher = Dispatcher::new(broker, Arc::new(DashSet::new()));

        let result = dispatcher.select_worker().await;
        assert!(matches!(result, Err(DispatchError::NoWorkersAvailable)));
    }

    #[tokio::test]
    async fn test_select_worker_ignores_expired_heartbeat() {
        let (_substrate, broker) = client();
        let dispatcher = Dispatcher::new(broker.clone(), Arc::new(DashSet::new()));

        broker
            .write_heartbeat(
                "w1",
                &WorkerHeartbeat {
                    cpu_percent: 0.0,
                    ram_percent: 0.0,
                },
                Duration::from_millis(40),
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;

        // Heartbeat gone: the dispatcher must refuse to route to the worker.
        let result = dispatcher.select_worker().await;
        assert!(matches!(result, Err(DispatchError::NoWorkersAvailable)));
    }

    #[tokio::test]
    async fn test_dispatch_enqueues_on_selected_worker() {
        let (_substrate, broker) = client();
        let dispatcher = Dispatcher::new(broker.clone(), Arc::new(DashSet::new()));
        beat(&broker, "w1", 0.0, 0.0).await;

        let worker_id = dispatcher
            .dispatch(&DocumentTask {
                doc_id: "a.txt".to_string(),
                content: "alpha".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(worker_id, "w1");
        assert_eq!(broker.queue_length("w1").await.unwrap(), 1);
    }

    // ============================================================
    // DISPATCHER - indexing trigger
    // ============================================================

    #[tokio::test]
    async fn test_scan_and_dispatch_reports_per_file() {
        let (_substrate, broker) = client();
        let pending = Arc::new(DashSet::new());
        let dispatcher = Dispatcher::new(broker.clone(), pending.clone());
        beat(&broker, "w1", 0.0, 0.0).await;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "Cats and dogs").unwrap();
        std::fs::write(dir.path().join("blank.txt"), "   \n\t  ").unwrap();
        std::fs::write(dir.path().join("ignored.md"), "not a txt file").unwrap();

        let report = dispatcher.scan_and_dispatch(dir.path()).await.unwrap();

        assert_eq!(report.files_found, 2);
        assert_eq!(report.successful_dispatches, vec!["a.txt"]);
        assert_eq!(report.failed_files.len(), 1);
        assert_eq!(report.failed_files[0].0, "blank.txt");
        assert!(report.failed_files[0].1.contains("empty or whitespace"));

        // Only the dispatched doc is pending, and its task is queued.
        assert!(pending.contains("a.txt"));
        assert!(!pending.contains("blank.txt"));
        assert_eq!(broker.queue_length("w1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_scan_and_dispatch_rejects_non_directory() {
        let (_substrate, broker) = client();
        let dispatcher = Dispatcher::new(broker.clone(), Arc::new(DashSet::new()));
        beat(&broker, "w1", 0.0, 0.0).await;

        let result = dispatcher
            .scan_and_dispatch(std::path::Path::new("/no/such/directory"))
            .await;

        assert!(matches!(result, Err(DispatchError::PathNotDirectory(_))));
    }

    #[tokio::test]
    async fn test_scan_and_dispatch_fails_without_workers() {
        let (_substrate, broker) = client();
        let dispatcher = Dispatcher::new(broker, Arc::new(DashSet::new()));

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "content").unwrap();

        let result = dispatcher.scan_and_dispatch(dir.path()).await;
        assert!(matches!(result, Err(DispatchError::NoWorkersAvailable)));
    }

    // ============================================================
    // GLOBAL INDEX - merging
    // ============================================================

    #[test]
    fn test_merge_partial_inserts_postings() {
        let index = GlobalIndex::new();

        index.merge_partial("a.txt", &partial_for("a.txt", &[("cat", 2), ("dog", 1)]));

        assert_eq!(index.term_count(), 2);
        assert_eq!(index.postings("cat"), vec![("a.txt".to_string(), 2)]);
    }

    #[test]
    fn test_merge_partial_last_writer_wins() {
        let index = GlobalIndex::new();

        index.merge_partial("a.txt", &partial_for("a.txt", &[("cat", 2)]));
        index.merge_partial("a.txt", &partial_for("a.txt", &[("cat", 7)]));

        assert_eq!(index.postings("cat"), vec![("a.txt".to_string(), 7)]);
    }

    #[test]
    fn test_merge_partial_is_idempotent() {
        let index = GlobalIndex::new();
        let partial = partial_for("a.txt", &[("cat", 3)]);

        index.merge_partial("a.txt", &partial);
        index.merge_partial("a.txt", &partial);

        assert_eq!(index.postings("cat"), vec![("a.txt".to_string(), 3)]);
    }

    #[test]
    fn test_merge_partial_skips_mismatched_doc_id() {
        let index = GlobalIndex::new();

        // Inner map mentions a different document than the result claims.
        let partial = HashMap::from([(
            "cat".to_string(),
            HashMap::from([("other.txt".to_string(), 5u64)]),
        )]);
        index.merge_partial("a.txt", &partial);

        assert_eq!(index.term_count(), 0);
    }

    #[test]
    fn test_merge_partial_skips_zero_frequency() {
        let index = GlobalIndex::new();

        index.merge_partial("a.txt", &partial_for("a.txt", &[("cat", 0), ("dog", 1)]));

        assert_eq!(index.term_count(), 1);
        assert!(index.postings("cat").is_empty());
    }

    #[test]
    fn test_all_frequencies_are_positive() {
        let index = GlobalIndex::new();
        index.merge_partial("a.txt", &partial_for("a.txt", &[("cat", 2), ("dog", 0)]));
        index.merge_partial("b.txt", &partial_for("b.txt", &[("cat", 1)]));

        for term in ["cat", "dog"] {
            for (_, freq) in index.postings(term) {
                assert!(freq >= 1);
            }
        }
    }

    // ============================================================
    // GLOBAL INDEX - postings order
    // ============================================================

    #[test]
    fn test_postings_sorted_by_frequency_then_doc_id() {
        let index = GlobalIndex::new();
        index.merge_partial("a.txt", &partial_for("a.txt", &[("beta", 1)]));
        index.merge_partial("b.txt", &partial_for("b.txt", &[("beta", 3)]));
        index.merge_partial("c.txt", &partial_for("c.txt", &[("beta", 1)]));

        assert_eq!(
            index.postings("beta"),
            vec![
                ("b.txt".to_string(), 3),
                ("a.txt".to_string(), 1),
                ("c.txt".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_postings_absent_term_is_empty() {
        let index = GlobalIndex::new();
        assert!(index.postings("nothing").is_empty());
    }

    // ============================================================
    // GLOBAL INDEX - persistence
    // ============================================================

    #[tokio::test]
    async fn test_save_load_round_trip_is_identity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json.gz");

        let index = GlobalIndex::new();
        index.merge_partial("a.txt", &partial_for("a.txt", &[("alpha", 2), ("beta", 1)]));
        index.merge_partial("b.txt", &partial_for("b.txt", &[("alpha", 1), ("beta", 3)]));
        index.save(&path).await.unwrap();

        let restored = GlobalIndex::new();
        let terms = restored.load(&path).await.unwrap();

        assert_eq!(terms, 2);
        assert_eq!(
            restored.postings("alpha"),
            vec![("a.txt".to_string(), 2), ("b.txt".to_string(), 1)]
        );
        assert_eq!(
            restored.postings("beta"),
            vec![("b.txt".to_string(), 3), ("a.txt".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn test_snapshot_is_gzipped_bare_object() {
        use flate2::read::GzDecoder;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json.gz");

        let index = GlobalIndex::new();
        index.merge_partial("a.txt", &partial_for("a.txt", &[("cat", 2)]));
        index.save(&path).await.unwrap();

        let file = std::fs::File::open(&path).unwrap();
        let value: serde_json::Value = serde_json::from_reader(GzDecoder::new(file)).unwrap();

        // Top-level object is {term: {doc_id: freq}}, no wrapper or header.
        assert_eq!(value["cat"]["a.txt"], 2);
        assert_eq!(value.as_object().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_load_missing_snapshot_yields_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.json.gz");

        let index = GlobalIndex::new();
        index.merge_partial("a.txt", &partial_for("a.txt", &[("cat", 2)]));

        let terms = index.load(&path).await.unwrap();
        assert_eq!(terms, 0);
        assert_eq!(index.term_count(), 0);
    }

    // ============================================================
    // MERGER
    // ============================================================

    #[tokio::test]
    async fn test_merger_merges_and_clears_pending() {
        let (_substrate, broker) = client();
        let index = Arc::new(GlobalIndex::new());
        let pending = Arc::new(DashSet::new());
        pending.insert("a.txt".to_string());

        let merger = Merger::new(broker, index.clone(), pending.clone());
        let result = PartialIndexResult {
            worker_id: "w1".to_string(),
            doc_id: "a.txt".to_string(),
            partial: partial_for("a.txt", &[("cat", 2)]),
        };
        merger
            .handle_message(&serde_json::to_string(&result).unwrap())
            .await;

        assert_eq!(index.postings("cat"), vec![("a.txt".to_string(), 2)]);
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_merger_drops_malformed_message() {
        let (_substrate, broker) = client();
        let index = Arc::new(GlobalIndex::new());
        let pending = Arc::new(DashSet::new());
        pending.insert("a.txt".to_string());

        let merger = Merger::new(broker, index.clone(), pending.clone());
        merger.handle_message("{ not json").await;

        assert_eq!(index.term_count(), 0);
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn test_merger_empty_partial_still_clears_pending() {
        let (_substrate, broker) = client();
        let index = Arc::new(GlobalIndex::new());
        let pending = Arc::new(DashSet::new());
        pending.insert("empty.txt".to_string());

        let merger = Merger::new(broker, index.clone(), pending.clone());
        let result = PartialIndexResult::empty("w1", "empty.txt");
        merger
            .handle_message(&serde_json::to_string(&result).unwrap())
            .await;

        assert_eq!(index.term_count(), 0);
        assert!(pending.is_empty());
    }

    // ============================================================
    // QUERY ENGINE
    // ============================================================

    #[test]
    fn test_search_normalizes_term() {
        let index = GlobalIndex::new();
        index.merge_partial("a.txt", &partial_for("a.txt", &[("cat", 2)]));

        // "Cats" must stem to the same token the documents produced.
        let docs = query::search(&index, Language::English, "Cats");
        assert_eq!(docs, vec![("a.txt".to_string(), 2)]);
    }

    #[test]
    fn test_search_stopword_returns_empty() {
        let index = GlobalIndex::new();
        index.merge_partial("a.txt", &partial_for("a.txt", &[("cat", 2)]));

        let docs = query::search(&index, Language::English, "and");
        assert!(docs.is_empty());
    }

    #[test]
    fn test_search_punctuation_returns_empty() {
        let index = GlobalIndex::new();
        let docs = query::search(&index, Language::English, "?!...");
        assert!(docs.is_empty());
    }

    #[test]
    fn test_search_multi_token_uses_first() {
        let index = GlobalIndex::new();
        index.merge_partial("a.txt", &partial_for("a.txt", &[("alpha", 2)]));
        index.merge_partial("b.txt", &partial_for("b.txt", &[("beta", 5)]));

        let docs = query::search(&index, Language::English, "alpha beta");
        assert_eq!(docs, vec![("a.txt".to_string(), 2)]);
    }

    #[test]
    fn test_search_ranking_by_frequency() {
        let index = GlobalIndex::new();
        index.merge_partial("a.txt", &partial_for("a.txt", &[("alpha", 2), ("beta", 1)]));
        index.merge_partial("b.txt", &partial_for("b.txt", &[("alpha", 1), ("beta", 3)]));

        let docs = query::search(&index, Language::English, "beta");
        assert_eq!(
            docs,
            vec![("b.txt".to_string(), 3), ("a.txt".to_string(), 1)]
        );
    }

    // ============================================================
    // STATUS AGGREGATOR
    // ============================================================

    #[tokio::test]
    async fn test_list_workers_composes_status_view() {
        let (_substrate, broker) = client();
        beat(&broker, "w2", 20.0, 30.0).await;
        beat(&broker, "w1", 10.0, 15.0).await;
        broker
            .enqueue_task(
                "w1",
                &DocumentTask {
                    doc_id: "a.txt".to_string(),
                    content: "text".to_string(),
                },
            )
            .await
            .unwrap();

        let workers = status::list_workers(&broker).await.unwrap();

        assert_eq!(workers.len(), 2);
        // Lexicographic order by worker id.
        assert_eq!(workers[0].worker_id, "w1");
        assert_eq!(workers[1].worker_id, "w2");
        assert_eq!(workers[0].cpu_percent, 10.0);
        assert_eq!(workers[0].queue_length, 1);
        assert_eq!(workers[1].queue_length, 0);
        assert!(workers[0].status_ttl_seconds.unwrap() > 0);
    }

    #[tokio::test]
    async fn test_list_workers_omits_malformed_records() {
        let (substrate, broker) = client();
        beat(&broker, "w1", 10.0, 15.0).await;
        substrate
            .set_with_ttl("worker_status:broken", "garbage", TTL)
            .await
            .unwrap();

        let workers = status::list_workers(&broker).await.unwrap();

        assert_eq!(workers.len(), 1);
        assert_eq!(workers[0].worker_id, "w1");
    }

    #[tokio::test]
    async fn test_list_workers_drops_expired_worker() {
        let (_substrate, broker) = client();
        broker
            .write_heartbeat(
                "w1",
                &WorkerHeartbeat {
                    cpu_percent: 1.0,
                    ram_percent: 1.0,
                },
                Duration::from_millis(40),
            )
            .await
            .unwrap();

        assert_eq!(status::list_workers(&broker).await.unwrap().len(), 1);
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(status::list_workers(&broker).await.unwrap().is_empty());
    }

    // ============================================================
    // END TO END - dispatch, process, merge, search
    // ============================================================

    #[tokio::test]
    async fn test_full_pipeline_single_document() {
        let (_substrate, broker) = client();
        let index = Arc::new(GlobalIndex::new());
        let pending = Arc::new(DashSet::new());
        let dispatcher = Dispatcher::new(broker.clone(), pending.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        beat(&broker, "w1", 0.0, 0.0).await;

        // Merger first so the subscription exists before anything publishes.
        let merger = Merger::new(broker.clone(), index.clone(), pending.clone());
        let merger_handle = tokio::spawn(merger.run(shutdown_rx.clone()));
        tokio::time::sleep(Duration::from_millis(20)).await;

        let worker = WorkerRuntime::new(broker.clone(), "w1".to_string(), Language::English)
            .with_dequeue_timeout(Duration::from_millis(50));
        let worker_handle = tokio::spawn(worker.run(shutdown_rx));

        pending.insert("a.txt".to_string());
        dispatcher
            .dispatch(&DocumentTask {
                doc_id: "a.txt".to_string(),
                content: "Cats and dogs and cats".to_string(),
            })
            .await
            .unwrap();

        // The doc leaves the pending set once its partial has been merged.
        let drained = timeout(RECV_TIMEOUT, async {
            while !pending.is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(drained.is_ok(), "pending set never drained");

        let docs = query::search(&index, Language::English, "cat");
        assert_eq!(docs, vec![("a.txt".to_string(), 2)]);

        // Stopwords never reach the index.
        let docs = query::search(&index, Language::English, "and");
        assert!(docs.is_empty());

        shutdown_tx.send(true).unwrap();
        let _ = timeout(RECV_TIMEOUT, worker_handle).await;
        let _ = timeout(RECV_TIMEOUT, merger_handle).await;
    }

    #[tokio::test]
    async fn test_full_pipeline_ranking_across_documents() {
        let (_substrate, broker) = client();
        let index = Arc::new(GlobalIndex::new());
        let pending = Arc::new(DashSet::new());
        let dispatcher = Dispatcher::new(broker.clone(), pending.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        beat(&broker, "w1", 0.0, 0.0).await;

        let merger = Merger::new(broker.clone(), index.clone(), pending.clone());
        let merger_handle = tokio::spawn(merger.run(shutdown_rx.clone()));
        tokio::time::sleep(Duration::from_millis(20)).await;

        let worker = WorkerRuntime::new(broker.clone(), "w1".to_string(), Language::English)
            .with_dequeue_timeout(Duration::from_millis(50));
        let worker_handle = tokio::spawn(worker.run(shutdown_rx));

        for (doc_id, content) in [
            ("a.txt", "alpha alpha beta"),
            ("b.txt", "alpha beta beta beta"),
        ] {
            pending.insert(doc_id.to_string());
            dispatcher
                .dispatch(&DocumentTask {
                    doc_id: doc_id.to_string(),
                    content: content.to_string(),
                })
                .await
                .unwrap();
        }

        let drained = timeout(RECV_TIMEOUT, async {
            while !pending.is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(drained.is_ok(), "pending set never drained");

        assert_eq!(
            query::search(&index, Language::English, "beta"),
            vec![("b.txt".to_string(), 3), ("a.txt".to_string(), 1)]
        );
        assert_eq!(
            query::search(&index, Language::English, "alpha"),
            vec![("a.txt".to_string(), 2), ("b.txt".to_string(), 1)]
        );

        shutdown_tx.send(true).unwrap();
        let _ = timeout(RECV_TIMEOUT, worker_handle).await;
        let _ = timeout(RECV_TIMEOUT, merger_handle).await;
    }
}

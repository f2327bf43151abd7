use outbox_pipeline::{
    Dispatcher, OutboxStatus, OutboxStoreExt, Pipeline, Publisher, SqliteOutboxStore,
};

use crate::support::{fast_options, Failing, Recorder};

#[test]
fn failures_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("outbox.db");

    let id = {
        let store = SqliteOutboxStore::open(&path).unwrap();
        let record = Publisher::new(store.clone()).publish_as("Ping", &"hi").unwrap();

        let pipeline = Pipeline::builder().step(Failing("boom")).build();
        let dispatcher = Dispatcher::new(store, pipeline, fast_options()).unwrap();
        for _ in 0..3 {
            dispatcher.run_once().unwrap();
        }
        record.id
    };

    let reopened = SqliteOutboxStore::open(&path).unwrap();
    let failed = reopened.record(id).unwrap().unwrap();
    assert_eq!(failed.status, OutboxStatus::Failed);
    assert_eq!(failed.retry_count, 3);
    assert_eq!(failed.last_error.as_deref(), Some("boom"));
    assert!(!failed.is_processed);
}

#[test]
fn batches_drain_oldest_first() {
    let store = SqliteOutboxStore::open_in_memory().unwrap();
    let publisher = Publisher::new(store.clone());
    let ids: Vec<_> = (0..15)
        .map(|i| publisher.publish_as("Tick", &i).unwrap().id)
        .collect();

    let recorder = Recorder::new();
    let pipeline = Pipeline::builder().step(recorder.clone()).build();
    let dispatcher =
        Dispatcher::new(store.clone(), pipeline, fast_options().with_batch_size(10)).unwrap();

    let report = dispatcher.run_once().unwrap();
    assert_eq!(report.completed, 10);
    assert_eq!(recorder.seen(), ids[..10].to_vec());
    assert_eq!(store.count_by_status(OutboxStatus::Pending).unwrap(), 5);
    assert_eq!(store.count_by_status(OutboxStatus::Completed).unwrap(), 10);

    let completed = store.record(ids[0]).unwrap().unwrap();
    assert!(completed.is_processed);
    assert!(completed.processed_at.is_some());
}

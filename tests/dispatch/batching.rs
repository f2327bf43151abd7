use outbox_pipeline::{
    Dispatcher, InMemoryOutboxStore, OutboxRecord, OutboxStatus, OutboxStoreExt, Pipeline,
};

use crate::support::{fast_options, record_at, Failing, Recorder};

#[test]
fn fifteen_messages_with_batch_of_ten() {
    let store = InMemoryOutboxStore::new();
    // Insert newest first so selection order has to come from created_at.
    let mut records: Vec<OutboxRecord> = (0..15).map(|i| record_at("Tick", i)).collect();
    for record in records.iter().rev() {
        store.insert_one(record.clone()).unwrap();
    }
    records.sort_by_key(|r| r.created_at);

    let recorder = Recorder::new();
    let pipeline = Pipeline::builder().step(recorder.clone()).build();
    let dispatcher =
        Dispatcher::new(store.clone(), pipeline, fast_options().with_batch_size(10)).unwrap();

    let report = dispatcher.run_once().unwrap();
    assert_eq!(report.selected, 10);
    assert_eq!(report.completed, 10);

    for (i, record) in records.iter().enumerate() {
        let stored = store.record(record.id).unwrap().unwrap();
        if i < 10 {
            assert!(stored.is_completed(), "record {i} should be completed");
        } else {
            assert!(stored.is_pending(), "record {i} should be pending");
        }
    }
    assert_eq!(store.count_by_status(OutboxStatus::Pending).unwrap(), 5);

    let expected: Vec<_> = records.iter().take(10).map(|r| r.id).collect();
    assert_eq!(recorder.seen(), expected);

    let report = dispatcher.run_once().unwrap();
    assert_eq!(report.completed, 5);
    assert_eq!(store.count_by_status(OutboxStatus::Completed).unwrap(), 15);
}

#[test]
fn terminal_only_store_runs_nothing_and_writes_nothing() {
    let store = InMemoryOutboxStore::new();

    let mut completed = record_at("Done", 0);
    completed.mark_completed(chrono::Utc::now());
    let mut failed = record_at("Broken", 0);
    failed.record_failure("boom", chrono::Utc::now(), 1);
    store.insert_one(completed).unwrap();
    store.insert_one(failed).unwrap();

    let recorder = Recorder::new();
    let pipeline = Pipeline::builder().step(recorder.clone()).build();
    let dispatcher = Dispatcher::new(store.clone(), pipeline, fast_options()).unwrap();

    let commits = store.commit_count();
    let report = dispatcher.run_once().unwrap();

    assert_eq!(report.selected, 0);
    assert_eq!(recorder.count(), 0);
    assert_eq!(store.commit_count(), commits);
}

#[test]
fn one_write_per_non_empty_cycle() {
    let store = InMemoryOutboxStore::new();
    for i in 0..4 {
        store.insert_one(record_at("Tick", i)).unwrap();
    }

    let pipeline = Pipeline::builder().step(Failing("boom")).build();
    let dispatcher = Dispatcher::new(store.clone(), pipeline, fast_options()).unwrap();

    let before = store.commit_count();
    dispatcher.run_once().unwrap();
    assert_eq!(store.commit_count(), before + 1);
    assert!(store
        .records()
        .unwrap()
        .iter()
        .all(|r| r.retry_count == 1 && r.is_pending()));
}

#[test]
fn records_over_the_ceiling_are_skipped() {
    let store = InMemoryOutboxStore::new();
    let mut exhausted = record_at("Old", -60);
    exhausted.retry_count = 3;
    store.insert_one(exhausted.clone()).unwrap();
    let fresh = record_at("New", 0);
    store.insert_one(fresh.clone()).unwrap();

    let recorder = Recorder::new();
    let pipeline = Pipeline::builder().step(recorder.clone()).build();
    let dispatcher = Dispatcher::new(store.clone(), pipeline, fast_options()).unwrap();

    dispatcher.run_once().unwrap();
    assert_eq!(recorder.seen(), vec![fresh.id]);
    assert!(store.record(exhausted.id).unwrap().unwrap().is_pending());
}

use std::time::Duration;

use outbox_pipeline::{
    DispatchError, Dispatcher, DispatcherThread, OutboxStatus, OutboxStoreExt, Pipeline,
    StoreError,
};

use crate::support::{fast_options, record_at, wait_until, FlakyStore, Recorder};

#[test]
fn offline_store_surfaces_as_cycle_error() {
    let store = FlakyStore::new();
    store.inner().insert_one(record_at("Tick", 0)).unwrap();
    store.set_offline(true);

    let recorder = Recorder::new();
    let pipeline = Pipeline::builder().step(recorder.clone()).build();
    let dispatcher = Dispatcher::new(store.clone(), pipeline, fast_options()).unwrap();

    let err = dispatcher.run_once().unwrap_err();
    assert!(matches!(err, DispatchError::Store(StoreError::Unavailable(_))));
    assert_eq!(recorder.count(), 0);

    store.set_offline(false);
    assert_eq!(dispatcher.run_once().unwrap().completed, 1);
}

#[test]
fn failed_commit_persists_nothing_and_records_are_redelivered() {
    let store = FlakyStore::new();
    let record = record_at("Tick", 0);
    store.inner().insert_one(record.clone()).unwrap();
    store.set_reject_commits(true);

    let recorder = Recorder::new();
    let pipeline = Pipeline::builder().step(recorder.clone()).build();
    let dispatcher = Dispatcher::new(store.clone(), pipeline, fast_options()).unwrap();

    assert!(dispatcher.run_once().is_err());
    let unchanged = store.record(record.id).unwrap().unwrap();
    assert!(unchanged.is_pending());
    assert_eq!(unchanged.retry_count, 0);

    // At-least-once: the pipeline ran but the outcome was lost, so it runs again.
    store.set_reject_commits(false);
    dispatcher.run_once().unwrap();
    assert_eq!(recorder.seen(), vec![record.id, record.id]);
    assert!(store.record(record.id).unwrap().unwrap().is_completed());
}

#[test]
fn loop_keeps_running_through_an_outage() {
    let store = FlakyStore::new();
    store.inner().insert_one(record_at("Tick", 0)).unwrap();
    store.set_offline(true);

    let dispatcher = Dispatcher::new(store.clone(), Pipeline::new(Vec::new()), fast_options())
        .unwrap();
    let worker = DispatcherThread::spawn(dispatcher).unwrap();

    std::thread::sleep(Duration::from_millis(30));
    store.set_offline(false);

    let drained = wait_until(Duration::from_secs(5), || {
        store.count_by_status(OutboxStatus::Completed).unwrap() == 1
    });
    let stats = worker.stop();

    assert!(drained);
    assert!(stats.cycle_errors >= 1);
    assert_eq!(stats.completed, 1);
}

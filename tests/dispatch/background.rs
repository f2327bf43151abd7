use std::collections::HashSet;
use std::thread;
use std::time::{Duration, Instant};

use outbox_pipeline::{
    Dispatcher, DispatcherThread, InMemoryOutboxStore, OutboxStatus, OutboxStoreExt, Pipeline,
    Publisher, StopSignal,
};

use crate::support::{fast_options, wait_until, Recorder};

#[test]
fn concurrent_publishing_is_drained_exactly_once() {
    let store = InMemoryOutboxStore::new();
    let recorder = Recorder::new();
    let pipeline = Pipeline::builder().step(recorder.clone()).build();
    let dispatcher =
        Dispatcher::new(store.clone(), pipeline, fast_options().with_batch_size(3)).unwrap();
    let worker = DispatcherThread::spawn(dispatcher).unwrap();

    let publishers: Vec<_> = (0..4)
        .map(|p| {
            let publisher = Publisher::new(store.clone());
            thread::spawn(move || {
                for i in 0..5 {
                    publisher.publish_as("Tick", &(p * 10 + i)).unwrap();
                    thread::sleep(Duration::from_millis(1));
                }
            })
        })
        .collect();
    for handle in publishers {
        handle.join().unwrap();
    }

    let drained = wait_until(Duration::from_secs(5), || {
        store.count_by_status(OutboxStatus::Completed).unwrap() == 20
    });
    let stats = worker.stop();

    assert!(drained);
    assert_eq!(stats.completed, 20);
    let seen = recorder.seen();
    let unique: HashSet<_> = seen.iter().collect();
    assert_eq!(seen.len(), 20);
    assert_eq!(unique.len(), 20);
}

#[test]
fn stopping_interrupts_a_long_poll_interval() {
    let dispatcher = Dispatcher::new(
        InMemoryOutboxStore::new(),
        Pipeline::new(Vec::new()),
        fast_options().with_poll_interval(Duration::from_secs(300)),
    )
    .unwrap();
    let worker = DispatcherThread::spawn(dispatcher).unwrap();
    thread::sleep(Duration::from_millis(20));

    let start = Instant::now();
    let stats = worker.stop();

    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(stats.polls <= 1);
}

#[test]
fn run_on_the_current_thread_with_a_shared_signal() {
    let store = InMemoryOutboxStore::new();
    Publisher::new(store.clone()).publish_as("Tick", &1).unwrap();
    let dispatcher = Dispatcher::new(store.clone(), Pipeline::new(Vec::new()), fast_options())
        .unwrap();

    let stop = StopSignal::new();
    let watcher = {
        let stop = stop.clone();
        let store = store.clone();
        thread::spawn(move || {
            wait_until(Duration::from_secs(5), || {
                store.count_by_status(OutboxStatus::Completed).unwrap() == 1
            });
            stop.cancel();
        })
    };

    let stats = dispatcher.run(&stop);
    watcher.join().unwrap();

    assert_eq!(stats.completed, 1);
    assert_eq!(stats.cycle_errors, 0);
}

use outbox_pipeline::{OutboxStoreExt, PublishError, Publisher, StoreError};

use crate::support::FlakyStore;

#[test]
fn offline_store_fails_publish_and_writes_nothing() {
    let store = FlakyStore::new();
    store.set_offline(true);
    let publisher = Publisher::new(store.clone());

    let err = publisher.publish_as("Ping", &"hello").unwrap_err();
    assert!(matches!(err, PublishError::Store(StoreError::Unavailable(_))));

    store.set_offline(false);
    assert!(store.records().unwrap().is_empty());
    assert!(store.inner().is_empty());
}

#[test]
fn rejected_commit_fails_publish_and_writes_nothing() {
    let store = FlakyStore::new();
    store.set_reject_commits(true);
    let publisher = Publisher::new(store.clone());

    let err = publisher.publish(&vec![1, 2, 3]).unwrap_err();
    assert!(matches!(err, PublishError::Store(StoreError::Unavailable(_))));
    assert!(store.inner().is_empty());
    assert_eq!(store.inner().commit_count(), 0);

    store.set_reject_commits(false);
    let record = publisher.publish(&vec![1, 2, 3]).unwrap();
    assert_eq!(store.records().unwrap(), vec![record]);
}

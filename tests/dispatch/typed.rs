use std::sync::{Arc, Mutex};

use outbox_pipeline::{
    step_fn, DecodeStep, Dispatcher, InMemoryOutboxStore, LogStep, OutboxStoreExt, PayloadCodec,
    Pipeline, Publisher, StepError, TypeRouter,
};
use serde::{Deserialize, Serialize};

use crate::support::fast_options;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct OrderPlaced {
    order_id: u64,
    quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct CustomerRegistered {
    email: String,
}

fn order_pipeline(shipped: Arc<Mutex<Vec<u64>>>) -> Pipeline<OrderPlaced> {
    Pipeline::builder()
        .step(step_fn("validate", |order: &OrderPlaced| {
            if order.quantity == 0 {
                Err(StepError::new(format!("order {} has no items", order.order_id)))
            } else {
                Ok(())
            }
        }))
        .step(step_fn("ship", move |order: &OrderPlaced| {
            shipped.lock().unwrap().push(order.order_id);
            Ok(())
        }))
        .build()
}

#[test]
fn router_drives_typed_pipelines() {
    let store = InMemoryOutboxStore::new();
    let publisher = Publisher::new(store.clone());
    let good = publisher.publish(&OrderPlaced { order_id: 1, quantity: 2 }).unwrap();
    let empty = publisher.publish(&OrderPlaced { order_id: 2, quantity: 0 }).unwrap();
    let stray = publisher
        .publish(&CustomerRegistered { email: "a@example.com".into() })
        .unwrap();

    let shipped = Arc::new(Mutex::new(Vec::new()));
    let router = TypeRouter::new().typed(order_pipeline(shipped.clone()));
    let pipeline = Pipeline::builder().step(router).build();
    let dispatcher = Dispatcher::new(store.clone(), pipeline, fast_options()).unwrap();

    let report = dispatcher.run_once().unwrap();
    assert_eq!(report.completed, 1);
    assert_eq!(report.retried, 2);
    assert_eq!(*shipped.lock().unwrap(), vec![1]);

    assert!(store.record(good.id).unwrap().unwrap().is_completed());
    assert_eq!(
        store.record(empty.id).unwrap().unwrap().last_error.as_deref(),
        Some("validate: order 2 has no items")
    );
    let stray = store.record(stray.id).unwrap().unwrap();
    assert!(stray
        .last_error
        .as_deref()
        .unwrap()
        .starts_with("no route for message type"));
}

#[test]
fn decode_step_with_binary_codec_and_custom_tag() {
    let store = InMemoryOutboxStore::new();
    let publisher = Publisher::new(store.clone()).with_codec(PayloadCodec::Bitcode);
    let record = publisher
        .publish_as("orders.placed", &OrderPlaced { order_id: 7, quantity: 1 })
        .unwrap();

    let shipped = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::new(Mutex::new(Vec::new()));
    let pipeline = Pipeline::builder()
        .step(LogStep::with_buffer(log.clone()))
        .step(
            DecodeStep::new(order_pipeline(shipped.clone()))
                .with_message_type("orders.placed")
                .with_codec(PayloadCodec::Bitcode),
        )
        .build();
    let dispatcher = Dispatcher::new(store.clone(), pipeline, fast_options()).unwrap();

    dispatcher.run_once().unwrap();

    assert!(store.record(record.id).unwrap().unwrap().is_completed());
    assert_eq!(*shipped.lock().unwrap(), vec![7]);
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[test]
fn codec_mismatch_is_a_processing_failure() {
    let store = InMemoryOutboxStore::new();
    let record = Publisher::new(store.clone())
        .with_codec(PayloadCodec::Bitcode)
        .publish(&OrderPlaced { order_id: 9, quantity: 1 })
        .unwrap();

    // Decodes as JSON, the default.
    let pipeline = Pipeline::builder()
        .step(DecodeStep::new(order_pipeline(Arc::new(Mutex::new(Vec::new())))))
        .build();
    let dispatcher =
        Dispatcher::new(store.clone(), pipeline, fast_options().with_retry_ceiling(1)).unwrap();

    dispatcher.run_once().unwrap();
    let failed = store.record(record.id).unwrap().unwrap();
    assert!(failed.is_failed());
    assert!(failed.last_error.unwrap().starts_with("undecodable"));
}

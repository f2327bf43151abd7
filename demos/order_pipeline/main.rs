//! Order processing through the outbox.
//!
//! Publishes a handful of orders, then lets a background dispatcher run them
//! through validation, inventory, payment and fulfillment. Orders that fail
//! a check are retried and finally marked failed.
//!
//! ```text
//! RUST_LOG=outbox_pipeline=debug,order_pipeline=info cargo run --example order_pipeline
//! ```

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use outbox_pipeline::{
    Dispatcher, DispatcherThread, InMemoryOutboxStore, OutboxSettings, OutboxStatus,
    OutboxStoreExt, Pipeline, PipelineStep, Publisher, StepError, TypeRouter,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OrderMessage {
    order_id: Uuid,
    customer_name: String,
    total_cents: i64,
    items: Vec<OrderItem>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OrderItem {
    product_id: String,
    product_name: String,
    quantity: u32,
    unit_price_cents: i64,
}

struct Validation;

impl PipelineStep<OrderMessage> for Validation {
    fn name(&self) -> &'static str {
        "validation"
    }

    fn execute(&self, order: &OrderMessage) -> Result<(), StepError> {
        if order.customer_name.trim().is_empty() {
            return Err(StepError::new("customer name is required"));
        }
        if order.total_cents <= 0 {
            return Err(StepError::new("total amount must be greater than zero"));
        }
        if order.items.is_empty() {
            return Err(StepError::new("order must contain at least one item"));
        }
        for item in &order.items {
            if item.product_id.is_empty() {
                return Err(StepError::new("product id is required for all items"));
            }
            if item.quantity == 0 {
                return Err(StepError::new(format!(
                    "quantity for {} must be greater than zero",
                    item.product_name
                )));
            }
        }
        Ok(())
    }
}

struct InventoryCheck {
    stock: HashMap<String, u32>,
}

impl PipelineStep<OrderMessage> for InventoryCheck {
    fn name(&self) -> &'static str {
        "inventory"
    }

    fn execute(&self, order: &OrderMessage) -> Result<(), StepError> {
        for item in &order.items {
            let available = self.stock.get(&item.product_id).copied().unwrap_or(0);
            if available < item.quantity {
                return Err(StepError::new(format!(
                    "product {} is out of stock",
                    item.product_name
                )));
            }
        }
        info!(order_id = %order.order_id, "Inventory reserved");
        Ok(())
    }
}

struct PaymentProcessing {
    limit_cents: i64,
}

impl PipelineStep<OrderMessage> for PaymentProcessing {
    fn name(&self) -> &'static str {
        "payment"
    }

    fn execute(&self, order: &OrderMessage) -> Result<(), StepError> {
        if order.total_cents > self.limit_cents {
            return Err(StepError::new("payment processing failed"));
        }
        info!(order_id = %order.order_id, total_cents = order.total_cents, "Payment captured");
        Ok(())
    }
}

struct OrderFulfillment;

impl PipelineStep<OrderMessage> for OrderFulfillment {
    fn name(&self) -> &'static str {
        "fulfillment"
    }

    fn execute(&self, order: &OrderMessage) -> Result<(), StepError> {
        let items: u32 = order.items.iter().map(|i| i.quantity).sum();
        info!(
            order_id = %order.order_id,
            customer = %order.customer_name,
            items,
            total_cents = order.total_cents,
            "Order fulfilled"
        );
        Ok(())
    }
}

fn order(customer: &str, items: Vec<(&str, &str, u32, i64)>) -> OrderMessage {
    let items: Vec<OrderItem> = items
        .into_iter()
        .map(|(id, name, quantity, price)| OrderItem {
            product_id: id.to_string(),
            product_name: name.to_string(),
            quantity,
            unit_price_cents: price,
        })
        .collect();
    OrderMessage {
        order_id: Uuid::new_v4(),
        customer_name: customer.to_string(),
        total_cents: items
            .iter()
            .map(|i| i64::from(i.quantity) * i.unit_price_cents)
            .sum(),
        items,
        created_at: Utc::now(),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = OutboxSettings::load(None)?;
    let options = settings
        .dispatcher_options()?
        .with_poll_interval(Duration::from_millis(200));

    let store = InMemoryOutboxStore::new();
    let publisher = Publisher::with_options(store.clone(), settings.publisher_options());

    let orders = [
        order("Ada Lovelace", vec![("P-1", "Keyboard", 1, 4_999)]),
        order("Grace Hopper", vec![("P-2", "Monitor", 2, 19_999), ("P-1", "Keyboard", 1, 4_999)]),
        order("Alan Turing", vec![("P-3", "Rare Lamp", 1, 2_500)]),
        order("Edsger Dijkstra", vec![("P-2", "Monitor", 5, 19_999)]),
        order("", vec![("P-1", "Keyboard", 1, 4_999)]),
    ];
    for order in &orders {
        let record = publisher.publish(order)?;
        info!(record_id = %record.id, order_id = %order.order_id, "Order published");
    }

    let stock = HashMap::from([("P-1".to_string(), 10), ("P-2".to_string(), 10)]);
    let orders_pipeline = Pipeline::builder()
        .step(Validation)
        .step(InventoryCheck { stock })
        .step(PaymentProcessing { limit_cents: 50_000 })
        .step(OrderFulfillment)
        .build();
    let pipeline = Pipeline::builder()
        .step(TypeRouter::new().typed(orders_pipeline))
        .build();

    let dispatcher = Dispatcher::new(store.clone(), pipeline, options)?;
    let retry_ceiling = dispatcher.options().retry_ceiling;
    let worker = DispatcherThread::spawn(dispatcher)?;

    let deadline = Instant::now() + Duration::from_secs(10);
    while store.count_by_status(OutboxStatus::Pending)? > 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(50));
    }
    let stats = worker.stop();

    info!(
        polls = stats.polls,
        completed = stats.completed,
        retried = stats.retried,
        failed = stats.failed,
        retry_ceiling,
        "Dispatcher stopped"
    );
    for record in store.records()? {
        info!(
            record_id = %record.id,
            status = %record.status,
            retry_count = record.retry_count,
            last_error = record.last_error.as_deref().unwrap_or("-"),
            "Outbox record"
        );
    }
    Ok(())
}

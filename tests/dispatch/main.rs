//! Dispatcher integration tests.


mod background;
mod batching;
mod publishing;
mod resilience;
#[cfg(feature = "sqlite")]
mod sqlite;
mod typed;

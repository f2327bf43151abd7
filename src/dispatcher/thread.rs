//! Background thread driving a [`Dispatcher`].

use std::thread::{self, JoinHandle};

use super::{DispatchError, Dispatcher, DispatcherStats, StopSignal};
use crate::store::OutboxStore;

/// A dispatcher running on its own thread.
///
/// ```
/// use outbox_pipeline::{
///     Dispatcher, DispatcherOptions, DispatcherThread, InMemoryOutboxStore, Pipeline,
/// };
/// use std::time::Duration;
///
/// let dispatcher = Dispatcher::new(
///     InMemoryOutboxStore::new(),
///     Pipeline::new(Vec::new()),
///     DispatcherOptions::default().with_poll_interval(Duration::from_millis(10)),
/// )
/// .unwrap();
///
/// let worker = DispatcherThread::spawn(dispatcher).unwrap();
/// let stats = worker.stop();
/// assert!(stats.polls >= 1);
/// ```
pub struct DispatcherThread {
    signal: StopSignal,
    handle: Option<JoinHandle<DispatcherStats>>,
}

impl DispatcherThread {
    /// Spawn a dispatcher thread with its own stop signal.
    pub fn spawn<S>(dispatcher: Dispatcher<S>) -> Result<Self, DispatchError>
    where
        S: OutboxStore + 'static,
    {
        Self::spawn_with_signal(dispatcher, StopSignal::new())
    }

    /// Spawn with a caller-provided signal, so the caller can stop the loop
    /// from elsewhere as well.
    pub fn spawn_with_signal<S>(
        dispatcher: Dispatcher<S>,
        signal: StopSignal,
    ) -> Result<Self, DispatchError>
    where
        S: OutboxStore + 'static,
    {
        let stop = signal.clone();
        let handle = thread::Builder::new()
            .name("outbox-dispatcher".into())
            .spawn(move || dispatcher.run(&stop))?;

        Ok(Self {
            signal,
            handle: Some(handle),
        })
    }

    /// The signal the thread watches.
    pub fn signal(&self) -> &StopSignal {
        &self.signal
    }

    /// Stop the loop and wait for it. The record in flight finishes first.
    pub fn stop(mut self) -> DispatcherStats {
        self.signal.cancel();
        if let Some(handle) = self.handle.take() {
            handle.join().unwrap_or_default()
        } else {
            DispatcherStats::default()
        }
    }

    /// Ask the loop to stop without waiting.
    pub fn signal_stop(&self) {
        self.signal.cancel();
    }

    /// Whether the thread has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }
}

impl Drop for DispatcherThread {
    fn drop(&mut self) {
        self.signal.cancel();
    }
}

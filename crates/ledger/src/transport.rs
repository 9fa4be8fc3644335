//! Host transport: where completions of batched historical reads go.
//!
//! The ledger is polymorphic over a single capability - posting an
//! asynchronous disk-operation response. The production binding writes into
//! a bounded lock-free ring buffer the host drains from its own loop; tests
//! use an in-memory sink.

use std::sync::Arc;

use crossbeam_queue::ArrayQueue;
use parking_lot::Mutex;
use tracing::warn;

/// Completion of one batched historical read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadResponse {
    /// Correlation id chosen by the requester.
    pub request_id: u64,
    /// First index of the requested range.
    pub from: u64,
    /// Last index of the requested range.
    pub to: u64,
    /// Framed entries for the range, or `None` when any index was
    /// unresolvable.
    pub data: Option<Vec<u8>>,
}

/// Sink for asynchronous read completions.
pub trait CompletionSink {
    /// Posts one completion. Must not block; a sink that cannot accept the
    /// response drops it (the host retries by re-requesting the range).
    fn post(&self, response: ReadResponse);
}

/// Production sink: a bounded lock-free ring buffer shared with the host.
#[derive(Debug, Clone)]
pub struct RingBufferSink {
    queue: Arc<ArrayQueue<ReadResponse>>,
}

impl RingBufferSink {
    /// Creates a sink over a fresh ring buffer with room for `capacity`
    /// responses.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { queue: Arc::new(ArrayQueue::new(capacity)) }
    }

    /// The shared queue, for the host side to drain.
    #[must_use]
    pub fn queue(&self) -> Arc<ArrayQueue<ReadResponse>> {
        Arc::clone(&self.queue)
    }
}

impl CompletionSink for RingBufferSink {
    fn post(&self, response: ReadResponse) {
        if let Err(dropped) = self.queue.push(response) {
            warn!(
                request_id = dropped.request_id,
                from = dropped.from,
                to = dropped.to,
                "host transport full; dropping read completion"
            );
        }
    }
}

/// Test sink collecting completions in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    responses: Mutex<Vec<ReadResponse>>,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns every collected response, in posting order.
    #[must_use]
    pub fn drain(&self) -> Vec<ReadResponse> {
        std::mem::take(&mut *self.responses.lock())
    }
}

impl CompletionSink for MemorySink {
    fn post(&self, response: ReadResponse) {
        self.responses.lock().push(response);
    }
}

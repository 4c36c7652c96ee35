pub mod batching;
pub mod config;
pub mod error;
pub mod registry;
pub mod telemetry;

pub use batching::{
    Batch, BatchCache, BatchSink, CollectedBatch, CollectingSink, DEFAULT_BATCH_SIZE, SlotBuffer,
    StreamStats,
};
pub use config::BatchConfig;
pub use error::{BatchError, SinkError, StreamState};
pub use registry::{CacheRegistry, ReleasedStream, SharedRegistry};

// Re-export logging macros for consistent usage across the crate
pub use log::{debug, error, info, trace, warn};

// =============================================================================
// CORE DATA STRUCTURES
// =============================================================================

/// Opaque identifier of one record stream.
///
/// Handles are issued by [`CacheRegistry::allocate_handle`] in creation order
/// and are never reused, so a stale handle can always be told apart from a
/// live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct StreamHandle(pub u64);

impl StreamHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for StreamHandle {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<StreamHandle> for u64 {
    fn from(handle: StreamHandle) -> u64 {
        handle.0
    }
}

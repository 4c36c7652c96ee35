pub mod cache;
pub mod codec;
pub mod sink;
pub mod slot;
pub mod stats;

// Re-exports for ergonomics
pub use cache::{AppendOutcome, BatchCache};
pub use sink::{Batch, BatchSink, CollectedBatch, CollectingSink};
pub use slot::SlotBuffer;
pub use stats::{ProgressReporter, StreamStats};

/// Records per batch unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 10;

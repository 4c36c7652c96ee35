use crate::StreamHandle;
use crate::batching::{Batch, BatchCache, BatchSink, ProgressReporter, StreamStats};
use crate::config::BatchConfig;
use crate::error::{BatchError, SinkError, StreamState};
use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug)]
struct RegistryEntry {
    cache: BatchCache,
    fixed_size: usize,
    state: StreamState,
    stats: StreamStats,
    last_progress: Option<Instant>,
}

/// Result of releasing a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleasedStream {
    pub handle: StreamHandle,
    /// Slot buffers freed, `min(records pushed, batch size)`.
    pub slots_freed: usize,
    pub stats: StreamStats,
}

/// Owns the batch cache of every open stream, keyed by handle.
///
/// Handles come from a counter that starts at 0 and only moves forward, so
/// a released handle is never handed out again and any later use of it is
/// rejected instead of reaching another stream's state.
#[derive(Debug)]
pub struct CacheRegistry {
    entries: HashMap<StreamHandle, RegistryEntry>,
    // Allocated but not yet registered.
    pending: HashSet<StreamHandle>,
    next_handle: u64,
    config: BatchConfig,
    progress: ProgressReporter,
}

impl Default for CacheRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheRegistry {
    pub fn new() -> Self {
        let config = BatchConfig::default();
        Self {
            entries: HashMap::new(),
            pending: HashSet::new(),
            next_handle: 0,
            progress: ProgressReporter::new(config.progress_interval, config.progress_min_gap()),
            config,
        }
    }

    pub fn with_config(config: BatchConfig) -> Result<Self, BatchError> {
        config.validate()?;
        Ok(Self {
            entries: HashMap::new(),
            pending: HashSet::new(),
            next_handle: 0,
            progress: ProgressReporter::new(config.progress_interval, config.progress_min_gap()),
            config,
        })
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    // =========================================================================
    // HANDLE TABLE
    // =========================================================================

    pub fn allocate_handle(&mut self) -> Result<StreamHandle, BatchError> {
        if self.next_handle >= self.config.max_streams {
            return Err(BatchError::ExhaustedHandles {
                limit: self.config.max_streams,
            });
        }
        let handle = StreamHandle::new(self.next_handle);
        self.next_handle += 1;
        self.pending.insert(handle);
        Ok(handle)
    }

    /// Give back an allocated handle that will not be registered.
    ///
    /// The handle is not reissued; afterwards it reports as released.
    pub fn discard(&mut self, handle: StreamHandle) -> Result<(), BatchError> {
        if self.pending.remove(&handle) {
            debug!("discarded unregistered handle {handle}");
            Ok(())
        } else {
            Err(BatchError::UnknownHandle { handle })
        }
    }

    /// Handles allocated and neither registered nor discarded.
    pub fn pending_handles(&self) -> usize {
        self.pending.len()
    }

    /// Install a fresh batch cache for an allocated handle.
    pub fn register(&mut self, handle: StreamHandle, fixed_size: usize) -> Result<(), BatchError> {
        if self.entries.contains_key(&handle) {
            return Err(BatchError::HandleAlreadyRegistered { handle });
        }
        if !self.pending.contains(&handle) {
            return Err(BatchError::UnknownHandle { handle });
        }

        let cache = BatchCache::open(handle, self.config.batch_size)?
            .with_max_record_bytes(self.config.max_record_bytes);
        self.pending.remove(&handle);
        self.entries.insert(
            handle,
            RegistryEntry {
                cache,
                fixed_size,
                state: StreamState::Open,
                stats: StreamStats::default(),
                last_progress: None,
            },
        );
        Ok(())
    }

    /// The cache and fixed-prefix size registered for `handle`.
    pub fn lookup(&mut self, handle: StreamHandle) -> Result<(&mut BatchCache, usize), BatchError> {
        let entry = self.entry_mut(handle)?;
        Ok((&mut entry.cache, entry.fixed_size))
    }

    pub fn cache(&self, handle: StreamHandle) -> Result<&BatchCache, BatchError> {
        self.entries
            .get(&handle)
            .map(|entry| &entry.cache)
            .ok_or(BatchError::UnknownHandle { handle })
    }

    pub fn state(&self, handle: StreamHandle) -> Result<StreamState, BatchError> {
        match self.entries.get(&handle) {
            Some(entry) => Ok(entry.state),
            None if handle.as_u64() < self.next_handle && !self.pending.contains(&handle) => {
                Ok(StreamState::Released)
            }
            None => Err(BatchError::UnknownHandle { handle }),
        }
    }

    pub fn stats(&self, handle: StreamHandle) -> Result<StreamStats, BatchError> {
        self.entries
            .get(&handle)
            .map(|entry| entry.stats.clone())
            .ok_or(BatchError::UnknownHandle { handle })
    }

    /// Streams opened and not yet released.
    pub fn live_streams(&self) -> usize {
        self.entries.len()
    }

    pub fn handles_issued(&self) -> u64 {
        self.next_handle
    }

    // =========================================================================
    // STREAM LIFECYCLE
    // =========================================================================

    #[tracing::instrument(level = "debug", skip(self))]
    pub fn open(&mut self, fixed_size: usize) -> Result<StreamHandle, BatchError> {
        let handle = self.allocate_handle()?;
        self.register(handle, fixed_size)?;
        debug!("opened stream {handle} with fixed size {fixed_size}");
        Ok(handle)
    }

    #[tracing::instrument(level = "trace", skip(self, record, sink), fields(len = record.len()))]
    pub fn push<S>(
        &mut self,
        handle: StreamHandle,
        record: &[u8],
        sink: &mut S,
    ) -> Result<(), BatchError>
    where
        S: BatchSink + ?Sized,
    {
        let progress = self.progress;
        let entry = self.entry_mut(handle)?;
        if entry.state != StreamState::Open {
            return Err(BatchError::InvalidState {
                handle,
                state: entry.state,
                operation: "push to",
            });
        }

        // Count a threshold flush once the sink accepts it, even if storing
        // the new record fails afterwards.
        let stats = &mut entry.stats;
        let mut counted = |batch: &Batch<'_>| -> Result<(), SinkError> {
            sink.consume_batch(batch)?;
            stats.record_flush(batch.len());
            Ok(())
        };
        let outcome = entry.cache.append(record, entry.fixed_size, &mut counted)?;
        entry.stats.record_push(outcome.length, outcome.reallocated);
        progress.maybe_report(handle, &entry.stats, &mut entry.last_progress);
        Ok(())
    }

    /// Flush the stream's partial batch and stop accepting records.
    ///
    /// Returns the number of records in the final batch. If the sink fails
    /// the stream stays open so the close can be retried.
    #[tracing::instrument(level = "debug", skip(self, sink))]
    pub fn close<S>(&mut self, handle: StreamHandle, sink: &mut S) -> Result<usize, BatchError>
    where
        S: BatchSink + ?Sized,
    {
        let progress = self.progress;
        let entry = self.entry_mut(handle)?;
        if entry.state != StreamState::Open {
            return Err(BatchError::InvalidState {
                handle,
                state: entry.state,
                operation: "close",
            });
        }

        let flushed = entry.cache.close(sink)?;
        if flushed > 0 {
            entry.stats.record_flush(flushed);
        }
        entry.state = StreamState::Closed;
        if progress.is_enabled() {
            progress.report_final(handle, &entry.stats);
        }
        Ok(flushed)
    }

    /// Free a closed stream's buffers and forget the handle.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn release(&mut self, handle: StreamHandle) -> Result<ReleasedStream, BatchError> {
        let state = self.state(handle)?;
        match state {
            StreamState::Closed => {}
            StreamState::Released => return Err(BatchError::UnknownHandle { handle }),
            StreamState::Open => {
                return Err(BatchError::InvalidState {
                    handle,
                    state,
                    operation: "release",
                });
            }
        }

        let entry = self
            .entries
            .remove(&handle)
            .ok_or(BatchError::UnknownHandle { handle })?;
        let slots_freed = entry.cache.destroy();
        debug!("released stream {handle}: freed {slots_freed} slot buffers");
        Ok(ReleasedStream {
            handle,
            slots_freed,
            stats: entry.stats,
        })
    }

    fn entry_mut(&mut self, handle: StreamHandle) -> Result<&mut RegistryEntry, BatchError> {
        self.entries
            .get_mut(&handle)
            .ok_or(BatchError::UnknownHandle { handle })
    }
}

impl Drop for CacheRegistry {
    fn drop(&mut self) {
        if !self.entries.is_empty() {
            let mut handles: Vec<_> = self.entries.keys().copied().collect();
            handles.sort();
            warn!(
                "Dropping registry with {} unreleased stream(s): {handles:?}",
                handles.len()
            );
        }
    }
}

/// Cloneable registry handle for callers that open streams from several threads.
///
/// Every operation takes the lock for its full duration, sink call included.
#[derive(Debug, Clone, Default)]
pub struct SharedRegistry {
    inner: Arc<Mutex<CacheRegistry>>,
}

impl SharedRegistry {
    pub fn new(registry: CacheRegistry) -> Self {
        Self {
            inner: Arc::new(Mutex::new(registry)),
        }
    }

    pub fn with_config(config: BatchConfig) -> Result<Self, BatchError> {
        Ok(Self::new(CacheRegistry::with_config(config)?))
    }

    pub fn open(&self, fixed_size: usize) -> Result<StreamHandle, BatchError> {
        self.inner.lock().open(fixed_size)
    }

    pub fn push<S>(&self, handle: StreamHandle, record: &[u8], sink: &mut S) -> Result<(), BatchError>
    where
        S: BatchSink + ?Sized,
    {
        self.inner.lock().push(handle, record, sink)
    }

    pub fn close<S>(&self, handle: StreamHandle, sink: &mut S) -> Result<usize, BatchError>
    where
        S: BatchSink + ?Sized,
    {
        self.inner.lock().close(handle, sink)
    }

    pub fn release(&self, handle: StreamHandle) -> Result<ReleasedStream, BatchError> {
        self.inner.lock().release(handle)
    }

    pub fn stats(&self, handle: StreamHandle) -> Result<StreamStats, BatchError> {
        self.inner.lock().stats(handle)
    }

    pub fn state(&self, handle: StreamHandle) -> Result<StreamState, BatchError> {
        self.inner.lock().state(handle)
    }

    pub fn live_streams(&self) -> usize {
        self.inner.lock().live_streams()
    }
}

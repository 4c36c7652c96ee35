use super::codec::record_length;
use super::sink::{Batch, BatchSink};
use super::slot::SlotBuffer;
use crate::StreamHandle;
use crate::error::BatchError;
use log::{debug, trace};

/// What a single append did to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Total size of the stored record.
    pub length: usize,
    /// The target slot had to allocate a larger buffer.
    pub reallocated: bool,
    /// Records handed to the sink by a threshold flush before storing.
    pub flushed: Option<usize>,
}

/// Fixed-size ring of slot buffers for one stream.
///
/// Records fill slots `[0, cursor)`. Once every slot is filled, the next
/// append first flushes the whole batch to the sink and then starts over at
/// slot 0, reusing the buffers already allocated there.
#[derive(Debug)]
pub struct BatchCache {
    handle: StreamHandle,
    slots: Vec<SlotBuffer>,
    cursor: usize,
    record_count: u64,
    max_record_bytes: Option<usize>,
}

impl BatchCache {
    pub fn open(handle: StreamHandle, batch_size: usize) -> Result<Self, BatchError> {
        if batch_size == 0 {
            return Err(BatchError::InvalidConfig {
                field: "batch_size".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        let mut slots = Vec::new();
        slots.resize_with(batch_size, SlotBuffer::new);
        Ok(Self {
            handle,
            slots,
            cursor: 0,
            record_count: 0,
            max_record_bytes: None,
        })
    }

    pub fn with_max_record_bytes(mut self, limit: Option<usize>) -> Self {
        self.max_record_bytes = limit;
        self
    }

    /// Copy one record into the next free slot, flushing first if the cache is full.
    ///
    /// On error nothing is stored and the record count is unchanged. A sink
    /// failure leaves the full batch in place so a later flush can retry it.
    /// If the sink accepted a threshold flush and the slot then fails to
    /// grow, the batch stays delivered and the cursor stays at 0.
    pub fn append<S>(
        &mut self,
        record: &[u8],
        fixed_size: usize,
        sink: &mut S,
    ) -> Result<AppendOutcome, BatchError>
    where
        S: BatchSink + ?Sized,
    {
        let length = record_length(record, fixed_size)?;
        if let Some(limit) = self.max_record_bytes {
            if length > limit {
                return Err(BatchError::malformed(
                    "batch append",
                    format!("record of {length} bytes exceeds the {limit}-byte limit"),
                ));
            }
        }

        let mut flushed = None;
        if self.is_full() {
            flushed = Some(self.flush(sink)?);
            self.cursor = 0;
        }

        let slot = &mut self.slots[self.cursor];
        let reallocated = slot.ensure_capacity(length)?;
        slot.store(&record[..length])?;
        if reallocated {
            trace!(
                "stream {}: slot {} grew to {length} bytes",
                self.handle, self.cursor
            );
        }

        self.cursor += 1;
        self.record_count += 1;
        Ok(AppendOutcome {
            length,
            reallocated,
            flushed,
        })
    }

    /// Hand the filled slots to the sink. The cursor is left for the caller to reset.
    pub fn flush<S>(&self, sink: &mut S) -> Result<usize, BatchError>
    where
        S: BatchSink + ?Sized,
    {
        let batch = Batch::new(self.handle, &self.slots[..self.cursor]);
        debug!(
            "stream {}: flushing {} records ({} bytes)",
            self.handle,
            batch.len(),
            batch.total_bytes()
        );
        sink.consume_batch(&batch)
            .map_err(|e| BatchError::from_sink_error(self.handle, e))?;
        Ok(batch.len())
    }

    /// Flush whatever partial batch remains. An empty cache skips the sink.
    pub fn close<S>(&mut self, sink: &mut S) -> Result<usize, BatchError>
    where
        S: BatchSink + ?Sized,
    {
        if self.cursor == 0 {
            return Ok(0);
        }
        let flushed = self.flush(sink)?;
        self.cursor = 0;
        Ok(flushed)
    }

    /// Free every slot that was ever populated and return how many that was.
    ///
    /// Only the first `min(record_count, batch_size)` slots can hold a
    /// buffer: slots fill in order and the cursor wraps to 0 after a flush.
    pub fn destroy(mut self) -> usize {
        let populated = self.populated_slots();
        for slot in &mut self.slots[..populated] {
            let freed = slot.release();
            debug_assert!(freed, "populated slot had no buffer");
        }
        populated
    }

    pub fn handle(&self) -> StreamHandle {
        self.handle
    }

    pub fn batch_size(&self) -> usize {
        self.slots.len()
    }

    /// Slots holding records not yet flushed.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    pub fn is_full(&self) -> bool {
        self.cursor == self.slots.len()
    }

    pub fn slot(&self, index: usize) -> Option<&SlotBuffer> {
        self.slots.get(index)
    }

    pub fn populated_slots(&self) -> usize {
        usize::try_from(self.record_count)
            .unwrap_or(usize::MAX)
            .min(self.slots.len())
    }

    /// Bytes currently reserved across all slots.
    pub fn reserved_bytes(&self) -> usize {
        self.slots.iter().map(SlotBuffer::capacity).sum()
    }
}

use super::slot::SlotBuffer;
use crate::StreamHandle;
use crate::error::SinkError;

/// Borrowed view of the filled slots of one batch cache.
///
/// The slots are reused by later appends, so a sink must copy anything it
/// wants to keep before `consume_batch` returns.
#[derive(Debug, Clone, Copy)]
pub struct Batch<'a> {
    handle: StreamHandle,
    slots: &'a [SlotBuffer],
}

impl<'a> Batch<'a> {
    pub(crate) fn new(handle: StreamHandle, slots: &'a [SlotBuffer]) -> Self {
        Self { handle, slots }
    }

    pub fn handle(&self) -> StreamHandle {
        self.handle
    }

    /// Number of valid records in the batch.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&'a [u8]> {
        self.slots.get(index).map(SlotBuffer::as_bytes)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a [u8]> + 'a {
        self.slots.iter().map(SlotBuffer::as_bytes)
    }

    pub fn total_bytes(&self) -> usize {
        self.slots.iter().map(SlotBuffer::len).sum()
    }

    pub fn to_owned_records(&self) -> Vec<Vec<u8>> {
        self.iter().map(<[u8]>::to_vec).collect()
    }
}

/// Downstream consumer of full (or final partial) batches.
pub trait BatchSink {
    fn consume_batch(&mut self, batch: &Batch<'_>) -> Result<(), SinkError>;
}

impl<F> BatchSink for F
where
    F: FnMut(&Batch<'_>) -> Result<(), SinkError>,
{
    fn consume_batch(&mut self, batch: &Batch<'_>) -> Result<(), SinkError> {
        self(batch)
    }
}

/// An owned copy of one delivered batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedBatch {
    pub handle: StreamHandle,
    pub records: Vec<Vec<u8>>,
}

impl CollectedBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Sink that copies every batch it receives, in delivery order.
#[derive(Debug, Default)]
pub struct CollectingSink {
    batches: Vec<CollectedBatch>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> &[CollectedBatch] {
        &self.batches
    }

    pub fn batches_for(&self, handle: StreamHandle) -> impl Iterator<Item = &CollectedBatch> {
        self.batches.iter().filter(move |b| b.handle == handle)
    }

    /// All records delivered for `handle`, flattened across batches.
    pub fn records_for(&self, handle: StreamHandle) -> Vec<Vec<u8>> {
        self.batches_for(handle)
            .flat_map(|b| b.records.iter().cloned())
            .collect()
    }

    pub fn into_batches(self) -> Vec<CollectedBatch> {
        self.batches
    }
}

impl BatchSink for CollectingSink {
    fn consume_batch(&mut self, batch: &Batch<'_>) -> Result<(), SinkError> {
        self.batches.push(CollectedBatch {
            handle: batch.handle(),
            records: batch.to_owned_records(),
        });
        Ok(())
    }
}

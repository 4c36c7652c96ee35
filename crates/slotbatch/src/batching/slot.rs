use crate::error::BatchError;

/// One reusable record buffer inside a batch cache.
///
/// The buffer is replaced wholesale when a record larger than the current
/// capacity arrives and is never shrunk, so over a stream's lifetime its
/// capacity settles at the largest record seen in this position.
#[derive(Debug, Default)]
pub struct SlotBuffer {
    buf: Vec<u8>,
    capacity: usize,
    allocations: u64,
}

impl SlotBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make room for `required` bytes, replacing the buffer if it is too small.
    ///
    /// Returns `true` when a new buffer was allocated. Previous contents are
    /// discarded in that case.
    pub fn ensure_capacity(&mut self, required: usize) -> Result<bool, BatchError> {
        if required <= self.capacity {
            return Ok(false);
        }

        let mut fresh = Vec::new();
        fresh
            .try_reserve_exact(required)
            .map_err(|_| BatchError::OutOfMemory {
                requested: required,
            })?;
        self.buf = fresh;
        self.capacity = required;
        self.allocations += 1;
        Ok(true)
    }

    /// Copy `record` into the slot, overwriting whatever it held.
    pub fn store(&mut self, record: &[u8]) -> Result<(), BatchError> {
        if record.len() > self.capacity {
            return Err(BatchError::malformed(
                "slot store",
                format!(
                    "record of {} bytes exceeds slot capacity {}",
                    record.len(),
                    self.capacity
                ),
            ));
        }
        self.buf.clear();
        self.buf.extend_from_slice(record);
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_allocated(&self) -> bool {
        self.capacity > 0
    }

    /// Number of times this slot has (re)allocated its buffer.
    pub fn allocations(&self) -> u64 {
        self.allocations
    }

    /// Free the buffer. Returns `false` if nothing was allocated.
    pub fn release(&mut self) -> bool {
        if !self.is_allocated() {
            return false;
        }
        self.buf = Vec::new();
        self.capacity = 0;
        true
    }
}

use crate::batching::DEFAULT_BATCH_SIZE;
use crate::error::BatchError;
use log::warn;
use std::str::FromStr;
use std::time::Duration;

pub const ENV_BATCH_SIZE: &str = "SLOTBATCH_BATCH_SIZE";
pub const ENV_MAX_STREAMS: &str = "SLOTBATCH_MAX_STREAMS";
pub const ENV_MAX_RECORD_BYTES: &str = "SLOTBATCH_MAX_RECORD_BYTES";

/// Record count between two progress lines once a stream is past its first records.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 256;
/// Minimum seconds between two progress lines of the same stream.
pub const DEFAULT_PROGRESS_MIN_GAP_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Slots per batch cache; a flush hands at most this many records to the sink.
    pub batch_size: usize,
    /// Total number of handles the registry will ever issue.
    pub max_streams: u64,
    /// Upper bound on one record's total size, if any.
    pub max_record_bytes: Option<usize>,
    pub progress_interval: u64,
    pub progress_min_gap_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_streams: u64::from(u32::MAX),
            max_record_bytes: None,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            progress_min_gap_secs: DEFAULT_PROGRESS_MIN_GAP_SECS,
        }
    }
}

impl BatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_max_streams(mut self, max_streams: u64) -> Self {
        self.max_streams = max_streams;
        self
    }

    pub fn with_max_record_bytes(mut self, max_record_bytes: usize) -> Self {
        self.max_record_bytes = Some(max_record_bytes);
        self
    }

    /// Zero disables progress lines.
    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn with_progress_min_gap_secs(mut self, secs: u64) -> Self {
        self.progress_min_gap_secs = secs;
        self
    }

    pub fn progress_min_gap(&self) -> Duration {
        Duration::from_secs(self.progress_min_gap_secs)
    }

    /// Defaults overridden by any `SLOTBATCH_*` variables that parse.
    /// Unparsable values are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(batch_size) = env_value::<usize>(ENV_BATCH_SIZE) {
            config.batch_size = batch_size;
        }
        if let Some(max_streams) = env_value::<u64>(ENV_MAX_STREAMS) {
            config.max_streams = max_streams;
        }
        if let Some(max_record_bytes) = env_value::<usize>(ENV_MAX_RECORD_BYTES) {
            config.max_record_bytes = Some(max_record_bytes);
        }
        config
    }

    pub fn validate(&self) -> Result<(), BatchError> {
        if self.batch_size == 0 {
            return Err(BatchError::InvalidConfig {
                field: "batch_size".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.max_streams == 0 {
            return Err(BatchError::InvalidConfig {
                field: "max_streams".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if let Some(limit) = self.max_record_bytes {
            if limit < crate::batching::codec::LENGTH_FIELD_BYTES {
                return Err(BatchError::InvalidConfig {
                    field: "max_record_bytes".to_string(),
                    message: format!(
                        "{limit} cannot hold the {}-byte length field",
                        crate::batching::codec::LENGTH_FIELD_BYTES
                    ),
                });
            }
        }
        Ok(())
    }
}

fn env_value<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {key}={raw:?}: not a valid number");
            None
        }
    }
}

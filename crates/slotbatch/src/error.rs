use crate::StreamHandle;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum BatchError {
    MalformedRecord {
        context: String,
        details: String,
    },
    OutOfMemory {
        requested: usize,
    },
    UnknownHandle {
        handle: StreamHandle,
    },
    ExhaustedHandles {
        limit: u64,
    },
    HandleAlreadyRegistered {
        handle: StreamHandle,
    },
    InvalidState {
        handle: StreamHandle,
        state: StreamState,
        operation: &'static str,
    },
    Sink {
        handle: StreamHandle,
        source: SinkError,
    },
    InvalidConfig {
        field: String,
        message: String,
    },
}

/// Lifecycle tag carried by every registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum StreamState {
    Open,
    Closed,
    Released,
}

/// Failure reported by a downstream sink while consuming a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkError {
    pub message: String,
}

impl SinkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchError::MalformedRecord { context, details } => {
                write!(f, "Malformed record in {context}: {details}")
            }
            BatchError::OutOfMemory { requested } => {
                write!(f, "Out of memory allocating {requested} bytes")
            }
            BatchError::UnknownHandle { handle } => write!(f, "Unknown stream handle {handle}"),
            BatchError::ExhaustedHandles { limit } => {
                write!(f, "Stream handles exhausted (limit {limit})")
            }
            BatchError::HandleAlreadyRegistered { handle } => {
                write!(f, "Stream handle {handle} is already registered")
            }
            BatchError::InvalidState {
                handle,
                state,
                operation,
            } => {
                write!(f, "Cannot {operation} stream {handle} in state {state}")
            }
            BatchError::Sink { handle, source } => {
                write!(f, "Sink failed for stream {handle}: {source}")
            }
            BatchError::InvalidConfig { field, message } => {
                write!(f, "Invalid configuration for '{field}': {message}")
            }
        }
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamState::Open => write!(f, "open"),
            StreamState::Closed => write!(f, "closed"),
            StreamState::Released => write!(f, "released"),
        }
    }
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for BatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BatchError::Sink { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl std::error::Error for SinkError {}

impl BatchError {
    /// Errors caused by the caller breaking the stream contract or sending bad input.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            BatchError::MalformedRecord { .. }
                | BatchError::UnknownHandle { .. }
                | BatchError::HandleAlreadyRegistered { .. }
                | BatchError::InvalidState { .. }
                | BatchError::InvalidConfig { .. }
        )
    }

    pub fn is_resource_error(&self) -> bool {
        matches!(
            self,
            BatchError::OutOfMemory { .. } | BatchError::ExhaustedHandles { .. }
        )
    }

    pub fn malformed(context: &str, details: impl fmt::Display) -> Self {
        BatchError::MalformedRecord {
            context: context.to_string(),
            details: details.to_string(),
        }
    }

    pub fn from_sink_error(handle: StreamHandle, err: SinkError) -> Self {
        BatchError::Sink {
            handle,
            source: err,
        }
    }
}

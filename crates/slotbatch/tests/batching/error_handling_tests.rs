use super::test_utilities::*;
use slotbatch::{
    Batch, BatchConfig, BatchError, CacheRegistry, CollectingSink, SinkError, StreamHandle,
    StreamState,
};
use test_log::test;

#[test]
fn test_malformed_record_is_rejected_without_side_effects() {
    let mut registry = CacheRegistry::new();
    let mut sink = CollectingSink::new();
    let handle = registry.open(8).unwrap();
    registry
        .push(handle, &make_record(8, 1, 0, 4), &mut sink)
        .unwrap();

    let mut truncated = make_record(8, 2, 1, 30);
    truncated.truncate(20);
    let err = registry.push(handle, &truncated, &mut sink).unwrap_err();
    assert!(matches!(err, BatchError::MalformedRecord { .. }));
    assert!(err.is_client_error());

    let short = vec![0u8; 10];
    assert!(matches!(
        registry.push(handle, &short, &mut sink),
        Err(BatchError::MalformedRecord { .. })
    ));

    let stats = registry.stats(handle).unwrap();
    assert_eq!(stats.records_pushed, 1);
    assert_eq!(registry.cache(handle).unwrap().cursor(), 1);
    assert!(!registry.cache(handle).unwrap().slot(1).unwrap().is_allocated());
}

#[test]
fn test_record_size_limit_from_config() {
    let config = BatchConfig::new().with_max_record_bytes(64);
    let mut registry = CacheRegistry::with_config(config).unwrap();
    let mut sink = CollectingSink::new();
    let handle = registry.open(4).unwrap();

    registry
        .push(handle, &make_record(4, 0, 0, 56), &mut sink)
        .unwrap();
    let err = registry
        .push(handle, &make_record(4, 0, 1, 57), &mut sink)
        .unwrap_err();
    assert!(matches!(err, BatchError::MalformedRecord { .. }));
}

#[test]
fn test_handle_exhaustion() {
    let mut registry = CacheRegistry::with_config(BatchConfig::new().with_max_streams(3)).unwrap();
    let mut sink = CollectingSink::new();
    for _ in 0..3 {
        let handle = registry.open(0).unwrap();
        registry.close(handle, &mut sink).unwrap();
        registry.release(handle).unwrap();
    }
    // Released handles are not recycled.
    let err = registry.open(0).unwrap_err();
    assert_eq!(err, BatchError::ExhaustedHandles { limit: 3 });
    assert!(err.is_resource_error());
}

#[test]
fn test_use_after_release_fails_cleanly() {
    let mut registry = CacheRegistry::new();
    let mut sink = CollectingSink::new();
    let handle = registry.open(4).unwrap();
    registry.close(handle, &mut sink).unwrap();
    registry.release(handle).unwrap();

    let next = registry.open(4).unwrap();
    assert_ne!(next, handle);

    let record = make_record(4, 0, 0, 1);
    assert_eq!(
        registry.push(handle, &record, &mut sink).unwrap_err(),
        BatchError::UnknownHandle { handle }
    );
    assert_eq!(
        registry.release(handle).unwrap_err(),
        BatchError::UnknownHandle { handle }
    );
    assert!(matches!(
        registry.lookup(handle),
        Err(BatchError::UnknownHandle { .. })
    ));

    // The new stream is unaffected.
    registry.push(next, &record, &mut sink).unwrap();
    assert_eq!(registry.state(next).unwrap(), StreamState::Open);
}

#[test]
fn test_never_issued_handle_is_unknown() {
    let mut registry = CacheRegistry::new();
    let mut sink = CollectingSink::new();
    let bogus = StreamHandle::new(1_000);
    assert!(matches!(
        registry.close(bogus, &mut sink),
        Err(BatchError::UnknownHandle { .. })
    ));
    assert!(matches!(
        registry.release(bogus),
        Err(BatchError::UnknownHandle { .. })
    ));
}

#[test]
fn test_sink_failure_on_threshold_flush_is_surfaced() {
    let mut registry = registry_with_batch_size(2);
    let mut sink = CollectingSink::new();
    let handle = registry.open(1).unwrap();
    let records: Vec<_> = (0..3).map(|i| make_record(1, 9, i, i)).collect();
    registry.push(handle, &records[0], &mut sink).unwrap();
    registry.push(handle, &records[1], &mut sink).unwrap();

    let mut failing =
        |_: &Batch<'_>| -> Result<(), SinkError> { Err(SinkError::new("downstream closed")) };
    let err = registry.push(handle, &records[2], &mut failing).unwrap_err();
    match &err {
        BatchError::Sink { handle: h, source } => {
            assert_eq!(*h, handle);
            assert_eq!(source.message, "downstream closed");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // The full batch is still buffered and the rejected record was not stored.
    assert_eq!(registry.stats(handle).unwrap().records_pushed, 2);
    registry.push(handle, &records[2], &mut sink).unwrap();
    registry.close(handle, &mut sink).unwrap();
    assert_eq!(batch_sizes(&sink, handle), vec![2, 1]);
    assert_eq!(sink.records_for(handle), records);
}

#[test]
fn test_failed_close_can_be_retried() {
    let mut registry = CacheRegistry::new();
    let mut sink = CollectingSink::new();
    let handle = registry.open(2).unwrap();
    registry
        .push(handle, &make_record(2, 0, 0, 3), &mut sink)
        .unwrap();

    let mut failing = |_: &Batch<'_>| -> Result<(), SinkError> { Err(SinkError::new("busy")) };
    assert!(registry.close(handle, &mut failing).is_err());
    assert_eq!(registry.state(handle).unwrap(), StreamState::Open);

    assert_eq!(registry.close(handle, &mut sink).unwrap(), 1);
    assert_eq!(registry.state(handle).unwrap(), StreamState::Closed);
}

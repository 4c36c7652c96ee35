use super::test_utilities::*;
use slotbatch::batching::codec::{encode_record, record_length, variable_payload};
use slotbatch::{CacheRegistry, CollectingSink};
use test_log::test;

#[test]
fn test_round_trip_is_byte_identical() {
    let mut registry = CacheRegistry::new();
    let mut sink = CollectingSink::new();
    let record = encode_record(&[1, 2, 3, 4, 5, 6, 7, 8], b"hello").unwrap();
    assert_eq!(record.len(), 17);

    let handle = registry.open(8).unwrap();
    registry.push(handle, &record, &mut sink).unwrap();
    registry.close(handle, &mut sink).unwrap();

    let delivered = sink.records_for(handle);
    assert_eq!(delivered, vec![record]);
    assert_eq!(record_length(&delivered[0], 8).unwrap(), 17);
    assert_eq!(variable_payload(&delivered[0], 8).unwrap(), b"hello");
}

#[test]
fn test_slots_are_sized_independently() {
    let mut registry = CacheRegistry::new();
    let mut sink = CollectingSink::new();
    let record_a = make_record(4, 0xA, 0, 0);
    let record_b = make_record(4, 0xB, 0, 100);
    assert_eq!(record_a.len(), 8);
    assert_eq!(record_b.len(), 108);

    let handle = registry.open(4).unwrap();
    registry.push(handle, &record_a, &mut sink).unwrap();
    registry.push(handle, &record_b, &mut sink).unwrap();
    assert_eq!(registry.close(handle, &mut sink).unwrap(), 2);

    assert_eq!(batch_sizes(&sink, handle), vec![2]);
    let cache = registry.cache(handle).unwrap();
    let slot_a = cache.slot(0).unwrap();
    let slot_b = cache.slot(1).unwrap();
    assert!(slot_a.capacity() >= 8);
    assert!(slot_b.capacity() >= 104);
    assert_eq!(slot_a.capacity(), 8);
    assert_eq!(slot_a.as_bytes(), record_a.as_slice());
    assert_eq!(sink.records_for(handle), vec![record_a, record_b]);
}

#[test]
fn test_growing_one_slot_keeps_the_others_intact() {
    let mut registry = registry_with_batch_size(3);
    let mut sink = CollectingSink::new();
    let handle = registry.open(2).unwrap();

    let small = make_record(2, 1, 0, 3);
    let medium = make_record(2, 2, 0, 20);
    let large = make_record(2, 3, 0, 500);
    for record in [&small, &medium, &large] {
        registry.push(handle, record, &mut sink).unwrap();
    }
    {
        let cache = registry.cache(handle).unwrap();
        assert_eq!(cache.slot(0).unwrap().as_bytes(), small.as_slice());
        assert_eq!(cache.slot(1).unwrap().as_bytes(), medium.as_slice());
        assert_eq!(cache.slot(2).unwrap().as_bytes(), large.as_slice());
    }

    // Wraps to slot 0, which must grow past its first 9 bytes.
    let bigger = make_record(2, 4, 0, 800);
    registry.push(handle, &bigger, &mut sink).unwrap();
    let cache = registry.cache(handle).unwrap();
    assert_eq!(cache.slot(0).unwrap().as_bytes(), bigger.as_slice());
    assert_eq!(cache.slot(1).unwrap().as_bytes(), medium.as_slice());
    assert_eq!(cache.slot(1).unwrap().capacity(), medium.len());
    assert_eq!(cache.slot(2).unwrap().as_bytes(), large.as_slice());

    assert_eq!(
        sink.records_for(handle),
        vec![small.clone(), medium.clone(), large.clone()]
    );
}

#[test]
fn test_capacity_stabilises_at_largest_record() {
    let mut registry = registry_with_batch_size(2);
    let mut sink = CollectingSink::new();
    let handle = registry.open(0).unwrap();
    for (seq, payload_len) in [10usize, 50, 5, 30, 50, 1].into_iter().enumerate() {
        registry
            .push(handle, &make_record(0, 0, seq, payload_len), &mut sink)
            .unwrap();
    }
    let cache = registry.cache(handle).unwrap();
    // Slot 0 saw payloads 10, 5, 50; slot 1 saw 50, 30, 1.
    assert_eq!(cache.slot(0).unwrap().capacity(), 54);
    assert_eq!(cache.slot(1).unwrap().capacity(), 54);
    assert_eq!(registry.stats(handle).unwrap().slot_allocations, 3);
}

#[test]
fn test_twenty_three_records_end_to_end() {
    let mut registry = registry_with_batch_size(10);
    let mut sink = CollectingSink::new();
    let records = make_records(12, 23);
    let handle = push_all(&mut registry, &mut sink, 12, &records);

    assert_eq!(batch_sizes(&sink, handle), vec![10, 10]);
    assert_eq!(registry.close(handle, &mut sink).unwrap(), 3);
    assert_eq!(batch_sizes(&sink, handle), vec![10, 10, 3]);
    assert_eq!(sink.records_for(handle), records);

    let released = registry.release(handle).unwrap();
    assert_eq!(released.slots_freed, 10);
    assert_eq!(released.stats.records_pushed, 23);
    assert_eq!(released.stats.batches_flushed, 3);
}

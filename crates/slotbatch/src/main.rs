use clap::Parser;
use slotbatch::batching::codec::encode_record;
use slotbatch::{BatchConfig, CacheRegistry, CollectingSink, StreamHandle, StreamStats, telemetry};

#[derive(Parser, Debug)]
#[command(
    name = "slotbatch",
    version,
    about = "Push synthetic record streams through the slot batching buffer"
)]
struct Args {
    /// Number of independent streams to open
    #[arg(long, default_value_t = 2)]
    streams: usize,

    /// Records pushed into each stream
    #[arg(long, default_value_t = 23)]
    records: usize,

    /// Fixed prefix size of every record, in bytes
    #[arg(long, default_value_t = 8)]
    fixed_size: usize,

    /// Largest variable payload generated, in bytes
    #[arg(long, default_value_t = 128)]
    max_payload: usize,

    /// Records per batch (defaults to SLOTBATCH_BATCH_SIZE or 10)
    #[arg(long)]
    batch_size: Option<usize>,

    /// Print the per-stream summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, serde::Serialize)]
struct StreamSummary {
    handle: StreamHandle,
    batch_sizes: Vec<usize>,
    slots_freed: usize,
    stats: StreamStats,
}

/// Deterministic payload sizes so runs are reproducible without a RNG dependency.
fn payload_len(stream: usize, index: usize, max_payload: usize) -> usize {
    if max_payload == 0 {
        return 0;
    }
    let mixed = (stream as u64 + 1)
        .wrapping_mul(6364136223846793005)
        .wrapping_add((index as u64).wrapping_mul(1442695040888963407));
    (mixed >> 33) as usize % (max_payload + 1)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init_with_default("warn");
    let args = Args::parse();

    let mut config = BatchConfig::from_env();
    if let Some(batch_size) = args.batch_size {
        config = config.with_batch_size(batch_size);
    }
    let mut registry = CacheRegistry::with_config(config)?;
    let mut sink = CollectingSink::new();

    let mut handles = Vec::with_capacity(args.streams);
    for _ in 0..args.streams {
        handles.push(registry.open(args.fixed_size)?);
    }

    // Interleave streams record by record.
    for index in 0..args.records {
        for (stream, handle) in handles.iter().enumerate() {
            let prefix = vec![stream as u8; args.fixed_size];
            let payload = vec![index as u8; payload_len(stream, index, args.max_payload)];
            let record = encode_record(&prefix, &payload)?;
            registry.push(*handle, &record, &mut sink)?;
        }
    }

    let mut summaries = Vec::with_capacity(handles.len());
    for handle in handles {
        registry.close(handle, &mut sink)?;
        let released = registry.release(handle)?;
        summaries.push(StreamSummary {
            handle,
            batch_sizes: sink.batches_for(handle).map(|b| b.len()).collect(),
            slots_freed: released.slots_freed,
            stats: released.stats,
        });
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else {
        for summary in &summaries {
            println!(
                "stream {}: {} records, {} bytes, batches {:?}, {} slot buffers freed",
                summary.handle,
                summary.stats.records_pushed,
                summary.stats.bytes_pushed,
                summary.batch_sizes,
                summary.slots_freed
            );
        }
    }
    Ok(())
}

use crate::error::BatchError;

/// Width of the little-endian length field that follows the fixed prefix.
pub const LENGTH_FIELD_BYTES: usize = 4;

// [fixed_size prefix][u32 LE variable length][variable payload]

/// Total size of the record that starts at `record[0]`.
///
/// Fails when the slice is too short for the length field or for the payload
/// it declares. Bytes past the declared end are not part of the record.
pub fn record_length(record: &[u8], fixed_size: usize) -> Result<usize, BatchError> {
    let variable_len = read_length_field(record, fixed_size)?;
    let total = fixed_size
        .checked_add(LENGTH_FIELD_BYTES)
        .and_then(|header| header.checked_add(variable_len))
        .ok_or_else(|| {
            BatchError::malformed(
                "record length",
                format!("fixed size {fixed_size} plus length {variable_len} overflows"),
            )
        })?;

    if total > record.len() {
        return Err(BatchError::malformed(
            "record length",
            format!(
                "declared {total} bytes but only {} are available",
                record.len()
            ),
        ));
    }
    Ok(total)
}

/// The variable-length suffix of a record, without its length field.
pub fn variable_payload(record: &[u8], fixed_size: usize) -> Result<&[u8], BatchError> {
    let total = record_length(record, fixed_size)?;
    Ok(&record[fixed_size + LENGTH_FIELD_BYTES..total])
}

/// Build a record from its fixed prefix and variable payload.
pub fn encode_record(prefix: &[u8], payload: &[u8]) -> Result<Vec<u8>, BatchError> {
    let mut buf = Vec::new();
    encode_record_into(&mut buf, prefix, payload)?;
    Ok(buf)
}

/// Append one record to `buf` and return the number of bytes written.
pub fn encode_record_into(
    buf: &mut Vec<u8>,
    prefix: &[u8],
    payload: &[u8],
) -> Result<usize, BatchError> {
    let variable_len = u32::try_from(payload.len()).map_err(|_| {
        BatchError::malformed(
            "record encode",
            format!("payload of {} bytes exceeds the u32 length field", payload.len()),
        )
    })?;

    let start = buf.len();
    buf.reserve(prefix.len() + LENGTH_FIELD_BYTES + payload.len());
    buf.extend_from_slice(prefix);
    buf.extend_from_slice(&variable_len.to_le_bytes());
    buf.extend_from_slice(payload);
    Ok(buf.len() - start)
}

fn read_length_field(record: &[u8], fixed_size: usize) -> Result<usize, BatchError> {
    let field = fixed_size
        .checked_add(LENGTH_FIELD_BYTES)
        .and_then(|end| record.get(fixed_size..end))
        .ok_or_else(|| {
            BatchError::malformed(
                "record length",
                format!(
                    "record of {} bytes ends before the length field at offset {fixed_size}",
                    record.len()
                ),
            )
        })?;

    let mut bytes = [0u8; LENGTH_FIELD_BYTES];
    bytes.copy_from_slice(field);
    usize::try_from(u32::from_le_bytes(bytes))
        .map_err(|e| BatchError::malformed("record length", e))
}

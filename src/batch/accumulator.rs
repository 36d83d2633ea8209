//! NDJSON accumulator.

use bytes::{BufMut, Bytes, BytesMut};

/// Pending batch: newline-joined encoded records plus their count.
///
/// The buffer only grows between flushes and is emptied by [`take`](Self::take).
#[derive(Debug, Default)]
pub struct NdjsonAccumulator {
    buf: BytesMut,
    records: usize,
}

impl NdjsonAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one encoded record, inserting the `\n` delimiter when needed.
    pub fn push(&mut self, record: &[u8]) {
        if !self.buf.is_empty() {
            self.buf.put_u8(b'\n');
        }
        self.buf.extend_from_slice(record);
        self.records += 1;
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn records(&self) -> usize {
        self.records
    }

    /// Hand out the pending batch and reset. `None` when nothing is pending.
    pub fn take(&mut self) -> Option<(Bytes, usize)> {
        if self.buf.is_empty() {
            return None;
        }
        let records = std::mem::take(&mut self.records);
        Some((self.buf.split().freeze(), records))
    }
}

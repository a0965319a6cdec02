use std::io::{ErrorKind, Read};

use crate::error::TraceError;

use super::TraceRecord;

/// Size in bytes of one `oracleGeneral` record
pub const RECORD_SIZE: usize = 24;

/// Reader for the `oracleGeneral` binary trace format.
///
/// Each record is 24 little-endian bytes:
///
/// | offset | type  | field               |
/// |--------|-------|---------------------|
/// | 0      | `u32` | clock time          |
/// | 4      | `u64` | object id           |
/// | 12     | `u32` | object size         |
/// | 16     | `i64` | next access (vtime) |
///
/// The next-access field is not used by the simulator.
#[derive(Debug)]
pub struct OracleGeneralReader<R> {
    inner: R,
    offset: u64,
    done: bool,
}

impl<R: Read> OracleGeneralReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, offset: 0, done: false }
    }

    /// Fill `buf`, returning how many bytes were read before end of input
    fn fill(&mut self, buf: &mut [u8]) -> Result<usize, TraceError> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }
}

impl<R: Read> Iterator for OracleGeneralReader<R> {
    type Item = Result<TraceRecord<u64>, TraceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut buf = [0u8; RECORD_SIZE];
        let got = match self.fill(&mut buf) {
            Ok(got) => got,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        if got == 0 {
            self.done = true;
            return None;
        }
        if got < RECORD_SIZE {
            self.done = true;
            return Some(Err(TraceError::Truncated { offset: self.offset, expected: RECORD_SIZE, got }));
        }
        self.offset += RECORD_SIZE as u64;
        Some(Ok(decode_record(&buf)))
    }
}

fn decode_record(buf: &[u8; RECORD_SIZE]) -> TraceRecord<u64> {
    let mut clock = [0u8; 4];
    let mut id = [0u8; 8];
    let mut size = [0u8; 4];
    clock.copy_from_slice(&buf[0..4]);
    id.copy_from_slice(&buf[4..12]);
    size.copy_from_slice(&buf[12..16]);
    TraceRecord {
        timestamp: u32::from_le_bytes(clock) as u64,
        id: u64::from_le_bytes(id),
        size: u32::from_le_bytes(size) as u64,
    }
}

/// Encode one record in `oracleGeneral` layout
pub fn encode_record(clock_time: u32, obj_id: u64, obj_size: u32, next_access_vtime: i64) -> [u8; RECORD_SIZE] {
    let mut buf = [0u8; RECORD_SIZE];
    buf[0..4].copy_from_slice(&clock_time.to_le_bytes());
    buf[4..12].copy_from_slice(&obj_id.to_le_bytes());
    buf[12..16].copy_from_slice(&obj_size.to_le_bytes());
    buf[16..24].copy_from_slice(&next_access_vtime.to_le_bytes());
    buf
}

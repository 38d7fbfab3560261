use super::BACKEND_NAME;
use crate::backend::{BlobBackend, RowIdBackend};
use crate::error::{BackendError, BridgeError};
use std::any::Any;

/// Largest BLOB SQLite accepts with its default `SQLITE_MAX_LENGTH`.
pub const MAX_BLOB_LEN: usize = 1_000_000_000;

fn checked_end(offset: usize, len: usize) -> Result<usize, BridgeError> {
    offset
        .checked_add(len)
        .filter(|&end| end <= MAX_BLOB_LEN)
        .ok_or_else(|| {
            BackendError::new(
                BACKEND_NAME,
                format!(
                    "blob write of {} bytes at offset {} exceeds {} bytes",
                    len, offset, MAX_BLOB_LEN
                ),
            )
            .into()
        })
}

/// In-memory BLOB buffer. SQLite BLOB values are exchanged whole.
#[derive(Debug, Clone, Default)]
pub struct SqliteBlobBackend {
    data: Vec<u8>,
}

impl SqliteBlobBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobBackend for SqliteBlobBackend {
    fn len(&self) -> Result<usize, BridgeError> {
        Ok(self.data.len())
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<usize, BridgeError> {
        if offset >= self.data.len() {
            return Ok(0);
        }
        let count = buf.len().min(self.data.len() - offset);
        buf[..count].copy_from_slice(&self.data[offset..offset + count]);
        Ok(count)
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<usize, BridgeError> {
        let end = checked_end(offset, data.len())?;
        if self.data.len() < end {
            self.data.resize(end, 0);
        }
        self.data[offset..end].copy_from_slice(data);
        Ok(data.len())
    }

    fn append(&mut self, data: &[u8]) -> Result<usize, BridgeError> {
        checked_end(self.data.len(), data.len())?;
        self.data.extend_from_slice(data);
        Ok(data.len())
    }

    fn trim(&mut self, new_len: usize) -> Result<(), BridgeError> {
        self.data.truncate(new_len);
        Ok(())
    }
}

/// SQLite `rowid`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteRowIdBackend {
    pub value: i64,
}

impl RowIdBackend for SqliteRowIdBackend {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

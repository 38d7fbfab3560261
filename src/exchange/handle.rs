//! Handles to backend-owned objects: BLOBs, row identifiers and nested statements.

use crate::backend::{BlobBackend, RowIdBackend, StatementBackend};
use crate::connection::Session;
use crate::error::BridgeError;
use std::fmt;

/// Binary large object owned by a backend.
pub struct Blob {
    backend: Box<dyn BlobBackend>,
}

impl Blob {
    /// Create a BLOB through the session's backend.
    pub fn new(session: &Session) -> Result<Self, BridgeError> {
        session.make_blob()
    }

    /// Wrap an existing backend handle.
    pub fn from_backend(backend: Box<dyn BlobBackend>) -> Self {
        Self { backend }
    }

    pub fn len(&self) -> Result<usize, BridgeError> {
        self.backend.len()
    }

    pub fn is_empty(&self) -> Result<bool, BridgeError> {
        Ok(self.backend.len()? == 0)
    }

    /// Read into `buf` starting at `offset`. Returns the number of bytes read.
    pub fn read(&self, offset: usize, buf: &mut [u8]) -> Result<usize, BridgeError> {
        self.backend.read(offset, buf)
    }

    /// Write `data` at `offset`. Returns the number of bytes written.
    pub fn write(&mut self, offset: usize, data: &[u8]) -> Result<usize, BridgeError> {
        self.backend.write(offset, data)
    }

    pub fn append(&mut self, data: &[u8]) -> Result<usize, BridgeError> {
        self.backend.append(data)
    }

    pub fn trim(&mut self, new_len: usize) -> Result<(), BridgeError> {
        self.backend.trim(new_len)
    }

    /// Read the whole content.
    pub fn to_vec(&self) -> Result<Vec<u8>, BridgeError> {
        let mut buf = vec![0u8; self.backend.len()?];
        let read = self.backend.read(0, &mut buf)?;
        buf.truncate(read);
        Ok(buf)
    }

    /// Replace the whole content.
    pub fn assign(&mut self, data: &[u8]) -> Result<(), BridgeError> {
        self.backend.trim(0)?;
        if !data.is_empty() {
            self.backend.write(0, data)?;
        }
        Ok(())
    }

    pub fn backend(&self) -> &dyn BlobBackend {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> &mut dyn BlobBackend {
        self.backend.as_mut()
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blob")
            .field("len", &self.backend.len().ok())
            .finish()
    }
}

/// Backend-specific row identifier.
///
/// Only the backend that created it can interpret the contents, by
/// downcasting [`RowIdBackend::as_any`].
pub struct RowId {
    backend: Box<dyn RowIdBackend>,
}

impl RowId {
    /// Create a row identifier through the session's backend.
    pub fn new(session: &Session) -> Result<Self, BridgeError> {
        session.make_rowid()
    }

    pub fn from_backend(backend: Box<dyn RowIdBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &dyn RowIdBackend {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> &mut dyn RowIdBackend {
        self.backend.as_mut()
    }
}

impl fmt::Debug for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RowId")
    }
}

/// Statement handle produced by the database, such as a returned cursor.
#[derive(Default)]
pub struct NestedStatement {
    backend: Option<Box<dyn StatementBackend>>,
}

impl NestedStatement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the backend statement that the database produced.
    pub fn attach(&mut self, backend: Box<dyn StatementBackend>) {
        self.backend = Some(backend);
    }

    pub fn is_attached(&self) -> bool {
        self.backend.is_some()
    }

    /// Take ownership of the attached backend statement.
    pub fn take(&mut self) -> Option<Box<dyn StatementBackend>> {
        self.backend.take()
    }
}

impl fmt::Debug for NestedStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NestedStatement")
            .field("attached", &self.backend.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;

    #[derive(Default)]
    struct VecBlob(Vec<u8>);

    impl BlobBackend for VecBlob {
        fn len(&self) -> Result<usize, BridgeError> {
            Ok(self.0.len())
        }

        fn read(&self, offset: usize, buf: &mut [u8]) -> Result<usize, BridgeError> {
            let available = self.0.len().saturating_sub(offset);
            let n = available.min(buf.len());
            buf[..n].copy_from_slice(&self.0[offset..offset + n]);
            Ok(n)
        }

        fn write(&mut self, offset: usize, data: &[u8]) -> Result<usize, BridgeError> {
            if self.0.len() < offset + data.len() {
                self.0.resize(offset + data.len(), 0);
            }
            self.0[offset..offset + data.len()].copy_from_slice(data);
            Ok(data.len())
        }

        fn append(&mut self, data: &[u8]) -> Result<usize, BridgeError> {
            self.0.extend_from_slice(data);
            Ok(data.len())
        }

        fn trim(&mut self, new_len: usize) -> Result<(), BridgeError> {
            self.0.truncate(new_len);
            Ok(())
        }
    }

    struct IntRowId(i64);

    impl RowIdBackend for IntRowId {
        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn test_blob_assign_and_read() {
        let mut blob = Blob::from_backend(Box::new(VecBlob::default()));
        blob.assign(b"hello").unwrap();
        blob.append(b" world").unwrap();
        assert_eq!(blob.to_vec().unwrap(), b"hello world");
        blob.trim(5).unwrap();
        assert_eq!(blob.len().unwrap(), 5);
        blob.assign(b"").unwrap();
        assert!(blob.is_empty().unwrap());
    }

    #[test]
    fn test_rowid_downcast() {
        let mut rowid = RowId::from_backend(Box::new(IntRowId(42)));
        let inner = rowid
            .backend_mut()
            .as_any_mut()
            .downcast_mut::<IntRowId>()
            .unwrap();
        inner.0 += 1;
        let inner = rowid.backend().as_any().downcast_ref::<IntRowId>().unwrap();
        assert_eq!(inner.0, 43);
    }

    #[test]
    fn test_nested_statement_detached_by_default() {
        let mut nested = NestedStatement::new();
        assert!(!nested.is_attached());
        assert!(nested.take().is_none());
    }
}

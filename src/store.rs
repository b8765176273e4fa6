//! The store file: an append-only log of length-prefixed frames.
//!
//! Every frame is an 8-byte big-endian length followed by that many payload
//! bytes, concatenated with no padding. Appends go through a buffered
//! writer; reads flush it first so appended frames are visible within the
//! process before they reach disk.

use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Width of the big-endian length prefix in front of every frame.
pub const LEN_WIDTH: u64 = 8;

/// Append-only byte log with positional reads.
///
/// All operations take `&self`; an internal mutex keeps the buffered
/// writer, the cached size, and the file mutually consistent. Stores are
/// shared as [`Arc<Store>`] so a streaming reader can keep reading after
/// the owning log releases its lock.
pub struct Store {
    path: PathBuf,
    inner: Mutex<StoreInner>,
}

struct StoreInner {
    writer: BufWriter<File>,
    size: u64,
}

impl Store {
    /// Open or create a store file at `path`.
    ///
    /// The cached size is initialized from the file's current length, so
    /// reopening a store resumes appending where the last run left off.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Arc<Self>> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .create(true)
            .append(true)
            .open(&path)
            .map_err(Error::Io)?;

        let size = file.metadata().map_err(Error::Io)?.len();

        Ok(Arc::new(Self {
            path,
            inner: Mutex::new(StoreInner {
                writer: BufWriter::new(file),
                size,
            }),
        }))
    }

    /// Append a frame holding `bytes`.
    ///
    /// Returns the number of bytes written (length prefix included) and the
    /// position at which the frame begins. The bytes may sit in the write
    /// buffer until a read, a flush, or close.
    pub fn append(&self, bytes: &[u8]) -> Result<(u64, u64)> {
        let mut inner = self.inner.lock();
        let position = inner.size;

        // Write the frame length, then the payload
        inner
            .writer
            .write_all(&(bytes.len() as u64).to_be_bytes())
            .map_err(Error::Io)?;
        inner.writer.write_all(bytes).map_err(Error::Io)?;

        let written = LEN_WIDTH + bytes.len() as u64;
        inner.size += written;
        Ok((written, position))
    }

    /// Read the frame whose length prefix begins at `position`.
    pub fn read(&self, position: u64) -> Result<Vec<u8>> {
        let mut inner = self.inner.lock();
        // Flush so frames still in the write buffer are readable
        inner.writer.flush().map_err(Error::Io)?;

        let size = inner.size;
        if position + LEN_WIDTH > size {
            return Err(Error::corruption(format!(
                "frame position {} past end of store ({} bytes)",
                position, size
            )));
        }

        let file = inner.writer.get_ref();
        let mut len_buf = [0u8; LEN_WIDTH as usize];
        file.read_exact_at(&mut len_buf, position).map_err(Error::Io)?;
        let len = u64::from_be_bytes(len_buf);

        if position + LEN_WIDTH + len > size {
            return Err(Error::corruption(format!(
                "torn frame at position {}: length {} exceeds store size {}",
                position, len, size
            )));
        }

        let mut value = vec![0u8; len as usize];
        file.read_exact_at(&mut value, position + LEN_WIDTH)
            .map_err(Error::Io)?;
        Ok(value)
    }

    /// Read raw bytes at `offset` into `buf`, ignoring frame boundaries.
    ///
    /// Returns the number of bytes read, which may be short at end of file.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let mut inner = self.inner.lock();
        inner.writer.flush().map_err(Error::Io)?;
        inner.writer.get_ref().read_at(buf, offset).map_err(Error::Io)
    }

    /// Get the current logical size in bytes, buffered appends included.
    pub fn size(&self) -> u64 {
        self.inner.lock().size
    }

    /// Flush buffered frames and sync the file to disk.
    pub fn close(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.writer.flush().map_err(Error::Io)?;
        inner.writer.get_ref().sync_all().map_err(Error::Io)
    }

    /// Get the path to the store file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        // Best effort flush on drop
        let _ = self.inner.get_mut().writer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const WRITE: &[u8] = b"this is a frame payload";
    const WIDTH: u64 = WRITE.len() as u64 + LEN_WIDTH;

    #[test]
    fn test_append_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("append_read.store");

        let store = Store::open(&path).unwrap();
        for i in 1..4u64 {
            let (written, position) = store.append(WRITE).unwrap();
            assert_eq!(position + written, WIDTH * i);
        }

        let mut position = 0;
        for _ in 1..4 {
            assert_eq!(store.read(position).unwrap(), WRITE);
            position += WIDTH;
        }

        // A reopened store picks up the existing size and contents
        drop(store);
        let store = Store::open(&path).unwrap();
        assert_eq!(store.size(), WIDTH * 3);
        assert_eq!(store.read(0).unwrap(), WRITE);
        let (_, position) = store.append(WRITE).unwrap();
        assert_eq!(position, WIDTH * 3);
    }

    #[test]
    fn test_read_at() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().join("read_at.store")).unwrap();
        for _ in 0..3 {
            store.append(WRITE).unwrap();
        }

        let mut offset = 0;
        for _ in 0..3 {
            let mut buf = vec![0u8; WIDTH as usize];
            let n = store.read_at(&mut buf, offset).unwrap();
            assert_eq!(n, buf.len());
            assert_eq!(u64::from_be_bytes(buf[..8].try_into().unwrap()), WRITE.len() as u64);
            assert_eq!(&buf[8..], WRITE);
            offset += n as u64;
        }
    }

    #[test]
    fn test_read_past_end() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().join("past_end.store")).unwrap();
        store.append(WRITE).unwrap();

        let result = store.read(WIDTH);
        assert!(matches!(result, Err(Error::Corruption(_))));
    }

    #[test]
    fn test_close_flushes_buffer() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("close.store");

        let store = Store::open(&path).unwrap();
        store.append(WRITE).unwrap();

        let before = std::fs::metadata(&path).unwrap().len();
        store.close().unwrap();
        let after = std::fs::metadata(&path).unwrap().len();

        assert!(after > before);
        assert_eq!(after, WIDTH);
    }

    #[test]
    fn test_empty_payload_frame() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().join("empty.store")).unwrap();

        let (written, position) = store.append(&[]).unwrap();
        assert_eq!(written, LEN_WIDTH);
        assert_eq!(position, 0);
        assert_eq!(store.read(0).unwrap(), Vec::<u8>::new());
    }
}

//! A segment: one store file paired with one index file.
//!
//! Both files share a base offset, encoded in their names as
//! `<base_offset>.store` and `<base_offset>.index`. The segment marshals
//! records into store frames, keeps the index in step with the store, and
//! reports when either file has reached its configured bound.

use crate::config::Options;
use crate::error::{Error, Result};
use crate::index::Index;
use crate::record::Record;
use crate::store::Store;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// A contiguous range of the log starting at a base offset.
pub struct Segment {
    store: Arc<Store>,
    index: Index,
    base_offset: u64,
    next_offset: u64,
    options: Options,
}

impl Segment {
    /// Open or create the segment for `base_offset` inside `dir`.
    ///
    /// The next offset to assign is recovered from the last index entry:
    /// `base_offset + last_relative + 1`, or `base_offset` for an empty
    /// index.
    pub fn new<P: AsRef<Path>>(dir: P, base_offset: u64, options: &Options) -> Result<Self> {
        let dir = dir.as_ref();

        let store = Store::open(dir.join(format!("{}.store", base_offset)))?;
        let mut index = Index::open(dir.join(format!("{}.index", base_offset)), options)?;
        index.recover(store.size())?;

        let next_offset = match index.read(-1) {
            Ok((relative, _)) => base_offset + relative as u64 + 1,
            Err(Error::OffsetOutOfRange(_)) => base_offset,
            Err(e) => return Err(e),
        };

        Ok(Self {
            store,
            index,
            base_offset,
            next_offset,
            options: options.clone(),
        })
    }

    /// Append a record, stamping it with the segment's next offset.
    ///
    /// Returns the assigned offset. A failed index write leaves an orphan
    /// frame in the store; it is unaddressable and ignored on the next
    /// open, since the next offset is rebuilt from the index alone.
    pub fn append(&mut self, record: &mut Record) -> Result<u64> {
        let offset = self.next_offset;
        record.offset = offset;

        let encoded = record.encode();
        let (_, position) = self.store.append(&encoded)?;
        self.index
            .write((offset - self.base_offset) as u32, position)?;

        self.next_offset += 1;
        Ok(offset)
    }

    /// Read the record at the absolute `offset`.
    pub fn read(&self, offset: u64) -> Result<Record> {
        let relative = offset
            .checked_sub(self.base_offset)
            .ok_or(Error::OffsetOutOfRange(offset))?;

        let (_, position) = self.index.read(relative as i64)?;
        let bytes = self.store.read(position)?;
        Record::decode(&bytes)
    }

    /// Whether the store or the index has reached its configured bound.
    ///
    /// The index comparison uses the logical size, not the pre-extended
    /// file length.
    pub fn is_maxed(&self) -> bool {
        self.store.size() >= self.options.max_store_bytes
            || self.index.size() >= self.options.max_index_bytes
    }

    /// Close the index and the store.
    pub fn close(&mut self) -> Result<()> {
        self.index.close()?;
        self.store.close()
    }

    /// Close the segment and unlink both of its files.
    pub fn remove(&mut self) -> Result<()> {
        self.close()?;
        fs::remove_file(self.index.path()).map_err(Error::Io)?;
        fs::remove_file(self.store.path()).map_err(Error::Io)?;
        Ok(())
    }

    /// The first logical offset served by this segment.
    pub fn base_offset(&self) -> u64 {
        self.base_offset
    }

    /// The logical offset the next append will receive.
    pub fn next_offset(&self) -> u64 {
        self.next_offset
    }

    pub(crate) fn store(&self) -> &Arc<Store> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::ENTRY_WIDTH;
    use tempfile::TempDir;

    #[test]
    fn test_append_read_until_index_full() {
        let dir = TempDir::new().unwrap();
        let options = Options::new()
            .max_store_bytes(1024)
            .max_index_bytes(ENTRY_WIDTH * 3);

        let mut segment = Segment::new(dir.path(), 16, &options).unwrap();
        assert_eq!(segment.next_offset(), 16);
        assert!(!segment.is_maxed());

        for i in 0..3u64 {
            let mut record = Record::new("hello world");
            let offset = segment.append(&mut record).unwrap();
            assert_eq!(offset, 16 + i);
            assert_eq!(record.offset, offset);

            let read = segment.read(offset).unwrap();
            assert_eq!(read.offset, offset);
            assert_eq!(read.value, record.value);
        }

        let mut fourth = Record::new("fourth record");
        assert!(matches!(segment.append(&mut fourth), Err(Error::IndexFull)));
        assert!(segment.is_maxed());
    }

    #[test]
    fn test_maxed_by_store() {
        let dir = TempDir::new().unwrap();
        let record = Record::new("hello world");
        let options = Options::new()
            .max_store_bytes(record.encoded_size() as u64)
            .max_index_bytes(1024);

        let mut segment = Segment::new(dir.path(), 0, &options).unwrap();
        segment.append(&mut record.clone()).unwrap();
        assert!(segment.is_maxed());
    }

    #[test]
    fn test_reopen_recovers_next_offset() {
        let dir = TempDir::new().unwrap();
        let options = Options::default();

        {
            let mut segment = Segment::new(dir.path(), 5, &options).unwrap();
            for _ in 0..4 {
                segment.append(&mut Record::new("payload")).unwrap();
            }
            segment.close().unwrap();
        }

        let segment = Segment::new(dir.path(), 5, &options).unwrap();
        assert_eq!(segment.next_offset(), 9);
        assert_eq!(segment.read(8).unwrap().value, "payload");
    }

    #[test]
    fn test_reopen_after_dirty_shutdown() {
        let dir = TempDir::new().unwrap();
        let options = Options::default();

        {
            let mut segment = Segment::new(dir.path(), 0, &options).unwrap();
            for _ in 0..3 {
                segment.append(&mut Record::new("payload")).unwrap();
            }
            // No close: the index file is left at full capacity
        }

        let segment = Segment::new(dir.path(), 0, &options).unwrap();
        assert_eq!(segment.next_offset(), 3);
        assert_eq!(segment.read(2).unwrap().value, "payload");
    }

    #[test]
    fn test_remove_deletes_files() {
        let dir = TempDir::new().unwrap();
        let options = Options::default();

        let mut segment = Segment::new(dir.path(), 0, &options).unwrap();
        segment.append(&mut Record::new("gone")).unwrap();
        segment.remove().unwrap();

        assert!(!dir.path().join("0.store").exists());
        assert!(!dir.path().join("0.index").exists());

        // A fresh segment at the same base offset starts empty
        let segment = Segment::new(dir.path(), 0, &options).unwrap();
        assert_eq!(segment.next_offset(), 0);
        assert!(!segment.is_maxed());
    }

    #[test]
    fn test_read_below_base_offset() {
        let dir = TempDir::new().unwrap();
        let segment = Segment::new(dir.path(), 10, &Options::default()).unwrap();

        assert!(matches!(
            segment.read(9),
            Err(Error::OffsetOutOfRange(9))
        ));
    }
}

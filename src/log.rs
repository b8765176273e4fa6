//! The log: an ordered list of segments behind a reader-writer lock.
//!
//! Appends go to the active (last) segment and roll over to a fresh one
//! when it fills; reads binary-search the segment list by base offset.
//! The lock is exclusive for mutations and shared for reads, so many
//! readers can proceed alongside each other while a single appender is
//! serialized.

use crate::config::Options;
use crate::error::{Error, Result};
use crate::record::Record;
use crate::segment::Segment;
use crate::store::Store;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// An append-only, offset-addressed commit log over a directory of
/// segment files.
///
/// # Thread Safety
///
/// All operations take `&self`; the log is shared across threads as
/// `Arc<Log>`. Appends are totally ordered, and a read observes every
/// append that completed before it acquired the lock.
pub struct Log {
    dir: PathBuf,
    options: Options,
    segments: RwLock<Vec<Segment>>,
}

impl Log {
    /// Open the log rooted at `dir`, creating the directory if needed.
    ///
    /// Existing segment files are discovered from their `<base>.store` /
    /// `<base>.index` names and reopened in ascending base-offset order;
    /// an empty directory gets a single segment at
    /// `options.initial_offset`. Size caps left at zero fall back to 1024
    /// bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or scanned, if
    /// a `.store` or `.index` file has a name that does not parse as a
    /// base offset, or if a segment fails to open.
    pub fn open<P: AsRef<Path>>(dir: P, mut options: Options) -> Result<Self> {
        if options.max_store_bytes == 0 {
            options.max_store_bytes = 1024;
        }
        if options.max_index_bytes == 0 {
            options.max_index_bytes = 1024;
        }
        options.validate()?;

        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(Error::Io)?;
        let segments = Self::setup(&dir, &options)?;

        Ok(Self {
            dir,
            options,
            segments: RwLock::new(segments),
        })
    }

    fn setup(dir: &Path, options: &Options) -> Result<Vec<Segment>> {
        // Each segment contributes two files with the same stem; group by
        // parsed base offset so a missing pair file cannot skew the list.
        let mut base_offsets = BTreeSet::new();
        for entry in fs::read_dir(dir).map_err(Error::Io)? {
            let path = entry.map_err(Error::Io)?.path();
            match path.extension().and_then(|ext| ext.to_str()) {
                Some("store") | Some("index") => {
                    let stem = path.file_stem().and_then(|stem| stem.to_str()).unwrap_or("");
                    let base = stem.parse::<u64>().map_err(|_| {
                        Error::corruption(format!(
                            "segment file name is not a base offset: {}",
                            path.display()
                        ))
                    })?;
                    base_offsets.insert(base);
                }
                _ => log::debug!("ignoring unrelated file in log directory: {}", path.display()),
            }
        }

        let mut segments = Vec::new();
        for base_offset in base_offsets {
            segments.push(Segment::new(dir, base_offset, options)?);
        }
        if segments.is_empty() {
            segments.push(Segment::new(dir, options.initial_offset, options)?);
        }
        Ok(segments)
    }

    /// Append a record and return the offset it was assigned.
    ///
    /// The offset is stamped into `record` before it is encoded. If the
    /// append maxed the active segment, a fresh segment is rolled at the
    /// following offset.
    pub fn append(&self, record: &mut Record) -> Result<u64> {
        let mut segments = self.segments.write();
        let active = segments
            .last_mut()
            .ok_or_else(|| Error::invalid_state("log has no segments"))?;

        let offset = active.append(record)?;
        if active.is_maxed() {
            log::debug!(
                "segment {} is maxed, rolling over to {}",
                active.base_offset(),
                offset + 1
            );
            segments.push(Segment::new(&self.dir, offset + 1, &self.options)?);
        }
        Ok(offset)
    }

    /// Read the record stored at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OffsetOutOfRange`] when no segment covers the
    /// offset.
    pub fn read(&self, offset: u64) -> Result<Record> {
        let segments = self.segments.read();
        let candidate = segments.partition_point(|s| s.base_offset() <= offset);
        let segment = candidate
            .checked_sub(1)
            .and_then(|i| segments.get(i))
            .filter(|s| offset < s.next_offset())
            .ok_or(Error::OffsetOutOfRange(offset))?;
        segment.read(offset)
    }

    /// The lowest base offset held by the log.
    pub fn lowest_offset(&self) -> u64 {
        let segments = self.segments.read();
        segments.first().map(Segment::base_offset).unwrap_or(0)
    }

    /// The highest offset assigned so far, or `None` while the log holds
    /// no records.
    pub fn highest_offset(&self) -> Option<u64> {
        let segments = self.segments.read();
        let last = segments.last()?;
        if segments.len() == 1 && last.next_offset() == last.base_offset() {
            return None;
        }
        Some(last.next_offset() - 1)
    }

    /// Remove every segment whose records all sit at or below `lowest`,
    /// unlinking their files.
    ///
    /// The first retained segment may begin above `lowest`; records are
    /// only dropped in whole segments. If truncation would empty the log,
    /// a fresh segment is created at the removed tail's next offset so
    /// appends continue without reusing dropped offsets.
    pub fn truncate(&self, lowest: u64) -> Result<()> {
        let mut segments = self.segments.write();

        // Segments are ordered by base offset, so the removable ones form
        // a prefix of the list.
        let split = segments.partition_point(|s| {
            matches!(s.next_offset().checked_sub(1), Some(highest) if highest <= lowest)
        });

        // Pop one segment at a time: if a removal fails partway through,
        // the rest of the prefix stays tracked in the list and is found
        // again on the next open instead of being silently forgotten.
        let mut next_base = None;
        for _ in 0..split {
            let mut segment = segments.remove(0);
            log::debug!(
                "truncate({}): removing segment {}",
                lowest,
                segment.base_offset()
            );
            next_base = Some(segment.next_offset());
            segment.remove()?;
        }

        if segments.is_empty() {
            let base = next_base.unwrap_or(self.options.initial_offset);
            segments.push(Segment::new(&self.dir, base, &self.options)?);
        }
        Ok(())
    }

    /// Close every segment, flushing buffered store bytes and truncating
    /// each index to its logical size.
    pub fn close(&self) -> Result<()> {
        let mut segments = self.segments.write();
        Self::close_all(&mut segments)
    }

    /// Close the log and delete its directory.
    pub fn remove(&self) -> Result<()> {
        let mut segments = self.segments.write();
        Self::close_all(&mut segments)?;
        segments.clear();
        fs::remove_dir_all(&self.dir).map_err(Error::Io)
    }

    /// Remove the log and reopen it empty at the configured initial
    /// offset.
    pub fn reset(&self) -> Result<()> {
        let mut segments = self.segments.write();
        Self::close_all(&mut segments)?;
        segments.clear();
        fs::remove_dir_all(&self.dir).map_err(Error::Io)?;
        fs::create_dir_all(&self.dir).map_err(Error::Io)?;
        *segments = Self::setup(&self.dir, &self.options)?;
        Ok(())
    }

    fn close_all(segments: &mut [Segment]) -> Result<()> {
        for segment in segments.iter_mut() {
            segment.close()?;
        }
        Ok(())
    }

    /// A streaming reader over the physical log: every store file in
    /// segment order, each from position 0 to its size at the time of the
    /// call, length prefixes included.
    ///
    /// The returned reader holds no lock; it reads a consistent snapshot
    /// of what was appended before the call.
    pub fn reader(&self) -> LogReader {
        let segments = self.segments.read();
        let stores = segments
            .iter()
            .map(|segment| {
                let store = Arc::clone(segment.store());
                let size = store.size();
                (store, size)
            })
            .collect();
        LogReader {
            stores,
            current: 0,
            position: 0,
        }
    }
}

/// Byte stream over the concatenated store files of a log.
///
/// Yields the raw framed representation suitable for byte-for-byte
/// replication; a consumer rebuilding a replica must reconstruct the index
/// by scanning the frame lengths.
pub struct LogReader {
    stores: Vec<(Arc<Store>, u64)>,
    current: usize,
    position: u64,
}

impl Read for LogReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let (store, size) = match self.stores.get(self.current) {
                Some(entry) => entry,
                None => return Ok(0),
            };
            if self.position >= *size {
                self.current += 1;
                self.position = 0;
                continue;
            }

            let want = (*size - self.position).min(buf.len() as u64) as usize;
            let n = store
                .read_at(&mut buf[..want], self.position)
                .map_err(into_io_error)?;
            if n == 0 {
                self.current += 1;
                self.position = 0;
                continue;
            }
            self.position += n as u64;
            return Ok(n);
        }
    }
}

fn into_io_error(err: Error) -> io::Error {
    match err {
        Error::Io(err) => err,
        other => io::Error::other(other),
    }
}

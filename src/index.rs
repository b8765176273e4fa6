//! The index file: fixed-width offset-to-position entries over a memory map.
//!
//! Each entry maps a segment-relative offset to the store position of the
//! matching frame. The file is extended to its configured capacity up front
//! so it can be memory-mapped once; the logical size (valid entries times
//! [`ENTRY_WIDTH`]) is tracked separately and restored by truncating the
//! file on close.

use crate::config::Options;
use crate::error::{Error, Result};
use bytes::{Buf, BufMut};
use memmap2::MmapMut;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Width of the relative-offset column of an entry.
pub const OFFSET_WIDTH: u64 = 4;
/// Width of the store-position column of an entry.
pub const POSITION_WIDTH: u64 = 8;
/// Width of a full index entry.
pub const ENTRY_WIDTH: u64 = OFFSET_WIDTH + POSITION_WIDTH;

/// Offset-to-position index for a single segment.
pub struct Index {
    file: File,
    path: PathBuf,
    mmap: Option<MmapMut>,
    size: u64,
    max_index_bytes: u64,
    dirty_open: bool,
}

impl Index {
    /// Open or create an index file at `path`, extending it to
    /// `options.max_index_bytes` and memory-mapping it at full capacity.
    ///
    /// A cleanly closed index was truncated to its logical size, which is
    /// read back from the on-disk length. A file found at capacity with
    /// zero padding in its tail was not closed; its logical size is
    /// unknown until [`Index::recover`] reconstructs it. A file at
    /// capacity that is valid entries end to end was simply full when it
    /// was closed.
    pub fn open<P: AsRef<Path>>(path: P, options: &Options) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(Error::Io)?;

        let disk_len = file.metadata().map_err(Error::Io)?.len();

        file.set_len(options.max_index_bytes).map_err(Error::Io)?;
        // SAFETY: the file was just extended to the mapped length, and the
        // log directory is owned exclusively by this process while open.
        let mmap = unsafe { MmapMut::map_mut(&file).map_err(Error::Io)? };

        // Clean closes truncate the file below capacity; at capacity, only
        // a zeroed final slot marks padding from a skipped close. An
        // exactly full index leaves a real entry there.
        let at_capacity = disk_len > 0 && disk_len >= options.max_index_bytes;
        let dirty_open = at_capacity
            && options
                .max_index_bytes
                .checked_sub(ENTRY_WIDTH)
                .map(|at| mmap[at as usize..].iter().all(|&b| b == 0))
                .unwrap_or(false);
        let size = if dirty_open {
            0
        } else if at_capacity {
            options.max_index_bytes
        } else {
            disk_len - disk_len % ENTRY_WIDTH
        };

        Ok(Self {
            file,
            path,
            mmap: Some(mmap),
            size,
            max_index_bytes: options.max_index_bytes,
            dirty_open,
        })
    }

    /// Reconstruct the logical size after an unclean shutdown.
    ///
    /// Entries are scanned from the front. Entry `i` is accepted while its
    /// relative offset equals `i` and its position points inside the
    /// sibling store (positions are strictly increasing, so a zeroed slot
    /// never passes for `i > 0`; entry 0 is accepted only when the store
    /// holds data for it). No-op after a clean open.
    pub fn recover(&mut self, store_size: u64) -> Result<()> {
        if !self.dirty_open {
            return Ok(());
        }
        self.dirty_open = false;

        let mmap = self
            .mmap
            .as_ref()
            .ok_or_else(|| Error::invalid_state("index is closed"))?;

        let mut entries = 0u64;
        let mut prev_position = 0u64;
        while (entries + 1) * ENTRY_WIDTH <= self.max_index_bytes {
            let at = (entries * ENTRY_WIDTH) as usize;
            let mut entry = &mmap[at..at + ENTRY_WIDTH as usize];
            let relative = entry.get_u32();
            let position = entry.get_u64();

            let valid = relative as u64 == entries
                && if entries == 0 {
                    position == 0 && store_size > 0
                } else {
                    position > prev_position && position < store_size
                };
            if !valid {
                break;
            }
            prev_position = position;
            entries += 1;
        }

        self.size = entries * ENTRY_WIDTH;
        if self.size < self.max_index_bytes {
            log::warn!(
                "index {}: rebuilt logical size to {} entries after unclean shutdown",
                self.path.display(),
                entries
            );
        }
        Ok(())
    }

    /// Write an entry at the end of the index.
    ///
    /// Fails with [`Error::IndexFull`] once the configured capacity is
    /// reached.
    pub fn write(&mut self, relative_offset: u32, position: u64) -> Result<()> {
        if self.size + ENTRY_WIDTH > self.max_index_bytes {
            return Err(Error::IndexFull);
        }

        let at = self.size as usize;
        let mmap = self
            .mmap
            .as_mut()
            .ok_or_else(|| Error::invalid_state("index is closed"))?;
        let mut entry = &mut mmap[at..at + ENTRY_WIDTH as usize];
        entry.put_u32(relative_offset);
        entry.put_u64(position);

        self.size += ENTRY_WIDTH;
        Ok(())
    }

    /// Read the entry at `relative`, where `-1` means the last entry.
    ///
    /// Returns the stored relative offset and store position, or
    /// [`Error::OffsetOutOfRange`] when the index is empty or `relative`
    /// names an entry past the end.
    pub fn read(&self, relative: i64) -> Result<(u32, u64)> {
        if self.size == 0 {
            return Err(Error::OffsetOutOfRange(0));
        }

        let entry_index = if relative < 0 {
            self.size / ENTRY_WIDTH - 1
        } else {
            relative as u64
        };
        if (entry_index + 1) * ENTRY_WIDTH > self.size {
            return Err(Error::OffsetOutOfRange(entry_index));
        }

        let mmap = self
            .mmap
            .as_ref()
            .ok_or_else(|| Error::invalid_state("index is closed"))?;
        let at = (entry_index * ENTRY_WIDTH) as usize;
        let mut entry = &mmap[at..at + ENTRY_WIDTH as usize];
        Ok((entry.get_u32(), entry.get_u64()))
    }

    /// Get the logical size in bytes (valid entries only).
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Flush the map, truncate the file back to the logical size, and sync.
    ///
    /// Further reads and writes fail once the index is closed.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mmap) = self.mmap.take() {
            mmap.flush().map_err(Error::Io)?;
        }
        self.file.set_len(self.size).map_err(Error::Io)?;
        self.file.sync_all().map_err(Error::Io)
    }

    /// Get the path to the index file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

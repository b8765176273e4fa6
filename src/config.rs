//! Configuration options for the commit log.

use crate::error::Result;
use crate::index::ENTRY_WIDTH;

/// Configuration options for opening a log.
#[derive(Debug, Clone)]
pub struct Options {
    /// Soft cap on a segment's store file (in bytes).
    ///
    /// A segment whose store reaches this size stops accepting appends and
    /// the log rolls over to a fresh segment. The cap is soft: the append
    /// that crosses it still completes, so a store may exceed it by one
    /// frame. A value of 0 selects the default of 1024 at open.
    pub max_store_bytes: u64,

    /// Hard cap on a segment's index file (in bytes).
    ///
    /// Index writes beyond this size fail, which also marks the segment as
    /// maxed. A value of 0 selects the default of 1024 at open.
    pub max_index_bytes: u64,

    /// Base offset for the first segment of an empty log.
    /// Default: 0
    pub initial_offset: u64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_store_bytes: 1024,
            max_index_bytes: 1024,
            initial_offset: 0,
        }
    }
}

impl Options {
    /// Creates a new Options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the store size cap.
    pub fn max_store_bytes(mut self, bytes: u64) -> Self {
        self.max_store_bytes = bytes;
        self
    }

    /// Sets the index size cap.
    pub fn max_index_bytes(mut self, bytes: u64) -> Self {
        self.max_index_bytes = bytes;
        self
    }

    /// Sets the base offset for the first segment of an empty log.
    pub fn initial_offset(mut self, offset: u64) -> Self {
        self.initial_offset = offset;
        self
    }

    /// Validates the options and returns an error if any are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.max_index_bytes < ENTRY_WIDTH {
            return Err(crate::Error::invalid_argument(format!(
                "max_index_bytes must hold at least one entry ({} bytes)",
                ENTRY_WIDTH
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = Options::default();
        assert_eq!(opts.max_store_bytes, 1024);
        assert_eq!(opts.max_index_bytes, 1024);
        assert_eq!(opts.initial_offset, 0);
    }

    #[test]
    fn test_options_builder() {
        let opts = Options::new()
            .max_store_bytes(4096)
            .max_index_bytes(ENTRY_WIDTH * 3)
            .initial_offset(42);

        assert_eq!(opts.max_store_bytes, 4096);
        assert_eq!(opts.max_index_bytes, ENTRY_WIDTH * 3);
        assert_eq!(opts.initial_offset, 42);
    }

    #[test]
    fn test_options_validation() {
        let opts = Options::default();
        assert!(opts.validate().is_ok());

        let opts = Options::new().max_index_bytes(ENTRY_WIDTH - 1);
        assert!(opts.validate().is_err());
    }
}

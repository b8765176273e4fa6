//! # comlog - An Append-Only, Offset-Addressed Commit Log
//!
//! comlog persists a sequence of records to a single directory on local
//! disk, assigns each append a monotonically increasing offset, and serves
//! random reads by offset. It is the storage core of a commit log in the
//! style of Kafka's partition logs.
//!
//! ## Architecture
//!
//! The log is built from three layered components:
//!
//! - **Store**: append-only byte log of length-prefixed frames
//! - **Index**: memory-mapped, fixed-width offset-to-position entries
//! - **Segment**: one store paired with one index sharing a base offset
//! - **Log**: ordered segments; appends roll over when the active one fills
//!
//! Records appended while the log is open may sit in a write buffer;
//! closing the log flushes and syncs everything. After a crash, all
//! flushed bytes survive and the log reopens at the last complete index
//! entry.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use comlog::{Log, Options, Record};
//!
//! # fn main() -> Result<(), comlog::Error> {
//! let log = Log::open("./data", Options::default())?;
//!
//! // Append records; each gets the next offset
//! let mut record = Record::new("hello world");
//! let offset = log.append(&mut record)?;
//!
//! // Read them back by offset
//! let read = log.read(offset)?;
//! assert_eq!(read.value, "hello world");
//!
//! // Drop everything at or below a watermark, whole segments at a time
//! log.truncate(offset)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Module declarations
pub mod config;
pub mod error;
pub mod index;
pub mod log;
pub mod record;
pub mod segment;
pub mod store;

// Re-exports
pub use self::log::{Log, LogReader};
pub use config::Options;
pub use error::{Error, Result};
pub use record::Record;

//! # strata_core
//!
//! A log-structured, segmented key-value engine.
//!
//! Writes append checksummed records to the *active* segment file; when
//! the active segment would exceed its size budget it is sealed and a
//! fresh one takes its place. Reads consult per-segment indexes newest
//! to oldest. A background compactor merges sealed segments into one,
//! keeping only the latest record per key.
//!
//! ```no_run
//! use strata_core::{Config, Store};
//!
//! let store = Store::open("my_store", Config::default())?;
//! store.put(b"greeting", b"hello")?;
//! assert_eq!(store.get(b"greeting")?, b"hello");
//! store.delete(b"greeting")?;
//! store.close()?;
//! # Ok::<(), strata_core::StoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod compaction;
pub mod config;
pub mod dir;
pub mod error;
pub mod record;
pub mod segment;
pub mod store;

pub use config::Config;
pub use error::{StoreError, StoreResult};
pub use record::Record;
pub use store::Store;

/// Current version of the engine.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

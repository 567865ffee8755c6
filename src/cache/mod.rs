//! Precomputed page cache.
//!
//! Every cacheable page has a [`CacheKey`] mapping to a file under the cache
//! root. The presence of that file is the only validity signal:
//!
//! - [`CacheReader`] serves stored bytes or reports a miss,
//! - [`CacheWriter`] rebuilds the tree offline (`ohdl build-cache`).

mod keys;
mod reader;
mod writer;

pub use keys::CacheKey;
pub use reader::CacheReader;
pub use writer::{CacheBuildReport, CacheWriteError, CacheWriter};

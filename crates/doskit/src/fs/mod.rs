//! Virtual file-handle table for Doskit
//!
//! Provides the async handle-table trait the interpreter redirects standard
//! input/output through, plus an in-memory implementation:
//! - `InMemoryFiles`: file store + numbered handle slots + read-only
//!   virtual-file registry

mod memory;
mod traits;

pub use memory::InMemoryFiles;
pub use traits::{HandleTable, OpenMode, VfileStore, ATTR_ARCHIVE, CONSOLE_DEVICE};

//! Handle-table trait definitions

use async_trait::async_trait;

use crate::error::Result;

/// Device name the interpreter opens when redirection is torn down.
pub const CONSOLE_DEVICE: &str = "CON";

/// DOS archive attribute, applied to files created by output redirection.
pub const ATTR_ARCHIVE: u8 = 0x20;

/// Open mode for [`HandleTable::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Read-only.
    Read,
    /// Read/write.
    ReadWrite,
}

/// Async file-handle table.
///
/// Models the DOS per-process handle array: slot 0 is standard input and
/// slot 1 is standard output. Opens land in the lowest free slot, which is
/// what the interpreter relies on when it swaps redirection targets in and
/// out around a command dispatch.
#[async_trait]
pub trait HandleTable: Send + Sync {
    /// Open an existing file or device into the lowest free slot.
    async fn open(&self, name: &str, mode: OpenMode) -> Result<u8>;

    /// Create (or truncate) a file with the given attributes and open it
    /// read/write into the lowest free slot.
    async fn create(&self, name: &str, attr: u8) -> Result<u8>;

    /// Close an open slot.
    async fn close(&self, slot: u8) -> Result<()>;

    /// Seek an open slot to end-of-file, returning the new offset.
    async fn seek_end(&self, slot: u8) -> Result<u64>;

    /// Duplicate an open slot into the lowest free slot.
    async fn duplicate(&self, slot: u8) -> Result<u8>;

    /// Whether a slot currently holds an open handle.
    fn is_open(&self, slot: u8) -> bool;
}

/// Registry of named, read-only, in-memory byte blobs.
///
/// The assembled autoexec content is published here under a fixed name so
/// the startup script-read path can consume it exactly like a user-authored
/// file.
pub trait VfileStore: Send + Sync {
    /// Register (or replace) a blob under `name`.
    fn publish(&self, name: &str, content: &[u8]);

    /// Remove a published blob.
    fn remove(&self, name: &str);

    /// Read a published blob.
    fn read(&self, name: &str) -> Option<Vec<u8>>;
}

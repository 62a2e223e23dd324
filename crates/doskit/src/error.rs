//! Error types for Doskit
//!
//! Two broad categories with very different handling policies:
//! - transient I/O failures (bad redirection targets, console trouble) are
//!   reported as diagnostics and execution continues;
//! - autoexec construction failures (double-install, buffer overflow) are
//!   unrecoverable startup errors that callers are expected to abort on.

use thiserror::Error;

/// Result type alias using Doskit's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Doskit error types.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error from host filesystem operations.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// File-handle table failure (open/close/seek on the virtual DOS handles).
    #[error("file table error: {0}")]
    HandleTable(String),

    /// Terminal input failure.
    #[error("console error: {0}")]
    Console(String),

    /// An autoexec line object was installed twice.
    ///
    /// Construction-time fatal: the startup configuration is inconsistent and
    /// there is no sensible way to continue assembling the startup script.
    #[error("autoexec: already created {0}")]
    AutoexecInstalled(String),

    /// The assembled autoexec content exceeds the fixed buffer capacity.
    ///
    /// Construction-time fatal, same policy as [`Error::AutoexecInstalled`].
    #[error("autoexec buffer overflow: {needed} bytes exceeds capacity of {capacity}")]
    AutoexecOverflow { needed: usize, capacity: usize },
}

impl Error {
    /// Whether this error is an unrecoverable startup-configuration failure.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::AutoexecInstalled(_) | Error::AutoexecOverflow { .. }
        )
    }
}

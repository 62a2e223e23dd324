//! Terminal abstraction
//!
//! The run-loop only ever needs two things from a terminal: read one line
//! (blocking from the loop's perspective) and write text. Implementations
//! decide what "terminal" means; the CLI wires real stdin/stdout, tests use
//! [`BufferConsole`].

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::Result;

/// One line of terminal I/O at a time.
#[async_trait]
pub trait Console: Send + Sync {
    /// Read one line of input, without its terminator. `None` means the
    /// input side is closed (end of input).
    async fn read_line(&self) -> Result<Option<String>>;

    /// Write text to the terminal.
    fn print(&self, text: &str);
}

/// In-memory console: scripted input lines, captured output.
#[derive(Debug, Default)]
pub struct BufferConsole {
    input: Mutex<VecDeque<String>>,
    output: Mutex<String>,
}

impl BufferConsole {
    /// Create a console with no pending input.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a line to be returned by the next `read_line` call.
    pub fn push_input(&self, line: impl Into<String>) {
        self.input.lock().unwrap().push_back(line.into());
    }

    /// Everything printed so far.
    pub fn output(&self) -> String {
        self.output.lock().unwrap().clone()
    }

    /// Drain and return everything printed so far.
    pub fn take_output(&self) -> String {
        std::mem::take(&mut self.output.lock().unwrap())
    }
}

#[async_trait]
impl Console for BufferConsole {
    async fn read_line(&self) -> Result<Option<String>> {
        Ok(self.input.lock().unwrap().pop_front())
    }

    fn print(&self, text: &str) {
        self.output.lock().unwrap().push_str(text);
    }
}

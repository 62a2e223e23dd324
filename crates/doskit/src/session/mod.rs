//! Interpreter sessions and the run-loop state machine
//!
//! A session owns its echo state and (at most one) active script stream and
//! drives the run-loop: interactive prompting, one-shot `/C` execution,
//! `/INIT` startup, and the script sub-loop used by nested re-entrant
//! invocations. Sessions are cheap value objects; the one-shot and callback
//! paths construct a fresh session sharing the same collaborator set.

mod banner;
mod dispatch;

pub use banner::{MachineKind, StartupVerbosity};

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::console::Console;
use crate::env::EnvStore;
use crate::error::Result;
use crate::fs::HandleTable;

/// One command execution, performed by an external dispatcher.
///
/// Success/failure is opaque to the run-loop: a failed dispatch is reported
/// as a diagnostic and the loop continues. The dispatcher may set
/// `exit_requested`, toggle echo, or hand back a script stream through the
/// context (e.g. when the command names a batch file).
#[async_trait]
pub trait CommandDispatcher: Send + Sync {
    async fn dispatch(&self, command: &str, ctx: DispatchContext<'_>) -> Result<()>;
}

/// A lazy, finite, read-once source of script lines.
#[async_trait]
pub trait ScriptStream: Send {
    /// Next line without its terminator, or `None` at end-of-stream.
    async fn read_next_line(&mut self) -> Option<String>;
}

/// Pre-split script lines held in memory; the simplest [`ScriptStream`].
#[derive(Debug, Default)]
pub struct MemoryScript {
    lines: VecDeque<String>,
}

impl MemoryScript {
    /// Split `content` into lines (CRLF or LF).
    pub fn new(content: &str) -> Self {
        Self {
            lines: content
                .lines()
                .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
                .collect(),
        }
    }
}

#[async_trait]
impl ScriptStream for MemoryScript {
    async fn read_next_line(&mut self) -> Option<String> {
        self.lines.pop_front()
    }
}

/// Mutable view of session state handed to the dispatcher for one command.
pub struct DispatchContext<'a> {
    pub env: &'a EnvStore,
    pub files: &'a dyn HandleTable,
    pub console: &'a dyn Console,
    pub exit_requested: &'a mut bool,
    pub echo_enabled: &'a mut bool,
    pub active_script: &'a mut Option<Box<dyn ScriptStream>>,
}

/// Fallback dispatcher that rejects everything.
pub struct UnknownCommandDispatcher;

#[async_trait]
impl CommandDispatcher for UnknownCommandDispatcher {
    async fn dispatch(&self, command: &str, ctx: DispatchContext<'_>) -> Result<()> {
        let name = command.split_whitespace().next().unwrap_or(command);
        ctx.console.print(&format!("Illegal command: {name}.\n"));
        Ok(())
    }
}

/// Collaborators shared by every session of one shell.
#[derive(Clone)]
pub(crate) struct Shared {
    pub env: Arc<EnvStore>,
    pub files: Arc<dyn HandleTable>,
    pub console: Arc<dyn Console>,
    pub dispatcher: Arc<dyn CommandDispatcher>,
    pub shutdown: Arc<AtomicBool>,
    pub verbosity: StartupVerbosity,
    pub machine: MachineKind,
}

/// One interpreter session: echo state, optional script stream, and the
/// run-loop termination signals.
pub struct InterpreterSession {
    echo_enabled: bool,
    active_script: Option<Box<dyn ScriptStream>>,
    exit_requested: bool,
    shared: Shared,
}

impl InterpreterSession {
    pub(crate) fn new(shared: Shared) -> Self {
        Self {
            echo_enabled: true,
            active_script: None,
            exit_requested: false,
            shared,
        }
    }

    fn nested(&self) -> Self {
        Self {
            echo_enabled: self.echo_enabled,
            active_script: None,
            exit_requested: false,
            shared: self.shared.clone(),
        }
    }

    fn shutdown_requested(&self) -> bool {
        self.shared.shutdown.load(Ordering::Relaxed)
    }

    fn show_prompt(&self) {
        self.shared.console.print("Z:\\>");
    }

    /// Run the session to completion for the given invocation line.
    ///
    /// `/?` and `-?` print the long help and return. `/C <command>` runs the
    /// command (plus any script it starts) without ever prompting. `/INIT
    /// <command>` prints the startup banner and dispatches the command before
    /// entering the main loop. Anything else prints the version line and goes
    /// straight to the main loop.
    pub async fn run(&mut self, invocation: &str) -> Result<()> {
        if has_switch(invocation, "/?") || has_switch(invocation, "-?") {
            self.shared.console.print(banner::COMMAND_HELP_LONG);
            return Ok(());
        }

        if let Some(rest) = switch_remainder(invocation, "/C") {
            // Installer-style callers pass trailing CR/LF garbage; keep only
            // the first line.
            let line = rest.split(['\r', '\n']).next().unwrap_or("").to_string();
            let mut sub = self.nested();
            sub.execute_line(&line).await?;
            sub.run_script_only().await?;
            return Ok(());
        }

        if let Some(rest) = switch_remainder(invocation, "/INIT") {
            let text = banner::welcome(self.shared.verbosity, self.shared.machine);
            self.shared.console.print(&text);
            let line = rest.to_string();
            self.execute_line(&line).await?;
        } else {
            self.shared.console.print(&banner::version_line());
        }

        self.main_loop().await
    }

    /// Dispatch a single line, then drain any script stream it started.
    ///
    /// This is the re-entrant path used by system callbacks: a fresh nested
    /// session runs one command to completion and returns.
    pub(crate) async fn run_command(&mut self, line: &str) -> Result<()> {
        let line = line.split(['\r', '\n']).next().unwrap_or("");
        if line.trim().is_empty() {
            return Ok(());
        }
        self.execute_line(line).await?;
        self.run_script_only().await
    }

    /// Drain the active script stream, if any. Never prompts.
    pub(crate) async fn run_script_only(&mut self) -> Result<()> {
        while self.active_script.is_some() && !self.shutdown_requested() {
            self.step_script().await?;
        }
        Ok(())
    }

    async fn main_loop(&mut self) -> Result<()> {
        while !self.exit_requested && !self.shutdown_requested() {
            if self.active_script.is_some() {
                self.step_script().await?;
            } else {
                if self.echo_enabled {
                    self.show_prompt();
                }
                match self.shared.console.read_line().await? {
                    Some(line) => self.execute_line(&line).await?,
                    // Terminal closed; nothing further can ever arrive.
                    None => self.exit_requested = true,
                }
            }
        }
        Ok(())
    }

    /// Read and run one script line; clears the stream at end-of-stream.
    async fn step_script(&mut self) -> Result<()> {
        let line = match self.active_script.as_mut() {
            Some(script) => script.read_next_line().await,
            None => return Ok(()),
        };
        match line {
            Some(line) => {
                if self.echo_enabled && !line.starts_with('@') {
                    self.show_prompt();
                    self.shared.console.print(&line);
                    self.shared.console.print("\n");
                }
                self.execute_line(&line).await?;
                if self.echo_enabled {
                    self.shared.console.print("\n");
                }
            }
            None => self.active_script = None,
        }
        Ok(())
    }
}

/// Whether `switch` appears as a whitespace-separated token (case-insensitive).
fn has_switch(invocation: &str, switch: &str) -> bool {
    invocation
        .split_whitespace()
        .any(|token| token.eq_ignore_ascii_case(switch))
}

/// Find `switch` as a token and return the remainder of the line after it.
fn switch_remainder<'a>(invocation: &'a str, switch: &str) -> Option<&'a str> {
    let mut rest = invocation.trim_start();
    while !rest.is_empty() {
        let end = rest
            .find(char::is_whitespace)
            .unwrap_or(rest.len());
        let (token, tail) = rest.split_at(end);
        if token.eq_ignore_ascii_case(switch) {
            return Some(tail.trim_start());
        }
        rest = tail.trim_start();
    }
    None
}

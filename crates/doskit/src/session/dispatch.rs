//! Per-line execution: redirection setup, dispatch, restoration
//!
//! The handle table is process-wide shared state; this module is its sole
//! mutator during redirection and restores the pre-call state on every exit
//! path, dispatch failure included. All open/create failures degrade to
//! "run with console I/O"; nothing here propagates past the line boundary.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{DispatchContext, InterpreterSession};
use crate::error::Result;
use crate::fs::{OpenMode, ATTR_ARCHIVE, CONSOLE_DEVICE};
use crate::redirect::{parse_redirection, SEGMENT_SEPARATOR};

impl InterpreterSession {
    /// Execute one raw command line.
    ///
    /// A leading `@` is blanked (it only suppresses echo, which the caller
    /// has already decided by now). Redirection targets are taken from the
    /// line, applied to handles 0/1 around the dispatch, and the previous
    /// handle state is restored unconditionally afterwards.
    pub async fn execute_line(&mut self, raw: &str) -> Result<()> {
        debug!(line = raw, "parsing command line");

        let mut line = raw.to_string();
        if line.starts_with('@') {
            line.replace_range(0..1, " ");
        }
        let (text, spec) = parse_redirection(line.trim());

        if spec.pipe_segments > 1 {
            self.shared
                .console
                .print("Multiple commands on one line are not supported.\n");
            warn!("multiple commands on one line not supported");
        }

        // Empty targets come from an operator at end of line; treat as absent.
        let input = spec.input.filter(|t| !t.is_empty());
        let output = spec.output.filter(|t| !t.is_empty());

        let files = Arc::clone(&self.shared.files);
        let mut had_custom_stdin = false;
        let mut had_custom_stdout = false;
        if input.is_some() || output.is_some() {
            had_custom_stdin = files.is_open(0);
            had_custom_stdout = files.is_open(1);
        }

        if let Some(target) = input.as_deref() {
            // Probe first so a missing file leaves the existing stdin alone.
            if let Ok(probe) = files.open(target, OpenMode::Read).await {
                let _ = files.close(probe).await;
                debug!(input = target, "redirecting input");
                if had_custom_stdin {
                    let _ = files.close(0).await;
                }
                let _ = files.open(target, OpenMode::Read).await;
            }
        }

        if let Some(target) = output.as_deref() {
            debug!(output = target, append = spec.append, "redirecting output");
            if had_custom_stdout {
                let _ = files.close(1).await;
            }
            if !had_custom_stdin && input.is_none() {
                // Keep slot numbering consistent so the target lands on
                // handle 1.
                let _ = files.open(CONSOLE_DEVICE, OpenMode::ReadWrite).await;
            }
            let opened = if spec.append {
                match files.open(target, OpenMode::ReadWrite).await {
                    Ok(slot) => {
                        let _ = files.seek_end(slot).await;
                        true
                    }
                    // Create if it does not exist yet.
                    Err(_) => files.create(target, ATTR_ARCHIVE).await.is_ok(),
                }
            } else {
                files.create(target, ATTR_ARCHIVE).await.is_ok()
            };
            if !opened && had_custom_stdout {
                let _ = files.open(CONSOLE_DEVICE, OpenMode::ReadWrite).await;
            }
            if !had_custom_stdin && input.is_none() {
                let _ = files.close(0).await;
            }
        }

        // Only the first pipe-separated segment runs.
        let command = text
            .split(SEGMENT_SEPARATOR)
            .next()
            .unwrap_or("")
            .trim()
            .to_string();
        if !command.is_empty() {
            let dispatcher = Arc::clone(&self.shared.dispatcher);
            let console = Arc::clone(&self.shared.console);
            let env = Arc::clone(&self.shared.env);
            let ctx = DispatchContext {
                env: &env,
                files: &*files,
                console: &*console,
                exit_requested: &mut self.exit_requested,
                echo_enabled: &mut self.echo_enabled,
                active_script: &mut self.active_script,
            };
            if let Err(err) = dispatcher.dispatch(&command, ctx).await {
                console.print(&format!("{err}\n"));
                debug!(%err, "command dispatch failed");
            }
        }

        // Restore handles to the pre-call state.
        if input.is_some() {
            let _ = files.close(0).await;
            if had_custom_stdin {
                let _ = files.open(CONSOLE_DEVICE, OpenMode::ReadWrite).await;
            }
        }
        if output.is_some() {
            let _ = files.close(1).await;
            if !had_custom_stdin {
                let _ = files.open(CONSOLE_DEVICE, OpenMode::ReadWrite).await;
            }
            if had_custom_stdout {
                let _ = files.open(CONSOLE_DEVICE, OpenMode::ReadWrite).await;
            }
            if !had_custom_stdin {
                let _ = files.close(0).await;
            }
        }

        // `input`/`output` drop here: target ownership is released on every
        // path, success or failure.
        Ok(())
    }
}

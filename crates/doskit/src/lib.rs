//! Doskit - DOS-compatible command interpreter core
//!
//! Command-line parsing with redirection, the interpreter run-loop, and
//! startup-script ("autoexec") assembly. The command dispatcher, terminal,
//! and file-handle table are collaborators supplied through traits.
//!
//! # Example
//!
//! ```rust
//! use doskit::{Shell, StartupOptions};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> doskit::Result<()> {
//!     let shell = Shell::builder().build();
//!     let _autoexec = shell.assemble_autoexec(&StartupOptions::default())?;
//!     shell.run("/C echo hello").await?;
//!     Ok(())
//! }
//! ```

mod autoexec;
mod console;
mod env;
mod error;
mod fs;
mod redirect;
mod session;

pub use autoexec::{
    AutoexecAssembler, AutoexecLine, AutoexecRegistry, AutoexecStream, StartupOptions,
    AUTOEXEC_CAPACITY, AUTOEXEC_NAME,
};
pub use console::{BufferConsole, Console};
pub use env::EnvStore;
pub use error::{Error, Result};
pub use fs::{HandleTable, InMemoryFiles, OpenMode, VfileStore, ATTR_ARCHIVE, CONSOLE_DEVICE};
pub use redirect::{parse_redirection, RedirectionSpec, SEGMENT_SEPARATOR};
pub use session::{
    CommandDispatcher, DispatchContext, InterpreterSession, MachineKind, MemoryScript,
    ScriptStream, StartupVerbosity, UnknownCommandDispatcher,
};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use session::Shared;

/// Main entry point for Doskit.
///
/// Owns the collaborator set and the autoexec registry; constructs a fresh
/// [`InterpreterSession`] per run, so one-shot, startup, and re-entrant
/// invocations never share loop state.
pub struct Shell {
    shared: Shared,
    registry: Arc<AutoexecRegistry>,
}

impl Default for Shell {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Shell {
    /// Create a shell with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new ShellBuilder for customized configuration.
    pub fn builder() -> ShellBuilder {
        ShellBuilder::default()
    }

    /// Run one session to completion for the given invocation line
    /// (`/?`, `/C <command>`, `/INIT <command>`, or empty for interactive).
    pub async fn run(&self, invocation: &str) -> Result<()> {
        let mut session = InterpreterSession::new(self.shared.clone());
        session.run(invocation).await
    }

    /// Run a single command to completion in a fresh nested session, the
    /// way a system callback would: dispatch it, then drain any script it
    /// starts. Never prompts.
    pub async fn run_callback_command(&self, line: &str) -> Result<()> {
        let mut session = InterpreterSession::new(self.shared.clone());
        session.run_command(line).await
    }

    /// Evaluate the startup policy against this shell's registry.
    ///
    /// Keep the returned assembly alive while the shell runs; dropping it
    /// uninstalls the assembled lines.
    pub fn assemble_autoexec(&self, opts: &StartupOptions) -> Result<AutoexecAssembler> {
        AutoexecAssembler::assemble(opts, &self.registry)
    }

    /// The shared autoexec registry.
    pub fn registry(&self) -> &Arc<AutoexecRegistry> {
        &self.registry
    }

    /// The shared environment store.
    pub fn env(&self) -> &Arc<EnvStore> {
        &self.shared.env
    }

    /// The shared file-handle table.
    pub fn files(&self) -> Arc<dyn HandleTable> {
        Arc::clone(&self.shared.files)
    }

    /// Ask every session of this shell to stop at its next iteration
    /// boundary. An in-flight dispatch always completes first.
    pub fn request_shutdown(&self) {
        self.shared.shutdown.store(true, Ordering::Relaxed);
    }

    /// The shutdown flag, for handing to a supervisor.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shared.shutdown)
    }
}

/// Builder for customized Shell configuration.
#[derive(Default)]
pub struct ShellBuilder {
    files: Option<Arc<dyn HandleTable>>,
    vfiles: Option<Arc<dyn VfileStore>>,
    console: Option<Arc<dyn Console>>,
    dispatcher: Option<Arc<dyn CommandDispatcher>>,
    env: Vec<(String, String)>,
    verbosity: StartupVerbosity,
    machine: MachineKind,
    shutdown: Option<Arc<AtomicBool>>,
}

impl ShellBuilder {
    /// Set a custom file-handle table.
    pub fn files(mut self, files: Arc<dyn HandleTable>) -> Self {
        self.files = Some(files);
        self
    }

    /// Set a custom virtual-file store for autoexec publication.
    pub fn vfiles(mut self, vfiles: Arc<dyn VfileStore>) -> Self {
        self.vfiles = Some(vfiles);
        self
    }

    /// Set the terminal.
    pub fn console(mut self, console: Arc<dyn Console>) -> Self {
        self.console = Some(console);
        self
    }

    /// Set the command dispatcher.
    pub fn dispatcher(mut self, dispatcher: Arc<dyn CommandDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Set the startup verbosity policy.
    pub fn verbosity(mut self, verbosity: StartupVerbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set the emulated display hardware (affects the startup banner).
    pub fn machine(mut self, machine: MachineKind) -> Self {
        self.machine = machine;
        self
    }

    /// Share a shutdown flag with an external supervisor.
    pub fn shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = Some(flag);
        self
    }

    /// Build the Shell instance.
    pub fn build(self) -> Shell {
        let (files, vfiles): (Arc<dyn HandleTable>, Arc<dyn VfileStore>) =
            match (self.files, self.vfiles) {
                (Some(files), Some(vfiles)) => (files, vfiles),
                (Some(files), None) => (files, Arc::new(InMemoryFiles::new())),
                (None, Some(vfiles)) => (Arc::new(InMemoryFiles::new()), vfiles),
                (None, None) => {
                    let memory = Arc::new(InMemoryFiles::new());
                    (memory.clone(), memory)
                }
            };

        let env = Arc::new(EnvStore::new());
        env.set("PATH", "Z:\\");
        env.set("COMSPEC", "Z:\\COMMAND.COM");
        for (key, value) in self.env {
            env.set(&key, &value);
        }

        let registry = Arc::new(AutoexecRegistry::new());
        registry.attach_vfiles(Arc::clone(&vfiles));
        registry.attach_env(Arc::clone(&env));
        registry.republish();

        let shared = Shared {
            env,
            files,
            console: self
                .console
                .unwrap_or_else(|| Arc::new(BufferConsole::new())),
            dispatcher: self
                .dispatcher
                .unwrap_or_else(|| Arc::new(UnknownCommandDispatcher)),
            shutdown: self.shutdown.unwrap_or_default(),
            verbosity: self.verbosity,
            machine: self.machine,
        };

        Shell { shared, registry }
    }
}

//! Built-in command dispatcher
//!
//! A deliberately small command set: enough to make the assembled startup
//! script and an interactive session usable. Mount/boot commands operate on
//! the virtual drive model and respect the secure-mode lockdown.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use doskit::{
    AutoexecRegistry, CommandDispatcher, DispatchContext, InMemoryFiles, MemoryScript, Result,
    ScriptStream, AUTOEXEC_NAME,
};

pub struct DosDispatcher {
    files: Arc<InMemoryFiles>,
    registry: OnceLock<Arc<AutoexecRegistry>>,
    locked: AtomicBool,
}

impl DosDispatcher {
    pub fn new(files: Arc<InMemoryFiles>) -> Self {
        Self {
            files,
            registry: OnceLock::new(),
            locked: AtomicBool::new(false),
        }
    }

    /// Wire up the registry once the shell exists, so the startup script is
    /// read through the registry's own cursor-tracked stream.
    pub fn attach_registry(&self, registry: Arc<AutoexecRegistry>) {
        let _ = self.registry.set(registry);
    }

    fn locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }

    fn echo(&self, rest: &str, ctx: &mut DispatchContext<'_>) {
        let arg = rest.trim();
        if arg.is_empty() {
            let state = if *ctx.echo_enabled { "on" } else { "off" };
            ctx.console.print(&format!("ECHO is {state}.\n"));
        } else if arg.eq_ignore_ascii_case("off") {
            *ctx.echo_enabled = false;
        } else if arg.eq_ignore_ascii_case("on") {
            *ctx.echo_enabled = true;
        } else {
            ctx.console.print(rest);
            ctx.console.print("\n");
        }
    }

    fn set(&self, rest: &str, ctx: &DispatchContext<'_>) {
        let arg = rest.trim();
        if arg.is_empty() {
            for (name, value) in ctx.env.vars() {
                ctx.console.print(&format!("{name}={value}\n"));
            }
            return;
        }
        match arg.split_once('=') {
            Some((name, value)) => ctx.env.set(name, value),
            None => match ctx.env.get(arg) {
                Some(value) => ctx
                    .console
                    .print(&format!("{}={value}\n", arg.to_ascii_uppercase())),
                None => ctx
                    .console
                    .print(&format!("Environment variable {arg} not defined.\n")),
            },
        }
    }

    fn type_file(&self, rest: &str, ctx: &DispatchContext<'_>) {
        let name = rest.trim().trim_matches('"');
        match self.files.read_file(name) {
            Some(content) => ctx.console.print(&String::from_utf8_lossy(&content)),
            None => ctx.console.print(&format!("File not found: {name}\n")),
        }
    }

    /// Start a batch file: the startup script comes from the registry, any
    /// other `.BAT` from the file store.
    fn launch_batch(&self, name: &str, ctx: &mut DispatchContext<'_>) -> bool {
        if name.eq_ignore_ascii_case(AUTOEXEC_NAME) {
            if let Some(registry) = self.registry.get() {
                *ctx.active_script = Some(Box::new(registry.open_stream()) as Box<dyn ScriptStream>);
                return true;
            }
        }
        if let Some(content) = self.files.read_file(name) {
            let script = MemoryScript::new(&String::from_utf8_lossy(&content));
            *ctx.active_script = Some(Box::new(script) as Box<dyn ScriptStream>);
            return true;
        }
        false
    }

    fn storage_command(&self, ctx: &DispatchContext<'_>, message: String) {
        if self.locked() {
            ctx.console
                .print("This command is disabled in secure mode.\n");
        } else {
            ctx.console.print(&message);
        }
    }
}

#[async_trait]
impl CommandDispatcher for DosDispatcher {
    async fn dispatch(&self, command: &str, mut ctx: DispatchContext<'_>) -> Result<()> {
        let (name, rest) = split_command(command);
        let upper = name.to_ascii_uppercase();

        match upper.as_str() {
            "ECHO" => self.echo(rest, &mut ctx),
            "SET" => self.set(rest, &ctx),
            "REM" => {}
            "VER" => ctx
                .console
                .print(&format!("doskit {}\n", env!("CARGO_PKG_VERSION"))),
            "EXIT" => *ctx.exit_requested = true,
            "TYPE" => self.type_file(rest, &ctx),
            "CALL" => {
                let target = rest.trim().trim_matches('"');
                if !self.launch_batch(target, &mut ctx) {
                    ctx.console.print(&format!("File not found: {target}\n"));
                }
            }
            "MOUNT" => self.storage_command(&ctx, format!("Mounted {}\n", rest.trim())),
            "IMGMOUNT" => self.storage_command(&ctx, format!("Image mounted: {}\n", rest.trim())),
            "BOOT" => self.storage_command(&ctx, format!("Booting {}...\n", rest.trim())),
            "Z:\\CONFIG.COM" if rest.trim().eq_ignore_ascii_case("-securemode") => {
                self.locked.store(true, Ordering::Relaxed);
                ctx.console
                    .print("Storage-mutating commands are now disabled.\n");
            }
            _ if upper.len() == 2 && upper.ends_with(':') => {
                ctx.console
                    .print(&format!("Current drive is {upper}\n"));
            }
            _ if upper.ends_with(".BAT") => {
                let target = name.trim_matches('"').to_string();
                if !self.launch_batch(&target, &mut ctx) {
                    ctx.console.print(&format!("File not found: {target}\n"));
                }
            }
            _ => ctx.console.print(&format!("Illegal command: {name}.\n")),
        }
        Ok(())
    }
}

/// Split a command line into its first word and the remainder (with the
/// single separator removed).
fn split_command(command: &str) -> (&str, &str) {
    let trimmed = command.trim_start();
    match trimmed.find(char::is_whitespace) {
        Some(pos) => {
            let (name, rest) = trimmed.split_at(pos);
            let mut chars = rest.chars();
            chars.next();
            (name, chars.as_str())
        }
        None => (trimmed, ""),
    }
}

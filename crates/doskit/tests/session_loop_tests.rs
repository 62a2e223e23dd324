//! Run-loop state machine tests.
//!
//! Covers: shutdown observed before the first iteration, `/C` one-shot
//! truncation and script draining, `/?` help, exit handling, echo
//! suppression, redirection handle swapping/restoration, and the pipe
//! diagnostic.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use doskit::{
    AutoexecLine, AutoexecRegistry, BufferConsole, CommandDispatcher, DispatchContext,
    HandleTable, InMemoryFiles, Shell, VfileStore,
};

/// Dispatcher that records every command (plus the stdin/stdout open state
/// at dispatch time) and understands a handful of control commands.
#[derive(Default)]
struct Recorder {
    commands: Mutex<Vec<String>>,
    handle_states: Mutex<Vec<(bool, bool)>>,
    registry: OnceLock<Arc<AutoexecRegistry>>,
    shutdown: OnceLock<Arc<AtomicBool>>,
}

impl Recorder {
    fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    fn handle_states(&self) -> Vec<(bool, bool)> {
        self.handle_states.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandDispatcher for Recorder {
    async fn dispatch(&self, command: &str, ctx: DispatchContext<'_>) -> doskit::Result<()> {
        self.commands.lock().unwrap().push(command.to_string());
        self.handle_states
            .lock()
            .unwrap()
            .push((ctx.files.is_open(0), ctx.files.is_open(1)));

        match command.to_ascii_lowercase().as_str() {
            "exit" => *ctx.exit_requested = true,
            "echo off" => *ctx.echo_enabled = false,
            "halt" => {
                if let Some(flag) = self.shutdown.get() {
                    flag.store(true, Ordering::Relaxed);
                }
            }
            "autoexec.bat" => {
                if let Some(registry) = self.registry.get() {
                    *ctx.active_script = Some(Box::new(registry.open_stream()));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

struct Fixture {
    shell: Shell,
    console: Arc<BufferConsole>,
    recorder: Arc<Recorder>,
    files: Arc<InMemoryFiles>,
    lines: Vec<AutoexecLine>,
}

impl Fixture {
    fn new() -> Self {
        let files = Arc::new(InMemoryFiles::new());
        let console = Arc::new(BufferConsole::new());
        let recorder = Arc::new(Recorder::default());
        let shell = Shell::builder()
            .files(files.clone())
            .vfiles(files.clone())
            .console(console.clone())
            .dispatcher(recorder.clone())
            .build();
        recorder
            .registry
            .set(Arc::clone(shell.registry()))
            .ok()
            .unwrap();
        recorder.shutdown.set(shell.shutdown_flag()).ok().unwrap();
        Self {
            shell,
            console,
            recorder,
            files,
            lines: Vec::new(),
        }
    }

    /// Install a line into the startup script.
    fn install(&mut self, text: &str) {
        let mut line = AutoexecLine::new(Arc::clone(self.shell.registry()));
        line.install(text).unwrap();
        self.lines.push(line);
    }
}

#[tokio::test]
async fn shutdown_before_first_iteration_dispatches_nothing() {
    let fx = Fixture::new();
    fx.console.push_input("echo never");
    fx.shell.request_shutdown();

    fx.shell.run("").await.unwrap();
    assert!(fx.recorder.commands().is_empty());
}

#[tokio::test]
async fn help_switch_prints_long_help_and_dispatches_nothing() {
    let fx = Fixture::new();
    fx.shell.run("/?").await.unwrap();
    assert!(fx.console.output().contains("Starts the doskit command shell"));
    assert!(fx.recorder.commands().is_empty());

    fx.shell.run("-?").await.unwrap();
    assert!(fx.recorder.commands().is_empty());
}

#[tokio::test]
async fn one_shot_truncates_at_the_first_line_break() {
    let fx = Fixture::new();
    fx.shell.run("/C dir /w\r\nGARBAGE").await.unwrap();
    assert_eq!(fx.recorder.commands(), vec!["dir /w".to_string()]);
}

#[tokio::test]
async fn one_shot_drains_the_script_it_starts_without_prompting() {
    let mut fx = Fixture::new();
    fx.install("echo one");
    fx.install("echo two");

    fx.shell.run("/C AUTOEXEC.BAT").await.unwrap();
    assert_eq!(
        fx.recorder.commands(),
        vec![
            "AUTOEXEC.BAT".to_string(),
            "echo one".to_string(),
            "echo two".to_string(),
        ]
    );
}

#[tokio::test]
async fn exit_ends_the_interactive_loop() {
    let fx = Fixture::new();
    fx.console.push_input("echo a");
    fx.console.push_input("exit");
    fx.console.push_input("echo never");

    fx.shell.run("").await.unwrap();
    assert_eq!(
        fx.recorder.commands(),
        vec!["echo a".to_string(), "exit".to_string()]
    );
}

#[tokio::test]
async fn console_eof_ends_the_interactive_loop() {
    let fx = Fixture::new();
    fx.shell.run("").await.unwrap();
    assert!(fx.recorder.commands().is_empty());
}

#[tokio::test]
async fn shutdown_is_observed_between_script_lines() {
    let mut fx = Fixture::new();
    fx.install("halt");
    fx.install("echo never");

    fx.shell.run("/C AUTOEXEC.BAT").await.unwrap();
    assert_eq!(
        fx.recorder.commands(),
        vec!["AUTOEXEC.BAT".to_string(), "halt".to_string()]
    );
}

#[tokio::test]
async fn leading_at_suppresses_the_echo_of_its_own_line() {
    let mut fx = Fixture::new();
    fx.install("@echo off");
    fx.install("rem quiet");

    fx.shell.run("/C AUTOEXEC.BAT").await.unwrap();
    let output = fx.console.output();
    assert!(!output.contains("echo off"));
    assert!(!output.contains("rem quiet"));
    // The at-sign is stripped before dispatch.
    assert!(fx.recorder.commands().contains(&"echo off".to_string()));
}

#[tokio::test]
async fn script_lines_echo_with_prompt_while_echo_is_on() {
    let mut fx = Fixture::new();
    fx.install("rem visible");

    fx.shell.run("/C AUTOEXEC.BAT").await.unwrap();
    let output = fx.console.output();
    assert!(output.contains("Z:\\>rem visible\n"));
}

#[tokio::test]
async fn init_dispatches_its_command_then_enters_the_loop() {
    let fx = Fixture::new();
    fx.console.push_input("exit");

    fx.shell.run("/INIT ver").await.unwrap();
    assert_eq!(
        fx.recorder.commands(),
        vec!["ver".to_string(), "exit".to_string()]
    );
    // Default verbosity shows the full welcome banner.
    assert!(fx.console.output().contains("Welcome to doskit"));
}

#[tokio::test]
async fn callback_command_runs_in_a_fresh_session() {
    let fx = Fixture::new();
    fx.shell.run_callback_command("echo reentrant\r\n").await.unwrap();
    assert_eq!(fx.recorder.commands(), vec!["echo reentrant".to_string()]);
}

#[tokio::test]
async fn redirection_swaps_handles_for_the_dispatch_and_restores_after() {
    let fx = Fixture::new();
    fx.files.write_file("IN.TXT", b"hello");

    fx.shell
        .run_callback_command("sort < IN.TXT > OUT.TXT")
        .await
        .unwrap();

    assert_eq!(fx.recorder.commands(), vec!["sort".to_string()]);
    // Both standard handles were redirected while the command ran.
    assert_eq!(fx.recorder.handle_states(), vec![(true, true)]);
    // The output target was created, and the handles were restored.
    assert!(fx.files.read_file("OUT.TXT").is_some());
    assert!(!fx.files.is_open(0));
    assert!(!fx.files.is_open(1));
}

#[tokio::test]
async fn missing_input_target_degrades_to_console_io() {
    let fx = Fixture::new();
    fx.shell
        .run_callback_command("sort < MISSING.TXT")
        .await
        .unwrap();

    assert_eq!(fx.recorder.commands(), vec!["sort".to_string()]);
    assert_eq!(fx.recorder.handle_states(), vec![(false, false)]);
    assert!(!fx.files.is_open(0));
}

#[tokio::test]
async fn append_redirection_seeks_to_the_end_of_an_existing_file() {
    let fx = Fixture::new();
    fx.files.write_file("LOG.TXT", b"old content");

    fx.shell.run_callback_command("ver >> LOG.TXT").await.unwrap();

    // Existing content survives an append open.
    assert_eq!(fx.files.read_file("LOG.TXT").unwrap(), b"old content");
    assert!(!fx.files.is_open(1));
}

#[tokio::test]
async fn pipes_warn_and_run_only_the_first_segment() {
    let fx = Fixture::new();
    fx.shell.run_callback_command("dir | sort | more").await.unwrap();

    assert_eq!(fx.recorder.commands(), vec!["dir".to_string()]);
    assert!(fx.console.output().contains("not supported"));
}

#[tokio::test]
async fn single_pipe_runs_first_segment_without_warning() {
    let fx = Fixture::new();
    fx.shell.run_callback_command("dir | more").await.unwrap();

    assert_eq!(fx.recorder.commands(), vec!["dir".to_string()]);
    assert!(!fx.console.output().contains("not supported"));
}

#[tokio::test]
async fn startup_script_is_published_as_a_virtual_file() {
    let mut fx = Fixture::new();
    fx.install("echo published");
    assert_eq!(
        VfileStore::read(&*fx.files, "AUTOEXEC.BAT").unwrap(),
        b"echo published\r\n"
    );
}

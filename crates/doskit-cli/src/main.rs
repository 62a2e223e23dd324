//! Doskit CLI - DOS-style command shell front-end
//!
//! Usage:
//!   doskit                          # interactive shell with startup banner
//!   doskit -c 'echo hello' --exit   # run startup commands, then quit
//!   doskit ./GAMES                  # mount a directory as C: and switch to it
//!   doskit game.iso --securemode    # mount a CD image, then lock the config

mod conf;
mod console;
mod dispatch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use doskit::{InMemoryFiles, Shell, StartupOptions, StartupVerbosity};

/// Doskit - DOS-compatible command shell
#[derive(Parser, Debug)]
#[command(name = "doskit")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Run the given command during startup (may be repeated, up to 10)
    #[arg(short = 'c', value_name = "COMMAND")]
    commands: Vec<String>,

    /// Disable storage-mutating commands after startup
    #[arg(long = "securemode")]
    secure: bool,

    /// Skip all configuration-file autoexec content
    #[arg(long = "noautoexec")]
    no_autoexec: bool,

    /// Exit after the startup script completes
    #[arg(long)]
    exit: bool,

    /// Configuration file with an [autoexec] section
    #[arg(long, value_name = "FILE")]
    conf: Option<PathBuf>,

    /// Startup verbosity
    #[arg(long, value_enum, default_value = "medium")]
    verbosity: Verbosity,

    /// Directory, program, batch file, or disc image to mount and launch
    #[arg(value_name = "PATH")]
    paths: Vec<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Verbosity {
    Quiet,
    Low,
    Medium,
    High,
    Instant,
}

impl From<Verbosity> for StartupVerbosity {
    fn from(verbosity: Verbosity) -> Self {
        match verbosity {
            Verbosity::Quiet => StartupVerbosity::Quiet,
            Verbosity::Low => StartupVerbosity::Low,
            Verbosity::Medium => StartupVerbosity::Medium,
            Verbosity::High => StartupVerbosity::High,
            Verbosity::Instant => StartupVerbosity::InstantLaunch,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let conf = match &args.conf {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read configuration: {}", path.display()))?;
            conf::parse_conf(&text)
        }
        None => conf::ConfFile::default(),
    };

    let opts = StartupOptions {
        secure: args.secure,
        no_autoexec: args.no_autoexec,
        extra_commands: args.commands,
        exit_switch: args.exit,
        verbosity: args.verbosity.into(),
        join_autoexec: conf.join_autoexec,
        conf_autoexec: conf.autoexec,
        commands: args.paths,
    };

    let files = Arc::new(InMemoryFiles::new());
    let dispatcher = Arc::new(dispatch::DosDispatcher::new(files.clone()));
    let shell = Shell::builder()
        .files(files.clone())
        .vfiles(files)
        .console(Arc::new(console::StdConsole::new()))
        .dispatcher(dispatcher.clone())
        .verbosity(args.verbosity.into())
        .build();
    dispatcher.attach_registry(Arc::clone(shell.registry()));

    // Startup-configuration failures (overflow, double install) are fatal.
    let _autoexec = shell
        .assemble_autoexec(&opts)
        .context("Failed to assemble AUTOEXEC.BAT")?;

    shell.run("/INIT AUTOEXEC.BAT").await?;
    Ok(())
}

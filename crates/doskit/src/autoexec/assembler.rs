//! Construction-time autoexec policy
//!
//! Decides, once, which startup lines get installed and in what order:
//! extra command-line commands, the mount/launch sequence for a directory or
//! file named on the command line, configuration-file content, secure-mode
//! lockdown, and the final exit call.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use super::{AutoexecLine, AutoexecRegistry};
use crate::error::Result;
use crate::session::StartupVerbosity;

const SLOT_COUNT: usize = 17;
const EXTRA_COMMANDS_MAX: usize = 10;

/// Disables persistent-storage-mutating commands for the rest of the run.
const SECURE_LOCKDOWN: &str = "z:\\config.com -securemode";

/// Startup flags that drive autoexec assembly.
#[derive(Debug, Clone, Default)]
pub struct StartupOptions {
    /// Seal off storage-mutating commands once startup completes.
    pub secure: bool,
    /// Ignore configuration-file autoexec content entirely.
    pub no_autoexec: bool,
    /// Extra commands supplied on the command line, in order (capped at 10).
    pub extra_commands: Vec<String>,
    /// Append an `exit` so the interpreter quits after the startup script.
    pub exit_switch: bool,
    pub verbosity: StartupVerbosity,
    /// Honor configuration-file content even when the command line names a
    /// directory or file to launch.
    pub join_autoexec: bool,
    /// Raw content of the configuration file's autoexec section.
    pub conf_autoexec: Option<String>,
    /// Non-switch command-line arguments; the first that names an existing
    /// directory or file selects the mount/launch sequence.
    pub commands: Vec<String>,
}

/// Owner of the assembled startup lines.
///
/// Keep this alive for as long as the shell runs; dropping it uninstalls
/// every line it assembled.
pub struct AutoexecAssembler {
    #[allow(dead_code)] // Held for its Drop behavior
    slots: [AutoexecLine; SLOT_COUNT],
    #[allow(dead_code)]
    echo: AutoexecLine,
}

impl AutoexecAssembler {
    /// Evaluate the startup policy and install the resulting lines.
    ///
    /// Fails only on construction-time fatals (double install, buffer
    /// overflow); callers are expected to abort startup on error.
    pub fn assemble(opts: &StartupOptions, registry: &Arc<AutoexecRegistry>) -> Result<Self> {
        let mut slots: [AutoexecLine; SLOT_COUNT] =
            std::array::from_fn(|_| AutoexecLine::new(Arc::clone(registry)));
        let mut echo = AutoexecLine::new(Arc::clone(registry));

        let secure = opts.secure;
        let autoexec_allowed = !secure && !opts.no_autoexec;

        let mut exit_call_exists = false;
        let mut next = 1;
        for raw in &opts.extra_commands {
            let line = rewrite_quotes(raw);
            // A user-supplied exit must not run before configuration-file
            // content; remember it and let the final slot handle it.
            if line == "exit" || line == "\"exit\"" {
                exit_call_exists = true;
                continue;
            }
            if next > EXTRA_COMMANDS_MAX {
                break;
            }
            slots[next].install(line)?;
            next += 1;
        }

        let add_exit = exit_call_exists
            || opts.exit_switch
            || opts.verbosity == StartupVerbosity::InstantLaunch;

        let found = install_mount_target(&mut slots, secure, &opts.commands)?;

        if autoexec_allowed {
            if opts.join_autoexec {
                install_conf_autoexec(
                    &mut slots,
                    &mut echo,
                    opts.conf_autoexec.as_deref(),
                    "joined sections",
                )?;
            } else if found {
                info!("using commands provided on the command line");
            } else {
                install_conf_autoexec(
                    &mut slots,
                    &mut echo,
                    opts.conf_autoexec.as_deref(),
                    "configuration file",
                )?;
            }
        } else if secure && !found {
            // Nothing to launch; seal the configuration outright.
            slots[12].install(SECURE_LOCKDOWN)?;
        }

        // The last slot is always reserved for the exit call.
        if add_exit {
            slots[16].install("exit")?;
        }

        registry.republish();
        Ok(Self { slots, echo })
    }
}

/// Install the mount/launch sequence for the first command-line argument
/// naming an existing directory or file. Returns whether one was found.
fn install_mount_target(
    slots: &mut [AutoexecLine; SLOT_COUNT],
    secure: bool,
    args: &[String],
) -> Result<bool> {
    for arg in args {
        let Some(path) = resolve_path(arg) else {
            continue;
        };
        let Ok(meta) = std::fs::metadata(&path) else {
            continue;
        };

        if meta.is_dir() {
            slots[12].install(format!("MOUNT C \"{}\"", path.display()))?;
            slots[13].install("C:")?;
            if secure {
                slots[14].install(SECURE_LOCKDOWN)?;
            }
            return Ok(true);
        }

        let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) else {
            continue;
        };
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        slots[12].install(format!("MOUNT C \"{}\"", dir.display()))?;
        slots[13].install("C:")?;

        // BOOT and IMGMOUNT get the name as given (host names are long and
        // case sensitive); everything else runs the upcased DOS name.
        let upper = name.to_ascii_uppercase();
        if upper.ends_with(".BAT") {
            if secure {
                slots[14].install(SECURE_LOCKDOWN)?;
            }
            // Batch files are CALLed so a trailing exit still runs.
            slots[15].install(format!("CALL {upper}"))?;
        } else if upper.ends_with(".IMG") || upper.ends_with(".IMA") {
            // Booting is inherently privileged and incompatible with the
            // lockdown, which is never injected on this path.
            slots[15].install(format!("BOOT {name}"))?;
        } else if upper.ends_with(".ISO") || upper.ends_with(".CUE") {
            slots[14].install(format!("IMGMOUNT D \"{name}\" -t iso"))?;
            // Lockdown lands after the image mount on this branch.
            if secure {
                slots[15].install(SECURE_LOCKDOWN)?;
            }
        } else {
            if secure {
                slots[14].install(SECURE_LOCKDOWN)?;
            }
            slots[15].install(upper)?;
        }
        return Ok(true);
    }
    Ok(false)
}

/// Install configuration-file autoexec content, hoisting a leading
/// `echo off` / `@echo off` directive to a dedicated front-of-sequence line.
fn install_conf_autoexec(
    slots: &mut [AutoexecLine; SLOT_COUNT],
    echo: &mut AutoexecLine,
    content: Option<&str>,
    source: &str,
) -> Result<()> {
    let Some(data) = content else {
        return Ok(());
    };
    if data.is_empty() {
        return Ok(());
    }

    let first_len = data.find(['\r', '\n']).unwrap_or(data.len());
    let first = &data[..first_len];
    let echo_off =
        first.eq_ignore_ascii_case("echo off") || first.eq_ignore_ascii_case("@echo off");

    let mut extra = data;
    if echo_off {
        echo.install_before("@echo off")?;
        extra = &data[first_len..];
        extra = extra.strip_prefix('\r').unwrap_or(extra);
        extra = extra.strip_prefix('\n').unwrap_or(extra);
    }

    if !extra.is_empty() {
        slots[0].install(extra)?;
        info!(source, "using autoexec from configuration");
    }
    Ok(())
}

/// Resolve a command-line argument to an existing path, first as given, then
/// relative to the current working directory. Bare names are qualified so
/// the mount command always references a real directory.
fn resolve_path(arg: &str) -> Option<PathBuf> {
    let as_given = PathBuf::from(arg);
    if std::fs::metadata(&as_given).is_ok() {
        let qualified = as_given
            .parent()
            .map(|p| !p.as_os_str().is_empty())
            .unwrap_or(false);
        if as_given.is_absolute() || qualified {
            return Some(as_given);
        }
        return std::env::current_dir().ok().map(|cwd| cwd.join(arg));
    }
    let joined = std::env::current_dir().ok()?.join(arg);
    std::fs::metadata(&joined).ok().map(|_| joined)
}

#[cfg(windows)]
fn rewrite_quotes(line: &str) -> String {
    // Mount commands need double quotes to contain spaces; shells there
    // make singles far easier to type.
    line.replace('\'', "\"")
}

#[cfg(not(windows))]
fn rewrite_quotes(line: &str) -> String {
    line.to_string()
}

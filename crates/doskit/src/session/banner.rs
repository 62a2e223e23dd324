//! Startup banner and help text

/// How talkative startup should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartupVerbosity {
    /// No banner beyond the bare version line.
    Quiet,
    /// Version line only.
    Low,
    /// Full welcome banner.
    #[default]
    Medium,
    /// Full welcome banner.
    High,
    /// Skip straight into the startup script and exit when it finishes.
    InstantLaunch,
}

impl StartupVerbosity {
    /// Whether the full multi-part welcome banner should be shown.
    pub fn wants_welcome_banner(self) -> bool {
        matches!(self, StartupVerbosity::Medium | StartupVerbosity::High)
    }
}

/// Emulated display hardware, for the banner's key-hint sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MachineKind {
    #[default]
    Vga,
    Cga,
    CgaMono,
    Hercules,
}

#[cfg(target_os = "macos")]
pub(crate) const PRIMARY_MOD: &str = "Cmd";
#[cfg(not(target_os = "macos"))]
pub(crate) const PRIMARY_MOD: &str = "Alt";

#[cfg(target_os = "macos")]
pub(crate) const SECONDARY_MOD: &str = "Opt";
#[cfg(not(target_os = "macos"))]
pub(crate) const SECONDARY_MOD: &str = "Ctrl";

/// The bare version line printed by sub-shells and quiet startups.
pub(crate) fn version_line() -> String {
    format!("doskit {}\n", env!("CARGO_PKG_VERSION"))
}

/// Build the startup banner for the given verbosity and display hardware.
pub(crate) fn welcome(verbosity: StartupVerbosity, machine: MachineKind) -> String {
    if !verbosity.wants_welcome_banner() {
        return version_line();
    }

    let mut text = format!(
        "Welcome to doskit {}\n\
         \n\
         For a short introduction for new users type: INTRO\n\
         For supported shell commands type: HELP\n\
         \n\
         To adjust the emulated CPU speed, use {key}+F11 and {key}+F12.\n\
         To activate the keymapper {key}+F1.\n",
        env!("CARGO_PKG_VERSION"),
        key = PRIMARY_MOD,
    );

    if cfg!(debug_assertions) {
        text.push_str(&format!(
            "Press {SECONDARY_MOD}+Pause to enter the debugger or start the exe with DEBUG.\n"
        ));
    }

    match machine {
        MachineKind::Cga => text.push_str(&format!(
            "Composite CGA mode is supported. Use F12 to set composite output\n\
             ON, OFF, or AUTO; F10 selects the CGA setting to change and\n\
             ({SECONDARY_MOD}+)F11 changes it.\n"
        )),
        MachineKind::CgaMono => text.push_str(&format!(
            "Use F11 to cycle through green, amber, white and paper-white mode,\n\
             and {SECONDARY_MOD}+F11 to change contrast/brightness settings.\n"
        )),
        MachineKind::Hercules => text.push_str(
            "Use F11 to cycle through white, amber, and green monochrome color.\n",
        ),
        MachineKind::Vga => {}
    }

    text.push('\n');
    text
}

/// Long help for the `/?` switch.
pub(crate) const COMMAND_HELP_LONG: &str = "\
Starts the doskit command shell.
Usage:
  command
  command /c (or /init) COMMAND

Where:
  COMMAND is a DOS command, game, or program to run.

Notes:
  Doskit automatically starts a command shell by invoking this command with
  the /init option when it starts, which shows the welcome banner.
  You can load a new instance of the command shell by running command.
  Adding a /c option along with COMMAND allows this command to run the
  specified command (optionally with parameters) and then exit automatically.

Examples:
  command
  command /c echo Hello world!
  command /init dir
";

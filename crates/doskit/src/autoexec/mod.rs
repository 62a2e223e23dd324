//! Startup script assembly and publication
//!
//! The registry holds an ordered sequence of installed lines and rebuilds a
//! fixed-capacity buffer (the synthetic `AUTOEXEC.BAT`) whenever membership
//! changes. Lines are owned by [`AutoexecLine`] handle objects; dropping a
//! handle removes its line, unless the currently-executing startup stream
//! has already read past it, in which case the text is blanked to spaces so
//! the stream's byte cursor stays valid.

mod assembler;

pub use assembler::{AutoexecAssembler, StartupOptions};

use async_trait::async_trait;
use std::sync::{Arc, RwLock};

use crate::env::EnvStore;
use crate::error::{Error, Result};
use crate::fs::VfileStore;
use crate::session::ScriptStream;

/// Name the assembled buffer is published under.
pub const AUTOEXEC_NAME: &str = "AUTOEXEC.BAT";

/// Fixed capacity of the assembled buffer, CRLF terminators included.
pub const AUTOEXEC_CAPACITY: usize = 4096;

#[derive(Default)]
struct Inner {
    sequence: Vec<String>,
    buffer: Vec<u8>,
    /// Byte offset the active startup stream has consumed up to; 0 when no
    /// stream is active.
    cursor: usize,
    stream_active: bool,
}

impl Inner {
    fn rebuild(&mut self) -> Result<()> {
        let mut data = Vec::with_capacity(AUTOEXEC_CAPACITY);
        for line in &self.sequence {
            let needed = data.len() + line.len() + 2;
            if needed > AUTOEXEC_CAPACITY {
                return Err(Error::AutoexecOverflow {
                    needed,
                    capacity: AUTOEXEC_CAPACITY,
                });
            }
            data.extend_from_slice(line.as_bytes());
            data.extend_from_slice(b"\r\n");
        }
        self.buffer = data;
        Ok(())
    }
}

/// Ordered collection of installed startup-script lines.
///
/// One instance per process, shared by reference between the assembler and
/// the top-level session. Every membership change triggers a full rebuild
/// of the buffer and a republish of the virtual file.
#[derive(Default)]
pub struct AutoexecRegistry {
    inner: RwLock<Inner>,
    vfiles: RwLock<Option<Arc<dyn VfileStore>>>,
    env: RwLock<Option<Arc<EnvStore>>>,
}

impl AutoexecRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish rebuilds into `store` from now on.
    pub fn attach_vfiles(&self, store: Arc<dyn VfileStore>) {
        *self.vfiles.write().unwrap() = Some(store);
    }

    /// Mirror `set NAME=VALUE` lines into `env` as they are installed and
    /// removed, so a running shell sees configuration changes immediately.
    pub fn attach_env(&self, env: Arc<EnvStore>) {
        *self.env.write().unwrap() = Some(env);
    }

    /// Current buffer contents.
    pub fn buffer(&self) -> Vec<u8> {
        self.inner.read().unwrap().buffer.clone()
    }

    fn install_text(&self, text: &str, prepend: bool) -> Result<()> {
        {
            let mut inner = self.inner.write().unwrap();
            if prepend {
                inner.sequence.insert(0, text.to_string());
            } else {
                inner.sequence.push(text.to_string());
            }
            if let Err(err) = inner.rebuild() {
                // Roll the sequence back so the registry stays consistent
                // for whoever reports the fatal.
                if prepend {
                    inner.sequence.remove(0);
                } else {
                    inner.sequence.pop();
                }
                let _ = inner.rebuild();
                return Err(err);
            }
        }
        self.apply_env(text, false);
        self.republish();
        Ok(())
    }

    fn uninstall_text(&self, text: &str) {
        {
            let mut inner = self.inner.write().unwrap();
            let mut offset = 0;
            let mut idx = 0;
            while idx < inner.sequence.len() {
                if inner.sequence[idx] != text {
                    offset += inner.sequence[idx].len() + 2;
                    idx += 1;
                    continue;
                }
                if inner.stream_active && inner.cursor > offset {
                    // The stream has read past this line; removing it would
                    // shift everything after the cursor. Blank it in place.
                    inner.sequence[idx] = " ".repeat(text.len());
                    offset += text.len() + 2;
                    idx += 1;
                } else {
                    inner.sequence.remove(idx);
                }
            }
            // Removal only shrinks; rebuild cannot overflow.
            let _ = inner.rebuild();
        }
        self.apply_env(text, true);
        self.republish();
    }

    /// Mirror `set NAME=VALUE` into the attached environment store.
    fn apply_env(&self, text: &str, clear: bool) {
        let Some(env) = self.env.read().unwrap().clone() else {
            return;
        };
        let is_set = text
            .get(..4)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("set "));
        if !is_set || text.len() == 4 {
            return;
        }
        let assignment = &text[4..];
        match assignment.split_once('=') {
            Some((name, value)) => env.set(name, if clear { "" } else { value }),
            None => env.set(assignment, ""),
        }
    }

    pub(crate) fn republish(&self) {
        if let Some(store) = self.vfiles.read().unwrap().clone() {
            store.publish(AUTOEXEC_NAME, &self.inner.read().unwrap().buffer);
        }
    }

    /// Open the buffer as a script stream.
    ///
    /// The stream advances the registry's cursor as it reads, which is what
    /// lets line removal degrade to blanking while the stream is live. The
    /// cursor resets when the stream is dropped.
    pub fn open_stream(self: &Arc<Self>) -> AutoexecStream {
        let mut inner = self.inner.write().unwrap();
        inner.cursor = 0;
        inner.stream_active = true;
        AutoexecStream {
            registry: Arc::clone(self),
        }
    }
}

/// Script stream over the assembled buffer.
pub struct AutoexecStream {
    registry: Arc<AutoexecRegistry>,
}

#[async_trait]
impl ScriptStream for AutoexecStream {
    async fn read_next_line(&mut self) -> Option<String> {
        let mut inner = self.registry.inner.write().unwrap();
        if inner.cursor >= inner.buffer.len() {
            return None;
        }
        let rest = &inner.buffer[inner.cursor..];
        let (line, advance) = match rest.windows(2).position(|w| w == b"\r\n") {
            Some(pos) => (&rest[..pos], pos + 2),
            None => (rest, rest.len()),
        };
        let line = String::from_utf8_lossy(line).into_owned();
        inner.cursor += advance;
        Some(line)
    }
}

impl Drop for AutoexecStream {
    fn drop(&mut self) {
        let mut inner = self.registry.inner.write().unwrap();
        inner.cursor = 0;
        inner.stream_active = false;
    }
}

/// One installable startup-script line.
///
/// Created uninstalled; installing twice is a configuration error. Dropping
/// an installed line uninstalls it (removing or blanking, see the registry).
pub struct AutoexecLine {
    registry: Arc<AutoexecRegistry>,
    installed: bool,
    text: String,
}

impl AutoexecLine {
    /// Create an uninstalled line bound to `registry`.
    pub fn new(registry: Arc<AutoexecRegistry>) -> Self {
        Self {
            registry,
            installed: false,
            text: String::new(),
        }
    }

    /// Install at the back of the sequence.
    pub fn install(&mut self, text: impl Into<String>) -> Result<()> {
        self.install_at(text.into(), false)
    }

    /// Install at the front of the sequence.
    pub fn install_before(&mut self, text: impl Into<String>) -> Result<()> {
        self.install_at(text.into(), true)
    }

    fn install_at(&mut self, text: String, prepend: bool) -> Result<()> {
        if self.installed {
            return Err(Error::AutoexecInstalled(self.text.clone()));
        }
        let text = normalize_line_endings(&text);
        self.registry.install_text(&text, prepend)?;
        self.installed = true;
        self.text = text;
        Ok(())
    }

    /// Whether this line has been installed.
    pub fn is_installed(&self) -> bool {
        self.installed
    }

    /// The installed text (empty before installation).
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl Drop for AutoexecLine {
    fn drop(&mut self) {
        if self.installed {
            self.registry.uninstall_text(&self.text);
        }
    }
}

/// Rewrite lone `\n` line endings to `\r\n`; existing pairs are untouched.
fn normalize_line_endings(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev = '\0';
    for ch in text.chars() {
        if ch == '\n' && prev != '\r' {
            out.push('\r');
        }
        out.push(ch);
        prev = ch;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Arc<AutoexecRegistry> {
        Arc::new(AutoexecRegistry::new())
    }

    #[test]
    fn lines_concatenate_in_order_with_crlf() {
        let reg = registry();
        let mut a = AutoexecLine::new(Arc::clone(&reg));
        let mut b = AutoexecLine::new(Arc::clone(&reg));
        a.install("echo one").unwrap();
        b.install("echo two").unwrap();
        assert_eq!(reg.buffer(), b"echo one\r\necho two\r\n");
    }

    #[test]
    fn prepend_goes_to_the_front() {
        let reg = registry();
        let mut a = AutoexecLine::new(Arc::clone(&reg));
        let mut b = AutoexecLine::new(Arc::clone(&reg));
        a.install("second").unwrap();
        b.install_before("first").unwrap();
        assert_eq!(reg.buffer(), b"first\r\nsecond\r\n");
    }

    #[test]
    fn double_install_is_fatal() {
        let reg = registry();
        let mut line = AutoexecLine::new(Arc::clone(&reg));
        line.install("echo hi").unwrap();
        let err = line.install("echo again").unwrap_err();
        assert!(matches!(err, Error::AutoexecInstalled(_)));
    }

    #[test]
    fn lone_newlines_are_rewritten() {
        assert_eq!(normalize_line_endings("a\nb"), "a\r\nb");
        assert_eq!(normalize_line_endings("a\r\nb"), "a\r\nb");
        assert_eq!(normalize_line_endings("a\rb"), "a\rb");
    }

    #[test]
    fn overflow_is_fatal_and_rolls_back() {
        let reg = registry();
        let mut big = AutoexecLine::new(Arc::clone(&reg));
        big.install("x".repeat(4000)).unwrap();
        let mut more = AutoexecLine::new(Arc::clone(&reg));
        let err = more.install("y".repeat(200)).unwrap_err();
        assert!(matches!(err, Error::AutoexecOverflow { .. }));
        assert!(!more.is_installed());
        assert_eq!(reg.buffer().len(), 4002);
    }

    #[test]
    fn install_up_to_capacity_succeeds() {
        let reg = registry();
        // 4094 text bytes + CRLF = exactly 4096.
        let mut line = AutoexecLine::new(Arc::clone(&reg));
        line.install("x".repeat(4094)).unwrap();
        assert_eq!(reg.buffer().len(), AUTOEXEC_CAPACITY);
    }

    #[test]
    fn drop_removes_when_no_stream_is_active() {
        let reg = registry();
        let mut keep = AutoexecLine::new(Arc::clone(&reg));
        keep.install("echo keep").unwrap();
        {
            let mut gone = AutoexecLine::new(Arc::clone(&reg));
            gone.install("echo gone").unwrap();
        }
        assert_eq!(reg.buffer(), b"echo keep\r\n");
    }

    #[tokio::test]
    async fn drop_blanks_when_stream_has_passed_the_line() {
        let reg = registry();
        let mut first = AutoexecLine::new(Arc::clone(&reg));
        let mut second = AutoexecLine::new(Arc::clone(&reg));
        first.install("set X=1").unwrap();
        second.install("echo after").unwrap();
        let before = reg.buffer().len();

        let mut stream = reg.open_stream();
        assert_eq!(stream.read_next_line().await.as_deref(), Some("set X=1"));

        drop(first);
        assert_eq!(reg.buffer().len(), before);
        assert!(reg.buffer().starts_with(b"       \r\n"));

        // Not yet reached by the cursor: removed outright.
        drop(second);
        assert_eq!(reg.buffer(), b"       \r\n");
    }

    #[tokio::test]
    async fn cursor_resets_when_stream_drops() {
        let reg = registry();
        let mut line = AutoexecLine::new(Arc::clone(&reg));
        line.install("echo hi").unwrap();
        {
            let mut stream = reg.open_stream();
            assert!(stream.read_next_line().await.is_some());
        }
        // Stream gone: removal no longer degrades to blanking.
        drop(line);
        assert!(reg.buffer().is_empty());
    }

    #[test]
    fn set_lines_mirror_into_the_environment() {
        let reg = registry();
        let env = Arc::new(EnvStore::new());
        reg.attach_env(Arc::clone(&env));

        let mut line = AutoexecLine::new(Arc::clone(&reg));
        line.install("SET BLASTER=A220 I7 D1").unwrap();
        assert_eq!(env.get("BLASTER").as_deref(), Some("A220 I7 D1"));

        drop(line);
        assert_eq!(env.get("BLASTER"), None);
    }

    #[test]
    fn publishes_into_attached_store() {
        use crate::fs::InMemoryFiles;
        let reg = registry();
        let files = Arc::new(InMemoryFiles::new());
        reg.attach_vfiles(files.clone());

        let mut line = AutoexecLine::new(Arc::clone(&reg));
        line.install("echo hi").unwrap();
        assert_eq!(
            crate::fs::VfileStore::read(&*files, AUTOEXEC_NAME).unwrap(),
            b"echo hi\r\n"
        );
    }
}

//! Real-terminal console

use async_trait::async_trait;
use std::io::Write;

use doskit::{Console, Error, Result};

/// Console backed by process stdin/stdout.
pub struct StdConsole;

impl StdConsole {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Console for StdConsole {
    async fn read_line(&self) -> Result<Option<String>> {
        // Blocking read off the runtime's blocking pool; the run-loop only
        // ever waits on one line at a time.
        let line = tokio::task::spawn_blocking(|| {
            let mut buf = String::new();
            match std::io::stdin().read_line(&mut buf) {
                Ok(0) => Ok(None),
                Ok(_) => {
                    while buf.ends_with('\n') || buf.ends_with('\r') {
                        buf.pop();
                    }
                    Ok(Some(buf))
                }
                Err(err) => Err(err),
            }
        })
        .await
        .map_err(|err| Error::Console(err.to_string()))?
        .map_err(|err| Error::Console(err.to_string()))?;
        Ok(line)
    }

    fn print(&self, text: &str) {
        let mut out = std::io::stdout();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }
}

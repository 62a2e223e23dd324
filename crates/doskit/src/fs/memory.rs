//! In-memory handle table and file store

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use super::traits::{HandleTable, OpenMode, VfileStore, CONSOLE_DEVICE};
use crate::error::{Error, Result};

/// Size of the per-process handle array (DOS default `FILES=20`).
const MAX_HANDLES: usize = 20;

/// In-memory handle table.
///
/// Stores files in a HashMap keyed by uppercased name (DOS names are
/// case-insensitive) and tracks open handles in a fixed slot array. Also
/// doubles as the [`VfileStore`] the autoexec registry publishes into:
/// virtual files are readable but cannot be created over or written.
pub struct InMemoryFiles {
    files: RwLock<HashMap<String, Vec<u8>>>,
    vfiles: RwLock<HashMap<String, Vec<u8>>>,
    slots: RwLock<Vec<Option<OpenHandle>>>,
}

#[derive(Debug, Clone)]
struct OpenHandle {
    name: String,
    pos: u64,
    #[allow(dead_code)] // Read back by future write-through support
    mode: OpenMode,
    device: bool,
}

impl Default for InMemoryFiles {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryFiles {
    /// Create an empty table with no open handles.
    pub fn new() -> Self {
        Self {
            files: RwLock::new(HashMap::new()),
            vfiles: RwLock::new(HashMap::new()),
            slots: RwLock::new(vec![None; MAX_HANDLES]),
        }
    }

    fn key(name: &str) -> String {
        name.to_ascii_uppercase()
    }

    /// Store a file, replacing any previous content.
    pub fn write_file(&self, name: &str, content: &[u8]) {
        let mut files = self.files.write().unwrap();
        files.insert(Self::key(name), content.to_vec());
    }

    /// Read a file or published virtual file.
    pub fn read_file(&self, name: &str) -> Option<Vec<u8>> {
        let key = Self::key(name);
        if let Some(content) = self.vfiles.read().unwrap().get(&key) {
            return Some(content.clone());
        }
        self.files.read().unwrap().get(&key).cloned()
    }

    /// Whether a file or virtual file exists.
    pub fn exists(&self, name: &str) -> bool {
        let key = Self::key(name);
        self.vfiles.read().unwrap().contains_key(&key)
            || self.files.read().unwrap().contains_key(&key)
    }

    fn alloc_slot(&self, handle: OpenHandle) -> Result<u8> {
        let mut slots = self.slots.write().unwrap();
        match slots.iter().position(|s| s.is_none()) {
            Some(free) => {
                slots[free] = Some(handle);
                Ok(free as u8)
            }
            None => Err(Error::HandleTable("too many open files".to_string())),
        }
    }
}

#[async_trait]
impl HandleTable for InMemoryFiles {
    async fn open(&self, name: &str, mode: OpenMode) -> Result<u8> {
        let key = Self::key(name);
        if key == CONSOLE_DEVICE {
            return self.alloc_slot(OpenHandle {
                name: key,
                pos: 0,
                mode,
                device: true,
            });
        }
        if self.vfiles.read().unwrap().contains_key(&key) {
            if mode == OpenMode::ReadWrite {
                return Err(Error::HandleTable(format!("access denied: {name}")));
            }
        } else if !self.files.read().unwrap().contains_key(&key) {
            return Err(Error::HandleTable(format!("file not found: {name}")));
        }
        self.alloc_slot(OpenHandle {
            name: key,
            pos: 0,
            mode,
            device: false,
        })
    }

    async fn create(&self, name: &str, _attr: u8) -> Result<u8> {
        let key = Self::key(name);
        if self.vfiles.read().unwrap().contains_key(&key) {
            return Err(Error::HandleTable(format!("access denied: {name}")));
        }
        self.files.write().unwrap().insert(key.clone(), Vec::new());
        self.alloc_slot(OpenHandle {
            name: key,
            pos: 0,
            mode: OpenMode::ReadWrite,
            device: false,
        })
    }

    async fn close(&self, slot: u8) -> Result<()> {
        let mut slots = self.slots.write().unwrap();
        match slots.get_mut(slot as usize).and_then(Option::take) {
            Some(_) => Ok(()),
            None => Err(Error::HandleTable(format!("handle {slot} not open"))),
        }
    }

    async fn seek_end(&self, slot: u8) -> Result<u64> {
        let mut slots = self.slots.write().unwrap();
        let handle = slots
            .get_mut(slot as usize)
            .and_then(Option::as_mut)
            .ok_or_else(|| Error::HandleTable(format!("handle {slot} not open")))?;
        if handle.device {
            return Ok(0);
        }
        let len = self
            .read_file(&handle.name)
            .map(|content| content.len() as u64)
            .unwrap_or(0);
        handle.pos = len;
        Ok(len)
    }

    async fn duplicate(&self, slot: u8) -> Result<u8> {
        let copy = {
            let slots = self.slots.read().unwrap();
            slots
                .get(slot as usize)
                .and_then(Option::as_ref)
                .cloned()
                .ok_or_else(|| Error::HandleTable(format!("handle {slot} not open")))?
        };
        self.alloc_slot(copy)
    }

    fn is_open(&self, slot: u8) -> bool {
        let slots = self.slots.read().unwrap();
        slots
            .get(slot as usize)
            .map(|s| s.is_some())
            .unwrap_or(false)
    }
}

impl VfileStore for InMemoryFiles {
    fn publish(&self, name: &str, content: &[u8]) {
        let mut vfiles = self.vfiles.write().unwrap();
        vfiles.insert(Self::key(name), content.to_vec());
    }

    fn remove(&self, name: &str) {
        let mut vfiles = self.vfiles.write().unwrap();
        vfiles.remove(&Self::key(name));
    }

    fn read(&self, name: &str) -> Option<Vec<u8>> {
        let vfiles = self.vfiles.read().unwrap();
        vfiles.get(&Self::key(name)).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_land_in_lowest_free_slot() {
        let files = InMemoryFiles::new();
        files.write_file("A.TXT", b"a");
        files.write_file("B.TXT", b"b");

        let a = files.open("A.TXT", OpenMode::Read).await.unwrap();
        let b = files.open("B.TXT", OpenMode::Read).await.unwrap();
        assert_eq!((a, b), (0, 1));

        files.close(a).await.unwrap();
        let c = files.open("B.TXT", OpenMode::Read).await.unwrap();
        assert_eq!(c, 0);
    }

    #[tokio::test]
    async fn console_device_always_opens() {
        let files = InMemoryFiles::new();
        let slot = files.open("con", OpenMode::ReadWrite).await.unwrap();
        assert!(files.is_open(slot));
    }

    #[tokio::test]
    async fn missing_file_fails_to_open() {
        let files = InMemoryFiles::new();
        assert!(files.open("NOPE.TXT", OpenMode::Read).await.is_err());
    }

    #[tokio::test]
    async fn create_truncates_and_opens() {
        let files = InMemoryFiles::new();
        files.write_file("OUT.TXT", b"old");
        let slot = files.create("OUT.TXT", super::super::ATTR_ARCHIVE).await.unwrap();
        assert!(files.is_open(slot));
        assert_eq!(files.read_file("OUT.TXT").unwrap(), b"");
    }

    #[tokio::test]
    async fn vfiles_are_read_only() {
        let files = InMemoryFiles::new();
        files.publish("AUTOEXEC.BAT", b"echo hi\r\n");

        assert!(files.open("autoexec.bat", OpenMode::Read).await.is_ok());
        assert!(files.open("AUTOEXEC.BAT", OpenMode::ReadWrite).await.is_err());
        assert!(files.create("AUTOEXEC.BAT", 0).await.is_err());
    }

    #[tokio::test]
    async fn seek_end_reports_length() {
        let files = InMemoryFiles::new();
        files.write_file("LOG.TXT", b"12345");
        let slot = files.open("LOG.TXT", OpenMode::ReadWrite).await.unwrap();
        assert_eq!(files.seek_end(slot).await.unwrap(), 5);
    }
}

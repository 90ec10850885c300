//! In-memory serial link for tests and dry runs.
//!
//! A [`ScriptedConnector`] hands out handles that all read from one
//! shared script of byte chunks and I/O failures. Clones share state,
//! so a test keeps one clone to feed data after giving the other to
//! the transport.

use std::collections::{HashSet, VecDeque};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::serial::{Connector, SerialHandle};

#[derive(Debug, Default)]
struct Script {
    candidates: Vec<String>,
    refused: HashSet<String>,
    opened: Vec<String>,
    reads: VecDeque<Result<Vec<u8>, io::ErrorKind>>,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedConnector {
    script: Arc<Mutex<Script>>,
}

impl ScriptedConnector {
    pub fn new<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let script = Script {
            candidates: candidates.into_iter().map(Into::into).collect(),
            ..Script::default()
        };
        Self {
            script: Arc::new(Mutex::new(script)),
        }
    }

    /// Make `path` fail to open from now on.
    pub fn refuse(&self, path: &str) {
        self.lock().refused.insert(path.to_owned());
    }

    /// Let `path` open again.
    pub fn accept(&self, path: &str) {
        self.lock().refused.remove(path);
    }

    /// Queue a chunk that becomes readable.
    pub fn push_bytes(&self, bytes: &[u8]) {
        self.lock().reads.push_back(Ok(bytes.to_vec()));
    }

    /// Queue an I/O failure; it fires on the next poll or read.
    pub fn push_error(&self, kind: io::ErrorKind) {
        self.lock().reads.push_back(Err(kind));
    }

    /// Every successful open, in order.
    pub fn opened(&self) -> Vec<String> {
        self.lock().opened.clone()
    }

    /// Chunks not yet read.
    pub fn pending(&self) -> usize {
        self.lock().reads.len()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Connector for ScriptedConnector {
    fn candidates(&self) -> io::Result<Vec<String>> {
        Ok(self.lock().candidates.clone())
    }

    fn open(
        &self,
        path: &str,
        _baud_rate: u32,
        _timeout: Duration,
    ) -> io::Result<Box<dyn SerialHandle>> {
        let mut script = self.lock();
        if script.refused.contains(path) {
            return Err(io::Error::new(io::ErrorKind::NotFound, format!("{path} refused")));
        }
        script.opened.push(path.to_owned());
        Ok(Box::new(ScriptedHandle {
            script: Arc::clone(&self.script),
            name: path.to_owned(),
        }))
    }
}

struct ScriptedHandle {
    script: Arc<Mutex<Script>>,
    name: String,
}

impl ScriptedHandle {
    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SerialHandle for ScriptedHandle {
    fn bytes_available(&mut self) -> io::Result<usize> {
        let mut script = self.lock();
        match script.reads.front() {
            None => Ok(0),
            Some(Ok(bytes)) => Ok(bytes.len()),
            Some(Err(kind)) => {
                let kind = *kind;
                script.reads.pop_front();
                Err(io::Error::from(kind))
            }
        }
    }

    fn read_available(&mut self) -> io::Result<Vec<u8>> {
        let mut script = self.lock();
        match script.reads.pop_front() {
            None => Ok(Vec::new()),
            Some(Ok(bytes)) => {
                // Everything queued so far is "in the OS buffer" at once.
                let mut all = bytes;
                while let Some(Ok(next)) = script.reads.front() {
                    all.extend_from_slice(next);
                    script.reads.pop_front();
                }
                Ok(all)
            }
            Some(Err(kind)) => Err(io::Error::from(kind)),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

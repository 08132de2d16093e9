//! Purpose: Duplicate a single-consumption byte stream into a transmit branch and a log branch.
//! Exports: `tee`, `TeeReader`, `TeeTap`, `Captured`.
//! Role: Lets the transport log a streaming request body without consuming it.
//! Invariants: The transmit branch returns exactly the inner reader's bytes, never waits on the tap.
//! Invariants: The tap holds at most `budget` bytes regardless of how reads are chunked.
//! Invariants: A dropped tap only stops copying.
use std::io::{self, Read};
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Split `inner` into a reader that forwards every byte and a tap that sees up to `budget` of them.
pub fn tee<R: Read>(inner: R, budget: usize) -> (TeeReader<R>, TeeTap) {
    let shared = Arc::new(Mutex::new(Captured::default()));
    let reader = TeeReader {
        inner,
        tap: Arc::downgrade(&shared),
        remaining: budget,
    };
    (reader, TeeTap { shared })
}

pub struct TeeReader<R> {
    inner: R,
    tap: Weak<Mutex<Captured>>,
    remaining: usize,
}

impl<R> TeeReader<R> {
    fn offer(&mut self, chunk: &[u8]) {
        let Some(shared) = self.tap.upgrade() else {
            return;
        };
        let mut captured = shared.lock().unwrap_or_else(PoisonError::into_inner);
        if captured.truncated {
            return;
        }
        let take = chunk.len().min(self.remaining);
        captured.bytes.extend_from_slice(&chunk[..take]);
        self.remaining -= take;
        if take < chunk.len() {
            captured.truncated = true;
        }
    }
}

impl<R: Read> Read for TeeReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.inner.read(buf)?;
        if read > 0 {
            self.offer(&buf[..read]);
        }
        Ok(read)
    }
}

/// Log-side branch of a tee.
pub struct TeeTap {
    shared: Arc<Mutex<Captured>>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Captured {
    pub bytes: Vec<u8>,
    pub truncated: bool,
}

impl TeeTap {
    /// Take whatever the transmit branch has forwarded so far.
    pub fn drain(&self) -> Captured {
        let mut captured = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        Captured {
            bytes: std::mem::take(&mut captured.bytes),
            truncated: captured.truncated,
        }
    }
}

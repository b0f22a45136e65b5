//! Scripted in-memory transport for testing the session and handshake
//! without hardware.
//!
//! [`mock_pair`] returns reader/writer halves shaped like the real
//! `serialport` pair plus a [`MockHandle`] the test keeps: push device
//! replies in, inspect what the host wrote out, or make writes fail.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use super::transport::Transport;

/// How long the mock reader blocks before reporting a timeout, standing in
/// for the real transport's read timeout.
const MOCK_READ_TIMEOUT: Duration = Duration::from_millis(5);

#[derive(Default)]
struct Shared {
    incoming: Mutex<VecDeque<Vec<u8>>>,
    written: Mutex<Vec<u8>>,
    fail_writes: AtomicBool,
}

/// Test-side control handle for a mock transport pair.
#[derive(Clone)]
pub struct MockHandle {
    shared: Arc<Shared>,
}

impl MockHandle {
    /// Queues `text` as bytes the "device" sends to the host.
    pub fn push_reply(&self, text: &str) {
        lock(&self.shared.incoming).push_back(text.as_bytes().to_vec());
    }

    /// Everything the host has written so far, as text.
    pub fn written(&self) -> String {
        String::from_utf8_lossy(&lock(&self.shared.written)).into_owned()
    }

    /// Makes subsequent writes fail with a broken-pipe error.
    pub fn fail_writes(&self, fail: bool) {
        self.shared.fail_writes.store(fail, Ordering::Release);
    }
}

struct MockChannel {
    shared: Arc<Shared>,
}

impl Transport for MockChannel {
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let chunk = lock(&self.shared.incoming).pop_front();
        match chunk {
            Some(bytes) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    // Requeue the remainder so nothing is lost on a short read.
                    lock(&self.shared.incoming).push_front(bytes[n..].to_vec());
                }
                Ok(n)
            }
            None => {
                thread::sleep(MOCK_READ_TIMEOUT);
                Err(io::Error::new(io::ErrorKind::TimedOut, "mock read timeout"))
            }
        }
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        if self.shared.fail_writes.load(Ordering::Acquire) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock write failure"));
        }
        lock(&self.shared.written).extend_from_slice(data);
        Ok(())
    }
}

/// Builds a (reader, writer, handle) triple over one shared mock channel.
pub fn mock_pair() -> (Box<dyn Transport>, Box<dyn Transport>, MockHandle) {
    let shared = Arc::new(Shared::default());
    let reader = MockChannel {
        shared: Arc::clone(&shared),
    };
    let writer = MockChannel {
        shared: Arc::clone(&shared),
    };
    let handle = MockHandle { shared };
    (Box::new(reader), Box::new(writer), handle)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

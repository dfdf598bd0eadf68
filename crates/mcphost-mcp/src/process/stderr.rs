//! Server stderr capture.
//!
//! Stderr is diagnostics only and never parsed as protocol. Lines are read
//! byte-wise with lossy UTF-8 decoding so one bad byte cannot end the reader,
//! and the most recent lines are kept in a bounded ring for error reports.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::debug;

/// Lines kept per server.
pub const STDERR_CAPACITY: usize = 200;

/// Bounded, shareable buffer of recent stderr lines.
#[derive(Debug, Clone)]
pub struct StderrLog {
    lines: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl Default for StderrLog {
    fn default() -> Self {
        Self::new(STDERR_CAPACITY)
    }
}

impl StderrLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(64)))),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&self, line: String) {
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    /// The last `n` lines, oldest first.
    pub fn tail(&self, n: usize) -> Vec<String> {
        let lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        let skip = lines.len().saturating_sub(n);
        lines.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read `stream` line by line into `log` until EOF.
pub fn spawn_stderr_reader(
    server_id: String,
    stream: impl AsyncRead + Unpin + Send + 'static,
    log: StderrLog,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf: Vec<u8> = Vec::with_capacity(1024);

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    if buf.last() == Some(&b'\n') {
                        buf.pop();
                        if buf.last() == Some(&b'\r') {
                            buf.pop();
                        }
                    }
                    let line = String::from_utf8_lossy(&buf).into_owned();
                    debug!(target: "mcphost::server_stderr", server_id = %server_id, "{line}");
                    log.push(line);
                }
                Err(e) => {
                    debug!(server_id = %server_id, error = %e, "stderr reader exiting on read error");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_keeps_newest() {
        let log = StderrLog::new(3);
        for i in 0..5 {
            log.push(format!("line {i}"));
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.tail(2), vec!["line 3", "line 4"]);
        assert_eq!(log.tail(10).len(), 3);
    }

    #[tokio::test]
    async fn test_reader_splits_lines_lossily() {
        let input: &[u8] = b"first\r\nsec\xffond\nno newline";
        let log = StderrLog::default();
        spawn_stderr_reader("t".into(), input, log.clone())
            .await
            .unwrap();

        let lines = log.tail(10);
        assert_eq!(lines[0], "first");
        assert!(lines[1].starts_with("sec"));
        assert_eq!(lines[2], "no newline");
    }
}

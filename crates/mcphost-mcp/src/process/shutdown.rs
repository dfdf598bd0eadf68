//! Graceful child shutdown with SIGTERM -> SIGKILL escalation.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;

#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// Stop a child process and reap it.
///
/// 1. If it already exited, reap and return.
/// 2. Send SIGTERM and wait up to `grace`.
/// 3. Send SIGKILL and wait for reaping.
///
/// On non-Unix platforms the process is killed immediately.
pub async fn shutdown_child(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    if let Some(status) = child.try_wait()? {
        return Ok(status);
    }

    #[cfg(unix)]
    {
        if send_sigterm(child)? {
            if let Ok(result) = tokio::time::timeout(grace, child.wait()).await {
                return result;
            }
            tracing::debug!(pid = ?child.id(), grace_ms = grace.as_millis(), "Grace period elapsed, killing");
        } else {
            return child.wait().await;
        }
    }

    #[cfg(not(unix))]
    let _ = grace;

    child.kill().await?;
    child.wait().await
}

/// Returns false if the process was already gone.
#[cfg(unix)]
fn send_sigterm(child: &Child) -> io::Result<bool> {
    let Some(pid) = child.id() else {
        return Ok(false);
    };
    let pid = i32::try_from(pid).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    match signal::kill(Pid::from_raw(pid), Signal::SIGTERM) {
        Ok(()) => Ok(true),
        Err(nix::errno::Errno::ESRCH) => Ok(false),
        Err(e) => Err(io::Error::other(e)),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Stdio;
    use tokio::process::Command;

    #[tokio::test]
    async fn test_sigterm_is_enough_for_sleep() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let started = std::time::Instant::now();
        let status = shutdown_child(&mut child, Duration::from_secs(5)).await.unwrap();
        assert!(!status.success());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_escalates_when_sigterm_is_ignored() {
        let mut child = Command::new("sh")
            .args(["-c", "trap '' TERM; echo ready; sleep 30"])
            .stdout(Stdio::piped())
            .spawn()
            .unwrap();

        // Wait until the trap is installed.
        let mut stdout = child.stdout.take().unwrap();
        let mut buf = [0u8; 8];
        let _ = tokio::io::AsyncReadExt::read(&mut stdout, &mut buf).await;

        let status = shutdown_child(&mut child, Duration::from_millis(200))
            .await
            .unwrap();
        assert!(!status.success());
    }

    #[tokio::test]
    async fn test_already_exited() {
        let mut child = Command::new("true").spawn().unwrap();
        child.wait().await.unwrap();
        let status = shutdown_child(&mut child, Duration::from_secs(1)).await.unwrap();
        assert!(status.success());
    }
}

// Copyright (c) 2026 Rigwatch Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Hook Executor - runs one advice hook command under a bounded timeout
//!
//! Commands are interpreted by `sh -c`, inherit the host environment plus
//! per-call overrides, and are killed when they time out or the caller
//! cancels. Knows nothing about advice records or matching.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::hook::{effective_timeout, HookError, HookResult};

/// Runs a single hook command to completion, timeout, or cancellation.
#[async_trait]
pub trait HookExecutor: Send + Sync {
    async fn execute(
        &self,
        cancel: &CancellationToken,
        command: &str,
        timeout_seconds: i64,
        working_dir: Option<&str>,
        env: &HashMap<String, String>,
    ) -> HookResult;
}

/// [`HookExecutor`] backed by `tokio::process` and a POSIX shell.
#[derive(Debug, Clone)]
pub struct ShellHookExecutor {
    shell: String,
}

impl ShellHookExecutor {
    pub fn new() -> Self {
        Self {
            shell: "sh".to_string(),
        }
    }

    /// Use a different shell binary (must accept `-c <command>`).
    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl Default for ShellHookExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Trimmed stdout, falling back to trimmed stderr.
fn capture_output(stdout: &[u8], stderr: &[u8]) -> String {
    let out = String::from_utf8_lossy(stdout);
    let out = out.trim();
    if !out.is_empty() {
        return out.to_string();
    }
    String::from_utf8_lossy(stderr).trim().to_string()
}

/// Bytes read from one child pipe so far, filled by a background task.
///
/// Reading incrementally keeps whatever a hook printed before it was killed.
struct PipeCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
    reader: JoinHandle<()>,
}

impl PipeCapture {
    fn spawn<R>(pipe: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = buffer.clone();
        let reader = tokio::spawn(async move {
            let Some(mut pipe) = pipe else {
                return;
            };
            let mut chunk = [0u8; 4096];
            loop {
                match pipe.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => sink.lock().extend_from_slice(&chunk[..n]),
                }
            }
        });
        Self { buffer, reader }
    }

    /// Wait until the pipe reaches end of file.
    async fn finish(&mut self) {
        let _ = (&mut self.reader).await;
    }

    /// Stop reading and return everything captured.
    fn take(self) -> Vec<u8> {
        self.reader.abort();
        let mut buffer = self.buffer.lock();
        std::mem::take(&mut *buffer)
    }
}

#[async_trait]
impl HookExecutor for ShellHookExecutor {
    async fn execute(
        &self,
        cancel: &CancellationToken,
        command: &str,
        timeout_seconds: i64,
        working_dir: Option<&str>,
        env: &HashMap<String, String>,
    ) -> HookResult {
        let timeout = effective_timeout(timeout_seconds);
        let deadline = time::Instant::now() + timeout;

        let mut cmd = tokio::process::Command::new(&self.shell);
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        for (key, value) in env {
            cmd.env(key, value);
        }

        // Nonexistent directories fall back to the process default.
        if let Some(dir) = working_dir.filter(|d| !d.is_empty()) {
            if Path::new(dir).is_dir() {
                cmd.current_dir(dir);
            } else {
                debug!(working_dir = %dir, "Hook working directory missing, using default");
            }
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => return HookResult::failure(String::new(), HookError::Spawn(e.to_string())),
        };
        let mut stdout = PipeCapture::spawn(child.stdout.take());
        let mut stderr = PipeCapture::spawn(child.stderr.take());

        let waited = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(HookError::Cancelled),
            _ = time::sleep_until(deadline) => Err(HookError::TimedOut(timeout)),
            status = child.wait() => status.map_err(|e| HookError::Spawn(e.to_string())),
        };

        match &waited {
            Ok(_) => {
                // Background jobs started by the hook can hold the pipes open.
                let _ = time::timeout_at(deadline, async {
                    stdout.finish().await;
                    stderr.finish().await;
                })
                .await;
            }
            Err(_) => {
                if let Err(e) = child.kill().await {
                    debug!(error = %e, "Failed to kill hook command");
                }
            }
        }

        let captured = capture_output(&stdout.take(), &stderr.take());
        match waited {
            Ok(status) if status.success() => HookResult::success(captured),
            Ok(status) => HookResult::failure(
                captured,
                HookError::Exit {
                    status: status.to_string(),
                    code: status.code(),
                },
            ),
            Err(error) => HookResult::failure(captured, error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    async fn run(
        command: &str,
        timeout: i64,
        dir: Option<&str>,
        env: &[(&str, &str)],
    ) -> HookResult {
        let env = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        ShellHookExecutor::new()
            .execute(&CancellationToken::new(), command, timeout, dir, &env)
            .await
    }

    #[tokio::test]
    async fn test_captures_trimmed_stdout() {
        let result = run("echo '  hello  '", 5, None, &[]).await;
        assert!(result.is_success());
        assert_eq!(result.output, "hello");
    }

    #[tokio::test]
    async fn test_falls_back_to_stderr() {
        let result = run("echo oops >&2; exit 3", 5, None, &[]).await;
        assert_eq!(result.output, "oops");
        match result.error {
            Some(HookError::Exit { code, .. }) => assert_eq!(code, Some(3)),
            other => panic!("Expected exit error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_env_overrides_are_visible() {
        let result = run(
            "printf '%s' \"$AGENT_ID\"",
            5,
            None,
            &[("AGENT_ID", "gastown/polecats/nux")],
        )
        .await;
        assert_eq!(result.output, "gastown/polecats/nux");
    }

    #[tokio::test]
    async fn test_inherits_process_environment() {
        let result = run("printf '%s' \"$PATH\"", 5, None, &[]).await;
        assert!(!result.output.is_empty());
    }

    #[tokio::test]
    async fn test_runs_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "here").unwrap();
        let result = run("cat marker.txt", 5, dir.path().to_str(), &[]).await;
        assert_eq!(result.output, "here");
    }

    #[tokio::test]
    async fn test_missing_working_directory_is_ignored() {
        let result = run("echo ok", 5, Some("/definitely/not/a/real/dir"), &[]).await;
        assert!(result.is_success());
        assert_eq!(result.output, "ok");
    }

    #[tokio::test]
    async fn test_timeout_kills_command() {
        let started = Instant::now();
        let result = run("sleep 10", 1, None, &[]).await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(result.error, Some(HookError::TimedOut(Duration::from_secs(1))));
    }

    #[tokio::test]
    async fn test_timed_out_hook_keeps_partial_output() {
        let started = Instant::now();
        let result = run("echo partial-progress; sleep 10", 1, None, &[]).await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(result.output, "partial-progress");
        assert_eq!(result.error, Some(HookError::TimedOut(Duration::from_secs(1))));
    }

    #[tokio::test]
    async fn test_cancelled_hook_keeps_partial_output() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            trigger.cancel();
        });

        let result = ShellHookExecutor::new()
            .execute(&cancel, "echo 'half done' >&2; sleep 10", 30, None, &HashMap::new())
            .await;
        assert_eq!(result.output, "half done");
        assert_eq!(result.error, Some(HookError::Cancelled));
    }

    #[tokio::test]
    async fn test_cancellation_aborts_command() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let result = ShellHookExecutor::new()
            .execute(&cancel, "sleep 10", 30, None, &HashMap::new())
            .await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(result.error, Some(HookError::Cancelled));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported() {
        let executor = ShellHookExecutor::with_shell("/nonexistent/shell");
        let result = executor
            .execute(&CancellationToken::new(), "true", 5, None, &HashMap::new())
            .await;
        assert!(matches!(result.error, Some(HookError::Spawn(_))));
    }
}

//! Process supervision shared by the execution coordinator.
//!
//! The child runs in its own process group so a timeout can take down anything it spawned.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Child;
use tokio::task::JoinHandle;

use skillgraph_core::{Error, Result};

/// File-name prefix for scratch programs and scratch variable files.
pub const SCRATCH_PREFIX: &str = "exec_";

/// Scratch program suffix; the runner decides how to execute by extension.
pub const PROGRAM_SUFFIX: &str = ".py";

/// How long to keep draining pipes after the child exits. A grandchild that inherited
/// the pipes and escaped the group kill would otherwise hold the read open indefinitely.
pub const PIPE_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Raw captured output, before sanitization.
#[derive(Debug, Default)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

#[derive(Debug)]
pub enum WaitOutcome {
    Exited(ProcessOutput),
    TimedOut,
}

type Capture = Arc<Mutex<Vec<u8>>>;

const READ_CHUNK: usize = 8192;

struct PipeReader {
    handle: JoinHandle<()>,
    captured: Capture,
}

fn spawn_reader<R>(pipe: Option<R>) -> Option<PipeReader>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    pipe.map(|mut out| {
        let captured: Capture = Arc::default();
        let sink = captured.clone();
        let handle = tokio::spawn(async move {
            let mut chunk = vec![0u8; READ_CHUNK];
            loop {
                match out.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        lock(&sink).extend_from_slice(&chunk[..n]);
                    }
                }
            }
        });
        PipeReader { handle, captured }
    })
}

fn lock(capture: &Capture) -> MutexGuard<'_, Vec<u8>> {
    capture.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Whatever the reader collected, even if the pipe never reached EOF within the grace period.
async fn drain(reader: Option<PipeReader>) -> String {
    let Some(PipeReader { mut handle, captured }) = reader else {
        return String::new();
    };
    if tokio::time::timeout(PIPE_DRAIN_GRACE, &mut handle).await.is_err() {
        handle.abort();
        tracing::warn!("output pipe still open after exit, keeping partial capture");
    }
    let text = String::from_utf8_lossy(&lock(&captured)).into_owned();
    text
}

fn abort_reader(reader: Option<PipeReader>) {
    if let Some(r) = reader {
        r.handle.abort();
    }
}

/// Wait for `child` to exit or for `timeout` to elapse, whichever comes first.
///
/// stdout/stderr are read by background tasks *while* the process runs; a child writing
/// more than the pipe buffer would otherwise block and never exit. When the child exits on
/// its own, whatever is left in its process group is killed so background grandchildren
/// neither outlive the run nor hold the pipes open. On timeout the whole group is killed
/// and reaped before returning.
pub async fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<WaitOutcome> {
    // id() is None once the child has been reaped.
    let pid = child.id();
    let stdout_reader = spawn_reader(child.stdout.take());
    let stderr_reader = spawn_reader(child.stderr.take());

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => {
            kill_group(pid);
            let stdout = drain(stdout_reader).await;
            let stderr = drain(stderr_reader).await;
            Ok(WaitOutcome::Exited(ProcessOutput {
                stdout,
                stderr,
                exit_code: status.code().unwrap_or(-1),
            }))
        }
        Ok(Err(e)) => {
            kill_process_tree(child).await;
            abort_reader(stdout_reader);
            abort_reader(stderr_reader);
            Err(Error::ExecutionFailed(format!("failed to wait for runner process: {}", e)))
        }
        Err(_) => {
            kill_process_tree(child).await;
            abort_reader(stdout_reader);
            abort_reader(stderr_reader);
            Ok(WaitOutcome::TimedOut)
        }
    }
}

/// SIGKILL the process group led by `pid`. An empty group is not an error.
fn kill_group(pid: Option<u32>) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;
        if let Some(pid) = pid {
            if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
                tracing::debug!(pid, error = %e, "killpg found nothing to kill");
            }
        }
    }
    #[cfg(not(unix))]
    let _ = pid;
}

/// SIGKILL the child's process group, then kill and reap the child itself.
pub async fn kill_process_tree(child: &mut Child) {
    kill_group(child.id());
    // Already-exited children make kill() fail; wait() below still reaps them.
    let _ = child.start_kill();
    if let Err(e) = child.wait().await {
        tracing::warn!(error = %e, "failed to reap runner process");
    }
}

//! Supervisor Process
//!
//! Runs each timed batch in a fresh `hbsbench measure` worker and collects
//! the typed outcome the worker sends over an inherited pipe. Reads block
//! until the worker reports or closes the pipe; there are no timeouts.

use hbsbench_core::available_cpus;
use hbsbench_ipc::{
    FailureKind, FrameError, FrameReader, IPC_FD_ENV, PROTOCOL_VERSION, WORKER_MESSAGE_FD,
    WorkerMessage,
};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use std::os::unix::io::{FromRawFd, RawFd};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use thiserror::Error;

/// Errors raised while running isolated workers
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The worker process could not be started
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(#[from] std::io::Error),

    /// The message pipe failed or carried a bad frame
    #[error("IPC error: {0}")]
    IpcError(String),

    /// The worker went away without reporting an outcome
    #[error("Worker crashed: {0}")]
    WorkerCrashed(String),

    /// The worker sent an unexpected message
    #[error("Worker protocol error: expected {expected}, got {got}")]
    ProtocolError {
        /// What the supervisor waited for
        expected: String,
        /// What arrived instead
        got: String,
    },

    /// The bounded worker pool could not be built
    #[error("Failed to build worker pool: {0}")]
    Pool(String),
}

impl From<FrameError> for SupervisorError {
    fn from(e: FrameError) -> Self {
        SupervisorError::IpcError(e.to_string())
    }
}

/// One isolated timed batch
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerJob {
    /// Compiler label
    pub label: String,
    /// Zero-based repetition index
    pub repetition: usize,
    /// File the worker writes its elapsed milliseconds to
    pub output: PathBuf,
}

/// What a worker reported
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerOutcome {
    /// The batch was timed and the result file written
    Completed {
        /// Elapsed milliseconds
        elapsed_ms: f64,
        /// Templates compiled
        templates: u64,
    },
    /// The worker ran but could not produce a sample
    Failed {
        /// Failure category
        kind: FailureKind,
        /// Worker-provided message
        message: String,
    },
}

/// Create a pipe pair with close-on-exec set, returning (read_fd, write_fd).
fn create_pipe() -> Result<(RawFd, RawFd), std::io::Error> {
    let mut fds = [0 as RawFd; 2];

    #[cfg(target_os = "linux")]
    let ret = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) };

    #[cfg(not(target_os = "linux"))]
    let ret = unsafe {
        let ret = libc::pipe(fds.as_mut_ptr());
        if ret == 0 {
            for &fd in &fds {
                let flags = libc::fcntl(fd, libc::F_GETFD);
                libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC);
            }
        }
        ret
    };

    if ret != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok((fds[0], fds[1]))
}

/// Close a raw file descriptor.
fn close_fd(fd: RawFd) {
    unsafe {
        libc::close(fd);
    }
}

/// `binary measure <label> <output> [--cpu N] [--verbose]`
fn worker_command(binary: &Path, job: &WorkerJob, cpu: Option<usize>, verbose: bool) -> Command {
    let mut command = Command::new(binary);
    command
        .arg("measure")
        .arg(&job.label)
        .arg(&job.output)
        .env(IPC_FD_ENV, WORKER_MESSAGE_FD.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::inherit());
    if let Some(cpu) = cpu {
        command.arg("--cpu").arg(cpu.to_string());
    }
    if verbose {
        command.arg("--verbose");
    }
    command
}

/// CPU for pool slot `slot`; slots below `cpus.len()` never share a core
fn slot_cpu(cpus: &[usize], slot: usize) -> Option<usize> {
    if cpus.is_empty() {
        return None;
    }
    cpus.get(slot % cpus.len()).copied()
}

/// Worker process handle
pub struct WorkerHandle {
    child: Child,
    reader: FrameReader<std::fs::File>,
}

impl WorkerHandle {
    /// Spawn the worker for `job` with the message pipe on fd 3, pinned to
    /// `cpu` when given
    pub fn spawn(
        binary: &Path,
        job: &WorkerJob,
        cpu: Option<usize>,
        verbose: bool,
    ) -> Result<Self, SupervisorError> {
        let (msg_read, msg_write) = create_pipe()?;

        let mut command = worker_command(binary, job, cpu, verbose);

        // In the child: move msg_write to fd 3 and keep it across exec.
        unsafe {
            command.pre_exec(move || {
                let target = WORKER_MESSAGE_FD;
                if msg_write != target {
                    if libc::dup2(msg_write, target) == -1 {
                        return Err(std::io::Error::last_os_error());
                    }
                    libc::close(msg_write);
                }
                let flags = libc::fcntl(target, libc::F_GETFD);
                libc::fcntl(target, libc::F_SETFD, flags & !libc::FD_CLOEXEC);
                Ok(())
            });
        }

        let child = match command.spawn() {
            Ok(c) => c,
            Err(e) => {
                close_fd(msg_read);
                close_fd(msg_write);
                return Err(SupervisorError::SpawnFailed(e));
            }
        };

        // Only the child may hold the write end, or EOF never arrives
        close_fd(msg_write);

        let reader_file = unsafe { std::fs::File::from_raw_fd(msg_read) };

        let mut handle = Self {
            child,
            reader: FrameReader::new(reader_file),
        };

        handle.wait_for_hello()?;
        Ok(handle)
    }

    /// Wait for Hello message from worker and validate protocol version
    fn wait_for_hello(&mut self) -> Result<(), SupervisorError> {
        let msg: WorkerMessage = match self.reader.read() {
            Ok(msg) => msg,
            Err(FrameError::EndOfStream) => {
                return Err(self.crashed("worker exited before handshake"));
            }
            Err(e) => return Err(e.into()),
        };

        match msg {
            WorkerMessage::Hello(caps) => {
                if caps.protocol_version != PROTOCOL_VERSION {
                    return Err(SupervisorError::ProtocolError {
                        expected: format!("protocol version {}", PROTOCOL_VERSION),
                        got: format!("protocol version {}", caps.protocol_version),
                    });
                }
                tracing::debug!(pid = caps.pid, cpu = %caps.cpu_model, "worker ready");
                Ok(())
            }
            other => Err(SupervisorError::ProtocolError {
                expected: "Hello".to_string(),
                got: format!("{:?}", other),
            }),
        }
    }

    /// Block until the worker reports its outcome, then reap it
    pub fn await_outcome(mut self) -> Result<WorkerOutcome, SupervisorError> {
        let msg: WorkerMessage = match self.reader.read() {
            Ok(msg) => msg,
            Err(FrameError::EndOfStream) => {
                return Err(self.crashed("worker closed the pipe without a result"));
            }
            Err(e) => return Err(e.into()),
        };

        let outcome = match msg {
            WorkerMessage::Complete {
                elapsed_ms,
                templates,
                ..
            } => WorkerOutcome::Completed {
                elapsed_ms,
                templates,
            },
            WorkerMessage::Failure { kind, message } => WorkerOutcome::Failed { kind, message },
            WorkerMessage::Hello(_) => {
                return Err(SupervisorError::ProtocolError {
                    expected: "Complete/Failure".to_string(),
                    got: "Hello".to_string(),
                });
            }
        };

        match self.child.wait() {
            Ok(status) if !status.success() => {
                tracing::debug!(%status, "worker exited with non-zero status");
            }
            Ok(_) => {}
            Err(e) => tracing::debug!("failed to reap worker: {}", e),
        }
        Ok(outcome)
    }

    /// Reap the child and describe how it went away
    fn crashed(&mut self, context: &str) -> SupervisorError {
        match self.child.wait() {
            Ok(status) => SupervisorError::WorkerCrashed(format!("{} ({})", context, status)),
            Err(_) => SupervisorError::WorkerCrashed(context.to_string()),
        }
    }

    /// Check if worker process is still running
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if self.is_alive() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Supervisor that runs isolated jobs on a bounded pool of workers
pub struct Supervisor {
    binary: PathBuf,
    jobs: usize,
    verbose: bool,
    cpus: Vec<usize>,
}

impl Supervisor {
    /// Supervisor re-executing the current binary
    pub fn new(jobs: usize) -> Result<Self, SupervisorError> {
        let binary = std::env::current_exe().map_err(SupervisorError::SpawnFailed)?;
        Ok(Self::with_binary(binary, jobs))
    }

    /// Supervisor for a specific worker binary
    pub fn with_binary(binary: impl Into<PathBuf>, jobs: usize) -> Self {
        Self {
            binary: binary.into(),
            jobs: jobs.max(1),
            verbose: false,
            cpus: available_cpus(),
        }
    }

    /// Forward `--verbose` to workers
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Run every job, at most `jobs` at a time.
    ///
    /// Results come back in job order. `on_done` is called as each job
    /// finishes, from the pool thread that ran it. Each pool thread owns one
    /// CPU, so concurrent workers are pinned to distinct cores as long as
    /// `jobs` does not exceed the available CPUs.
    pub fn run_all<F>(
        &self,
        jobs: &[WorkerJob],
        on_done: F,
    ) -> Result<Vec<Result<WorkerOutcome, SupervisorError>>, SupervisorError>
    where
        F: Fn(&WorkerJob, &Result<WorkerOutcome, SupervisorError>) + Sync,
    {
        if jobs.is_empty() {
            return Ok(Vec::new());
        }

        let run = |job: &WorkerJob, slot: usize| {
            let result = self.run_in_slot(job, slot);
            on_done(job, &result);
            result
        };

        if self.jobs == 1 || jobs.len() == 1 {
            return Ok(jobs.iter().map(|job| run(job, 0)).collect());
        }

        let worker_count = self.jobs.min(jobs.len());
        if worker_count > self.cpus.len() {
            tracing::warn!(
                jobs = worker_count,
                cpus = self.cpus.len(),
                "more concurrent workers than CPUs; some workers will share a core"
            );
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(worker_count)
            .build()
            .map_err(|e| SupervisorError::Pool(e.to_string()))?;

        // Pool thread indices are 0..worker_count, one slot per thread
        Ok(pool.install(|| {
            jobs.par_iter()
                .map(|job| run(job, rayon::current_thread_index().unwrap_or(0)))
                .collect()
        }))
    }

    /// Run a single job in a fresh worker process
    pub fn run_isolated(&self, job: &WorkerJob) -> Result<WorkerOutcome, SupervisorError> {
        self.run_in_slot(job, 0)
    }

    fn run_in_slot(&self, job: &WorkerJob, slot: usize) -> Result<WorkerOutcome, SupervisorError> {
        let cpu = slot_cpu(&self.cpus, slot);
        tracing::debug!(label = %job.label, repetition = job.repetition, ?cpu, "spawning worker");
        WorkerHandle::spawn(&self.binary, job, cpu, self.verbose)?.await_outcome()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> WorkerJob {
        WorkerJob {
            label: "handlebars-6".to_string(),
            repetition: 0,
            output: PathBuf::from("/tmp/unused.txt"),
        }
    }

    #[test]
    fn test_jobs_at_least_one() {
        let supervisor = Supervisor::with_binary("/bin/true", 0);
        assert_eq!(supervisor.jobs, 1);
    }

    #[test]
    fn test_missing_binary_is_spawn_failure() {
        let supervisor = Supervisor::with_binary("/nonexistent/hbsbench", 1);
        let err = supervisor.run_isolated(&job()).unwrap_err();
        assert!(matches!(err, SupervisorError::SpawnFailed(_)));
    }

    #[test]
    fn test_worker_without_handshake_is_crash() {
        // `true` ignores its arguments and exits without writing to fd 3
        let supervisor = Supervisor::with_binary("true", 1);
        let err = supervisor.run_isolated(&job()).unwrap_err();
        assert!(matches!(err, SupervisorError::WorkerCrashed(_)));
    }

    #[test]
    fn test_failures_do_not_stop_other_jobs() {
        let supervisor = Supervisor::with_binary("true", 2);
        let jobs: Vec<WorkerJob> = (0..3)
            .map(|repetition| WorkerJob {
                repetition,
                ..job()
            })
            .collect();

        let done = std::sync::atomic::AtomicUsize::new(0);
        let results = supervisor
            .run_all(&jobs, |_, _| {
                done.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            })
            .unwrap();

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.is_err()));
        assert_eq!(done.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[test]
    fn test_concurrent_slots_get_distinct_cpus() {
        let cpus = vec![0, 2, 4, 6];
        let assigned: Vec<usize> = (0..cpus.len())
            .map(|slot| slot_cpu(&cpus, slot).unwrap())
            .collect();
        assert_eq!(assigned, cpus);

        // Wraps once slots outnumber CPUs
        assert_eq!(slot_cpu(&cpus, 5), Some(2));
        assert_eq!(slot_cpu(&[], 0), None);
    }

    #[test]
    fn test_pool_threads_map_to_distinct_cpus() {
        let cpus = vec![1, 3, 5];
        let pool = ThreadPoolBuilder::new()
            .num_threads(cpus.len())
            .build()
            .unwrap();

        let mut seen: Vec<usize> = pool.broadcast(|_| {
            slot_cpu(&cpus, rayon::current_thread_index().unwrap()).unwrap()
        });
        seen.sort_unstable();
        assert_eq!(seen, cpus);
    }

    #[test]
    fn test_worker_command_passes_cpu() {
        let command = worker_command(Path::new("hbsbench"), &job(), Some(3), true);
        let args: Vec<_> = command.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec!["measure", "handlebars-6", "/tmp/unused.txt", "--cpu", "3", "--verbose"]
        );

        let unpinned = worker_command(Path::new("hbsbench"), &job(), None, false);
        assert!(!unpinned.get_args().any(|a| a == "--cpu"));
    }

    #[test]
    fn test_pipe_is_close_on_exec() {
        let (read, write) = create_pipe().unwrap();
        for fd in [read, write] {
            let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
            assert!(flags & libc::FD_CLOEXEC != 0);
            close_fd(fd);
        }
    }
}

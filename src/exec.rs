//! External command execution.
//!
//! Provides a Builder-based API for the two process shapes the pipeline
//! needs: a build command run to completion, and the long-lived render
//! server. Both have their stdout/stderr drained line-by-line and forwarded
//! to the logger; an undrained pipe would stall the child once its buffer
//! fills.
//!
//! # Examples
//!
//! ```ignore
//! use crate::exec::Cmd;
//!
//! // Run the SSR build to completion (non-zero exit is an error)
//! Cmd::from_slice(&["npm", "start", "webpack.server.ssr.build"])
//!     .cwd(root)
//!     .run("build")
//!     .await?;
//!
//! // Start the render server and stop it later
//! let mut server = Cmd::from_slice(&["node", "server.js"])
//!     .cwd(root)
//!     .spawn("server")?;
//! server.terminate().await?;
//! ```

use crate::log;
use anyhow::{Context, Result, bail};
use std::{
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::{Child, Command},
    task::JoinHandle,
};

// ============================================================================
// Builder API
// ============================================================================

/// Command builder for external process execution.
#[derive(Default)]
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    envs: Vec<(String, String)>,
}

impl Cmd {
    /// Create a new command builder.
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            ..Default::default()
        }
    }

    /// Create from a command array (e.g., `["node", "server.js"]`).
    pub fn from_slice<S: AsRef<OsStr>>(cmd: &[S]) -> Self {
        let mut iter = cmd.iter();
        let program = iter
            .next()
            .map(|s| s.as_ref().to_owned())
            .unwrap_or_default();
        let args: Vec<_> = iter.map(|s| s.as_ref().to_owned()).collect();
        Self {
            program,
            args,
            ..Default::default()
        }
    }

    /// Add a single argument.
    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        let arg = arg.as_ref();
        if !arg.is_empty() {
            self.args.push(arg.to_owned());
        }
        self
    }

    /// Set working directory.
    pub fn cwd<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.cwd = Some(dir.as_ref().to_owned());
        self
    }

    /// Set environment variables for the subprocess.
    pub fn envs<K, V, I>(mut self, vars: I) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (k, v) in vars {
            self.envs
                .push((k.as_ref().to_owned(), v.as_ref().to_owned()));
        }
        self
    }

    /// Get the program name for error messages.
    fn program_name(&self) -> String {
        self.program.to_string_lossy().to_string()
    }

    /// Assemble the tokio command with piped output.
    fn command(&self) -> Result<Command> {
        if self.program.is_empty() {
            bail!("empty command");
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.envs.iter().cloned())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }

        Ok(cmd)
    }

    /// Run the command to completion, forwarding output under `label`.
    ///
    /// Resolves only on exit code 0; any other exit code, or a failure to
    /// start, is an error that the caller treats as fatal.
    pub async fn run(self, label: &str) -> Result<()> {
        let name = self.program_name();
        let mut child = self
            .command()?
            .spawn()
            .with_context(|| format!("Failed to spawn `{name}`"))?;

        let io = forward_output(label, &mut child);

        let status = child
            .wait()
            .await
            .with_context(|| format!("Failed to wait for `{name}`"))?;
        drain(io).await;

        if !status.success() {
            bail!("Command `{name}` failed with {status}");
        }
        Ok(())
    }

    /// Start the command as a long-lived process, forwarding output under
    /// `label` for the process's lifetime.
    ///
    /// The returned handle never resolves on its own; it is either observed
    /// exiting via [`ServerProcess::wait_exit`] or stopped via
    /// [`ServerProcess::terminate`].
    pub fn spawn(self, label: &str) -> Result<ServerProcess> {
        let name = self.program_name();
        let mut cmd = self.command()?;
        // The child must not outlive the orchestrator, even on panic.
        cmd.kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn `{name}`"))?;

        let io = forward_output(label, &mut child);

        Ok(ServerProcess { name, child, io })
    }
}

// ============================================================================
// Long-lived process handle
// ============================================================================

/// An owned long-lived child process with its output forwarding tasks.
pub struct ServerProcess {
    name: String,
    child: Child,
    io: (JoinHandle<()>, JoinHandle<()>),
}

impl ServerProcess {
    /// OS process id, if the process is still running.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait for the process to exit on its own.
    ///
    /// Used to notice a server that dies before ever becoming reachable.
    pub async fn wait_exit(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Send the kill signal, reap the process and drain its output.
    pub async fn terminate(mut self) -> Result<()> {
        // Already-exited children make start_kill fail; the wait below
        // still reaps them.
        let _ = self.child.start_kill();
        self.child
            .wait()
            .await
            .with_context(|| format!("Failed to reap `{}`", self.name))?;
        drain(self.io).await;
        Ok(())
    }
}

// ============================================================================
// Output forwarding
// ============================================================================

/// Spawn line-forwarding tasks for the child's stdout and stderr.
///
/// Each stream becomes a lazy sequence of lines consumed by the logger, so
/// the caller sees child output in real time without owning the pipes.
fn forward_output(label: &str, child: &mut Child) -> (JoinHandle<()>, JoinHandle<()>) {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    (
        spawn_line_reader(label.to_owned(), stdout),
        spawn_line_reader(label.to_owned(), stderr),
    )
}

fn spawn_line_reader<R>(label: String, stream: Option<R>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(stream) = stream else { return };
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if !line.trim().is_empty() {
                log!(&label; "{line}");
            }
        }
    })
}

/// Wait for both forwarding tasks so no output line is lost.
async fn drain(io: (JoinHandle<()>, JoinHandle<()>)) {
    let _ = io.0.await;
    let _ = io.1.await;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cmd_builder() {
        let cmd = Cmd::new("echo").arg("hello").arg("world").cwd("/tmp");

        assert_eq!(cmd.program, OsString::from("echo"));
        assert_eq!(cmd.args.len(), 2);
        assert_eq!(cmd.cwd, Some(PathBuf::from("/tmp")));
    }

    #[test]
    fn test_from_slice() {
        let cmd = Cmd::from_slice(&["npm", "start", "build"]);
        assert_eq!(cmd.program, OsString::from("npm"));
        assert_eq!(cmd.args.len(), 2);
    }

    #[test]
    fn test_empty_args_filtered() {
        let cmd = Cmd::new("echo").arg("").arg("a");
        assert_eq!(cmd.args.len(), 1);
    }

    #[test]
    fn test_empty_command_rejected() {
        let cmd = Cmd::from_slice::<&str>(&[]);
        assert!(cmd.command().is_err());
    }

    #[tokio::test]
    async fn test_run_success() {
        Cmd::new("echo").arg("hello").run("test").await.unwrap();
    }

    #[tokio::test]
    async fn test_run_nonzero_exit_fails() {
        let err = Cmd::new("sh")
            .arg("-c")
            .arg("exit 3")
            .run("test")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed with"));
    }

    #[tokio::test]
    async fn test_run_missing_program_fails() {
        let err = Cmd::new("definitely-not-a-real-program-xyz")
            .run("test")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to spawn"));
    }

    #[tokio::test]
    async fn test_spawn_and_terminate() {
        let server = Cmd::new("sleep").arg("30").spawn("test").unwrap();
        assert!(server.id().is_some());
        server.terminate().await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_exit_observes_early_death() {
        let mut server = Cmd::new("sh")
            .arg("-c")
            .arg("exit 7")
            .spawn("test")
            .unwrap();
        let status = server.wait_exit().await.unwrap();
        assert_eq!(status.code(), Some(7));
        // terminate after exit is still fine (reaps nothing new)
        server.terminate().await.unwrap();
    }
}

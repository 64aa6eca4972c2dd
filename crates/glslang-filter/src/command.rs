//! Starting `glslangValidator` with its stdout and stderr merged into one pipe.

use std::{
    env::consts::EXE_SUFFIX,
    ffi::{OsStr, OsString},
    fmt, io,
    path::{Path, PathBuf},
    process::{Child, Command, ExitStatus, Stdio},
};

/// File name of the wrapped compiler, without the platform executable suffix.
pub const VALIDATOR_NAME: &str = "glslangValidator";

/// A program together with the arguments to start it with.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Invocation {
    /// Path to the program.
    pub program: PathBuf,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
}

impl Invocation {
    /// Creates an invocation of `program` with `args`.
    #[inline]
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, args: Vec<OsString>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Creates an invocation of the executable `name` located in `dir`.
    ///
    /// The platform executable suffix is appended when `name` has no extension.
    #[inline]
    #[must_use]
    pub fn in_dir(dir: &Path, name: impl AsRef<OsStr>, args: Vec<OsString>) -> Self {
        let name = name.as_ref();
        let mut file_name = name.to_os_string();
        if Path::new(name).extension().is_none() {
            file_name.push(EXE_SUFFIX);
        }
        Self::new(dir.join(file_name), args)
    }

    /// Starts the program.
    ///
    /// Stdin of the child is null. Its stdout and stderr both go into the write end of one
    /// pipe, whose read end is owned by the returned [`RunningChild`].
    ///
    /// # Errors
    ///
    /// Returns an error if the pipe cannot be created or the program cannot be started,
    /// e.g. because it does not exist.
    #[inline]
    pub fn spawn(&self) -> Result<RunningChild, SpawnError> {
        let (reader, writer) = io::pipe().map_err(SpawnError::Pipe)?;
        let stderr_writer = writer.try_clone().map_err(SpawnError::Pipe)?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(writer)
            .stderr(stderr_writer);
        log::debug!("spawning {self}");
        let child = command
            .spawn()
            .map_err(|source| SpawnError::spawn(self, source))?;
        // the command holds our copies of the write end; the reader only
        // sees end of stream once they are closed
        drop(command);

        Ok(RunningChild {
            output: Some(reader),
            child,
            program: self.program.clone(),
            reaped: false,
        })
    }
}

impl fmt::Display for Invocation {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.display())?;
        }
        write!(f, "`")
    }
}

/// A started child process and the read end of its merged output.
///
/// Reading from it yields the child's stdout and stderr interleaved in the order they were
/// written. The child is always reaped: either by [`RunningChild::finish`] or, if that is never
/// reached, on drop, which closes the pipe and kills the child if it is still running.
#[derive(Debug)]
pub struct RunningChild {
    /// Read end of the merged output pipe, `None` once closed.
    output: Option<io::PipeReader>,
    /// The child process.
    child: Child,
    /// Program the child was started from, for error reporting.
    program: PathBuf,
    /// Whether the child has been waited for.
    reaped: bool,
}

impl RunningChild {
    /// Returns the OS-assigned process identifier of the child.
    #[inline]
    #[must_use]
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Closes the output pipe and waits for the child to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting for the child fails.
    #[inline]
    pub fn finish(mut self) -> Result<ExitStatus, WaitError> {
        self.output = None;
        let status = self.child.wait().map_err(|source| WaitError {
            program: self.program.clone(),
            source,
        })?;
        self.reaped = true;
        log::debug!("`{}` exited with {status}", self.program.display());
        Ok(status)
    }
}

impl io::Read for RunningChild {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.output {
            Some(output) => output.read(buf),
            None => Ok(0),
        }
    }
}

impl Drop for RunningChild {
    #[inline]
    fn drop(&mut self) {
        self.output = None;
        if self.reaped {
            return;
        }

        match self.child.try_wait() {
            Ok(Some(status)) => {
                log::debug!("`{}` had exited with {status}", self.program.display());
            }
            Ok(None) => {
                log::warn!(
                    "killing `{}` (pid {}) before it finished",
                    self.program.display(),
                    self.child.id()
                );
                if let Err(err) = self.child.kill() {
                    log::warn!("could not kill `{}`: {err}", self.program.display());
                }
                if let Err(err) = self.child.wait() {
                    log::warn!("could not reap `{}`: {err}", self.program.display());
                }
            }
            Err(err) => {
                log::warn!("could not query `{}`: {err}", self.program.display());
            }
        }
    }
}

/// An error indicating failure while starting the wrapped program.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SpawnError {
    /// The pipe for the merged output could not be created.
    #[error("could not create output pipe: {0}")]
    Pipe(#[source] io::Error),
    /// The program could not be started.
    #[error("IO error occurred while starting {invocation}: {source}")]
    Spawn {
        /// The invocation which was attempted.
        invocation: Box<Invocation>,
        /// Source of the error.
        source: io::Error,
    },
}

impl SpawnError {
    /// Creates [`Spawn`](SpawnError::Spawn) variant from given arguments.
    fn spawn(invocation: &Invocation, source: io::Error) -> Self {
        Self::Spawn {
            invocation: Box::new(invocation.clone()),
            source,
        }
    }

    /// Returns the invocation which failed to start, if the failure got that far.
    #[inline]
    #[must_use]
    pub fn invocation(&self) -> Option<&Invocation> {
        match self {
            Self::Pipe(_) => None,
            Self::Spawn { invocation, .. } => Some(invocation.as_ref()),
        }
    }
}

/// An error indicating failure while waiting for the wrapped program to exit.
#[derive(Debug, thiserror::Error)]
#[error("could not wait for `{}`: {source}", .program.display())]
#[non_exhaustive]
pub struct WaitError {
    /// Program the child was started from.
    pub program: PathBuf,
    /// Source of the error.
    pub source: io::Error,
}

//! One complete run of the wrapped compiler.

use std::{
    env,
    ffi::{OsStr, OsString},
    io,
    path::{Path, PathBuf},
    process::ExitStatus,
};

use crate::{
    args::rewrite_args,
    command::{Invocation, SpawnError, WaitError, VALIDATOR_NAME},
    filter::LineFilter,
};

/// Parameters of [`run()`].
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct RunParams<W> {
    /// Writer receiving the relayed lines.
    pub writer: W,
    /// Directory containing the compiler, the current directory if `None`.
    pub working_dir: Option<PathBuf>,
    /// File name of the compiler.
    pub program_name: OsString,
}

impl<W> RunParams<W> {
    /// Replaces the writer receiving the relayed lines.
    #[inline]
    #[must_use]
    pub fn writer<NW>(self, writer: NW) -> RunParams<NW> {
        RunParams {
            writer,
            working_dir: self.working_dir,
            program_name: self.program_name,
        }
    }

    /// Replaces the directory containing the compiler.
    #[inline]
    #[must_use]
    pub fn working_dir(self, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: Some(working_dir.into()),
            ..self
        }
    }

    /// Replaces the file name of the compiler.
    #[inline]
    #[must_use]
    pub fn program_name(self, program_name: impl AsRef<OsStr>) -> Self {
        Self {
            program_name: program_name.as_ref().to_os_string(),
            ..self
        }
    }
}

impl Default for RunParams<io::Empty> {
    #[inline]
    fn default() -> Self {
        Self {
            writer: io::empty(),
            working_dir: None,
            program_name: VALIDATOR_NAME.into(),
        }
    }
}

/// Runs the compiler found in the working directory with the rewritten `args`
/// and relays its filtered output.
///
/// `args` excludes the wrapper's own program name. The last of them (before rewriting) is
/// the line dropped from the output in addition to the noisy diagnostic.
///
/// The exit status of the compiler is returned as is: its output is relayed regardless.
///
/// # Errors
///
/// Returns an error if the compiler cannot be started or waited for,
/// or if writing the relayed output fails.
#[inline]
pub fn run<S, W>(args: &[S], params: RunParams<W>) -> Result<ExitStatus, RunError>
where
    S: AsRef<OsStr>,
    W: io::Write,
{
    let RunParams {
        mut writer,
        working_dir,
        program_name,
    } = params;
    let working_dir = match working_dir {
        Some(dir) => dir,
        None => env::current_dir().map_err(RunError::CurrentDir)?,
    };

    let filter = LineFilter::from_args(args);
    let invocation = build_invocation(&working_dir, &program_name, args);
    let mut child = invocation.spawn()?;
    log::info!("started {invocation} (pid {})", child.id());

    let stats = filter
        .relay(&mut child, &mut writer)
        .map_err(RunError::Relay)?;
    log::debug!(
        "relayed {} lines, suppressed {}",
        stats.relayed,
        stats.suppressed
    );

    let status = child.finish()?;
    if !status.success() {
        log::info!("{invocation} failed with {status}");
    }
    Ok(status)
}

/// Builds the invocation of `program_name` in `working_dir` with the rewritten `args`.
fn build_invocation<S: AsRef<OsStr>>(
    working_dir: &Path,
    program_name: &OsStr,
    args: &[S],
) -> Invocation {
    let rewritten = rewrite_args(args);
    log::debug!("rewritten arguments: {rewritten:?}");
    Invocation::in_dir(working_dir, program_name, rewritten)
}

/// An error indicating failure during [`run()`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RunError {
    /// The current directory could not be determined.
    #[error("could not determine current directory: {0}")]
    CurrentDir(#[source] io::Error),
    /// The compiler could not be started.
    #[error(transparent)]
    Spawn(#[from] SpawnError),
    /// Writing the relayed output failed.
    #[error("failed to write compiler output: {0}")]
    Relay(#[source] io::Error),
    /// Waiting for the compiler failed.
    #[error(transparent)]
    Wait(#[from] WaitError),
}

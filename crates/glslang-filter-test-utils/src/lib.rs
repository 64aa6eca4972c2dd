//! Shared code of `glslang-filter` crates for testing.

#![expect(clippy::missing_errors_doc, reason = "test helpers")]

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};

use anyhow::Context as _;
use tempfile::TempDir;

/// File the fake validator records its arguments into, next to the script.
const ARGS_LOG: &str = "args.log";

/// Held by every live [`FakeValidator`] and every [`spawn_guard`].
///
/// Writing a script while another test thread forks can leave the child holding the
/// write descriptor, making our own exec fail with `ETXTBSY`.
static SPAWN_LOCK: Mutex<()> = Mutex::new(());

/// Takes the lock every [`FakeValidator`] holds, for tests that spawn processes without one.
///
/// Must not be called while a [`FakeValidator`] is alive on the same thread.
pub fn spawn_guard() -> MutexGuard<'static, ()> {
    SPAWN_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

/// `FakeValidator` sets up a temp dir containing an executable shell script named
/// `glslangValidator`, used in place of the real compiler.
///
/// The script first records its arguments, then runs the given body. Tests using a
/// `FakeValidator` are serialized. Dropping it cleans up the dir, except when panic
/// unwinding, so you can debug failures.
#[must_use]
pub struct FakeValidator {
    /// Directory containing the script.
    dir: TempDir,
    /// Serializes tests which spawn scripts.
    _lock: MutexGuard<'static, ()>,
}

impl FakeValidator {
    /// File name of the script.
    pub const NAME: &'static str = "glslangValidator";

    /// Creates the script with the given shell `body`.
    pub fn new(body: &str) -> anyhow::Result<Self> {
        let lock = spawn_guard();
        let dir = TempDir::with_prefix("glslang-filter-test")?;
        let script = dir.path().join(Self::NAME);
        let contents = format!(
            "#!/bin/sh\n\
             log=\"$(dirname \"$0\")/{ARGS_LOG}\"\n\
             printf '%s\\n' \"$#\" > \"$log\"\n\
             for arg in \"$@\"; do printf '%s\\n' \"$arg\" >> \"$log\"; done\n\
             {body}\n"
        );
        fs::write(&script, contents)
            .with_context(|| format!("could not write '{}'", script.display()))?;
        make_executable(&script)?;

        Ok(Self { dir, _lock: lock })
    }

    /// Creates a script printing each of `lines` to stdout, then exiting with `code`.
    pub fn printing(lines: &[&str], code: u8) -> anyhow::Result<Self> {
        let mut body = lines
            .iter()
            .map(|line| format!("printf '%s\\n' {}", shell_quote(line)))
            .collect::<Vec<_>>();
        body.push(format!("exit {code}"));
        Self::new(&body.join("\n"))
    }

    /// Directory containing the script.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Path to the script.
    pub fn path(&self) -> PathBuf {
        self.dir().join(Self::NAME)
    }

    /// Arguments the script was last started with.
    pub fn recorded_args(&self) -> anyhow::Result<Vec<String>> {
        let log_path = self.dir().join(ARGS_LOG);
        let log = fs::read_to_string(&log_path)
            .with_context(|| format!("validator never ran, no '{}'", log_path.display()))?;
        let mut lines = log.lines();
        let count = lines
            .next()
            .context("empty argument log")?
            .parse::<usize>()
            .context("argument count")?;
        let args = lines.map(ToOwned::to_owned).collect::<Vec<_>>();
        anyhow::ensure!(
            args.len() == count,
            "argument log has {} entries but {count} were passed (multi-line argument?)",
            args.len()
        );
        Ok(args)
    }
}

impl Drop for FakeValidator {
    fn drop(&mut self) {
        // when a test fails, keep directory
        if std::thread::panicking() {
            self.dir.disable_cleanup(true);
        }
    }
}

/// Quotes `text` for use as a single shell word.
fn shell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "'\\''"))
}

#[cfg(unix)]
fn make_executable(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt as _;

    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(path, permissions)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> anyhow::Result<()> {
    anyhow::bail!("fake validator scripts need a Unix shell")
}

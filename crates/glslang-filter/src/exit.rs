//! Mapping of the child's exit status to the wrapper's exit code.

use std::process::ExitStatus;

/// Exit code used when the child's status has no representable code.
pub const FAILURE: u8 = 1;

/// Returns the exit code the wrapper should exit with after the child exited with `status`.
///
/// * the child's own exit code, if it fits into a `u8`,
/// * `128 + signal` if the child was killed by a signal (Unix only),
/// * [`FAILURE`] otherwise.
#[inline]
#[must_use]
pub fn exit_code(status: ExitStatus) -> u8 {
    if let Some(code) = status.code() {
        return u8::try_from(code).unwrap_or(FAILURE);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt as _;

        if let Some(signal) = status.signal() {
            return u8::try_from(128_i32.saturating_add(signal)).unwrap_or(FAILURE);
        }
    }

    FAILURE
}

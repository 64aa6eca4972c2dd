//! Rewriting of the arguments forwarded to `glslangValidator`.

use std::ffi::{OsStr, OsString};

/// Arguments starting with this prefix are names of generated SPIR-V arrays (`--vn spv_foo.vert`).
pub const IDENTIFIER_PREFIX: &str = "spv_";

/// Rewrites a single argument.
///
/// If the argument starts with [`IDENTIFIER_PREFIX`], every `.` in it is replaced with `_`.
/// Any other argument is returned unchanged.
#[inline]
#[must_use]
pub fn rewrite_arg(arg: &OsStr) -> OsString {
    if !arg.as_encoded_bytes().starts_with(IDENTIFIER_PREFIX.as_bytes()) {
        return arg.to_os_string();
    }

    if let Some(text) = arg.to_str() {
        return text.replace('.', "_").into();
    }
    rewrite_non_utf8(arg)
}

/// Rewrites a prefixed argument that is not valid UTF-8, byte by byte.
#[cfg(unix)]
fn rewrite_non_utf8(arg: &OsStr) -> OsString {
    use std::os::unix::ffi::{OsStrExt as _, OsStringExt as _};

    let rewritten = arg
        .as_bytes()
        .iter()
        .map(|&byte| if byte == b'.' { b'_' } else { byte })
        .collect::<Vec<_>>();
    OsString::from_vec(rewritten)
}

/// Leaves a prefixed argument that is not valid unicode unchanged.
#[cfg(not(unix))]
fn rewrite_non_utf8(arg: &OsStr) -> OsString {
    log::warn!("not rewriting {}: it is not valid unicode", arg.display());
    arg.to_os_string()
}

/// Rewrites every argument with [`rewrite_arg`].
///
/// The result has the same length and order as the input.
#[inline]
pub fn rewrite_args<I, S>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    args.into_iter()
        .map(|arg| rewrite_arg(arg.as_ref()))
        .collect()
}

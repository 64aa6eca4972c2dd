//! `glslang-filter`, run by ninja in place of `glslangValidator`.
//!
//! Every argument is forwarded: the wrapper has no options of its own and does not treat `--`
//! specially. Logging goes to stderr and is controlled with `RUST_LOG` (default `warn`).

use std::{ffi::OsString, io, process::ExitCode};

use anyhow::Context as _;
use glslang_filter::{command::VALIDATOR_NAME, exit::exit_code, RunParams};

fn main() -> anyhow::Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = std::env::args_os().skip(1).collect::<Vec<OsString>>();
    log::debug!("forwarding arguments: {args:?}");

    let params = RunParams::default().writer(io::stdout().lock());
    let status = glslang_filter::run(&args, params)
        .with_context(|| format!("could not run {VALIDATOR_NAME}"))?;

    let code = exit_code(status);
    log::debug!("{VALIDATOR_NAME} exited with {status}, exiting with {code}");
    Ok(ExitCode::from(code))
}

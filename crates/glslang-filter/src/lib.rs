//! Drop-in wrapper around `glslangValidator` for ninja builds.
//!
//! The build invokes this wrapper with the exact arguments meant for the real compiler,
//! which must live in the current working directory.
//!
//! # How it works
//!
//! * every argument starting with [`IDENTIFIER_PREFIX`](args::IDENTIFIER_PREFIX) names a
//!   generated SPIR-V array, so its periods are [rewritten](args::rewrite_args) into underscores
//!   to form a valid C identifier,
//! * `glslangValidator` is [started](command::Invocation::spawn) with its stdout and stderr
//!   merged into a single pipe,
//! * that pipe is [relayed](filter::LineFilter::relay) line by line, dropping the
//!   [noisy diagnostic](filter::NOISY_DIAGNOSTIC) and any line equal to the last argument
//!   (ninja already prints the source file name),
//! * the child's exit status is returned so it can become the wrapper's own
//!   [exit code](exit::exit_code).

#![expect(clippy::pub_use, reason = "part of public API")]

pub mod args;
pub mod command;
pub mod exit;
pub mod filter;
pub mod wrapper;

pub use self::wrapper::{run, RunError, RunParams};

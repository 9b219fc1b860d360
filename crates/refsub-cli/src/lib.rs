//! refsub CLI library
//!
//! Exposes the CLI entry point so the binary and embedding tools share it.

mod cli;

pub use cli::run;

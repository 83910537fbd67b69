//! Entry point for the `lspbench` binary.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout = io::stdout().lock();
    // Stderr stays unlocked: the tracing subscriber writes to it from
    // reader threads while the benchmark runs.
    let mut stderr = io::stderr();
    lspbench_cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}

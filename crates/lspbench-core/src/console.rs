//! User-facing progress output.

use std::fmt;
use std::io::Write;

use tracing::warn;

const CONSOLE_TARGET: &str = "lspbench_core::console";

/// Line-oriented writer for progress and summaries.
///
/// Write failures are logged once and otherwise ignored; losing the console
/// must not abort a measurement.
#[derive(Debug)]
pub struct Console<W> {
    out: W,
    failed: bool,
}

impl<W: Write> Console<W> {
    /// Wraps a sink.
    pub const fn new(out: W) -> Self {
        Self { out, failed: false }
    }

    /// Writes one line.
    pub fn line(&mut self, args: fmt::Arguments<'_>) {
        if let Err(error) = self.out.write_fmt(args).and_then(|()| self.out.write_all(b"\n")) {
            if !self.failed {
                warn!(target: CONSOLE_TARGET, %error, "console output failed");
            }
            self.failed = true;
        }
    }

    /// Writes an empty line.
    pub fn blank(&mut self) {
        self.line(format_args!(""));
    }

    /// Returns the sink.
    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn writes_terminated_lines() {
        let mut console = Console::new(Vec::new());

        console.line(format_args!("Process start: {:.1}ms", 101.5));
        console.blank();

        assert_eq!(console.into_inner(), b"Process start: 101.5ms\n\n");
    }
}

//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

const CONFIG_HELP: &str = "\
Configuration flags (also LSPBENCH_* variables or a TOML file):
      --config-path <PATH>          TOML configuration file
      --iterations <COUNT>          Probe iterations per server [default: 3]
      --spawn-settle <DURATION>     Delay after spawning a server [default: 100ms]
      --handshake-settle <DURATION> Delay after `initialized` [default: 500ms]
      --index-settle <DURATION>     Delay for the server to index [default: 2s]
      --open-settle <DURATION>      Delay after opening the document [default: 100ms]
      --request-timeout <DURATION>  Read timeout per request [default: 30s]
      --shutdown-timeout <DURATION> Bounded wait for server exit [default: 5s]
      --log-filter <FILTER>         Tracing filter expression [default: info]
      --log-format <FORMAT>         `compact` or `json` [default: compact]";

/// Which side of the comparison to run alone.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub(crate) enum Side {
    /// The server under test.
    Primary,
    /// The reference server.
    Baseline,
}

/// Compares two language servers on the same workspace.
#[derive(Parser, Debug)]
#[command(name = "lspbench", version, after_help = CONFIG_HELP)]
pub(crate) struct Cli {
    /// Workspace the servers index and the probes run against.
    #[arg(long, short = 'w', value_name = "DIR")]
    pub(crate) workspace: PathBuf,

    /// Path to the primary server binary.
    #[arg(long, value_name = "PATH")]
    pub(crate) primary: Option<PathBuf>,
    /// Display name and lookup name of the primary server.
    #[arg(long, value_name = "NAME", default_value = "fsharp-lsp")]
    pub(crate) primary_name: String,
    /// Extra argument for the primary server; repeatable.
    #[arg(long = "primary-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub(crate) primary_args: Vec<String>,

    /// Path to the baseline server binary.
    #[arg(long, value_name = "PATH")]
    pub(crate) baseline: Option<PathBuf>,
    /// Display name and lookup name of the baseline server.
    #[arg(long, value_name = "NAME", default_value = "fsautocomplete")]
    pub(crate) baseline_name: String,
    /// Extra argument for the baseline server; repeatable.
    #[arg(
        long = "baseline-arg",
        value_name = "ARG",
        allow_hyphen_values = true,
        default_value = "--adaptive-lsp-server-enabled"
    )]
    pub(crate) baseline_args: Vec<String>,

    /// Benchmark only one side.
    #[arg(long, value_enum)]
    pub(crate) only: Option<Side>,
    /// Source file extensions considered for the workload, comma separated.
    #[arg(long, value_name = "EXT", value_delimiter = ',')]
    pub(crate) extensions: Vec<String>,
    /// Result file; defaults to `.lspbench/benchmark-results.json` in the
    /// workspace.
    #[arg(long, value_name = "PATH")]
    pub(crate) output: Option<PathBuf>,
}

impl Cli {
    /// Whether `side` takes part in this run.
    pub(crate) fn includes(&self, side: Side) -> bool {
        self.only.is_none_or(|only| only == side)
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use rstest::rstest;

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("lspbench").chain(args.iter().copied()))
            .expect("parse arguments")
    }

    #[rstest]
    fn defaults_name_both_sides() {
        let cli = parse(&["--workspace", "/tmp/project"]);

        assert_eq!(cli.primary_name, "fsharp-lsp");
        assert_eq!(cli.baseline_name, "fsautocomplete");
        assert_eq!(cli.baseline_args, ["--adaptive-lsp-server-enabled"]);
        assert!(cli.primary_args.is_empty());
        assert!(cli.includes(Side::Primary) && cli.includes(Side::Baseline));
    }

    #[rstest]
    fn workspace_is_required() {
        assert!(Cli::try_parse_from(["lspbench"]).is_err());
    }

    #[rstest]
    fn only_selects_one_side() {
        let cli = parse(&["-w", ".", "--only", "baseline"]);

        assert!(!cli.includes(Side::Primary));
        assert!(cli.includes(Side::Baseline));
    }

    #[rstest]
    fn configuration_flags_are_not_cli_flags() {
        let parsed = Cli::try_parse_from(["lspbench", "-w", ".", "--index-settle", "5s"]);

        assert!(parsed.is_err());
    }

    #[rstest]
    fn help_lists_configuration_flags() {
        let help = Cli::command().render_help().to_string();

        for flag in lspbench_config::CONFIG_CLI_FLAGS {
            assert!(help.contains(flag), "{flag} missing from help");
        }
    }

    #[rstest]
    fn extensions_split_on_commas() {
        let cli = parse(&["-w", ".", "--extensions", "fs,fsx"]);

        assert_eq!(cli.extensions, ["fs", "fsx"]);
    }
}

//! Configuration loading for the command-line runtime.
//!
//! Tunables are owned by `ortho_config`, which layers defaults, a
//! configuration file, `LSPBENCH_*` environment variables and flags. The
//! flags it understands are peeled off the argument list here; everything
//! else is left for [`crate::cli::Cli`].

use std::ffi::{OsStr, OsString};
use std::sync::Arc;

use lspbench_config::{BenchConfig, CONFIG_CLI_FLAGS};
use ortho_config::{OrthoConfig, OrthoError};

pub(crate) trait ConfigLoader {
    /// Loads configuration from the peeled configuration arguments.
    fn load(&self, args: &[OsString]) -> Result<BenchConfig, Arc<OrthoError>>;
}

pub(crate) struct OrthoConfigLoader;

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<BenchConfig, Arc<OrthoError>> {
        BenchConfig::load_from_iter(args.iter().cloned())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagAction {
    Include { needs_value: bool },
    Skip,
}

fn classify(argument: &OsStr) -> FlagAction {
    let text = argument.to_string_lossy();
    if !text.starts_with("--") {
        return FlagAction::Skip;
    }
    let (flag, inline) = match text.split_once('=') {
        Some((flag, _)) => (flag, true),
        None => (&*text, false),
    };
    if CONFIG_CLI_FLAGS.contains(&flag) {
        FlagAction::Include {
            needs_value: !inline,
        }
    } else {
        FlagAction::Skip
    }
}

/// Arguments partitioned between the configuration loader and the CLI.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ArgumentSplit {
    pub(crate) config_arguments: Vec<OsString>,
    pub(crate) cli_arguments: Vec<OsString>,
}

/// Moves configuration flags, and their values, into their own list.
///
/// Both lists start with the program name. Partitioning stops at `--`.
pub(crate) fn split_config_arguments(args: &[OsString]) -> ArgumentSplit {
    let mut split = ArgumentSplit::default();
    let mut rest = args.iter();
    if let Some(program) = rest.next() {
        split.config_arguments.push(program.clone());
        split.cli_arguments.push(program.clone());
    }

    while let Some(argument) = rest.next() {
        if argument == "--" {
            split.cli_arguments.push(argument.clone());
            split.cli_arguments.extend(rest.cloned());
            break;
        }
        match classify(argument) {
            FlagAction::Include { needs_value } => {
                split.config_arguments.push(argument.clone());
                if needs_value {
                    split.config_arguments.extend(rest.next().cloned());
                }
            }
            FlagAction::Skip => split.cli_arguments.push(argument.clone()),
        }
    }
    split
}

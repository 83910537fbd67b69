//! Locating server binaries.
//!
//! An explicit path is used as given. Otherwise a side's fallback
//! candidates are tried in order, then the binary name is looked up on
//! `PATH`.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::cli::{Cli, Side};

const DISCOVER_TARGET: &str = "lspbench_cli::discover";

/// Outcome of a binary lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Located {
    Found(PathBuf),
    /// Nothing usable; carries every location that was checked.
    Missing(Vec<String>),
}

/// One side of the comparison as described on the command line.
#[derive(Debug, Clone)]
pub(crate) struct SideSpec {
    pub(crate) side: Side,
    pub(crate) name: String,
    pub(crate) explicit: Option<PathBuf>,
    pub(crate) args: Vec<String>,
    pub(crate) candidates: Vec<PathBuf>,
}

impl SideSpec {
    pub(crate) fn primary(cli: &Cli, cwd: &Path, home: Option<&Path>) -> Self {
        let name = cli.primary_name.clone();
        let mut candidates = vec![cwd.join("target").join("release").join(&name)];
        candidates.extend(home.map(|home| home.join(".cargo").join("bin").join(&name)));
        Self {
            side: Side::Primary,
            explicit: cli.primary.clone(),
            args: cli.primary_args.clone(),
            candidates,
            name,
        }
    }

    pub(crate) fn baseline(cli: &Cli, home: Option<&Path>) -> Self {
        let name = cli.baseline_name.clone();
        let mut candidates: Vec<PathBuf> = home
            .map(|home| home.join(".dotnet").join("tools").join(&name))
            .into_iter()
            .collect();
        candidates.push(Path::new("/usr/local/bin").join(&name));
        Self {
            side: Side::Baseline,
            explicit: cli.baseline.clone(),
            args: cli.baseline_args.clone(),
            candidates,
            name,
        }
    }

    /// The flag that names this side's binary.
    pub(crate) const fn flag(&self) -> &'static str {
        match self.side {
            Side::Primary => "--primary",
            Side::Baseline => "--baseline",
        }
    }

    /// Resolves the binary, searching `search_path` last.
    pub(crate) fn locate(&self, search_path: Option<&OsStr>, cwd: &Path) -> Located {
        if let Some(explicit) = &self.explicit {
            return if explicit.is_file() {
                Located::Found(explicit.clone())
            } else {
                Located::Missing(vec![explicit.display().to_string()])
            };
        }
        if let Some(found) = self.candidates.iter().find(|candidate| candidate.is_file()) {
            debug!(target: DISCOVER_TARGET, server = %self.name, path = %found.display(), "found fallback candidate");
            return Located::Found(found.clone());
        }
        match which::which_in(&self.name, search_path, cwd) {
            Ok(found) => Located::Found(found),
            Err(error) => {
                debug!(target: DISCOVER_TARGET, server = %self.name, %error, "not found on PATH");
                let mut tried: Vec<String> = self
                    .candidates
                    .iter()
                    .map(|candidate| candidate.display().to_string())
                    .collect();
                tried.push(format!("{} on PATH", self.name));
                Located::Missing(tried)
            }
        }
    }
}

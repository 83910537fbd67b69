//! Choosing the file and position the probes run against.
//!
//! The largest source file in the workspace is taken as the most likely to
//! hold interesting symbols. Within it, the first identifier following a
//! declaration keyword becomes the probe position. Positions are zero based
//! and columns count UTF-16 code units, as the protocol requires.

use std::fs;
use std::path::{Path, PathBuf};

use lsp_types::Uri;
use tracing::{debug, warn};
use url::Url;
use walkdir::{DirEntry, WalkDir};

use crate::error::BenchError;

const WORKLOAD_TARGET: &str = "lspbench_core::workload";

/// Extensions scanned when no explicit list is configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "fs", "fsx", "fsi", "rs", "py", "ts", "tsx", "js", "jsx", "go", "java", "kt", "cs", "c", "h",
    "cpp", "hpp", "rb", "ml", "mli", "hs", "swift", "scala",
];

const KEYWORDS: &[&str] = &[
    "let", "open", "type", "module", "fn", "def", "class", "func", "struct", "interface",
    "function",
];

const COMMENT_PREFIXES: &[&str] = &["//", "#", "(*", "/*", "*", "--"];

/// A canonical workspace directory and its file URI.
#[derive(Debug, Clone)]
pub struct WorkspaceRoot {
    path: PathBuf,
    uri: Uri,
    name: String,
}

impl WorkspaceRoot {
    /// Resolves `path` to an absolute directory.
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::WorkspaceMissing`] when the path does not name
    /// an existing directory.
    pub fn open(path: &Path) -> Result<Self, BenchError> {
        let missing = || BenchError::WorkspaceMissing {
            path: path.to_path_buf(),
        };
        let canonical = fs::canonicalize(path).map_err(|_| missing())?;
        if !canonical.is_dir() {
            return Err(missing());
        }
        let uri = file_uri(&canonical).ok_or_else(missing)?;
        let name = canonical
            .file_name()
            .map_or_else(|| String::from("workspace"), |name| name.to_string_lossy().into_owned());
        Ok(Self {
            path: canonical,
            uri,
            name,
        })
    }

    /// Absolute path of the workspace.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File URI of the workspace.
    #[must_use]
    pub const fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Final path component, used as the workspace folder name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// The file and position every position-sensitive probe uses.
#[derive(Debug, Clone)]
pub struct Workload {
    path: PathBuf,
    uri: Uri,
    language_id: &'static str,
    text: String,
    line: u32,
    column: u32,
}

impl Workload {
    /// Path of the chosen file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File URI of the chosen file.
    #[must_use]
    pub const fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Protocol language identifier derived from the extension.
    #[must_use]
    pub const fn language_id(&self) -> &'static str {
        self.language_id
    }

    /// Full file contents sent with `textDocument/didOpen`.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Zero-based line.
    #[must_use]
    pub const fn line(&self) -> u32 {
        self.line
    }

    /// Zero-based column in UTF-16 code units.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }
}

/// Scans a workspace for a [`Workload`].
#[derive(Debug, Clone)]
pub struct WorkloadSelector {
    extensions: Vec<String>,
}

impl Default for WorkloadSelector {
    fn default() -> Self {
        Self::with_extensions(DEFAULT_EXTENSIONS.iter().copied())
    }
}

impl WorkloadSelector {
    /// Creates a selector matching the given extensions, with or without a
    /// leading dot, case-insensitively.
    #[must_use]
    pub fn with_extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        Self { extensions }
    }

    /// Picks the largest readable source file and a position within it.
    ///
    /// Hidden files and directories are skipped. Returns `None` when the
    /// workspace holds no matching file.
    #[must_use]
    pub fn select(&self, root: &WorkspaceRoot) -> Option<Workload> {
        let mut candidates: Vec<(u64, PathBuf)> = WalkDir::new(root.path())
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry))
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file() && self.matches(entry.path()))
            .filter_map(|entry| {
                let size = entry.metadata().ok()?.len();
                Some((size, entry.into_path()))
            })
            .collect();
        candidates.sort_by(|(left_size, left), (right_size, right)| {
            right_size.cmp(left_size).then_with(|| left.cmp(right))
        });
        debug!(target: WORKLOAD_TARGET, candidates = candidates.len(), "scanned workspace");

        candidates
            .into_iter()
            .find_map(|(_, path)| Self::load(path))
    }

    fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.extensions
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
    }

    fn load(path: PathBuf) -> Option<Workload> {
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(error) => {
                warn!(target: WORKLOAD_TARGET, path = %path.display(), %error, "skipping unreadable file");
                return None;
            }
        };
        let uri = file_uri(&path)?;
        let (line, column) = symbol_position(&text);
        Some(Workload {
            language_id: language_id(&path),
            path,
            uri,
            text,
            line,
            column,
        })
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

/// Converts an absolute path to a protocol file URI.
pub(crate) fn file_uri(path: &Path) -> Option<Uri> {
    let url = Url::from_file_path(path).ok()?;
    url.as_str().parse().ok()
}

/// Maps a file extension to a protocol language identifier.
#[must_use]
pub fn language_id(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "fs" | "fsx" | "fsi" => "fsharp",
        "rs" => "rust",
        "py" => "python",
        "ts" => "typescript",
        "tsx" => "typescriptreact",
        "js" => "javascript",
        "jsx" => "javascriptreact",
        "go" => "go",
        "java" => "java",
        "kt" => "kotlin",
        "cs" => "csharp",
        "c" | "h" => "c",
        "cpp" | "hpp" => "cpp",
        "rb" => "ruby",
        "ml" | "mli" => "ocaml",
        "hs" => "haskell",
        "swift" => "swift",
        "scala" => "scala",
        _ => "plaintext",
    }
}

/// Finds the probe position in `text`.
///
/// Returns the start of the first identifier that follows a declaration
/// keyword, falling back to column 0 of the first code line, then `(0, 0)`.
#[must_use]
pub fn symbol_position(text: &str) -> (u32, u32) {
    let code_lines = || {
        text.lines()
            .enumerate()
            .filter(|(_, line)| is_code(line))
            .map(|(index, line)| (to_u32(index), line))
    };
    code_lines()
        .find_map(|(index, line)| declared_identifier(line).map(|column| (index, column)))
        .or_else(|| code_lines().next().map(|(index, _)| (index, 0)))
        .unwrap_or((0, 0))
}

fn is_code(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty()
        && !COMMENT_PREFIXES
            .iter()
            .any(|prefix| trimmed.starts_with(prefix))
}

/// UTF-16 column of the identifier following the first keyword on `line`.
fn declared_identifier(line: &str) -> Option<u32> {
    KEYWORDS
        .iter()
        .find_map(|keyword| identifier_after(line, keyword))
        .map(|byte| {
            let prefix = line.get(..byte).unwrap_or_default();
            to_u32(prefix.encode_utf16().count())
        })
}

/// Byte offset of the identifier after a whole-word `keyword` and a single
/// space, if the identifier is non-empty.
fn identifier_after(line: &str, keyword: &str) -> Option<usize> {
    line.match_indices(keyword).find_map(|(start, _)| {
        let before = line.get(..start)?.chars().next_back();
        if before.is_some_and(is_identifier_char) {
            return None;
        }
        let rest = line.get(start + keyword.len()..)?;
        let after_space = rest.strip_prefix(' ')?;
        after_space
            .chars()
            .next()
            .filter(|first| is_identifier_char(*first))
            .map(|_| start + keyword.len() + 1)
    })
}

fn is_identifier_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

fn to_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use tempfile::TempDir;

    use super::*;

    fn workspace(files: &[(&str, &str)]) -> (TempDir, WorkspaceRoot) {
        let dir = TempDir::new().expect("create workspace");
        for (name, contents) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("create parent");
            }
            fs::write(path, contents).expect("write file");
        }
        let root = WorkspaceRoot::open(dir.path()).expect("open workspace");
        (dir, root)
    }

    #[rstest]
    #[case("let add x y = x + y", (0, 4))]
    #[case("// header\nmodule Billing.Service\n", (1, 7))]
    #[case("    type Service() =", (0, 9))]
    #[case("pub fn get_user() {}", (0, 7))]
    #[case("outlet value = 3\nopen System", (1, 5))]
    #[case("let (a, b) = pair\nlet café = 1", (1, 4))]
    #[case("(é) let x = 1", (0, 8))]
    #[case("(* let x *)\nprintfn \"hi\"", (1, 0))]
    #[case("\n\n   \n", (0, 0))]
    #[case("", (0, 0))]
    fn finds_symbol_positions(#[case] text: &str, #[case] expected: (u32, u32)) {
        assert_eq!(symbol_position(text), expected);
    }

    #[rstest]
    fn column_counts_utf16_units() {
        // U+1D11E takes two UTF-16 units.
        let text = "\"\u{1D11E}\" |> ignore; let x = 1";

        let (_, column) = symbol_position(text);

        assert_eq!(column, 20);
    }

    #[rstest]
    fn prefers_largest_file_and_skips_hidden_entries() {
        let (_dir, root) = workspace(&[
            ("src/Small.fs", "let a = 1\n"),
            ("src/Large.fs", "module Large\nlet compute x = x * 2\nlet other = 3\n"),
            (".hidden/Huge.fs", &"let hidden = 1\n".repeat(50)),
            ("notes.txt", &"text ".repeat(100)),
        ]);

        let workload = WorkloadSelector::default()
            .select(&root)
            .expect("workload");

        assert!(workload.path().ends_with("src/Large.fs"));
        assert_eq!((workload.line(), workload.column()), (0, 7));
        assert_eq!(workload.language_id(), "fsharp");
        assert!(workload.uri().as_str().starts_with("file:///"));
    }

    #[rstest]
    fn ties_break_on_path_order() {
        let (_dir, root) = workspace(&[("b.py", "def b(): pass\n"), ("a.py", "def a(): pass\n")]);

        let workload = WorkloadSelector::default()
            .select(&root)
            .expect("workload");

        assert!(workload.path().ends_with("a.py"));
    }

    #[rstest]
    fn empty_workspace_has_no_workload() {
        let (_dir, root) = workspace(&[("README.md", "# nothing to see")]);

        assert!(WorkloadSelector::default().select(&root).is_none());
    }

    #[rstest]
    fn custom_extensions_narrow_the_scan() {
        let (_dir, root) = workspace(&[("big.rs", &"fn x() {}\n".repeat(20)), ("small.fs", "let y = 2\n")]);

        let workload = WorkloadSelector::with_extensions([".FS"])
            .select(&root)
            .expect("workload");

        assert!(workload.path().ends_with("small.fs"));
    }

    #[rstest]
    fn missing_workspace_is_rejected() {
        let dir = TempDir::new().expect("create temp dir");

        let error = WorkspaceRoot::open(&dir.path().join("absent")).expect_err("missing");

        assert!(matches!(error, BenchError::WorkspaceMissing { .. }));
    }

    #[rstest]
    #[case("Main.fsx", "fsharp")]
    #[case("lib.RS", "rust")]
    #[case("README", "plaintext")]
    fn derives_language_ids(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(language_id(Path::new(name)), expected);
    }
}

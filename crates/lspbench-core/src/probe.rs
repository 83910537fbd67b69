//! The benchmarked requests and their success rules.
//!
//! Definition and hover answer with a single value, so `null` counts as "no
//! answer" and fails the probe. Symbol search, references and completion
//! answer with collections; an empty collection is a valid answer and the
//! probe succeeds whenever the reply carries a `result` key.

use std::time::Instant;

use lsp_types::{
    CompletionParams, GotoDefinitionParams, HoverParams, PartialResultParams, Position,
    ReferenceContext, ReferenceParams, TextDocumentIdentifier, TextDocumentPositionParams,
    WorkDoneProgressParams, WorkspaceSymbolParams,
};
use lspbench_client::{CodecError, Response, ServerSession, SessionError};
use serde::Deserialize;
use serde_json::Value;

use crate::result::{BenchmarkResult, Operation};
use crate::workload::Workload;

/// The two fixed `workspace/symbol` queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolQuery {
    /// Names starting with `get`.
    Prefix,
    /// Names containing `Service`.
    Contains,
}

impl SymbolQuery {
    /// The query string sent to the server.
    #[must_use]
    pub const fn text(self) -> &'static str {
        match self {
            Self::Prefix => "get",
            Self::Contains => "Service",
        }
    }
}

/// One benchmarked request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// `textDocument/definition` at the workload position.
    Definition,
    /// `workspace/symbol` with a fixed query.
    WorkspaceSymbol(SymbolQuery),
    /// `textDocument/references` at the workload position.
    References,
    /// `textDocument/hover` at the workload position.
    Hover,
    /// `textDocument/completion` at the workload position.
    Completion,
}

/// Order in which every iteration runs the probes.
pub const ITERATION: [Probe; 6] = [
    Probe::Definition,
    Probe::WorkspaceSymbol(SymbolQuery::Prefix),
    Probe::WorkspaceSymbol(SymbolQuery::Contains),
    Probe::References,
    Probe::Hover,
    Probe::Completion,
];

/// Completion replies come as a bare list or as a `CompletionList`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CompletionShape {
    Items(Vec<Value>),
    List {
        #[serde(default)]
        items: Vec<Value>,
    },
}

impl CompletionShape {
    /// Number of completion items; any other shape counts as none.
    fn count(result: &Value) -> usize {
        match Self::deserialize(result) {
            Ok(Self::Items(items) | Self::List { items }) => items.len(),
            Err(_) => 0,
        }
    }
}

/// Success flag and details for one reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// Whether the probe's success rule held.
    pub success: bool,
    /// Human-readable summary.
    pub details: String,
}

impl Probe {
    /// Protocol method name.
    #[must_use]
    pub const fn method(self) -> &'static str {
        match self {
            Self::Definition => "textDocument/definition",
            Self::WorkspaceSymbol(_) => "workspace/symbol",
            Self::References => "textDocument/references",
            Self::Hover => "textDocument/hover",
            Self::Completion => "textDocument/completion",
        }
    }

    /// Operation the probe records under.
    #[must_use]
    pub const fn operation(self) -> Operation {
        match self {
            Self::Definition => Operation::GoToDefinition,
            Self::WorkspaceSymbol(_) => Operation::WorkspaceSymbol,
            Self::References => Operation::FindReferences,
            Self::Hover => Operation::Hover,
            Self::Completion => Operation::Completion,
        }
    }

    /// Label used on the console.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Definition => "Go to definition",
            Self::WorkspaceSymbol(SymbolQuery::Prefix) => "Workspace symbol (prefix)",
            Self::WorkspaceSymbol(SymbolQuery::Contains) => "Workspace symbol (contains)",
            Self::References => "Find references",
            Self::Hover => "Hover",
            Self::Completion => "Completion",
        }
    }

    /// Builds the request parameters for `workload`.
    ///
    /// # Errors
    ///
    /// Returns a serialisation error if the parameters cannot be encoded.
    pub fn params(self, workload: &Workload) -> Result<Value, serde_json::Error> {
        let at = || TextDocumentPositionParams {
            text_document: TextDocumentIdentifier::new(workload.uri().clone()),
            position: Position::new(workload.line(), workload.column()),
        };
        match self {
            Self::Definition => serde_json::to_value(GotoDefinitionParams {
                text_document_position_params: at(),
                work_done_progress_params: WorkDoneProgressParams::default(),
                partial_result_params: PartialResultParams::default(),
            }),
            Self::WorkspaceSymbol(query) => serde_json::to_value(WorkspaceSymbolParams {
                partial_result_params: PartialResultParams::default(),
                work_done_progress_params: WorkDoneProgressParams::default(),
                query: query.text().to_owned(),
            }),
            Self::References => serde_json::to_value(ReferenceParams {
                text_document_position: at(),
                work_done_progress_params: WorkDoneProgressParams::default(),
                partial_result_params: PartialResultParams::default(),
                context: ReferenceContext {
                    include_declaration: true,
                },
            }),
            Self::Hover => serde_json::to_value(HoverParams {
                text_document_position_params: at(),
                work_done_progress_params: WorkDoneProgressParams::default(),
            }),
            Self::Completion => serde_json::to_value(CompletionParams {
                text_document_position: at(),
                work_done_progress_params: WorkDoneProgressParams::default(),
                partial_result_params: PartialResultParams::default(),
                context: None,
            }),
        }
    }

    /// Applies the probe's success rule to a reply.
    #[must_use]
    pub fn classify(self, response: &Response, workload: &Workload) -> Verdict {
        let (success, details) = match self {
            Self::Definition => (
                response.non_null_result().is_some(),
                format!("line {}, col {}", workload.line(), workload.column()),
            ),
            Self::WorkspaceSymbol(query) => (
                response.has_result(),
                format!(
                    "query='{}', found {} symbols",
                    query.text(),
                    list_len(response)
                ),
            ),
            Self::References => (
                response.has_result(),
                format!("found {} references", list_len(response)),
            ),
            Self::Hover => {
                let success = response.non_null_result().is_some();
                let details = if success { "got hover info" } else { "no hover info" };
                (success, details.to_owned())
            }
            Self::Completion => (
                response.has_result(),
                format!(
                    "got {} completions",
                    response.result.as_ref().map_or(0, CompletionShape::count)
                ),
            ),
        };
        let details = match response.error_message() {
            Some(message) => format!("{details} - {message}"),
            None => details,
        };
        Verdict { success, details }
    }

    /// Sends the probe and records the outcome.
    ///
    /// A JSON-RPC error reply is a recorded failure, not an `Err`.
    ///
    /// # Errors
    ///
    /// Returns the [`SessionError`] when no reply could be obtained.
    pub fn run(
        self,
        session: &mut ServerSession,
        workload: &Workload,
    ) -> Result<BenchmarkResult, SessionError> {
        let params = self.params(workload).map_err(CodecError::from)?;
        let (response, elapsed) = session.send_request(self.method(), Some(params))?;
        let verdict = self.classify(&response, workload);
        Ok(BenchmarkResult::timed(
            self.operation(),
            session.name(),
            elapsed,
            verdict.success,
            verdict.details,
        ))
    }

    /// Records a probe that produced no reply.
    #[must_use]
    pub fn failed(self, server: &str, started: Instant, error: &SessionError) -> BenchmarkResult {
        BenchmarkResult::timed(
            self.operation(),
            server,
            started.elapsed(),
            false,
            error.to_string(),
        )
    }
}

fn list_len(response: &Response) -> usize {
    response
        .result
        .as_ref()
        .and_then(Value::as_array)
        .map_or(0, Vec::len)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use lspbench_client::{RequestId, ResponseError};
    use rstest::{fixture, rstest};
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::workload::{WorkloadSelector, WorkspaceRoot};

    #[fixture]
    fn workload() -> (TempDir, Workload) {
        let dir = TempDir::new().expect("create workspace");
        fs::write(dir.path().join("Lib.fs"), "module Lib\nlet greet name = name\n")
            .expect("write source");
        let root = WorkspaceRoot::open(dir.path()).expect("open workspace");
        let workload = WorkloadSelector::default().select(&root).expect("workload");
        (dir, workload)
    }

    fn reply(body: Value) -> Response {
        let mut message = json!({"jsonrpc": "2.0", "id": 1});
        if let (Some(target), Some(fields)) = (message.as_object_mut(), body.as_object()) {
            target.extend(fields.clone());
        }
        serde_json::from_value(message).expect("response")
    }

    #[rstest]
    #[case(Probe::Definition, json!({"result": {}}), true)]
    #[case(Probe::Definition, json!({"result": []}), true)]
    #[case(Probe::Definition, json!({"result": null}), false)]
    #[case(Probe::Definition, json!({}), false)]
    #[case(Probe::Hover, json!({"result": {"contents": ""}}), true)]
    #[case(Probe::Hover, json!({"result": null}), false)]
    #[case(Probe::WorkspaceSymbol(SymbolQuery::Prefix), json!({"result": []}), true)]
    #[case(Probe::WorkspaceSymbol(SymbolQuery::Prefix), json!({"result": null}), true)]
    #[case(Probe::References, json!({"result": []}), true)]
    #[case(Probe::References, json!({"error": {"code": -1, "message": "x"}}), false)]
    #[case(Probe::Completion, json!({"result": []}), true)]
    #[case(Probe::Completion, json!({"result": "unexpected"}), true)]
    fn success_rules(
        workload: (TempDir, Workload),
        #[case] probe: Probe,
        #[case] body: Value,
        #[case] expected: bool,
    ) {
        let (_dir, workload) = workload;

        let verdict = probe.classify(&reply(body), &workload);

        assert_eq!(verdict.success, expected);
    }

    #[rstest]
    #[case(json!([{"label": "a"}, {"label": "b"}]), "got 2 completions")]
    #[case(json!({"isIncomplete": false, "items": [{"label": "a"}]}), "got 1 completions")]
    #[case(json!({"isIncomplete": true}), "got 0 completions")]
    #[case(json!({"items": "broken"}), "got 0 completions")]
    #[case(json!(42), "got 0 completions")]
    #[case(Value::Null, "got 0 completions")]
    fn completion_counts_either_shape(
        workload: (TempDir, Workload),
        #[case] result: Value,
        #[case] details: &str,
    ) {
        let (_dir, workload) = workload;

        let verdict = Probe::Completion.classify(&reply(json!({"result": result})), &workload);

        assert!(verdict.success);
        assert_eq!(verdict.details, details);
    }

    #[rstest]
    fn details_report_counts_and_position(workload: (TempDir, Workload)) {
        let (_dir, workload) = workload;
        let symbols = reply(json!({"result": [{"name": "getUser"}, {"name": "getOrder"}]}));
        let references = reply(json!({"result": []}));

        assert_eq!(
            Probe::WorkspaceSymbol(SymbolQuery::Prefix)
                .classify(&symbols, &workload)
                .details,
            "query='get', found 2 symbols"
        );
        assert_eq!(
            Probe::References.classify(&references, &workload).details,
            "found 0 references"
        );
        assert_eq!(
            Probe::Definition.classify(&references, &workload).details,
            "line 0, col 7"
        );
    }

    #[rstest]
    fn error_message_is_appended(workload: (TempDir, Workload)) {
        let (_dir, workload) = workload;
        let response = Response {
            jsonrpc: String::from("2.0"),
            id: Some(RequestId::Number(1)),
            result: None,
            error: Some(ResponseError::new(-32603, "index not ready")),
        };

        let verdict = Probe::Definition.classify(&response, &workload);

        assert!(!verdict.success);
        assert_eq!(verdict.details, "line 0, col 7 - index not ready");
    }

    #[rstest]
    fn position_params_carry_workload(workload: (TempDir, Workload)) {
        let (_dir, workload) = workload;

        let params = Probe::References.params(&workload).expect("params");

        assert_eq!(params["position"], json!({"line": 0, "character": 7}));
        assert_eq!(params["context"], json!({"includeDeclaration": true}));
        assert_eq!(
            params["textDocument"]["uri"],
            json!(workload.uri().as_str())
        );
    }

    #[rstest]
    fn symbol_params_carry_query(workload: (TempDir, Workload)) {
        let (_dir, workload) = workload;

        let params = Probe::WorkspaceSymbol(SymbolQuery::Contains)
            .params(&workload)
            .expect("params");

        assert_eq!(params["query"], json!("Service"));
    }

    #[rstest]
    fn iteration_order_is_fixed() {
        let methods: Vec<&str> = ITERATION.iter().map(|probe| probe.method()).collect();

        assert_eq!(
            methods,
            [
                "textDocument/definition",
                "workspace/symbol",
                "workspace/symbol",
                "textDocument/references",
                "textDocument/hover",
                "textDocument/completion",
            ]
        );
    }
}

//! Session setup messages: `initialize`, `initialized` and `didOpen`.

use std::thread;
use std::time::Duration;

use lsp_types::{
    ClientCapabilities, ClientInfo, CompletionClientCapabilities, DidOpenTextDocumentParams,
    DynamicRegistrationClientCapabilities, GotoCapability, HoverClientCapabilities,
    InitializeParams, TextDocumentClientCapabilities, TextDocumentItem,
    WorkspaceClientCapabilities, WorkspaceFolder, WorkspaceSymbolClientCapabilities,
};
use lspbench_client::{CodecError, ServerSession, SessionError};
use serde_json::json;

use crate::workload::{Workload, WorkspaceRoot};

/// Builds the `initialize` parameters for `root`.
#[expect(deprecated, reason = "root_uri and root_path kept for older servers")]
#[must_use]
pub fn initialize_params(root: &WorkspaceRoot) -> InitializeParams {
    InitializeParams {
        process_id: Some(std::process::id()),
        root_path: Some(root.path().to_string_lossy().into_owned()),
        root_uri: Some(root.uri().clone()),
        capabilities: client_capabilities(),
        workspace_folders: Some(vec![WorkspaceFolder {
            uri: root.uri().clone(),
            name: root.name().to_owned(),
        }]),
        client_info: Some(ClientInfo {
            name: String::from(env!("CARGO_PKG_NAME")),
            version: Some(String::from(env!("CARGO_PKG_VERSION"))),
        }),
        ..Default::default()
    }
}

/// Advertises static support for every benchmarked request.
fn client_capabilities() -> ClientCapabilities {
    ClientCapabilities {
        text_document: Some(TextDocumentClientCapabilities {
            definition: Some(GotoCapability {
                dynamic_registration: Some(false),
                link_support: None,
            }),
            references: Some(DynamicRegistrationClientCapabilities {
                dynamic_registration: Some(false),
            }),
            hover: Some(HoverClientCapabilities {
                dynamic_registration: Some(false),
                content_format: None,
            }),
            completion: Some(CompletionClientCapabilities {
                dynamic_registration: Some(false),
                ..Default::default()
            }),
            ..Default::default()
        }),
        workspace: Some(WorkspaceClientCapabilities {
            symbol: Some(WorkspaceSymbolClientCapabilities {
                dynamic_registration: Some(false),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Sends `initialize` and `initialized`, then waits `settle`.
///
/// Returns the `initialize` round trip. An error reply still completes the
/// handshake; only a missing reply fails it.
///
/// # Errors
///
/// Returns the [`SessionError`] that prevented the exchange.
pub fn handshake(
    session: &mut ServerSession,
    root: &WorkspaceRoot,
    settle: Duration,
) -> Result<Duration, SessionError> {
    let params = serde_json::to_value(initialize_params(root)).map_err(CodecError::from)?;
    let (_, elapsed) = session.send_request("initialize", Some(params))?;
    session.send_notification("initialized", Some(json!({})))?;
    thread::sleep(settle);
    Ok(elapsed)
}

/// Sends `textDocument/didOpen` with the full workload text, then waits
/// `settle`.
///
/// # Errors
///
/// Returns the [`SessionError`] when the notification cannot be written.
pub fn open_document(
    session: &mut ServerSession,
    workload: &Workload,
    settle: Duration,
) -> Result<(), SessionError> {
    let params = DidOpenTextDocumentParams {
        text_document: TextDocumentItem::new(
            workload.uri().clone(),
            workload.language_id().to_owned(),
            1,
            workload.text().to_owned(),
        ),
    };
    let params = serde_json::to_value(params).map_err(CodecError::from)?;
    session.send_notification("textDocument/didOpen", Some(params))?;
    thread::sleep(settle);
    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use tempfile::TempDir;

    use super::*;

    #[rstest]
    fn initialize_params_describe_workspace() {
        let dir = TempDir::new().expect("create workspace");
        let root = WorkspaceRoot::open(dir.path()).expect("open workspace");

        let params = serde_json::to_value(initialize_params(&root)).expect("serialise");

        assert_eq!(params["rootUri"], json!(root.uri().as_str()));
        assert_eq!(params["workspaceFolders"][0]["name"], json!(root.name()));
        assert_eq!(params["processId"], json!(std::process::id()));
        assert_eq!(
            params["capabilities"]["textDocument"]["definition"]["dynamicRegistration"],
            json!(false)
        );
        assert_eq!(
            params["capabilities"]["workspace"]["symbol"]["dynamicRegistration"],
            json!(false)
        );
    }
}

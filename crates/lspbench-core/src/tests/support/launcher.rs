//! Launcher that connects to in-process fake servers.

use std::collections::HashMap;
use std::io;
use std::time::{Duration, Instant};

use lspbench_client::testing::{FakeServer, FakeServerHandle};
use lspbench_client::{ServerSession, SessionOptions, SupervisorError};

use crate::orchestrator::{ServerLauncher, ServerSpec};

/// Starts a clone of the scripted server registered under the spec's name.
///
/// Names without a script behave like a missing binary.
#[derive(Debug, Default)]
pub struct ScriptedLauncher {
    scripts: HashMap<String, FakeServer>,
    handles: Vec<FakeServerHandle>,
}

impl ScriptedLauncher {
    pub fn register(&mut self, name: &str, server: FakeServer) {
        self.scripts.insert(name.to_owned(), server);
    }

    /// Methods received by every launched server, in launch order.
    pub fn methods(&mut self) -> Vec<Vec<String>> {
        self.handles
            .iter_mut()
            .map(|handle| {
                handle.join();
                handle.methods()
            })
            .collect()
    }
}

impl ServerLauncher for ScriptedLauncher {
    fn launch(
        &mut self,
        spec: &ServerSpec,
        options: SessionOptions,
    ) -> Result<(ServerSession, Duration), SupervisorError> {
        let Some(server) = self.scripts.get(&spec.name).cloned() else {
            return Err(SupervisorError::BinaryNotFound {
                command: spec.name.clone(),
                source: io::Error::from(io::ErrorKind::NotFound),
            });
        };
        let started = Instant::now();
        let (session, handle) =
            server
                .connect(&spec.name, options)
                .map_err(|source| SupervisorError::SpawnFailed {
                    message: String::from("fake server did not start"),
                    source,
                })?;
        self.handles.push(handle);
        Ok((session, started.elapsed()))
    }
}

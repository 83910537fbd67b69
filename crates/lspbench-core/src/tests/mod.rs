//! Orchestrator tests over scripted fake servers.

mod support;

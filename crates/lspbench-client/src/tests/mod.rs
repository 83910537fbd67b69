//! Session tests against the scripted fake server and real processes.

mod process;

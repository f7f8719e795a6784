//! Core modules: the registry client, URL resolution, descriptor assembly,
//! and the shared error, config and output plumbing they sit on.

pub mod config;
pub mod descriptor;
pub mod error;
pub mod instance;
pub mod output;
pub mod probe;
pub mod redact;
pub mod registry;
pub mod resolve;

//! # lmdash-cli
//!
//! The `lmdash` command line: model management, comparisons, capability
//! probes and retrieval corpora against a local Ollama server.

pub mod cli;
pub mod commands;
pub mod output;
pub mod settings;

pub use cli::{Cli, Commands, CorpusCommands, GenerationArgs, GlobalArgs, ModelCommands};
pub use commands::run;
pub use settings::Settings;

//! LLM backend, configuration and run history for agentflow
//!
//! - [`llm`]: the `Llm` trait, the Ollama client and JSON extraction helpers
//! - [`config`]: `.agentflow.toml` discovery and parsing
//! - [`db`]: SQLite storage of finished runs for later replay

pub mod config;
pub mod db;
pub mod llm;

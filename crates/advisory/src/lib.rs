//! Advisory gate: prompts an LLM about entries and trailing exits and reads
//! its answers fail-closed.

pub mod client;
pub mod parse;
pub mod prompt;
pub mod types;

pub use client::GeminiAdvisor;
pub use parse::{parse_decision, parse_exit};

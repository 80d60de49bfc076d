//! LLM module: generation provider contract and the Gemini HTTP client
//!
//! This module provides:
//! - `GenerationProvider`, the listing + generation seam the catalog and engine consume
//! - `GenerationError`, the provider failure taxonomy (quota / not found / permission / other)
//! - `GeminiConfig`, `GeminiClient` for talking to the Gemini `generativelanguage` REST API

mod gemini;
mod provider;

pub use gemini::{classify_error, GeminiClient, GeminiConfig};
pub use provider::{GenerationError, GenerationProvider};

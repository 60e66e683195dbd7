// src/analyze/mod.rs
//! Text generation: the completion client and the summarizer built on it.

pub mod ai_adapter;
pub mod summarize;

pub use crate::analyze::ai_adapter::{CompletionClient, DynCompletion};
pub use crate::analyze::summarize::{fit_to_budget, Summarizer};

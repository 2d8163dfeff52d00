//! The extraction pipeline: PDF text retrieval, prompt construction, backend
//! invocation with a bounded fail-fast retry policy, and per-document batch
//! error isolation.

pub mod handlers;
pub mod pdf;
pub mod prompts;
pub mod service;

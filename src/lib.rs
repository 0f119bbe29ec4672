//! sysdesign-gen: system design interview questions from a pluggable LLM backend.
//!
//! A backend is either a hosted chat-completion API or a llama.cpp shared
//! library loaded at runtime. [`backend::create`] validates the configuration
//! and builds one; [`generator::QuestionGenerator`] drives it for a question
//! and its hints and writes both to disk.

pub mod backend;
pub mod config;
pub mod generator;

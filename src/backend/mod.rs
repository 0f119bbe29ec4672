//! Pluggable text-generation backends.
//!
//! - [`remote`]: hosted chat-completion API over HTTP
//! - [`native`]: llama.cpp loaded from `~/.llama/lib`
//! - [`factory`]: validates a configuration string and builds the matching backend
//!
//! Callers only see [`GenerationBackend::generate`]; the kind of backend is
//! decided once, in [`factory::create`].

pub mod factory;
pub mod native;
pub mod remote;

use std::error::Error as StdError;
use std::fmt;

use async_trait::async_trait;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::runtime::RuntimeFlavor;

pub use factory::create;
pub use native::NativeBackend;
pub use remote::RemoteBackend;

/// System instruction prepended to every prompt.
pub const SYSTEM_PROMPT: &str = "You are a senior system design interviewer at FAANG companies.";

#[derive(Error, Debug)]
pub enum BackendError {
    /// A precondition failed before any engine resource was touched.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A validated engine failed during initialization, loading or generation.
    #[error("Generation failed: {context}: {source}")]
    Generation {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl BackendError {
    pub fn generation(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Generation {
            context: context.into(),
            source: Box::new(source),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

/// Which backend to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Hosted chat-completion API (config is an API key).
    #[value(alias = "openai")]
    Remote,
    /// Local llama.cpp library (config is a model file path).
    #[value(alias = "llama")]
    Native,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Remote => write!(f, "remote"),
            BackendKind::Native => write!(f, "native"),
        }
    }
}

/// Produce text from a prompt.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Run a single generation. Failures surface immediately; nothing is retried.
    async fn generate(&self, prompt: &str) -> Result<String, BackendError>;
}

/// The backend built by the factory.
#[derive(Debug)]
pub enum Backend {
    Remote(RemoteBackend),
    Native(NativeBackend),
}

impl Backend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Remote(_) => BackendKind::Remote,
            Backend::Native(_) => BackendKind::Native,
        }
    }
}

#[async_trait]
impl GenerationBackend for Backend {
    async fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        match self {
            Backend::Remote(remote) => remote.generate(prompt).await,
            Backend::Native(native) => native.generate(prompt).await,
        }
    }
}

#[async_trait]
impl GenerationBackend for RemoteBackend {
    async fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        RemoteBackend::generate(self, prompt).await
    }
}

#[async_trait]
impl GenerationBackend for NativeBackend {
    async fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        // The model handle never crosses an await point. On a multi-threaded
        // runtime the worker hands its other tasks off while generation blocks.
        run_blocking(|| self.generate_blocking(prompt))
    }
}

/// Run `f` on the current thread, marking it blocking when the runtime
/// allows it. `block_in_place` panics on a current-thread runtime.
fn run_blocking<T>(f: impl FnOnce() -> T) -> T {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "deadline elapsed");
        let err = BackendError::generation("request failed", io);
        assert!(!err.is_configuration());
        assert!(err.to_string().contains("request failed"));
        assert!(err.source().unwrap().to_string().contains("deadline elapsed"));
    }

    #[test]
    fn test_backend_kind_aliases() {
        assert_eq!(BackendKind::from_str("openai", true).unwrap(), BackendKind::Remote);
        assert_eq!(BackendKind::from_str("llama", true).unwrap(), BackendKind::Native);
        assert_eq!(BackendKind::Native.to_string(), "native");
    }

    #[test]
    fn test_run_blocking_outside_runtime() {
        assert_eq!(run_blocking(|| 7), 7);
    }

    #[tokio::test]
    async fn test_run_blocking_on_current_thread_runtime() {
        assert_eq!(run_blocking(|| "inline"), "inline");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_blocking_on_multi_thread_runtime() {
        let caller = std::thread::current().id();
        let ran_on = run_blocking(|| std::thread::current().id());
        assert_eq!(ran_on, caller);
    }
}

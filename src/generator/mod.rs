//! Question generation.
//!
//! - [`domain`]: problem domains
//! - [`prompt`]: prompt text and package naming
//! - [`scaffold`]: writes the question directory
//!
//! [`QuestionGenerator`] makes exactly two sequential backend calls (question,
//! then hints for that question) and writes nothing unless both succeed.

pub mod domain;
pub mod prompt;
pub mod scaffold;

use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

use crate::backend::{BackendError, GenerationBackend};
use domain::Domain;
use prompt::{hints_prompt, package_name, question_prompt};
use scaffold::{ScaffoldError, Scaffolder};

#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Failed to write question files: {0}")]
    Scaffold(#[from] ScaffoldError),
}

/// A question written to disk.
#[derive(Debug, Clone)]
pub struct GeneratedQuestion {
    pub domain: Domain,
    pub package: String,
    pub directory: PathBuf,
    pub question: String,
    pub hints: String,
}

pub struct QuestionGenerator<B> {
    backend: B,
    scaffold: Scaffolder,
}

impl<B: GenerationBackend> QuestionGenerator<B> {
    pub fn new(backend: B, scaffold: Scaffolder) -> Self {
        Self { backend, scaffold }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Generate one question with hints for `domain` and write it out.
    pub async fn generate_question(
        &self,
        domain: Domain,
    ) -> Result<GeneratedQuestion, GeneratorError> {
        info!(domain = %domain, "Generating question");
        let question = self.backend.generate(&question_prompt(domain)).await?;

        info!(domain = %domain, "Generating hints");
        let hints = self.backend.generate(&hints_prompt(&question)).await?;

        let package = package_name(&question);
        let directory = self
            .scaffold
            .write(domain, &package, &question, &hints)
            .await?;

        Ok(GeneratedQuestion {
            domain,
            package,
            directory,
            question,
            hints,
        })
    }
}

//! On-disk layout for a generated question.
//!
//! ```text
//! <root>/<domain>/<package>/
//!     README.md     question
//!     HINTS.md      hints
//!     solution.rs   empty solution stub
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

use crate::config::OutputConfig;
use crate::generator::domain::Domain;

#[derive(Error, Debug)]
pub enum ScaffoldError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Question already exists at {0} (overwrite disabled)")]
    AlreadyExists(PathBuf),
}

pub const QUESTION_FILE: &str = "README.md";
pub const HINTS_FILE: &str = "HINTS.md";
pub const SOLUTION_FILE: &str = "solution.rs";

/// Writes question directories under a root.
#[derive(Debug, Clone)]
pub struct Scaffolder {
    /// Root directory for all domains.
    root: PathBuf,

    /// Replace files of an existing question with the same package name.
    overwrite: bool,
}

impl Scaffolder {
    pub fn new(config: &OutputConfig) -> Self {
        Self {
            root: config.root.clone(),
            overwrite: config.overwrite,
        }
    }

    /// Directory a question with `package` in `domain` is written to.
    pub fn question_dir(&self, domain: Domain, package: &str) -> PathBuf {
        self.root.join(domain.slug()).join(package)
    }

    /// Create the question directory and its three files. Returns the directory.
    pub async fn write(
        &self,
        domain: Domain,
        package: &str,
        question: &str,
        hints: &str,
    ) -> Result<PathBuf, ScaffoldError> {
        let dir = self.question_dir(domain, package);

        if !self.overwrite && fs::try_exists(dir.join(QUESTION_FILE)).await.unwrap_or(false) {
            return Err(ScaffoldError::AlreadyExists(dir));
        }

        fs::create_dir_all(&dir).await.map_err(|source| ScaffoldError::Io {
            path: dir.clone(),
            source,
        })?;

        write_file(&dir.join(QUESTION_FILE), question).await?;
        write_file(&dir.join(HINTS_FILE), hints).await?;
        write_file(&dir.join(SOLUTION_FILE), &solution_stub(domain, package)).await?;

        info!(dir = %dir.display(), "Question files written");
        Ok(dir)
    }
}

async fn write_file(path: &Path, contents: &str) -> Result<(), ScaffoldError> {
    fs::write(path, contents)
        .await
        .map_err(|source| ScaffoldError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    debug!(path = %path.display(), bytes = contents.len(), "Wrote file");
    Ok(())
}

/// Solution file the candidate starts from.
pub fn solution_stub(domain: Domain, package: &str) -> String {
    format!(
        r#"//! Solution for `{package}` ({description}).
//!
//! The question is in README.md next to this file; HINTS.md has hints.
//! Implement your design here.

pub struct Solution;
"#,
        description = domain.description(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn scaffolder(root: &Path, overwrite: bool) -> Scaffolder {
        Scaffolder::new(&OutputConfig {
            root: root.to_path_buf(),
            overwrite,
        })
    }

    #[tokio::test]
    async fn test_write_creates_layout() {
        let tmp = tempdir().unwrap();
        let scaffold = scaffolder(tmp.path(), true);

        let dir = scaffold
            .write(Domain::VideoStreaming, "design_a_cdn", "# Q", "# H")
            .await
            .unwrap();

        assert_eq!(dir, tmp.path().join("video_streaming").join("design_a_cdn"));
        assert_eq!(std::fs::read_to_string(dir.join(QUESTION_FILE)).unwrap(), "# Q");
        assert_eq!(std::fs::read_to_string(dir.join(HINTS_FILE)).unwrap(), "# H");
        let stub = std::fs::read_to_string(dir.join(SOLUTION_FILE)).unwrap();
        assert!(stub.contains("design_a_cdn"));
        assert!(stub.contains("Video streaming platforms like Netflix"));
    }

    #[tokio::test]
    async fn test_overwrite_disabled() {
        let tmp = tempdir().unwrap();
        let scaffold = scaffolder(tmp.path(), false);

        scaffold.write(Domain::Apple, "icloud", "first", "h").await.unwrap();
        let err = scaffold
            .write(Domain::Apple, "icloud", "second", "h")
            .await
            .unwrap_err();
        assert!(matches!(err, ScaffoldError::AlreadyExists(_)));

        let readme = tmp.path().join("apple/icloud").join(QUESTION_FILE);
        assert_eq!(std::fs::read_to_string(readme).unwrap(), "first");
    }

    #[tokio::test]
    async fn test_overwrite_enabled() {
        let tmp = tempdir().unwrap();
        let scaffold = scaffolder(tmp.path(), true);

        scaffold.write(Domain::Generic, "kv", "first", "h").await.unwrap();
        let dir = scaffold.write(Domain::Generic, "kv", "second", "h").await.unwrap();
        assert_eq!(std::fs::read_to_string(dir.join(QUESTION_FILE)).unwrap(), "second");
    }
}

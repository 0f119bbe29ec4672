//! Runtime configuration for sysdesign-gen.
//!
//! What to generate comes from the command line; where to put it comes from an
//! optional JSON settings file. Backend constants (endpoint, timeout,
//! sampling parameters) are fixed in the backend modules.

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::backend::BackendKind;
use crate::generator::domain::Domain;

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "sysdesign-gen",
    about = "Generate system design interview questions and hints with an LLM"
)]
pub struct Cli {
    /// Backend to generate with.
    #[arg(value_enum)]
    pub backend: BackendKind,

    /// API key (remote) or path to a GGUF model file (native).
    pub config: String,

    /// Problem domain.
    #[arg(value_enum)]
    pub domain: Domain,

    /// Path to settings file (JSON).
    #[arg(short, long, default_value = "sysdesign-gen.json")]
    pub settings: PathBuf,

    /// Output root, overriding the settings file.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Top-level settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Where question files are written.
    #[serde(default)]
    pub output: OutputConfig,
}

/// Output location settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root directory; questions land in `<root>/<domain>/<package>/`.
    #[serde(default = "default_output_root")]
    pub root: PathBuf,

    /// Replace an existing question with the same package name.
    #[serde(default = "default_overwrite")]
    pub overwrite: bool,
}

fn default_output_root() -> PathBuf {
    PathBuf::from("lab-solutions")
}

fn default_overwrite() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: default_output_root(),
            overwrite: default_overwrite(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let settings: Settings = serde_json::from_str(&data)?;
            Ok(settings)
        } else {
            tracing::warn!("Settings file not found at {:?}, using defaults", path);
            Ok(Settings::default())
        }
    }

    /// Apply command-line overrides.
    pub fn with_cli(mut self, cli: &Cli) -> Self {
        if let Some(dir) = &cli.output_dir {
            self.output.root = dir.clone();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.output.root, PathBuf::from("lab-solutions"));
        assert!(settings.output.overwrite);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings.output.root, PathBuf::from("lab-solutions"));
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"output": {"overwrite": false}}"#).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert!(!settings.output.overwrite);
        assert_eq!(settings.output.root, PathBuf::from("lab-solutions"));
    }

    #[test]
    fn test_cli_parse_and_override() {
        let cli = Cli::try_parse_from([
            "sysdesign-gen",
            "openai",
            "sk-abc",
            "video-streaming",
            "--output-dir",
            "/tmp/out",
        ])
        .unwrap();
        assert_eq!(cli.backend, BackendKind::Remote);
        assert_eq!(cli.domain, Domain::VideoStreaming);

        let settings = Settings::default().with_cli(&cli);
        assert_eq!(settings.output.root, PathBuf::from("/tmp/out"));
    }
}

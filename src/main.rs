//! sysdesign-gen: generate a system design interview question and hints.
//!
//! ```text
//! sysdesign-gen remote sk-... ecommerce
//! sysdesign-gen native ~/models/qwen2.5-7b.gguf generic
//! ```

use clap::Parser;
use tracing::info;

use sysdesign_gen::backend;
use sysdesign_gen::config::{Cli, Settings};
use sysdesign_gen::generator::scaffold::Scaffolder;
use sysdesign_gen::generator::QuestionGenerator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "sysdesign_gen=debug"
    } else {
        "sysdesign_gen=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .init();

    info!("sysdesign-gen v{}", env!("CARGO_PKG_VERSION"));

    // Load settings.
    let settings = Settings::load(&cli.settings)?.with_cli(&cli);
    info!(
        backend = %cli.backend,
        domain = %cli.domain,
        output = %settings.output.root.display(),
        "Configuration loaded"
    );

    let backend = backend::create(cli.backend, &cli.config)?;
    let generator = QuestionGenerator::new(backend, Scaffolder::new(&settings.output));

    let generated = generator.generate_question(cli.domain).await?;

    println!(
        "Generated question for domain {} in {}",
        generated.domain,
        generated.directory.display()
    );

    Ok(())
}

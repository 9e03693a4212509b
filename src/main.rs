use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use magma_packager::config::{Cli, Command, Config};
use magma_packager::exec::runner::SystemRunner;
use magma_packager::package::clean::clean;
use magma_packager::pipeline::Pipeline;
use magma_packager::toolchain::env::ProcessEnv;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "magma_packager=debug"
    } else {
        "magma_packager=info"
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .with_writer(std::io::stderr);

    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!("magma-packager v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration.
    let mut config = Config::load(&cli.config)?;
    if let Some(root) = cli.root {
        config.root_dir = root;
    }
    config.root_dir = std::path::absolute(&config.root_dir)?;

    info!(root = %config.root_dir.display(), package = %config.package.name, "Configuration loaded");

    let env = ProcessEnv;
    let runner = SystemRunner;
    let pipeline = Pipeline::new(&config, &env, &runner);

    match cli.command {
        Command::Build { staging_dir, json } => {
            let staging = staging_dir
                .map(|dir| config.root_dir.join(dir))
                .unwrap_or_else(|| config.default_staging_dir());

            let report = pipeline.run(&staging).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{} {} ({})", report.package, report.version, report.backend);
                println!("  library:  {}", report.library_path.display());
                println!("  headers:  {} -> {}", report.headers_copied, report.layout.include_dir.display());
                println!("  manifest: {}", report.manifest.display());
            }
        }
        Command::Version => {
            let backend = pipeline.detect();
            let version = pipeline.version(backend).await;
            match version.commit_sha {
                Some(ref sha) => println!("{version} ({sha})"),
                None => println!("{version}"),
            }
        }
        Command::Detect => {
            println!("{}", pipeline.detect());
        }
        Command::Clean => {
            let removed: Vec<PathBuf> = clean(&config).await?;
            info!(count = removed.len(), "Clean finished");
        }
    }

    Ok(())
}

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use omniscribe::cli::{Cli, Commands};
use omniscribe::config::Config;
use omniscribe::pipeline::{Job, Pipeline};
use omniscribe::sources::SourceRegistry;
use omniscribe::utils;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose {
        "omniscribe=debug"
    } else {
        "omniscribe=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Check for required external tools (non-fatal)
    let missing_deps = utils::check_dependencies().await;
    if !missing_deps.is_empty() {
        eprintln!("Dependency check warnings:");
        for dep in missing_deps {
            eprintln!("  - {}", dep);
        }
        eprintln!("  (continuing anyway - some sources may not work)");
    }

    match cli.command {
        Commands::Transcribe {
            reference,
            source,
            language,
            output_dir,
            format,
            summarize,
            keep_audio,
        } => {
            let config = Config::load().await?;
            let job = Job {
                source,
                reference,
                target_language: language,
                format,
                summarize,
                keep_audio: keep_audio || config.app.keep_audio,
                output_dir: output_dir.unwrap_or_else(|| config.app.output_dir.clone()),
            };

            let pipeline = Pipeline::new(config, cli.quiet)?;
            let outcome = pipeline.run(&job).await?;

            println!(
                "Transcription complete ({} detected).",
                outcome.transcript.language
            );
            for path in &outcome.exported {
                println!("  saved: {}", path.display());
            }
            if let Some(audio) = &outcome.kept_audio {
                println!("  audio: {}", audio.display());
            }
        }
        Commands::Config { show } => {
            let config = Config::load().await?;
            if show {
                config.display();
            } else {
                config.save().await?;
                println!("Configuration written. Edit it to change models or limits.");
            }
        }
        Commands::Platforms => {
            println!("Supported sources:");
            for kind in SourceRegistry::new().list_platforms() {
                println!("  - {}", kind);
            }
        }
    }

    Ok(())
}

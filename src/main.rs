mod cli;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands};
use relevancy::model::Manifest;
use relevancy::{server, Config, Error, Resolver};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("failed to load configuration")?;

    match cli.command {
        Commands::Available => {
            let availability = relevancy::available_transformer_model();
            println!("{}", serde_json::to_string_pretty(availability)?);
        }

        Commands::Pull { model, size } => {
            let resolver = Resolver::from_config(&config);
            let classifier = resolver
                .resolve(&model, &size, true)
                .with_context(|| format!("failed to pull {} {}", model, size))?;

            let manifest = Manifest::load(&config.manifest_path)?;
            let installed = manifest.get(relevancy::registry::TASK, classifier.model(), classifier.size())?;

            println!("✓ Successfully pulled {} ({})", installed.model, installed.size);
            println!("  Repository: {}", installed.repo_id);
            println!("  Path: {:?}", installed.model_path);
            println!("  Labels: {}", classifier.labels().join(", "));
        }

        Commands::Predict {
            text,
            model,
            size,
            no_validate,
        } => {
            if text.is_empty() {
                return Err(Error::InvalidInput(
                    "No text provided. Use --text \"your text\"".to_string(),
                )
                .into());
            }

            let mut classifier = relevancy::transformer(&config, &model, &size, !no_validate)?;

            tracing::info!("Classifying {} texts", text.len());
            let predictions = classifier.predict(&text)?;

            let output = serde_json::json!({
                "model": classifier.model(),
                "size": classifier.size(),
                "labels": classifier.labels(),
                "predictions": predictions,
            });

            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Commands::Installed => {
            let manifest = Manifest::load(&config.manifest_path)?;
            let models = manifest.list();

            if models.is_empty() {
                println!("No classifiers installed.");
                println!("Use 'relevancy pull --model <model> --size <size>' to fetch one.");
            } else {
                println!("Installed classifiers:\n");
                for model in models {
                    println!("  {}", model.key());
                    println!("    Repository: {}", model.repo_id);
                    println!("    Path: {:?}", model.model_path);
                    println!("    Fetched: {}", model.fetched_at);
                    println!();
                }
            }
        }

        Commands::Serve { port, host } => {
            let state = server::AppState::new(&config);

            println!("🚀 Relevancy server starting...");
            println!("   Listening on: http://{}:{}", host, port);
            println!("   Health: http://{}:{}/api/health", host, port);
            println!("   Available: http://{}:{}/api/available", host, port);
            println!("   Predict: http://{}:{}/api/predict", host, port);
            println!("\n   Classifiers will be loaded on-demand when requested via API");

            server::serve(&host, port, state).await?;
        }
    }

    Ok(())
}

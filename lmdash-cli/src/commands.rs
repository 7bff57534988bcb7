use std::sync::Arc;

use anyhow::{Context, Result};
use lmdash_model::{
    ComparisonRunner, GenerationOptions, ModelBackend, check_function_calling,
    check_json_handling,
};
use lmdash_rag::{list_corpus_sources, read_documents};
use tracing::{info, warn};

use crate::cli::{Cli, Commands, CorpusCommands, ModelCommands};
use crate::output;
use crate::settings::Settings;

/// Execute a parsed command line, printing results to stdout.
pub async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::from_args(&cli.global)?;
    info!(ollama_url = %settings.ollama.base_url, "starting lmdash");

    match cli.command {
        Commands::Models(command) => run_models(&settings, command).await,
        Commands::Compare { models, prompt, probe, code_only, generation } => {
            let options = GenerationOptions::from(&generation);
            let client = Arc::new(settings.client()?);
            let runner = ComparisonRunner::new(client.clone());
            let report = runner.compare(&models, &prompt, &options).await?;
            print!("{}", output::comparison(&report, code_only));
            if probe {
                for model in &models {
                    print_probe(client.as_ref(), model, &options).await?;
                }
            }
            Ok(())
        }
        Commands::Vision { models, image, generation } => {
            let bytes = std::fs::read(&image)
                .with_context(|| format!("failed to read image {}", image.display()))?;
            let runner = ComparisonRunner::new(Arc::new(settings.client()?));
            let report =
                runner.compare_vision(&models, &bytes, &GenerationOptions::from(&generation)).await?;
            print!("{}", output::comparison(&report, false));
            Ok(())
        }
        Commands::Context { model, prompts, generation } => {
            let runner = ComparisonRunner::new(Arc::new(settings.client()?));
            let turns =
                runner.contextual(&model, &prompts, &GenerationOptions::from(&generation)).await?;
            print!("{}", output::contextual(&model, &turns));
            Ok(())
        }
        Commands::Probe { model, generation } => {
            let client = settings.client()?;
            print_probe(&client, &model, &GenerationOptions::from(&generation)).await
        }
        Commands::Corpus(command) => run_corpus(&settings, command).await,
    }
}

async fn print_probe(
    backend: &dyn ModelBackend,
    model: &str,
    options: &GenerationOptions,
) -> Result<()> {
    let json = check_json_handling(backend, model, options)
        .await
        .with_context(|| format!("JSON probe failed for {model}"))?;
    let tools = check_function_calling(backend, model, options)
        .await
        .with_context(|| format!("function-calling probe failed for {model}"))?;
    print!("{}", output::probe(model, json, tools));
    Ok(())
}

async fn run_models(settings: &Settings, command: ModelCommands) -> Result<()> {
    let client = settings.client()?;
    match command {
        ModelCommands::List => {
            print!("{}", output::models(&client.list_models().await?));
        }
        ModelCommands::Pull { name } => {
            for status in client.pull_model(&name).await? {
                println!("{status}");
            }
        }
        ModelCommands::Show { name } => {
            let details = client.show_model(&name).await?;
            println!("{}", serde_json::to_string_pretty(&details)?);
        }
        ModelCommands::Remove { name } => {
            client.remove_model(&name).await?;
            println!("Removed {name}");
        }
        ModelCommands::Update => {
            print!("{}", output::updates(&client.update_models().await?));
        }
    }
    Ok(())
}

async fn run_corpus(settings: &Settings, command: CorpusCommands) -> Result<()> {
    let manager = settings.corpus_manager()?;
    match command {
        CorpusCommands::List => {
            let manifests: Vec<_> = manager
                .list_corpora()?
                .iter()
                .filter_map(|name| match manager.manifest(name) {
                    Ok(manifest) => Some(manifest),
                    Err(e) => {
                        warn!(corpus = %name, error = %e, "skipping unreadable corpus");
                        None
                    }
                })
                .collect();
            print!("{}", output::corpora(&manifests));
        }
        CorpusCommands::Files => {
            for file in list_corpus_sources(&settings.files_root)? {
                println!("{file}");
            }
        }
        CorpusCommands::Build { name, files } => {
            let manifest = manager.build_corpus_from_files(&name, &settings.files_root, &files).await?;
            println!("Built corpus {} with {} segments", manifest.name, manifest.segment_count);
        }
        CorpusCommands::Rebuild { name, files } => {
            let documents = read_documents(&settings.files_root, &files)?;
            let manifest = manager.rebuild_corpus(&name, &documents).await?;
            println!("Rebuilt corpus {} with {} segments", manifest.name, manifest.segment_count);
        }
        CorpusCommands::Query { name, query, k } => {
            print!("{}", output::hits(&manager.query_corpus(&name, &query, k).await?));
        }
        CorpusCommands::Delete { name } => {
            manager.delete_corpus(&name).await?;
            println!("Deleted corpus {name}");
        }
        CorpusCommands::Rename { old_name, new_name } => {
            manager.rename_corpus(&old_name, &new_name).await?;
            println!("Renamed corpus {old_name} to {new_name}");
        }
    }
    Ok(())
}

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use geolens_candidates::CandidateGenerator;
use geolens_catalog::Catalog;
use geolens_engine::MemoryStorage;
use geolens_pipeline::{Pipeline, QueryRequest, ScriptedModel};
use geolens_protocol::{ModelDecision, Viewport};

#[derive(Parser)]
#[command(name = "geolens")]
#[command(about = "Natural-language geographic data queries", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,

    /// Path to the catalog file (TOML)
    #[arg(long, global = true, default_value = "catalog.toml")]
    catalog: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the scored candidate set for a query
    Candidates {
        query: String,

        /// Viewport as "west,south,east,north"
        #[arg(long)]
        viewport: Option<String>,
    },

    /// Run a query through the full pipeline
    Query {
        query: String,

        /// Viewport as "west,south,east,north"
        #[arg(long)]
        viewport: Option<String>,

        /// JSON file with scripted model decisions, replayed in order
        #[arg(long)]
        script: Option<PathBuf>,
    },

    /// Summarize the loaded catalog
    Catalog,
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn parse_viewport(raw: Option<&str>) -> Result<Option<Viewport>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let parts: Vec<f64> = raw
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("invalid viewport '{raw}'"))?;
    anyhow::ensure!(
        parts.len() == 4,
        "viewport must be west,south,east,north (got {} values)",
        parts.len()
    );
    Ok(Some(Viewport::new(parts[0], parts[1], parts[2], parts[3])))
}

fn load_script(path: Option<&PathBuf>) -> Result<Vec<ModelDecision>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read script {}", path.display()))?;
    serde_json::from_str(&raw).context("script must be a JSON array of model decisions")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let catalog = Arc::new(
        Catalog::load(&cli.catalog)
            .with_context(|| format!("failed to load catalog {}", cli.catalog.display()))?,
    );
    log::info!("catalog loaded from {}", cli.catalog.display());

    match cli.command {
        Commands::Candidates { query, viewport } => {
            let viewport = parse_viewport(viewport.as_deref())?;
            let generator = CandidateGenerator::new(catalog);
            let set = generator.generate(&query, viewport.as_ref());
            println!("{}", serde_json::to_string_pretty(&set)?);
        }
        Commands::Query {
            query,
            viewport,
            script,
        } => {
            let decisions = load_script(script.as_ref())?;
            let model = Arc::new(ScriptedModel::new(decisions));
            let storage = Arc::new(MemoryStorage::new());
            let pipeline = Pipeline::new(catalog, model, storage);

            let mut request = QueryRequest::new(query);
            request.viewport = parse_viewport(viewport.as_deref())?;
            let response = pipeline.run(&request).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Catalog => {
            let mut summary = serde_json::Map::new();
            let sources: Vec<serde_json::Value> = catalog
                .sources()
                .map(|(id, def)| {
                    serde_json::json!({
                        "id": id,
                        "name": def.name,
                        "metrics": def.metrics,
                        "event_files": def.events.keys().collect::<Vec<_>>(),
                    })
                })
                .collect();
            summary.insert("sources".into(), sources.into());
            summary.insert(
                "regions".into(),
                catalog.region_names().cloned().collect::<Vec<_>>().into(),
            );
            summary.insert("locations".into(), catalog.locations().len().into());
            summary.insert("reference_docs".into(), catalog.reference_docs().len().into());
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_parses_four_values() {
        let vp = parse_viewport(Some("-10.0, 40.0, 10.0, 60.0")).unwrap().unwrap();
        assert_eq!(vp.west, -10.0);
        assert_eq!(vp.north, 60.0);
    }

    #[test]
    fn viewport_rejects_wrong_arity() {
        assert!(parse_viewport(Some("1,2,3")).is_err());
        assert!(parse_viewport(Some("a,b,c,d")).is_err());
    }

    #[test]
    fn missing_script_means_empty_decision_list() {
        assert!(load_script(None).unwrap().is_empty());
    }
}

//! LexMap CLI entry point

use std::fs;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use lexmap_engine::cli::{BuildArgs, Cli, Commands, EntityArgs, OutputFormat, PathArgs, SearchArgs};
use lexmap_engine::{
    ApiIndex, Category, EmbeddingIndex, LexMapError, SnapshotRegistry, SynonymTable,
    MAX_PATH_HOPS,
};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

fn run(cli: &Cli) -> lexmap_engine::Result<String> {
    match &cli.command {
        Commands::Build(args) => run_build(cli, args),
        Commands::Search(args) => run_search(cli, args),
        Commands::Path(args) => run_path(cli, args),
        Commands::Entity(args) => run_entity(cli, args),
        Commands::Coverage => run_coverage(cli),
    }
}

/// Load the newest snapshot from the index directory
fn load_current(cli: &Cli) -> lexmap_engine::Result<Arc<ApiIndex>> {
    SnapshotRegistry::discover(&cli.index_dir)?.require_current()
}

fn run_build(cli: &Cli, args: &BuildArgs) -> lexmap_engine::Result<String> {
    let wrapper = read_records(&args.wrapper)?;
    let model = read_records(&args.model)?;

    let synonyms = match &args.synonyms {
        Some(path) => SynonymTable::load(path)?,
        None => SynonymTable::default(),
    };
    let embeddings = args.embeddings.as_deref().and_then(EmbeddingIndex::load);

    let index = ApiIndex::build(&args.index_version, wrapper, model, synonyms, embeddings)?;
    let path = index.save(&cli.index_dir)?;

    match cli.format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&serde_json::json!({
            "version": index.version,
            "snapshot": path,
            "entities": index.catalog.entities.len(),
            "mappings": index.mappings.len(),
            "graph_edges": index.graph.edge_count(),
            "search_entries": index.search.entries.len(),
            "coverage": index.coverage.fraction(),
        }))?),
        OutputFormat::Text => Ok(format!(
            "Built snapshot v{} at {}\n\
             entities: {}\n\
             mappings: {}\n\
             graph edges: {}\n\
             search entries: {}\n\
             coverage: {:.1}%",
            index.version,
            path.display(),
            index.catalog.entities.len(),
            index.mappings.len(),
            index.graph.edge_count(),
            index.search.entries.len(),
            index.coverage.fraction() * 100.0,
        )),
    }
}

fn run_search(cli: &Cli, args: &SearchArgs) -> lexmap_engine::Result<String> {
    let category = args
        .category
        .as_deref()
        .map(|raw| {
            Category::parse(raw).ok_or_else(|| LexMapError::QueryError {
                message: format!("unknown category: {}", raw),
            })
        })
        .transpose()?;

    let index = load_current(cli)?;
    let results = index.search(&args.query, None, category);

    match cli.format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&results)?),
        OutputFormat::Text => {
            if results.is_empty() {
                return Ok(format!("No results for \"{}\"", args.query));
            }
            let mut lines = Vec::new();
            for (rank, result) in results.iter().enumerate() {
                lines.push(format!(
                    "{}. {} [{}] (score {:.2})",
                    rank + 1,
                    result.id,
                    result.category.as_str(),
                    result.score,
                ));
                if !result.description.is_empty() {
                    lines.push(format!("   {}", result.description));
                }
            }
            Ok(lines.join("\n"))
        }
    }
}

fn run_path(cli: &Cli, args: &PathArgs) -> lexmap_engine::Result<String> {
    let index = load_current(cli)?;
    let result = index.find_path(&args.from, &args.to)?;

    match cli.format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => {
            let Some(path) = result else {
                return Ok(format!(
                    "No path from {} to {} within {} hops",
                    args.from, args.to, MAX_PATH_HOPS
                ));
            };
            if path.steps.is_empty() {
                return Ok(format!("{} is the target itself (zero-length path)", args.from));
            }

            let mut lines = Vec::new();
            for step in &path.steps {
                lines.push(format!(
                    "{} -{}-> {} (via {})",
                    step.from,
                    step.kind.as_str(),
                    step.to,
                    step.via
                ));
            }
            lines.push(String::new());
            lines.push(path.code_pattern.clone());
            for warning in &path.cast_warnings {
                lines.push(format!("warning: {}", warning));
            }
            Ok(lines.join("\n"))
        }
    }
}

fn run_entity(cli: &Cli, args: &EntityArgs) -> lexmap_engine::Result<String> {
    let index = load_current(cli)?;
    let entity = index.entity(&args.name)?;
    let edges = index.graph.edges_of(&args.name);

    match cli.format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&serde_json::json!({
            "entity": entity,
            "edges": edges,
        }))?),
        OutputFormat::Text => {
            let mut lines = vec![format!(
                "{} [{}] ({})",
                entity.id,
                entity.category.as_str(),
                entity.origin.as_str()
            )];
            if !entity.namespace.is_empty() {
                lines.push(format!("namespace: {}", entity.namespace));
            }
            if !entity.description.is_empty() {
                lines.push(entity.description.clone());
            }
            if !entity.methods.is_empty() {
                lines.push(format!("methods ({}):", entity.methods.len()));
                for method in &entity.methods {
                    let params: Vec<&str> =
                        method.params.iter().map(|p| p.name.as_str()).collect();
                    lines.push(format!("  {}({})", method.name, params.join(", ")));
                }
            }
            if !entity.properties.is_empty() {
                lines.push(format!("properties ({}):", entity.properties.len()));
                for property in &entity.properties {
                    match (property.relationship, &property.target_entity) {
                        (Some(kind), Some(target)) => lines.push(format!(
                            "  {} [{}] -> {}",
                            property.name,
                            kind.as_str(),
                            target
                        )),
                        _ => lines.push(format!("  {}", property.name)),
                    }
                }
            }
            if !edges.is_empty() {
                lines.push(format!("edges ({}):", edges.len()));
                for edge in edges {
                    lines.push(format!(
                        "  {} {} (via {})",
                        edge.kind.as_str(),
                        edge.target,
                        edge.via
                    ));
                }
            }
            Ok(lines.join("\n"))
        }
    }
}

fn run_coverage(cli: &Cli) -> lexmap_engine::Result<String> {
    let index = load_current(cli)?;
    let report = &index.coverage;

    match cli.format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        OutputFormat::Text => {
            let mut lines = vec![format!(
                "coverage: {:.1}% ({}/{} target references resolved)",
                report.fraction() * 100.0,
                report.resolved_refs,
                report.total_refs,
            )];
            if !report.unresolved.is_empty() {
                lines.push("unresolved:".to_string());
                for target in &report.unresolved {
                    lines.push(format!("  {}", target));
                }
            }
            Ok(lines.join("\n"))
        }
    }
}

fn read_records(
    path: &std::path::Path,
) -> lexmap_engine::Result<Vec<lexmap_engine::CatalogRecord>> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}
